//! The loaded-directory aggregate.
//!
//! A [`Catalog`] owns the image records of one root directory together with
//! the [`TagIndex`] built from their sidecars. It is produced by the loader
//! and replaced wholesale on reload; tag edits go through [`mutation`].

mod mutation;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::LoadOptions;
use crate::error::Result;
use crate::index::{ImageId, Tag, TagIndex};
use crate::scanner::{ScannedImage, Scanner};
use crate::sidecar::read_sidecar;

pub use mutation::BatchOutcome;

/// One image file of the loaded directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub path: PathBuf,
    pub sidecar_path: PathBuf,
    pub sidecar_exists: bool,
}

/// Statistics from a sync against the filesystem
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    options: LoadOptions,
    records: BTreeMap<ImageId, ImageRecord>,
    index: TagIndex,
    /// Sidecars backing more than one image (`a.jpg` and `a.png` both use `a.txt`)
    shared: HashMap<PathBuf, Vec<ImageId>>,
}

impl Catalog {
    pub(crate) fn new(
        root: PathBuf,
        options: LoadOptions,
        records: BTreeMap<ImageId, ImageRecord>,
        index: TagIndex,
    ) -> Self {
        let shared = shared_sidecars(&records);
        Self {
            root,
            options,
            records,
            index,
            shared,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn index(&self) -> &TagIndex {
        &self.index
    }

    pub fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.records.get(id)
    }

    /// All records, ordered by relative path
    pub fn images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.values()
    }

    pub fn tags_of(&self, id: &ImageId) -> Option<&[Tag]> {
        self.index.tags_of(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Map a path to a loaded image. Accepts a path relative to the root,
    /// or an absolute path inside it.
    pub fn resolve(&self, path: &Path) -> Option<ImageId> {
        let relative = if path.is_absolute() {
            let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            absolute.strip_prefix(&self.root).ok()?.to_path_buf()
        } else {
            path.to_path_buf()
        };
        let id = ImageId::new(&relative.to_string_lossy());
        self.records.contains_key(&id).then_some(id)
    }

    /// Drop an image that vanished from disk.
    pub fn remove_image(&mut self, id: &ImageId) -> bool {
        let removed = self.records.remove(id).is_some();
        self.index.remove_image(id);
        if removed {
            self.shared = shared_sidecars(&self.records);
        }
        removed
    }

    /// Other images whose tags live in the same sidecar as `id`
    pub fn siblings(&self, id: &ImageId) -> Vec<ImageId> {
        self.records
            .get(id)
            .and_then(|record| self.shared.get(&record.sidecar_path))
            .map(|group| group.iter().filter(|other| *other != id).cloned().collect())
            .unwrap_or_default()
    }

    /// Rescan the root: add images that appeared, remove ones that are gone.
    ///
    /// Images still on disk keep their in-memory tags; sidecars are owned by
    /// this process while loaded, so there is nothing to merge.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn sync(&mut self) -> Result<SyncStats> {
        let scanner = Scanner::new(self.root.clone(), self.options.clone());
        let scanned = scanner.scan_images()?;
        let mut stats = SyncStats::default();

        let on_disk: HashSet<ImageId> = scanned
            .iter()
            .map(|s| ImageId::new(&s.relative_path))
            .collect();
        let gone: Vec<ImageId> = self
            .records
            .keys()
            .filter(|id| !on_disk.contains(*id))
            .cloned()
            .collect();
        for id in &gone {
            self.remove_image(id);
            stats.removed += 1;
        }

        for image in scanned {
            let id = ImageId::new(&image.relative_path);
            if self.records.contains_key(&id) {
                continue;
            }
            let (record, tags) = read_record(image);
            self.index.insert_image(id.clone(), tags);
            self.records.insert(id, record);
            stats.added += 1;
        }

        self.shared = shared_sidecars(&self.records);
        info!(added = stats.added, removed = stats.removed, "sync complete");
        Ok(stats)
    }
}

/// Group images by sidecar, keeping only sidecars used by several images.
fn shared_sidecars(records: &BTreeMap<ImageId, ImageRecord>) -> HashMap<PathBuf, Vec<ImageId>> {
    let mut by_sidecar: HashMap<PathBuf, Vec<ImageId>> = HashMap::new();
    for record in records.values() {
        by_sidecar
            .entry(record.sidecar_path.clone())
            .or_default()
            .push(record.id.clone());
    }
    by_sidecar.retain(|_, group| group.len() > 1);
    by_sidecar
}

/// Pair a scanned image with its sidecar tags.
///
/// A sidecar that cannot be read is logged and treated as carrying no tags.
pub(crate) fn read_record(image: ScannedImage) -> (ImageRecord, Vec<String>) {
    let (tags, sidecar_exists) = match read_sidecar(&image.sidecar_path) {
        Ok(Some(tags)) => (tags, true),
        Ok(None) => (Vec::new(), false),
        Err(err) => {
            warn!(
                path = %image.sidecar_path.display(),
                error = %err,
                "unreadable sidecar, treating as untagged"
            );
            (Vec::new(), image.sidecar_path.is_file())
        }
    };
    let record = ImageRecord {
        id: ImageId::new(&image.relative_path),
        path: image.path,
        sidecar_path: image.sidecar_path,
        sidecar_exists,
    };
    (record, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_directory, LoadControl};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Catalog) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.jpg"), "img").unwrap();
        fs::write(root.join("a.txt"), "red, cat").unwrap();
        fs::write(root.join("sub/b.png"), "img").unwrap();

        let catalog = load_directory(root, &LoadOptions::default(), &LoadControl::new()).unwrap();
        (temp, catalog)
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let (temp, catalog) = setup();
        assert_eq!(catalog.resolve(Path::new("sub/b.png")), Some(ImageId::new("sub/b.png")));
        assert_eq!(
            catalog.resolve(&temp.path().join("a.jpg")),
            Some(ImageId::new("a.jpg"))
        );
        assert_eq!(catalog.resolve(Path::new("missing.jpg")), None);
        assert_eq!(catalog.resolve(Path::new("/elsewhere/a.jpg")), None);
    }

    #[test]
    fn test_remove_image() {
        let (_temp, mut catalog) = setup();
        let id = ImageId::new("a.jpg");
        assert!(catalog.remove_image(&id));
        assert!(!catalog.remove_image(&id));
        assert!(catalog.image(&id).is_none());
        assert!(catalog.index().all_tags().is_empty());
        catalog.index().assert_consistent();
    }

    #[test]
    fn test_sync_picks_up_changes() {
        let (temp, mut catalog) = setup();
        let root = temp.path();

        fs::remove_file(root.join("sub/b.png")).unwrap();
        fs::write(root.join("c.gif"), "img").unwrap();
        fs::write(root.join("c.txt"), "blue").unwrap();

        let stats = catalog.sync().unwrap();
        assert_eq!(stats, SyncStats { added: 1, removed: 1 });

        let c = ImageId::new("c.gif");
        assert!(catalog.image(&c).unwrap().sidecar_exists);
        assert_eq!(catalog.tags_of(&c).unwrap()[0].as_str(), "blue");
        assert!(catalog.image(&ImageId::new("sub/b.png")).is_none());
        assert_eq!(catalog.len(), 2);
        catalog.index().assert_consistent();

        let stats = catalog.sync().unwrap();
        assert_eq!(stats, SyncStats::default());
    }

    #[test]
    fn test_sync_keeps_in_memory_tags() {
        let (temp, mut catalog) = setup();
        fs::write(temp.path().join("a.txt"), "changed").unwrap();

        catalog.sync().unwrap();
        let tags: Vec<&str> = catalog
            .tags_of(&ImageId::new("a.jpg"))
            .unwrap()
            .iter()
            .map(Tag::as_str)
            .collect();
        assert_eq!(tags, vec!["red", "cat"]);
    }
}
