use std::fs;
use std::path::PathBuf;

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::config::LoadOptions;
use crate::error::{Error, Result};
use crate::loader::LoadControl;
use crate::sidecar::sidecar_path;

/// Entries walked between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 256;

/// An image file found on disk, paired with where its sidecar would be
#[derive(Debug, Clone)]
pub struct ScannedImage {
    pub path: PathBuf,
    pub relative_path: String,
    pub sidecar_path: PathBuf,
}

/// Walks a library root looking for image files
pub struct Scanner {
    root: PathBuf,
    options: LoadOptions,
    control: LoadControl,
}

impl Scanner {
    pub fn new(root: PathBuf, options: LoadOptions) -> Self {
        Self {
            root,
            options,
            control: LoadControl::new(),
        }
    }

    /// Stop the walk with `Error::Cancelled` once `control` is cancelled
    pub fn with_control(mut self, control: LoadControl) -> Self {
        self.control = control;
        self
    }

    /// Scan for image files, sorted by relative path.
    ///
    /// Fails only if the root itself is missing or unreadable, or the scan is
    /// cancelled; problems further down are logged and the offending entry
    /// skipped.
    pub fn scan_images(&self) -> Result<Vec<ScannedImage>> {
        let metadata = fs::metadata(&self.root).map_err(|e| Error::io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(Error::NotFound(self.root.clone()));
        }
        fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let include_hidden = self.options.include_hidden;

        let mut images = Vec::new();
        let walker = WalkDir::new(&self.root)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| include_hidden || !is_hidden(e));
        for (walked, entry) in walker.enumerate() {
            if walked % CANCEL_CHECK_INTERVAL == 0 {
                self.control.check()?;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.options.is_image(entry.path()) {
                continue;
            }
            if let Some(scanned) = self.make_scanned_image(&entry) {
                images.push(scanned);
            }
        }

        images.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(images)
    }

    fn make_scanned_image(&self, entry: &DirEntry) -> Option<ScannedImage> {
        let path = entry.path().to_path_buf();
        let relative_path = path
            .strip_prefix(&self.root)
            .ok()?
            .to_string_lossy()
            .replace('\\', "/");
        let sidecar_path = sidecar_path(&path);

        Some(ScannedImage {
            path,
            relative_path,
            sidecar_path,
        })
    }
}

/// Check if a directory entry is hidden (starts with .)
/// Never considers the root entry (depth 0) as hidden.
fn is_hidden(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn relative_paths(images: &[ScannedImage]) -> Vec<&str> {
        images.iter().map(|i| i.relative_path.as_str()).collect()
    }

    #[test]
    fn test_scan_images_recursive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("set1/inner")).unwrap();
        fs::write(root.join("b.png"), "data").unwrap();
        fs::write(root.join("b.txt"), "tag").unwrap();
        fs::write(root.join("set1/a.JPG"), "data").unwrap();
        fs::write(root.join("set1/inner/c.webp"), "data").unwrap();
        fs::write(root.join("set1/notes.md"), "not an image").unwrap();

        let scanner = Scanner::new(root.to_path_buf(), LoadOptions::default());
        let images = scanner.scan_images().unwrap();

        assert_eq!(relative_paths(&images), vec!["b.png", "set1/a.JPG", "set1/inner/c.webp"]);
        assert_eq!(images[0].sidecar_path, root.join("b.txt"));
    }

    #[test]
    fn test_scan_images_flat() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("top.jpg"), "data").unwrap();
        fs::write(root.join("sub/deep.jpg"), "data").unwrap();

        let options = LoadOptions {
            recursive: false,
            ..LoadOptions::default()
        };
        let images = Scanner::new(root.to_path_buf(), options).scan_images().unwrap();
        assert_eq!(relative_paths(&images), vec!["top.jpg"]);
    }

    #[test]
    fn test_scanner_skips_hidden() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("visible")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("visible/photo.jpg"), "data").unwrap();
        fs::write(root.join(".hidden/secret.jpg"), "hidden").unwrap();
        fs::write(root.join("visible/.hidden.jpg"), "hidden file").unwrap();

        let scanner = Scanner::new(root.to_path_buf(), LoadOptions::default());
        let images = scanner.scan_images().unwrap();
        assert_eq!(relative_paths(&images), vec!["visible/photo.jpg"]);

        let options = LoadOptions {
            include_hidden: true,
            ..LoadOptions::default()
        };
        let images = Scanner::new(root.to_path_buf(), options).scan_images().unwrap();
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn test_scan_stops_when_cancelled() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.jpg"), "data").unwrap();

        let control = LoadControl::new();
        control.cancel();
        let scanner = Scanner::new(temp.path().to_path_buf(), LoadOptions::default())
            .with_control(control);
        assert!(matches!(scanner.scan_images(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_scan_missing_root() {
        let scanner = Scanner::new(PathBuf::from("/nonexistent/path"), LoadOptions::default());
        assert!(matches!(scanner.scan_images(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_scan_root_is_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("photo.jpg");
        fs::write(&file, "data").unwrap();

        let scanner = Scanner::new(file, LoadOptions::default());
        assert!(matches!(scanner.scan_images(), Err(Error::NotFound(_))));
    }
}
