//! Gallery-facing facade.
//!
//! A [`Library`] holds at most one loaded [`Catalog`], the active
//! [`FilterQuery`], and the visible set derived from the two. The visible set
//! is recomputed whenever the catalog or the query changes; it is never
//! edited directly.
//!
//! All methods take `&self`/`&mut self`, so a host sharing a library across
//! threads wraps it in a `Mutex` and each edit runs inside one lock scope.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::{BatchOutcome, Catalog, ImageRecord, SyncStats};
use crate::config::LoadOptions;
use crate::error::{Error, Result};
use crate::index::{FilterQuery, ImageId, Tag};
use crate::loader::{load_directory, LoadControl, LoadTask};

#[derive(Debug, Default)]
pub struct Library {
    options: LoadOptions,
    catalog: Option<Catalog>,
    query: FilterQuery,
    visible: BTreeSet<ImageId>,
}

impl Library {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load a directory synchronously, replacing whatever was loaded.
    ///
    /// On failure the previously loaded directory stays in place.
    pub fn load(&mut self, root: &Path) -> Result<usize> {
        let catalog = load_directory(root, &self.options, &LoadControl::new())?;
        Ok(self.install(catalog))
    }

    /// Start loading a directory in the background. Hand the finished
    /// catalog to [`Library::install`].
    pub fn spawn_load(&self, root: PathBuf) -> LoadTask {
        LoadTask::spawn(root, self.options.clone())
    }

    /// Replace the loaded directory. The filter is reset to show everything.
    pub fn install(&mut self, catalog: Catalog) -> usize {
        let count = catalog.len();
        info!(root = %catalog.root().display(), images = count, "library loaded");
        self.options = catalog.options().clone();
        self.catalog = Some(catalog);
        self.query = FilterQuery::default();
        self.refresh();
        count
    }

    pub fn unload(&mut self) {
        self.catalog = None;
        self.query = FilterQuery::default();
        self.visible.clear();
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn root(&self) -> Option<&Path> {
        self.catalog.as_ref().map(Catalog::root)
    }

    pub fn set_filter(&mut self, query: FilterQuery) {
        self.query = query;
        self.refresh();
    }

    pub fn clear_filter(&mut self) {
        self.set_filter(FilterQuery::default());
    }

    pub fn filter(&self) -> &FilterQuery {
        &self.query
    }

    /// Images matching the current filter, ordered by relative path
    pub fn visible_images(&self) -> Vec<&ImageRecord> {
        let Some(catalog) = &self.catalog else {
            return Vec::new();
        };
        self.visible.iter().filter_map(|id| catalog.image(id)).collect()
    }

    pub fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.catalog.as_ref()?.image(id)
    }

    pub fn tags_of(&self, id: &ImageId) -> Option<&[Tag]> {
        self.catalog.as_ref()?.tags_of(id)
    }

    pub fn resolve(&self, path: &Path) -> Option<ImageId> {
        self.catalog.as_ref()?.resolve(path)
    }

    pub fn add_tag(&mut self, image: &ImageId, tag: &str) -> Result<bool> {
        let result = self.catalog_mut()?.apply_add(image, tag);
        self.refresh();
        result
    }

    pub fn remove_tag(&mut self, image: &ImageId, tag: &str) -> Result<bool> {
        let result = self.catalog_mut()?.apply_remove(image, tag);
        self.refresh();
        result
    }

    /// Reorder an image's tags by library-wide frequency, most used first
    /// when `descending`.
    pub fn sort_tags_by_frequency(&mut self, image: &ImageId, descending: bool) -> Result<bool> {
        let result = self.catalog_mut()?.apply_sort_by_frequency(image, descending);
        self.refresh();
        result
    }

    pub fn add_tag_to_many(&mut self, images: &[ImageId], tag: &str) -> Vec<BatchOutcome> {
        let outcomes = match self.catalog.as_mut() {
            Some(catalog) => catalog.apply_add_batch(images, tag),
            None => not_loaded(images),
        };
        self.refresh();
        outcomes
    }

    pub fn remove_tag_from_many(&mut self, images: &[ImageId], tag: &str) -> Vec<BatchOutcome> {
        let outcomes = match self.catalog.as_mut() {
            Some(catalog) => catalog.apply_remove_batch(images, tag),
            None => not_loaded(images),
        };
        self.refresh();
        outcomes
    }

    /// Every tag in use, for building filter pickers
    pub fn all_known_tags(&self) -> BTreeSet<Tag> {
        self.catalog
            .as_ref()
            .map(|c| c.index().all_tags())
            .unwrap_or_default()
    }

    /// Tags with usage counts, most frequent first
    pub fn tag_counts(&self) -> Vec<(Tag, usize)> {
        self.catalog
            .as_ref()
            .map(|c| c.index().tag_counts())
            .unwrap_or_default()
    }

    /// Forget an image removed from disk by someone else
    pub fn remove_image(&mut self, image: &ImageId) -> bool {
        let removed = self
            .catalog
            .as_mut()
            .is_some_and(|c| c.remove_image(image));
        self.refresh();
        removed
    }

    pub fn sync(&mut self) -> Result<SyncStats> {
        let catalog = self
            .catalog
            .as_mut()
            .ok_or(Error::NotLoaded)?;
        let stats = catalog.sync()?;
        self.refresh();
        Ok(stats)
    }

    fn catalog_mut(&mut self) -> Result<&mut Catalog> {
        self.catalog.as_mut().ok_or(Error::NotLoaded)
    }

    fn refresh(&mut self) {
        self.visible = match &self.catalog {
            Some(catalog) => self.query.evaluate(catalog.index()),
            None => BTreeSet::new(),
        };
        debug!(visible = self.visible.len(), "visible set refreshed");
    }
}

fn not_loaded(images: &[ImageId]) -> Vec<BatchOutcome> {
    images
        .iter()
        .map(|image| BatchOutcome {
            image: image.clone(),
            result: Err(Error::NotLoaded),
        })
        .collect()
}
