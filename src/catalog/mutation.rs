//! Tag edits with write-through to sidecar files.
//!
//! The index is updated first, then the image's full tag list is written to
//! its sidecar. If the write fails the index is put back to the tag list it
//! had before, so memory never claims a tag the file does not hold.

use tracing::{debug, error, instrument, warn};

use super::Catalog;
use crate::error::{Error, Result};
use crate::index::{ImageId, Tag};
use crate::sidecar::write_sidecar;

/// Result of one item of a batch edit
#[derive(Debug)]
pub struct BatchOutcome {
    pub image: ImageId,
    /// `Ok(true)` if the image changed, `Ok(false)` if it already matched.
    pub result: Result<bool>,
}

impl BatchOutcome {
    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }
}

impl Catalog {
    /// Add a tag to an image and persist it.
    ///
    /// Returns `Ok(false)` without touching disk if the tag was already there.
    #[instrument(skip(self, image), fields(image = %image))]
    pub fn apply_add(&mut self, image: &ImageId, tag: &str) -> Result<bool> {
        let previous = self.snapshot(image)?;
        if !self.index.add_tag(image, tag)? {
            return Ok(false);
        }
        self.persist(image, previous)?;
        Ok(true)
    }

    /// Remove a tag from an image and persist it.
    ///
    /// Removing the last tag leaves an empty sidecar file behind.
    #[instrument(skip(self, image), fields(image = %image))]
    pub fn apply_remove(&mut self, image: &ImageId, tag: &str) -> Result<bool> {
        self.index.normalize(tag)?;
        let previous = self.snapshot(image)?;
        if !self.index.remove_tag(image, tag) {
            return Ok(false);
        }
        self.persist(image, previous)?;
        Ok(true)
    }

    /// Add one tag to many images. Failures are collected, never fatal.
    pub fn apply_add_batch<'a, I>(&mut self, images: I, tag: &str) -> Vec<BatchOutcome>
    where
        I: IntoIterator<Item = &'a ImageId>,
    {
        images
            .into_iter()
            .map(|image| BatchOutcome {
                image: image.clone(),
                result: self.apply_add(image, tag),
            })
            .collect()
    }

    /// Remove one tag from many images. Failures are collected, never fatal.
    pub fn apply_remove_batch<'a, I>(&mut self, images: I, tag: &str) -> Vec<BatchOutcome>
    where
        I: IntoIterator<Item = &'a ImageId>,
    {
        images
            .into_iter()
            .map(|image| BatchOutcome {
                image: image.clone(),
                result: self.apply_remove(image, tag),
            })
            .collect()
    }

    /// Sort an image's tags by how many images carry each one and persist
    /// the new order. Ties are alphabetical in both directions.
    ///
    /// Returns `Ok(false)` without touching disk if the order is unchanged.
    #[instrument(skip(self, image), fields(image = %image))]
    pub fn apply_sort_by_frequency(&mut self, image: &ImageId, descending: bool) -> Result<bool> {
        let previous = self.snapshot(image)?;
        let mut sorted = previous.clone();
        sorted.sort_by(|a, b| {
            let (ca, cb) = (self.index.count_of(a), self.index.count_of(b));
            let by_count = if descending { cb.cmp(&ca) } else { ca.cmp(&cb) };
            by_count.then_with(|| a.cmp(b))
        });
        if sorted == previous {
            return Ok(false);
        }
        self.index.replace_tags(image, sorted)?;
        self.persist(image, previous)?;
        Ok(true)
    }

    fn snapshot(&self, image: &ImageId) -> Result<Vec<Tag>> {
        match (self.records.contains_key(image), self.index.tags_of(image)) {
            (true, Some(tags)) => Ok(tags.to_vec()),
            _ => Err(Error::NotFound(self.root.join(image.as_str()))),
        }
    }

    /// Write the image's current tags; on failure restore `previous`.
    ///
    /// Images sharing the sidecar take on the written tags too.
    fn persist(&mut self, image: &ImageId, previous: Vec<Tag>) -> Result<()> {
        let Some(record) = self.records.get(image) else {
            return Err(Error::NotFound(self.root.join(image.as_str())));
        };
        let sidecar = record.sidecar_path.clone();
        let tags = self.index.tags_of(image).unwrap_or_default().to_vec();

        if let Err(err) = write_sidecar(&sidecar, &tags) {
            warn!(error = %err, "sidecar write failed, rolling back");
            if let Err(rollback) = self.index.replace_tags(image, previous) {
                error!(error = %rollback, "rollback failed");
            }
            return Err(err);
        }
        debug!(count = tags.len(), "tags persisted");

        let mut written = vec![image.clone()];
        written.extend(self.siblings(image));
        for id in &written {
            if id != image {
                if let Err(err) = self.index.replace_tags(id, tags.clone()) {
                    error!(sibling = %id, error = %err, "shared sidecar sibling missing from index");
                }
                debug!(sibling = %id, "mirrored tags from shared sidecar");
            }
            if let Some(record) = self.records.get_mut(id) {
                record.sidecar_exists = true;
            }
        }
        Ok(())
    }
}
