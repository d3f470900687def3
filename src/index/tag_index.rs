use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, instrument};

use super::tags::{ImageId, Tag};
use crate::config::CasePolicy;
use crate::error::{Error, Result};

/// Bidirectional image/tag map.
///
/// `forward` holds every known image, tagged or not, with its tags in
/// insertion order. `inverse` holds only tags carried by at least one image.
/// For every image `i` and tag `t`: `t ∈ forward[i] ⇔ i ∈ inverse[t]`.
/// Neither map is reachable from outside this type.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    policy: CasePolicy,
    forward: HashMap<ImageId, Vec<Tag>>,
    inverse: HashMap<Tag, HashSet<ImageId>>,
}

impl TagIndex {
    pub fn new(policy: CasePolicy) -> Self {
        Self {
            policy,
            forward: HashMap::new(),
            inverse: HashMap::new(),
        }
    }

    /// Build an index in one pass from raw (unnormalized) tag lists.
    ///
    /// Invalid entries are skipped; duplicates collapse onto the first
    /// occurrence.
    #[instrument(skip_all)]
    pub fn from_entries<I, T, S>(policy: CasePolicy, entries: I) -> Self
    where
        I: IntoIterator<Item = (ImageId, T)>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new(policy);
        for (image, raw_tags) in entries {
            let tags = index.normalize_all(raw_tags);
            index.install(image, tags);
        }
        debug!(
            images = index.forward.len(),
            tags = index.inverse.len(),
            "built tag index"
        );
        index
    }

    /// Normalize a raw tag under this index's case policy
    pub fn normalize(&self, raw: &str) -> Result<Tag> {
        Tag::normalize(raw, self.policy)
    }

    /// Register an image with the given raw tags, replacing any tags it
    /// already had.
    pub fn insert_image<T, S>(&mut self, image: ImageId, raw_tags: T)
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = self.normalize_all(raw_tags);
        self.remove_image(&image);
        self.install(image, tags);
    }

    /// Forget an image entirely, pruning tags nobody carries any more.
    pub fn remove_image(&mut self, image: &ImageId) -> bool {
        let Some(tags) = self.forward.remove(image) else {
            return false;
        };
        for tag in &tags {
            self.unlink(tag, image);
        }
        true
    }

    /// Add a tag to a known image. Returns false if it was already present.
    pub fn add_tag(&mut self, image: &ImageId, raw: &str) -> Result<bool> {
        let tag = self.normalize(raw)?;
        let tags = self
            .forward
            .get_mut(image)
            .ok_or_else(|| Error::NotFound(PathBuf::from(image.as_str())))?;

        if tags.contains(&tag) {
            return Ok(false);
        }
        tags.push(tag.clone());
        self.inverse.entry(tag).or_default().insert(image.clone());
        Ok(true)
    }

    /// Remove a tag from an image. Returns false if it was not present.
    pub fn remove_tag(&mut self, image: &ImageId, raw: &str) -> bool {
        let Ok(tag) = self.normalize(raw) else {
            return false;
        };
        let Some(tags) = self.forward.get_mut(image) else {
            return false;
        };
        let Some(position) = tags.iter().position(|t| *t == tag) else {
            return false;
        };
        tags.remove(position);
        self.unlink(&tag, image);
        true
    }

    /// Overwrite an image's tag list with already-normalized tags.
    pub fn replace_tags(&mut self, image: &ImageId, tags: Vec<Tag>) -> Result<()> {
        if !self.contains_image(image) {
            return Err(Error::NotFound(PathBuf::from(image.as_str())));
        }
        self.remove_image(image);
        self.install(image.clone(), dedup(tags));
        Ok(())
    }

    pub fn tags_of(&self, image: &ImageId) -> Option<&[Tag]> {
        self.forward.get(image).map(Vec::as_slice)
    }

    /// Images carrying a tag; the raw tag is normalized first.
    pub fn images_with(&self, raw: &str) -> Option<&HashSet<ImageId>> {
        let tag = self.normalize(raw).ok()?;
        self.inverse.get(&tag)
    }

    pub(crate) fn members(&self, tag: &Tag) -> Option<&HashSet<ImageId>> {
        self.inverse.get(tag)
    }

    /// Number of images carrying an already-normalized tag
    pub fn count_of(&self, tag: &Tag) -> usize {
        self.inverse.get(tag).map_or(0, HashSet::len)
    }

    /// Every tag carried by at least one image, sorted
    pub fn all_tags(&self) -> BTreeSet<Tag> {
        self.inverse.keys().cloned().collect()
    }

    pub fn tag_count(&self, raw: &str) -> usize {
        self.images_with(raw).map_or(0, HashSet::len)
    }

    /// Tags with the number of images carrying them, most frequent first,
    /// ties broken alphabetically.
    pub fn tag_counts(&self) -> Vec<(Tag, usize)> {
        let mut counts: Vec<(Tag, usize)> = self
            .inverse
            .iter()
            .map(|(tag, images)| (tag.clone(), images.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageId> {
        self.forward.keys()
    }

    pub fn contains_image(&self, image: &ImageId) -> bool {
        self.forward.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    fn normalize_all<T, S>(&self, raw_tags: T) -> Vec<Tag>
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = raw_tags
            .into_iter()
            .filter_map(|raw| self.normalize(raw.as_ref()).ok())
            .collect();
        dedup(tags)
    }

    /// Caller guarantees `image` has no forward entry and `tags` is unique.
    fn install(&mut self, image: ImageId, tags: Vec<Tag>) {
        for tag in &tags {
            self.inverse.entry(tag.clone()).or_default().insert(image.clone());
        }
        self.forward.insert(image, tags);
    }

    fn unlink(&mut self, tag: &Tag, image: &ImageId) {
        if let Some(images) = self.inverse.get_mut(tag) {
            images.remove(image);
            if images.is_empty() {
                self.inverse.remove(tag);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (image, tags) in &self.forward {
            for tag in tags {
                assert!(
                    self.inverse.get(tag).is_some_and(|s| s.contains(image)),
                    "{image} carries {tag} but inverse map disagrees"
                );
            }
        }
        for (tag, images) in &self.inverse {
            assert!(!images.is_empty(), "stale empty entry for {tag}");
            for image in images {
                assert!(
                    self.forward.get(image).is_some_and(|t| t.contains(tag)),
                    "inverse lists {image} under {tag} but forward map disagrees"
                );
            }
        }
    }
}

fn dedup(tags: Vec<Tag>) -> Vec<Tag> {
    let mut seen = HashSet::with_capacity(tags.len());
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ImageId {
        ImageId::new(s)
    }

    fn sample() -> TagIndex {
        TagIndex::from_entries(
            CasePolicy::Sensitive,
            [
                (id("img1.jpg"), vec!["red", "cat"]),
                (id("img2.jpg"), vec!["blue", "cat"]),
                (id("img3.jpg"), vec!["red"]),
                (id("img4.jpg"), vec![]),
            ],
        )
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(Tag::as_str).collect()
    }

    #[test]
    fn test_from_entries() {
        let index = sample();
        index.assert_consistent();
        assert_eq!(index.len(), 4);
        assert_eq!(names(index.tags_of(&id("img1.jpg")).unwrap()), vec!["red", "cat"]);
        assert_eq!(index.tags_of(&id("img4.jpg")).unwrap().len(), 0);
        assert_eq!(index.tag_count("cat"), 2);
        assert_eq!(index.tag_count("green"), 0);
    }

    #[test]
    fn test_from_entries_dedups_and_skips_invalid() {
        let index = TagIndex::from_entries(
            CasePolicy::Insensitive,
            [(id("a.png"), vec!["Cat", " cat ", "", "dog", "CAT"])],
        );
        index.assert_consistent();
        assert_eq!(names(index.tags_of(&id("a.png")).unwrap()), vec!["cat", "dog"]);
    }

    #[test]
    fn test_add_tag_idempotent() {
        let mut index = sample();
        assert!(index.add_tag(&id("img3.jpg"), "cat").unwrap());
        assert!(!index.add_tag(&id("img3.jpg"), " cat").unwrap());
        assert_eq!(names(index.tags_of(&id("img3.jpg")).unwrap()), vec!["red", "cat"]);
        assert_eq!(index.tag_count("cat"), 3);
        index.assert_consistent();
    }

    #[test]
    fn test_add_tag_rejects_blank() {
        let mut index = sample();
        let err = index.add_tag(&id("img1.jpg"), "   ").unwrap_err();
        assert!(matches!(err, Error::InvalidTag(_)));
        assert_eq!(index.tags_of(&id("img1.jpg")).unwrap().len(), 2);
    }

    #[test]
    fn test_add_tag_unknown_image() {
        let mut index = sample();
        let err = index.add_tag(&id("missing.jpg"), "cat").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        index.assert_consistent();
    }

    #[test]
    fn test_remove_tag() {
        let mut index = sample();
        assert!(index.remove_tag(&id("img1.jpg"), "cat"));
        assert!(!index.remove_tag(&id("img1.jpg"), "cat"));
        assert!(!index.remove_tag(&id("img1.jpg"), ""));
        assert!(!index.remove_tag(&id("missing.jpg"), "red"));
        assert_eq!(index.tag_count("cat"), 1);
        index.assert_consistent();
    }

    #[test]
    fn test_remove_last_carrier_drops_tag() {
        let mut index = sample();
        assert!(index.all_tags().iter().any(|t| t.as_str() == "blue"));
        assert!(index.remove_tag(&id("img2.jpg"), "blue"));
        assert!(!index.all_tags().iter().any(|t| t.as_str() == "blue"));
        assert!(index.images_with("blue").is_none());
        index.assert_consistent();
    }

    #[test]
    fn test_remove_image_prunes_tags() {
        let mut index = sample();
        assert!(index.remove_image(&id("img2.jpg")));
        assert!(!index.remove_image(&id("img2.jpg")));
        assert!(index.images_with("blue").is_none());
        assert_eq!(index.tag_count("cat"), 1);
        assert!(!index.contains_image(&id("img2.jpg")));
        index.assert_consistent();
    }

    #[test]
    fn test_replace_tags() {
        let mut index = sample();
        let before: Vec<Tag> = index.tags_of(&id("img1.jpg")).unwrap().to_vec();
        index.add_tag(&id("img1.jpg"), "green").unwrap();
        index.remove_tag(&id("img1.jpg"), "red");
        index.replace_tags(&id("img1.jpg"), before).unwrap();

        assert_eq!(names(index.tags_of(&id("img1.jpg")).unwrap()), vec!["red", "cat"]);
        assert!(index.images_with("green").is_none());
        index.assert_consistent();

        let err = index.replace_tags(&id("missing.jpg"), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_insert_image_replaces_existing() {
        let mut index = sample();
        index.insert_image(id("img1.jpg"), ["dog"]);
        assert_eq!(names(index.tags_of(&id("img1.jpg")).unwrap()), vec!["dog"]);
        assert_eq!(index.tag_count("cat"), 1);
        index.assert_consistent();
    }

    #[test]
    fn test_tag_counts_ordering() {
        let index = sample();
        let counts: Vec<(String, usize)> = index
            .tag_counts()
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("cat".to_string(), 2),
                ("red".to_string(), 2),
                ("blue".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut index = TagIndex::from_entries(CasePolicy::Insensitive, [(id("a.jpg"), vec!["Cat"])]);
        assert_eq!(index.tag_count("CAT"), 1);
        assert!(!index.add_tag(&id("a.jpg"), "cAt").unwrap());
        assert!(index.remove_tag(&id("a.jpg"), "CAT"));
        assert!(index.all_tags().is_empty());
    }

    #[test]
    fn test_invariant_after_mixed_operations() {
        let mut index = sample();
        let images = ["img1.jpg", "img2.jpg", "img3.jpg", "img4.jpg"];
        let tags = ["red", "cat", "blue", "green", "dog"];

        for step in 0..200usize {
            let image = id(images[step % images.len()]);
            let tag = tags[(step * 7 + step / 3) % tags.len()];
            if step % 3 == 0 {
                index.remove_tag(&image, tag);
            } else {
                index.add_tag(&image, tag).unwrap();
            }
            if step % 50 == 49 {
                index.remove_image(&image);
                index.insert_image(image, [tag]);
            }
            index.assert_consistent();
        }

        for tag in index.all_tags() {
            for image in index.members(&tag).unwrap() {
                assert!(index.tags_of(image).unwrap().contains(&tag));
            }
        }
    }
}
