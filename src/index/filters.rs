use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::tag_index::TagIndex;
use super::tags::{ImageId, Tag};

/// Set-algebra over literal tags.
///
/// An image is visible when it carries every `include` tag, none of the
/// `exclude` tags, and at least one tag from each non-empty `any_of` group.
/// Tags are kept raw and normalized against the index at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<Vec<String>>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images carrying all of the given tags
    pub fn all_of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().include(tags)
    }

    /// Images carrying at least one of the given tags
    pub fn any_of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().any(tags)
    }

    /// Images carrying none of the given tags
    pub fn none_of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().exclude(tags)
    }

    pub fn include<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Add one any-of group
    pub fn any<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.any_of.push(tags.into_iter().map(Into::into).collect());
        self
    }

    /// True when no constraint would survive normalization.
    pub fn is_empty(&self) -> bool {
        let blank = |tags: &[String]| tags.iter().all(|t| t.trim().is_empty());
        blank(&self.include) && blank(&self.exclude) && self.any_of.iter().all(|g| blank(g))
    }

    /// Compute the visible set for this query.
    #[instrument(skip_all)]
    pub fn evaluate(&self, index: &TagIndex) -> BTreeSet<ImageId> {
        let normalize = |raw: &[String]| -> Vec<Tag> {
            raw.iter().filter_map(|t| index.normalize(t).ok()).collect()
        };

        let include = normalize(&self.include);
        let exclude = normalize(&self.exclude);
        let groups: Vec<Vec<Tag>> = self
            .any_of
            .iter()
            .map(|g| normalize(g))
            .filter(|g| !g.is_empty())
            .collect();

        // An include tag missing from the index has no members.
        let Some(mut required) = include
            .iter()
            .map(|t| index.members(t))
            .collect::<Option<Vec<&HashSet<ImageId>>>>()
        else {
            debug!("include tag absent from index");
            return BTreeSet::new();
        };

        // Start from the most selective tag
        required.sort_by_key(|members| members.len());
        let mut required = required.into_iter();
        let mut candidates: HashSet<&ImageId> = match required.next() {
            Some(smallest) => smallest.iter().collect(),
            None => index.images().collect(),
        };
        for members in required {
            candidates.retain(|image| members.contains(*image));
        }

        for tag in &exclude {
            if let Some(members) = index.members(tag) {
                candidates.retain(|image| !members.contains(*image));
            }
        }

        for group in &groups {
            let union: HashSet<&ImageId> = group
                .iter()
                .filter_map(|t| index.members(t))
                .flatten()
                .collect();
            candidates.retain(|image| union.contains(image));
        }

        let visible: BTreeSet<ImageId> = candidates.into_iter().cloned().collect();
        debug!(count = visible.len(), "evaluated filter");
        visible
    }
}
