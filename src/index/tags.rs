use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::CasePolicy;
use crate::error::{Error, Result};

/// A normalized tag string.
///
/// Only produced by [`Tag::normalize`], so every `Tag` is non-empty, trimmed,
/// free of separators, and folded according to the policy it was made under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Arc<str>);

impl Tag {
    /// Trim and validate a raw tag, applying the case policy.
    ///
    /// Empty input, or input containing a comma or line break, is rejected
    /// because it would not survive a round-trip through a sidecar file.
    pub fn normalize(raw: &str, policy: CasePolicy) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains([',', '\n', '\r']) {
            return Err(Error::InvalidTag(raw.to_string()));
        }
        let tag = match policy {
            CasePolicy::Sensitive => Arc::from(trimmed),
            CasePolicy::Insensitive => Arc::from(trimmed.to_lowercase()),
        };
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stable identifier of an image: its path relative to the loaded root,
/// always with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Arc<str>);

impl ImageId {
    pub fn new(relative_path: &str) -> Self {
        Self(Arc::from(relative_path.replace('\\', "/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(relative_path: &str) -> Self {
        Self::new(relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims() {
        let tag = Tag::normalize("  red car \t", CasePolicy::Sensitive).unwrap();
        assert_eq!(tag.as_str(), "red car");
    }

    #[test]
    fn test_normalize_case_policy() {
        let sensitive = Tag::normalize("Cat", CasePolicy::Sensitive).unwrap();
        assert_eq!(sensitive.as_str(), "Cat");
        assert_ne!(sensitive, Tag::normalize("cat", CasePolicy::Sensitive).unwrap());

        let folded = Tag::normalize("Cat", CasePolicy::Insensitive).unwrap();
        assert_eq!(folded, Tag::normalize("cAT", CasePolicy::Insensitive).unwrap());
        assert_eq!(folded.as_str(), "cat");
    }

    #[test]
    fn test_normalize_rejects_blank_and_separators() {
        for raw in ["", "   ", "\t\n", "a,b", "line\nbreak"] {
            let err = Tag::normalize(raw, CasePolicy::Sensitive).unwrap_err();
            assert!(matches!(err, Error::InvalidTag(_)), "{raw:?} should be invalid");
        }
    }

    #[test]
    fn test_image_id_uses_forward_slashes() {
        assert_eq!(ImageId::new("sub\\dir\\a.jpg").as_str(), "sub/dir/a.jpg");
        assert_eq!(ImageId::from("a.jpg").to_string(), "a.jpg");
    }

    #[test]
    fn test_serde_as_plain_strings() {
        let tag = Tag::normalize("blue sky", CasePolicy::Sensitive).unwrap();
        let id = ImageId::new("sub/a.jpg");
        let json = serde_json::to_string(&(&tag, &id)).unwrap();
        assert_eq!(json, r#"["blue sky","sub/a.jpg"]"#);

        let (tag_back, id_back): (Tag, ImageId) = serde_json::from_str(&json).unwrap();
        assert_eq!(tag_back, tag);
        assert_eq!(id_back, id);
    }
}
