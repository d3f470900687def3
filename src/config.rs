//! Load-time configuration.
//!
//! A [`LoadOptions`] is fixed for the lifetime of a loaded directory: the
//! case policy in particular decides tag identity, so changing it means
//! reloading.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Image extensions recognised by default (compared lowercase).
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// Extension of the sidecar tag file.
pub const SIDECAR_EXTENSION: &str = "txt";

/// How tag strings are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    /// "Cat" and "cat" are different tags; case is preserved.
    #[default]
    Sensitive,
    /// Tags are folded to lowercase when normalized.
    Insensitive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub case_policy: CasePolicy,
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub include_hidden: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            case_policy: CasePolicy::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: true,
            include_hidden: false,
        }
    }
}

impl LoadOptions {
    /// Replace the extension allow-list. Leading dots and case are ignored.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_case_policy(mut self, case_policy: CasePolicy) -> Self {
        self.case_policy = case_policy;
        self
    }

    /// Check whether a path carries an allowed image extension
    pub fn is_image(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        ext != SIDECAR_EXTENSION && self.extensions.iter().any(|e| *e == ext)
    }
}
