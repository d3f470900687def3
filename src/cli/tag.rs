use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use super::open_library;
use crate::config::LoadOptions;
use crate::index::ImageId;

/// Reordering applied after the edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FrequencyOrder {
    /// Most used tags first
    High,
    /// Least used tags first
    Low,
}

/// Options for the tag command
#[derive(Debug, Default)]
pub struct TagOptions {
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub sort: Option<FrequencyOrder>,
    pub load: LoadOptions,
}

/// Outcome of the tag command for one requested file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagReport {
    pub path: String,
    /// Tags after all edits (empty if the file is not in the library)
    pub tags: Vec<String>,
    pub errors: Vec<String>,
}

impl TagReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Add and remove tags on a set of images.
///
/// Each edit is applied to every file in turn; a failure on one file is
/// recorded in its report and does not stop the others.
pub fn run_tag(library_path: &Path, files: &[PathBuf], options: TagOptions) -> Result<Vec<TagReport>> {
    let mut library = open_library(library_path, &options.load)?;

    let mut ids: Vec<ImageId> = Vec::new();
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut order: Vec<(String, Option<ImageId>)> = Vec::new();

    for file in files {
        let display = file.to_string_lossy().to_string();
        match library.resolve(file) {
            Some(id) => {
                ids.push(id.clone());
                order.push((id.to_string(), Some(id)));
            }
            None => {
                errors
                    .entry(display.clone())
                    .or_default()
                    .push("not found in library".to_string());
                order.push((display, None));
            }
        }
    }

    for tag in &options.add {
        for outcome in library.add_tag_to_many(&ids, tag) {
            if let Err(err) = outcome.result {
                errors.entry(outcome.image.to_string()).or_default().push(err.to_string());
            }
        }
    }
    for tag in &options.remove {
        for outcome in library.remove_tag_from_many(&ids, tag) {
            if let Err(err) = outcome.result {
                errors.entry(outcome.image.to_string()).or_default().push(err.to_string());
            }
        }
    }

    if let Some(sort) = options.sort {
        for id in &ids {
            if let Err(err) = library.sort_tags_by_frequency(id, sort == FrequencyOrder::High) {
                errors.entry(id.to_string()).or_default().push(err.to_string());
            }
        }
    }

    let reports = order
        .into_iter()
        .map(|(path, id)| {
            let tags: Vec<String> = id
                .and_then(|id| library.tags_of(&id))
                .map(|tags| tags.iter().map(ToString::to_string).collect())
                .unwrap_or_default();
            TagReport {
                errors: errors.get(&path).cloned().unwrap_or_default(),
                path,
                tags,
            }
        })
        .collect();

    Ok(reports)
}
