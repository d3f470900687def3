use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::open_library;
use crate::config::LoadOptions;

/// Ordering of the tag listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TagSort {
    /// Most used first, ties alphabetical
    #[default]
    Count,
    /// Alphabetical
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStat {
    pub tag: String,
    pub count: usize,
}

/// List every tag in the library with the number of images carrying it
pub fn run_tags(library_path: &Path, sort: TagSort, load: &LoadOptions) -> Result<Vec<TagStat>> {
    let library = open_library(library_path, load)?;

    let mut stats: Vec<TagStat> = library
        .tag_counts()
        .into_iter()
        .map(|(tag, count)| TagStat {
            tag: tag.to_string(),
            count,
        })
        .collect();
    if sort == TagSort::Name {
        stats.sort_by(|a, b| a.tag.cmp(&b.tag));
    }

    Ok(stats)
}
