use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::open_library;
use crate::config::LoadOptions;
use crate::index::FilterQuery;

/// Info about an image for display purposes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub tags: Vec<String>,
    pub sidecar: bool,
}

/// Options for filtering the image list
#[derive(Debug, Default)]
pub struct ListOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Each entry is one comma-separated any-of group
    pub any: Vec<String>,
    pub load: LoadOptions,
}

impl ListOptions {
    fn query(&self) -> FilterQuery {
        self.any.iter().fold(
            FilterQuery::all_of(self.include.iter().cloned()).exclude(self.exclude.iter().cloned()),
            |query, group| query.any(group.split(',').map(str::to_string)),
        )
    }
}

/// List images from the library matching the filter, sorted by path
pub fn run_list(library_path: &Path, options: ListOptions) -> Result<Vec<FileInfo>> {
    let mut library = open_library(library_path, &options.load)?;
    library.set_filter(options.query());

    let result = library
        .visible_images()
        .into_iter()
        .map(|record| FileInfo {
            path: record.id.to_string(),
            tags: library
                .tags_of(&record.id)
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect(),
            sidecar: record.sidecar_exists,
        })
        .collect();

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_library() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let lib_path = temp_dir.path();

        fs::write(lib_path.join("photo1.jpg"), "fake jpeg").unwrap();
        fs::write(lib_path.join("photo1.txt"), "portrait, outdoor").unwrap();
        fs::write(lib_path.join("photo2.jpg"), "fake jpeg").unwrap();
        fs::write(lib_path.join("photo2.txt"), "portrait").unwrap();
        fs::write(lib_path.join("photo3.jpg"), "fake jpeg").unwrap();

        temp_dir
    }

    fn paths(files: &[FileInfo]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_list_all_files() {
        let temp_dir = setup_test_library();
        let files = run_list(temp_dir.path(), ListOptions::default()).unwrap();
        assert_eq!(paths(&files), vec!["photo1.jpg", "photo2.jpg", "photo3.jpg"]);
        assert!(!files[2].sidecar);
    }

    #[test]
    fn test_list_include_exclude() {
        let temp_dir = setup_test_library();
        let files = run_list(
            temp_dir.path(),
            ListOptions {
                include: vec!["portrait".to_string()],
                exclude: vec!["outdoor".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paths(&files), vec!["photo2.jpg"]);
        assert_eq!(files[0].tags, vec!["portrait"]);
    }

    #[test]
    fn test_list_any_group() {
        let temp_dir = setup_test_library();
        let files = run_list(
            temp_dir.path(),
            ListOptions {
                any: vec!["outdoor, studio".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paths(&files), vec!["photo1.jpg"]);
    }

    #[test]
    fn test_list_nonexistent_library_errors() {
        let result = run_list(Path::new("/nonexistent/library"), ListOptions::default());
        assert!(result.is_err());
    }
}
