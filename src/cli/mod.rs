mod list;
mod tag;
mod tags;

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::LoadOptions;
use crate::library::Library;

pub use list::{run_list, FileInfo, ListOptions};
pub use tag::{run_tag, FrequencyOrder, TagOptions, TagReport};
pub use tags::{run_tags, TagSort, TagStat};

/// Load a library in the background while showing a spinner with progress.
pub fn open_library(library_path: &Path, options: &LoadOptions) -> Result<Library> {
    let mut library = Library::new(options.clone());
    let mut task = library.spawn_load(library_path.to_path_buf());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Scanning {}...", task.root().display()));

    let catalog = loop {
        if let Some(result) = task.poll() {
            break result;
        }
        let progress = task.progress();
        if progress.total > 0 {
            spinner.set_message(format!(
                "Reading sidecars... {}/{}",
                progress.processed, progress.total
            ));
        }
        thread::sleep(Duration::from_millis(20));
    };
    spinner.finish_and_clear();

    let catalog =
        catalog.with_context(|| format!("Failed to load library at {}", library_path.display()))?;
    library.install(catalog);
    Ok(library)
}
