pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod library;
pub mod loader;
pub mod logging;
pub mod scanner;
pub mod sidecar;

pub use catalog::{BatchOutcome, Catalog, ImageRecord, SyncStats};
pub use config::{CasePolicy, LoadOptions};
pub use error::{Error, Result};
pub use index::{FilterQuery, ImageId, Tag, TagIndex};
pub use library::Library;
pub use loader::{load_directory, LoadControl, LoadProgress, LoadTask};
