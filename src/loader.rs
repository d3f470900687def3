//! Directory loading.
//!
//! [`load_directory`] scans a root, reads every sidecar (in parallel) and
//! builds a fresh [`Catalog`] in one pass. [`LoadTask`] runs the same thing
//! on a worker thread so a large directory does not block the caller, with
//! progress counters and cancellation shared through atomics.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{read_record, Catalog, ImageRecord};
use crate::config::LoadOptions;
use crate::error::{Error, Result};
use crate::index::TagIndex;
use crate::scanner::{ScannedImage, Scanner};

/// Snapshot of a running load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Sidecars read so far
    pub processed: usize,
    /// Images found by the scan; zero until scanning finishes
    pub total: usize,
}

/// Shared cancellation flag and progress counters for a load
#[derive(Debug, Clone, Default)]
pub struct LoadControl {
    cancelled: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl LoadControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> LoadProgress {
        LoadProgress {
            processed: self.processed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Scan `root` and build a catalog of its images and their tags.
///
/// Unreadable sidecars are logged and loaded as untagged; only a bad root or
/// cancellation fails the load. A cancelled load returns `Error::Cancelled`
/// and everything read so far is dropped.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn load_directory(root: &Path, options: &LoadOptions, control: &LoadControl) -> Result<Catalog> {
    let root = root.canonicalize().map_err(|e| Error::io(root, e))?;

    info!("scanning images");
    let scanned = Scanner::new(root.clone(), options.clone())
        .with_control(control.clone())
        .scan_images()?;
    control.check()?;
    control.total.store(scanned.len(), Ordering::Relaxed);
    info!(count = scanned.len(), "images scanned");

    warn_shared_sidecars(&scanned);

    let loaded: Vec<(ImageRecord, Vec<String>)> = scanned
        .into_par_iter()
        .map(|image| -> Result<(ImageRecord, Vec<String>)> {
            control.check()?;
            let loaded = read_record(image);
            control.processed.fetch_add(1, Ordering::Relaxed);
            Ok(loaded)
        })
        .collect::<Result<_>>()?;
    control.check()?;

    let mut records = BTreeMap::new();
    let mut entries = Vec::with_capacity(loaded.len());
    for (record, tags) in loaded {
        entries.push((record.id.clone(), tags));
        records.insert(record.id.clone(), record);
    }
    let index = TagIndex::from_entries(options.case_policy, entries);

    info!(
        images = records.len(),
        tags = index.all_tags().len(),
        "load complete"
    );
    Ok(Catalog::new(root, options.clone(), records, index))
}

fn warn_shared_sidecars(scanned: &[ScannedImage]) {
    let mut by_sidecar: HashMap<&Path, Vec<&str>> = HashMap::new();
    for image in scanned {
        by_sidecar
            .entry(image.sidecar_path.as_path())
            .or_default()
            .push(image.relative_path.as_str());
    }
    for (sidecar, images) in by_sidecar {
        if images.len() > 1 {
            warn!(
                sidecar = %sidecar.display(),
                images = ?images,
                "several images share one sidecar; edits to one apply to all"
            );
        }
    }
}

/// A directory load running on a background thread.
///
/// Dropping the task without waiting cancels it.
pub struct LoadTask {
    root: PathBuf,
    control: LoadControl,
    result_rx: Option<Receiver<Result<Catalog>>>,
    handle: Option<JoinHandle<()>>,
}

impl LoadTask {
    pub fn spawn(root: PathBuf, options: LoadOptions) -> Self {
        let control = LoadControl::new();
        let (result_tx, result_rx) = channel();

        let worker_root = root.clone();
        let worker_control = control.clone();
        let handle = thread::spawn(move || {
            let result = load_directory(&worker_root, &options, &worker_control);
            if let Err(Error::Cancelled) = result {
                debug!(root = %worker_root.display(), "load cancelled");
            }
            // The receiver may be gone if the task was dropped
            let _ = result_tx.send(result);
        });

        Self {
            root,
            control,
            result_rx: Some(result_rx),
            handle: Some(handle),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control(&self) -> &LoadControl {
        &self.control
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn progress(&self) -> LoadProgress {
        self.control.progress()
    }

    /// Non-blocking check for the result. Returns `Some` exactly once.
    pub fn poll(&mut self) -> Option<Result<Catalog>> {
        let rx = self.result_rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            // Worker died without reporting
            Err(TryRecvError::Disconnected) => Err(Error::Cancelled),
        };
        self.result_rx = None;
        self.join();
        Some(result)
    }

    /// Block until the load finishes.
    pub fn wait(mut self) -> Result<Catalog> {
        let result = match self.result_rx.take() {
            Some(rx) => rx.recv().unwrap_or(Err(Error::Cancelled)),
            None => Err(Error::Cancelled),
        };
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoadTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.control.cancel();
        }
    }
}
