use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::snapshot::Snapshot;
use crate::store::{Manifest, SnapshotStore};
use tutor_core::{Error, Result};

const MAX_LOAD_ATTEMPTS: usize = 5;

/// A snapshot as it was read from disk, with the commit it came from.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub manifest: Manifest,
    pub modified: Option<SystemTime>,
}

/// Process-wide view of the committed index.
///
/// Readers take an `Arc` to the current snapshot and keep using it for the
/// whole request; a reload builds a complete replacement and swaps the
/// reference, so no reader ever sees a half-loaded index.
#[derive(Debug)]
pub struct IndexHandle {
    store: SnapshotStore,
    current: RwLock<Option<Arc<LoadedSnapshot>>>,
}

impl IndexHandle {
    pub fn new(store: SnapshotStore) -> Self { Self { store, current: RwLock::new(None) } }

    pub fn open(index_dir: impl Into<PathBuf>) -> Self { Self::new(SnapshotStore::new(index_dir)) }

    pub fn store(&self) -> &SnapshotStore { &self.store }

    /// Whatever is loaded right now, without touching the disk.
    pub fn current(&self) -> Option<Arc<LoadedSnapshot>> { self.current.read().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Load the committed snapshot if nothing is loaded, if `force` is set, or
    /// if the commit on disk differs from (or is newer than) the loaded one.
    ///
    /// A forced load always installs what it read. An unforced load never
    /// replaces a snapshot with a higher commit sequence, so a slow reader
    /// cannot undo a newer swap made by another caller.
    pub fn ensure_loaded(&self, force: bool) -> Result<Arc<LoadedSnapshot>> {
        let mut attempts = 0;
        loop {
            let manifest = self.store.read_manifest()?.ok_or_else(|| Error::IndexMissing(self.store.root().to_path_buf()))?;
            let modified = self.store.manifest_modified();
            if !force {
                if let Some(loaded) = self.current() {
                    let newer_on_disk = matches!((modified, loaded.modified), (Some(disk), Some(mem)) if disk > mem);
                    if loaded.manifest.generation == manifest.generation && !newer_on_disk {
                        return Ok(loaded);
                    }
                }
            }
            let snapshot = match self.store.load(&manifest) {
                Ok(s) => s,
                Err(e) => {
                    // the generation may have been pruned by a concurrent commit
                    let moved_on = self.store.read_manifest().ok().flatten().is_some_and(|m| m.generation != manifest.generation);
                    attempts += 1;
                    if moved_on && attempts < MAX_LOAD_ATTEMPTS {
                        debug!(generation = %manifest.generation, error = %e, "generation replaced while loading; retrying");
                        continue;
                    }
                    return Err(e);
                }
            };
            return Ok(self.swap(LoadedSnapshot { snapshot, manifest, modified }, force));
        }
    }

    fn swap(&self, loaded: LoadedSnapshot, force: bool) -> Arc<LoadedSnapshot> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref().filter(|_| !force) {
            if existing.manifest.sequence > loaded.manifest.sequence {
                return Arc::clone(existing);
            }
        }
        let loaded = Arc::new(loaded);
        let previous = slot.replace(Arc::clone(&loaded));
        drop(slot);
        info!(
            generation = %loaded.manifest.generation,
            sequence = loaded.manifest.sequence,
            previous = previous.as_ref().map(|p| p.manifest.generation.as_str()),
            rows = loaded.snapshot.len(),
            force,
            "index loaded"
        );
        loaded
    }

    pub fn reload(&self) -> Result<Arc<LoadedSnapshot>> { self.ensure_loaded(true) }
}
