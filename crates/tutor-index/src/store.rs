//! Generation directories under the index root, published by atomically
//! replacing the `CURRENT` manifest.
//!
//! ```text
//! <index_dir>/CURRENT                     {"generation": ..., "rows": ..., ...}
//! <index_dir>/gen-<timestamp>/vectors.bin
//! <index_dir>/gen-<timestamp>/meta.jsonl
//! ```
//!
//! A generation is never modified after it is written. Readers resolve
//! `CURRENT` first, so they see either the old pair of files or the new pair.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::snapshot::{Snapshot, META_FILE, VECTORS_FILE};
use tutor_core::{Error, Result};

pub const MANIFEST_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generation: String,
    /// One more than the manifest this commit replaced; orders commits
    /// independently of the wall clock behind `generation`.
    #[serde(default)]
    pub sequence: u64,
    pub rows: usize,
    pub dim: usize,
    pub embedder_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn manifest_path(&self) -> PathBuf { self.root.join(MANIFEST_FILE) }

    fn generation_dir(&self, generation: &str) -> PathBuf { self.root.join(generation) }

    /// The committed manifest, or `None` when nothing has been committed yet.
    pub fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| Error::CorruptSnapshot(format!("{}: {e}", path.display())))
    }

    pub fn manifest_modified(&self) -> Option<SystemTime> { fs::metadata(self.manifest_path()).and_then(|m| m.modified()).ok() }

    pub fn load(&self, manifest: &Manifest) -> Result<Snapshot> {
        let dir = self.generation_dir(&manifest.generation);
        let open = |name: &str| File::open(dir.join(name)).map_err(|e| Error::CorruptSnapshot(format!("{}/{name}: {e}", manifest.generation)));
        let mut vectors = BufReader::new(open(VECTORS_FILE)?);
        let meta = BufReader::new(open(META_FILE)?);
        let snapshot = Snapshot::read_expecting(&mut vectors, meta, manifest.rows, manifest.dim)
            .map_err(|e| match e {
                Error::CorruptSnapshot(msg) => Error::CorruptSnapshot(format!("generation {}: {msg}", manifest.generation)),
                other => other,
            })?;
        debug!(generation = %manifest.generation, rows = snapshot.len(), "snapshot read");
        Ok(snapshot)
    }

    /// The committed snapshot, or `IndexMissing` when there is none.
    pub fn load_current(&self) -> Result<(Manifest, Snapshot)> {
        let manifest = self.read_manifest()?.ok_or_else(|| Error::IndexMissing(self.root.clone()))?;
        let snapshot = self.load(&manifest)?;
        Ok((manifest, snapshot))
    }

    /// Write `snapshot` as a new generation and publish it.
    ///
    /// Both data files are synced before the manifest is swapped in, and the
    /// previously published generation is kept for readers still opening it.
    pub fn commit(&self, snapshot: &Snapshot, embedder_id: &str) -> Result<Manifest> {
        fs::create_dir_all(&self.root)?;
        let previous = self.read_manifest().ok().flatten();
        let (generation, dir) = self.fresh_generation_dir()?;

        write_synced(&dir.join(VECTORS_FILE), |w| snapshot.write_vectors(w))?;
        write_synced(&dir.join(META_FILE), |w| snapshot.write_meta(w))?;

        let manifest = Manifest {
            generation: generation.clone(),
            sequence: previous.as_ref().map_or(1, |m| m.sequence + 1),
            rows: snapshot.len(),
            dim: snapshot.dim(),
            embedder_id: embedder_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &manifest)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.manifest_path()).map_err(|e| Error::Io(e.error))?;
        info!(generation = %generation, sequence = manifest.sequence, rows = manifest.rows, dim = manifest.dim, "snapshot committed");

        let mut keep = vec![generation];
        keep.extend(previous.map(|m| m.generation));
        self.prune(&keep);
        Ok(manifest)
    }

    fn fresh_generation_dir(&self) -> Result<(String, PathBuf)> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string().replace('.', "");
        let mut generation = format!("{GENERATION_PREFIX}{stamp}");
        let mut n = 1;
        while self.generation_dir(&generation).exists() {
            generation = format!("{GENERATION_PREFIX}{stamp}-{n:03}");
            n += 1;
        }
        let dir = self.generation_dir(&generation);
        fs::create_dir_all(&dir)?;
        Ok((generation, dir))
    }

    /// Remove generation directories other than `keep`. Failures only warn.
    fn prune(&self, keep: &[String]) {
        let Ok(entries) = fs::read_dir(&self.root) else { return };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(GENERATION_PREFIX) || keep.contains(&name) || !entry.path().is_dir() { continue; }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => debug!(generation = %name, "pruned"),
                Err(e) => warn!(generation = %name, error = %e, "prune failed"),
            }
        }
    }
}

fn write_synced<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut w = BufWriter::new(File::create(path)?);
    write(&mut w)?;
    let file = w.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
