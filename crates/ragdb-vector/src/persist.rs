//! On-disk layout of a local flat index.
//!
//! Two artifacts per index directory:
//! - `vectors.bin`: bincode blob with the dimension, the row count, the blake3
//!   digest of the chunk table and all vectors row-major in insertion order
//! - `chunks.json`: JSON array of `{ id, text }`; row `i` pairs with vector `i`
//!
//! Both are written to temp files and renamed into place, table first. A crash
//! between the two renames leaves a blob whose digest no longer matches the
//! table, which [`read`] reports as `IndexUnavailable`.

use std::fs;
use std::io::Write;
use std::path::Path;

use ragdb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct VectorBlob {
    format_version: u32,
    dim: u64,
    count: u64,
    table_digest: String,
    data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: String,
    pub text: String,
}

#[derive(Debug)]
pub struct Artifacts {
    pub dim: usize,
    pub rows: Vec<TableRow>,
    pub data: Vec<f32>,
}

fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Replaces both artifacts in `dir` with the given rows and vectors.
pub fn write(dir: &Path, dim: usize, rows: &[TableRow], data: &[f32]) -> Result<()> {
    let table = serde_json::to_vec(rows).map_err(|e| Error::unavailable(format!("encoding chunk table: {e}")))?;
    let blob = VectorBlob {
        format_version: FORMAT_VERSION,
        dim: dim as u64,
        count: rows.len() as u64,
        table_digest: digest(&table),
        data: data.to_vec(),
    };
    let blob = bincode::serialize(&blob).map_err(|e| Error::unavailable(format!("encoding vector blob: {e}")))?;
    write_atomic(dir, CHUNKS_FILE, &table)?;
    write_atomic(dir, VECTORS_FILE, &blob)?;
    Ok(())
}

/// Reads and cross-checks both artifacts. `Ok(None)` when neither exists.
pub fn read(dir: &Path) -> Result<Option<Artifacts>> {
    let vectors_path = dir.join(VECTORS_FILE);
    let chunks_path = dir.join(CHUNKS_FILE);
    match (vectors_path.exists(), chunks_path.exists()) {
        (false, false) => return Ok(None),
        (true, false) => return Err(Error::unavailable(format!("{} exists without {}", VECTORS_FILE, CHUNKS_FILE))),
        (false, true) => return Err(Error::unavailable(format!("{} exists without {}", CHUNKS_FILE, VECTORS_FILE))),
        (true, true) => {}
    }

    let unreadable = |what: &str, e: &dyn std::fmt::Display| Error::unavailable(format!("reading {what}: {e}"));
    let table = fs::read(&chunks_path).map_err(|e| unreadable(CHUNKS_FILE, &e))?;
    let blob = fs::read(&vectors_path).map_err(|e| unreadable(VECTORS_FILE, &e))?;
    let blob: VectorBlob = bincode::deserialize(&blob).map_err(|e| unreadable(VECTORS_FILE, &e))?;
    let rows: Vec<TableRow> = serde_json::from_slice(&table).map_err(|e| unreadable(CHUNKS_FILE, &e))?;

    if blob.format_version != FORMAT_VERSION {
        return Err(Error::unavailable(format!("unsupported index format version {}", blob.format_version)));
    }
    if blob.table_digest != digest(&table) {
        return Err(Error::unavailable("chunk table does not match vector blob (interrupted write?)"));
    }
    let dim = usize::try_from(blob.dim).map_err(|e| unreadable(VECTORS_FILE, &e))?;
    let count = usize::try_from(blob.count).map_err(|e| unreadable(VECTORS_FILE, &e))?;
    if count != rows.len() || blob.data.len() != dim * count {
        return Err(Error::unavailable(format!(
            "artifact sizes disagree: {} rows, {} vectors of dim {}, {} floats",
            rows.len(), count, dim, blob.data.len()
        )));
    }
    Ok(Some(Artifacts { dim, rows, data: blob.data }))
}
