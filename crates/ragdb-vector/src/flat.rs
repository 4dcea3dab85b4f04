//! Exhaustive squared-L2 index held in memory and mirrored to two paired artifacts.
//!
//! Search is O(N·D) per query. `store` holds the write lock across validation,
//! artifact writes and the in-memory append, so concurrent stores against the
//! same index are serialized; searches share the read lock.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use ragdb_core::traits::VectorIndex;
use ragdb_core::types::{squared_l2, IndexEntry, SearchHit};
use ragdb_core::{Error, Result};

use crate::persist::{self, TableRow};

#[derive(Debug, Default)]
struct FlatState {
    dim: Option<usize>,
    rows: Vec<TableRow>,
    data: Vec<f32>,
    by_id: HashMap<String, usize>,
}

impl FlatState {
    fn vector(&self, pos: usize, dim: usize) -> &[f32] {
        &self.data[pos * dim..(pos + 1) * dim]
    }
}

pub struct FlatIndex {
    dir: Option<PathBuf>,
    state: RwLock<FlatState>,
    /// Set when the artifacts could not be opened; every operation reports it.
    unavailable: Option<String>,
}

impl FlatIndex {
    /// An index that lives only in memory.
    pub fn in_memory() -> Self {
        Self { dir: None, state: RwLock::new(FlatState::default()), unavailable: None }
    }

    /// Opens (or creates) a persisted index in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::unavailable(format!("creating {}: {e}", dir.display())))?;
        let mut state = FlatState::default();
        if let Some(artifacts) = persist::read(&dir)? {
            if !artifacts.rows.is_empty() {
                state.dim = Some(artifacts.dim);
            }
            state.by_id = artifacts.rows.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();
            state.rows = artifacts.rows;
            state.data = artifacts.data;
            info!(entries = state.rows.len(), dim = ?state.dim, "Opened flat index at {}", dir.display());
        }
        Ok(Self { dir: Some(dir), state: RwLock::new(state), unavailable: None })
    }

    /// Like [`FlatIndex::open`], but a missing or corrupt index yields a handle
    /// whose operations fail with `IndexUnavailable` instead of an error here.
    pub fn open_or_unavailable(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match Self::open(&dir) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Flat index at {} is unavailable", dir.display());
                let reason = match e {
                    Error::IndexUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                Self { dir: Some(dir), state: RwLock::new(FlatState::default()), unavailable: Some(reason) }
            }
        }
    }

    fn check_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(Error::unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Chunk text stored under `id`.
    pub async fn get_text(&self, id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.by_id.get(id).map(|&pos| state.rows[pos].text.clone())
    }
}

/// Validates a batch against the current state. Returns the entries that are
/// new; entries whose id already maps to the same text are skipped.
fn validate<'a>(state: &FlatState, entries: &'a [IndexEntry]) -> Result<(usize, Vec<&'a IndexEntry>)> {
    let dim = state.dim.unwrap_or_else(|| entries[0].vector.len());
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut fresh = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.vector.is_empty() || entry.vector.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: entry.vector.len() });
        }
        let existing = state.by_id.get(&entry.id).map(|&pos| state.rows[pos].text.as_str());
        match existing.or_else(|| seen.get(entry.id.as_str()).copied()) {
            Some(text) if text == entry.chunk_text => continue,
            Some(_) => return Err(Error::IdConflict(format!("id '{}' already maps to different text", entry.id))),
            None => {
                seen.insert(&entry.id, &entry.chunk_text);
                fresh.push(entry);
            }
        }
    }
    Ok((dim, fresh))
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn name(&self) -> &str { "local:flat-l2" }

    async fn store(&self, entries: &[IndexEntry]) -> Result<()> {
        self.check_available()?;
        if entries.is_empty() {
            return Ok(());
        }
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let (dim, fresh) = validate(state, entries)?;
        if fresh.is_empty() {
            debug!("store: all {} entries already present", entries.len());
            return Ok(());
        }

        let prev_rows = state.rows.len();
        let prev_data = state.data.len();
        for entry in &fresh {
            state.rows.push(TableRow { id: entry.id.clone(), text: entry.chunk_text.clone() });
            state.data.extend_from_slice(&entry.vector);
        }
        if let Some(dir) = &self.dir {
            if let Err(e) = persist::write(dir, dim, &state.rows, &state.data) {
                state.rows.truncate(prev_rows);
                state.data.truncate(prev_data);
                return Err(e);
            }
        }
        for (pos, row) in state.rows.iter().enumerate().skip(prev_rows) {
            state.by_id.insert(row.id.clone(), pos);
        }
        state.dim = Some(dim);
        info!(added = fresh.len(), total = state.rows.len(), dim, "Stored entries in flat index");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_available()?;
        let state = self.state.read().await;
        let Some(dim) = state.dim else { return Ok(vec![]) };
        if k == 0 {
            return Ok(vec![]);
        }
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        let mut scored: Vec<(usize, f32)> = (0..state.rows.len())
            .map(|pos| (pos, squared_l2(query, state.vector(pos, dim))))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(pos, distance)| SearchHit {
                id: state.rows[pos].id.clone(),
                text: state.rows[pos].text.clone(),
                distance,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        self.check_available()?;
        Ok(self.state.read().await.rows.len())
    }

    async fn dim(&self) -> Option<usize> {
        self.state.read().await.dim
    }
}
