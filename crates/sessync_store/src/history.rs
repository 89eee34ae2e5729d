//! Journal history: an append-only list of entries stored in the archive.

use crate::archive::{self, HISTORY_ENTRY};
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use sessync_engine::{now_millis, EngineResult, HistoryStrategy, SyncError};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry identifier, unique across replicas.
    pub id: Uuid,
    /// Creation time (epoch millis).
    pub timestamp: i64,
    /// Entry text.
    pub text: String,
}

impl JournalEntry {
    /// Creates an entry with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            text: text.into(),
        }
    }
}

/// Ordered history of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal {
    /// Entries in order.
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a journal from entries.
    pub fn new(entries: Vec<JournalEntry>) -> Self {
        Self { entries }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the journal has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}

/// [`HistoryStrategy`] over a [`Journal`] stored as `history.json`.
///
/// Two journals diverge when their entry id sequences differ. Merging keeps
/// the base entries in order and appends the overlay entries the base does
/// not have. An archive without a history entry holds an empty journal.
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalHistory;

impl JournalHistory {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self
    }

    /// Reads the journal of the archive at `archive`.
    pub fn load(&self, archive: &Path) -> StoreResult<Journal> {
        match archive::read_entry(archive, HISTORY_ENTRY)? {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Ok(Journal::default()),
        }
    }

    /// Decodes the journal held in archive bytes.
    pub fn load_bytes(&self, bytes: &[u8]) -> StoreResult<Journal> {
        match archive::read_entry_from_bytes(bytes, HISTORY_ENTRY)? {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Ok(Journal::default()),
        }
    }

    /// Writes the journal of the archive at `archive`.
    pub fn store(&self, journal: &Journal, archive: &Path) -> StoreResult<()> {
        let data = serde_json::to_vec(journal)?;
        archive::write_entry(archive, HISTORY_ENTRY, &data)
    }

    /// Appends an entry to the journal of the archive at `archive`.
    pub fn append(&self, archive: &Path, entry: JournalEntry) -> StoreResult<Journal> {
        let mut journal = self.load(archive)?;
        journal.push(entry);
        self.store(&journal, archive)?;
        Ok(journal)
    }
}

impl HistoryStrategy for JournalHistory {
    type Snapshot = Journal;

    fn read(&self, archive: &Path) -> EngineResult<Journal> {
        self.load(archive)
            .map_err(|e| SyncError::history(format!("{}: {e}", archive.display())))
    }

    fn write(&self, snapshot: &Journal, archive: &Path) -> EngineResult<()> {
        Ok(self.store(snapshot, archive)?)
    }

    fn diverged(&self, local: &Journal, remote: &Journal) -> bool {
        !local.ids().eq(remote.ids())
    }

    fn merge(&self, base: Journal, overlay: Journal) -> Journal {
        let known: HashSet<Uuid> = base.ids().collect();
        let mut merged = base;
        merged
            .entries
            .extend(overlay.entries.into_iter().filter(|e| !known.contains(&e.id)));
        merged
    }
}
