//! Marker files keyed by session id.
//!
//! ```text
//! <sessions>/
//! ├─ <id>.zip                 # live session archive
//! ├─ <id>.tombstone           # deleted locally, deletion not yet on remote
//! ├─ tmp/                     # staging for remote downloads
//! └─ unreadable/<id>.zip      # remote content that could not be read
//! ```
//!
//! Files whose stem is not a UUID are ignored.

use crate::archive::write_atomic;
use crate::error::StoreResult;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;
use uuid::Uuid;

/// A directory of `<id><suffix>` marker files.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    dir: PathBuf,
    suffix: &'static str,
}

impl MarkerSet {
    /// Creates a marker set for files ending in `suffix` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, suffix: &'static str) -> Self {
        Self {
            dir: dir.into(),
            suffix,
        }
    }

    /// Directory holding the markers.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker for `id`.
    pub fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}{}", self.suffix))
    }

    /// Returns true if a marker exists for `id`.
    pub fn contains(&self, id: Uuid) -> bool {
        self.path(id).is_file()
    }

    /// Scans the directory. A missing directory yields an empty set.
    pub fn ids(&self) -> StoreResult<HashSet<Uuid>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = HashSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match name
                .strip_suffix(self.suffix)
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                Some(id) => {
                    ids.insert(id);
                }
                None => trace!(file = name, "ignoring file without a session id"),
            }
        }
        Ok(ids)
    }

    /// Writes a marker holding `content`.
    pub fn mark(&self, id: Uuid, content: &[u8]) -> StoreResult<PathBuf> {
        let path = self.path(id);
        write_atomic(&path, content)?;
        Ok(path)
    }

    /// Turns the file at `from` into the marker for `id`.
    pub fn mark_by_move(&self, id: Uuid, from: &Path) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(id);
        fs::rename(from, &path)?;
        Ok(path)
    }

    /// Moves a file whose name is not a session id into the directory,
    /// keeping its name. Such files are not reported by [`ids`](Self::ids).
    pub fn adopt(&self, from: &Path) -> StoreResult<PathBuf> {
        let name = from.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "marker source has no file name")
        })?;
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::rename(from, &path)?;
        Ok(path)
    }

    /// Removes the marker for `id`. Returns false if there was none.
    pub fn remove(&self, id: Uuid) -> StoreResult<bool> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let markers = MarkerSet::new(dir.path(), ".tombstone");
        let id = Uuid::new_v4();

        markers.mark(id, b"").unwrap();
        fs::write(dir.path().join("notes.tombstone"), b"").unwrap();
        fs::write(dir.path().join(format!("{id}.zip")), b"").unwrap();
        fs::create_dir(dir.path().join(format!("{}.tombstone", Uuid::new_v4()))).unwrap();

        assert_eq!(markers.ids().unwrap(), HashSet::from([id]));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let markers = MarkerSet::new(dir.path().join("unreadable"), ".zip");
        assert!(markers.ids().unwrap().is_empty());
        assert!(!markers.remove(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn move_and_remove() {
        let dir = tempdir().unwrap();
        let markers = MarkerSet::new(dir.path().join("unreadable"), ".zip");
        let id = Uuid::new_v4();
        let source = dir.path().join("source.zip");
        fs::write(&source, b"data").unwrap();

        let path = markers.mark_by_move(id, &source).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(path).unwrap(), b"data");
        assert!(markers.contains(id));

        assert!(markers.remove(id).unwrap());
        assert!(!markers.contains(id));
    }

    #[test]
    fn adopted_files_keep_their_name() {
        let dir = tempdir().unwrap();
        let markers = MarkerSet::new(dir.path().join("unreadable"), ".zip");
        let source = dir.path().join("notes.zip");
        fs::write(&source, b"junk").unwrap();

        let path = markers.adopt(&source).unwrap();

        assert_eq!(path, dir.path().join("unreadable").join("notes.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"junk");
        assert!(!source.exists());
        assert!(markers.ids().unwrap().is_empty());
    }
}
