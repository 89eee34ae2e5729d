//! Session archive format.
//!
//! A session archive is a ZIP file holding at least a `manifest.json` entry
//! with the session's [`SessionInfo`]. Other entries (the history, attached
//! files) are carried through untouched when one entry is replaced.
//!
//! All writes go to a temporary file next to the target and are renamed into
//! place, so readers never observe a partially written archive.

use crate::error::StoreResult;
use sessync_engine::SessionInfo;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive entry holding the session manifest.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Archive entry holding the conversation history.
pub const HISTORY_ENTRY: &str = "history.json";

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn parent_dir(path: &Path) -> io::Result<&Path> {
    path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path has no parent directory: {}", path.display()),
        )
    })
}

/// Replaces the file at `path` with `data` using write-then-rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let dir = parent_dir(path)?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Builds archive bytes from `(name, data)` pairs.
pub fn build_archive(entries: &[(&str, &[u8])]) -> StoreResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, entry_options())?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Reads one entry of the archive at `path`. Returns `None` if the archive
/// has no such entry.
pub fn read_entry(path: &Path, name: &str) -> StoreResult<Option<Vec<u8>>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// Reads one entry from archive bytes held in memory.
pub fn read_entry_from_bytes(bytes: &[u8], name: &str) -> StoreResult<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// Writes one entry of the archive at `path`, creating the archive if it
/// does not exist. Other entries are copied without recompression.
pub fn write_entry(path: &Path, name: &str, data: &[u8]) -> StoreResult<()> {
    let dir = parent_dir(path)?;
    fs::create_dir_all(dir)?;

    let mut writer = ZipWriter::new(NamedTempFile::new_in(dir)?);
    if path.exists() {
        let mut existing = ZipArchive::new(BufReader::new(File::open(path)?))?;
        for index in 0..existing.len() {
            let entry = existing.by_index_raw(index)?;
            if entry.name() == name {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }
    }
    writer.start_file(name, entry_options())?;
    writer.write_all(data)?;

    let temp = writer.finish()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads the manifest of the archive at `path`.
pub fn read_info(path: &Path) -> StoreResult<Option<SessionInfo>> {
    match read_entry(path, MANIFEST_ENTRY)? {
        Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
        None => Ok(None),
    }
}

/// Writes the manifest of the archive at `path`.
pub fn write_info(path: &Path, info: &SessionInfo) -> StoreResult<()> {
    let data = serde_json::to_vec_pretty(info)?;
    write_entry(path, MANIFEST_ENTRY, &data)
}
