//! Blocking document I/O under advisory locks

use super::lock::{FileLock, LockMode};
use super::{Document, Mapping};
use crate::error::{Result, StoreError};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Read the whole document under a shared lock
pub(super) fn read(document: Document, path: &Path) -> Result<Mapping> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
        Err(e) => return Err(e.into()),
    };

    let _lock = FileLock::acquire(&file, LockMode::Shared).map_err(|e| lock_error(document, e))?;
    parse(document, &file)
}

/// Replace the whole document under an exclusive lock
pub(super) fn write(document: Document, path: &Path, data: &Mapping) -> Result<()> {
    let file = open_for_write(path)?;
    let _lock =
        FileLock::acquire(&file, LockMode::Exclusive).map_err(|e| lock_error(document, e))?;
    replace_contents(&file, data)
}

/// Read, mutate and write back while holding one exclusive lock
///
/// Nothing is written when `mutate` fails.
pub(super) fn update<R>(
    document: Document,
    path: &Path,
    mutate: impl FnOnce(&mut Mapping) -> Result<R>,
) -> Result<R> {
    let file = open_for_write(path)?;
    let _lock =
        FileLock::acquire(&file, LockMode::Exclusive).map_err(|e| lock_error(document, e))?;

    let mut data = parse(document, &file)?;
    let result = mutate(&mut data)?;
    replace_contents(&file, &data)?;
    Ok(result)
}

// Opened without truncation: the old content must survive until the lock is held.
fn open_for_write(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

fn parse(document: Document, mut file: &File) -> Result<Mapping> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_json::from_str::<serde_json::Value>(&contents) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupted {
            document: document.name().to_string(),
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }
        .into()),
        Err(e) => Err(StoreError::Corrupted {
            document: document.name().to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

fn replace_contents(mut file: &File, data: &Mapping) -> Result<()> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    data.serialize(&mut serializer)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&buf)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

fn lock_error(document: Document, error: io::Error) -> crate::Error {
    StoreError::Lock {
        document: document.name().to_string(),
        reason: error.to_string(),
    }
    .into()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
