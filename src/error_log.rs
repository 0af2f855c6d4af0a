use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    History,
    Clipboard,
}

#[derive(Clone, Debug)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Local>,
    pub source: ErrorSource,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn new(source: ErrorSource, message: impl Into<String>) -> Self {
        ErrorLogEntry {
            timestamp: Local::now(),
            source,
            message: message.into(),
        }
    }
}

/// Append-only JSON-lines log for failures the terminal cannot print.
#[derive(Clone, Debug)]
pub struct ErrorLogStore {
    path: PathBuf,
}

impl ErrorLogStore {
    pub fn new(path: PathBuf) -> Self {
        ErrorLogStore { path }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        ErrorLogStore::new(dir.as_ref().join("error_logs.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_message(&self, source: ErrorSource, message: impl Into<String>) -> Result<()> {
        self.append(&ErrorLogEntry::new(source, message))
    }

    fn append(&self, entry: &ErrorLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("cannot open {}", self.path.display()))?;
        serde_json::to_writer(&mut file, &StoredErrorLogEntry::from(entry))?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredErrorLogEntry {
    timestamp_ms: i64,
    source: ErrorSource,
    message: String,
}

impl From<&ErrorLogEntry> for StoredErrorLogEntry {
    fn from(entry: &ErrorLogEntry) -> Self {
        StoredErrorLogEntry {
            timestamp_ms: entry.timestamp.timestamp_millis(),
            source: entry.source,
            message: entry.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = std::env::temp_dir().join(format!("trade-calc-log-{}", rand::random::<u64>()));
        let store = ErrorLogStore::in_dir(&dir);
        store
            .append_message(ErrorSource::History, "slot unreadable")
            .expect("append");
        store
            .append_message(ErrorSource::Clipboard, "no display")
            .expect("append");
        let contents = fs::read_to_string(store.path()).expect("read log");
        let lines: Vec<StoredErrorLogEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].source, ErrorSource::History);
        assert_eq!(lines[1].message, "no display");
        let _ = fs::remove_dir_all(&dir);
    }
}
