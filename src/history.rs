use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, LocalResult, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::calc::Mode;

/// Name of the persisted slot holding the history.
pub const HISTORY_KEY: &str = "trading_calc_history";
pub const MAX_HISTORY: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct CalculationRecord {
    mode: Mode,
    point: f64,
    result: f64,
    created_at: DateTime<Local>,
}

impl CalculationRecord {
    /// Stamps the record with the current time at millisecond precision, the
    /// precision the slot stores.
    pub fn new(mode: Mode, point: f64, result: f64) -> Self {
        CalculationRecord {
            mode,
            point,
            result,
            created_at: Local::now().trunc_subsecs(3),
        }
    }

    /// Rebuilds a record from epoch milliseconds. Out-of-range or ambiguous
    /// timestamps are rejected.
    pub fn from_parts(
        mode: Mode,
        point: f64,
        result: f64,
        timestamp_ms: i64,
    ) -> Result<Self, String> {
        let created_at = match Local.timestamp_millis_opt(timestamp_ms) {
            LocalResult::Single(dt) => dt,
            _ => return Err(format!("timestamp {timestamp_ms}ms is out of range")),
        };
        Ok(CalculationRecord {
            mode,
            point,
            result,
            created_at,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn point(&self) -> f64 {
        self.point
    }

    pub fn result(&self) -> f64 {
        self.result
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("stored history in {} is unreadable: {reason}", path.display())]
    PersistenceCorrupt { path: PathBuf, reason: String },
    #[error("cannot access history slot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HistoryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        HistoryError::PersistenceCorrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// The single file backing the history. Reading it is the only way to obtain a
/// [`HistoryStore`].
#[derive(Clone, Debug)]
pub struct HistorySlot {
    path: PathBuf,
}

impl HistorySlot {
    pub fn new(path: PathBuf) -> Self {
        HistorySlot { path }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        HistorySlot::new(dir.as_ref().join(format!("{HISTORY_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when nothing has been persisted yet.
    pub fn read(&self) -> Result<Option<Vec<CalculationRecord>>, HistoryError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                return Err(HistoryError::corrupt(&self.path, err.to_string()));
            }
            Err(err) => return Err(HistoryError::io(&self.path, err)),
        };
        let stored: Vec<StoredCalculationRecord> = serde_json::from_str(&contents)
            .map_err(|err| HistoryError::corrupt(&self.path, err.to_string()))?;
        let entries = stored
            .into_iter()
            .map(StoredCalculationRecord::into_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| HistoryError::corrupt(&self.path, reason))?;
        Ok(Some(entries))
    }

    pub fn write(&self, entries: &[CalculationRecord]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| HistoryError::io(&self.path, err))?;
            }
        }
        let stored: Vec<StoredCalculationRecord> =
            entries.iter().map(StoredCalculationRecord::from).collect();
        let payload = serde_json::to_string(&stored)
            .map_err(|err| HistoryError::corrupt(&self.path, err.to_string()))?;
        // Write beside the slot and rename over it so a crash never leaves a
        // half-written payload behind.
        let staging = self.staging_path();
        fs::write(&staging, payload).map_err(|err| HistoryError::io(&self.path, err))?;
        fs::rename(&staging, &self.path).map_err(|err| {
            let _ = fs::remove_file(&staging);
            HistoryError::io(&self.path, err)
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn remove(&self) -> Result<(), HistoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(HistoryError::io(&self.path, err)),
        }
    }
}

/// Newest-first, capped history of calculations mirrored to a [`HistorySlot`].
#[derive(Debug)]
pub struct HistoryStore {
    slot: HistorySlot,
    entries: Vec<CalculationRecord>,
    recovered: Option<HistoryError>,
}

impl HistoryStore {
    /// Restores the history from `slot`. Unreadable data is discarded and the
    /// store starts empty; the reason is kept for [`HistoryStore::take_recovery`].
    pub fn load(slot: HistorySlot) -> Self {
        let (entries, recovered) = match slot.read() {
            Ok(Some(mut entries)) => {
                entries.truncate(MAX_HISTORY);
                (entries, None)
            }
            Ok(None) => (Vec::new(), None),
            Err(err) => (Vec::new(), Some(err)),
        };
        HistoryStore {
            slot,
            entries,
            recovered,
        }
    }

    pub fn entries(&self) -> &[CalculationRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn slot(&self) -> &HistorySlot {
        &self.slot
    }

    pub fn take_recovery(&mut self) -> Option<HistoryError> {
        self.recovered.take()
    }

    /// Prepends `entry` and persists. The in-memory history is updated even
    /// when the write fails.
    pub fn record(&mut self, entry: CalculationRecord) -> Result<(), HistoryError> {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY);
        self.slot.write(&self.entries)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        self.slot.remove()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCalculationRecord {
    mode: String,
    #[serde(
        serialize_with = "serialize_number",
        deserialize_with = "deserialize_number"
    )]
    point: f64,
    #[serde(
        serialize_with = "serialize_number",
        deserialize_with = "deserialize_number"
    )]
    result: f64,
    timestamp: String,
}

impl StoredCalculationRecord {
    fn into_record(self) -> Result<CalculationRecord, String> {
        let mode = self.mode.parse::<Mode>()?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|err| format!("invalid timestamp `{}`: {err}", self.timestamp))?;
        CalculationRecord::from_parts(mode, self.point, self.result, timestamp.timestamp_millis())
    }
}

impl From<&CalculationRecord> for StoredCalculationRecord {
    fn from(value: &CalculationRecord) -> Self {
        StoredCalculationRecord {
            mode: value.mode.label().to_string(),
            point: value.point,
            result: value.result,
            timestamp: value
                .created_at
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

// JSON has no representation for non-finite numbers; those are written as
// "Infinity", "-Infinity" or "NaN".
fn serialize_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if *value > 0.0 {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_str("-Infinity")
    }
}

fn deserialize_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct NumberVisitor;
    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;
        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number, Infinity, -Infinity or NaN")
        }
        fn visit_f64<E>(self, value: f64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }
        fn visit_i64<E>(self, value: i64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }
        fn visit_u64<E>(self, value: u64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }
        fn visit_str<E>(self, value: &str) -> Result<f64, E>
        where
            E: de::Error,
        {
            match value {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(E::custom(format!("unexpected number literal `{other}`"))),
            }
        }
    }
    deserializer.deserialize_any(NumberVisitor)
}
