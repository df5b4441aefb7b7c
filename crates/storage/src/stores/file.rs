//! FileStore - one directory per trip
//!
//! ```text
//! <base_path>/
//!   1/
//!     summary.json
//!     route.jsonl
//!     violations.jsonl
//!   2/
//!     ...
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use contracts::{ContractError, RoutePoint, TripId, TripStore, TripSummary, ViolationEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

const SUMMARY_FILE: &str = "summary.json";
const ROUTE_FILE: &str = "route.jsonl";
const VIOLATIONS_FILE: &str = "violations.jsonl";

/// Parameter key naming the base directory
pub const PATH_PARAM: &str = "path";

/// Configuration for FileStore
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileStoreConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get(PATH_PARAM)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./trips"));

        Self { base_path }
    }
}

/// summary.json contents
#[derive(Debug, Serialize, Deserialize)]
struct SummaryRecord {
    saved_at: String,
    #[serde(flatten)]
    summary: TripSummary,
}

/// Store that writes every trip into its own directory
pub struct FileStore {
    name: String,
    config: FileStoreConfig,
    last_id: TripId,
}

impl FileStore {
    /// Open (or create) the base directory and resume id assignment
    pub fn new(name: impl Into<String>, config: FileStoreConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        let last_id = trip_ids(&config.base_path)?.into_iter().max().unwrap_or(0);

        Ok(Self {
            name: name.into(),
            config,
            last_id,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileStoreConfig::from_params(params))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    fn trip_dir(&self, trip_id: TripId) -> PathBuf {
        self.config.base_path.join(trip_id.to_string())
    }

    fn existing_trip_dir(&self, trip_id: TripId) -> Result<PathBuf, ContractError> {
        let dir = self.trip_dir(trip_id);
        if dir.join(SUMMARY_FILE).is_file() {
            Ok(dir)
        } else {
            Err(ContractError::TripNotFound {
                store_name: self.name.clone(),
                trip_id,
            })
        }
    }

    fn write_error(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::store_write(&self.name, e.to_string())
    }

    pub fn get_trip(&self, trip_id: TripId) -> std::io::Result<Option<TripSummary>> {
        let path = self.trip_dir(trip_id).join(SUMMARY_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(read_summary(&path)?.summary))
    }

    /// All trips, most recent start first
    pub fn list_trips(&self) -> std::io::Result<Vec<TripSummary>> {
        let mut trips = Vec::new();
        for trip_id in trip_ids(&self.config.base_path)? {
            match self.get_trip(trip_id) {
                Ok(Some(summary)) => trips.push(summary),
                Ok(None) => {}
                Err(e) => warn!(store = %self.name, trip_id, error = %e, "Skipping unreadable trip"),
            }
        }
        trips.sort_by(|a, b| {
            b.started_at_ms
                .cmp(&a.started_at_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(trips)
    }

    pub fn route_points(&self, trip_id: TripId) -> std::io::Result<Vec<RoutePoint>> {
        read_jsonl(&self.trip_dir(trip_id).join(ROUTE_FILE))
    }

    pub fn violations(&self, trip_id: TripId) -> std::io::Result<Vec<ViolationEvent>> {
        read_jsonl(&self.trip_dir(trip_id).join(VIOLATIONS_FILE))
    }

    /// Remove a trip directory; false if it did not exist
    pub fn delete_trip(&self, trip_id: TripId) -> std::io::Result<bool> {
        let dir = self.trip_dir(trip_id);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)?;
        Ok(true)
    }

    fn append_line<T: Serialize>(&self, trip_id: TripId, file: &str, row: &T) -> Result<(), ContractError> {
        let dir = self.existing_trip_dir(trip_id)?;
        let mut line = serde_json::to_vec(row).map_err(|e| self.write_error(e))?;
        line.push(b'\n');

        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(file))
            .map_err(|e| self.write_error(e))?;
        out.write_all(&line).map_err(|e| self.write_error(e))
    }
}

impl TripStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_store_insert_trip",
        skip(self, summary),
        fields(store = %self.name, path = %self.config.base_path.display())
    )]
    async fn insert_trip(&mut self, summary: &TripSummary) -> Result<TripId, ContractError> {
        let trip_id = self.last_id + 1;
        let dir = self.trip_dir(trip_id);
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let record = SummaryRecord {
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            summary: summary.clone().with_id(trip_id),
        };
        write_summary(&dir.join(SUMMARY_FILE), &record).map_err(|e| self.write_error(e))?;

        self.last_id = trip_id;
        debug!(store = %self.name, trip_id, "Trip directory written");
        Ok(trip_id)
    }

    async fn insert_route_point(
        &mut self,
        trip_id: TripId,
        point: &RoutePoint,
    ) -> Result<(), ContractError> {
        self.append_line(trip_id, ROUTE_FILE, point)
    }

    async fn insert_violation(
        &mut self,
        trip_id: TripId,
        violation: &ViolationEvent,
    ) -> Result<(), ContractError> {
        self.append_line(trip_id, VIOLATIONS_FILE, violation)
    }

    #[instrument(name = "file_store_update_notes", skip(self, notes), fields(store = %self.name))]
    async fn update_notes(&mut self, trip_id: TripId, notes: &str) -> Result<(), ContractError> {
        let path = self.existing_trip_dir(trip_id)?.join(SUMMARY_FILE);
        let mut record = read_summary(&path).map_err(|e| self.write_error(e))?;
        record.summary.notes = contracts::normalize_notes(notes);
        write_summary(&path, &record).map_err(|e| self.write_error(e))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Every row is written through on insert
        Ok(())
    }

    #[instrument(name = "file_store_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(store = %self.name, last_trip = self.last_id, "FileStore closed");
        Ok(())
    }
}

/// Numeric sub-directory names under `base`
fn trip_ids(base: &Path) -> std::io::Result<Vec<TripId>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn read_summary(path: &Path) -> std::io::Result<SummaryRecord> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn write_summary(path: &Path, record: &SummaryRecord) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    out.flush()
}

/// Missing file reads as no rows
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> std::io::Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        rows.push(row);
    }
    Ok(rows)
}
