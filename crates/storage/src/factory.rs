//! Build a recorder from `StorageConfig`

use contracts::{StorageConfig, StoreType};
use tracing::{info, instrument};

use crate::error::StorageError;
use crate::recorder::TripRecorder;
use crate::stores::{FileStore, LogStore, MemoryStore};

/// Create the configured store and spawn its recorder worker
///
/// Must be called inside a tokio runtime.
#[instrument(
    name = "storage_create_recorder",
    skip(config),
    fields(store = %config.name, store_type = ?config.store_type)
)]
pub fn create_recorder(config: &StorageConfig) -> Result<TripRecorder, StorageError> {
    let recorder = match config.store_type {
        StoreType::Log => TripRecorder::spawn(LogStore::new(&config.name), config.queue_capacity),
        StoreType::File => {
            let store = FileStore::from_params(&config.name, &config.params)
                .map_err(|e| StorageError::store_creation(&config.name, e.to_string()))?;
            TripRecorder::spawn(store, config.queue_capacity)
        }
        StoreType::Memory => {
            TripRecorder::spawn(MemoryStore::new(&config.name), config.queue_capacity)
        }
    };

    info!(store = %config.name, store_type = ?config.store_type, "Trip recorder started");
    Ok(recorder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::PATH_PARAM;
    use contracts::{FinalizedTrip, TripSummary, ViolationCounts};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn finalized() -> FinalizedTrip {
        FinalizedTrip {
            summary: TripSummary {
                id: None,
                date: "2024-05-01".into(),
                start_time: "07:30:00".into(),
                end_time: "07:45:00".into(),
                started_at_ms: 0,
                ended_at_ms: 900_000,
                duration_ms: 900_000,
                final_score: 97,
                counts: ViolationCounts::default(),
                notes: String::new(),
            },
            route_points: Vec::new(),
            violations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_file_recorder_writes_to_param_path() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            name: "disk".into(),
            store_type: StoreType::File,
            queue_capacity: 4,
            params: HashMap::from([(PATH_PARAM.to_string(), dir.path().display().to_string())]),
        };

        let recorder = create_recorder(&config).unwrap();
        assert_eq!(recorder.name(), "disk");
        let outcome = recorder.submit(finalized()).unwrap().wait().await.unwrap();
        recorder.shutdown().await;

        assert!(dir.path().join(outcome.trip_id.to_string()).join("summary.json").is_file());
    }

    #[tokio::test]
    async fn test_create_log_recorder() {
        let recorder = create_recorder(&StorageConfig::default()).unwrap();
        let outcome = recorder.submit(finalized()).unwrap().wait().await.unwrap();
        assert_eq!(outcome.trip_id, 1);
        recorder.shutdown().await;
    }
}
