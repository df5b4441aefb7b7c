//! MemoryStore - in-process tables, lost on exit

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, RoutePoint, TripId, TripStore, TripSummary, ViolationEvent};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Tables {
    last_id: TripId,
    trips: BTreeMap<TripId, TripSummary>,
    route_points: BTreeMap<TripId, Vec<RoutePoint>>,
    violations: BTreeMap<TripId, Vec<ViolationEvent>>,
}

/// Store keeping trips in shared maps
///
/// Clones share the same tables, so one clone can be handed to a recorder
/// while another answers queries.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(&self, trip_id: TripId) -> ContractError {
        ContractError::TripNotFound {
            store_name: self.name.clone(),
            trip_id,
        }
    }

    pub fn get_trip(&self, trip_id: TripId) -> Option<TripSummary> {
        self.tables().trips.get(&trip_id).cloned()
    }

    /// All trips, most recent start first
    pub fn list_trips(&self) -> Vec<TripSummary> {
        let mut trips: Vec<_> = self.tables().trips.values().cloned().collect();
        trips.sort_by(|a, b| {
            b.started_at_ms
                .cmp(&a.started_at_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        trips
    }

    pub fn route_points(&self, trip_id: TripId) -> Vec<RoutePoint> {
        self.tables()
            .route_points
            .get(&trip_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn violations(&self, trip_id: TripId) -> Vec<ViolationEvent> {
        self.tables()
            .violations
            .get(&trip_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a trip with its detail rows; false if it was not stored
    pub fn delete_trip(&self, trip_id: TripId) -> bool {
        let mut tables = self.tables();
        tables.route_points.remove(&trip_id);
        tables.violations.remove(&trip_id);
        tables.trips.remove(&trip_id).is_some()
    }

    pub fn trip_count(&self) -> usize {
        self.tables().trips.len()
    }
}

impl TripStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "memory_store_insert_trip", skip(self, summary), fields(store = %self.name))]
    async fn insert_trip(&mut self, summary: &TripSummary) -> Result<TripId, ContractError> {
        let mut tables = self.tables();
        tables.last_id += 1;
        let trip_id = tables.last_id;
        tables
            .trips
            .insert(trip_id, summary.clone().with_id(trip_id));
        debug!(store = %self.name, trip_id, "Trip stored in memory");
        Ok(trip_id)
    }

    async fn insert_route_point(
        &mut self,
        trip_id: TripId,
        point: &RoutePoint,
    ) -> Result<(), ContractError> {
        let mut tables = self.tables();
        if !tables.trips.contains_key(&trip_id) {
            return Err(self.not_found(trip_id));
        }
        tables.route_points.entry(trip_id).or_default().push(*point);
        Ok(())
    }

    async fn insert_violation(
        &mut self,
        trip_id: TripId,
        violation: &ViolationEvent,
    ) -> Result<(), ContractError> {
        let mut tables = self.tables();
        if !tables.trips.contains_key(&trip_id) {
            return Err(self.not_found(trip_id));
        }
        tables
            .violations
            .entry(trip_id)
            .or_default()
            .push(violation.clone());
        Ok(())
    }

    async fn update_notes(&mut self, trip_id: TripId, notes: &str) -> Result<(), ContractError> {
        let mut tables = self.tables();
        match tables.trips.get_mut(&trip_id) {
            Some(summary) => {
                summary.notes = contracts::normalize_notes(notes);
                Ok(())
            }
            None => Err(self.not_found(trip_id)),
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(store = %self.name, trips = self.trip_count(), "MemoryStore closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ViolationCounts, ViolationKind};

    fn summary(started_at_ms: u64) -> TripSummary {
        TripSummary {
            id: None,
            date: "2024-05-01".into(),
            start_time: "08:00:00".into(),
            end_time: "08:01:00".into(),
            started_at_ms,
            ended_at_ms: started_at_ms + 60_000,
            duration_ms: 60_000,
            final_score: 95,
            counts: ViolationCounts::default(),
            notes: String::new(),
        }
    }

    fn point(timestamp_ms: u64) -> RoutePoint {
        RoutePoint {
            latitude: 48.1,
            longitude: 11.5,
            timestamp_ms,
            speed_mps: 8.0,
            accuracy_m: 4.0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let query = MemoryStore::new("mem");
        let mut store = query.clone();

        let first = store.insert_trip(&summary(1_000)).await.unwrap();
        let second = store.insert_trip(&summary(5_000)).await.unwrap();
        assert_eq!((first, second), (1, 2));

        store.insert_route_point(first, &point(1_000)).await.unwrap();
        store.insert_route_point(first, &point(3_000)).await.unwrap();
        store
            .insert_violation(
                second,
                &ViolationEvent {
                    kind: ViolationKind::Turn,
                    severity: 3.4,
                    speed_mps: 9.0,
                    location: None,
                    timestamp_ms: 6_000,
                },
            )
            .await
            .unwrap();

        let listed: Vec<_> = query.list_trips().into_iter().map(|t| t.id).collect();
        assert_eq!(listed, vec![Some(2), Some(1)]);
        assert_eq!(query.route_points(first).len(), 2);
        assert_eq!(query.violations(second)[0].kind, ViolationKind::Turn);
        assert_eq!(query.get_trip(first).unwrap().id, Some(first));
    }

    #[tokio::test]
    async fn test_details_require_existing_trip() {
        let mut store = MemoryStore::new("mem");
        let err = store.insert_route_point(9, &point(0)).await.unwrap_err();
        assert!(matches!(err, ContractError::TripNotFound { trip_id: 9, .. }));
    }

    #[tokio::test]
    async fn test_update_notes_and_delete_cascade() {
        let mut store = MemoryStore::new("mem");
        let trip_id = store.insert_trip(&summary(0)).await.unwrap();
        store.insert_route_point(trip_id, &point(0)).await.unwrap();

        store.update_notes(trip_id, "  night drive  ").await.unwrap();
        assert_eq!(store.get_trip(trip_id).unwrap().notes, "night drive");

        assert!(store.delete_trip(trip_id));
        assert!(store.route_points(trip_id).is_empty());
        assert!(!store.delete_trip(trip_id));
        assert!(store.update_notes(trip_id, "gone").await.is_err());
    }
}
