//! LogStore - logs every insert via tracing

use contracts::{ContractError, RoutePoint, TripId, TripStore, TripSummary, ViolationEvent};
use tracing::{debug, info, instrument};

/// Store that only logs what it is given
///
/// Identifiers are assigned from an in-process counter.
pub struct LogStore {
    name: String,
    next_id: TripId,
}

impl LogStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: 1,
        }
    }
}

impl TripStore for LogStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_store_insert_trip",
        skip(self, summary),
        fields(store = %self.name, score = summary.final_score)
    )]
    async fn insert_trip(&mut self, summary: &TripSummary) -> Result<TripId, ContractError> {
        let trip_id = self.next_id;
        self.next_id += 1;

        info!(
            store = %self.name,
            trip_id,
            date = %summary.date,
            start = %summary.start_time,
            end = %summary.end_time,
            duration = %summary.formatted_duration(),
            score = summary.final_score,
            acceleration = summary.counts.acceleration,
            brake = summary.counts.brake,
            turn = summary.counts.turn,
            speeding = summary.counts.speeding,
            noise = summary.counts.noise,
            "Trip summary"
        );
        Ok(trip_id)
    }

    async fn insert_route_point(
        &mut self,
        trip_id: TripId,
        point: &RoutePoint,
    ) -> Result<(), ContractError> {
        debug!(
            store = %self.name,
            trip_id,
            lat = point.latitude,
            lon = point.longitude,
            speed_mps = point.speed_mps,
            "Route point"
        );
        Ok(())
    }

    async fn insert_violation(
        &mut self,
        trip_id: TripId,
        violation: &ViolationEvent,
    ) -> Result<(), ContractError> {
        info!(
            store = %self.name,
            trip_id,
            kind = %violation.kind,
            severity = violation.severity,
            timestamp_ms = violation.timestamp_ms,
            "Violation"
        );
        Ok(())
    }

    async fn update_notes(&mut self, trip_id: TripId, notes: &str) -> Result<(), ContractError> {
        if trip_id == 0 || trip_id >= self.next_id {
            return Err(ContractError::TripNotFound {
                store_name: self.name.clone(),
                trip_id,
            });
        }
        info!(store = %self.name, trip_id, notes, "Trip notes");
        Ok(())
    }

    #[instrument(name = "log_store_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log store
        Ok(())
    }

    #[instrument(name = "log_store_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(store = %self.name, trips = self.next_id - 1, "LogStore closed");
        Ok(())
    }
}
