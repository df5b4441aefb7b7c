//! TripStore trait - storage collaborator interface
//!
//! Defines the abstract interface for trip persistence.

use crate::{ContractError, RoutePoint, TripId, TripSummary, ViolationEvent};

/// Trip persistence trait
///
/// Detail rows are only inserted after `insert_trip` returned the identifier
/// they reference.
#[trait_variant::make(TripStore: Send)]
pub trait LocalTripStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Insert a trip summary and return the assigned identifier
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn insert_trip(&mut self, summary: &TripSummary) -> Result<TripId, ContractError>;

    /// Insert one route point tagged with `trip_id`
    async fn insert_route_point(
        &mut self,
        trip_id: TripId,
        point: &RoutePoint,
    ) -> Result<(), ContractError>;

    /// Insert one violation detail tagged with `trip_id`
    async fn insert_violation(
        &mut self,
        trip_id: TripId,
        violation: &ViolationEvent,
    ) -> Result<(), ContractError>;

    /// Replace the notes of an already persisted trip
    async fn update_notes(&mut self, trip_id: TripId, notes: &str) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close store
    async fn close(&mut self) -> Result<(), ContractError>;
}
