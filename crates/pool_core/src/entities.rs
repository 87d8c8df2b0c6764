//! Domain entities and the ride lifecycle state machine.
//!
//! - `Ride` owns its own lifecycle; the only way to change status is
//!   `transition_to`, which enforces the transition table.
//! - `Group` is the pooling aggregate: one vehicle, one H3 cell, running
//!   occupancy totals. Occupancy is monotone while the group is open and
//!   decreases only when a member cancels.
//! - `Vehicle` is referenced by groups, never owned.

use std::fmt;

use h3o::CellIndex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spatial::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ride lifecycle status.
///
/// `Pending -> Matched -> OnTrip -> Completed`, with `Cancelled` reachable
/// from every non-terminal state. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Pending,
    Matched,
    OnTrip,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Whether `self -> next` is an edge in the lifecycle graph.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Pending, Matched)
                | (Pending, Cancelled)
                | (Matched, OnTrip)
                | (Matched, Cancelled)
                | (OnTrip, Completed)
                | (OnTrip, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

/// A ride request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub rider_id: u64,
    pub pickup: Location,
    pub dropoff: Location,
    pub seats: u32,
    pub luggage: u32,
    pub status: RideStatus,
    /// Set when matched into a group; cleared again on cancellation.
    pub group_id: Option<GroupId>,
    /// Set exactly once, at match time. Never recomputed.
    pub price: Option<f64>,
    /// Caller-supplied token that makes retried submissions exactly-once.
    pub idempotency_key: Option<String>,
}

impl Ride {
    /// Move to `next` if the edge is legal, otherwise fail and leave the
    /// ride unchanged.
    pub fn transition_to(&mut self, next: RideStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    /// Accepting more members.
    Open,
    /// No further admissions.
    Closed,
}

/// A pooled trip: one vehicle, one cell, one or more rides.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub vehicle_id: VehicleId,
    pub seats_occupied: u32,
    pub luggage_occupied: u32,
    pub status: GroupStatus,
    /// The cell the group was opened in. A group never spans cells.
    pub cell: CellIndex,
}

impl Group {
    /// Capacity predicate: would this passenger fit?
    pub fn can_accommodate(
        &self,
        seats: u32,
        luggage: u32,
        max_seats: u32,
        max_luggage: u32,
    ) -> bool {
        self.seats_occupied + seats <= max_seats && self.luggage_occupied + luggage <= max_luggage
    }

    pub fn add_passenger(&mut self, seats: u32, luggage: u32) {
        self.seats_occupied += seats;
        self.luggage_occupied += luggage;
    }

    pub fn remove_passenger(&mut self, seats: u32, luggage: u32) {
        self.seats_occupied = self.seats_occupied.saturating_sub(seats);
        self.luggage_occupied = self.luggage_occupied.saturating_sub(luggage);
    }
}

/// A vehicle in the fleet. Read-mostly from the engine's point of view;
/// availability flips when a group claims or releases it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub max_seats: u32,
    pub max_luggage: u32,
    pub location: Location,
    pub is_available: bool,
}
