//! Shared harness for integration tests: an engine wired to in-memory
//! stores and the in-process lock provider.

use std::sync::Arc;

use pool_core::config::PoolConfig;
use pool_core::engine::PoolEngine;
use pool_core::lock::MemoryLock;
use pool_core::spatial::Location;
use pool_core::stores::{MemoryGroupStore, MemoryRideStore, MemoryVehicleDirectory, NewRide};

pub struct Harness {
    pub rides: Arc<MemoryRideStore>,
    pub groups: Arc<MemoryGroupStore>,
    pub vehicles: Arc<MemoryVehicleDirectory>,
    pub lock: Arc<MemoryLock>,
    pub engine: Arc<PoolEngine>,
}

pub fn harness(config: PoolConfig) -> Harness {
    let rides = Arc::new(MemoryRideStore::new());
    let groups = Arc::new(MemoryGroupStore::new());
    let vehicles = Arc::new(MemoryVehicleDirectory::new());
    let lock = Arc::new(MemoryLock::new());
    let engine = Arc::new(
        PoolEngine::new(
            rides.clone(),
            groups.clone(),
            vehicles.clone(),
            lock.clone(),
            config,
        )
        .expect("engine config"),
    );
    Harness {
        rides,
        groups,
        vehicles,
        lock,
        engine,
    }
}

/// Airport pickup used across scenarios (Mumbai CSMIA).
pub const AIRPORT: Location = Location {
    lat: 19.0896,
    lng: 72.8656,
};

/// A dropoff a few kilometers from the airport.
pub const ANDHERI: Location = Location {
    lat: 19.1176,
    lng: 72.8490,
};

pub fn new_ride(rider_id: u64, pickup: Location, dropoff: Location) -> NewRide {
    NewRide {
        rider_id,
        pickup,
        dropoff,
        seats: 1,
        luggage: 0,
        idempotency_key: None,
    }
}
