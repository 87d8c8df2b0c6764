//! In-memory store implementations backed by `DashMap`.
//!
//! A `DashMap` entry reference holds an exclusive guard on that entry, so
//! every check-and-mutate below is indivisible per ride/group/vehicle.
//! That per-entry exclusivity is what implements the capacity guard.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use h3o::CellIndex;

use crate::entities::{
    Group, GroupId, GroupStatus, Ride, RideId, RideStatus, Vehicle, VehicleId,
};
use crate::error::{Error, Result};

use super::{GroupStore, NewRide, RideStore, VehicleDirectory};

#[derive(Debug, Default)]
pub struct MemoryRideStore {
    rides: DashMap<RideId, Ride>,
    by_idempotency_key: DashMap<String, RideId>,
    next_id: AtomicU64,
}

impl MemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> RideId {
        RideId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn insert_new(&self, id: RideId, new: NewRide) -> Ride {
        let ride = Ride {
            id,
            rider_id: new.rider_id,
            pickup: new.pickup,
            dropoff: new.dropoff,
            seats: new.seats,
            luggage: new.luggage,
            status: RideStatus::Pending,
            group_id: None,
            price: None,
            idempotency_key: new.idempotency_key,
        };
        self.rides.insert(id, ride.clone());
        ride
    }
}

#[async_trait]
impl RideStore for MemoryRideStore {
    async fn create(&self, new: NewRide) -> Ride {
        let Some(key) = new.idempotency_key.clone() else {
            let id = self.alloc_id();
            return self.insert_new(id, new);
        };
        // The entry guard makes concurrent duplicate submissions race on
        // exactly one winner; the loser sees the winner's ride.
        match self.by_idempotency_key.entry(key) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                self.rides
                    .get(&id)
                    .map(|r| r.clone())
                    .unwrap_or_else(|| self.insert_new(id, new))
            }
            Entry::Vacant(slot) => {
                let id = self.alloc_id();
                let ride = self.insert_new(id, new);
                slot.insert(id);
                ride
            }
        }
    }

    async fn get(&self, id: RideId) -> Option<Ride> {
        self.rides.get(&id).map(|r| r.clone())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Option<Ride> {
        let id = *self.by_idempotency_key.get(key)?;
        self.rides.get(&id).map(|r| r.clone())
    }

    async fn list_pending(&self) -> Vec<Ride> {
        let mut pending: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| r.status == RideStatus::Pending)
            .map(|r| r.clone())
            .collect();
        // Ids are allocated in submission order.
        pending.sort_by_key(|r| r.id);
        pending
    }

    async fn rides_in_group(&self, group: GroupId) -> Vec<Ride> {
        let mut members: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| r.group_id == Some(group))
            .map(|r| r.clone())
            .collect();
        members.sort_by_key(|r| r.id);
        members
    }

    async fn commit_match(&self, id: RideId, group: GroupId, price: f64) -> Result<Ride> {
        let mut ride = self.rides.get_mut(&id).ok_or(Error::RideNotFound(id))?;
        ride.transition_to(RideStatus::Matched)?;
        ride.group_id = Some(group);
        ride.price = Some(price);
        Ok(ride.clone())
    }

    async fn apply_transition(&self, id: RideId, next: RideStatus) -> Result<Ride> {
        let mut ride = self.rides.get_mut(&id).ok_or(Error::RideNotFound(id))?;
        ride.transition_to(next)?;
        Ok(ride.clone())
    }

    async fn clear_group(&self, id: RideId) -> Result<()> {
        let mut ride = self.rides.get_mut(&id).ok_or(Error::RideNotFound(id))?;
        ride.group_id = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: DashMap<GroupId, Group>,
    next_id: AtomicU64,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn create(&self, vehicle: VehicleId, cell: CellIndex) -> Group {
        let id = GroupId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let group = Group {
            id,
            vehicle_id: vehicle,
            seats_occupied: 0,
            luggage_occupied: 0,
            status: GroupStatus::Open,
            cell,
        };
        self.groups.insert(id, group.clone());
        group
    }

    async fn get(&self, id: GroupId) -> Option<Group> {
        self.groups.get(&id).map(|g| g.clone())
    }

    async fn list_open(&self, cell: CellIndex) -> Vec<Group> {
        let mut open: Vec<Group> = self
            .groups
            .iter()
            .filter(|g| g.status == GroupStatus::Open && g.cell == cell)
            .map(|g| g.clone())
            .collect();
        // Ids are allocated in creation order.
        open.sort_by_key(|g| g.id);
        open
    }

    async fn try_occupy(
        &self,
        id: GroupId,
        seats: u32,
        luggage: u32,
        max_seats: u32,
        max_luggage: u32,
    ) -> Result<bool> {
        let mut group = self.groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        if group.status != GroupStatus::Open {
            return Ok(false);
        }
        if !group.can_accommodate(seats, luggage, max_seats, max_luggage) {
            return Ok(false);
        }
        group.add_passenger(seats, luggage);
        Ok(true)
    }

    async fn release_occupancy(&self, id: GroupId, seats: u32, luggage: u32) -> Result<Group> {
        let mut group = self.groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        group.remove_passenger(seats, luggage);
        Ok(group.clone())
    }

    async fn close_if_empty(&self, id: GroupId) -> Result<bool> {
        let mut group = self.groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        if group.status == GroupStatus::Open && group.seats_occupied == 0 {
            group.status = GroupStatus::Closed;
            return Ok(true);
        }
        Ok(false)
    }

    async fn close(&self, id: GroupId) -> Result<()> {
        let mut group = self.groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        group.status = GroupStatus::Closed;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryVehicleDirectory {
    vehicles: DashMap<VehicleId, Vehicle>,
    next_id: AtomicU64,
}

impl MemoryVehicleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vehicle with the directory, assigning it an id.
    pub fn add(&self, max_seats: u32, max_luggage: u32, location: crate::spatial::Location) -> Vehicle {
        let id = VehicleId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let vehicle = Vehicle {
            id,
            max_seats,
            max_luggage,
            location,
            is_available: true,
        };
        self.vehicles.insert(id, vehicle.clone());
        vehicle
    }
}

#[async_trait]
impl VehicleDirectory for MemoryVehicleDirectory {
    async fn get(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.get(&id).map(|v| v.clone())
    }

    async fn next_available(&self) -> Option<Vehicle> {
        self.vehicles
            .iter()
            .filter(|v| v.is_available)
            .map(|v| v.clone())
            .min_by_key(|v| v.id)
    }

    async fn count_available(&self) -> usize {
        self.vehicles.iter().filter(|v| v.is_available).count()
    }

    async fn mark_unavailable(&self, id: VehicleId) -> Result<()> {
        let mut vehicle = self.vehicles.get_mut(&id).ok_or(Error::VehicleNotFound(id))?;
        vehicle.is_available = false;
        Ok(())
    }

    async fn mark_available(&self, id: VehicleId) -> Result<()> {
        let mut vehicle = self.vehicles.get_mut(&id).ok_or(Error::VehicleNotFound(id))?;
        vehicle.is_available = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Location;

    fn new_ride(key: Option<&str>) -> NewRide {
        NewRide {
            rider_id: 7,
            pickup: Location::new(19.09, 72.87),
            dropoff: Location::new(19.12, 72.85),
            seats: 1,
            luggage: 0,
            idempotency_key: key.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_returns_original() {
        let store = MemoryRideStore::new();
        let first = store.create(new_ride(Some("abc"))).await;
        let second = store.create(new_ride(Some("abc"))).await;
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_pending().await.len(), 1);
    }

    #[tokio::test]
    async fn pending_listed_in_arrival_order() {
        let store = MemoryRideStore::new();
        let a = store.create(new_ride(None)).await;
        let b = store.create(new_ride(None)).await;
        let pending = store.list_pending().await;
        assert_eq!(
            pending.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[tokio::test]
    async fn try_occupy_rejects_over_capacity() {
        let store = MemoryGroupStore::new();
        let cell = CellIndex::try_from(0x8a1fb46622dffff).expect("cell");
        let group = store.create(VehicleId(1), cell).await;

        assert!(store.try_occupy(group.id, 3, 2, 4, 3).await.expect("occupy"));
        assert!(!store.try_occupy(group.id, 2, 0, 4, 3).await.expect("occupy"));

        let group = store.get(group.id).await.expect("group");
        assert_eq!(group.seats_occupied, 3);
    }

    #[tokio::test]
    async fn closed_group_admits_nobody() {
        let store = MemoryGroupStore::new();
        let cell = CellIndex::try_from(0x8a1fb46622dffff).expect("cell");
        let group = store.create(VehicleId(1), cell).await;
        store.close(group.id).await.expect("close");
        assert!(!store.try_occupy(group.id, 1, 0, 4, 3).await.expect("occupy"));
        assert!(store.list_open(cell).await.is_empty());
    }

    #[tokio::test]
    async fn close_if_empty_only_when_drained() {
        let store = MemoryGroupStore::new();
        let cell = CellIndex::try_from(0x8a1fb46622dffff).expect("cell");
        let group = store.create(VehicleId(1), cell).await;
        store.try_occupy(group.id, 2, 1, 4, 3).await.expect("occupy");

        assert!(!store.close_if_empty(group.id).await.expect("check"));
        store
            .release_occupancy(group.id, 2, 1)
            .await
            .expect("release");
        assert!(store.close_if_empty(group.id).await.expect("check"));
    }

    #[tokio::test]
    async fn next_available_is_first_by_id() {
        let dir = MemoryVehicleDirectory::new();
        let first = dir.add(4, 3, Location::new(19.0, 72.8));
        dir.add(6, 4, Location::new(19.0, 72.8));

        let picked = dir.next_available().await.expect("vehicle");
        assert_eq!(picked.id, first.id);

        dir.mark_unavailable(first.id).await.expect("mark");
        let picked = dir.next_available().await.expect("vehicle");
        assert_ne!(picked.id, first.id);
        assert_eq!(dir.count_available().await, 1);
    }
}
