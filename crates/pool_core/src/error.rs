use crate::entities::{GroupId, RideId, RideStatus, VehicleId};

/// Errors surfaced by the pooling core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested lifecycle edge is not in the transition table.
    /// Reported as a conflict; the ride is left unchanged.
    #[error("cannot transition ride from {from:?} to {to:?}")]
    InvalidTransition { from: RideStatus, to: RideStatus },

    #[error("ride {0} not found")]
    RideNotFound(RideId),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("coordinates out of range: lat {lat}, lng {lng}")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("unsupported H3 resolution {0}")]
    InvalidResolution(u8),

    #[error("invalid ride request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
