//! Engine configuration with defaults matching the production service.

use serde::{Deserialize, Serialize};

/// Tunables for the pooling engine and its matching cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Temporal batching window between matching cycles, seconds.
    pub matching_interval_secs: u64,
    /// Maximum fractional detour a pooled passenger accepts over their
    /// direct distance (0.40 = 40%).
    pub detour_tolerance: f64,
    /// H3 resolution for spatial binning. 7 is ~5.16 km² per hexagon.
    pub h3_resolution: u8,
    /// Flat fare component, currency units.
    pub base_fare: f64,
    /// Per-kilometer fare component, currency units.
    pub rate_per_km: f64,
    /// TTL for the matching-cycle distributed lock, seconds. Bounds how
    /// long a stalled holder can starve other coordinator instances.
    pub lock_ttl_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            matching_interval_secs: 15,
            detour_tolerance: 0.40,
            h3_resolution: 7,
            base_fare: 50.0,
            rate_per_km: 15.0,
            lock_ttl_secs: 60,
        }
    }
}
