//! Dynamic pricing: interchangeable fare strategies.
//!
//! Formula: `price = (base_fare + distance_km * rate_per_km) * surge * (1 - pool_discount)`
//!
//! - Surge multiplier: `clamp(active_requests / available_vehicles, 1.0, 3.0)`,
//!   recomputed once per matching cycle, not per request.
//! - Pool discount by 1-based join order within the group: 1st passenger 0%,
//!   2nd 20%, 3rd and later 30%.
//!
//! New fare rules slot in as additional `PricingStrategy` implementations
//! without touching the grouping algorithm.

/// Hard ceiling on the surge multiplier.
pub const MAX_SURGE: f64 = 3.0;

/// A fare calculation over a quoted distance.
pub trait PricingStrategy: Send + Sync {
    fn calculate(&self, distance_km: f64, base_fare: f64, rate_per_km: f64) -> f64;
}

/// Distance-based fare, no surge, no discount.
#[derive(Debug, Default)]
pub struct StandardPricing;

impl PricingStrategy for StandardPricing {
    fn calculate(&self, distance_km: f64, base_fare: f64, rate_per_km: f64) -> f64 {
        base_fare + distance_km * rate_per_km
    }
}

/// Standard fare scaled by a demand/supply surge multiplier.
#[derive(Debug)]
pub struct SurgePricing {
    pub surge_multiplier: f64,
}

impl PricingStrategy for SurgePricing {
    fn calculate(&self, distance_km: f64, base_fare: f64, rate_per_km: f64) -> f64 {
        (base_fare + distance_km * rate_per_km) * self.surge_multiplier
    }
}

/// Surge fare with a position-based pooling discount.
#[derive(Debug)]
pub struct PoolDiscountPricing {
    discount: f64,
    surge_multiplier: f64,
}

impl PoolDiscountPricing {
    /// `join_order` is 1-based position within the group.
    pub fn new(join_order: usize, surge_multiplier: f64) -> Self {
        let discount = match join_order {
            0 | 1 => 0.0,
            2 => 0.20,
            _ => 0.30,
        };
        Self {
            discount,
            surge_multiplier,
        }
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }
}

impl PricingStrategy for PoolDiscountPricing {
    fn calculate(&self, distance_km: f64, base_fare: f64, rate_per_km: f64) -> f64 {
        let raw = (base_fare + distance_km * rate_per_km) * self.surge_multiplier;
        round_cents(raw * (1.0 - self.discount))
    }
}

/// Demand/supply surge for one matching cycle.
///
/// Saturates at `MAX_SURGE` when no vehicle is available.
pub fn compute_surge(active_requests: usize, available_vehicles: usize) -> f64 {
    if available_vehicles == 0 {
        return MAX_SURGE;
    }
    (active_requests as f64 / available_vehicles as f64).clamp(1.0, MAX_SURGE)
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Fare engine facade used by the matching cycle.
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine {
    pub base_fare: f64,
    pub rate_per_km: f64,
}

impl PricingEngine {
    pub fn new(base_fare: f64, rate_per_km: f64) -> Self {
        Self {
            base_fare,
            rate_per_km,
        }
    }

    /// Price one passenger. Deterministic for identical inputs.
    pub fn quote(&self, distance_km: f64, join_order: usize, surge: f64) -> f64 {
        PoolDiscountPricing::new(join_order, surge).calculate(
            distance_km,
            self.base_fare,
            self.rate_per_km,
        )
    }
}
