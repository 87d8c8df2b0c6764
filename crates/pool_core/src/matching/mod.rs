//! Windowed spatial batching.
//!
//! 1. **Spatial binning** — pending rides are bucketed into H3 cells
//!    (see [`crate::spatial`]).
//! 2. **Temporal batching** — rides buffer until the next cycle fires.
//! 3. **Greedy grouping** — within each cell, each ride joins the first
//!    open group passing the seat, luggage, and detour predicates, or
//!    opens a new group.
//!
//! Greedy is a heuristic, not an exact assignment: earlier decisions are
//! never revisited and total detour is not minimized. Worst case is
//! quadratic in the rides of one cell; binning keeps the expected
//! candidate-group count small.

pub mod detour;
pub mod greedy;

pub use detour::{detour_ok, shared_leg_km};
