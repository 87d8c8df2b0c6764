//! Airport ride-pooling matching core.
//!
//! Groups independently arriving ride requests near a single origin into
//! shared-vehicle trips, subject to vehicle capacity and per-passenger
//! detour limits, and prices each request at match time.
//!
//! The crate is the batching engine only: spatial binning, the periodic
//! greedy grouping pass, pricing strategies, the request lifecycle state
//! machine, and the locking that makes repeated cycles and capacity
//! mutations safe under concurrent callers. Storage and the distributed
//! lock are capability traits; in-memory implementations are provided for
//! embedding and tests.

pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod lock;
pub mod matching;
pub mod pricing;
pub mod spatial;
pub mod stores;
pub mod worker;

pub use config::PoolConfig;
pub use engine::PoolEngine;
pub use error::{Error, Result};
pub use worker::{MatchingWorker, WorkerHandle};
