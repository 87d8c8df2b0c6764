//! Distributed lock capability.
//!
//! The matching cycle runs under a scoped lock with a bounded TTL so at
//! most one coordinator instance executes the grouping pass at a time.
//! Ownership is token-fenced: `release` with a stale token is a no-op,
//! never an error, because the lock may have expired and been re-acquired
//! by another instance. The TTL bounds worst-case starvation to one TTL
//! period; a stalled holder is simply abandoned.
//!
//! `MemoryLock` mirrors the Redis `SET NX EX` + check-and-delete contract
//! and is the test double; a Redis-backed provider implements the same
//! trait in deployment.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Fencing token proving lock ownership for one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(Uuid);

impl LockToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try to acquire the lock for `scope`. Returns a token on success,
    /// `None` when another holder is active. Never blocks on contention.
    async fn try_acquire(&self, scope: &str, ttl: Duration) -> Option<LockToken>;

    /// Release the lock if `token` still owns it; no-op otherwise.
    async fn release(&self, scope: &str, token: LockToken);
}

/// In-process lock provider with TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryLock {
    held: DashMap<String, (LockToken, Instant)>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockProvider for MemoryLock {
    async fn try_acquire(&self, scope: &str, ttl: Duration) -> Option<LockToken> {
        let token = LockToken::new();
        let deadline = Instant::now() + ttl;
        match self.held.entry(scope.to_owned()) {
            Entry::Occupied(mut slot) => {
                let (_, expires) = slot.get();
                if *expires > Instant::now() {
                    return None;
                }
                // Expired: reclaimable by the next caller.
                slot.insert((token.clone(), deadline));
                Some(token)
            }
            Entry::Vacant(slot) => {
                slot.insert((token.clone(), deadline));
                Some(token)
            }
        }
    }

    async fn release(&self, scope: &str, token: LockToken) {
        if let Entry::Occupied(slot) = self.held.entry(scope.to_owned()) {
            if slot.get().0 == token {
                slot.remove();
            }
        }
    }
}
