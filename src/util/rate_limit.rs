//! Abuse control: per-origin connection quotas and per-connection
//! message-rate policing.
//!
//! This is the only gate between the untrusted transport and the
//! simulation. Downstream code may assume a bounded message rate per
//! connection but must never assume message content is well-formed.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified permits per second
pub fn create_limiter(per_second: u32) -> Limiter {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Per-connection inbound message budget. The first rejected message is
/// grounds for terminating the connection.
pub struct MessageBudget {
    limiter: Limiter,
}

impl MessageBudget {
    pub fn new(messages_per_second: u32) -> Self {
        Self {
            limiter: create_limiter(messages_per_second),
        }
    }

    /// Check whether one more inbound message is allowed
    pub fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Tracks live connection counts per origin address and enforces the
/// per-origin ceiling before a connection is admitted.
pub struct ConnectionGuard {
    max_per_origin: u32,
    counts: Mutex<HashMap<IpAddr, u32>>,
}

impl ConnectionGuard {
    pub fn new(max_per_origin: u32) -> Self {
        Self {
            max_per_origin,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Try to claim a connection slot for the origin. Returns a guard that
    /// releases the slot on drop, or `None` if the origin is at its ceiling.
    pub fn acquire(self: &Arc<Self>, origin: IpAddr) -> Option<OriginSlot> {
        let mut counts = self.counts.lock();
        let count = counts.entry(origin).or_insert(0);
        if *count >= self.max_per_origin {
            return None;
        }
        *count += 1;
        Some(OriginSlot {
            origin,
            guard: Arc::clone(self),
        })
    }

    /// Live connection count for an origin
    pub fn count(&self, origin: IpAddr) -> u32 {
        self.counts.lock().get(&origin).copied().unwrap_or(0)
    }

    fn release(&self, origin: IpAddr) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&origin) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&origin);
            }
        }
    }
}

/// RAII handle to one admitted connection's slot
pub struct OriginSlot {
    origin: IpAddr,
    guard: Arc<ConnectionGuard>,
}

impl Drop for OriginSlot {
    fn drop(&mut self) {
        self.guard.release(self.origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn origin_quota_rejects_over_limit() {
        let guard = Arc::new(ConnectionGuard::new(2));
        let a = guard.acquire(ip(1));
        let b = guard.acquire(ip(1));
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(guard.acquire(ip(1)).is_none());
        // Other origins are unaffected
        assert!(guard.acquire(ip(2)).is_some());
    }

    #[test]
    fn slot_released_on_drop() {
        let guard = Arc::new(ConnectionGuard::new(1));
        let slot = guard.acquire(ip(1)).unwrap();
        assert_eq!(guard.count(ip(1)), 1);
        drop(slot);
        assert_eq!(guard.count(ip(1)), 0);
        assert!(guard.acquire(ip(1)).is_some());
    }

    #[test]
    fn message_budget_denies_burst_over_ceiling() {
        let budget = MessageBudget::new(5);
        for _ in 0..5 {
            assert!(budget.allow());
        }
        assert!(!budget.allow());
    }
}
