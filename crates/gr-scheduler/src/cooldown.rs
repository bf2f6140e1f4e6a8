//! Process-wide cooldown registry.
//!
//! Expiry is computed lazily on read: an endpoint that is absent, or whose
//! `cool_until <= now`, is eligible. There is no background sweep.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use gr_core::EndpointId;
use tracing::debug;

/// Longest cooldown the store records; longer requests are saturated.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Used when `now + MAX_COOLDOWN` overflows the platform `Instant`.
const MAX_COOLDOWN_FALLBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Monotonic time source, injectable so tests can control expiry.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

/// Shared cooldown state keyed by endpoint.
///
/// Implementations must tolerate concurrent readers and writers: a write to
/// one endpoint must not lose a concurrent write to another.
pub trait CooldownStore: Send + Sync {
    fn is_eligible(&self, endpoint: &EndpointId) -> bool;

    fn mark_cooling(&self, endpoint: &EndpointId, duration: Duration);

    /// Remaining cooldown per endpoint still cooling, sorted by endpoint.
    fn active(&self) -> Vec<(EndpointId, Duration)>;
}

/// In-process registry backed by a sharded concurrent map.
#[derive(Debug)]
pub struct InMemoryCooldownStore {
    entries: DashMap<EndpointId, Instant>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCooldownStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Default for InMemoryCooldownStore {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

impl CooldownStore for InMemoryCooldownStore {
    fn is_eligible(&self, endpoint: &EndpointId) -> bool {
        let now = self.clock.now();
        // Copy out so the shard guard is released before remove_if.
        let cool_until = self.entries.get(endpoint).map(|entry| *entry.value());
        match cool_until {
            None => true,
            Some(until) if until <= now => {
                // A concurrent mark_cooling may have extended it; only drop stale entries.
                self.entries.remove_if(endpoint, |_, until| *until <= now);
                true
            }
            Some(_) => false,
        }
    }

    fn mark_cooling(&self, endpoint: &EndpointId, duration: Duration) {
        let now = self.clock.now();
        let duration = duration.min(MAX_COOLDOWN);
        let until = now
            .checked_add(duration)
            .or_else(|| now.checked_add(MAX_COOLDOWN_FALLBACK))
            .unwrap_or(now);
        self.entries
            .entry(endpoint.clone())
            .and_modify(|existing| *existing = (*existing).max(until))
            .or_insert(until);
        debug!(
            tier = %endpoint.tier,
            slot = endpoint.slot,
            cooldown_secs = duration.as_secs(),
            "endpoint cooling"
        );
    }

    fn active(&self) -> Vec<(EndpointId, Duration)> {
        let now = self.clock.now();
        let mut active: Vec<(EndpointId, Duration)> = self
            .entries
            .iter()
            .filter(|entry| *entry.value() > now)
            .map(|entry| (entry.key().clone(), *entry.value() - now))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }
}
