//! Scheduler: endpoint chain selection, cooldown registry, failure
//! classification, and per-endpoint retry decisions.

pub mod chain;
pub mod classify;
pub mod cooldown;
pub mod failover;

pub use chain::ChainSelector;
pub use classify::{Classified, classify_message, classify_status};
pub use cooldown::{
    Clock, CooldownStore, InMemoryCooldownStore, MAX_COOLDOWN, ManualClock, SystemClock,
};
pub use failover::{FailoverAction, RetryBudget, decide_action};
