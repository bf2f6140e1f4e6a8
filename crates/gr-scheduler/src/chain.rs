//! Endpoint chain selection.
//!
//! A chain is tier-major, slot-minor: every credential slot of a tier is
//! tried before the walk falls back to the next tier, so a rate limit on one
//! credential is worked around without giving up model quality.

use gr_config::RouterConfig;
use gr_core::{EndpointId, Policy};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSelector {
    quality_first: Vec<String>,
    latency_first: Vec<String>,
    slots: Vec<u32>,
}

impl ChainSelector {
    pub fn new(quality_first: Vec<String>, latency_first: Vec<String>, slots: Vec<u32>) -> Self {
        Self {
            quality_first,
            latency_first,
            slots,
        }
    }

    /// Build the selector from config.
    ///
    /// Deliberate tiers are dropped from `latency-first` even if a config
    /// slipped past validation.
    pub fn from_config(config: &RouterConfig) -> Self {
        let latency_first = config
            .policy(Policy::LatencyFirst)
            .tiers
            .iter()
            .filter(|name| !config.tiers.get(*name).is_some_and(|tier| tier.deliberate))
            .cloned()
            .collect();
        Self {
            quality_first: config.policy(Policy::QualityFirst).tiers.clone(),
            latency_first,
            slots: config.credential_slots(),
        }
    }

    pub fn tiers(&self, policy: Policy) -> &[String] {
        match policy {
            Policy::QualityFirst => &self.quality_first,
            Policy::LatencyFirst => &self.latency_first,
        }
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    /// Ordered endpoints to attempt for `policy`. Deterministic for a fixed selector.
    pub fn build_chain(&self, policy: Policy) -> Vec<EndpointId> {
        let chain: Vec<EndpointId> = self
            .tiers(policy)
            .iter()
            .flat_map(|tier| {
                self.slots
                    .iter()
                    .map(move |slot| EndpointId::new(tier.as_str(), *slot))
            })
            .collect();
        debug!(policy = %policy, endpoints = chain.len(), "built endpoint chain");
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_config::{CredentialConfig, TierConfig};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_tiers_two_slots_is_tier_major() {
        let selector = ChainSelector::new(names(&["a", "b"]), names(&["a"]), vec![1, 2]);
        let chain = selector.build_chain(Policy::QualityFirst);
        assert_eq!(
            chain,
            vec![
                EndpointId::new("a", 1),
                EndpointId::new("a", 2),
                EndpointId::new("b", 1),
                EndpointId::new("b", 2),
            ]
        );
    }

    #[test]
    fn test_chain_is_deterministic() {
        let selector = ChainSelector::from_config(&RouterConfig::default());
        for policy in Policy::all() {
            assert_eq!(selector.build_chain(policy), selector.build_chain(policy));
        }
    }

    #[test]
    fn test_default_latency_first_excludes_deliberate() {
        let config = RouterConfig::default();
        let selector = ChainSelector::from_config(&config);

        let latency = selector.build_chain(Policy::LatencyFirst);
        assert!(!latency.is_empty());
        assert!(latency.iter().all(|e| !config.tiers[&e.tier].deliberate));

        let quality = selector.build_chain(Policy::QualityFirst);
        let last = quality.last().unwrap();
        assert!(config.tiers[&last.tier].deliberate);
    }

    #[test]
    fn test_from_config_filters_misconfigured_deliberate_tier() {
        let mut config = RouterConfig::default();
        config.tiers.insert(
            "slow".to_string(),
            TierConfig {
                model: "slow-model".to_string(),
                description: String::new(),
                deliberate: true,
            },
        );
        config.policies.latency_first.tiers = names(&["fast", "slow"]);
        config.credentials = vec![CredentialConfig {
            slot: 1,
            api_key_env: "K".to_string(),
        }];

        let selector = ChainSelector::from_config(&config);
        assert_eq!(
            selector.build_chain(Policy::LatencyFirst),
            vec![EndpointId::new("fast", 1)]
        );
    }

    #[test]
    fn test_slot_order_follows_config() {
        let selector = ChainSelector::new(names(&["a"]), names(&["a"]), vec![3, 1, 2]);
        let slots: Vec<u32> = selector
            .build_chain(Policy::LatencyFirst)
            .iter()
            .map(|e| e.slot)
            .collect();
        assert_eq!(slots, vec![3, 1, 2]);
    }

    #[test]
    fn test_no_slots_means_empty_chain() {
        let selector = ChainSelector::new(names(&["a", "b"]), names(&["a"]), vec![]);
        assert!(selector.build_chain(Policy::QualityFirst).is_empty());
    }
}
