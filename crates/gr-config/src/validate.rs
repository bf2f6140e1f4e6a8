use anyhow::{Result, bail};
use gr_core::Policy;
use std::collections::HashSet;
use std::path::Path;

use crate::config::{MAX_COOLDOWN_SECONDS, MAX_IN_PLACE_RETRIES, RouterConfig};

/// Validate the router configuration visible from `project_root`.
/// Falls back to the built-in defaults when no config file exists.
pub fn validate_config(project_root: &Path) -> Result<()> {
    let config = RouterConfig::load_or_default(project_root)?;
    validate_loaded_config(&config)
}

/// Validate an already loaded configuration.
/// Returns Ok(()) if valid, or Err with a descriptive message.
pub fn validate_loaded_config(config: &RouterConfig) -> Result<()> {
    config.check_schema_version()?;
    validate_backend(config)?;
    validate_tiers(config)?;
    validate_credentials(config)?;
    validate_policies(config)?;
    validate_dispatch(config)?;
    Ok(())
}

fn validate_backend(config: &RouterConfig) -> Result<()> {
    let url = config.backend.base_url.trim();
    if url.is_empty() {
        bail!("backend.base_url cannot be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!(
            "backend.base_url must start with http:// or https:// (got '{}')",
            url
        );
    }
    Ok(())
}

fn validate_tiers(config: &RouterConfig) -> Result<()> {
    if config.tiers.is_empty() {
        bail!("At least one tier must be configured");
    }
    for (tier_name, tier) in &config.tiers {
        if tier_name.trim().is_empty() {
            bail!("Tier name cannot be empty");
        }
        if tier.model.trim().is_empty() {
            bail!("Tier '{}': model cannot be empty", tier_name);
        }
    }
    Ok(())
}

fn validate_credentials(config: &RouterConfig) -> Result<()> {
    if config.credentials.is_empty() {
        bail!("At least one credential slot must be configured");
    }
    let mut seen = HashSet::new();
    for credential in &config.credentials {
        if credential.slot == 0 {
            bail!("Credential slots are numbered from 1 (got 0)");
        }
        if !seen.insert(credential.slot) {
            bail!("Duplicate credential slot {}", credential.slot);
        }
        if credential.api_key_env.trim().is_empty() {
            bail!("Credential slot {}: api_key_env cannot be empty", credential.slot);
        }
    }
    Ok(())
}

fn validate_policies(config: &RouterConfig) -> Result<()> {
    for policy in Policy::all() {
        let policy_config = config.policy(policy);
        if policy_config.tiers.is_empty() {
            bail!("Policy '{}' must list at least one tier", policy);
        }
        if policy_config.attempt_timeout_seconds == 0 {
            bail!(
                "policies.{}.attempt_timeout_seconds must be > 0 (got 0)",
                policy
            );
        }
        let mut seen = HashSet::new();
        for tier_name in &policy_config.tiers {
            let Some(tier) = config.tiers.get(tier_name) else {
                bail!(
                    "Policy '{}' references unknown tier '{}'",
                    policy,
                    tier_name
                );
            };
            if !seen.insert(tier_name.as_str()) {
                bail!("Policy '{}' lists tier '{}' twice", policy, tier_name);
            }
            if policy == Policy::LatencyFirst && tier.deliberate {
                bail!(
                    "Policy 'latency-first' cannot include deliberate tier '{}'",
                    tier_name
                );
            }
        }
    }

    let latency = config.policy(Policy::LatencyFirst).attempt_timeout_seconds;
    let quality = config.policy(Policy::QualityFirst).attempt_timeout_seconds;
    if latency > quality {
        tracing::warn!(
            latency_first = latency,
            quality_first = quality,
            "latency-first attempt timeout is longer than quality-first"
        );
    }
    Ok(())
}

fn validate_dispatch(config: &RouterConfig) -> Result<()> {
    let cooldown = config.dispatch.cooldown_seconds;
    if cooldown == 0 {
        bail!("dispatch.cooldown_seconds must be > 0 (got 0)");
    }
    if cooldown > MAX_COOLDOWN_SECONDS {
        bail!(
            "dispatch.cooldown_seconds ({}) is too high (max: {})",
            cooldown,
            MAX_COOLDOWN_SECONDS
        );
    }
    if config.dispatch.transient_retries > MAX_IN_PLACE_RETRIES {
        bail!(
            "dispatch.transient_retries ({}) is too high (max: {})",
            config.dispatch.transient_retries,
            MAX_IN_PLACE_RETRIES
        );
    }
    if config.dispatch.malformed_retries > MAX_IN_PLACE_RETRIES {
        bail!(
            "dispatch.malformed_retries ({}) is too high (max: {})",
            config.dispatch.malformed_retries,
            MAX_IN_PLACE_RETRIES
        );
    }
    Ok(())
}
