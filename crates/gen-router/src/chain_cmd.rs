use anyhow::Result;

use gr_config::RouterConfig;
use gr_core::{OutputFormat, Policy};
use gr_scheduler::ChainSelector;

/// Handle `gr chain`.
pub(crate) fn handle_chain(policy: Policy, cd: Option<String>, format: OutputFormat) -> Result<()> {
    let project_root = crate::determine_project_root(cd.as_deref())?;
    let config = RouterConfig::load_or_default(&project_root)?;
    let chain = ChainSelector::from_config(&config).build_chain(policy);
    let timeout = config.policy(policy).attempt_timeout_seconds;

    match format {
        OutputFormat::Json => {
            let endpoints: Vec<serde_json::Value> = chain
                .iter()
                .map(|endpoint| {
                    serde_json::json!({
                        "tier": endpoint.tier,
                        "slot": endpoint.slot,
                        "model": model_for(&config, &endpoint.tier),
                        "api_key_env": key_env_for(&config, endpoint.slot),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "policy": policy,
                "attempt_timeout_seconds": timeout,
                "cooldown_seconds": config.dispatch.cooldown_seconds,
                "endpoints": endpoints,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("{} (attempt timeout {}s)", policy, timeout);
            if chain.is_empty() {
                println!("  (no endpoints)");
            }
            for (i, endpoint) in chain.iter().enumerate() {
                println!(
                    "  {}. {} [{}] key={}",
                    i + 1,
                    endpoint,
                    model_for(&config, &endpoint.tier),
                    key_env_for(&config, endpoint.slot).unwrap_or("?")
                );
            }
        }
    }
    Ok(())
}

fn model_for<'a>(config: &'a RouterConfig, tier: &str) -> &'a str {
    config
        .tiers
        .get(tier)
        .map(|tier| tier.model.as_str())
        .unwrap_or("?")
}

fn key_env_for(config: &RouterConfig, slot: u32) -> Option<&str> {
    config
        .credential(slot)
        .map(|credential| credential.api_key_env.as_str())
}
