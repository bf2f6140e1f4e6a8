//! Router configuration loading and validation (.gr/config.toml).

pub mod config;
pub mod validate;

pub use config::{
    BackendConfig, CURRENT_SCHEMA_VERSION, CredentialConfig, DispatchConfig, MAX_COOLDOWN_SECONDS,
    MAX_IN_PLACE_RETRIES, PoliciesConfig, PolicyConfig, RouterConfig, TierConfig,
};
pub use validate::{validate_config, validate_loaded_config};
