use anyhow::{Context, Result};
use gr_core::Policy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current schema version for config.toml
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Immediate retries allowed on one endpoint per failure class.
pub const MAX_IN_PLACE_RETRIES: u32 = 1;

/// Longest accepted cooldown (one day).
pub const MAX_COOLDOWN_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Model tiers keyed by tier name. The tier name is the `tier` half of an endpoint.
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierConfig>,
    /// Credential slots, enumerated in this order within every tier.
    #[serde(default = "default_credentials")]
    pub credentials: Vec<CredentialConfig>,
    #[serde(default)]
    pub policies: PoliciesConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            backend: BackendConfig::default(),
            tiers: default_tiers(),
            credentials: default_credentials(),
            policies: PoliciesConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Ask the backend for a JSON object response (`response_format`).
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            json_mode: true,
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Model identifier sent to the backend.
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Slow extended-reasoning tier. Never eligible under `latency-first`.
    #[serde(default)]
    pub deliberate: bool,
}

fn default_tiers() -> BTreeMap<String, TierConfig> {
    let tier = |model: &str, description: &str, deliberate: bool| TierConfig {
        model: model.to_string(),
        description: description.to_string(),
        deliberate,
    };
    BTreeMap::from([
        (
            "reasoning".to_string(),
            tier("gemini-2.5-pro", "Highest reasoning quality", false),
        ),
        (
            "balanced".to_string(),
            tier("gemini-2.5-flash", "Good quality, fast", false),
        ),
        (
            "fast".to_string(),
            tier("gemini-2.5-flash-lite", "Fastest responses", false),
        ),
        (
            "deliberate".to_string(),
            tier(
                "gemini-2.5-pro-thinking",
                "Extended thinking, last resort for quality-first",
                true,
            ),
        ),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub slot: u32,
    /// Environment variable holding the API key for this slot.
    pub api_key_env: String,
}

fn default_credentials() -> Vec<CredentialConfig> {
    (1..=2)
        .map(|slot| CredentialConfig {
            slot,
            api_key_env: format!("GR_API_KEY_{slot}"),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Tier names in attempt order.
    pub tiers: Vec<String>,
    pub attempt_timeout_seconds: u64,
}

impl PolicyConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliciesConfig {
    #[serde(rename = "quality-first", default = "default_quality_first")]
    pub quality_first: PolicyConfig,
    #[serde(rename = "latency-first", default = "default_latency_first")]
    pub latency_first: PolicyConfig,
}

impl PoliciesConfig {
    pub fn get(&self, policy: Policy) -> &PolicyConfig {
        match policy {
            Policy::QualityFirst => &self.quality_first,
            Policy::LatencyFirst => &self.latency_first,
        }
    }
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            quality_first: default_quality_first(),
            latency_first: default_latency_first(),
        }
    }
}

fn default_quality_first() -> PolicyConfig {
    PolicyConfig {
        tiers: ["reasoning", "balanced", "fast", "deliberate"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        attempt_timeout_seconds: 60,
    }
}

fn default_latency_first() -> PolicyConfig {
    PolicyConfig {
        tiers: ["balanced", "fast"].iter().map(|s| s.to_string()).collect(),
        attempt_timeout_seconds: 5,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cooldown applied to an endpoint after a rate-limit classification.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Immediate retries on the same endpoint after a transient failure (0 or 1).
    #[serde(default = "default_one")]
    pub transient_retries: u32,
    /// Immediate retries on the same endpoint after a malformed response (0 or 1).
    #[serde(default = "default_one")]
    pub malformed_retries: u32,
}

impl DispatchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            transient_retries: 1,
            malformed_retries: 1,
        }
    }
}

fn default_cooldown_seconds() -> u64 {
    60
}

fn default_one() -> u32 {
    1
}

/// Deep merge two TOML values. Overlay wins for non-table values.
/// Tables are merged recursively (project-level keys override user-level keys).
fn merge_toml_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_map), toml::Value::Table(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged_val = match base_map.remove(&key) {
                    Some(base_val) => merge_toml_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged_val);
            }
            toml::Value::Table(base_map)
        }
        (_, overlay) => overlay,
    }
}

impl RouterConfig {
    /// Load config with fallback chain:
    ///
    /// 1. If both `.gr/config.toml` (project) and `~/.config/gen-router/config.toml` (user)
    ///    exist, deep-merge them with project settings overriding user settings.
    /// 2. If only one of them exists, use it directly.
    /// 3. If neither exists, return None.
    pub fn load(project_root: &Path) -> Result<Option<Self>> {
        let project_path = Self::config_path(project_root);
        let user_path = Self::user_config_path();
        Self::load_with_paths(user_path.as_deref(), &project_path)
    }

    /// Like [`RouterConfig::load`], falling back to the built-in defaults.
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        Ok(Self::load(project_root)?.unwrap_or_default())
    }

    /// Load config from explicit paths. Testable without global filesystem state.
    pub(crate) fn load_with_paths(
        user_path: Option<&Path>,
        project_path: &Path,
    ) -> Result<Option<Self>> {
        let user_path = user_path.filter(|p| p.exists());
        let project_exists = project_path.exists();

        match (user_path, project_exists) {
            (None, false) => Ok(None),
            (Some(user), false) => Self::load_from_path(user).map(Some),
            (None, true) => Self::load_from_path(project_path).map(Some),
            (Some(user), true) => Self::load_merged(user, project_path).map(Some),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded router config");
        Ok(config)
    }

    /// Deep-merge user config (base) with project config (overlay).
    fn load_merged(base_path: &Path, overlay_path: &Path) -> Result<Self> {
        let base_str = std::fs::read_to_string(base_path)
            .with_context(|| format!("Failed to read user config: {}", base_path.display()))?;
        let overlay_str = std::fs::read_to_string(overlay_path).with_context(|| {
            format!("Failed to read project config: {}", overlay_path.display())
        })?;

        let base_val: toml::Value = toml::from_str(&base_str)
            .with_context(|| format!("Failed to parse user config: {}", base_path.display()))?;
        let overlay_val: toml::Value = toml::from_str(&overlay_str).with_context(|| {
            format!("Failed to parse project config: {}", overlay_path.display())
        })?;

        let merged = merge_toml_values(base_val, overlay_val);
        // Roundtrip through string for reliable deserialization
        let merged_str = toml::to_string(&merged).context("Failed to serialize merged config")?;
        let config: Self =
            toml::from_str(&merged_str).context("Failed to deserialize merged config")?;
        tracing::debug!(
            user = %base_path.display(),
            project = %overlay_path.display(),
            "loaded merged router config"
        );
        Ok(config)
    }

    /// Path to user-level config: `~/.config/gen-router/config.toml`.
    ///
    /// Returns None if the config directory cannot be determined
    /// (e.g., no HOME in containers).
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "gen-router")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config file path for a project root
    pub fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(".gr").join("config.toml")
    }

    /// Save config to .gr/config.toml
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let config_path = Self::config_path(project_root);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        Ok(())
    }

    /// Check if the config schema version is compatible with the current binary.
    pub fn check_schema_version(&self) -> Result<()> {
        if self.schema_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "Config schema version {} is newer than this binary supports (v{}).",
                self.schema_version,
                CURRENT_SCHEMA_VERSION
            );
        }
        Ok(())
    }

    pub fn policy(&self, policy: Policy) -> &PolicyConfig {
        self.policies.get(policy)
    }

    /// Credential slot numbers in configured order.
    pub fn credential_slots(&self) -> Vec<u32> {
        self.credentials.iter().map(|c| c.slot).collect()
    }

    pub fn credential(&self, slot: u32) -> Option<&CredentialConfig> {
        self.credentials.iter().find(|c| c.slot == slot)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
