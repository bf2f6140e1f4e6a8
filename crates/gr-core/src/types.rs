use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Caller-declared latency/quality tradeoff for one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Best reasoning tier first; the deliberate tier is the last resort.
    QualityFirst,
    /// Fast tiers only; the deliberate tier is never attempted.
    LatencyFirst,
}

impl Policy {
    /// Returns the config/CLI-facing token for this policy
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QualityFirst => "quality-first",
            Self::LatencyFirst => "latency-first",
        }
    }

    pub fn all() -> [Policy; 2] {
        [Self::QualityFirst, Self::LatencyFirst]
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quality-first" => Ok(Self::QualityFirst),
            "latency-first" => Ok(Self::LatencyFirst),
            other => Err(format!(
                "Invalid policy '{}'. Valid values: quality-first, latency-first",
                other
            )),
        }
    }
}

/// One (model-tier, credential-slot) combination.
///
/// This is an identity, not a live connection: it is the unit of failure
/// and cooldown and is used as a map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId {
    pub tier: String,
    pub slot: u32,
}

impl EndpointId {
    pub fn new(tier: impl Into<String>, slot: u32) -> Self {
        Self {
            tier: tier.into(),
            slot,
        }
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tier, self.slot)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-tagged message in a conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
