//! Pool configuration.
//!
//! Values come from code (`PoolConfig::default()` plus builders), a TOML
//! document, or `WEFT_*` environment variables.

use serde::Deserialize;
use thiserror::Error;

const ENV_POOL_NAME: &str = "WEFT_POOL_NAME";
const ENV_DETECT_SELF_DELEGATION: &str = "WEFT_DETECT_SELF_DELEGATION";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid pool configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value `{value}` for {var}: expected true/false")]
    InvalidFlag { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Label attached to the pool's tracing spans.
    pub name: String,
    /// Reject a workflow that asks the pool for an update of its own id.
    pub detect_self_delegation: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            detect_self_delegation: true,
        }
    }
}

impl PoolConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_self_delegation_check(mut self, enabled: bool) -> Self {
        self.detect_self_delegation = enabled;
        self
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```
    /// let config = weft_core::PoolConfig::from_toml_str("name = \"checkout\"").unwrap();
    /// assert_eq!(config.name, "checkout");
    /// assert!(config.detect_self_delegation);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Defaults overridden by `WEFT_POOL_NAME` and `WEFT_DETECT_SELF_DELEGATION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_POOL_NAME) {
            config.name = name;
        }

        if let Some(value) = lookup(ENV_DETECT_SELF_DELEGATION) {
            config.detect_self_delegation = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        var: ENV_DETECT_SELF_DELEGATION,
                        value,
                    });
                }
            };
        }

        Ok(config)
    }
}
