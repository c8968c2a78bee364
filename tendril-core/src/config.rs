//! Runtime configuration.
//!
//! A `Config` is owned by the [`Runtime`](crate::reactive::Runtime) and read
//! by everything that needs to know the directive prefix or the effect
//! nesting limit. It can be built in code or loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default attribute prefix for directives (`a-text`, `a-on:click`, ...).
pub const DEFAULT_PREFIX: &str = "a-";

/// Default maximum number of effects that may be nested on the effect stack.
pub const DEFAULT_MAX_EFFECT_DEPTH: usize = 100;

/// Configuration shared by a runtime and the walkers bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix that marks an attribute as a directive.
    pub prefix: String,

    /// Upper bound on nested effect execution. Exceeding it is reported as
    /// an error instead of overflowing the call stack.
    pub max_effect_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            max_effect_depth: DEFAULT_MAX_EFFECT_DEPTH,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the directive prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replace the effect nesting limit.
    pub fn with_max_effect_depth(mut self, depth: usize) -> Self {
        self.max_effect_depth = depth;
        self
    }

    /// Full attribute name for a directive, e.g. `attribute("data")` is `a-data`.
    pub fn attribute(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }
        if self.max_effect_depth == 0 {
            return Err(Error::Config(
                "max_effect_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.prefix, "a-");
        assert_eq!(config.max_effect_depth, 100);
        assert_eq!(config.attribute("data"), "a-data");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "prefix": "x-" }"#).unwrap();
        assert_eq!(config.prefix, "x-");
        assert_eq!(config.max_effect_depth, DEFAULT_MAX_EFFECT_DEPTH);
        assert_eq!(config.attribute("for"), "x-for");
    }

    #[test]
    fn rejects_empty_prefix() {
        let err = Config::from_json(r#"{ "prefix": "" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Config::from_json("{ prefix").is_err());
    }
}
