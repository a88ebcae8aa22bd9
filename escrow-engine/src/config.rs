//! Node configuration
//!
//! Defaults are layered under an optional TOML file and `DEEDLOCK__*`
//! environment variables, e.g. `DEEDLOCK__POLICY__ENFORCE_EARNEST_MINIMUM=true`.

use crate::{error::EscrowError, EscrowResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DEEDLOCK";

/// Configuration for the property registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Collection name
    pub name: String,
    /// Collection ticker
    pub symbol: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "Real Estate".to_string(),
            symbol: "REAL".to_string(),
        }
    }
}

/// Policy switches for the escrow coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowPolicy {
    /// Reject earnest deposits below the listing's escrow amount
    pub enforce_earnest_minimum: bool,
}

/// Configuration for the escrow node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowNodeConfig {
    /// Property registry configuration
    pub registry: RegistryConfig,
    /// Escrow coordinator policy
    pub policy: EscrowPolicy,
}

impl EscrowNodeConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> EscrowResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EscrowResult<()> {
        if self.registry.name.trim().is_empty() {
            return Err(EscrowError::config("Registry name cannot be empty"));
        }

        if self.registry.symbol.trim().is_empty() {
            return Err(EscrowError::config("Registry symbol cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EscrowNodeConfig::default();

        assert_eq!(config.registry.symbol, "REAL");
        assert!(!config.policy.enforce_earnest_minimum);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[registry]\nname = \"Harbor Homes\"\n\n[policy]\nenforce_earnest_minimum = true"
        )
        .unwrap();

        let config = EscrowNodeConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.registry.name, "Harbor Homes");
        assert_eq!(config.registry.symbol, "REAL");
        assert!(config.policy.enforce_earnest_minimum);
    }

    #[test]
    fn test_rejects_empty_symbol() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[registry]\nsymbol = \" \"").unwrap();

        let result = EscrowNodeConfig::load(Some(file.path()));
        assert!(matches!(result, Err(EscrowError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = EscrowNodeConfig::load(Some(Path::new("/nonexistent/deedlock.toml")));
        assert!(matches!(result, Err(EscrowError::Config(_))));
    }
}
