//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_FREE_SHIPPING_THRESHOLD=800                             │
//! │     STOREFRONT_DB_PATH=/var/lib/storefront/store.db                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     storefront.toml                                                    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     600 threshold, 50 fee, 12 units per line                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # storefront.toml
//! [pricing]
//! free_shipping_threshold = 600   # major units, strictly above ships free
//! shipping_fee = 50
//!
//! [cart]
//! max_units_per_line = 12
//!
//! [database]
//! path = "./storefront.db"
//! max_connections = 5
//!
//! [notifications]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use storefront_core::{
    Money, ShippingPolicy, FLAT_SHIPPING_FEE_MAJOR, FREE_SHIPPING_THRESHOLD_MAJOR,
    MAX_UNITS_PER_LINE,
};
use storefront_db::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The named key holds a value that cannot be used.
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Subtotals strictly above this ship free (major units).
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: i64,

    /// Flat fee below the threshold (major units).
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: i64,
}

fn default_free_shipping_threshold() -> i64 {
    FREE_SHIPPING_THRESHOLD_MAJOR
}

fn default_shipping_fee() -> i64 {
    FLAT_SHIPPING_FEE_MAJOR
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            free_shipping_threshold: default_free_shipping_threshold(),
            shipping_fee: default_shipping_fee(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSettings {
    #[serde(default = "default_max_units")]
    pub max_units_per_line: u32,
}

fn default_max_units() -> u32 {
    MAX_UNITS_PER_LINE
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            max_units_per_line: default_max_units(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./storefront.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub cart: CartSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file, when given and present
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with<F>(config_path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `STOREFRONT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STOREFRONT_FREE_SHIPPING_THRESHOLD") {
            self.pricing.free_shipping_threshold =
                parse_value("STOREFRONT_FREE_SHIPPING_THRESHOLD", &value)?;
        }

        if let Some(value) = lookup("STOREFRONT_SHIPPING_FEE") {
            self.pricing.shipping_fee = parse_value("STOREFRONT_SHIPPING_FEE", &value)?;
        }

        if let Some(value) = lookup("STOREFRONT_MAX_UNITS_PER_LINE") {
            self.cart.max_units_per_line = parse_value("STOREFRONT_MAX_UNITS_PER_LINE", &value)?;
        }

        if let Some(value) = lookup("STOREFRONT_DB_PATH") {
            debug!(path = %value, "Overriding database path from environment");
            self.database.path = PathBuf::from(value);
        }

        if let Some(value) = lookup("STOREFRONT_NOTIFICATIONS") {
            self.notifications.enabled = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => return Err(ConfigError::InvalidValue("STOREFRONT_NOTIFICATIONS".into())),
            };
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.free_shipping_threshold < 0 {
            return Err(ConfigError::InvalidValue(
                "pricing.free_shipping_threshold".into(),
            ));
        }
        if self.pricing.shipping_fee < 0 {
            return Err(ConfigError::InvalidValue("pricing.shipping_fee".into()));
        }
        if self.cart.max_units_per_line == 0 {
            return Err(ConfigError::InvalidValue("cart.max_units_per_line".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".into()));
        }
        Ok(())
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy::new(
            Money::from_major(self.pricing.free_shipping_threshold),
            Money::from_major(self.pricing.shipping_fee),
        )
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pricing.free_shipping_threshold, 600);
        assert_eq!(config.pricing.shipping_fee, 50);
        assert_eq!(config.cart.max_units_per_line, 12);
        assert!(config.notifications.enabled);
        assert_eq!(config.shipping_policy(), ShippingPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [pricing]
            shipping_fee = 80

            [notifications]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.pricing.shipping_fee, 80);
        assert_eq!(config.pricing.free_shipping_threshold, 600);
        assert_eq!(config.cart.max_units_per_line, 12);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = EngineConfig::from_toml_str("[cart]\nmax_units_per_line = 6\n").unwrap();
        config
            .apply_overrides(env(&[
                ("STOREFRONT_MAX_UNITS_PER_LINE", "4"),
                ("STOREFRONT_DB_PATH", "/tmp/shop.db"),
                ("STOREFRONT_NOTIFICATIONS", "off"),
            ]))
            .unwrap();
        assert_eq!(config.cart.max_units_per_line, 4);
        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn test_invalid_env_value_names_the_key() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(env(&[("STOREFRONT_SHIPPING_FEE", "fifty")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(ref key) if key == "STOREFRONT_SHIPPING_FEE")
        );
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.cart.max_units_per_line = 0;
        assert!(config.validate().is_err());

        config.cart.max_units_per_line = 12;
        config.pricing.shipping_fee = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            EngineConfig::load_with(Some(Path::new("/nonexistent/storefront.toml")), env(&[]))
                .unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        let err = EngineConfig::load_with(None, env(&[("STOREFRONT_MAX_UNITS_PER_LINE", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "cart.max_units_per_line"));
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[pricing]"));
        assert!(toml_str.contains("[cart]"));
    }
}
