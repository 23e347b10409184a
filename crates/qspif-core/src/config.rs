//! Device configuration
//!
//! Loaded from a `[qspif]` TOML table:
//!
//! ```toml
//! [qspif]
//! frequency_hz = "40000000"
//! soft_reset = "enable-and-reset"
//! ready_poll_interval_us = 1000
//! ready_poll_max_retries = 0x2710
//! enable_fast_read = true
//! ```

use std::format;
use std::string::String;

use crate::protocol::ReadyPoll;
use crate::sfdp::SoftResetMethod;

/// Default bus clock
pub const DEFAULT_FREQUENCY_HZ: u32 = 40_000_000;

/// Configuration loading error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The input is not valid TOML or does not match the schema
    #[error("invalid configuration: {0}")]
    Parse(String),
    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Soft reset selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoftResetConfig {
    /// Use whatever SFDP advertises
    #[default]
    Sfdp,
    /// Always issue F0h
    Direct,
    /// Always issue 66h then 99h
    EnableAndReset,
}

impl SoftResetConfig {
    /// The forced method, if any
    pub fn forced(&self) -> Option<SoftResetMethod> {
        match self {
            SoftResetConfig::Sfdp => None,
            SoftResetConfig::Direct => Some(SoftResetMethod::Direct),
            SoftResetConfig::EnableAndReset => Some(SoftResetMethod::EnableAndReset),
        }
    }
}

/// Per-device settings
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Bus clock applied at every first init
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub frequency_hz: u32,
    /// Soft reset sequence
    pub soft_reset: SoftResetConfig,
    /// Sleep between ready polls
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub ready_poll_interval_us: u32,
    /// Ready poll cap
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub ready_poll_max_retries: u32,
    /// Use the fastest read mode SFDP describes instead of plain 03h
    pub enable_fast_read: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let poll = ReadyPoll::default();
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            soft_reset: SoftResetConfig::Sfdp,
            ready_poll_interval_us: poll.interval_us,
            ready_poll_max_retries: poll.max_retries,
            enable_fast_read: true,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ConfigFile {
    #[serde(default)]
    qspif: DeviceConfig,
}

impl DeviceConfig {
    /// Parse a configuration from TOML text
    ///
    /// A missing `[qspif]` table yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(format!("{}", e)))?;
        file.qspif.validate()?;
        Ok(file.qspif)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frequency_hz",
                reason: "must be non-zero",
            });
        }
        if self.ready_poll_max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ready_poll_max_retries",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    /// Ready poll parameters
    pub fn ready_poll(&self) -> ReadyPoll {
        ReadyPoll {
            interval_us: self.ready_poll_interval_us,
            max_retries: self.ready_poll_max_retries,
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.frequency_hz, 40_000_000);
        assert_eq!(config.soft_reset, SoftResetConfig::Sfdp);
        assert_eq!(config.ready_poll(), ReadyPoll::default());
        assert!(config.enable_fast_read);
    }

    #[test]
    fn test_empty_input_is_default() {
        assert_eq!(DeviceConfig::from_toml_str("").unwrap(), DeviceConfig::default());
    }

    #[test]
    fn test_parse_table() {
        let config = DeviceConfig::from_toml_str(
            r#"
            [qspif]
            frequency_hz = "0x2FAF080"
            soft_reset = "enable-and-reset"
            ready_poll_max_retries = 500
            enable_fast_read = false
            "#,
        )
        .unwrap();
        assert_eq!(config.frequency_hz, 50_000_000);
        assert_eq!(config.soft_reset.forced(), Some(SoftResetMethod::EnableAndReset));
        assert_eq!(config.ready_poll_max_retries, 500);
        assert_eq!(config.ready_poll_interval_us, 1000);
        assert!(!config.enable_fast_read);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            DeviceConfig::from_toml_str("[qspif]\nfrequency_hz = 0"),
            Err(ConfigError::InvalidValue { field: "frequency_hz", .. })
        ));
        assert!(matches!(
            DeviceConfig::from_toml_str("[qspif]\nfrequency_hz = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            DeviceConfig::from_toml_str("[qspif]\nbogus = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
