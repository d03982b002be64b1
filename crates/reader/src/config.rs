//! Reader configuration
//!
//! Layered with `figment`: built-in defaults, then a TOML file, then
//! `NFCAUTH_`-prefixed environment variables (nested keys separated by `__`,
//! e.g. `NFCAUTH_READER__READER_NAME`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commands::MAX_REQUEST_LEN;
use crate::wire::{AuthChallenge, RegistrationRequest};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "nfcauth.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "NFCAUTH_";

/// Longest application identifier a SELECT may carry
pub const MAX_AID_LEN: usize = 16;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A provider failed or a value has the wrong type
    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the token should confirm an authentication request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// The token signs without involving its holder
    #[default]
    Background,
    /// The token asks its holder for a biometric unlock first
    Biometric,
}

/// Identity the reader presents to tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderIdentity {
    /// Stable reader id, bound into every registration
    pub reader_id: String,
    /// Human readable name shown on the token
    pub reader_name: String,
    /// Application identifier selected on the token
    #[serde(with = "hex::serde")]
    pub application_id: Vec<u8>,
    /// Protocol version announced in every request
    pub protocol_version: u32,
    /// Requested confirmation mode
    pub auth_mode: AuthMode,
    /// Random bytes per authentication nonce
    pub nonce_length: usize,
}

impl Default for ReaderIdentity {
    fn default() -> Self {
        Self {
            reader_id: "test-reader-1234".to_string(),
            reader_name: "Test NFC Reader".to_string(),
            application_id: b"\xF0de.infornautik".to_vec(),
            protocol_version: 1,
            auth_mode: AuthMode::Background,
            nonce_length: 16,
        }
    }
}

/// Session loop tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pause between presence polls
    pub poll_interval_ms: u64,
    /// Pause after a failed presentation
    pub retry_delay_ms: u64,
    /// Bound on GET RESPONSE rounds per logical response
    pub max_response_chunks: usize,
    /// Consecutive deferred registration answers tolerated
    pub max_deferred_polls: u32,
    /// Location of the JSON credential store
    pub store_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            retry_delay_ms: 1000,
            max_response_chunks: 64,
            max_deferred_polls: 30,
            store_path: PathBuf::from("nfcauth-devices.json"),
        }
    }
}

impl SessionConfig {
    /// Pause between presence polls
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause after a failed presentation
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Complete reader configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Identity presented to tokens
    pub reader: ReaderIdentity,
    /// Session loop tuning
    pub session: SessionConfig,
}

impl ReaderConfig {
    /// Provider stack for `path`, or the default config file if present
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()));

        let figment = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, complete and validate the configuration
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// Extract from an already assembled provider stack
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract().map_err(Box::new)?;

        if config.reader.reader_id.is_empty() {
            config.reader.reader_id = uuid::Uuid::new_v4().to_string();
            info!(reader_id = %config.reader.reader_id, "Generated reader id");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every value is in range and every request fits in a frame
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reader = &self.reader;

        if reader.application_id.is_empty() || reader.application_id.len() > MAX_AID_LEN {
            return Err(ConfigError::Invalid(format!(
                "application_id must be 1-{MAX_AID_LEN} bytes, got {}",
                reader.application_id.len()
            )));
        }
        if reader.reader_id.is_empty() || reader.reader_name.is_empty() {
            return Err(ConfigError::Invalid("reader_id and reader_name must not be empty".into()));
        }
        if !(8..=64).contains(&reader.nonce_length) {
            return Err(ConfigError::Invalid(format!(
                "nonce_length must be 8-64, got {}",
                reader.nonce_length
            )));
        }
        if self.session.max_response_chunks == 0 {
            return Err(ConfigError::Invalid("max_response_chunks must be at least 1".into()));
        }

        let placeholder_nonce = "0".repeat(reader.nonce_length * 2);
        let sizes = [
            ("registration request", RegistrationRequest::new(reader).encoded_len()),
            ("authentication request", AuthChallenge::new(reader, placeholder_nonce).encoded_len()),
        ];
        for (name, len) in sizes {
            let len = len.map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if len > MAX_REQUEST_LEN {
                return Err(ConfigError::Invalid(format!(
                    "{name} is {len} bytes (max {MAX_REQUEST_LEN}); shorten reader_id or reader_name"
                )));
            }
        }

        Ok(())
    }
}
