//! Application settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `MODERATION_*` environment variables and an
//! optional configuration file. Every field is optional; accessors supply
//! the defaults.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::ModerationSettings;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The bind address is not a socket address.
    #[error("invalid bind address {value}: {message}")]
    InvalidBindAddr { value: String, message: String },
}

/// Runtime configuration for the moderation server.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MODERATION")]
pub struct AppSettings {
    /// Socket address the HTTP server listens on.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; in-memory adapters are used when absent.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
    /// Timeout applied to each target record call, in milliseconds.
    pub gateway_timeout_ms: Option<u64>,
    /// Most proposals one batch approval may cover.
    pub batch_max_size: Option<usize>,
    /// Proposals applied concurrently within a batch.
    pub batch_concurrency: Option<usize>,
    /// Idle time before an unrecorded apply claim may be released, in
    /// milliseconds.
    pub stale_claim_after_ms: Option<u64>,
    /// Apply embedded migrations before serving.
    pub run_migrations: Option<bool>,
}

impl AppSettings {
    /// Parsed bind address, defaulting to `0.0.0.0:8080`.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidBindAddr`] when the value does not
    /// parse as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err: std::net::AddrParseError| {
            SettingsError::InvalidBindAddr {
                value: raw.to_owned(),
                message: err.to_string(),
            }
        })
    }

    /// Database URL, if persistence is configured.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Pool size, defaulting to 10.
    #[must_use]
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }

    /// Whether to migrate on startup, defaulting to true.
    #[must_use]
    pub fn run_migrations(&self) -> bool {
        self.run_migrations.unwrap_or(true)
    }

    /// Moderation engine tunables with unset values taken from
    /// [`ModerationSettings::default`].
    #[must_use]
    pub fn moderation(&self) -> ModerationSettings {
        let defaults = ModerationSettings::default();
        ModerationSettings {
            gateway_timeout: self
                .gateway_timeout_ms
                .map_or(defaults.gateway_timeout, Duration::from_millis),
            batch_max_size: self.batch_max_size.unwrap_or(defaults.batch_max_size),
            batch_concurrency: self
                .batch_concurrency
                .unwrap_or(defaults.batch_concurrency)
                .max(1),
            stale_claim_after: self
                .stale_claim_after_ms
                .map_or(defaults.stale_claim_after, Duration::from_millis),
        }
    }
}
