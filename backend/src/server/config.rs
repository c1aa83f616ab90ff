//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use moderation_backend::domain::ModerationSettings;
use moderation_backend::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) moderation: ModerationSettings,
}

impl ServerConfig {
    /// Configuration listening on `bind_addr` with in-memory adapters.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            moderation: ModerationSettings::default(),
        }
    }

    /// Back proposals and target records with PostgreSQL.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Override the moderation engine tunables.
    #[must_use]
    pub fn with_moderation(mut self, settings: ModerationSettings) -> Self {
        self.moderation = settings;
        self
    }
}
