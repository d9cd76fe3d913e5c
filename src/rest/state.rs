//! API state management for the REST server.

use std::sync::Arc;

use crate::config::Config;
use crate::store::InMemoryStore;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// Catalog and history held by this server
    pub store: Arc<InMemoryStore>,
    /// Application configuration (auth token, progression policy)
    pub config: Arc<Config>,
}

impl ApiState {
    /// Create an empty server using the config's progression policy
    pub fn new(config: Config) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new(config.progression.clone())),
            config: Arc::new(config),
        }
    }

    /// Token every `/api/mahakrama` request must carry, if configured
    pub fn auth_token(&self) -> Option<&str> {
        self.config
            .server
            .auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}
