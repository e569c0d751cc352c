//! Shared engine connection.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::docker::DockerEngine;
use crate::engine::EngineClient;
use crate::error::EngineResult;

/// Lazily established, cached engine client.
///
/// Build one per process and hand it to every session through an `Arc`; the
/// first [`acquire`](Self::acquire) connects, later calls return the same client.
pub struct EngineConnection {
    config: ConnectionConfig,
    client: OnceCell<Arc<dyn EngineClient>>,
}

impl EngineConnection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Connection configured from `DOCKER_HOST` and friends.
    pub fn from_env() -> Self {
        Self::new(ConnectionConfig::from_env())
    }

    /// Connection around an already constructed client.
    pub fn with_client(client: Arc<dyn EngineClient>) -> Self {
        Self {
            config: ConnectionConfig::default(),
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    pub async fn acquire(&self) -> EngineResult<Arc<dyn EngineClient>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                info!(
                    "Connecting to Docker daemon at {}",
                    self.config.host.as_deref().unwrap_or("local socket")
                );
                let engine = DockerEngine::connect(&self.config).await?;
                Ok::<_, crate::error::EngineError>(Arc::new(engine) as Arc<dyn EngineClient>)
            })
            .await?;

        debug!("Reusing cached engine client");
        Ok(Arc::clone(client))
    }
}

impl std::fmt::Debug for EngineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConnection")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[tokio::test]
    async fn test_acquire_returns_identical_client() {
        let connection = EngineConnection::with_client(Arc::new(MockEngine::new()));
        assert!(connection.is_connected());

        let first = connection.acquire().await.unwrap();
        let second = connection.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_new_connection_is_lazy() {
        let connection = EngineConnection::new(ConnectionConfig::new().host("tcp://127.0.0.1:1"));
        assert!(!connection.is_connected());
        assert_eq!(connection.config().host.as_deref(), Some("tcp://127.0.0.1:1"));
    }
}
