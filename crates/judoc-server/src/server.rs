use std::sync::Arc;

use judoc_engine::Engine;
use judoc_store::{InMemoryRowStore, RowStore};
use tokio::net::TcpListener;

use crate::config::{BackendKind, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// judoc object server.
pub struct JudocServer {
    config: ServerConfig,
    state: AppState,
}

impl JudocServer {
    /// Validate `config`, connect the configured backend and build the engine.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = connect_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Build a server over an already connected row store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn RowStore>) -> ServerResult<Self> {
        let engine = Engine::new(store, config.engine_config())?;
        Ok(Self {
            config,
            state: AppState::new(engine),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            bind = %self.config.bind_addr,
            backend = %self.config.backend,
            keyspace = %self.config.keyspace,
            consistency = %self.config.consistency,
            strategy = %self.config.strategy,
            block_size = self.config.block_size,
            "judoc server listening"
        );
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Open the row store named by `config.backend`.
pub async fn connect_store(config: &ServerConfig) -> ServerResult<Arc<dyn RowStore>> {
    let has_tls = config.tls.as_ref().is_some_and(|tls| !tls.is_empty());
    match config.backend {
        BackendKind::Memory => {
            if has_tls {
                tracing::warn!("tls settings are ignored by the memory backend");
            }
            Ok(Arc::new(InMemoryRowStore::new()))
        }
        BackendKind::Scylla => connect_scylla(config, has_tls).await,
    }
}

#[cfg(feature = "scylla")]
async fn connect_scylla(config: &ServerConfig, has_tls: bool) -> ServerResult<Arc<dyn RowStore>> {
    use judoc_store::{ScyllaConfig, ScyllaRowStore};

    if has_tls {
        return Err(ServerError::Config(
            "tls for the cluster connection is not supported by this build".into(),
        ));
    }
    let store = ScyllaRowStore::connect(&ScyllaConfig {
        nodes: config
            .cluster
            .iter()
            .map(|node| node.trim().to_string())
            .filter(|node| !node.is_empty())
            .collect(),
        keyspace: config.keyspace.clone(),
        connect_timeout: config.timeout(),
        create_schema: true,
    })
    .await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "scylla"))]
async fn connect_scylla(_config: &ServerConfig, _has_tls: bool) -> ServerResult<Arc<dyn RowStore>> {
    Err(ServerError::Config(
        "backend `scylla` requires building with the `scylla` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    fn memory_config() -> ServerConfig {
        ServerConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_construction() {
        let server = JudocServer::new(memory_config()).await.unwrap();
        assert_eq!(server.config().bind_addr, "0.0.0.0:9122".parse().unwrap());
        let _router = server.router();
    }

    #[tokio::test]
    async fn invalid_config_fails_startup() {
        let config = ServerConfig {
            scan_page_size: 0,
            ..memory_config()
        };
        assert!(matches!(
            JudocServer::new(config).await,
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn memory_backend_ignores_tls() {
        let config = ServerConfig {
            tls: Some(TlsConfig {
                ca_path: Some("/etc/ca.pem".into()),
                ..Default::default()
            }),
            ..memory_config()
        };
        assert!(connect_store(&config).await.is_ok());
    }

    #[cfg(not(feature = "scylla"))]
    #[tokio::test]
    async fn scylla_needs_feature() {
        let config = ServerConfig {
            backend: BackendKind::Scylla,
            ..Default::default()
        };
        let err = connect_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("scylla"));
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let server = JudocServer::new(memory_config()).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_on(listener, async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
