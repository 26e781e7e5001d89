//! Provider API Server

use super::rest::RestRouter;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::provider::Provider;
use prometheus::Registry;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serves the provider protocol until shut down.
///
/// Shutting down stops accepting connections and cancels the call context
/// of every in-flight lifecycle step.
pub struct ApiServer {
    addr: SocketAddr,
    request_timeout: Duration,
    provider: Provider,
    metrics: Registry,
    shutdown: CancellationToken,
}

impl ApiServer {
    pub fn new(config: &ApiConfig, provider: Provider, metrics: Registry) -> Result<Self> {
        Ok(Self {
            addr: config.socket_addr()?,
            request_timeout: config.request_timeout(),
            provider,
            metrics,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that triggers graceful shutdown when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind and serve
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            Error::Internal(format!("Failed to bind API server on {}: {}", self.addr, e))
        })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let app = RestRouter::new(
            self.provider.clone(),
            self.metrics.clone(),
            self.shutdown.clone(),
            self.request_timeout,
        )
        .build();

        let local = listener.local_addr()?;
        info!("Provider API listening on {}", local);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Provider API shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("API server error: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendFactory;
    use crate::config::ArrayConfig;
    use assert_matches::assert_matches;

    fn server(bind_addr: &str) -> Result<ApiServer> {
        let registry = Registry::new();
        let client = BackendFactory::create(&ArrayConfig::default(), &registry)?;
        let config = ApiConfig {
            bind_addr: bind_addr.into(),
            ..ApiConfig::default()
        };
        ApiServer::new(&config, Provider::new(client), registry)
    }

    #[test]
    fn test_invalid_bind_address() {
        assert_matches!(server("localhost").err(), Some(Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let server = std::sync::Arc::new(server("127.0.0.1:0").unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let running = tokio::spawn({
            let server = server.clone();
            async move { server.serve(listener).await }
        });

        server.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), running).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
        assert!(server.shutdown_token().is_cancelled());
    }
}
