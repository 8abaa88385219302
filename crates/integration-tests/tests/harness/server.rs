//! Gateway instance under test

use std::net::SocketAddr;

use palaver_config::Config;
use palaver_server::Server;
use tokio_util::sync::CancellationToken;

/// A gateway serving on an ephemeral port
pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Build and start the gateway from the given config
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let router = Server::new(config)?.into_router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            shutdown,
        })
    }

    /// Absolute URL for a path on the server under test
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Shared HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
