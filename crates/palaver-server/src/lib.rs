//! HTTP surface for the Palaver chat gateway

mod errors;
mod health;
mod identity;
mod rate_limit;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use palaver_chat::{
    AttachmentInliner, OrchestratorParts, ResumableStreamRegistry, StreamOrchestrator, TitleGenerator,
};
use palaver_config::{Config, HistoryStorage, QuotaStorage};
use palaver_history::{HistoryStore, MemoryHistory, RedisHistory};
use palaver_llm::{ChainSource, ProviderRegistry};
use palaver_moderation::ModerationGate;
use palaver_quota::{CreditLedger, FixedPricing, PricingState, QuotaLimits};
use tower_http::trace::TraceLayer;

/// Shared state for route handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: StreamOrchestrator,
    pub(crate) ledger: CreditLedger,
    pub(crate) pricing: Arc<dyn PricingState>,
    pub(crate) history: Arc<dyn HistoryStore>,
    pub(crate) resume: Option<ResumableStreamRegistry>,
}

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Constructs the provider registry, ledger, history store, and
    /// orchestrator once here and injects them; nothing is created
    /// lazily per request.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage backend or rate limiter fails to
    /// initialize
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let registry = Arc::new(ProviderRegistry::from_config(&config.provider));

        let gate = ModerationGate::new(registry.single(&config.moderation.model), &config.moderation.model);
        let title = TitleGenerator::new(registry.single(config.models.title_model()), config.models.title_model());

        let limits = QuotaLimits::from_config(&config.quota);
        let ledger = match config.quota.storage {
            QuotaStorage::Memory => CreditLedger::in_memory(limits),
            QuotaStorage::Redis { ref url } => CreditLedger::redis(url.as_str(), limits)?,
        };

        let history: Arc<dyn HistoryStore> = match config.history.storage {
            HistoryStorage::Memory => Arc::new(MemoryHistory::new()),
            HistoryStorage::Redis { ref url } => Arc::new(RedisHistory::new(url.as_str())?),
        };

        let resume = config
            .resume
            .as_ref()
            .map(ResumableStreamRegistry::from_config)
            .transpose()?;

        let pricing: Arc<dyn PricingState> = Arc::new(FixedPricing::new(config.quota.active_multiplier));

        let orchestrator = StreamOrchestrator::new(OrchestratorParts {
            chains: Arc::clone(&registry) as Arc<dyn ChainSource>,
            models: config.models.clone(),
            gate,
            ledger: ledger.clone(),
            pricing: Arc::clone(&pricing),
            history: Arc::clone(&history),
            inliner: AttachmentInliner::default(),
            title,
            resume: resume.clone(),
        });

        let state = AppState {
            orchestrator,
            ledger,
            pricing,
            history,
            resume,
        };

        let mut app = Router::new()
            .route(
                "/api/chat",
                post(routes::chat::post_chat).delete(routes::chat::delete_chat),
            )
            .route("/api/chat/resume", get(routes::chat::resume_chat))
            .route(
                "/api/history",
                get(routes::history::list_history).delete(routes::history::delete_history),
            )
            .route("/api/credits", get(routes::credits::get_credits))
            .route("/api/credits/borrow", post(routes::credits::borrow_credits));

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, get(health::health_handler));
        }

        let mut app = app.with_state(state);

        // Identity resolution (innermost, runs just before handlers)
        let secure_cookies = config.server.secure_cookies;
        app = app.layer(axum::middleware::from_fn(move |req, next| async move {
            identity::identity_middleware(secure_cookies, req, next).await
        }));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        // Request rate limiting (outermost)
        if let Some(ref rl_config) = config.server.rate_limit {
            let limiter = Arc::new(rate_limit::RequestLimiter::new(rl_config)?);
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let limiter = Arc::clone(&limiter);
                async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
            }));
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
