//! API Server - HTTP front end for the analyzers

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::CompositeAnalyzer;
use crate::api::handlers::{self, ApiError, AppState};
use crate::config::RateLimitConfig;
use crate::security::{InMemoryRateLimitStore, RateLimitStore};

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    rate_limiter: Arc<dyn RateLimitStore>,
    eviction_interval: Duration,
    addr: String,
}

impl ApiServer {
    /// Create a server with the in-memory rate limiter
    pub fn new(analyzer: CompositeAnalyzer, rate_limit: &RateLimitConfig, addr: String) -> Self {
        let store = Arc::new(InMemoryRateLimitStore::from_config(rate_limit));
        Self::with_rate_limiter(analyzer, store, addr)
            .with_eviction_interval(Duration::from_secs(rate_limit.eviction_interval_secs))
    }

    pub fn with_rate_limiter(
        analyzer: CompositeAnalyzer,
        rate_limiter: Arc<dyn RateLimitStore>,
        addr: String,
    ) -> Self {
        Self {
            state: Arc::new(AppState { analyzer }),
            rate_limiter,
            eviction_interval: Duration::from_secs(300),
            addr,
        }
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let check_routes = Router::new()
            .route("/dmarc", post(handlers::check_dmarc))
            .route("/spf", post(handlers::check_spf))
            .route("/dkim", post(handlers::check_dkim))
            .route("/mx", post(handlers::check_mx))
            .route("/all", post(handlers::check_all))
            .route_layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ));

        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api/check", check_routes)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();
        self.spawn_eviction();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    fn spawn_eviction(&self) {
        let store = self.rate_limiter.clone();
        let interval = self.eviction_interval;
        if interval.is_zero() {
            return;
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.evict_expired().await;
            }
        });
    }
}

/// Rejects clients over their request budget with 429
async fn rate_limit_middleware(
    State(store): State<Arc<dyn RateLimitStore>>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !store.hit(&client).await {
        warn!("Rejecting request from {}: rate limit exceeded", client);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new("Too many requests, try again later")),
        )
            .into_response();
    }

    next.run(req).await
}
