//! HTTP entry point for the Nimbus engine (spec §4.3, §4.8, §4.9): webhook
//! ingest routes plus the CORS/response-cache/rate-limit/trace-and-
//! breadcrumb middleware stack, wired the way `tandem-server`'s
//! `AppState`/`app_router`/`serve` triad wires the teacher's session API.
//! Worker tick loops are not spawned here — per spec §4.9 they are
//! `nimbus-engine`'s concern, so this crate stays a pure HTTP front door
//! over the same shared stores.

pub mod error;
pub mod middleware;
pub mod observability;
pub mod rules_store;
pub mod tenant;
pub mod webhooks;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::routing::post;
use axum::Router;
use nimbus_clients::{MeetingPlatformClient, ObjectStoreClient};
use nimbus_core::{ConfigStore, EventBus, EventLog};
use nimbus_runtime::{BotDeploymentStore, NotificationQueueStore, RecordingStore, RetryJobStore, UserMetricsStore};

use crate::middleware::{RateLimiterStore, ResponseCacheStore};
use crate::rules_store::RoutingRulesStore;
use crate::tenant::TenantRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: ConfigStore,
    pub event_log: EventLog,
    pub event_bus: EventBus,
    pub notification_queue: NotificationQueueStore,
    pub user_metrics: UserMetricsStore,
    pub recordings: RecordingStore,
    pub bot_deployments: BotDeploymentStore,
    pub retry_jobs: RetryJobStore,
    pub routing_rules: RoutingRulesStore,
    pub tenant_registry: TenantRegistry,
    pub response_cache: ResponseCacheStore,
    pub rate_limiter: RateLimiterStore,
    pub meeting_platform: Arc<dyn MeetingPlatformClient>,
    pub object_store: Arc<dyn ObjectStoreClient>,
    cors_origins: Vec<String>,
}

impl AppState {
    /// Builds fresh, empty in-process stores and snapshots the CORS
    /// allowlist out of `config` at construction time — the router is built
    /// once at startup, matching the teacher's convention of wiring
    /// `CorsLayer` once in `app_router` rather than re-reading config per
    /// request.
    pub async fn new(
        config: ConfigStore,
        meeting_platform: Arc<dyn MeetingPlatformClient>,
        object_store: Arc<dyn ObjectStoreClient>,
    ) -> Self {
        let cors_origins = config.get().await.allowed_cors_origins;
        Self {
            config,
            event_log: EventLog::new(),
            event_bus: EventBus::new(),
            notification_queue: NotificationQueueStore::new(),
            user_metrics: UserMetricsStore::new(),
            recordings: RecordingStore::new(),
            bot_deployments: BotDeploymentStore::new(),
            retry_jobs: RetryJobStore::new(),
            routing_rules: RoutingRulesStore::new(),
            tenant_registry: TenantRegistry::new(),
            response_cache: ResponseCacheStore::new(StdDuration::from_secs(30), 1_000),
            rate_limiter: RateLimiterStore::new(StdDuration::from_secs(60), 120),
            meeting_platform,
            object_store,
            cors_origins,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = middleware::cors_layer(state.cors_origins.clone());

    Router::new()
        .route("/webhooks/meeting-recorder", post(webhooks::meeting_recorder))
        .route("/webhooks/meetings", post(webhooks::meetings))
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/webhooks/sentry-bridge", post(webhooks::sentry_bridge))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::response_cache_middleware))
        .layer(axum::middleware::from_fn(observability::trace_middleware))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "nimbus-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                futures::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
