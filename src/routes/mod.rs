pub mod health;
mod rate_limit;
pub mod timeline;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use rate_limit::ClientIpKeyExtractor;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        timeline::get_timeline,
        timeline::get_points,
    ),
    components(
        schemas(
            health::HealthResponse,
            timeline::TimelineResponse,
            timeline::BarResponse,
            timeline::CurrentStatus,
            crate::services::CacheSnapshot,
            crate::timeline::Point,
            crate::timeline::BarStatus,
            crate::timeline::Status,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "timelines", description = "Uptime bars and cached history"),
    ),
    info(
        title = "Uptime Timeline API",
        description = "Uptime bars for Home Assistant sensors",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// Build the application router.
///
/// # Errors
///
/// Returns `AppError::Config` if the rate limiter settings are rejected.
pub fn build_router(state: AppState) -> AppResult<Router> {
    let config = &state.config;

    let timeline_routes = Router::new()
        .route("/timelines/{entity_id}", get(timeline::get_timeline))
        .route("/timelines/{entity_id}/points", get(timeline::get_points));

    let api_routes = if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
        timeline_routes
    } else {
        tracing::info!(
            per_second = config.rate_limit_per_second,
            burst = config.rate_limit_burst,
            "Rate limiting configured"
        );

        let limiter = GovernorConfigBuilder::default()
            .key_extractor(ClientIpKeyExtractor)
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| {
                AppError::Config(crate::config::ConfigError::Invalid(
                    "rate limit per second and burst must be non-zero".to_string(),
                ))
            })?;

        timeline_routes.layer(GovernorLayer {
            config: Arc::new(limiter),
        })
    }
    .layer(RequestBodyLimitLayer::new(64 * 1024));

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Ok(Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
