pub mod health;
pub mod pages;
pub mod readings;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        readings::get_sensor_readings,
        readings::get_sensor_chart,
    ),
    components(
        schemas(
            readings::ReadingsResponse,
            readings::ReadingPoint,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "readings", description = "Sensor readings and charts fetched from Monnit"),
    ),
    info(
        title = "Sensor Chart API",
        description = "Temperature charts from Monnit sensor history",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    tracing::info!(
        sub_windows = config.fetch_sub_windows,
        policy = ?config.fetch_failure_policy,
        zone = ?config.display_zone,
        "Fetch configured"
    );

    // HTML pages
    let page_routes = Router::new()
        .route("/", get(pages::index).post(pages::show_chart))
        .route("/select_date", get(pages::select_date))
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // form posts only

    let api_routes = Router::new()
        .route(
            "/sensors/{sensor_id}/readings",
            get(readings::get_sensor_readings),
        )
        .route("/sensors/{sensor_id}/chart", get(readings::get_sensor_chart));

    // Health check routes
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Combine all routes
    Router::new()
        .merge(page_routes)
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
        .with_state(state)
}
