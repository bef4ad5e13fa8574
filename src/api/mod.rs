//! REST API layer: route handlers, DTOs, OpenAPI and router composition.
//!
//! All endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::RelayConfig;

/// Builds the complete application router: REST and WebSocket endpoints,
/// Swagger UI (feature `swagger-ui`), CORS and request tracing.
pub fn build_router(state: AppState, config: &RelayConfig) -> Router {
    let router = Router::new().nest("/api/v1", handlers::routes(config.log_upload_max_bytes));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
