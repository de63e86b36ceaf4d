//! Route configuration and setup.
//!
//! File routes live in [handlers](crate::handlers); health checks in [health](health).

mod health;

use crate::constants::{FILES_PATH, HEALTH_PATH, READINESS_PATH};
use crate::handlers::{files, vision};
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use filebox_core::Config;
use filebox_infra::{request_id_middleware, RequestId};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let file_routes = Router::new()
        .route(FILES_PATH, get(files::list_files).post(files::upload_file))
        .route(
            &format!("{}/{{filename}}", FILES_PATH),
            get(files::download_file).post(vision::file_action),
        );

    let health_routes = Router::new()
        .route(HEALTH_PATH, get(health::health_check))
        .route(READINESS_PATH, get(health::health_check));

    let mut app = file_routes.merge(health_routes);

    if let Some(ref dir) = config.static_dir {
        tracing::info!(static_dir = %dir, "Serving static assets");
        app = app.fallback_service(ServeDir::new(dir));
    }

    // Uploads are streamed, so axum's buffered-body default does not apply.
    app = app.layer(DefaultBodyLimit::disable());
    if let Some(max_bytes) = config.max_upload_size_bytes {
        tracing::info!(max_upload_bytes = max_bytes, "Request body limit enabled");
        app = app.layer(RequestBodyLimitLayer::new(max_bytes));
    }

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_owned())
            .unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let app = app
        .layer(cors)
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
