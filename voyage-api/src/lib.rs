use axum::{
    http::{header, HeaderName, Method},
    middleware::from_fn_with_state,
    Router,
};
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod cache;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod plans;
pub mod state;
pub mod vendor;

pub use error::AppError;
pub use state::{AppState, AuthConfig};

/// API routes only. Unmatched paths get a JSON 404.
pub fn app(state: AppState) -> Router {
    router(state, None)
}

/// API routes plus the pre-built web bundle in `static_dir` for every other path.
pub fn app_with_static(state: AppState, static_dir: &str) -> Router {
    router(state, Some(static_dir))
}

fn router(state: AppState, static_dir: Option<&str>) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(middleware::auth::SESSION_TOKEN_HEADER)]);

    let routes = Router::new()
        .merge(auth::routes())
        .merge(oauth::routes())
        .merge(plans::routes())
        .merge(bookings::routes())
        .merge(vendor::routes())
        .merge(admin::routes());

    let routes = match static_dir {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            routes.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => routes.fallback(not_found),
    };

    // Last layer added runs first: session claims are in place before the gate looks.
    routes
        .layer(from_fn_with_state(state.clone(), middleware::gate_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::session_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFoundError("Not found".to_string())
}

/// Ids in paths and bodies. A malformed id names nothing, so it is a 404.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFoundError(format!("{} not found", entity)))
}
