use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use voyage_core::access::GateDecision;
use voyage_core::session::SessionClaims;

use crate::error::AppError;
use crate::state::AppState;

/// Path-level access control. Runs after [`session_middleware`](super::session_middleware)
/// so the claims are already in the request extensions.
pub async fn gate_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let role = req.extensions().get::<SessionClaims>().map(|c| c.role);
    let is_api = path == "/api" || path.starts_with("/api/");

    match state.gate.decide(&path, role) {
        GateDecision::Allow => next.run(req).await,
        GateDecision::SignIn { .. } if is_api => {
            AppError::AuthenticationError("Unauthorized".to_string()).into_response()
        }
        GateDecision::SignIn { callback_url } => {
            let callback = req
                .uri()
                .query()
                .map(|q| format!("{}?{}", callback_url, q))
                .unwrap_or(callback_url);
            let encoded: String = url::form_urlencoded::byte_serialize(callback.as_bytes()).collect();
            Redirect::temporary(&format!("{}?callbackUrl={}", state.gate.sign_in_path(), encoded))
                .into_response()
        }
        GateDecision::WrongRole { .. } if is_api => {
            AppError::AuthorizationError("Forbidden".to_string()).into_response()
        }
        GateDecision::WrongRole { redirect_to } => {
            tracing::debug!("Role {:?} cannot open {}, redirecting to {}", role, path, redirect_to);
            Redirect::temporary(redirect_to).into_response()
        }
    }
}
