use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use voyage_core::PublicUser;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::parse_id;
use crate::state::AppState;
use crate::vendor::mark_verified;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/vendors/pending", get(list_pending_vendors))
        .route("/api/admin/vendors/{id}/approve", post(approve_vendor))
}

async fn list_pending_vendors(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let vendors: Vec<PublicUser> = state
        .users
        .list_pending_vendors()
        .await?
        .iter()
        .map(|u| u.to_public())
        .collect();

    Ok(Json(json!({
        "count": vendors.len(),
        "vendors": vendors,
    })))
}

async fn approve_vendor(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let target = parse_id(&id, "User")?;
    let vendor = mark_verified(&state, target).await?;
    tracing::info!("Vendor {} approved by admin {}", vendor.user_id, admin.sub);

    Ok(Json(json!({
        "message": "Vendor approved",
        "vendor": vendor.to_public(),
    })))
}
