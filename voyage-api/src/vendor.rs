use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use voyage_core::validation::non_empty;
use voyage_core::{Role, User, UserPatch, VendorInfo, WriteOutcome};
use voyage_shared::mask_email;

use crate::error::{ApiJson, AppError};
use crate::middleware::auth::{issue_session, with_session};
use crate::middleware::CurrentUser;
use crate::parse_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyVendorRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVendorRequest {
    pub organization_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/vendor/verify", post(verify_vendor))
        .route("/api/vendor/register", post(register_vendor))
}

/// Mark a vendor verified. Conditional on the stored role still being `vendor`.
pub(crate) async fn mark_verified(state: &AppState, target: uuid::Uuid) -> Result<User, AppError> {
    match state
        .users
        .update(target, &UserPatch::verify_vendor(), Some(Role::Vendor))
        .await?
    {
        WriteOutcome::Applied(user) => {
            tracing::info!("Vendor {} verified", mask_email(&user.email));
            Ok(user)
        }
        WriteOutcome::Missing => Err(AppError::NotFoundError("User not found".to_string())),
        WriteOutcome::ConditionFailed => {
            Err(AppError::ValidationError("User is not a vendor".to_string()))
        }
    }
}

async fn verify_vendor(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<VerifyVendorRequest>,
) -> Result<Response, AppError> {
    let raw = non_empty(req.user_id.as_deref())
        .ok_or_else(|| AppError::ValidationError("userId is required".to_string()))?;
    let target = parse_id(raw, "User")?;

    let is_self = claims.sub == target;
    let allowed = claims.role == Role::Admin || (is_self && state.vendor_self_verification);
    if !allowed {
        return Err(AppError::AuthorizationError("Forbidden".to_string()));
    }

    let user = mark_verified(&state, target).await?;
    let body = Json(json!({ "message": "Vendor verified successfully" }));

    // Self-service: the caller's own token must reflect the change right away.
    if is_self {
        let (_, token) = issue_session(&state.auth, &user)?;
        return with_session(&state.auth, &token, body);
    }
    Ok(body.into_response())
}

async fn register_vendor(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<RegisterVendorRequest>,
) -> Result<Response, AppError> {
    let organization_name = non_empty(req.organization_name.as_deref()).ok_or_else(|| {
        AppError::ValidationError("Organization name is required".to_string())
    })?;
    let info = VendorInfo {
        organization_name: organization_name.to_string(),
        phone_number: non_empty(req.phone_number.as_deref()).unwrap_or_default().to_string(),
        address: non_empty(req.address.as_deref()).unwrap_or_default().to_string(),
    };

    let user = match state
        .users
        .update(claims.sub, &UserPatch::promote_to_vendor(info), Some(Role::User))
        .await?
    {
        WriteOutcome::Applied(user) => user,
        WriteOutcome::Missing => {
            return Err(AppError::NotFoundError("User not found".to_string()));
        }
        WriteOutcome::ConditionFailed => {
            return Err(AppError::ConflictError(
                "Only user accounts can register as vendors".to_string(),
            ));
        }
    };
    tracing::info!("{} registered as a vendor", mask_email(&user.email));

    let (_, token) = issue_session(&state.auth, &user)?;
    with_session(
        &state.auth,
        &token,
        Json(json!({
            "message": "Vendor registration submitted. Awaiting verification.",
            "vendor": user.to_public(),
            "redirectUrl": Role::Vendor.home_path(),
        })),
    )
}
