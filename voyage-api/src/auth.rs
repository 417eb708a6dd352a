use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use voyage_core::password::{self, MIN_PASSWORD_LENGTH};
use voyage_core::session::{refresh_claims, SessionUser};
use voyage_core::validation::{is_valid_email, non_empty};
use voyage_core::{RepositoryError, Role, User, VendorInfo};
use voyage_shared::mask_email;

use crate::error::{ApiJson, AppError};
use crate::middleware::auth::{clear_session_cookie, issue_session, issue_token, with_session};
use crate::middleware::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub account_type: Option<String>,
    pub organization_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/session", get(session))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/signout", post(signout))
}

// ============================================================================
// Credentials
// ============================================================================

async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<Response, AppError> {
    // 1. Presence
    let email = non_empty(req.email.as_deref()).map(str::to_string);
    let name = non_empty(req.name.as_deref());
    let password = req.password.as_deref().filter(|p| !p.is_empty());
    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(AppError::ValidationError(
            "Email, password, and name are required".to_string(),
        ));
    };

    // 2. Shape, all before touching the store
    if !is_valid_email(&email) {
        return Err(AppError::ValidationError("Invalid email format".to_string()));
    }
    password::validate_password_strength(password, MIN_PASSWORD_LENGTH)
        .map_err(AppError::ValidationError)?;
    let role = match non_empty(req.account_type.as_deref()) {
        None | Some("user") => Role::User,
        Some("vendor") => Role::Vendor,
        Some(other) => {
            return Err(AppError::ValidationError(format!("Unknown account type: {}", other)));
        }
    };

    // 3. Build the record
    let hash = hash_password(password.to_string()).await?;
    let mut user = User::new(email, name, role).with_password_hash(hash);
    if role == Role::Vendor {
        user = user.with_vendor_info(VendorInfo {
            organization_name: non_empty(req.organization_name.as_deref()).unwrap_or(name).to_string(),
            phone_number: non_empty(req.phone_number.as_deref()).unwrap_or_default().to_string(),
            address: non_empty(req.address.as_deref()).unwrap_or_default().to_string(),
        });
    }

    // 4. Atomic create
    state.users.create(&user).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => {
            AppError::ConflictError("An account with this email already exists".to_string())
        }
        other => other.into(),
    })?;
    tracing::info!("Created {} account for {}", role, mask_email(&user.email));

    let (entity, message) = match role {
        Role::Vendor => (
            "vendor",
            "Vendor account created successfully. Awaiting verification.",
        ),
        _ => ("user", "Account created successfully"),
    };
    let mut body = Map::new();
    body.insert("message".into(), Value::from(message));
    body.insert(entity.into(), json!(user.to_public()));
    body.insert("redirectUrl".into(), Value::from(role.home_path()));

    Ok((StatusCode::CREATED, Json(Value::Object(body))).into_response())
}

async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<Response, AppError> {
    let email = non_empty(req.email.as_deref()).map(str::to_string);
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::ValidationError(
            "Email and password are required".to_string(),
        ));
    };

    let invalid = || AppError::AuthenticationError("Invalid email or password".to_string());

    let Some(user) = state.users.find_by_email(&email).await? else {
        tracing::debug!("Sign-in for unknown account {}", mask_email(&email));
        return Err(invalid());
    };
    let Some(stored) = user.password.clone() else {
        return Err(AppError::AuthenticationError(
            "This account uses OAuth. Please sign in with Google.".to_string(),
        ));
    };
    if !verify_password(password, stored.into_inner()).await? {
        tracing::info!("Failed sign-in for {}", mask_email(&email));
        return Err(invalid());
    }

    let (_, token) = issue_session(&state.auth, &user)?;
    tracing::info!("{} signed in as {}", mask_email(&email), user.role);

    with_session(
        &state.auth,
        &token,
        Json(json!({
            "token": token,
            "user": user.to_public(),
            "redirectUrl": user.role.home_path(),
        })),
    )
}

// ============================================================================
// Session
// ============================================================================

async fn session(
    State(state): State<AppState>,
    current: Option<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let Some(CurrentUser(claims)) = current else {
        return Ok(Json(json!({ "user": null })));
    };

    // Always answer from the store, not the token snapshot.
    let Some(user) = state.users.find_by_id(claims.sub).await? else {
        return Ok(Json(json!({ "user": null })));
    };
    let expires = Utc.timestamp_opt(claims.exp, 0).single().map(|t| t.to_rfc3339());

    Ok(Json(json!({
        "user": SessionUser::from(&user),
        "expires": expires,
    })))
}

async fn refresh(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Response, AppError> {
    let now = Utc::now().timestamp();
    let Some(fresh) =
        refresh_claims(state.users.as_ref(), &claims, now, state.auth.expiration as i64).await?
    else {
        return Err(AppError::AuthenticationError(
            "Session is no longer valid".to_string(),
        ));
    };
    let token = issue_token(&state.auth, &fresh)?;

    with_session(
        &state.auth,
        &token,
        Json(json!({
            "token": token,
            "user": fresh.session_user(),
        })),
    )
}

async fn signout(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.auth)?)],
        Json(json!({ "message": "Signed out" })),
    )
        .into_response())
}

// ============================================================================
// Password KDF off the async workers
// ============================================================================

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn verify_password(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Verification task failed: {}", e)))
}
