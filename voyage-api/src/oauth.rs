use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use voyage_core::identity::{IdentityProvider, OAuthProfile};
use voyage_core::{CoreError, CoreResult, RepositoryError, Role, User};
use voyage_shared::{mask_email, Redacted};
use voyage_store::app_config::GoogleConfig;

use crate::error::AppError;
use crate::middleware::auth::{issue_session, session_cookie};
use crate::state::{AppState, AuthConfig};

const STATE_TTL_SECONDS: i64 = 600;

// ============================================================================
// Google Provider
// ============================================================================

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub struct GoogleProvider {
    client_id: String,
    client_secret: Redacted<String>,
    redirect_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client_id: config.client_id,
            client_secret: Redacted::new(config.client_secret),
            redirect_url: config.redirect_url,
            http: reqwest::Client::new(),
        }
    }
}

fn identity_error(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::IdentityError(format!("{}: {}", context, err))
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> CoreResult<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| identity_error("Bad authorization URL", e))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> CoreResult<OAuthProfile> {
        // 1. Code for access token
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose().as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| identity_error("Token exchange failed", e))?
            .json()
            .await
            .map_err(|e| identity_error("Malformed token response", e))?;

        // 2. Access token for profile
        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| identity_error("Userinfo request failed", e))?
            .json()
            .await
            .map_err(|e| identity_error("Malformed userinfo response", e))?;

        if info.email_verified == Some(false) {
            return Err(CoreError::IdentityError(
                "Google account email is not verified".to_string(),
            ));
        }

        Ok(OAuthProfile {
            provider: "google".to_string(),
            subject: info.sub,
            email: info.email,
            name: info.name,
            image: info.picture,
        })
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signin/{provider}", get(start))
        .route("/api/auth/callback/{provider}", get(callback))
}

/// Signed round-trip state. The nonce is also set as a cookie and must match on return.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthState {
    callback_url: String,
    nonce: Uuid,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuery {
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn nonce_cookie_name(auth: &AuthConfig) -> String {
    format!("{}.oauth-nonce", auth.cookie_name)
}

/// Relative same-origin paths only. Anything else falls back to `default`.
pub fn safe_callback(raw: Option<&str>, default: &str) -> String {
    match raw {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => default.to_string(),
    }
}

async fn start(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(query): Query<StartQuery>,
) -> Result<Response, AppError> {
    let provider = state
        .identity_provider(&provider_id)
        .ok_or_else(|| AppError::NotFoundError("Unknown sign-in provider".to_string()))?;

    let round_trip = OAuthState {
        callback_url: safe_callback(query.callback_url.as_deref(), ""),
        nonce: Uuid::new_v4(),
        exp: Utc::now().timestamp() + STATE_TTL_SECONDS,
    };
    let signed = encode(
        &Header::new(Algorithm::HS256),
        &round_trip,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("State encoding failed: {}", e)))?;

    let target = provider.authorization_url(&signed)?;
    let nonce_cookie = HeaderValue::from_str(&format!(
        "{}={}; Path=/api/auth; HttpOnly; SameSite=Lax; Max-Age={}",
        nonce_cookie_name(&state.auth),
        round_trip.nonce,
        STATE_TTL_SECONDS
    ))
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(([(header::SET_COOKIE, nonce_cookie)], Redirect::temporary(&target)).into_response())
}

async fn callback(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let provider = state
        .identity_provider(&provider_id)
        .ok_or_else(|| AppError::NotFoundError("Unknown sign-in provider".to_string()))?;

    if let Some(error) = query.error {
        return Err(AppError::AuthenticationError(format!("Sign-in was cancelled: {}", error)));
    }
    let (Some(code), Some(raw_state)) = (query.code, query.state) else {
        return Err(AppError::ValidationError("Missing code or state".to_string()));
    };

    // 1. Verify the round-trip state against the nonce cookie
    let round_trip = decode::<OAuthState>(
        &raw_state,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::ValidationError("Invalid OAuth state".to_string()))?
    .claims;
    let cookie_nonce = CookieJar::from_headers(&headers)
        .get(&nonce_cookie_name(&state.auth))
        .map(|c| c.value().to_string());
    if cookie_nonce.as_deref() != Some(round_trip.nonce.to_string().as_str()) {
        return Err(AppError::ValidationError("OAuth state mismatch".to_string()));
    }

    // 2. Exchange the code
    let profile = provider.exchange_code(&code).await?;

    // 3. Find or provision the account
    let user = find_or_provision(&state, &profile).await?;

    // 4. Session cookie and redirect
    let (_, token) = issue_session(&state.auth, &user)?;
    let target = safe_callback(Some(round_trip.callback_url.as_str()), user.role.home_path());
    tracing::info!(
        "{} signed in with {} as {}",
        mask_email(&user.email),
        profile.provider,
        user.role
    );

    let spent_nonce = HeaderValue::from_str(&format!(
        "{}=; Path=/api/auth; HttpOnly; SameSite=Lax; Max-Age=0",
        nonce_cookie_name(&state.auth)
    ))
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&state.auth, &token)?),
            (header::SET_COOKIE, spent_nonce),
        ]),
        Redirect::temporary(&target),
    )
        .into_response())
}

/// First sign-in creates a `user` account. Concurrent first sign-ins converge on one record.
async fn find_or_provision(state: &AppState, profile: &OAuthProfile) -> Result<User, AppError> {
    let email = profile.email.trim().to_string();
    if let Some(existing) = state.users.find_by_email(&email).await? {
        return Ok(existing);
    }

    let name = profile
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let user = User::new(email.clone(), name, Role::User).with_image(profile.image.clone());

    match state.users.create(&user).await {
        Ok(()) => {
            tracing::info!("Provisioned {} account for {}", profile.provider, mask_email(&email));
            Ok(user)
        }
        Err(RepositoryError::Conflict(_)) => state
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Anyhow(anyhow!("Account for {} vanished after conflict", mask_email(&email)))),
        Err(e) => Err(e.into()),
    }
}
