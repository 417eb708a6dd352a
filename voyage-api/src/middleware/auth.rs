use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use voyage_core::session::{refresh_claims, SessionClaims};
use voyage_core::{Role, User};
use voyage_shared::mask_email;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

// ============================================================================
// Token Encoding
// ============================================================================

pub fn issue_token(auth: &AuthConfig, claims: &SessionClaims) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

/// Fresh claims for `user`, signed.
pub fn issue_session(auth: &AuthConfig, user: &User) -> Result<(SessionClaims, String), AppError> {
    let claims = SessionClaims::for_user(user, Utc::now().timestamp(), auth.expiration as i64);
    let token = issue_token(auth, &claims)?;
    Ok((claims, token))
}

/// Signature and expiry checked. Anything invalid is simply no session.
pub fn decode_token(auth: &AuthConfig, token: &str) -> Option<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .ok()
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(auth: &AuthConfig, token: &str) -> Result<HeaderValue, AppError> {
    cookie_header(&auth.cookie_name, token, auth.expiration)
}

pub fn clear_session_cookie(auth: &AuthConfig) -> Result<HeaderValue, AppError> {
    cookie_header(&auth.cookie_name, "", 0)
}

fn cookie_header(name: &str, value: &str, max_age: u64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age
    ))
    .map_err(|e| AppError::InternalServerError(format!("Invalid cookie header: {}", e)))
}

/// `body` plus the headers that hand a freshly issued token to the client.
pub fn with_session<T: IntoResponse>(
    auth: &AuthConfig,
    token: &str,
    body: T,
) -> Result<Response, AppError> {
    let token_header = HeaderValue::from_str(token)
        .map_err(|e| AppError::InternalServerError(format!("Invalid token header: {}", e)))?;
    Ok((
        [
            (header::SET_COOKIE, session_cookie(auth, token)?),
            (HeaderName::from_static(SESSION_TOKEN_HEADER), token_header),
        ],
        body,
    )
        .into_response())
}

// ============================================================================
// Session Middleware
// ============================================================================

pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract and decode the token, if any
    let claims = extract_token(req.headers(), &state.auth.cookie_name)
        .and_then(|token| decode_token(&state.auth, &token));

    // 2. Refresh stale claims from the user store
    let now = Utc::now().timestamp();
    let mut reissued = None;
    let claims = match claims {
        Some(claims) if claims.is_stale(now, state.auth.refresh_window as i64) => {
            let refreshed = refresh_claims(
                state.users.as_ref(),
                &claims,
                now,
                state.auth.expiration as i64,
            )
            .await?;
            if let Some(fresh) = &refreshed {
                if fresh.role != claims.role || fresh.vendor_verified != claims.vendor_verified {
                    tracing::info!(
                        "Session for {} now {} (verified: {})",
                        mask_email(&fresh.email),
                        fresh.role,
                        fresh.vendor_verified
                    );
                }
                reissued = Some(issue_token(&state.auth, fresh)?);
            }
            refreshed
        }
        other => other,
    };

    // 3. Inject claims
    if let Some(claims) = claims {
        req.extensions_mut().insert(claims);
    }

    let mut response = next.run(req).await;

    // 4. Hand the re-issued token back, unless the handler already set one
    if let Some(token) = reissued {
        let headers = response.headers_mut();
        if !headers.contains_key(SESSION_TOKEN_HEADER) {
            headers.insert(
                SESSION_TOKEN_HEADER,
                HeaderValue::from_str(&token)
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?,
            );
            headers.append(header::SET_COOKIE, session_cookie(&state.auth, &token)?);
        }
    }

    Ok(response)
}

// ============================================================================
// Handler Extractors
// ============================================================================

/// Any signed-in account.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::AuthenticationError("Unauthorized".to_string()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<SessionClaims>().cloned().map(CurrentUser))
    }
}

/// A vendor account, verified or not.
#[derive(Debug, Clone)]
pub struct RequireVendor(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for RequireVendor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) =
            <CurrentUser as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        if claims.role != Role::Vendor {
            return Err(AppError::AuthorizationError("Vendor access required".to_string()));
        }
        Ok(RequireVendor(claims))
    }
}

/// A vendor whose account has been verified.
#[derive(Debug, Clone)]
pub struct RequireVerifiedVendor(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for RequireVerifiedVendor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireVendor(claims) = RequireVendor::from_request_parts(parts, state).await?;
        if !claims.vendor_verified {
            return Err(AppError::AuthorizationError(
                "Vendor account is not verified".to_string(),
            ));
        }
        Ok(RequireVerifiedVendor(claims))
    }
}

#[derive(Debug, Clone)]
pub struct RequireAdmin(pub SessionClaims);

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) =
            <CurrentUser as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            return Err(AppError::AuthorizationError("Admin access required".to_string()));
        }
        Ok(RequireAdmin(claims))
    }
}
