//! Session claims and the claims-refresh step.
//!
//! A session token carries a snapshot of the account's role and verification
//! flag. Snapshots older than the refresh window are re-read from the user
//! store, so a role change is visible after at most one window.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::{RepoResult, UserRepository};
use crate::user::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub vendor_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_user(user: &User, now: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: user.user_id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            vendor_verified: user.vendor_verified,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    pub fn is_stale(&self, now: i64, refresh_window_seconds: i64) -> bool {
        now - self.iat >= refresh_window_seconds
    }

    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.sub,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            vendor_verified: self.vendor_verified,
        }
    }
}

/// The `user` object of a session response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub vendor_verified: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            vendor_verified: user.vendor_verified,
        }
    }
}

/// Re-read the account behind `claims` and mint a fresh snapshot.
///
/// `Ok(None)` means the account is gone and the session must be dropped.
pub async fn refresh_claims(
    users: &dyn UserRepository,
    claims: &SessionClaims,
    now: i64,
    ttl_seconds: i64,
) -> RepoResult<Option<SessionClaims>> {
    let Some(user) = users.find_by_email(&claims.email).await? else {
        tracing::info!("Session subject {} no longer exists", claims.sub);
        return Ok(None);
    };
    Ok(Some(SessionClaims::for_user(&user, now, ttl_seconds)))
}
