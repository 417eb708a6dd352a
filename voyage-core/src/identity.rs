use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CoreError, CoreResult};

/// What an external identity provider tells us about the person signing in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthProfile {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider id used in route paths, e.g. `google`.
    fn id(&self) -> &str;

    /// URL to send the browser to. `state` comes back untouched on the callback.
    fn authorization_url(&self, state: &str) -> CoreResult<String>;

    /// Trade the callback's authorization code for the signed-in profile.
    async fn exchange_code(&self, code: &str) -> CoreResult<OAuthProfile>;
}

/// Provider that resolves fixed codes to fixed profiles. Used by tests and local runs.
pub struct MockIdentityProvider {
    id: String,
    profiles: HashMap<String, OAuthProfile>,
}

impl MockIdentityProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            profiles: HashMap::new(),
        }
    }

    pub fn with_profile(mut self, code: &str, email: &str, name: &str) -> Self {
        self.profiles.insert(
            code.to_string(),
            OAuthProfile {
                provider: self.id.clone(),
                subject: format!("{}-{}", self.id, code),
                email: email.to_string(),
                name: Some(name.to_string()),
                image: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn authorization_url(&self, state: &str) -> CoreResult<String> {
        Ok(format!("https://identity.invalid/{}/authorize?state={}", self.id, state))
    }

    async fn exchange_code(&self, code: &str) -> CoreResult<OAuthProfile> {
        tracing::info!("Resolving mock authorization code for provider {}", self.id);
        self.profiles
            .get(code)
            .cloned()
            .ok_or_else(|| CoreError::IdentityError("Unknown authorization code".to_string()))
    }
}
