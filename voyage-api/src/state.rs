use std::sync::Arc;
use std::time::Duration;
use voyage_core::access::RouteGate;
use voyage_core::identity::IdentityProvider;
use voyage_core::repository::{BookingRepository, PlanRepository, UserRepository};
use voyage_store::Repositories;

use crate::cache::PlanListingCache;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    /// Claims older than this are re-read from the user store.
    pub refresh_window: u64,
    pub cookie_name: String,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub auth: AuthConfig,
    pub gate: Arc<RouteGate>,
    pub plan_cache: Arc<PlanListingCache>,
    pub vendor_self_verification: bool,
}

impl AppState {
    pub fn new(repos: Repositories, auth: AuthConfig, listing_ttl: Duration) -> Self {
        Self {
            users: repos.users,
            plans: repos.plans,
            bookings: repos.bookings,
            identity: None,
            auth,
            gate: Arc::new(RouteGate::default()),
            plan_cache: Arc::new(PlanListingCache::new(listing_ttl)),
            vendor_self_verification: true,
        }
    }

    pub fn with_identity(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn with_vendor_self_verification(mut self, enabled: bool) -> Self {
        self.vendor_self_verification = enabled;
        self
    }

    /// The configured provider if its id matches the route segment.
    pub fn identity_provider(&self, id: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.identity.as_ref().filter(|p| p.id() == id).cloned()
    }
}
