use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub tables: TableNames,
    pub auth: AuthConfig,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Pre-built web bundle served for every path no API route claims.
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default)]
    pub seed_sample_plans: bool,
}

fn default_key_prefix() -> String {
    "voyage:".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableNames {
    pub users: String,
    pub user_emails: String,
    pub plans: String,
    pub bookings: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            users: "Users".to_string(),
            user_emails: "UserEmails".to_string(),
            plans: "TravelPlans".to_string(),
            bookings: "Bookings".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_claims_refresh")]
    pub claims_refresh_seconds: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    pub google: Option<GoogleConfig>,
}

fn default_claims_refresh() -> u64 { 60 }

fn default_cookie_name() -> String {
    "voyage.session-token".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VendorConfig {
    /// Lets a vendor mark their own account verified from the dashboard.
    /// When off, only an admin can approve vendors.
    pub self_verification: bool,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self { self_verification: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub plan_listing_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { plan_listing_ttl_seconds: 30 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `VOYAGE__AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("VOYAGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
