pub mod app_config;
pub mod booking_repo;
pub mod document;
pub mod memory;
pub mod plan_repo;
pub mod redis_repo;
pub mod seed;
pub mod user_repo;

use std::sync::Arc;
use voyage_core::repository::{BookingRepository, PlanRepository, UserRepository};

pub use app_config::{Config, StoreBackend, StoreConfig, TableNames};
pub use booking_repo::StoreBookingRepository;
pub use document::{Condition, DocumentStore, Filter, StoreError, StoreResult, UpdateOutcome};
pub use memory::MemoryStore;
pub use plan_repo::StorePlanRepository;
pub use redis_repo::RedisStore;
pub use seed::seed_sample_plans;
pub use user_repo::StoreUserRepository;

/// Open the backend named in `[store]`.
pub async fn open_document_store(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| StoreError::Config("store.redis_url is required for the redis backend".into()))?;
            Ok(Arc::new(RedisStore::new(url, &config.key_prefix).await?))
        }
    }
}

/// The typed repositories over one document store.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>, tables: &TableNames) -> Self {
        Self {
            users: Arc::new(StoreUserRepository::new(
                store.clone(),
                &tables.users,
                &tables.user_emails,
            )),
            plans: Arc::new(StorePlanRepository::new(store.clone(), &tables.plans)),
            bookings: Arc::new(StoreBookingRepository::new(store, &tables.bookings)),
        }
    }
}
