use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, PaymentStatus};
use crate::plan::{Plan, PlanPatch};
use crate::user::{Role, User, UserPatch};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record already exists: {0}")]
    Conflict(String),
    #[error("Storage backend failure: {0}")]
    Backend(String),
    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Result of a conditional or partial write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Applied(T),
    Missing,
    ConditionFailed,
}

impl<T> WriteOutcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            WriteOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }
}

/// Repository trait for account data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Insert a new account. Fails with [`RepositoryError::Conflict`] if the email is taken,
    /// leaving the existing account untouched.
    async fn create(&self, user: &User) -> RepoResult<()>;

    /// Apply an allow-listed patch. With `expected_role`, the write only happens
    /// if the stored role still matches.
    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        expected_role: Option<Role>,
    ) -> RepoResult<WriteOutcome<User>>;

    /// Vendors awaiting verification.
    async fn list_pending_vendors(&self) -> RepoResult<Vec<User>>;
}

/// Repository trait for travel plan data access
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Plan>>;

    async fn list_active(&self) -> RepoResult<Vec<Plan>>;

    /// Every plan owned by the vendor, active or not.
    async fn list_by_vendor(&self, vendor_id: Uuid) -> RepoResult<Vec<Plan>>;

    async fn create(&self, plan: &Plan) -> RepoResult<()>;

    /// Empty patches write nothing and return the stored plan.
    async fn update(&self, id: Uuid, patch: &PlanPatch) -> RepoResult<WriteOutcome<Plan>>;

    /// Soft delete: the plan leaves the active listing but stays readable by id.
    async fn deactivate(&self, id: Uuid) -> RepoResult<WriteOutcome<Plan>>;

    /// Hard delete. Returns whether a plan was removed.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &Booking) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> RepoResult<WriteOutcome<Booking>>;
}
