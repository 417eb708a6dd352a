pub mod access;
pub mod booking;
pub mod identity;
pub mod password;
pub mod plan;
pub mod repository;
pub mod session;
pub mod user;
pub mod validation;

pub use booking::{Booking, PaymentStatus};
pub use plan::{NewPlan, Plan, PlanPatch};
pub use repository::{RepoResult, RepositoryError, WriteOutcome};
pub use user::{PublicUser, Role, User, UserPatch, VendorInfo};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
