pub mod auth;
pub mod gate;

pub use auth::{session_middleware, CurrentUser, RequireAdmin, RequireVendor, RequireVerifiedVendor};
pub use gate::gate_middleware;
