//! Path-based request gating.
//!
//! Paths are matched segment-wise (`/vendor` covers `/vendor/x` but not
//! `/vendors`). Precedence: static assets and the public allow-list, then
//! admin prefixes, then vendor prefixes, then everything else needs a session.

use crate::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Authenticated,
    Vendor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// No session. Send the caller to sign in, then back to `callback_url`.
    SignIn { callback_url: String },
    /// Session present but the role does not fit the path.
    WrongRole { redirect_to: &'static str },
}

#[derive(Debug, Clone)]
pub struct RouteGate {
    public_exact: Vec<String>,
    public_prefixes: Vec<String>,
    admin_prefixes: Vec<String>,
    vendor_prefixes: Vec<String>,
    sign_in_path: String,
}

impl Default for RouteGate {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            public_exact: owned(&["/", "/vendor", "/trips"]),
            public_prefixes: owned(&["/auth", "/market", "/api/plans", "/api/auth"]),
            admin_prefixes: owned(&["/admin", "/api/admin"]),
            vendor_prefixes: owned(&["/vendor"]),
            sign_in_path: "/auth/signin".to_string(),
        }
    }
}

impl RouteGate {
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if is_static_asset(path)
            || self.public_exact.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| has_prefix(path, p))
        {
            return RouteClass::Public;
        }
        if self.admin_prefixes.iter().any(|p| has_prefix(path, p)) {
            return RouteClass::Admin;
        }
        if self.vendor_prefixes.iter().any(|p| has_prefix(path, p)) {
            return RouteClass::Vendor;
        }
        RouteClass::Authenticated
    }

    pub fn decide(&self, path: &str, role: Option<Role>) -> GateDecision {
        let required = match self.classify(path) {
            RouteClass::Public => return GateDecision::Allow,
            RouteClass::Authenticated => None,
            RouteClass::Vendor => Some(Role::Vendor),
            RouteClass::Admin => Some(Role::Admin),
        };

        let Some(role) = role else {
            return GateDecision::SignIn {
                callback_url: path.to_string(),
            };
        };

        match required {
            Some(needed) if needed != role => GateDecision::WrongRole {
                redirect_to: role.home_path(),
            },
            _ => GateDecision::Allow,
        }
    }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

fn is_static_asset(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}
