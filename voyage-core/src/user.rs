use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use voyage_shared::Redacted;

/// Account role. Closed set; anything else in a stored document is a corrupt record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    /// Landing page for the role. Used after signup and when a page is off-limits for the role.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::User => "/",
            Role::Vendor => "/vendor/dashboard",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            other => Err(crate::CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VendorInfo {
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
}

impl VendorInfo {
    fn to_value(&self) -> Value {
        serde_json::json!({
            "organizationName": self.organization_name,
            "phoneNumber": self.phone_number,
            "address": self.address,
        })
    }
}

/// A stored account. `password` is absent for OAuth-only accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Redacted<String>>,
    pub role: Role,
    #[serde(default)]
    pub vendor_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_info: Option<VendorInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            image: None,
            password: None,
            role,
            vendor_verified: false,
            vendor_info: None,
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn with_password_hash(mut self, hash: String) -> Self {
        self.password = Some(Redacted::new(hash));
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_vendor_info(mut self, info: VendorInfo) -> Self {
        self.vendor_info = Some(info);
        self
    }

    pub fn is_pending_vendor(&self) -> bool {
        self.role == Role::Vendor && !self.vendor_verified
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            user_id: self.user_id,
            email: self.email.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
            role: self.role,
            vendor_verified: self.vendor_verified,
            vendor_info: self.vendor_info.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Client-facing view of a [`User`]. Has no password field at all.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub role: Role,
    pub vendor_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_info: Option<VendorInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The mutable subset of a user. `userId`, `email`, `password` and `createdAt` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Option<Role>,
    pub vendor_verified: Option<bool>,
    pub vendor_info: Option<VendorInfo>,
}

impl UserPatch {
    pub fn verify_vendor() -> Self {
        Self {
            vendor_verified: Some(true),
            ..Default::default()
        }
    }

    /// Role promotion for an existing `user` account. Verification starts over.
    pub fn promote_to_vendor(info: VendorInfo) -> Self {
        Self {
            role: Some(Role::Vendor),
            vendor_verified: Some(false),
            vendor_info: Some(info),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image.is_none()
            && self.role.is_none()
            && self.vendor_verified.is_none()
            && self.vendor_info.is_none()
    }

    /// Attribute map for the store's merge update, keyed by stored attribute names.
    pub fn to_changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(name) = &self.name {
            changes.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(image) = &self.image {
            changes.insert("image".into(), Value::from(image.as_str()));
        }
        if let Some(role) = self.role {
            changes.insert("role".into(), Value::from(role.as_str()));
        }
        if let Some(verified) = self.vendor_verified {
            changes.insert("vendorVerified".into(), Value::Bool(verified));
        }
        if let Some(info) = &self.vendor_info {
            changes.insert("vendorInfo".into(), info.to_value());
        }
        changes
    }
}
