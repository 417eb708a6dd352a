use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A travel plan listed by a vendor. `vendor_id` is the only ownership key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub route: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new plan.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub name: String,
    pub image: String,
    pub route: Vec<String>,
    pub description: String,
    pub price: f64,
}

impl Plan {
    pub fn new(vendor_id: Uuid, input: NewPlan) -> Self {
        let now = Utc::now();
        Self {
            plan_id: Uuid::new_v4(),
            vendor_id,
            name: input.name,
            image: input.image,
            route: input.route,
            description: input.description,
            price: input.price,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        self.route.first().map(String::as_str)
    }

    pub fn destination(&self) -> Option<&str> {
        self.route.last().map(String::as_str)
    }

    /// Case-insensitive substring match over name, description and every route stop.
    /// An empty query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.route.iter().any(|stop| stop.to_lowercase().contains(&needle))
    }
}

/// The mutable subset of a plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub route: Option<Vec<String>>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub is_active: Option<bool>,
}

impl PlanPatch {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image.is_none()
            && self.route.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.is_active.is_none()
    }

    pub fn to_changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(name) = &self.name {
            changes.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(image) = &self.image {
            changes.insert("image".into(), Value::from(image.as_str()));
        }
        if let Some(route) = &self.route {
            changes.insert("route".into(), Value::from(route.clone()));
        }
        if let Some(description) = &self.description {
            changes.insert("description".into(), Value::from(description.as_str()));
        }
        if let Some(price) = self.price {
            changes.insert("price".into(), Value::from(price));
        }
        if let Some(active) = self.is_active {
            changes.insert("isActive".into(), Value::Bool(active));
        }
        changes
    }
}
