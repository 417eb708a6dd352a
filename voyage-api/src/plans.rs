use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use voyage_core::validation::{coerce_price, coerce_route, non_empty};
use voyage_core::{NewPlan, Plan, PlanPatch, Role, WriteOutcome};

use crate::error::{ApiJson, AppError};
use crate::middleware::{CurrentUser, RequireVerifiedVendor};
use crate::parse_id;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPlansQuery {
    pub vendor_id: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub route: Option<Value>,
    pub description: Option<String>,
    pub price: Option<Value>,
}

/// Only these fields can change. Anything else in the body (`vendorId`, `planId`, ...) is dropped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub route: Option<Value>,
    pub description: Option<String>,
    pub price: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePlanQuery {
    pub permanent: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/plans", get(list_plans).post(create_plan))
        .route(
            "/api/plans/{id}",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
}

// ============================================================================
// Validation
// ============================================================================

fn route_error() -> AppError {
    AppError::ValidationError("Route must be a location or a list of locations".to_string())
}

fn price_error() -> AppError {
    AppError::ValidationError("Price must be a non-negative number".to_string())
}

impl CreatePlanRequest {
    fn validate(self) -> Result<NewPlan, AppError> {
        let name = non_empty(self.name.as_deref()).map(str::to_string);
        let (Some(name), Some(route), Some(price)) = (name, self.route, self.price) else {
            return Err(AppError::ValidationError(
                "Missing required fields: name, route, or price".to_string(),
            ));
        };

        Ok(NewPlan {
            name,
            image: self.image.unwrap_or_default().trim().to_string(),
            route: coerce_route(&route).ok_or_else(route_error)?,
            description: self.description.unwrap_or_default().trim().to_string(),
            price: coerce_price(&price).ok_or_else(price_error)?,
        })
    }
}

impl UpdatePlanRequest {
    fn into_patch(self) -> Result<PlanPatch, AppError> {
        let name = match self.name {
            Some(name) => Some(
                non_empty(Some(name.as_str()))
                    .map(str::to_string)
                    .ok_or_else(|| AppError::ValidationError("Plan name cannot be empty".to_string()))?,
            ),
            None => None,
        };
        let route = match self.route {
            Some(route) => Some(coerce_route(&route).ok_or_else(route_error)?),
            None => None,
        };
        let price = match self.price {
            Some(price) => Some(coerce_price(&price).ok_or_else(price_error)?),
            None => None,
        };

        Ok(PlanPatch {
            name,
            image: self.image.map(|s| s.trim().to_string()),
            route,
            description: self.description.map(|s| s.trim().to_string()),
            price,
            is_active: self.is_active,
        })
    }
}

async fn load_plan(state: &AppState, raw_id: &str) -> Result<Plan, AppError> {
    let id = parse_id(raw_id, "Plan")?;
    state
        .plans
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Plan not found".to_string()))
}

fn ensure_can_modify(caller: &CurrentUser, plan: &Plan) -> Result<(), AppError> {
    let CurrentUser(claims) = caller;
    if claims.role == Role::Admin || (claims.role == Role::Vendor && claims.sub == plan.vendor_id) {
        return Ok(());
    }
    Err(AppError::AuthorizationError(
        "You can only modify your own plans".to_string(),
    ))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_plans(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<Value>, AppError> {
    let needle = query.q.unwrap_or_default();

    let plans: Vec<Plan> = match non_empty(query.vendor_id.as_deref()) {
        Some(raw) => {
            let vendor_id = Uuid::parse_str(raw)
                .map_err(|_| AppError::ValidationError("Invalid vendorId".to_string()))?;
            let sees_inactive = viewer.is_some_and(|CurrentUser(c)| {
                c.role == Role::Admin || c.sub == vendor_id
            });
            state
                .plans
                .list_by_vendor(vendor_id)
                .await?
                .into_iter()
                .filter(|p| (sees_inactive || p.is_active) && p.matches_query(&needle))
                .collect()
        }
        None => {
            let listing = state
                .plan_cache
                .get_or_load(|| state.plans.list_active())
                .await?;
            listing
                .iter()
                .filter(|p| p.matches_query(&needle))
                .cloned()
                .collect()
        }
    };

    Ok(Json(json!({
        "count": plans.len(),
        "plans": plans,
    })))
}

async fn create_plan(
    State(state): State<AppState>,
    RequireVerifiedVendor(vendor): RequireVerifiedVendor,
    ApiJson(req): ApiJson<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let plan = Plan::new(vendor.sub, req.validate()?);
    state.plans.create(&plan).await?;
    state.plan_cache.invalidate().await;
    tracing::info!("Vendor {} created plan {}", vendor.sub, plan.plan_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "plan": plan,
            "message": "Plan created successfully",
        })),
    ))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let plan = load_plan(&state, &id).await?;
    Ok(Json(json!({ "plan": plan })))
}

async fn update_plan(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePlanRequest>,
) -> Result<Json<Value>, AppError> {
    let patch = req.into_patch()?;
    let plan = load_plan(&state, &id).await?;
    ensure_can_modify(&caller, &plan)?;

    if patch.is_empty() {
        return Ok(Json(json!({
            "plan": plan,
            "message": "Nothing to update",
        })));
    }

    let updated = match state.plans.update(plan.plan_id, &patch).await? {
        WriteOutcome::Applied(updated) => updated,
        _ => return Err(AppError::NotFoundError("Plan not found".to_string())),
    };
    state.plan_cache.invalidate().await;

    Ok(Json(json!({
        "plan": updated,
        "message": "Plan updated successfully",
    })))
}

async fn delete_plan(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<DeletePlanQuery>,
) -> Result<Json<Value>, AppError> {
    let plan = load_plan(&state, &id).await?;
    ensure_can_modify(&caller, &plan)?;

    let message = if query.permanent.unwrap_or(false) {
        if caller.0.role != Role::Admin {
            return Err(AppError::AuthorizationError(
                "Only admins can permanently delete plans".to_string(),
            ));
        }
        if !state.plans.delete(plan.plan_id).await? {
            return Err(AppError::NotFoundError("Plan not found".to_string()));
        }
        tracing::info!("Plan {} permanently deleted by {}", plan.plan_id, caller.0.sub);
        "Plan permanently deleted"
    } else {
        if state.plans.deactivate(plan.plan_id).await?.applied().is_none() {
            return Err(AppError::NotFoundError("Plan not found".to_string()));
        }
        "Plan deleted successfully"
    };
    state.plan_cache.invalidate().await;

    Ok(Json(json!({ "message": message })))
}
