use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use voyage_core::validation::{coerce_count, non_empty};
use voyage_core::{Booking, PaymentStatus, Role, WriteOutcome};

use crate::error::{ApiJson, AppError};
use crate::middleware::{CurrentUser, RequireAdmin};
use crate::parse_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub plan_id: Option<String>,
    pub num_people: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub payment_status: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/status", put(update_status))
}

async fn list_bookings(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let bookings = state.bookings.list_by_user(claims.sub).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (Some(raw_plan_id), Some(raw_count)) = (non_empty(req.plan_id.as_deref()), req.num_people)
    else {
        return Err(AppError::ValidationError(
            "Missing planId or numPeople".to_string(),
        ));
    };
    let num_people = coerce_count(&raw_count).ok_or_else(|| {
        AppError::ValidationError("numPeople must be a whole number of at least 1".to_string())
    })?;

    let plan_id = parse_id(raw_plan_id, "Plan")?;
    let plan = state
        .plans
        .find_by_id(plan_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Plan not found".to_string()))?;
    if !plan.is_active {
        return Err(AppError::ValidationError(
            "This plan is no longer available".to_string(),
        ));
    }

    let booking = Booking::pending(plan.plan_id, claims.sub, num_people);
    state.bookings.create(&booking).await?;
    tracing::info!(
        "Booking {} created for plan {} ({} people)",
        booking.booking_id,
        plan.plan_id,
        num_people
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "booking": booking,
            "message": "Booking created",
        })),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, "Booking")?;
    let booking = state
        .bookings
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;

    if booking.user_id != claims.sub && claims.role != Role::Admin {
        return Err(AppError::AuthorizationError("Forbidden".to_string()));
    }
    Ok(Json(json!({ "booking": booking })))
}

async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let status = non_empty(req.payment_status.as_deref())
        .and_then(|s| serde_json::from_value::<PaymentStatus>(Value::from(s)).ok())
        .ok_or_else(|| {
            AppError::ValidationError(
                "paymentStatus must be one of pending, completed, failed".to_string(),
            )
        })?;
    let id = parse_id(&id, "Booking")?;

    match state.bookings.update_status(id, status).await? {
        WriteOutcome::Applied(booking) => {
            tracing::info!("Booking {} marked {} by {}", id, status, admin.sub);
            Ok(Json(json!({
                "booking": booking,
                "message": "Booking status updated",
            })))
        }
        _ => Err(AppError::NotFoundError("Booking not found".to_string())),
    }
}
