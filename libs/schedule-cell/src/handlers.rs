// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{AvailabilityQuery, CreateShiftRequest, ScheduleError};
use crate::services::schedule::ScheduleService;

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::InvalidRange(msg) => AppError::BadRequest(msg),
        ScheduleError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ScheduleError::SlotUnavailable => {
            AppError::Conflict("That slot was just taken, please choose another".to_string())
        }
        ScheduleError::LockContention => {
            AppError::Conflict("This schedule is being updated, please retry".to_string())
        }
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Declare or replace a doctor's shift for one date. Doctors may only edit
/// their own schedule; admins may edit any.
#[axum::debug_handler]
pub async fn create_shift(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateShiftRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();

    let is_own_schedule = user.role == Role::Doctor && user.is_self(&request.doctor_id.to_string());
    if !is_own_schedule && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to edit this doctor's schedule".to_string()));
    }

    let schedule_service = ScheduleService::new(&state);

    let outcome = schedule_service.upsert_shift(request, token).await
        .map_err(map_schedule_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "shift": outcome.shift,
            "slots_created": outcome.slots.len(),
            "booked_conflicts": outcome.booked_conflicts,
            "message": if outcome.booked_conflicts.is_empty() {
                "Shift saved and slots generated"
            } else {
                "Shift saved; some booked slots from the previous shift were kept"
            }
        })),
    ))
}

/// A doctor's declared shifts, date ascending.
#[axum::debug_handler]
pub async fn get_doctor_shifts(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let schedule_service = ScheduleService::new(&state);

    let shifts = schedule_service.get_shifts_for_doctor(doctor_id, token).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "shifts": shifts
    })))
}

/// Dates on which the doctor still has at least one available slot.
#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let schedule_service = ScheduleService::new(&state);

    let dates = schedule_service.slot_store().list_available_dates(doctor_id, token).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "available_dates": dates
    })))
}

/// Available slots for a doctor on a date. Empty when no shift is declared;
/// that is "no availability", not an error.
#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let schedule_service = ScheduleService::new(&state);

    let slots = schedule_service.slot_store()
        .find_available(query.doctor_id, query.date, token).await
        .map_err(map_schedule_error)?;

    let total = slots.len();
    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": query.date,
        "available_slots": slots,
        "total": total
    })))
}
