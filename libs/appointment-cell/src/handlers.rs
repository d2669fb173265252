// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
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

use crate::models::{AppointmentError, AppointmentStatus, BookAppointmentRequest, UpdateStatusRequest};
use crate::services::booking::AppointmentBookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::SlotUnavailable => {
            AppError::Conflict("That slot was just taken, please choose another".to_string())
        }
        AppointmentError::ScheduleBusy => {
            AppError::Conflict("This schedule is being updated, please retry".to_string())
        }
        AppointmentError::ConcurrentUpdate => {
            AppError::Conflict("The appointment was just updated, please retry".to_string())
        }
        AppointmentError::InvalidTransition { from, requested } => AppError::Conflict(format!(
            "Cannot move appointment from {} to {}",
            from, requested
        )),
        AppointmentError::Unauthorized(msg) => AppError::Auth(msg),
        AppointmentError::ValidationError(msg) => AppError::BadRequest(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Book a slot. Patients book for themselves; admins may book on a
/// patient's behalf.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();

    let books_for_self = user.is_self(&request.patient_id.to_string());
    if !books_for_self && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to book for this patient".to_string()));
    }

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.book_appointment(request, token).await
        .map_err(map_appointment_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .transition_status(appointment_id, request.status, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Cancellation shortcut; same lifecycle rules as a status update to
/// cancelled.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .transition_status(appointment_id, AppointmentStatus::Cancelled, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled and slot released"
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_own_list = user.role == Role::Doctor && user.is_self(&doctor_id.to_string());
    if !is_own_list && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this doctor's appointments".to_string()));
    }

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_doctor(doctor_id, token).await
        .map_err(map_appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_self(&patient_id.to_string()) && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this patient's appointments".to_string()));
    }

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_patient(patient_id, token).await
        .map_err(map_appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": total
    })))
}

/// Every appointment in the system. Admin only.
#[axum::debug_handler]
pub async fn get_all_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Auth("Admin access required".to_string()));
    }

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_all(token).await
        .map_err(map_appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}
