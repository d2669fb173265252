// libs/appointment-cell/src/services/booking.rs
//
// Booking pipeline. A booking claims its slot first, with a compare-and-swap
// on the slot row, and only then writes the appointment. Racing bookings for
// the same slot resolve at the claim: one wins, the rest see the slot as
// unavailable. A failed appointment write releases the claimed slot again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::services::locks::{shift_lock_key, SchedulingLockService};
use schedule_cell::services::slot_store::SlotStoreService;
use schedule_cell::models::{ScheduleError, TimeSlot};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, BookAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    slot_store: SlotStoreService,
    locks: SchedulingLockService,
    lifecycle: AppointmentLifecycleService,
}

fn map_slot_error(e: ScheduleError) -> AppointmentError {
    match e {
        ScheduleError::SlotUnavailable => AppointmentError::SlotUnavailable,
        ScheduleError::LockContention => AppointmentError::ScheduleBusy,
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            slot_store: SlotStoreService::new(Arc::clone(&supabase)),
            locks: SchedulingLockService::new(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    /// Book an appointment on a specific slot. The new appointment starts
    /// Pending; the slot flips to Booked atomically before the appointment
    /// row exists.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking slot {} for patient {} with doctor {}",
            request.time_slot_id, request.patient_id, request.doctor_id
        );

        let slot = self
            .slot_store
            .get_slot(request.time_slot_id, auth_token)
            .await
            .map_err(map_slot_error)?
            .ok_or(AppointmentError::SlotUnavailable)?;

        if slot.doctor_id != request.doctor_id || slot.date != request.date {
            return Err(AppointmentError::ValidationError(
                "Requested slot does not belong to that doctor and date".to_string(),
            ));
        }

        // Serializes with shift regeneration on the same shift; the claim
        // itself still guards against competing bookings.
        let lock_key = shift_lock_key(slot.doctor_id, slot.date);
        if !self
            .locks
            .acquire(&lock_key, slot.doctor_id)
            .await
            .map_err(map_slot_error)?
        {
            return Err(AppointmentError::ScheduleBusy);
        }

        let result = self.book_locked(&request, auth_token).await;

        if let Err(e) = self.locks.release(&lock_key).await {
            warn!("Failed to release scheduling lock {}: {}", lock_key, e);
        }

        if let Ok(ref appointment) = result {
            info!(
                "Appointment {} booked: patient {} with doctor {} on {}",
                appointment.id, appointment.patient_id, appointment.doctor_id, appointment.date
            );
        }

        result
    }

    async fn book_locked(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment_id = Uuid::new_v4();

        self.slot_store
            .claim_slot(request.time_slot_id, appointment_id, auth_token)
            .await
            .map_err(map_slot_error)?;

        let now = Utc::now();
        let body = json!({
            "id": appointment_id,
            "doctor_id": request.doctor_id,
            "patient_id": request.patient_id,
            "date": request.date,
            "time_slot_id": request.time_slot_id,
            "status": AppointmentStatus::Pending.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let insert = self
            .supabase
            .request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await;

        match insert {
            Ok(rows) => parse_appointment(rows),
            Err(e) => {
                // The slot was claimed but the appointment never landed;
                // free the slot again before surfacing the failure.
                if let Err(release_err) = self
                    .slot_store
                    .release_slot(request.time_slot_id, auth_token)
                    .await
                {
                    warn!(
                        "Failed to release slot {} after booking failure: {}",
                        request.time_slot_id, release_err
                    );
                }
                Err(AppointmentError::DatabaseError(e.to_string()))
            }
        }
    }

    /// Move an appointment through its lifecycle. Cancellation releases the
    /// underlying slot so it becomes bookable again.
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        self.lifecycle.authorize_transition(user, &appointment, new_status)?;
        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        let body = json!({
            "status": new_status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });
        // Conditional on the status just validated against, so two racing
        // legal transitions cannot both land: the update matches only while
        // the appointment still holds that status.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, appointment.status
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            warn!(
                "Appointment {} left {} before the transition landed",
                appointment_id, appointment.status
            );
            return Err(AppointmentError::ConcurrentUpdate);
        }
        let updated = parse_appointment(rows)?;

        if new_status == AppointmentStatus::Cancelled {
            match self
                .slot_store
                .release_slot(appointment.time_slot_id, auth_token)
                .await
            {
                Ok(Some(_)) => {
                    debug!("Slot {} released after cancellation", appointment.time_slot_id)
                }
                Ok(None) => warn!(
                    "Slot {} was not booked when appointment {} was cancelled",
                    appointment.time_slot_id, appointment_id
                ),
                Err(e) => warn!(
                    "Failed to release slot {} for cancelled appointment {}: {}",
                    appointment.time_slot_id, appointment_id, e
                ),
            }
        }

        info!(
            "Appointment {} moved from {} to {}",
            appointment_id, appointment.status, new_status
        );

        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        parse_appointment(rows)
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let path = format!("/rest/v1/appointments?doctor_id=eq.{}&order=date.asc", doctor_id);
        self.list_views(&path, auth_token).await
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let path = format!("/rest/v1/appointments?patient_id=eq.{}&order=date.asc", patient_id);
        self.list_views(&path, auth_token).await
    }

    pub async fn list_all(&self, auth_token: &str) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.list_views("/rest/v1/appointments?order=date.asc", auth_token).await
    }

    /// Fetch appointments plus their slots and participant names, then join
    /// in memory. Batch `in.(...)` lookups keep this at four requests total.
    async fn list_views(
        &self,
        appointments_path: &str,
        auth_token: &str,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, appointments_path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = rows
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect::<Result<_, _>>()?;

        if appointments.is_empty() {
            return Ok(Vec::new());
        }

        let slot_ids: Vec<String> =
            appointments.iter().map(|a| a.time_slot_id.to_string()).collect();
        let doctor_ids: Vec<String> =
            appointments.iter().map(|a| a.doctor_id.to_string()).collect();
        let patient_ids: Vec<String> =
            appointments.iter().map(|a| a.patient_id.to_string()).collect();

        let slots = self.fetch_slots(&slot_ids, auth_token).await?;
        let doctor_names = self.fetch_names("doctors", &doctor_ids, auth_token).await?;
        let patient_names = self.fetch_names("patients", &patient_ids, auth_token).await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let slot = slots.get(&appointment.time_slot_id);
                AppointmentView {
                    id: appointment.id,
                    doctor_id: appointment.doctor_id,
                    patient_id: appointment.patient_id,
                    date: appointment.date,
                    status: appointment.status,
                    start_time: slot.map(|s| s.start_time),
                    end_time: slot.map(|s| s.end_time),
                    shift_label: slot.map(|s| s.shift_label.clone()),
                    doctor_name: doctor_names.get(&appointment.doctor_id).cloned(),
                    patient_name: patient_names.get(&appointment.patient_id).cloned(),
                }
            })
            .collect())
    }

    async fn fetch_slots(
        &self,
        slot_ids: &[String],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, TimeSlot>, AppointmentError> {
        let path = format!("/rest/v1/time_slots?id=in.({})", slot_ids.join(","));
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<TimeSlot>(row)
                    .map(|slot| (slot.id, slot))
                    .map_err(|e| {
                        AppointmentError::DatabaseError(format!("Failed to parse time slot: {}", e))
                    })
            })
            .collect()
    }

    async fn fetch_names(
        &self,
        table: &str,
        ids: &[String],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, String>, AppointmentError> {
        let path = format!(
            "/rest/v1/{}?id=in.({})&select=id,full_name",
            table,
            ids.join(",")
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id").and_then(|v| v.as_str())?.parse().ok()?;
                let name = row.get("full_name").and_then(|v| v.as_str())?.to_string();
                Some((id, name))
            })
            .collect())
    }
}

fn parse_appointment(rows: Vec<Value>) -> Result<Appointment, AppointmentError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| {
            AppointmentError::DatabaseError("Appointment write returned no row".to_string())
        })
        .and_then(|row| {
            serde_json::from_value(row).map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
            })
        })
}
