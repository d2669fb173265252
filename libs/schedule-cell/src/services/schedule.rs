// libs/schedule-cell/src/services/schedule.rs
//
// Shift declarations. One shift per (doctor, date); a new submission replaces
// the prior one wholesale and regenerates the derived slot set under the
// shift's scheduling lock.

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateShiftRequest, ScheduleError, Shift, ShiftUpsertOutcome};
use crate::services::locks::{shift_lock_key, SchedulingLockService};
use crate::services::slot_store::SlotStoreService;
use crate::services::slots::{generate_slots, parse_wall_clock, SlotInterval};

pub struct ScheduleService {
    supabase: Arc<SupabaseClient>,
    slot_store: SlotStoreService,
    locks: SchedulingLockService,
    granularity_minutes: u32,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            slot_store: SlotStoreService::new(Arc::clone(&supabase)),
            locks: SchedulingLockService::new(Arc::clone(&supabase)),
            granularity_minutes: config.slot_granularity_minutes,
            supabase,
        }
    }

    pub fn slot_store(&self) -> &SlotStoreService {
        &self.slot_store
    }

    /// Create or replace the shift for (doctor, date) and regenerate its
    /// slots. Existing Booked slots survive the regeneration; they come back
    /// in the outcome's conflict list.
    pub async fn upsert_shift(
        &self,
        request: CreateShiftRequest,
        auth_token: &str,
    ) -> Result<ShiftUpsertOutcome, ScheduleError> {
        debug!("Upserting shift for doctor {} on {}", request.doctor_id, request.date);

        let start_time = parse_wall_clock(&request.start_time)?;
        let end_time = parse_wall_clock(&request.end_time)?;

        // Validates the range as a side effect: end must be after start.
        let intervals = generate_slots(start_time, end_time, self.granularity_minutes)?;

        self.verify_doctor_exists(request.doctor_id, auth_token).await?;

        let lock_key = shift_lock_key(request.doctor_id, request.date);
        if !self.locks.acquire(&lock_key, request.doctor_id).await? {
            return Err(ScheduleError::LockContention);
        }

        let outcome = self
            .upsert_locked(&request, start_time, end_time, &intervals, auth_token)
            .await;

        if let Err(e) = self.locks.release(&lock_key).await {
            warn!("Failed to release scheduling lock {}: {}", lock_key, e);
        }

        if let Ok(ref outcome) = outcome {
            info!(
                "Shift {} saved for doctor {} on {}: {} slots, {} booked preserved",
                outcome.shift.id, request.doctor_id, request.date,
                outcome.slots.len(), outcome.booked_conflicts.len()
            );
        }

        outcome
    }

    /// All shifts declared by a doctor, date ascending. Display only.
    pub async fn get_shifts_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Shift>, ScheduleError> {
        let path = format!("/rest/v1/shifts?doctor_id=eq.{}&order=date.asc", doctor_id);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(|row| serde_json::from_value(row)
                .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse shift: {}", e))))
            .collect()
    }

    async fn upsert_locked(
        &self,
        request: &CreateShiftRequest,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
        intervals: &[SlotInterval],
        auth_token: &str,
    ) -> Result<ShiftUpsertOutcome, ScheduleError> {
        let existing = self.find_shift(request.doctor_id, request.date, auth_token).await?;

        let now = Utc::now();
        let shift = match existing {
            Some(shift) => {
                let body = json!({
                    "shift_label": request.shift_label,
                    "start_time": start_time.format("%H:%M:%S").to_string(),
                    "end_time": end_time.format("%H:%M:%S").to_string(),
                    "updated_at": now.to_rfc3339()
                });
                let path = format!("/rest/v1/shifts?id=eq.{}", shift.id);
                let result: Vec<Value> = self.supabase
                    .request_with_headers(
                        Method::PATCH,
                        &path,
                        Some(auth_token),
                        Some(body),
                        Some(SupabaseClient::representation_headers()),
                    )
                    .await
                    .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
                parse_shift(result)?
            }
            None => {
                let body = json!({
                    "id": Uuid::new_v4(),
                    "doctor_id": request.doctor_id,
                    "date": request.date,
                    "shift_label": request.shift_label,
                    "start_time": start_time.format("%H:%M:%S").to_string(),
                    "end_time": end_time.format("%H:%M:%S").to_string(),
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                });
                let result: Vec<Value> = self.supabase
                    .request_with_headers(
                        Method::POST,
                        "/rest/v1/shifts",
                        Some(auth_token),
                        Some(body),
                        Some(SupabaseClient::representation_headers()),
                    )
                    .await
                    .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
                parse_shift(result)?
            }
        };

        let replacement = self.slot_store
            .replace_slots(request.doctor_id, request.date, &request.shift_label, intervals, auth_token)
            .await?;

        Ok(ShiftUpsertOutcome {
            shift,
            slots: replacement.inserted,
            booked_conflicts: replacement.preserved_booked,
        })
    }

    async fn find_shift(
        &self,
        doctor_id: Uuid,
        date: chrono::NaiveDate,
        auth_token: &str,
    ) -> Result<Option<Shift>, ScheduleError> {
        let path = format!("/rest/v1/shifts?doctor_id=eq.{}&date=eq.{}", doctor_id, date);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)
                .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse shift: {}", e)))?)),
            None => Ok(None),
        }
    }

    async fn verify_doctor_exists(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::DoctorNotFound);
        }
        Ok(())
    }
}

fn parse_shift(rows: Vec<Value>) -> Result<Shift, ScheduleError> {
    rows.into_iter().next()
        .ok_or_else(|| ScheduleError::DatabaseError("Shift write returned no row".to_string()))
        .and_then(|row| serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse shift: {}", e))))
}
