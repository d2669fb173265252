// libs/schedule-cell/src/services/slot_store.rs
//
// Materialized time slots. Each slot has exactly one lifecycle:
// created Available in bulk when its shift is (re)generated, claimed Booked
// at most once, and released back to Available only on cancellation.

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{ScheduleError, SlotReplacement, SlotStatus, TimeSlot};
use crate::services::slots::SlotInterval;

pub struct SlotStoreService {
    supabase: Arc<SupabaseClient>,
}

impl SlotStoreService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Replace the slot set for one shift. Available slots are deleted and
    /// rebuilt from `intervals`; Booked slots survive untouched so a shift
    /// edit never invalidates an existing appointment. An interval that
    /// overlaps a surviving Booked slot is skipped, and the preserved slots
    /// are reported back as conflicts for the editing doctor.
    ///
    /// The slot set is keyed by (doctor, date), matching the shift key. The
    /// label only annotates the inserted rows; deleting by label too would
    /// strand the old slots whenever a resubmission renames the shift.
    ///
    /// Callers hold the shift's scheduling lock for the duration.
    pub async fn replace_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        shift_label: &str,
        intervals: &[SlotInterval],
        auth_token: &str,
    ) -> Result<SlotReplacement, ScheduleError> {
        debug!("Replacing slots for doctor {} on {} ({})", doctor_id, date, shift_label);

        let booked = self.find_by_status(doctor_id, date, SlotStatus::Booked, auth_token).await?;

        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&date=eq.{}&status=eq.available",
            doctor_id, date
        );
        let _: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(auth_token),
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let rows: Vec<Value> = intervals.iter()
            .filter(|interval| {
                !booked.iter().any(|slot| {
                    interval.start < slot.end_time && interval.end > slot.start_time
                })
            })
            .map(|interval| json!({
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "date": date,
                "shift_label": shift_label,
                "start_time": interval.start.format("%H:%M:%S").to_string(),
                "end_time": interval.end.format("%H:%M:%S").to_string(),
                "status": SlotStatus::Available.to_string(),
                "appointment_id": null
            }))
            .collect();

        let inserted = if rows.is_empty() {
            Vec::new()
        } else {
            let result: Vec<Value> = self.supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/time_slots",
                    Some(auth_token),
                    Some(Value::Array(rows)),
                    Some(SupabaseClient::representation_headers()),
                )
                .await
                .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
            parse_slots(result)?
        };

        debug!(
            "Slot replacement complete: {} inserted, {} booked preserved",
            inserted.len(), booked.len()
        );

        Ok(SlotReplacement { inserted, preserved_booked: booked })
    }

    /// Available slots for a doctor on a date, start ascending. An empty
    /// result means no current availability, not an error.
    pub async fn find_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&date=eq.{}&status=eq.available&order=start_time.asc",
            doctor_id, date
        );
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        parse_slots(result)
    }

    /// Distinct dates on which the doctor has at least one available slot.
    pub async fn list_available_dates(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<NaiveDate>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&status=eq.available&select=date&order=date.asc",
            doctor_id
        );
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let mut dates: Vec<NaiveDate> = result.into_iter()
            .filter_map(|row| {
                row.get("date")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
            })
            .collect();
        dates.sort();
        dates.dedup();

        Ok(dates)
    }

    pub async fn get_slot(
        &self,
        slot_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<TimeSlot>, ScheduleError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(parse_slots(result)?.into_iter().next())
    }

    /// Atomically claim a slot for an appointment. The status filter makes
    /// this a compare-and-swap: the update matches only while the slot is
    /// still Available, so exactly one of any set of racing claims wins.
    pub async fn claim_slot(
        &self,
        slot_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<TimeSlot, ScheduleError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}&status=eq.available", slot_id);
        let body = json!({
            "status": SlotStatus::Booked.to_string(),
            "appointment_id": appointment_id
        });

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

        // Empty result: the slot was already booked, or never existed. Both
        // surface as unavailable; the caller re-queries availability.
        let slot = parse_slots(result)?.into_iter().next()
            .ok_or(ScheduleError::SlotUnavailable)?;

        debug!("Slot {} claimed for appointment {}", slot_id, appointment_id);
        Ok(slot)
    }

    /// Release a Booked slot back to Available and clear its appointment
    /// reference. Returns None when the slot is already free or gone.
    pub async fn release_slot(
        &self,
        slot_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<TimeSlot>, ScheduleError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}&status=eq.booked", slot_id);
        let body = json!({
            "status": SlotStatus::Available.to_string(),
            "appointment_id": null
        });

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

        Ok(parse_slots(result)?.into_iter().next())
    }

    async fn find_by_status(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        status: SlotStatus,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&date=eq.{}&status=eq.{}&order=start_time.asc",
            doctor_id, date, status
        );

        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        parse_slots(result)
    }
}

fn parse_slots(rows: Vec<Value>) -> Result<Vec<TimeSlot>, ScheduleError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse time slot: {}", e))))
        .collect()
}
