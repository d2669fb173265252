// libs/schedule-cell/src/services/locks.rs
//
// Store-backed scheduling locks. Slot regeneration (doctor edits a shift) and
// slot claims (patient books) race on the same shift; both sides serialize
// through a lock row keyed by (doctor, date, shift label), with an expiry so
// a crashed holder cannot wedge the schedule.

use chrono::{DateTime, NaiveDate, Utc, Duration};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::ScheduleError;

const LOCK_TIMEOUT_SECONDS: i64 = 30;

pub struct SchedulingLockService {
    supabase: Arc<SupabaseClient>,
}

/// Lock key covering one shift's slot set. Keyed by (doctor, date) like the
/// shift itself; the label is an attribute of the shift, not part of the key,
/// so relabeling a shift contends with bookings on the old slots.
pub fn shift_lock_key(doctor_id: Uuid, date: NaiveDate) -> String {
    format!("shift_{}_{}", doctor_id, date)
}

impl SchedulingLockService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Try to acquire the lock. Returns false when another holder has a live,
    /// unexpired lock on the same key.
    pub async fn acquire(&self, lock_key: &str, doctor_id: Uuid) -> Result<bool, ScheduleError> {
        match self.try_insert_lock(lock_key, doctor_id).await {
            Ok(()) => {
                debug!("Scheduling lock acquired: {}", lock_key);
                Ok(true)
            }
            Err(_) => {
                // Lock row exists; clean it up if expired and retry once.
                if self.cleanup_if_expired(lock_key).await? {
                    match self.try_insert_lock(lock_key, doctor_id).await {
                        Ok(()) => {
                            debug!("Scheduling lock acquired after cleanup: {}", lock_key);
                            Ok(true)
                        }
                        Err(_) => Ok(false),
                    }
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub async fn release(&self, lock_key: &str) -> Result<(), ScheduleError> {
        let _: Vec<Value> = self.supabase
            .request_with_headers(
                reqwest::Method::DELETE,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
                None,
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(format!("Lock release failed: {}", e)))?;

        debug!("Scheduling lock released: {}", lock_key);
        Ok(())
    }

    async fn try_insert_lock(&self, lock_key: &str, doctor_id: Uuid) -> Result<(), ScheduleError> {
        let now = Utc::now();
        let lock_data = json!({
            "lock_key": lock_key,
            "doctor_id": doctor_id,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4())
        });

        self.supabase
            .request::<Value>(
                reqwest::Method::POST,
                "/rest/v1/scheduling_locks",
                None,
                Some(lock_data),
            )
            .await
            .map(|_| ())
            .map_err(|e| ScheduleError::DatabaseError(format!("Lock insert failed: {}", e)))
    }

    /// Returns true when an expired lock was removed and acquisition is worth
    /// retrying.
    async fn cleanup_if_expired(&self, lock_key: &str) -> Result<bool, ScheduleError> {
        let response: Value = self.supabase
            .request(
                reqwest::Method::GET,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}&select=*", lock_key),
                None,
                None,
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(format!("Lock check failed: {}", e)))?;

        if let Some(lock) = response.as_array().and_then(|locks| locks.first()) {
            if let Some(expires_at_str) = lock.get("expires_at").and_then(|v| v.as_str()) {
                if let Ok(expires_at) = DateTime::parse_from_rfc3339(expires_at_str) {
                    if expires_at.with_timezone(&Utc) < Utc::now() {
                        warn!("Cleaning up expired scheduling lock: {}", lock_key);
                        self.release(lock_key).await?;
                        return Ok(true);
                    }
                }
            }
        }

        Ok(false)
    }
}
