// libs/schedule-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// A doctor's declared working interval for one calendar date. At most one
/// shift exists per (doctor, date); a new submission replaces the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift_label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
        }
    }
}

/// A fixed-width bookable sub-interval of a shift. Booked slots always carry
/// the claiming appointment's id; available slots never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift_label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub appointment_id: Option<Uuid>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Shift submission. Times arrive as wall-clock strings because the booking
/// UI historically sends both "HH:MM" and "hh:MM AM/PM" forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShiftRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift_label: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

/// Result of replacing a shift's slot set. Booked slots survive a shift edit
/// untouched and are reported back to the editor as conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotReplacement {
    pub inserted: Vec<TimeSlot>,
    pub preserved_booked: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftUpsertOutcome {
    pub shift: Shift,
    pub slots: Vec<TimeSlot>,
    /// Booked slots from the previous shift bounds that were left in place.
    pub booked_conflicts: Vec<TimeSlot>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid shift range: {0}")]
    InvalidRange(String),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Time slot is not available")]
    SlotUnavailable,

    #[error("Schedule is currently being modified")]
    LockContention,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
