// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::{Role, User};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                requested: new_status,
            });
        }

        Ok(())
    }

    /// Valid next statuses for a given current status. Completed and
    /// Cancelled are terminal.
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Who may move an appointment to `new_status`. Admins manage any
    /// appointment. The appointment's doctor drives its lifecycle. The
    /// appointment's patient may only cancel.
    pub fn authorize_transition(
        &self,
        user: &User,
        appointment: &Appointment,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if user.is_admin() {
            return Ok(());
        }

        match user.role {
            Role::Doctor if user.is_self(&appointment.doctor_id.to_string()) => Ok(()),
            Role::Patient
                if user.is_self(&appointment.patient_id.to_string())
                    && new_status == AppointmentStatus::Cancelled =>
            {
                Ok(())
            }
            _ => Err(AppointmentError::Unauthorized(
                "Not authorized to update this appointment".to_string(),
            )),
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
