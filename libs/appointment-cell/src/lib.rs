pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, AppointmentStatus, AppointmentView};
pub use services::booking::AppointmentBookingService;
pub use services::lifecycle::AppointmentLifecycleService;
