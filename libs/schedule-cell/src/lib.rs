pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Shift, SlotStatus, TimeSlot};
pub use services::slots::{generate_slots, parse_wall_clock, SlotInterval};
