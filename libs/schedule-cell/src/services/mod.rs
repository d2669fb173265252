pub mod locks;
pub mod schedule;
pub mod slot_store;
pub mod slots;
