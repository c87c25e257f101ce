pub mod location_fix;
pub mod log_entry;
pub mod report;
