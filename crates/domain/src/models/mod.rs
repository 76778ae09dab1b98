//! Domain models for the check-in backend.

pub mod dashboard;
pub mod event;
pub mod scan_log;
pub mod user;

pub use dashboard::{DashboardOverview, EventStats};
pub use event::{DuplicatePolicy, Event, EventAssignment, EventSchedule, EventStatus};
pub use scan_log::{NewScanLog, ScanLog, ScanStatus};
pub use user::{User, UserRole};
