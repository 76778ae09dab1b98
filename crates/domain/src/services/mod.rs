//! Domain services for the check-in backend.
//!
//! `event_status` and `scan_admission` are pure decision functions.
//! `scan_ingestion` runs them against a storage seam, and `aggregation`
//! recomputes dashboard figures from the ledger.

pub mod aggregation;
pub mod clock;
pub mod event_status;
pub mod scan_admission;
pub mod scan_ingestion;

pub use aggregation::StatsAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use event_status::{resolve_status, StatusResolution};
pub use scan_admission::{AdmissionDecision, ScanAdmissionEngine, ScanCandidate};
pub use scan_ingestion::{
    ingest, IngestError, MemoryScanLedger, ScanAttempt, ScanLedger, ScanOutcome, ScanRejection,
    StorageError,
};
