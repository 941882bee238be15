//! VeriGenius core: the student validation decision protocol.
//!
//! This crate owns the decision rules only: identity matching with explicit
//! case normalization, a fail-closed enrollment status gate, a linear
//! validation engine with one terminal outcome per checkpoint, and the
//! exactly-once-per-request audit discipline around it. Persistence and HTTP
//! live in the adapter and service crates.

#![deny(unsafe_code)]

pub mod audit;
pub mod engine;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod store;
pub mod types;

pub use audit::{AuditEntry, AuditRecorder};
pub use engine::{ValidationEngine, ValidationOutcome};
pub use error::VerigeniusError;
pub use gate::is_eligible;
pub use matcher::{IdentityMatcher, MatchPolicy};
pub use store::{AuditSink, StudentStore};
pub use types::{
    canonical_first_name, canonical_last_name, ClassAssignment, EnrollmentStatus, ExternalId,
    FieldOfStudy, Level, StudentProfile, StudentRecord, ValidationRequest,
};
