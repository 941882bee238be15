use crate::audit::{AuditEntry, AuditRecorder};
use crate::gate::is_eligible;
use crate::matcher::{IdentityMatcher, MatchPolicy};
use crate::store::{AuditSink, StudentStore};
use crate::types::{is_valid_external_id, ExternalId, StudentProfile, ValidationRequest};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

/// Terminal outcome of one validation call. Exactly one per call; each maps
/// to one HTTP status code and one JSON body shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Malformed body or structural validation failure, with a field-level
    /// error map. Decided before any store access.
    InvalidInput {
        errors: BTreeMap<String, String>,
    },
    /// No record carries the claimed matricule.
    NotFound,
    /// A record exists but the claimed names do not match. The body carries
    /// one generic message and must not reveal which name failed.
    IdentityMismatch,
    /// Identity matched but the enrollment status is not on the allow-list.
    /// The actual status is included for operator debugging; redact here if
    /// the surrounding policy requires it.
    NotEligible {
        status: crate::types::EnrollmentStatus,
    },
    Validated {
        student: StudentProfile,
    },
    /// Record store infrastructure failure. Detail goes to the operator log
    /// only, never to the caller.
    Internal,
}

impl ValidationOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::NotFound => 404,
            Self::IdentityMismatch => 403,
            Self::NotEligible { .. } => 402,
            Self::Validated { .. } => 200,
            Self::Internal => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Validated { .. })
    }

    /// Fixed mapping from outcome to response body.
    pub fn response_body(&self) -> Value {
        match self {
            Self::InvalidInput { errors } => json!({
                "success": false,
                "message": "Invalid request payload.",
                "errors": errors,
            }),
            Self::NotFound => json!({
                "success": false,
                "message": "No student record matches this matricule.",
            }),
            Self::IdentityMismatch => json!({
                "success": false,
                "message": "The provided identity does not match our records.",
            }),
            Self::NotEligible { status } => json!({
                "success": false,
                "message": "Enrollment is not settled for this student.",
                "status": status.as_str(),
            }),
            Self::Validated { student } => json!({
                "success": true,
                "message": "Student validated.",
                "student": student,
            }),
            Self::Internal => json!({
                "success": false,
                "message": "Internal server error.",
            }),
        }
    }
}

/// The validation orchestrator: an ordered guard chain with one terminal
/// outcome per checkpoint and exactly one audit entry per call, on every
/// branch, after the outcome is decided.
pub struct ValidationEngine {
    store: Arc<dyn StudentStore>,
    recorder: AuditRecorder,
    matcher: IdentityMatcher,
}

impl ValidationEngine {
    pub fn new(store: Arc<dyn StudentStore>, sink: Arc<dyn AuditSink>, policy: MatchPolicy) -> Self {
        Self {
            store,
            recorder: AuditRecorder::new(sink),
            matcher: IdentityMatcher::new(policy),
        }
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.matcher.policy()
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn audit_backend(&self) -> &'static str {
        self.recorder.backend()
    }

    /// Single public entry point. Takes the raw body so malformed payloads
    /// are audited like everything else.
    pub async fn validate(&self, raw_body: &str, client_ip: &str) -> ValidationOutcome {
        let outcome = self.decide(raw_body).await;

        let entry = AuditEntry::new(
            raw_request_payload(raw_body),
            outcome.response_body(),
            outcome.status_code(),
            client_ip,
        );
        self.recorder.record(entry).await;

        outcome
    }

    async fn decide(&self, raw_body: &str) -> ValidationOutcome {
        let request = match serde_json::from_str::<ValidationRequest>(raw_body) {
            Ok(request) => request,
            Err(_) => {
                let mut errors = BTreeMap::new();
                errors.insert("body".to_string(), "request body is not a JSON object".to_string());
                return ValidationOutcome::InvalidInput { errors };
            }
        };

        let external_id = match check_request(&request) {
            Ok(external_id) => external_id,
            Err(errors) => return ValidationOutcome::InvalidInput { errors },
        };

        let record = match self.store.find_by_external_id(&external_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return ValidationOutcome::NotFound,
            Err(err) => {
                error!(%err, matricule = %external_id, "record lookup failed");
                return ValidationOutcome::Internal;
            }
        };

        if !self
            .matcher
            .matches(&request.first_name, &request.last_name, &record)
        {
            return ValidationOutcome::IdentityMismatch;
        }

        if !is_eligible(&record.status) {
            return ValidationOutcome::NotEligible {
                status: record.status,
            };
        }

        ValidationOutcome::Validated {
            student: StudentProfile::from(&record),
        }
    }
}

/// Structural validation of the request shape, performed before any store
/// access. Returns the parsed matricule or a field-level error map keyed by
/// wire field name.
fn check_request(request: &ValidationRequest) -> Result<ExternalId, BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();

    if request.student_id.is_empty() {
        errors.insert("studentId".to_string(), "matricule is required".to_string());
    } else if !is_valid_external_id(&request.student_id) {
        errors.insert(
            "studentId".to_string(),
            "matricule must match the format 'DDDD L-L'".to_string(),
        );
    }

    if request.first_name.trim().is_empty() {
        errors.insert("firstName".to_string(), "first name is required".to_string());
    }
    if request.last_name.trim().is_empty() {
        errors.insert("lastName".to_string(), "last name is required".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    ExternalId::new(request.student_id.clone()).map_err(|err| {
        let mut errors = BTreeMap::new();
        errors.insert("studentId".to_string(), err.to_string());
        errors
    })
}

fn raw_request_payload(raw_body: &str) -> Value {
    serde_json::from_str(raw_body).unwrap_or_else(|_| Value::String(raw_body.to_string()))
}
