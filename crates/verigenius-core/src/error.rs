use thiserror::Error;

/// VeriGenius core errors.
///
/// Business outcomes (not found, identity mismatch, not eligible) are not
/// errors; they are modeled as [`crate::ValidationOutcome`] variants. This
/// enum covers infrastructure and data-shape failures only.
#[derive(Debug, Error)]
pub enum VerigeniusError {
    #[error("record store failure: {0}")]
    Store(String),

    #[error("store integrity violation: {0}")]
    StoreIntegrity(String),

    #[error("audit sink failure: {0}")]
    AuditSink(String),

    #[error("matricule '{0}' is already assigned")]
    DuplicateExternalId(String),

    #[error("record '{0}' not found")]
    RecordNotFound(String),

    #[error("invalid matricule '{0}'; expected format 'DDDD L-L'")]
    InvalidExternalId(String),

    #[error("unknown level code '{0}'")]
    UnknownLevel(String),

    #[error("unknown field of study code '{0}'")]
    UnknownFieldOfStudy(String),

    #[error("invalid class assignment '{0}'; expected format 'LEVEL-FIELD-GROUP'")]
    InvalidClassAssignment(String),
}
