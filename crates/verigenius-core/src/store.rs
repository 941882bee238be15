use crate::audit::AuditEntry;
use crate::error::VerigeniusError;
use crate::types::{ExternalId, StudentRecord};
use async_trait::async_trait;

/// Record store capability consumed by the validation engine and the admin
/// CRUD surface. Implementations provide their own concurrency control; the
/// engine takes no locks.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Lookup by matricule. At most one record may match; plural matches are
    /// a store-integrity violation and must surface as
    /// [`VerigeniusError::StoreIntegrity`].
    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<StudentRecord>, VerigeniusError>;

    async fn list(&self) -> Result<Vec<StudentRecord>, VerigeniusError>;

    async fn get(&self, record_id: &str) -> Result<Option<StudentRecord>, VerigeniusError>;

    /// Insert a new record. Fails with [`VerigeniusError::DuplicateExternalId`]
    /// when the matricule is already assigned.
    async fn insert(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError>;

    /// Replace an existing record by `record_id`. Fails with
    /// [`VerigeniusError::RecordNotFound`] when absent.
    async fn update(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError>;

    /// Returns true when a record was removed.
    async fn delete(&self, record_id: &str) -> Result<bool, VerigeniusError>;

    fn backend(&self) -> &'static str;
}

/// Append-only audit sink. Entries are never mutated or deleted.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), VerigeniusError>;

    /// Newest-first read for the admin log view. The validation engine never
    /// calls this.
    async fn tail(&self, limit: usize) -> Result<Vec<AuditEntry>, VerigeniusError>;

    fn backend(&self) -> &'static str;
}
