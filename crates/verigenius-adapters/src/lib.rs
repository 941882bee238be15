//! Record store and audit sink adapters for VeriGenius.
//!
//! In-memory implementations back tests and local development; the
//! PostgreSQL implementations in [`postgres`] back production. The failing
//! fixtures exist for chaos testing the engine's isolation guarantees.

#![deny(unsafe_code)]

pub mod postgres;

pub use postgres::{PostgresAuditSink, PostgresStudentStore};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use verigenius_core::{
    AuditEntry, AuditSink, ClassAssignment, EnrollmentStatus, ExternalId, FieldOfStudy, Level,
    StudentRecord, StudentStore, VerigeniusError,
};

/// Record store backend configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Keep student records and audit entries in process memory only.
    Memory,
    /// Persist records and audit entries in PostgreSQL.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StoreConfig {
    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// In-memory student store keyed by record id.
#[derive(Debug, Default)]
pub struct MemoryStudentStore {
    records: RwLock<Vec<StudentRecord>>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StudentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<StudentRecord>, VerigeniusError> {
        let records = self.records.read().await;
        let mut matches = records
            .iter()
            .filter(|record| &record.external_id == external_id);

        let found = matches.next().cloned();
        if matches.next().is_some() {
            return Err(VerigeniusError::StoreIntegrity(format!(
                "matricule '{external_id}' is assigned to more than one record"
            )));
        }
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<StudentRecord>, VerigeniusError> {
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, record_id: &str) -> Result<Option<StudentRecord>, VerigeniusError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|record| record.record_id == record_id)
            .cloned())
    }

    async fn insert(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|existing| existing.external_id == record.external_id)
        {
            return Err(VerigeniusError::DuplicateExternalId(
                record.external_id.to_string(),
            ));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|existing| existing.record_id == record.record_id)
            .ok_or_else(|| VerigeniusError::RecordNotFound(record.record_id.clone()))?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, record_id: &str) -> Result<bool, VerigeniusError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.record_id != record_id);
        Ok(records.len() < before)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// In-memory append-only audit sink.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), VerigeniusError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn tail(&self, limit: usize) -> Result<Vec<AuditEntry>, VerigeniusError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Store that fails every operation. Chaos-testing fixture.
#[derive(Debug, Clone)]
pub struct AlwaysFailStudentStore {
    reason: String,
}

impl AlwaysFailStudentStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> VerigeniusError {
        VerigeniusError::Store(self.reason.clone())
    }
}

#[async_trait]
impl StudentStore for AlwaysFailStudentStore {
    async fn find_by_external_id(
        &self,
        _external_id: &ExternalId,
    ) -> Result<Option<StudentRecord>, VerigeniusError> {
        Err(self.err())
    }

    async fn list(&self) -> Result<Vec<StudentRecord>, VerigeniusError> {
        Err(self.err())
    }

    async fn get(&self, _record_id: &str) -> Result<Option<StudentRecord>, VerigeniusError> {
        Err(self.err())
    }

    async fn insert(&self, _record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        Err(self.err())
    }

    async fn update(&self, _record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        Err(self.err())
    }

    async fn delete(&self, _record_id: &str) -> Result<bool, VerigeniusError> {
        Err(self.err())
    }

    fn backend(&self) -> &'static str {
        "always-fail"
    }
}

/// Sink that fails every append. Chaos-testing fixture.
#[derive(Debug, Clone)]
pub struct AlwaysFailAuditSink {
    reason: String,
}

impl AlwaysFailAuditSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AuditSink for AlwaysFailAuditSink {
    async fn append(&self, _entry: AuditEntry) -> Result<(), VerigeniusError> {
        Err(VerigeniusError::AuditSink(self.reason.clone()))
    }

    async fn tail(&self, _limit: usize) -> Result<Vec<AuditEntry>, VerigeniusError> {
        Err(VerigeniusError::AuditSink(self.reason.clone()))
    }

    fn backend(&self) -> &'static str {
        "always-fail"
    }
}

/// Deterministic demo records for the in-memory backend.
pub fn demo_records() -> Vec<StudentRecord> {
    fn record(
        record_id: &str,
        external_id: &str,
        first_name: &str,
        last_name: &str,
        level: Level,
        field: FieldOfStudy,
        status: EnrollmentStatus,
        class: &str,
    ) -> StudentRecord {
        StudentRecord {
            record_id: record_id.to_string(),
            external_id: ExternalId::new(external_id).expect("demo matricule is well formed"),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            level,
            field_of_study: field,
            status,
            class_assignment: ClassAssignment::parse(class).expect("demo class is well formed"),
        }
    }

    vec![
        record(
            "demo-1",
            "1814 H-F",
            "Irinah",
            "RAOEL",
            Level::L3,
            FieldOfStudy::Ig,
            EnrollmentStatus::FullyPaid,
            "L3-IG-G1",
        ),
        record(
            "demo-2",
            "2041 B-C",
            "Jean-Pierre",
            "RAKOTO",
            Level::L1,
            FieldOfStudy::Sr,
            EnrollmentStatus::PartiallyPaid,
            "L1-SR-G2",
        ),
        record(
            "demo-3",
            "2077 D-E",
            "Miora",
            "ANDRIANA",
            Level::M1,
            FieldOfStudy::Ge,
            EnrollmentStatus::PendingPayment,
            "M1-GE-G1",
        ),
        record(
            "demo-4",
            "1999 F-G",
            "Hery",
            "RABE",
            Level::L2,
            FieldOfStudy::Dr,
            EnrollmentStatus::Inactive,
            "L2-DR-G3",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use verigenius_core::{MatchPolicy, ValidationEngine};

    #[tokio::test]
    async fn memory_store_enforces_unique_matricules() {
        let store = MemoryStudentStore::with_records(demo_records());
        let mut dup = demo_records().remove(0);
        dup.record_id = "demo-99".to_string();

        let err = store.insert(dup).await.unwrap_err();
        assert!(matches!(err, VerigeniusError::DuplicateExternalId(_)));
    }

    #[tokio::test]
    async fn memory_store_flags_plural_matches_as_integrity_violation() {
        let mut records = demo_records();
        let mut dup = records[0].clone();
        dup.record_id = "demo-99".to_string();
        records.push(dup);
        let store = MemoryStudentStore::with_records(records);

        let id = ExternalId::new("1814 H-F").unwrap();
        let err = store.find_by_external_id(&id).await.unwrap_err();
        assert!(matches!(err, VerigeniusError::StoreIntegrity(_)));
    }

    #[tokio::test]
    async fn memory_store_update_requires_existing_record() {
        let store = MemoryStudentStore::new();
        let record = demo_records().remove(0);
        let err = store.update(record).await.unwrap_err();
        assert!(matches!(err, VerigeniusError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn memory_store_delete_reports_whether_anything_was_removed() {
        let store = MemoryStudentStore::with_records(demo_records());
        assert!(store.delete("demo-1").await.unwrap());
        assert!(!store.delete("demo-1").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), demo_records().len() - 1);
    }

    #[tokio::test]
    async fn failing_sink_leaves_every_outcome_unchanged() {
        let store = Arc::new(MemoryStudentStore::with_records(demo_records()));
        let sink = Arc::new(AlwaysFailAuditSink::new("sink offline"));
        let engine = ValidationEngine::new(store, sink, MatchPolicy::CaseInsensitiveBoth);

        let cases = [
            ("not json", 400),
            (
                r#"{"studentId":"0001 A-A","firstName":"x","lastName":"y"}"#,
                404,
            ),
            (
                r#"{"studentId":"1814 H-F","firstName":"x","lastName":"y"}"#,
                403,
            ),
            (
                r#"{"studentId":"2077 D-E","firstName":"Miora","lastName":"ANDRIANA"}"#,
                402,
            ),
            (
                r#"{"studentId":"1814 H-F","firstName":"Irinah","lastName":"RAOEL"}"#,
                200,
            ),
        ];

        for (body, expected_status) in cases {
            let outcome = engine.validate(body, "10.0.0.9").await;
            assert_eq!(outcome.status_code(), expected_status, "body: {body}");
            assert_eq!(outcome.is_success(), expected_status == 200);
        }
    }

    #[tokio::test]
    async fn failing_store_surfaces_as_internal_error_and_is_audited() {
        let store = Arc::new(AlwaysFailStudentStore::new("connection refused"));
        let sink = Arc::new(MemoryAuditSink::new());
        let engine =
            ValidationEngine::new(store, sink.clone(), MatchPolicy::CaseInsensitiveBoth);

        let outcome = engine
            .validate(
                r#"{"studentId":"1814 H-F","firstName":"Irinah","lastName":"RAOEL"}"#,
                "10.0.0.9",
            )
            .await;

        assert_eq!(outcome.status_code(), 500);
        assert!(!outcome.is_success());

        let entries = sink.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, 500);
        assert!(!entries[0].is_success);
    }

    #[tokio::test]
    async fn audit_tail_is_newest_first() {
        let sink = MemoryAuditSink::new();
        for code in [200u16, 404, 403] {
            sink.append(AuditEntry::new(
                serde_json::json!({"n": code}),
                serde_json::json!({}),
                code,
                "10.0.0.1",
            ))
            .await
            .unwrap();
        }

        let tail = sink.tail(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].status_code, 403);
        assert_eq!(tail[1].status_code, 404);
    }
}
