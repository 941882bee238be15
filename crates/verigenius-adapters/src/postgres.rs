//! PostgreSQL-backed record store and audit sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use verigenius_core::{
    AuditEntry, AuditSink, ClassAssignment, EnrollmentStatus, ExternalId, StudentRecord,
    StudentStore, VerigeniusError,
};

fn store_err(context: &str, err: impl std::fmt::Display) -> VerigeniusError {
    VerigeniusError::Store(format!("{context}: {err}"))
}

/// Connect one pool, bootstrap both schemas, and share the pool between the
/// record store and the audit sink.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
) -> Result<(PostgresStudentStore, PostgresAuditSink), VerigeniusError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await
        .map_err(|e| store_err("postgres connect failed", e))?;

    let store = PostgresStudentStore::from_pool(pool.clone());
    store.ensure_schema().await?;
    let sink = PostgresAuditSink::from_pool(pool);
    sink.ensure_schema().await?;

    Ok((store, sink))
}

/// Student records in a single `students` table, one row per record, with a
/// unique index on the matricule so plural matches cannot exist.
#[derive(Debug, Clone)]
pub struct PostgresStudentStore {
    pool: PgPool,
}

impl PostgresStudentStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), VerigeniusError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS students (
                record_id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                level TEXT NOT NULL,
                field_of_study TEXT NOT NULL,
                status TEXT NOT NULL,
                class_assignment TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("postgres schema create failed", e))?;

        Ok(())
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<StudentRecord, VerigeniusError> {
    let external_id: String = row
        .try_get("external_id")
        .map_err(|e| store_err("postgres decode external_id failed", e))?;
    let level: String = row
        .try_get("level")
        .map_err(|e| store_err("postgres decode level failed", e))?;
    let field_of_study: String = row
        .try_get("field_of_study")
        .map_err(|e| store_err("postgres decode field_of_study failed", e))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| store_err("postgres decode status failed", e))?;
    let class_assignment: String = row
        .try_get("class_assignment")
        .map_err(|e| store_err("postgres decode class_assignment failed", e))?;

    Ok(StudentRecord {
        record_id: row
            .try_get("record_id")
            .map_err(|e| store_err("postgres decode record_id failed", e))?,
        external_id: ExternalId::new(external_id)
            .map_err(|e| VerigeniusError::StoreIntegrity(e.to_string()))?,
        first_name: row
            .try_get("first_name")
            .map_err(|e| store_err("postgres decode first_name failed", e))?,
        last_name: row
            .try_get("last_name")
            .map_err(|e| store_err("postgres decode last_name failed", e))?,
        level: level
            .parse()
            .map_err(|e: VerigeniusError| VerigeniusError::StoreIntegrity(e.to_string()))?,
        field_of_study: field_of_study
            .parse()
            .map_err(|e: VerigeniusError| VerigeniusError::StoreIntegrity(e.to_string()))?,
        status: EnrollmentStatus::from(status),
        class_assignment: ClassAssignment::parse(&class_assignment)
            .map_err(|e| VerigeniusError::StoreIntegrity(e.to_string()))?,
    })
}

const SELECT_STUDENT: &str = r#"
    SELECT record_id, external_id, first_name, last_name,
           level, field_of_study, status, class_assignment
    FROM students
"#;

#[async_trait]
impl StudentStore for PostgresStudentStore {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<StudentRecord>, VerigeniusError> {
        let row = sqlx::query(&format!("{SELECT_STUDENT} WHERE external_id = $1"))
            .bind(external_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("postgres lookup failed", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<StudentRecord>, VerigeniusError> {
        let rows = sqlx::query(&format!("{SELECT_STUDENT} ORDER BY external_id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("postgres list failed", e))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, record_id: &str) -> Result<Option<StudentRecord>, VerigeniusError> {
        let row = sqlx::query(&format!("{SELECT_STUDENT} WHERE record_id = $1"))
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("postgres get failed", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        let result = sqlx::query(
            r#"
            INSERT INTO students
                (record_id, external_id, first_name, last_name,
                 level, field_of_study, status, class_assignment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(&record.record_id)
        .bind(record.external_id.as_str())
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.level.as_str())
        .bind(record.field_of_study.as_str())
        .bind(record.status.as_str())
        .bind(record.class_assignment.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("postgres insert failed", e))?;

        if result.rows_affected() == 0 {
            return Err(VerigeniusError::DuplicateExternalId(
                record.external_id.to_string(),
            ));
        }
        Ok(record)
    }

    async fn update(&self, record: StudentRecord) -> Result<StudentRecord, VerigeniusError> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET first_name = $2, last_name = $3, level = $4,
                field_of_study = $5, status = $6, class_assignment = $7
            WHERE record_id = $1
            "#,
        )
        .bind(&record.record_id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.level.as_str())
        .bind(record.field_of_study.as_str())
        .bind(record.status.as_str())
        .bind(record.class_assignment.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("postgres update failed", e))?;

        if result.rows_affected() == 0 {
            return Err(VerigeniusError::RecordNotFound(record.record_id.clone()));
        }
        Ok(record)
    }

    async fn delete(&self, record_id: &str) -> Result<bool, VerigeniusError> {
        let result = sqlx::query("DELETE FROM students WHERE record_id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("postgres delete failed", e))?;

        Ok(result.rows_affected() > 0)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Append-only `request_logs` table. Rows are only ever inserted.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), VerigeniusError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_logs (
                log_id BIGSERIAL PRIMARY KEY,
                logged_at TIMESTAMPTZ NOT NULL,
                request_body JSONB NOT NULL,
                response_body JSONB NOT NULL,
                status_code INT NOT NULL,
                is_success BOOLEAN NOT NULL,
                client_ip TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("postgres schema create failed", e))?;

        Ok(())
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), VerigeniusError> {
        sqlx::query(
            r#"
            INSERT INTO request_logs
                (logged_at, request_body, response_body, status_code, is_success, client_ip)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.timestamp)
        .bind(&entry.request_body)
        .bind(&entry.response_body)
        .bind(i32::from(entry.status_code))
        .bind(entry.is_success)
        .bind(&entry.client_ip)
        .execute(&self.pool)
        .await
        .map_err(|e| VerigeniusError::AuditSink(format!("postgres append failed: {e}")))?;

        Ok(())
    }

    async fn tail(&self, limit: usize) -> Result<Vec<AuditEntry>, VerigeniusError> {
        let limit = i64::try_from(limit.min(1000)).unwrap_or(1000);
        let rows = sqlx::query(
            r#"
            SELECT logged_at, request_body, response_body, status_code, is_success, client_ip
            FROM request_logs
            ORDER BY log_id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VerigeniusError::AuditSink(format!("postgres tail failed: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp: DateTime<Utc> = row
                .try_get("logged_at")
                .map_err(|e| store_err("postgres decode logged_at failed", e))?;
            let status_code: i32 = row
                .try_get("status_code")
                .map_err(|e| store_err("postgres decode status_code failed", e))?;

            entries.push(AuditEntry {
                timestamp,
                request_body: row
                    .try_get("request_body")
                    .map_err(|e| store_err("postgres decode request_body failed", e))?,
                response_body: row
                    .try_get("response_body")
                    .map_err(|e| store_err("postgres decode response_body failed", e))?,
                status_code: u16::try_from(status_code).map_err(|_| {
                    VerigeniusError::StoreIntegrity("negative status code in request_logs".to_string())
                })?,
                is_success: row
                    .try_get("is_success")
                    .map_err(|e| store_err("postgres decode is_success failed", e))?,
                client_ip: row
                    .try_get("client_ip")
                    .map_err(|e| store_err("postgres decode client_ip failed", e))?,
            });
        }

        Ok(entries)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
