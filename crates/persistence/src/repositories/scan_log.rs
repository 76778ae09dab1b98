//! Scan log repository and the locked scan ledger.
//!
//! `scan_logs` is insert-only. Admission runs inside [`LockedScanLedger`],
//! a transaction holding an advisory lock on the (event, student) pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::scan_log::{NewScanLog, ScanLog};
use domain::services::scan_ingestion::{ScanLedger, StorageError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::ScanLogEntity;
use crate::metrics::{record_scan_recorded, QueryTimer};

const SCAN_LOG_COLUMNS: &str = "id, event_id, scanner_id, student_id, status, timestamp, \
                                is_override, override_reason, last_scan_at";

/// Filters for listing scans.
#[derive(Debug, Clone, Default)]
pub struct ScanLogFilter<'a> {
    pub event_id: Option<Uuid>,
    pub scanner_id: Option<Uuid>,
    pub status: Option<&'a str>,
    /// Keyset position: only rows strictly older than this are returned.
    pub before: Option<(DateTime<Utc>, Uuid)>,
}

/// Repository for scan log queries.
#[derive(Clone)]
pub struct ScanLogRepository {
    pool: PgPool,
}

impl ScanLogRepository {
    /// Creates a new ScanLogRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a locked scope for one (event, student) pair.
    ///
    /// Concurrent scopes for the same pair wait on each other until the
    /// holder commits on insert or is dropped.
    pub async fn lock_scope(
        &self,
        event_id: Uuid,
        student_id: &str,
    ) -> Result<LockedScanLedger, sqlx::Error> {
        let timer = QueryTimer::new("lock_scan_scope");
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(scope_key(event_id, student_id))
            .execute(&mut *tx)
            .await?;
        timer.record();
        Ok(LockedScanLedger { tx: Some(tx) })
    }

    /// Find a scan by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_scan_log_by_id");
        let result = sqlx::query_as::<_, ScanLogEntity>(&format!(
            "SELECT {SCAN_LOG_COLUMNS} FROM scan_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List scans newest first, keyset-paginated on (timestamp, id).
    pub async fn list(
        &self,
        filter: &ScanLogFilter<'_>,
        limit: i64,
    ) -> Result<Vec<ScanLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_scan_logs");
        let (before_ts, before_id) = match filter.before {
            Some((ts, id)) => (Some(ts), Some(id)),
            None => (None, None),
        };
        let result = sqlx::query_as::<_, ScanLogEntity>(&format!(
            r#"
            SELECT {SCAN_LOG_COLUMNS}
            FROM scan_logs
            WHERE ($1::UUID IS NULL OR event_id = $1)
              AND ($2::UUID IS NULL OR scanner_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR (timestamp, id) < ($4, $5))
            ORDER BY timestamp DESC, id DESC
            LIMIT $6
            "#
        ))
        .bind(filter.event_id)
        .bind(filter.scanner_id)
        .bind(filter.status)
        .bind(before_ts)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// All scans of one event, oldest first.
    pub async fn find_by_event(&self, event_id: Uuid) -> Result<Vec<ScanLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_scan_logs_by_event");
        let result = sqlx::query_as::<_, ScanLogEntity>(&format!(
            r#"
            SELECT {SCAN_LOG_COLUMNS}
            FROM scan_logs
            WHERE event_id = $1
            ORDER BY timestamp ASC, id ASC
            "#
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Scans within `[start, end)`.
    pub async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScanLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_scan_logs_between");
        let result = sqlx::query_as::<_, ScanLogEntity>(&format!(
            r#"
            SELECT {SCAN_LOG_COLUMNS}
            FROM scan_logs
            WHERE timestamp >= $1 AND timestamp < $2
            ORDER BY timestamp ASC, id ASC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Total number of recorded scans.
    pub async fn count_all(&self) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_scan_logs");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scan_logs")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }
}

/// Advisory-lock key for a pair. Event IDs never contain ':'.
fn scope_key(event_id: Uuid, student_id: &str) -> String {
    format!("{}:{}", event_id, student_id)
}

fn storage_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(err.to_string())
        }
        other => StorageError::Query(other.to_string()),
    }
}

/// Transaction-backed ledger for one (event, student) pair.
///
/// The advisory lock is held until the insert commits. Dropping the ledger
/// without inserting rolls the transaction back and releases the lock.
pub struct LockedScanLedger {
    tx: Option<Transaction<'static, Postgres>>,
}

impl LockedScanLedger {
    fn closed() -> StorageError {
        StorageError::Query("scan scope already committed".to_string())
    }
}

#[async_trait]
impl ScanLedger for LockedScanLedger {
    async fn find_scans_for(
        &mut self,
        event_id: Uuid,
        student_id: &str,
    ) -> Result<Vec<ScanLog>, StorageError> {
        let tx = self.tx.as_mut().ok_or_else(Self::closed)?;
        let timer = QueryTimer::new("find_scans_for_student");
        let rows = sqlx::query_as::<_, ScanLogEntity>(&format!(
            r#"
            SELECT {SCAN_LOG_COLUMNS}
            FROM scan_logs
            WHERE event_id = $1 AND student_id = $2
            ORDER BY timestamp ASC, id ASC
            "#
        ))
        .bind(event_id)
        .bind(student_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(storage_error)?;
        timer.record();
        Ok(rows.into_iter().map(ScanLog::from).collect())
    }

    async fn insert_scan_log(&mut self, record: NewScanLog) -> Result<ScanLog, StorageError> {
        let mut tx = self.tx.take().ok_or_else(Self::closed)?;
        let timer = QueryTimer::new("insert_scan_log");
        let row = sqlx::query_as::<_, ScanLogEntity>(&format!(
            r#"
            INSERT INTO scan_logs (event_id, scanner_id, student_id, status, timestamp,
                                   is_override, override_reason, last_scan_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SCAN_LOG_COLUMNS}
            "#
        ))
        .bind(record.event_id)
        .bind(record.scanner_id)
        .bind(&record.student_id)
        .bind(record.status.as_str())
        .bind(record.timestamp)
        .bind(record.is_override)
        .bind(&record.override_reason)
        .bind(record.last_scan_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;
        timer.record();

        record_scan_recorded(&row.status);
        Ok(row.into())
    }
}
