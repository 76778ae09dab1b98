//! Event repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{AssignedEventEntity, EventAssignmentEntity, EventEntity};
use crate::metrics::QueryTimer;

const EVENT_COLUMNS: &str = "e.id, e.name, e.description, e.location, e.start_date, e.end_date, \
                             e.is_permanent, e.duplicate_policy, e.scanning_enabled, \
                             e.created_at, e.updated_at";

/// Fields for a new event row.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_permanent: bool,
    pub duplicate_policy: &'a str,
    pub scanning_enabled: bool,
}

/// Update of an event. `None` keeps the stored value, except for the
/// schedule, which is written as given so dates can be cleared.
#[derive(Debug, Clone, Default)]
pub struct EventChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_permanent: bool,
    pub duplicate_policy: Option<&'a str>,
    pub scanning_enabled: Option<bool>,
}

/// A scanner assignment to write.
#[derive(Debug, Clone)]
pub struct AssignmentInput<'a> {
    pub user_id: Uuid,
    pub location: Option<&'a str>,
}

/// Repository for events and their scanner assignments.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Creates a new EventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an event by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List all events, newest start first.
    pub async fn list(
        &self,
        scanning_enabled: Option<bool>,
    ) -> Result<Vec<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_events");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events e
            WHERE ($1::BOOLEAN IS NULL OR e.scanning_enabled = $1)
            ORDER BY e.start_date DESC NULLS FIRST, e.created_at DESC
            "#
        ))
        .bind(scanning_enabled)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List the events a scanner is assigned to, with its station label.
    pub async fn list_assigned(
        &self,
        user_id: Uuid,
        scanning_enabled: Option<bool>,
    ) -> Result<Vec<AssignedEventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_assigned_events");
        let result = sqlx::query_as::<_, AssignedEventEntity>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}, eu.location AS assignment_location
            FROM events e
            JOIN event_users eu ON eu.event_id = e.id
            WHERE eu.user_id = $1
              AND ($2::BOOLEAN IS NULL OR e.scanning_enabled = $2)
            ORDER BY e.start_date DESC NULLS FIRST, e.created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(scanning_enabled)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Scanners assigned to an event.
    pub async fn find_assignments(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<EventAssignmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_assignments");
        let result = sqlx::query_as::<_, EventAssignmentEntity>(
            r#"
            SELECT eu.event_id, eu.user_id, u.name, eu.location
            FROM event_users eu
            JOIN users u ON u.id = eu.user_id
            WHERE eu.event_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The assignment of one scanner to one event, if any.
    pub async fn find_assignment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventAssignmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_assignment");
        let result = sqlx::query_as::<_, EventAssignmentEntity>(
            r#"
            SELECT eu.event_id, eu.user_id, u.name, eu.location
            FROM event_users eu
            JOIN users u ON u.id = eu.user_id
            WHERE eu.event_id = $1 AND eu.user_id = $2
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create an event with its assignments atomically.
    pub async fn create(
        &self,
        event: &NewEvent<'_>,
        assignments: &[AssignmentInput<'_>],
    ) -> Result<EventEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_event");
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, EventEntity>(
            r#"
            INSERT INTO events (name, description, location, start_date, end_date,
                                is_permanent, duplicate_policy, scanning_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, description, location, start_date, end_date,
                      is_permanent, duplicate_policy, scanning_enabled, created_at, updated_at
            "#,
        )
        .bind(event.name)
        .bind(event.description)
        .bind(event.location)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.is_permanent)
        .bind(event.duplicate_policy)
        .bind(event.scanning_enabled)
        .fetch_one(&mut *tx)
        .await?;

        insert_assignments(&mut *tx, created.id, assignments).await?;

        tx.commit().await?;
        timer.record();
        Ok(created)
    }

    /// Apply a partial update. When `assignments` is given it replaces the
    /// current list in the same transaction.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &EventChanges<'_>,
        assignments: Option<&[AssignmentInput<'_>]>,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, EventEntity>(
            r#"
            UPDATE events
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                start_date = $5,
                end_date = $6,
                is_permanent = $7,
                duplicate_policy = COALESCE($8, duplicate_policy),
                scanning_enabled = COALESCE($9, scanning_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, location, start_date, end_date,
                      is_permanent, duplicate_policy, scanning_enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.location)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.is_permanent)
        .bind(changes.duplicate_policy)
        .bind(changes.scanning_enabled)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        if let Some(assignments) = assignments {
            sqlx::query("DELETE FROM event_users WHERE event_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_assignments(&mut *tx, id, assignments).await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(Some(updated))
    }

    /// Delete an event and, by cascade, its assignments and scans.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_event");
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}

async fn insert_assignments(
    conn: &mut PgConnection,
    event_id: Uuid,
    assignments: &[AssignmentInput<'_>],
) -> Result<(), sqlx::Error> {
    for assignment in assignments {
        sqlx::query(
            r#"
            INSERT INTO event_users (event_id, user_id, location)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, user_id) DO UPDATE SET location = EXCLUDED.location
            "#,
        )
        .bind(event_id)
        .bind(assignment.user_id)
        .bind(assignment.location)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
