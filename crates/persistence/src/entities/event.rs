//! Event entities (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::event::{AssignedScanner, DuplicatePolicy, Event};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_permanent: bool,
    pub duplicate_policy: String,
    pub scanning_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            location: entity.location,
            start_date: entity.start_date,
            end_date: entity.end_date,
            is_permanent: entity.is_permanent,
            duplicate_policy: DuplicatePolicy::from_stored(&entity.duplicate_policy),
            scanning_enabled: entity.scanning_enabled,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// An event together with the requesting scanner's station label.
#[derive(Debug, Clone, FromRow)]
pub struct AssignedEventEntity {
    #[sqlx(flatten)]
    pub event: EventEntity,
    pub assignment_location: Option<String>,
}

/// Database row mapping for event_users joined with users.
#[derive(Debug, Clone, FromRow)]
pub struct EventAssignmentEntity {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub location: Option<String>,
}

impl From<EventAssignmentEntity> for AssignedScanner {
    fn from(entity: EventAssignmentEntity) -> Self {
        Self {
            user_id: entity.user_id,
            name: entity.name,
            location: entity.location,
        }
    }
}
