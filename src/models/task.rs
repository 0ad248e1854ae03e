use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "todo")]
    pub status: String,
    #[schema(example = "medium")]
    pub priority: String,
    pub position: i64,
    /// Set once at creation, never changes.
    pub created_by: Uuid,
    pub assignee: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Task {
    fn entity_type() -> &'static str {
        "task"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub position: i64,
    pub created_by: Uuid,
    pub assignee: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbTask> for Task {
    fn from(value: DbTask) -> Self {
        Task {
            id: value.id,
            board_id: value.board_id,
            title: value.title,
            description: value.description,
            status: value.status,
            priority: value.priority,
            position: value.position,
            created_by: value.created_by,
            assignee: value.assignee,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Define launch checklist")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "todo")]
    pub status: Option<String>,
    #[schema(example = "high")]
    pub priority: Option<String>,
    pub position: Option<i64>,
    pub assignee: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub position: Option<i64>,
    pub assignee: Option<Uuid>,
}
