use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Board {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Board {
    fn entity_type() -> &'static str {
        "board"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbBoard {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbBoard> for Board {
    fn from(value: DbBoard) -> Self {
        Board {
            id: value.id,
            project_id: value.project_id,
            name: value.name,
            position: value.position,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BoardCreateRequest {
    #[schema(example = "In Progress")]
    pub name: String,
    #[schema(example = 1)]
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BoardUpdateRequest {
    pub name: Option<String>,
    pub position: Option<i64>,
}
