use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    /// Never changes after creation; there is no ownership transfer.
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Project {
    fn entity_type() -> &'static str {
        "project"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbProject> for Project {
    fn from(value: DbProject) -> Self {
        Project {
            id: value.id,
            owner_id: value.owner_id,
            name: value.name,
            description: value.description,
            color: value.color,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: Option<String>,
    #[schema(example = "#3498db")]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    #[schema(example = "Launch Planning")]
    pub name: Option<String>,
    #[schema(example = "Updated description")]
    pub description: Option<String>,
    #[schema(example = "#2ecc71")]
    pub color: Option<String>,
}
