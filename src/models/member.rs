use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::MemberRole;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "member")]
    pub member_role: MemberRole,
    pub created_at: DateTime<Utc>,
}

impl crate::events::Loggable for ProjectMember {
    fn entity_type() -> &'static str {
        "project_member"
    }
    fn subject_id(&self) -> Uuid {
        self.user_id
    }
    fn severity(&self) -> crate::events::Severity {
        crate::events::Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub member_role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbProjectMember> for ProjectMember {
    type Error = AppError;

    fn try_from(value: DbProjectMember) -> Result<Self, Self::Error> {
        let member_role = MemberRole::parse(&value.member_role).ok_or_else(|| {
            AppError::internal(format!("unknown member role: {}", value.member_role))
        })?;

        Ok(ProjectMember {
            project_id: value.project_id,
            user_id: value.user_id,
            member_role,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberAddRequest {
    pub user_id: Uuid,
    /// Defaults to `member` when omitted.
    pub member_role: Option<MemberRole>,
}
