use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::MemberRole;

/// Lookup failure inside the resource store. Never folded into a
/// [`super::Decision`]; callers surface it as a 500-equivalent.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage lookup failed")]
    Backend(#[from] sqlx::Error),
    #[error("malformed {column} value: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// What the policy needs to know about a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
}

/// What the policy needs to know about a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct BoardRecord {
    pub id: Uuid,
    pub project_id: Uuid,
}

/// What the policy needs to know about a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct TaskRecord {
    pub id: Uuid,
    pub board_id: Uuid,
    pub created_by: Uuid,
    pub assignee: Option<Uuid>,
}

impl TaskRecord {
    /// Creator and assignee may always modify their own task.
    pub fn participant(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.assignee == Some(user_id)
    }
}

/// A membership row, reduced to the fields policy cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRecord {
    pub user_id: Uuid,
    pub member_role: MemberRole,
}

/// Read-only data access the evaluator depends on. Injected so tests can
/// substitute an in-memory fake.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, StoreError>;
    async fn board_by_id(&self, id: Uuid) -> Result<Option<BoardRecord>, StoreError>;
    async fn task_by_id(&self, id: Uuid) -> Result<Option<TaskRecord>, StoreError>;
    async fn project_members(&self, project_id: Uuid) -> Result<Vec<MemberRecord>, StoreError>;
}

/// Production store over the application's SQLite pool. Soft-deleted rows
/// are invisible here, so a deleted intermediate resource resolves as absent.
#[derive(Debug, Clone)]
pub struct SqliteResourceStore {
    pool: SqlitePool,
}

impl SqliteResourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MemberRow {
    user_id: Uuid,
    member_role: String,
}

#[async_trait]
impl ResourceStore for SqliteResourceStore {
    async fn project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, StoreError> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, owner_id FROM projects WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn board_by_id(&self, id: Uuid) -> Result<Option<BoardRecord>, StoreError> {
        let record = sqlx::query_as::<_, BoardRecord>(
            "SELECT id, project_id FROM boards WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn task_by_id(&self, id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        let record = sqlx::query_as::<_, TaskRecord>(
            "SELECT id, board_id, created_by, assignee FROM tasks WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn project_members(&self, project_id: Uuid) -> Result<Vec<MemberRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT user_id, member_role FROM project_members WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let member_role =
                    MemberRole::parse(&row.member_role).ok_or_else(|| StoreError::Corrupt {
                        column: "member_role",
                        value: row.member_role.clone(),
                    })?;
                Ok(MemberRecord {
                    user_id: row.user_id,
                    member_role,
                })
            })
            .collect()
    }
}
