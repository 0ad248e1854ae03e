use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::require;
use crate::app::AppState;
use crate::authz::{MemberRole, ProjectAction};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::member::{DbProjectMember, MemberAddRequest, ProjectMember};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project roster", body = [ProjectMember]))
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectMember>>> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), project_id, ProjectAction::Read)
            .await?,
    )?;

    let rows = sqlx::query_as::<_, DbProjectMember>(
        "SELECT project_id, user_id, member_role, created_at FROM project_members WHERE project_id = ? ORDER BY created_at ASC",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    let members: Vec<ProjectMember> = rows
        .into_iter()
        .map(ProjectMember::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = MemberAddRequest,
    responses(
        (status = 201, description = "Member added", body = ProjectMember),
        (status = 409, description = "Already a member")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<MemberAddRequest>,
) -> AppResult<(StatusCode, Json<ProjectMember>)> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), project_id, ProjectAction::ManageMembers)
            .await?,
    )?;

    let member_role = payload.member_role.unwrap_or(MemberRole::Member);
    if member_role == MemberRole::Owner {
        return Err(AppError::bad_request(
            "the owner role is assigned at project creation and cannot be granted",
        ));
    }

    ensure_user_exists(&state.pool, payload.user_id).await?;

    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM project_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(payload.user_id)
    .fetch_one(&state.pool)
    .await?;

    if existing > 0 {
        return Err(AppError::conflict("user is already a project member"));
    }

    let now = utc_now();
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, member_role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(payload.user_id)
    .bind(member_role.as_str())
    .bind(now)
    .execute(&state.pool)
    .await?;

    let member = ProjectMember {
        project_id,
        user_id: payload.user_id,
        member_role,
        created_at: now,
    };
    log_activity(&state.events, "created", Some(auth.user_id), &member);

    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/members/{user_id}",
    tag = "Members",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "User id to remove")
    ),
    responses((status = 204, description = "Member removed"))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), project_id, ProjectAction::ManageMembers)
            .await?,
    )?;

    let owner_id: Option<Uuid> =
        sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = ? AND deleted_at IS NULL")
            .bind(project_id)
            .fetch_optional(&state.pool)
            .await?;

    if owner_id == Some(user_id) {
        return Err(AppError::bad_request("the project owner cannot be removed"));
    }

    let row = sqlx::query_as::<_, DbProjectMember>(
        "SELECT project_id, user_id, member_role, created_at FROM project_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("membership not found"))?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    let member: ProjectMember = row.try_into()?;
    log_activity(&state.events, "deleted", Some(auth.user_id), &member);

    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    if count == 0 {
        return Err(AppError::not_found("user not found"));
    }

    Ok(())
}
