use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::require;
use crate::app::AppState;
use crate::authz::ProjectAction;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::project::{DbProject, Project, ProjectCreateRequest, ProjectUpdateRequest};
use crate::utils::utc_now;

const DEFAULT_COLOR: &str = "#3498db";

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses((status = 200, description = "Projects the caller owns or belongs to", body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Project>>> {
    // Admins see everything; everyone else sees owned or joined projects.
    let projects = if auth.global_role.is_admin() {
        sqlx::query_as::<_, DbProject>(
            "SELECT id, owner_id, name, description, color, created_at, updated_at, deleted_at FROM projects WHERE deleted_at IS NULL ORDER BY created_at DESC",
        )
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as::<_, DbProject>(
            "SELECT DISTINCT p.id, p.owner_id, p.name, p.description, p.color, p.created_at, p.updated_at, p.deleted_at
             FROM projects p
             LEFT JOIN project_members m ON m.project_id = p.id AND m.user_id = ?
             WHERE p.deleted_at IS NULL AND (p.owner_id = ? OR m.user_id IS NOT NULL)
             ORDER BY p.created_at DESC",
        )
        .bind(auth.user_id)
        .bind(auth.user_id)
        .fetch_all(&state.pool)
        .await?
    };

    Ok(Json(projects.into_iter().map(Project::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses((status = 201, description = "Project created", body = Project))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    require(state.evaluator.check_create_project(Some(&auth.identity())))?;

    let now = utc_now();
    let project_id = Uuid::new_v4();
    let color = payload.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string());

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, owner_id, name, description, color, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(auth.user_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&color)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // The owner also gets an explicit roster entry so member listings are
    // complete; the evaluator grants owner rights without it.
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, member_role, created_at) VALUES (?, ?, 'owner', ?)",
    )
    .bind(project_id)
    .bind(auth.user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let project: Project = fetch_project(&state.pool, project_id).await?.into();
    log_activity(&state.events, "created", Some(auth.user_id), &project);

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project detail", body = Project))
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), id, ProjectAction::Read)
            .await?,
    )?;

    let project: Project = fetch_project(&state.pool, id).await?.into();
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project updated", body = Project))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), id, ProjectAction::Update)
            .await?,
    )?;

    let mut project = fetch_project(&state.pool, id).await?;

    if let Some(name) = payload.name.as_ref() {
        project.name = name.clone();
    }
    if payload.description.is_some() {
        project.description = payload.description.clone();
    }
    if let Some(color) = payload.color.as_ref() {
        project.color = color.clone();
    }

    let now = utc_now();

    sqlx::query("UPDATE projects SET name = ?, description = ?, color = ?, updated_at = ? WHERE id = ?")
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.color)
        .bind(now)
        .bind(project.id)
        .execute(&state.pool)
        .await?;

    project.updated_at = now;
    let project: Project = project.into();
    log_activity(&state.events, "updated", Some(auth.user_id), &project);

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 204, description = "Project and its boards/tasks soft deleted"))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), id, ProjectAction::Delete)
            .await?,
    )?;

    let project: Project = fetch_project(&state.pool, id).await?.into();
    let now = utc_now();

    // Cascade downward in one transaction: tasks, boards, project, roster.
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE deleted_at IS NULL AND board_id IN (SELECT id FROM boards WHERE project_id = ?)",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE boards SET deleted_at = ?, updated_at = ? WHERE project_id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE projects SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log_activity(&state.events, "deleted", Some(auth.user_id), &project);

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<DbProject> {
    sqlx::query_as::<_, DbProject>(
        "SELECT id, owner_id, name, description, color, created_at, updated_at, deleted_at FROM projects WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))
}
