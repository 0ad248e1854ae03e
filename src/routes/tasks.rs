use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::require;
use crate::app::AppState;
use crate::authz::{BoardAction, TaskAction};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskUpdateRequest};
use crate::utils::utc_now;

const DEFAULT_STATUS: &str = "todo";
const DEFAULT_PRIORITY: &str = "medium";

#[utoipa::path(
    get,
    path = "/projects/{project_id}/boards/{board_id}/tasks",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("board_id" = Uuid, Path, description = "Board id")
    ),
    responses((status = 200, description = "Tasks on the board", body = [Task]))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((_project_id, board_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<Task>>> {
    require(
        state
            .evaluator
            .check_board(Some(&auth.identity()), board_id, BoardAction::Read)
            .await?,
    )?;

    let tasks = sqlx::query_as::<_, DbTask>(
        "SELECT id, board_id, title, description, status, priority, position, created_by, assignee, created_at, updated_at, deleted_at
         FROM tasks WHERE board_id = ? AND deleted_at IS NULL
         ORDER BY position ASC, created_at ASC",
    )
    .bind(board_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(tasks.into_iter().map(Task::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/boards/{board_id}/tasks",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("board_id" = Uuid, Path, description = "Board id")
    ),
    request_body = TaskCreateRequest,
    responses((status = 201, description = "Task created", body = Task))
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((_project_id, board_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    require(
        state
            .evaluator
            .check_board(Some(&auth.identity()), board_id, BoardAction::CreateTask)
            .await?,
    )?;

    let position = match payload.position {
        Some(position) => position,
        None => next_position(&state.pool, board_id).await?,
    };

    let now = utc_now();
    let task_id = Uuid::new_v4();
    let status = payload.status.clone().unwrap_or_else(|| DEFAULT_STATUS.to_string());
    let priority = payload
        .priority
        .clone()
        .unwrap_or_else(|| DEFAULT_PRIORITY.to_string());

    sqlx::query(
        "INSERT INTO tasks (id, board_id, title, description, status, priority, position, created_by, assignee, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(board_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&status)
    .bind(&priority)
    .bind(position)
    .bind(auth.user_id)
    .bind(payload.assignee)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let task: Task = fetch_task(&state.pool, board_id, task_id).await?.into();
    log_activity(&state.events, "created", Some(auth.user_id), &task);

    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/boards/{board_id}/tasks/{id}",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("board_id" = Uuid, Path, description = "Board id"),
        ("id" = Uuid, Path, description = "Task id")
    ),
    responses((status = 200, description = "Task detail", body = Task))
)]
pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((_project_id, board_id, id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<Task>> {
    require(
        state
            .evaluator
            .check_task(Some(&auth.identity()), id, TaskAction::Read)
            .await?,
    )?;

    let task: Task = fetch_task(&state.pool, board_id, id).await?.into();
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/boards/{board_id}/tasks/{id}",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("board_id" = Uuid, Path, description = "Board id"),
        ("id" = Uuid, Path, description = "Task id")
    ),
    request_body = TaskUpdateRequest,
    responses((status = 200, description = "Task updated", body = Task))
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((_project_id, board_id, id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    require(
        state
            .evaluator
            .check_task(Some(&auth.identity()), id, TaskAction::Update)
            .await?,
    )?;

    let mut task = fetch_task(&state.pool, board_id, id).await?;

    if let Some(title) = payload.title.as_ref() {
        task.title = title.clone();
    }
    if payload.description.is_some() {
        task.description = payload.description.clone();
    }
    if let Some(status) = payload.status.as_ref() {
        task.status = status.clone();
    }
    if let Some(priority) = payload.priority.as_ref() {
        task.priority = priority.clone();
    }
    if let Some(position) = payload.position {
        task.position = position;
    }
    if payload.assignee.is_some() {
        task.assignee = payload.assignee;
    }

    let now = utc_now();

    // created_by is immutable; it never appears in the SET list.
    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, position = ?, assignee = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.status)
    .bind(&task.priority)
    .bind(task.position)
    .bind(task.assignee)
    .bind(now)
    .bind(task.id)
    .execute(&state.pool)
    .await?;

    task.updated_at = now;
    let task: Task = task.into();
    log_activity(&state.events, "updated", Some(auth.user_id), &task);

    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/boards/{board_id}/tasks/{id}",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("board_id" = Uuid, Path, description = "Board id"),
        ("id" = Uuid, Path, description = "Task id")
    ),
    responses((status = 204, description = "Task soft deleted"))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((_project_id, board_id, id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require(
        state
            .evaluator
            .check_task(Some(&auth.identity()), id, TaskAction::Delete)
            .await?,
    )?;

    let task: Task = fetch_task(&state.pool, board_id, id).await?.into();
    let now = utc_now();

    sqlx::query("UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    log_activity(&state.events, "deleted", Some(auth.user_id), &task);

    Ok(StatusCode::NO_CONTENT)
}

async fn next_position(pool: &SqlitePool, board_id: Uuid) -> AppResult<i64> {
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE board_id = ? AND deleted_at IS NULL",
    )
    .bind(board_id)
    .fetch_one(pool)
    .await?;

    Ok(position)
}

async fn fetch_task(pool: &SqlitePool, board_id: Uuid, task_id: Uuid) -> AppResult<DbTask> {
    sqlx::query_as::<_, DbTask>(
        "SELECT id, board_id, title, description, status, priority, position, created_by, assignee, created_at, updated_at, deleted_at
         FROM tasks WHERE id = ? AND board_id = ? AND deleted_at IS NULL",
    )
    .bind(task_id)
    .bind(board_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("task not found"))
}
