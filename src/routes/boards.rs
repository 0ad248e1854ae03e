use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::require;
use crate::app::AppState;
use crate::authz::{BoardAction, ProjectAction};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::board::{Board, BoardCreateRequest, BoardUpdateRequest, DbBoard};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/projects/{project_id}/boards",
    tag = "Boards",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Boards in the project", body = [Board]))
)]
pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<Board>>> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), project_id, ProjectAction::Read)
            .await?,
    )?;

    let boards = sqlx::query_as::<_, DbBoard>(
        "SELECT id, project_id, name, position, created_at, updated_at, deleted_at FROM boards WHERE project_id = ? AND deleted_at IS NULL ORDER BY position ASC, created_at ASC",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(boards.into_iter().map(Board::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/boards",
    tag = "Boards",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = BoardCreateRequest,
    responses((status = 201, description = "Board created", body = Board))
)]
pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<BoardCreateRequest>,
) -> AppResult<(StatusCode, Json<Board>)> {
    require(
        state
            .evaluator
            .check_project(Some(&auth.identity()), project_id, ProjectAction::CreateBoard)
            .await?,
    )?;

    let position = match payload.position {
        Some(position) => position,
        None => next_position(&state.pool, project_id).await?,
    };

    let now = utc_now();
    let board_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO boards (id, project_id, name, position, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(board_id)
    .bind(project_id)
    .bind(&payload.name)
    .bind(position)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let board: Board = fetch_board(&state.pool, project_id, board_id).await?.into();
    log_activity(&state.events, "created", Some(auth.user_id), &board);

    Ok((StatusCode::CREATED, Json(board)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/boards/{id}",
    tag = "Boards",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Board id")
    ),
    responses((status = 200, description = "Board detail", body = Board))
)]
pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Board>> {
    require(
        state
            .evaluator
            .check_board(Some(&auth.identity()), id, BoardAction::Read)
            .await?,
    )?;

    let board: Board = fetch_board(&state.pool, project_id, id).await?.into();
    Ok(Json(board))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/boards/{id}",
    tag = "Boards",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Board id")
    ),
    request_body = BoardUpdateRequest,
    responses((status = 200, description = "Board updated", body = Board))
)]
pub async fn update_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<BoardUpdateRequest>,
) -> AppResult<Json<Board>> {
    require(
        state
            .evaluator
            .check_board(Some(&auth.identity()), id, BoardAction::Update)
            .await?,
    )?;

    let mut board = fetch_board(&state.pool, project_id, id).await?;

    if let Some(name) = payload.name.as_ref() {
        board.name = name.clone();
    }
    if let Some(position) = payload.position {
        board.position = position;
    }

    let now = utc_now();

    sqlx::query("UPDATE boards SET name = ?, position = ?, updated_at = ? WHERE id = ?")
        .bind(&board.name)
        .bind(board.position)
        .bind(now)
        .bind(board.id)
        .execute(&state.pool)
        .await?;

    board.updated_at = now;
    let board: Board = board.into();
    log_activity(&state.events, "updated", Some(auth.user_id), &board);

    Ok(Json(board))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/boards/{id}",
    tag = "Boards",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Board id")
    ),
    responses((status = 204, description = "Board and its tasks soft deleted"))
)]
pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require(
        state
            .evaluator
            .check_board(Some(&auth.identity()), id, BoardAction::Delete)
            .await?,
    )?;

    let board: Board = fetch_board(&state.pool, project_id, id).await?.into();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE board_id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE boards SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log_activity(&state.events, "deleted", Some(auth.user_id), &board);

    Ok(StatusCode::NO_CONTENT)
}

async fn next_position(pool: &SqlitePool, project_id: Uuid) -> AppResult<i64> {
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM boards WHERE project_id = ? AND deleted_at IS NULL",
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;

    Ok(position)
}

async fn fetch_board(pool: &SqlitePool, project_id: Uuid, board_id: Uuid) -> AppResult<DbBoard> {
    sqlx::query_as::<_, DbBoard>(
        "SELECT id, project_id, name, position, created_at, updated_at, deleted_at FROM boards WHERE id = ? AND project_id = ? AND deleted_at IS NULL",
    )
    .bind(board_id)
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("board not found"))
}
