use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt;

use trellis::create_app;

async fn setup() -> Result<(Router, SqlitePool, tempfile::TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_api.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok((app, pool, dir))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}

#[tokio::test]
async fn full_project_board_task_lifecycle() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    // Register and pick up the token.
    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().context("missing token")?.to_string();
    let token = token.as_str();

    // Any authenticated user may create a project.
    let (status, body) = send(
        &app,
        "POST",
        "/projects",
        Some(token),
        Some(json!({"name": "Launch Planning", "description": "Q4 launch"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = body["id"].as_str().context("missing id")?.to_string();
    assert_eq!(body["color"], "#3498db");

    // Owner shows up on the roster right away.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/members"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["member_role"], "owner");

    // Boards get sequential positions when none is given.
    let mut board_ids = Vec::new();
    for name in ["Todo", "Doing", "Done"] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/projects/{project_id}/boards"),
            Some(token),
            Some(json!({"name": name})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        board_ids.push(body["id"].as_str().context("missing id")?.to_string());
    }

    let (status, body) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/boards"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let positions: Vec<i64> = body
        .as_array()
        .context("expected array")?
        .iter()
        .filter_map(|board| board["position"].as_i64())
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);

    // Create, update and re-read a task.
    let board_id = &board_ids[0];
    let (status, body) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/boards/{board_id}/tasks"),
        Some(token),
        Some(json!({"title": "Write release notes", "priority": "high"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = body["id"].as_str().context("missing id")?.to_string();
    assert_eq!(body["status"], "todo");
    assert_eq!(body["priority"], "high");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/projects/{project_id}/boards/{board_id}/tasks/{task_id}"),
        Some(token),
        Some(json!({"status": "in_progress"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");

    // Deleting the project cascades to boards and tasks.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/boards/{board_id}"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/boards/{board_id}/tasks/{task_id}"),
        Some(token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn project_listing_is_scoped_to_caller() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let mut tokens = Vec::new();
    for (name, email) in [("Ada", "ada2@example.com"), ("Grace", "grace@example.com")] {
        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({"name": name, "email": email, "password": "password123"})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        tokens.push(body["token"].as_str().context("missing token")?.to_string());
    }

    let (status, _) = send(
        &app,
        "POST",
        "/projects",
        Some(tokens[0].as_str()),
        Some(json!({"name": "Ada's project"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/projects", Some(tokens[0].as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    // Grace neither owns nor belongs to anything.
    let (status, body) = send(&app, "GET", "/projects", Some(tokens[1].as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(0));

    Ok(())
}
