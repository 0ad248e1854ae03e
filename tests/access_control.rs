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

async fn setup(db_name: &str) -> Result<(Router, SqlitePool, tempfile::TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join(db_name);
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
    std::env::set_var("ADMIN_PASSWORD", "admin-password-1");
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

async fn register(app: &Router, name: &str, email: &str) -> Result<(String, String)> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": name, "email": email, "password": "password123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {body}");

    let token = body["token"].as_str().context("missing token")?.to_string();
    let user_id = body["user"]["id"].as_str().context("missing user id")?.to_string();
    Ok((token, user_id))
}

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    Ok(body["token"].as_str().context("missing token")?.to_string())
}

struct World {
    app: Router,
    owner: String,
    manager: String,
    member: String,
    member_id: String,
    stranger: String,
    admin: String,
    project_id: String,
    board_id: String,
    /// Created by the member-role user, assigned to themselves.
    task_id: String,
    /// Created by the owner, unassigned.
    foreign_task_id: String,
    _dir: tempfile::TempDir,
}

/// Owner-run project with a manager-role and a member-role collaborator,
/// one board, and two tasks with different participants.
async fn build_world(db_name: &str) -> Result<World> {
    let (app, pool, dir) = setup(db_name).await?;

    trellis::bootstrap::ensure_admin(&pool)
        .await
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    let admin = login(&app, "admin@trellis.local", "admin-password-1").await?;

    let (owner, _) = register(&app, "Owner", &format!("owner-{db_name}@example.com")).await?;
    let (manager, manager_id) =
        register(&app, "Manager", &format!("manager-{db_name}@example.com")).await?;
    let (member, member_id) =
        register(&app, "Member", &format!("member-{db_name}@example.com")).await?;
    let (stranger, _) = register(&app, "Stranger", &format!("stranger-{db_name}@example.com")).await?;

    let (status, body) = send(
        &app,
        "POST",
        "/projects",
        Some(owner.as_str()),
        Some(json!({"name": "Launch Planning"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = body["id"].as_str().context("missing project id")?.to_string();

    for (user_id, role) in [(&manager_id, "manager"), (&member_id, "member")] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/projects/{project_id}/members"),
            Some(owner.as_str()),
            Some(json!({"user_id": user_id, "member_role": role})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "adding member failed: {body}");
    }

    let (status, body) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/boards"),
        Some(owner.as_str()),
        Some(json!({"name": "In Progress"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let board_id = body["id"].as_str().context("missing board id")?.to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/boards/{board_id}/tasks"),
        Some(member.as_str()),
        Some(json!({"title": "Write release notes", "assignee": member_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "member task creation failed: {body}");
    let task_id = body["id"].as_str().context("missing task id")?.to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/boards/{board_id}/tasks"),
        Some(owner.as_str()),
        Some(json!({"title": "Owner-only chore"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let foreign_task_id = body["id"].as_str().context("missing task id")?.to_string();

    Ok(World {
        app,
        owner,
        manager,
        member,
        member_id,
        stranger,
        admin,
        project_id,
        board_id,
        task_id,
        foreign_task_id,
        _dir: dir,
    })
}

#[tokio::test]
async fn member_role_reads_but_cannot_manage() -> Result<()> {
    let w = build_world("member_limits.db").await?;
    let project = format!("/projects/{}", w.project_id);
    let board = format!("{project}/boards/{}", w.board_id);

    let (status, _) = send(&w.app, "GET", &project, Some(w.member.as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&w.app, "GET", &board, Some(w.member.as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);

    // Project update/delete stays with the owner.
    let (status, _) = send(
        &w.app,
        "PUT",
        &project,
        Some(w.member.as_str()),
        Some(json!({"name": "Hijacked"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&w.app, "DELETE", &project, Some(w.member.as_str()), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Boards: members may create but not modify.
    let (status, _) = send(
        &w.app,
        "POST",
        &format!("{project}/boards"),
        Some(w.member.as_str()),
        Some(json!({"name": "Backlog"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &w.app,
        "PUT",
        &board,
        Some(w.member.as_str()),
        Some(json!({"name": "Renamed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&w.app, "DELETE", &board, Some(w.member.as_str()), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Roster management is owner-only.
    let (status, _) = send(
        &w.app,
        "POST",
        &format!("{project}/members"),
        Some(w.member.as_str()),
        Some(json!({"user_id": w.member_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn manager_role_manages_boards_not_project() -> Result<()> {
    let w = build_world("manager_limits.db").await?;
    let project = format!("/projects/{}", w.project_id);
    let board = format!("{project}/boards/{}", w.board_id);

    let (status, _) = send(
        &w.app,
        "PUT",
        &board,
        Some(w.manager.as_str()),
        Some(json!({"name": "Doing"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Managers can edit tasks they neither created nor hold.
    let (status, _) = send(
        &w.app,
        "PUT",
        &format!("{board}/tasks/{}", w.foreign_task_id),
        Some(w.manager.as_str()),
        Some(json!({"status": "in_progress"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &w.app,
        "PUT",
        &project,
        Some(w.manager.as_str()),
        Some(json!({"name": "Hijacked"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&w.app, "DELETE", &project, Some(w.manager.as_str()), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &w.app,
        "POST",
        &format!("{project}/members"),
        Some(w.manager.as_str()),
        Some(json!({"user_id": w.member_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn task_participants_modify_their_own_tasks() -> Result<()> {
    let w = build_world("task_participants.db").await?;
    let tasks = format!(
        "/projects/{}/boards/{}/tasks",
        w.project_id, w.board_id
    );

    // Creator-and-assignee updates their task despite plain member rank.
    let (status, _) = send(
        &w.app,
        "PUT",
        &format!("{tasks}/{}", w.task_id),
        Some(w.member.as_str()),
        Some(json!({"status": "done"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // The owner's unassigned task is readable but not editable for them.
    let (status, _) = send(
        &w.app,
        "GET",
        &format!("{tasks}/{}", w.foreign_task_id),
        Some(w.member.as_str()),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &w.app,
        "PUT",
        &format!("{tasks}/{}", w.foreign_task_id),
        Some(w.member.as_str()),
        Some(json!({"status": "done"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A user with no relation to the project cannot touch the task at all.
    let (status, _) = send(
        &w.app,
        "PUT",
        &format!("{tasks}/{}", w.task_id),
        Some(w.stranger.as_str()),
        Some(json!({"status": "done"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn stranger_sees_nothing_admin_sees_everything() -> Result<()> {
    let w = build_world("stranger_admin.db").await?;
    let project = format!("/projects/{}", w.project_id);
    let board = format!("{project}/boards/{}", w.board_id);

    for (method, uri) in [
        ("GET", project.clone()),
        ("PUT", project.clone()),
        ("DELETE", project.clone()),
        ("GET", board.clone()),
    ] {
        let body = (method == "PUT").then(|| json!({"name": "x"}));
        let (status, _) = send(&w.app, method, &uri, Some(w.stranger.as_str()), body).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }

    // Global admin needs no ownership or membership row.
    let (status, _) = send(&w.app, "GET", &project, Some(w.admin.as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&w.app, "DELETE", &board, Some(w.admin.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn missing_resources_are_not_found_not_forbidden() -> Result<()> {
    let w = build_world("missing_resources.db").await?;
    let board = format!("/projects/{}/boards/{}", w.project_id, w.board_id);

    // Delete the board out from under its tasks.
    let (status, _) = send(&w.app, "DELETE", &board, Some(w.owner.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &w.app,
        "GET",
        &format!("{board}/tasks/{}", w.task_id),
        Some(w.owner.as_str()),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown ids resolve to 404 for everyone, stranger included.
    let unknown = "/projects/00000000-0000-0000-0000-000000000000";
    let (status, _) = send(&w.app, "GET", unknown, Some(w.owner.as_str()), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&w.app, "GET", unknown, Some(w.stranger.as_str()), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn unauthenticated_requests_rejected_before_lookup() -> Result<()> {
    let w = build_world("unauthenticated.db").await?;

    for uri in [
        "/projects".to_string(),
        format!("/projects/{}", w.project_id),
        format!("/projects/{}/boards/{}", w.project_id, w.board_id),
    ] {
        let (status, body) = send(&w.app, "GET", &uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "GET {uri}: {body}");
    }

    Ok(())
}
