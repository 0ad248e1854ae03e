use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{AccessEvaluator, SqliteResourceStore};
use crate::errors::AppError;
use crate::events::{self, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, boards, health, members, projects, tasks};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub events: EventBus,
    pub evaluator: AccessEvaluator<SqliteResourceStore>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, events: EventBus) -> Self {
        let evaluator = AccessEvaluator::new(SqliteResourceStore::new(pool.clone()));
        Self {
            pool,
            jwt: Arc::new(jwt),
            events,
            evaluator,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, receiver) = events::init_event_bus();
    events::spawn_event_store_writer(pool.clone(), receiver);

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects))
        .route("/", post(projects::create_project))
        .route("/:id", get(projects::get_project))
        .route("/:id", put(projects::update_project))
        .route("/:id", delete(projects::delete_project));

    let member_routes = Router::new()
        .route("/", get(members::list_members))
        .route("/", post(members::add_member))
        .route("/:user_id", delete(members::remove_member));

    let board_routes = Router::new()
        .route("/", get(boards::list_boards))
        .route("/", post(boards::create_board))
        .route("/:id", get(boards::get_board))
        .route("/:id", put(boards::update_board))
        .route("/:id", delete(boards::delete_board));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/", post(tasks::create_task))
        .route("/:id", get(tasks::get_task))
        .route("/:id", put(tasks::update_task))
        .route("/:id", delete(tasks::delete_task));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/projects/:project_id/members", member_routes)
        .nest("/projects/:project_id/boards", board_routes)
        // tasks live one level further down the hierarchy
        .nest("/projects/:project_id/boards/:board_id/tasks", task_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
