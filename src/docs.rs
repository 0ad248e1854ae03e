use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::SecurityRequirement;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
        // All endpoints except register/login expect the bearer token.
        openapi.security = Some(vec![SecurityRequirement::new(
            "bearerAuth",
            Vec::<String>::new(),
        )]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::projects::delete_project,
        routes::members::list_members,
        routes::members::add_member,
        routes::members::remove_member,
        routes::boards::list_boards,
        routes::boards::create_board,
        routes::boards::get_board,
        routes::boards::update_board,
        routes::boards::delete_board,
        routes::tasks::list_tasks,
        routes::tasks::create_task,
        routes::tasks::get_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
        routes::health::health,
    ),
    components(
        schemas(
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::project::Project,
            models::project::ProjectCreateRequest,
            models::project::ProjectUpdateRequest,
            models::member::ProjectMember,
            models::member::MemberAddRequest,
            models::board::Board,
            models::board::BoardCreateRequest,
            models::board::BoardUpdateRequest,
            models::task::Task,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            routes::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Projects", description = "Project management"),
        (name = "Members", description = "Project roster management"),
        (name = "Boards", description = "Boards within a project"),
        (name = "Tasks", description = "Tasks within a board"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn swagger_router() -> Router {
    let config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .persist_authorization(true);

    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(config)
        .into()
}
