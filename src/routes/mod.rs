pub mod auth;
pub mod boards;
pub mod health;
pub mod members;
pub mod projects;
pub mod tasks;

use crate::authz::{Decision, DenyReason};
use crate::errors::{AppError, AppResult};

/// Gate a handler on an evaluator decision. Every protected route funnels
/// through here, so the status mapping cannot drift between endpoints.
pub(crate) fn require(decision: Decision) -> AppResult<()> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(DenyReason::AuthenticationRequired) => {
            Err(AppError::unauthorized("authentication required"))
        }
        Decision::Deny(reason) => Err(AppError::forbidden(reason.to_string())),
        Decision::NotFound(kind) => Err(AppError::not_found(format!("{kind} not found"))),
    }
}
