//! Access control for the project -> board -> task hierarchy.
//!
//! Every protected handler asks the [`AccessEvaluator`] for a [`Decision`]
//! before touching storage. The evaluator resolves the ownership chain
//! through an injected [`ResourceStore`] and applies one declarative policy
//! for all routes, so no handler carries its own role checks.

mod evaluator;
mod store;

pub use evaluator::{AccessEvaluator, BoardAction, ProjectAction, TaskAction};
pub use store::{
    BoardRecord, MemberRecord, ProjectRecord, ResourceStore, SqliteResourceStore, StoreError,
    TaskRecord,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// System-wide rank attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    Admin,
    Manager,
    User,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::Admin => "admin",
            GlobalRole::Manager => "manager",
            GlobalRole::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(GlobalRole::Admin),
            "manager" => Some(GlobalRole::Manager),
            "user" => Some(GlobalRole::User),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, GlobalRole::Admin)
    }
}

impl fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project-scoped rank attached to a membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Manager,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Manager => "manager",
            MemberRole::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(MemberRole::Owner),
            "manager" => Some(MemberRole::Manager),
            "member" => Some(MemberRole::Member),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MemberRole::Owner => 3,
            MemberRole::Manager => 2,
            MemberRole::Member => 1,
        }
    }

    /// True when this role sits at or above `other` in the project hierarchy.
    pub fn at_least(&self, other: MemberRole) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller, as seen by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub global_role: GlobalRole,
}

impl Identity {
    pub fn new(user_id: Uuid, global_role: GlobalRole) -> Self {
        Self {
            user_id,
            global_role,
        }
    }
}

/// Which resource in the chain a check was aimed at, or failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Board,
    Task,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Board => "board",
            ResourceKind::Task => "task",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an access check denied the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No authenticated identity was supplied.
    AuthenticationRequired,
    /// The caller has no membership row in the owning project.
    NotProjectMember,
    /// The operation is reserved for the project owner (or a global admin).
    OwnerRequired,
    /// The caller's membership role sits below the required rank.
    InsufficientRole {
        required: MemberRole,
        actual: MemberRole,
    },
    /// The caller is neither the task's creator nor its assignee, and holds
    /// no managing role in the project.
    NotTaskParticipant,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::AuthenticationRequired => f.write_str("authentication required"),
            DenyReason::NotProjectMember => f.write_str("not a project member"),
            DenyReason::OwnerRequired => f.write_str("only the project owner may perform this operation"),
            DenyReason::InsufficientRole { required, actual } => {
                write!(f, "requires role {} or above, has {}", required, actual)
            }
            DenyReason::NotTaskParticipant => {
                f.write_str("not the task creator or assignee")
            }
        }
    }
}

/// Outcome of an access check.
///
/// Infrastructure failures are deliberately not a variant: evaluator methods
/// return `Result<Decision, StoreError>` so a broken lookup can never be
/// mistaken for an allow or a deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
    NotFound(ResourceKind),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}
