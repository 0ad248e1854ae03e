use uuid::Uuid;

use super::store::{ProjectRecord, ResourceStore, StoreError};
use super::{Decision, DenyReason, Identity, MemberRole, ResourceKind};

/// Operations that target a project directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Read,
    Update,
    Delete,
    CreateBoard,
    ManageMembers,
}

/// Operations that target a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    Read,
    Update,
    Delete,
    CreateTask,
}

/// Operations that target a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Read,
    Update,
    Delete,
}

impl TaskAction {
    fn modifies(&self) -> bool {
        matches!(self, TaskAction::Update | TaskAction::Delete)
    }
}

/// Minimum standing a membership row must grant for an operation. The
/// admin and owner fast-paths run before any requirement is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    /// Any membership role suffices.
    Membership,
    /// Membership role `manager` or above.
    Manager,
    /// Reserved for the project owner; no membership role qualifies.
    OwnerOnly,
}

impl ProjectAction {
    fn requirement(&self) -> Requirement {
        match self {
            ProjectAction::Read | ProjectAction::CreateBoard => Requirement::Membership,
            ProjectAction::Update | ProjectAction::Delete | ProjectAction::ManageMembers => {
                Requirement::OwnerOnly
            }
        }
    }
}

impl BoardAction {
    fn requirement(&self) -> Requirement {
        match self {
            BoardAction::Read | BoardAction::CreateTask => Requirement::Membership,
            BoardAction::Update | BoardAction::Delete => Requirement::Manager,
        }
    }
}

/// Computes allow/deny decisions for the resource hierarchy.
///
/// Shared resolution shape: look the resource up, walk to the owning
/// project, then run admin -> owner -> membership in that order. A missing
/// link anywhere resolves to `NotFound` for the first absent resource,
/// never to a grant or a denial. The evaluator only reads.
#[derive(Debug, Clone)]
pub struct AccessEvaluator<S> {
    store: S,
}

impl<S: ResourceStore> AccessEvaluator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Any authenticated identity may create a project, whatever its
    /// global role.
    pub fn check_create_project(&self, identity: Option<&Identity>) -> Decision {
        match identity {
            Some(_) => Decision::Allow,
            None => Decision::Deny(DenyReason::AuthenticationRequired),
        }
    }

    pub async fn check_project(
        &self,
        identity: Option<&Identity>,
        project_id: Uuid,
        action: ProjectAction,
    ) -> Result<Decision, StoreError> {
        let Some(identity) = identity else {
            return Ok(Decision::Deny(DenyReason::AuthenticationRequired));
        };

        let Some(project) = self.store.project_by_id(project_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Project));
        };

        self.project_scoped(identity, &project, action.requirement())
            .await
    }

    pub async fn check_board(
        &self,
        identity: Option<&Identity>,
        board_id: Uuid,
        action: BoardAction,
    ) -> Result<Decision, StoreError> {
        let Some(identity) = identity else {
            return Ok(Decision::Deny(DenyReason::AuthenticationRequired));
        };

        let Some(board) = self.store.board_by_id(board_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Board));
        };
        let Some(project) = self.store.project_by_id(board.project_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Project));
        };

        self.project_scoped(identity, &project, action.requirement())
            .await
    }

    pub async fn check_task(
        &self,
        identity: Option<&Identity>,
        task_id: Uuid,
        action: TaskAction,
    ) -> Result<Decision, StoreError> {
        let Some(identity) = identity else {
            return Ok(Decision::Deny(DenyReason::AuthenticationRequired));
        };

        let Some(task) = self.store.task_by_id(task_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Task));
        };
        let Some(board) = self.store.board_by_id(task.board_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Board));
        };
        let Some(project) = self.store.project_by_id(board.project_id).await? else {
            return Ok(Decision::NotFound(ResourceKind::Project));
        };

        if identity.global_role.is_admin() {
            tracing::debug!(user_id = %identity.user_id, task_id = %task_id, "admin bypass");
            return Ok(Decision::Allow);
        }
        if identity.user_id == project.owner_id {
            return Ok(Decision::Allow);
        }

        // Creator and assignee edit their own task without a membership
        // lookup, whatever their project role.
        if action.modifies() && task.participant(identity.user_id) {
            return Ok(Decision::Allow);
        }

        let Some(role) = self.membership_role(project.id, identity.user_id).await? else {
            return Ok(Decision::Deny(DenyReason::NotProjectMember));
        };

        let decision = if !action.modifies() || role.at_least(MemberRole::Manager) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotTaskParticipant)
        };

        if let Decision::Deny(reason) = decision {
            tracing::debug!(user_id = %identity.user_id, task_id = %task_id, %reason, "task access denied");
        }

        Ok(decision)
    }

    /// Admin -> owner -> membership, the shared tail of every check once
    /// the chain has resolved to its project.
    async fn project_scoped(
        &self,
        identity: &Identity,
        project: &ProjectRecord,
        requirement: Requirement,
    ) -> Result<Decision, StoreError> {
        if identity.global_role.is_admin() {
            tracing::debug!(user_id = %identity.user_id, project_id = %project.id, "admin bypass");
            return Ok(Decision::Allow);
        }
        if identity.user_id == project.owner_id {
            return Ok(Decision::Allow);
        }

        let role = self.membership_role(project.id, identity.user_id).await?;
        let decision = apply_requirement(requirement, role);

        if let Decision::Deny(reason) = decision {
            tracing::debug!(user_id = %identity.user_id, project_id = %project.id, %reason, "access denied");
        }

        Ok(decision)
    }

    /// First matching row wins; the schema enforces one row per user.
    async fn membership_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, StoreError> {
        let members = self.store.project_members(project_id).await?;
        Ok(members
            .into_iter()
            .find(|member| member.user_id == user_id)
            .map(|member| member.member_role))
    }
}

fn apply_requirement(requirement: Requirement, role: Option<MemberRole>) -> Decision {
    let Some(actual) = role else {
        return Decision::Deny(DenyReason::NotProjectMember);
    };

    match requirement {
        Requirement::Membership => Decision::Allow,
        Requirement::Manager => {
            if actual.at_least(MemberRole::Manager) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::InsufficientRole {
                    required: MemberRole::Manager,
                    actual,
                })
            }
        }
        Requirement::OwnerOnly => Decision::Deny(DenyReason::OwnerRequired),
    }
}
