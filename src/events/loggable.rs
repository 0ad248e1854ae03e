use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity events. Controls retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Long-term retention, never auto-deleted
    Critical,
    /// Medium-term retention (default)
    #[default]
    Important,
    /// Aggressively trimmed
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for entities recorded in the activity log. Event names take the
/// form `<entity_type>.<action>`, e.g. "task.created".
pub trait Loggable: Serialize + Send + Sync {
    fn entity_type() -> &'static str;

    /// Usually the entity's primary key.
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Deletions are always worth keeping.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
