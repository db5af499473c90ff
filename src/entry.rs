//! Audit entry data structure
//!
//! Defines the append-only audit record and the column limits of its
//! stable storage schema. An entry is a pure historical fact: created
//! once when a field change is observed, never mutated or deleted, and
//! it outlives the entity it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ANONYMOUS_ACTOR_ID;

/// Maximum stored length of `app_name` and `model_name`, in chars
pub const NAME_MAX: usize = 50;

/// Maximum stored length of `field_name`, in chars
pub const FIELD_NAME_MAX: usize = 50;

/// Maximum stored length of `old_val` and `new_val`, in chars
pub const VALUE_MAX: usize = 255;

/// A single field change in the audit trail
///
/// Linked to its entity by (`app_name`, `model_name`, `model_id`) — a
/// loose key, not a referential constraint, so the trail survives entity
/// deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the change was recorded (UTC), set at construction
    pub audit_date: DateTime<Utc>,

    /// Responsible actor; `None` when no actor context was active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,

    /// Logical grouping of the entity's type
    pub app_name: String,

    /// The entity's type name
    pub model_name: String,

    /// Identifier of the affected entity instance
    pub model_id: u64,

    /// Name of the changed field
    pub field_name: String,

    /// Value before the change; `None` means the field was absent/empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_val: Option<String>,

    /// Value after the change; `None` means the field became absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_val: Option<String>,
}

impl AuditEntry {
    /// The responsible actor's id, or the anonymous sentinel (0)
    pub fn actor_id(&self) -> u64 {
        self.user_id.unwrap_or(ANONYMOUS_ACTOR_ID)
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        format!(
            "[{}] {}.{}[{}].{}: {} -> {}",
            self.audit_date.format("%Y-%m-%d %H:%M:%S UTC"),
            self.app_name,
            self.model_name,
            self.model_id,
            self.field_name,
            self.old_val.as_deref().unwrap_or("(none)"),
            self.new_val.as_deref().unwrap_or("(none)")
        )
    }
}

/// Truncate a string to at most `max` chars
///
/// Limits are counted in chars, not bytes, so multi-byte values truncate
/// cleanly.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
