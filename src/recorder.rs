//! Audit entry recording
//!
//! Turns detected field changes into stored [`AuditEntry`] rows: stamps
//! the timestamp and responsible actor, applies the storage schema's
//! truncation limits, and appends to the configured sink. By contract
//! the caller's primary write has already committed when this runs, so
//! sink failures are reported (returned and traced) but never undo the
//! entity change.

use chrono::Utc;
use tracing::error;

use crate::actor::{self, Actor};
use crate::diff::FieldChange;
use crate::entity::Auditable;
use crate::entry::{truncate_chars, AuditEntry, FIELD_NAME_MAX, NAME_MAX, VALUE_MAX};
use crate::error::AuditResult;
use crate::log::AuditLog;

/// Records field changes to an audit log sink
pub struct Recorder<L: AuditLog> {
    log: L,
}

impl<L: AuditLog> Recorder<L> {
    /// Create a recorder over the given sink
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Access the underlying sink
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Record one entry per change for an entity instance
    ///
    /// `actor` overrides the thread's actor context; pass `None` to use
    /// the context, which itself falls back to the anonymous identity.
    /// Returns the number of entries written.
    pub fn record<T: Auditable>(
        &self,
        actor: Option<&Actor>,
        model_id: u64,
        changes: &[FieldChange],
    ) -> AuditResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let user_id = match actor {
            Some(actor) => Some(actor.id),
            None => actor::current_actor().map(|a| a.id),
        };
        let audit_date = Utc::now();

        let entries: Vec<AuditEntry> = changes
            .iter()
            .map(|change| AuditEntry {
                audit_date,
                user_id,
                app_name: truncate_chars(T::APP_NAME, NAME_MAX),
                model_name: truncate_chars(T::MODEL_NAME, NAME_MAX),
                model_id,
                field_name: truncate_chars(change.field, FIELD_NAME_MAX),
                old_val: change
                    .old_val
                    .as_deref()
                    .map(|v| truncate_chars(v, VALUE_MAX)),
                new_val: change
                    .new_val
                    .as_deref()
                    .map(|v| truncate_chars(v, VALUE_MAX)),
            })
            .collect();

        if let Err(e) = self.log.append_all(&entries) {
            error!(
                app_name = T::APP_NAME,
                model_name = T::MODEL_NAME,
                model_id,
                "failed to persist audit entries: {}",
                e
            );
            return Err(e);
        }

        Ok(entries.len())
    }
}
