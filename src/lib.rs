//! audit-trail - Field-level change auditing for persisted records
//!
//! This library detects which fields of a tracked entity changed value on
//! every create, update, and delete, and appends immutable audit entries
//! recording who made the change, when, and the before/after values. It
//! is an embedded library: no CLI, no network surface.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `actor`: Thread-scoped actor context for audit attribution
//! - `entity`: The `Auditable` trait, field resolution, and snapshots
//! - `diff`: Change detection between snapshots with value normalization
//! - `entry`: The append-only `AuditEntry` record and its column limits
//! - `log`: Audit entry sinks (JSONL file, in-memory) and queries
//! - `recorder`: Construction and persistence of entries per change
//! - `store`: The `EntityStore` trait and the `AuditedStore` hook
//! - `error`: Custom error types
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_trail::{Actor, ActorScope, AuditedStore, MemoryAuditLog, MemoryStore};
//!
//! let store = AuditedStore::new(MemoryStore::new(), MemoryAuditLog::new());
//!
//! let _scope = ActorScope::enter(Actor::new(7, "alice"));
//! let mut account = Account::new("Checking");
//! let report = store.save(&mut account)?;
//!
//! for entry in store.audit_log(report.id)? {
//!     println!("{}", entry.format_human_readable());
//! }
//! ```

pub mod actor;
pub mod diff;
pub mod entity;
pub mod entry;
pub mod error;
pub mod log;
pub mod recorder;
pub mod store;

pub use actor::{clear_actor, current_actor, current_actor_id, set_actor, Actor, ActorScope};
pub use diff::{diff_snapshots, FieldChange, REDACTION_MARKER};
pub use entity::{audited_fields, snapshot, Auditable, Snapshot};
pub use entry::{AuditEntry, FIELD_NAME_MAX, NAME_MAX, VALUE_MAX};
pub use error::{AuditError, AuditResult};
pub use log::{AuditLog, JsonlAuditLog, MemoryAuditLog, QueryOrder};
pub use recorder::Recorder;
pub use store::{AuditedStore, DeleteReport, EntityStore, MemoryStore, SaveReport};
