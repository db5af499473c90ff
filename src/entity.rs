//! The `Auditable` trait and entity snapshots
//!
//! An entity type opts into auditing by implementing [`Auditable`]: it
//! declares its namespace, type name, persisted field list, and the
//! per-type exclusion and censor lists. Field metadata is declared
//! statically per type rather than discovered by reflection, which keeps
//! diffing reproducible and the field set stable across calls.
//!
//! Snapshots are serde-serialized views of the entity (a JSON object
//! keyed by field name), so any `Serialize` type can be diffed without
//! writing audit code of its own.

use serde::Serialize;
use serde_json::Value;

/// A snapshot of an entity's persisted state, keyed by field name
pub type Snapshot = serde_json::Map<String, Value>;

/// A persisted entity type that opts into field-level auditing
///
/// Implementors declare their persisted fields explicitly; the field
/// names must match the type's serde field names so snapshots line up.
/// Audit infrastructure types (entries, logs) must never implement this
/// trait, which keeps the lifecycle hook from auditing itself.
pub trait Auditable: Serialize {
    /// Logical grouping of the entity type, e.g. the application or
    /// module name
    const APP_NAME: &'static str;

    /// The entity's type name as recorded in the audit trail
    const MODEL_NAME: &'static str;

    /// Identifier of this instance; `None` until first persisted
    fn id(&self) -> Option<u64>;

    /// Assign the identifier after first persistence
    fn set_id(&mut self, id: u64);

    /// Persisted field names, in declaration order
    fn fields() -> &'static [&'static str];

    /// Field names never audited
    fn ignored() -> &'static [&'static str] {
        &[]
    }

    /// Field names whose values are censored in the audit trail
    fn censored() -> &'static [&'static str] {
        &[]
    }
}

/// Resolve the audited field set for an entity type
///
/// Returns the declared field list minus the exclusion list, in
/// declaration order. A type with no declared fields yields an empty
/// list, never an error.
pub fn audited_fields<T: Auditable>() -> Vec<&'static str> {
    T::fields()
        .iter()
        .copied()
        .filter(|f| !T::ignored().contains(f))
        .collect()
}

/// Take a snapshot of an entity's current field values
///
/// Entities that do not serialize to a JSON object (or fail to serialize
/// at all) degrade to an empty snapshot; auditing then records nothing
/// rather than failing the write.
pub fn snapshot<T: Auditable>(entity: &T) -> Snapshot {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Snapshot::new(),
    }
}
