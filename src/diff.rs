//! Change detection between entity snapshots
//!
//! Compares a prior snapshot against a new snapshot field by field and
//! produces the set of differences to record. Comparison works on
//! normalized string forms: entity references collapse to their id,
//! integer/boolean storage drift is coerced away, and values are equal
//! when their string forms match after trimming surrounding whitespace.
//!
//! Censored fields still produce a change record — the audit trail shows
//! *that* the field changed, with both values replaced by the redaction
//! marker.

use serde_json::Value;

use crate::entity::Snapshot;

/// Marker written in place of censored field values
pub const REDACTION_MARKER: &str = "*****";

/// A detected difference in one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Name of the changed field
    pub field: &'static str,

    /// Normalized prior value; `None` means absent/empty
    pub old_val: Option<String>,

    /// Normalized new value; `None` means absent/empty
    pub new_val: Option<String>,
}

/// Diff two snapshots over the given field set
///
/// `old` is `None` when the entity had no prior persisted state (first
/// insert): every non-empty new value is then a change from absent.
/// `new` is `None` on deletion: every non-empty old value is a change to
/// absent. A difference is emitted only when at least one side is
/// non-empty after normalization and the normalized values differ.
pub fn diff_snapshots(
    old: Option<&Snapshot>,
    new: Option<&Snapshot>,
    fields: &[&'static str],
    censored: &[&'static str],
) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    for &field in fields {
        let old_raw = old.and_then(|snap| snap.get(field));
        let new_raw = new.and_then(|snap| snap.get(field));

        let old_val = normalize(old_raw, new_raw);
        let new_val = normalize(new_raw, old_raw);

        if old_val.is_none() && new_val.is_none() {
            continue;
        }
        if old_val.as_deref().map(str::trim) == new_val.as_deref().map(str::trim) {
            continue;
        }

        if censored.contains(&field) {
            changes.push(FieldChange {
                field,
                old_val: Some(REDACTION_MARKER.to_string()),
                new_val: Some(REDACTION_MARKER.to_string()),
            });
        } else {
            changes.push(FieldChange {
                field,
                old_val,
                new_val,
            });
        }
    }

    changes
}

/// Normalize a field value to its comparable string form
///
/// Returns `None` for absent, null, and whitespace-only values. The
/// opposite side participates so integer values coerce to boolean when
/// compared against a boolean (storage round-trip type drift).
fn normalize(value: Option<&Value>, opposite: Option<&Value>) -> Option<String> {
    let value = value?;
    let rendered = render(value, opposite);
    if rendered.trim().is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Render a JSON value as the string form stored in the trail
fn render(value: &Value, opposite: Option<&Value>) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            // A boolean round-trips through some storage layers as an
            // integer; coerce so 1 vs true is not a false positive
            if matches!(opposite, Some(Value::Bool(_))) {
                if let Some(i) = n.as_i64() {
                    return (i != 0).to_string();
                }
            }
            n.to_string()
        }
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("id") {
            // A reference to another entity collapses to its identifier
            Some(id) => render(id, None),
            None => value.to_string(),
        },
        Value::Array(_) => value.to_string(),
    }
}
