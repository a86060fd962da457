//! Structural diff over serialized resource specs.
//!
//! Compares two versions of a spec field by field after serializing both to
//! `serde_json::Value`, so the traversal is one match arm per value shape
//! (scalar, object, array) with no reflection. Used by the immutability
//! policy to report exactly which frozen fields an update touched.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// One step along a field path: a named field or a sequence index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathStep {
    /// Descent into an object field by its wire name.
    Field(String),
    /// Descent into a sequence element by position.
    Index(usize),
}

/// Location of a differing field within the compared structure.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FieldPath(Vec<PathStep>);

impl FieldPath {
    fn push_field(&self, name: &str) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Field(name.to_string()));
        Self(steps)
    }

    fn push_index(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(index));
        Self(steps)
    }
}

impl fmt::Display for FieldPath {
    /// Renders as `networking.clusterNetwork[0].cidr`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Field(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
                PathStep::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A single field-level difference between two spec versions.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffEntry {
    /// Path of the differing field.
    pub path: FieldPath,
    /// Value on the old side (`Null` when absent).
    pub old: Value,
    /// Value on the new side (`Null` when absent).
    pub new: Value,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\t{}: ({} => {})", self.path, self.old, self.new)
    }
}

/// Render diff entries one per line for inclusion in a denial message.
pub fn format_entries(entries: &[DiffEntry]) -> String {
    entries
        .iter()
        .map(DiffEntry::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare two specs structurally, skipping the named top-level fields.
///
/// Returns `(changed, entries)` where `changed` is true iff at least one
/// non-excluded field differs. Entries come out in pre-order with object
/// keys visited in sorted order, so output is deterministic.
pub fn diff_specs<T: Serialize>(
    old: &T,
    new: &T,
    exclude: &[&str],
) -> Result<(bool, Vec<DiffEntry>), serde_json::Error> {
    let old = serde_json::to_value(old)?;
    let new = serde_json::to_value(new)?;

    let mut entries = Vec::new();
    diff_value(&FieldPath::default(), &old, &new, exclude, &mut entries);
    let changed = !entries.is_empty();
    Ok((changed, entries))
}

/// A value counts as empty when it is absent or the type's empty value:
/// `null`, `""`, `[]`, or `{}`. Numbers and booleans are never empty, so an
/// explicit `0` or `false` still compares against absence as a difference.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn diff_value(
    path: &FieldPath,
    old: &Value,
    new: &Value,
    exclude: &[&str],
    entries: &mut Vec<DiffEntry>,
) {
    // Absent and explicitly-empty are the same thing; a partial update that
    // omits a field must not read as a semantic change.
    if is_empty(old) && is_empty(new) {
        return;
    }

    match (old, new) {
        (Value::Object(old_fields), Value::Object(new_fields)) => {
            // Key union, sorted: objects are unordered collections.
            let keys: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
            for key in keys {
                if path.0.is_empty() && exclude.contains(&key.as_str()) {
                    continue;
                }
                let old_field = old_fields.get(key).unwrap_or(&Value::Null);
                let new_field = new_fields.get(key).unwrap_or(&Value::Null);
                diff_value(&path.push_field(key), old_field, new_field, exclude, entries);
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            // Sequences are ordered; compare element-wise, padding the
            // shorter side with null.
            let len = old_items.len().max(new_items.len());
            for index in 0..len {
                let old_item = old_items.get(index).unwrap_or(&Value::Null);
                let new_item = new_items.get(index).unwrap_or(&Value::Null);
                diff_value(&path.push_index(index), old_item, new_item, exclude, entries);
            }
        }
        // Scalars, and any mismatch of shapes, report as one entry at this
        // path. Values are opaque here; the policy only needs to show them.
        (old, new) => {
            if old != new {
                entries.push(DiffEntry {
                    path: path.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
        }
    }
}
