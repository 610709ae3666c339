// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Declarative filters and updates evaluated against JSON documents.
//!
//! Both backends share this evaluator: the in-process store applies it under
//! its lock, Firestore applies it to documents read inside a transaction.

use crate::db::ID_FIELD;
use crate::error::StoreError;
use crate::models::Id;
use serde_json::Value;

/// Scalar value usable in an equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
}

impl FieldValue {
    fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (FieldValue::Str(expected), Some(Value::String(actual))) => expected == actual,
            (FieldValue::Bool(expected), Some(Value::Bool(actual))) => expected == actual,
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&Id> for FieldValue {
    fn from(value: &Id) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Document filter over top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, FieldValue),
    /// The array at `field` has no element equal to `id` and no element whose
    /// own `id` field equals it. A missing field counts as an empty array.
    NotContains { field: String, id: String },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn by_id(id: &Id) -> Self {
        Filter::eq(ID_FIELD, id)
    }

    pub fn not_contains(field: &str, id: &Id) -> Self {
        Filter::NotContains {
            field: field.to_string(),
            id: id.to_string(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => expected.matches(document.get(field)),
            Filter::NotContains { field, id } => match document.get(field) {
                Some(Value::Array(elements)) => !elements.iter().any(|e| element_has_id(e, id)),
                Some(Value::Null) | None => true,
                Some(other) => !element_has_id(other, id),
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }

    /// The id this filter pins, if it contains a top-level `id` equality.
    pub fn id_equality(&self) -> Option<&str> {
        match self {
            Filter::Eq(field, FieldValue::Str(id)) if field == ID_FIELD => Some(id),
            Filter::And(filters) => filters.iter().find_map(Filter::id_equality),
            _ => None,
        }
    }

    /// All equality clauses reachable through conjunctions. Used to push the
    /// selective part of a filter down to a backend query.
    pub fn equalities(&self) -> Vec<(&str, &FieldValue)> {
        match self {
            Filter::Eq(field, value) => vec![(field.as_str(), value)],
            Filter::And(filters) => filters.iter().flat_map(Filter::equalities).collect(),
            _ => Vec::new(),
        }
    }
}

/// Single-document update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Full-document replace.
    Replace(Value),
    /// Append `value` to the array at `field`, creating it when absent.
    Push { field: String, value: Value },
    /// Remove every element of the array at `field` equal to `id` or whose
    /// `id` field equals it.
    Pull { field: String, id: String },
}

impl Update {
    pub fn push(field: &str, value: Value) -> Self {
        Update::Push {
            field: field.to_string(),
            value,
        }
    }

    pub fn pull(field: &str, id: &Id) -> Self {
        Update::Pull {
            field: field.to_string(),
            id: id.to_string(),
        }
    }

    /// Apply the update in place. Returns whether the document changed.
    pub fn apply(&self, document: &mut Value) -> Result<bool, StoreError> {
        let object = document
            .as_object_mut()
            .ok_or_else(|| StoreError::Decode("document is not an object".to_string()))?;

        match self {
            Update::Replace(replacement) => {
                let replacement = replacement.as_object().ok_or_else(|| {
                    StoreError::Invalid("replacement is not an object".to_string())
                })?;
                let changed = object != replacement;
                *object = replacement.clone();
                Ok(changed)
            }
            Update::Push { field, value } => {
                let slot = object
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                match slot {
                    Value::Array(elements) => {
                        elements.push(value.clone());
                        Ok(true)
                    }
                    _ => Err(StoreError::Invalid(format!("field '{field}' is not an array"))),
                }
            }
            Update::Pull { field, id } => match object.get_mut(field) {
                Some(Value::Array(elements)) => {
                    let before = elements.len();
                    elements.retain(|e| !element_has_id(e, id));
                    Ok(elements.len() != before)
                }
                _ => Ok(false),
            },
        }
    }
}

/// An array element "is" `id` when it equals it directly or carries it in its
/// own `id` field.
pub(crate) fn element_has_id(element: &Value, id: &str) -> bool {
    match element {
        Value::String(s) => s == id,
        Value::Object(map) => map.get(ID_FIELD).and_then(Value::as_str) == Some(id),
        _ => false,
    }
}
