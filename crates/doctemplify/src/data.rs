/*
 * data.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Data trees supplied for substitution.
//!
//! A data tree is a JSON object whose values are scalars, nested objects, or
//! leaf objects of shape `{"value": ..., "style": ...}`. Two path lookups are
//! provided and they intentionally differ:
//!
//! - [`DataTree::resolve`] walks objects only. This is what placeholder
//!   validation and substitution use.
//! - [`DataTree::lookup`] additionally treats numeric segments as list
//!   indices (`items.0.name`).

use serde_json::{Map, Value};

use crate::error::{DoctemplifyError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTree {
    root: Map<String, Value>,
}

impl DataTree {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(DoctemplifyError::Description {
                message: format!("data must be a JSON object, got {}", type_name(&other)),
            }),
        }
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let value = serde_json::from_str(source).map_err(|e| DoctemplifyError::Description {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Top-level entry with exactly this key, without splitting on dots.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Resolve a dot-notation path through nested objects.
    ///
    /// Returns `None` when any segment is absent or when a segment would
    /// have to traverse a non-object. A present `null` is found, not missing.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Resolve a dot-notation path, indexing into lists for numeric segments.
    ///
    /// For callers that read data trees directly. Validation and
    /// substitution use [`DataTree::resolve`] only, so a placeholder such as
    /// `{{items.0.name}}` is reported missing even when this finds a value.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let index = segment.parse::<usize>().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for DataTree {
    fn from(root: Map<String, Value>) -> Self {
        Self::new(root)
    }
}

/// Render a scalar as document text.
///
/// Strings are inserted verbatim, `null` renders empty, and lists and
/// objects render as compact JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
