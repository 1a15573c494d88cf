/*
 * description.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template descriptions: ordered element lists used to build documents.
//!
//! A description is a JSON object whose key order is the insertion order:
//!
//! ```json
//! {
//!   "title":   {"type": "heading", "content": "Invoice {{number}}", "level": 1},
//!   "intro":   {"type": "text", "content": "Dear {{customer.name}},", "style": "font-style:italic"},
//!   "items":   {"type": "list", "items": ["one", "two"]},
//!   "totals":  {"type": "table", "rows": 2, "cols": 2, "content": [["a", "b"], ["c", "d"]]},
//!   "logo":    {"type": "image", "content": "logo"}
//! }
//! ```
//!
//! Elements are kept as raw JSON and decoded one at a time during assembly,
//! so an unknown element type stops assembly at that element rather than
//! rejecting the whole description up front.

use serde_json::{Map, Value};

use crate::data::render_scalar;
use crate::error::{DoctemplifyError, Result};

const DEFAULT_TABLE_SIZE: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDescription {
    entries: Vec<(String, Value)>,
}

impl TemplateDescription {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err(DoctemplifyError::Description {
                message: "a template description must be a JSON object".to_string(),
            }),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let value = serde_json::from_str(source).map_err(|e| DoctemplifyError::Description {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Named raw elements in insertion order.
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A decoded template element.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateElement {
    Heading {
        level: u8,
        content: String,
        style: Value,
    },
    Text {
        content: String,
        style: Value,
    },
    List {
        items: Vec<String>,
        style: Value,
    },
    Table {
        rows: usize,
        cols: usize,
        content: Vec<Vec<String>>,
        style: Value,
    },
    Image {
        placeholder: String,
        style: Value,
    },
}

impl TemplateElement {
    /// Decode the element stored under `key`.
    pub fn from_value(key: &str, value: &Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(DoctemplifyError::assembly(key, "element must be a JSON object"));
        };
        let element_type = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DoctemplifyError::assembly(key, "element has no type"))?;
        let style = fields.get("style").cloned().unwrap_or(Value::Null);
        let content = || fields.get("content").map(render_scalar).unwrap_or_default();

        match element_type {
            "heading" => Ok(TemplateElement::Heading {
                level: fields
                    .get("level")
                    .and_then(Value::as_u64)
                    .map_or(1, |l| l.min(u64::from(u8::MAX)) as u8),
                content: content(),
                style,
            }),
            "text" => Ok(TemplateElement::Text {
                content: content(),
                style,
            }),
            "list" => Ok(TemplateElement::List {
                items: fields
                    .get("items")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(render_scalar).collect())
                    .unwrap_or_default(),
                style,
            }),
            "table" => Ok(TemplateElement::Table {
                rows: dimension(fields, "rows"),
                cols: dimension(fields, "cols"),
                content: table_content(fields.get("content")),
                style,
            }),
            "image" => Ok(TemplateElement::Image {
                placeholder: content(),
                style,
            }),
            other => Err(DoctemplifyError::assembly(
                key,
                format!("unknown element type '{}'", other),
            )),
        }
    }
}

fn dimension(fields: &Map<String, Value>, name: &str) -> usize {
    fields
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(DEFAULT_TABLE_SIZE)
}

/// Rows of cell text. A flat list of scalars is a single row.
fn table_content(content: Option<&Value>) -> Vec<Vec<String>> {
    let Some(Value::Array(rows)) = content else {
        return Vec::new();
    };
    if rows.first().is_some_and(|first| !first.is_array()) {
        return vec![rows.iter().map(render_scalar).collect()];
    }
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(render_scalar).collect(),
            other => vec![render_scalar(other)],
        })
        .collect()
}
