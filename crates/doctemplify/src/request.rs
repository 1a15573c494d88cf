/*
 * request.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mutation requests sent to the remote document service.
//!
//! Requests serialize to the remote batch-update wire shape, so an HTTP
//! adapter can post `{"requests": [...]}` without further mapping.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::document::IndexRange;
use crate::style::StyleDescriptor;

/// Named paragraph styles used by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedStyle {
    Heading(u8),
}

impl NamedStyle {
    /// Heading style for `level`, clamped to the supported 1..=6.
    pub fn heading(level: u8) -> Self {
        NamedStyle::Heading(level.clamp(1, 6))
    }
}

impl fmt::Display for NamedStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedStyle::Heading(level) => write!(f, "HEADING_{}", level),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    InsertText {
        index: usize,
        text: String,
    },
    InsertTable {
        index: usize,
        rows: usize,
        columns: usize,
    },
    UpdateParagraphStyle {
        range: IndexRange,
        named_style: NamedStyle,
    },
    CreateParagraphBullets {
        range: IndexRange,
        preset: String,
    },
    UpdateTextStyle {
        range: IndexRange,
        style: StyleDescriptor,
    },
    InsertInlineImage {
        index: usize,
        uri: String,
        width: f64,
        height: f64,
    },
    DeleteContentRange {
        range: IndexRange,
    },
}

impl Request {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::InsertText { .. } => "insertText",
            Request::InsertTable { .. } => "insertTable",
            Request::UpdateParagraphStyle { .. } => "updateParagraphStyle",
            Request::CreateParagraphBullets { .. } => "createParagraphBullets",
            Request::UpdateTextStyle { .. } => "updateTextStyle",
            Request::InsertInlineImage { .. } => "insertInlineImage",
            Request::DeleteContentRange { .. } => "deleteContentRange",
        }
    }

    pub fn to_wire(&self) -> Value {
        let body = match self {
            Request::InsertText { index, text } => json!({
                "location": { "index": index },
                "text": text,
            }),
            Request::InsertTable {
                index,
                rows,
                columns,
            } => json!({
                "location": { "index": index },
                "rows": rows,
                "columns": columns,
            }),
            Request::UpdateParagraphStyle { range, named_style } => json!({
                "range": range,
                "paragraphStyle": { "namedStyleType": named_style.to_string() },
                "fields": "namedStyleType",
            }),
            Request::CreateParagraphBullets { range, preset } => json!({
                "range": range,
                "bulletPreset": preset,
            }),
            Request::UpdateTextStyle { range, style } => json!({
                "range": range,
                "textStyle": style.to_text_style(),
                "fields": style.field_mask(),
            }),
            Request::InsertInlineImage {
                index,
                uri,
                width,
                height,
            } => json!({
                "location": { "index": index },
                "uri": uri,
                "objectSize": {
                    "width": { "magnitude": width, "unit": "PT" },
                    "height": { "magnitude": height, "unit": "PT" },
                },
            }),
            Request::DeleteContentRange { range } => json!({ "range": range }),
        };
        json!({ self.kind(): body })
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

/// Per-request reply from a batch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Empty,
    InsertInlineImage { object_id: String },
}
