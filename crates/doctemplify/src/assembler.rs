/*
 * assembler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Building a document from a template description.
//!
//! Elements are inserted strictly in description order at the session
//! cursor. Headings, text, lists and image placeholders are text
//! insertions, after which the cursor advances locally. Tables are
//! structural: the cursor and every cell position are re-read from the
//! remote document, once per cell write, because each write shifts every
//! index after it.
//!
//! An element that cannot be decoded aborts assembly. Elements inserted
//! before it stay in the remote document.

use serde_json::Value;

use crate::config::EngineConfig;
use crate::description::{TemplateDescription, TemplateElement};
use crate::document::{IndexRange, TableCell, index_len};
use crate::error::{DoctemplifyError, Result, SubstitutionWarning};
use crate::request::{NamedStyle, Request};
use crate::service::DocumentService;
use crate::session::EditSession;
use crate::style::{StyleCompiler, StyleDescriptor};

/// Outcome of a successful assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub document_id: String,
    /// Number of elements inserted.
    pub elements: usize,
    /// Cursor after the last element.
    pub cursor: usize,
    pub warnings: Vec<SubstitutionWarning>,
}

#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    config: EngineConfig,
    styles: StyleCompiler,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DocumentAssembler {
    pub fn new(config: EngineConfig) -> Self {
        let styles = StyleCompiler::new(&config);
        Self { config, styles }
    }

    /// Insert every element of `description` into a freshly created
    /// document, starting at index 1.
    pub async fn assemble(
        &self,
        service: &dyn DocumentService,
        document_id: &str,
        description: &TemplateDescription,
    ) -> Result<AssemblyReport> {
        let mut session = EditSession::new(service, document_id, self.config.read_retries);
        self.assemble_session(&mut session, description).await
    }

    /// Insert every element of `description` at the session cursor.
    pub async fn assemble_session(
        &self,
        session: &mut EditSession<'_>,
        description: &TemplateDescription,
    ) -> Result<AssemblyReport> {
        tracing::info!(
            document = %session.document_id(),
            elements = description.len(),
            "Assembling document"
        );
        let mut warnings = Vec::new();

        for (key, raw) in description.entries() {
            let element = TemplateElement::from_value(key, raw)?;
            tracing::debug!(element = %key, cursor = session.cursor(), "Inserting element");
            self.insert_element(session, key, &element, &mut warnings)
                .await?;
        }

        Ok(AssemblyReport {
            document_id: session.document_id().to_string(),
            elements: description.len(),
            cursor: session.cursor(),
            warnings,
        })
    }

    async fn insert_element(
        &self,
        session: &mut EditSession<'_>,
        key: &str,
        element: &TemplateElement,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<()> {
        match element {
            TemplateElement::Heading {
                level,
                content,
                style,
            } => {
                let style = self.compile(style, warnings);
                let named_style = Some(NamedStyle::heading(*level));
                self.insert_paragraphs(session, content, named_style, None, &style)
                    .await
            }
            TemplateElement::Text { content, style } => {
                let style = self.compile(style, warnings);
                self.insert_paragraphs(session, content, None, None, &style)
                    .await
            }
            TemplateElement::List { items, style } => {
                if items.is_empty() {
                    return Ok(());
                }
                let style = self.compile(style, warnings);
                let preset = self.config.list_bullet_preset.clone();
                self.insert_paragraphs(session, &items.join("\n"), None, Some(preset), &style)
                    .await
            }
            TemplateElement::Table {
                rows,
                cols,
                content,
                style,
            } => {
                let style = self.compile(style, warnings);
                self.insert_table(session, key, *rows, *cols, content, &style, warnings)
                    .await
            }
            TemplateElement::Image { placeholder, style } => {
                let style = self.compile(style, warnings);
                let text = self.image_placeholder_text(placeholder);
                self.insert_paragraphs(session, &text, None, None, &style)
                    .await
            }
        }
    }

    /// The placeholder inserted for an image element. Content that is
    /// already a placeholder is used verbatim; otherwise it is taken as
    /// the image key.
    fn image_placeholder_text(&self, content: &str) -> String {
        if content.trim_start().starts_with("{{") {
            content.to_string()
        } else {
            format!("{{{{{}:{}}}}}", self.config.image_marker, content.trim())
        }
    }

    /// Insert `text` followed by a newline at the cursor, then style it.
    async fn insert_paragraphs(
        &self,
        session: &mut EditSession<'_>,
        text: &str,
        named_style: Option<NamedStyle>,
        bullets: Option<String>,
        style: &StyleDescriptor,
    ) -> Result<()> {
        let at = session.cursor();
        let len = index_len(text);
        let mut requests = vec![Request::InsertText {
            index: at,
            text: format!("{}\n", text),
        }];
        if let Some(named_style) = named_style {
            requests.push(Request::UpdateParagraphStyle {
                range: IndexRange::at(at, len + 1),
                named_style,
            });
        }
        if let Some(preset) = bullets {
            requests.push(Request::CreateParagraphBullets {
                range: IndexRange::at(at, len + 1),
                preset,
            });
        }
        if !style.is_empty() && len > 0 {
            requests.push(Request::UpdateTextStyle {
                range: IndexRange::at(at, len),
                style: style.clone(),
            });
        }

        session.apply(&requests).await?;
        session.tracker.after_text_insert(len);
        Ok(())
    }

    async fn insert_table(
        &self,
        session: &mut EditSession<'_>,
        key: &str,
        rows: usize,
        cols: usize,
        content: &[Vec<String>],
        style: &StyleDescriptor,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(DoctemplifyError::assembly(
                key,
                "a table needs at least one row and one column",
            ));
        }
        let table_at = session.cursor();
        session
            .apply(&[Request::InsertTable {
                index: table_at,
                rows,
                columns: cols,
            }])
            .await?;

        for (row, cells) in content.iter().enumerate() {
            for (col, text) in cells.iter().enumerate() {
                if row >= rows || col >= cols {
                    let warning = SubstitutionWarning::CellOutOfBounds {
                        element: key.to_string(),
                        row,
                        col,
                    };
                    warning.log();
                    warnings.push(warning);
                    continue;
                }
                if text.is_empty() {
                    continue;
                }

                // Every earlier cell write moved this cell, so ask again.
                let document = session.fetch().await?;
                let start = document
                    .locate_table(table_at)
                    .and_then(|t| t.cell(row, col))
                    .and_then(TableCell::content_start)
                    .ok_or_else(|| {
                        DoctemplifyError::assembly(
                            key,
                            format!("cell ({}, {}) not found after table insert", row, col),
                        )
                    })?;

                let mut requests = vec![Request::InsertText {
                    index: start,
                    text: text.clone(),
                }];
                if !style.is_empty() {
                    requests.push(Request::UpdateTextStyle {
                        range: IndexRange::at(start, index_len(text)),
                        style: style.clone(),
                    });
                }
                session.apply(&requests).await?;
            }
        }

        let document = session.fetch().await?;
        let table = document.locate_table(table_at).ok_or_else(|| {
            DoctemplifyError::assembly(key, "inserted table not found in document")
        })?;
        session.tracker.resync(table.end_index);
        Ok(())
    }

    fn compile(&self, style: &Value, warnings: &mut Vec<SubstitutionWarning>) -> StyleDescriptor {
        let compiled = self.styles.compile_value(style);
        for warning in &compiled.warnings {
            warning.log();
        }
        warnings.extend(compiled.warnings);
        compiled.descriptor
    }
}
