/*
 * substitution.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Placeholder substitution in an existing document.
//!
//! Substitution runs in two phases:
//!
//! 1. **Validate**: fetch the document, discover its placeholders and
//!    resolve each against the data. If anything is missing, fail with
//!    [`DoctemplifyError::Validation`] before any mutation is issued.
//! 2. **Substitute**: for each placeholder from that same discovery pass,
//!    replace its literal token with the resolved value, then style the
//!    replacement if a style applies. Image placeholders are swapped for
//!    inline images by deleting the token and inserting the image where
//!    it was.
//!
//! A fatal error during phase 2 stops the remaining placeholders and is
//! returned as [`DoctemplifyError::SubstitutionAborted`] with the number
//! of placeholders already done. Those replacements stay in the document.

use std::fmt;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::data::{DataTree, render_scalar};
use crate::error::{DoctemplifyError, Result, SubstitutionWarning};
use crate::parser::{Placeholder, TemplateParser};
use crate::request::Request;
use crate::service::DocumentService;
use crate::session::EditSession;
use crate::style::{CompiledStyle, StyleCompiler, StyleDescriptor};

/// Lifecycle of a document under substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionState {
    Discovered,
    Validated,
    Substituting { completed: usize },
    Done,
    Rejected,
    Aborted { completed: usize },
}

impl fmt::Display for SubstitutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionState::Discovered => write!(f, "discovered"),
            SubstitutionState::Validated => write!(f, "validated"),
            SubstitutionState::Substituting { completed } => {
                write!(f, "substituting ({} done)", completed)
            }
            SubstitutionState::Done => write!(f, "done"),
            SubstitutionState::Rejected => write!(f, "rejected"),
            SubstitutionState::Aborted { completed } => {
                write!(f, "aborted after {} substitutions", completed)
            }
        }
    }
}

/// Outcome of a successful substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionReport {
    pub document_id: String,
    /// Placeholders discovered in the validation pass, in document order.
    pub placeholders: Vec<Placeholder>,
    /// Number of placeholders processed.
    pub substituted: usize,
    pub state: SubstitutionState,
    pub warnings: Vec<SubstitutionWarning>,
}

/// What a placeholder resolves to.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Text {
        text: String,
        style: StyleDescriptor,
    },
    Image {
        uri: String,
        width: f64,
        height: f64,
    },
}

#[derive(Debug, Clone)]
pub struct SubstitutionEngine {
    config: EngineConfig,
    parser: TemplateParser,
    styles: StyleCompiler,
}

impl Default for SubstitutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SubstitutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            parser: TemplateParser::new(config.image_marker.clone()),
            styles: StyleCompiler::new(&config),
            config,
        }
    }

    pub fn parser(&self) -> &TemplateParser {
        &self.parser
    }

    /// Discover the document's placeholders and check them against `data`.
    ///
    /// Issues no mutation.
    pub async fn validate(
        &self,
        service: &dyn DocumentService,
        document_id: &str,
        data: &DataTree,
    ) -> Result<Vec<Placeholder>> {
        let session = EditSession::new(service, document_id, self.config.read_retries);
        self.validate_session(&session, data).await
    }

    async fn validate_session(
        &self,
        session: &EditSession<'_>,
        data: &DataTree,
    ) -> Result<Vec<Placeholder>> {
        let document = session.fetch().await?;
        let placeholders = self.parser.find_placeholders(&document.plain_text());
        log_state(session, SubstitutionState::Discovered);

        let missing = self
            .parser
            .validate(placeholders.iter().map(|p| p.expr.as_str()), data);
        if !missing.is_empty() {
            log_state(session, SubstitutionState::Rejected);
            return Err(DoctemplifyError::Validation { missing });
        }
        log_state(session, SubstitutionState::Validated);
        Ok(placeholders)
    }

    /// Validate, then replace every placeholder in the document.
    pub async fn substitute(
        &self,
        service: &dyn DocumentService,
        document_id: &str,
        data: &DataTree,
    ) -> Result<SubstitutionReport> {
        let mut session = EditSession::new(service, document_id, self.config.read_retries);
        tracing::info!(document = %document_id, "Substituting placeholders");

        let placeholders = self.validate_session(&session, data).await?;
        let mut warnings = Vec::new();

        for (completed, placeholder) in placeholders.iter().enumerate() {
            log_state(&session, SubstitutionState::Substituting { completed });
            let result = self
                .substitute_one(&mut session, placeholder, data, &mut warnings)
                .await;
            if let Err(err) = result {
                log_state(&session, SubstitutionState::Aborted { completed });
                return Err(DoctemplifyError::SubstitutionAborted {
                    completed,
                    source: Box::new(err),
                });
            }
        }

        log_state(&session, SubstitutionState::Done);
        Ok(SubstitutionReport {
            document_id: document_id.to_string(),
            substituted: placeholders.len(),
            placeholders,
            state: SubstitutionState::Done,
            warnings,
        })
    }

    async fn substitute_one(
        &self,
        session: &mut EditSession<'_>,
        placeholder: &Placeholder,
        data: &DataTree,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<()> {
        match self.resolve(placeholder, data, warnings)? {
            Resolved::Text { text, style } => {
                self.replace_text(session, placeholder, &text, &style, warnings)
                    .await
            }
            Resolved::Image { uri, width, height } => {
                self.swap_image(session, placeholder, &uri, width, height, warnings)
                    .await
            }
        }
    }

    fn resolve(
        &self,
        placeholder: &Placeholder,
        data: &DataTree,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<Resolved> {
        if let Some(key) = placeholder.image_data_key(self.parser.image_marker()) {
            let entry = data.get(&key).ok_or_else(|| DoctemplifyError::Validation {
                missing: vec![key.clone()],
            })?;
            return self.resolve_image(placeholder, entry);
        }

        let name = placeholder.name();
        let value = data
            .resolve(name)
            .ok_or_else(|| DoctemplifyError::Validation {
                missing: vec![name.to_string()],
            })?;

        let (text, style) = match value {
            Value::Object(leaf) => {
                let inner = leaf.get("value").ok_or_else(|| {
                    DoctemplifyError::template_syntax(
                        &placeholder.expr,
                        "object values must have a 'value' key",
                    )
                })?;
                let style = match leaf.get("style") {
                    Some(style) if !style.is_null() => self.styles.compile_value(style),
                    _ => self.compile_inline(placeholder),
                };
                (render_scalar(inner), style)
            }
            other => (render_scalar(other), self.compile_inline(placeholder)),
        };

        for warning in &style.warnings {
            warning.log();
        }
        warnings.extend(style.warnings);
        Ok(Resolved::Text {
            text,
            style: style.descriptor,
        })
    }

    fn compile_inline(&self, placeholder: &Placeholder) -> CompiledStyle {
        placeholder
            .style()
            .map(|s| self.styles.compile(s))
            .unwrap_or_default()
    }

    fn resolve_image(&self, placeholder: &Placeholder, entry: &Value) -> Result<Resolved> {
        let uri = entry.get("url").and_then(Value::as_str).ok_or_else(|| {
            DoctemplifyError::template_syntax(
                &placeholder.expr,
                "image entries must be objects with a 'url' string",
            )
        })?;
        let dimension = |name: &str, default: f64| {
            entry.get(name).and_then(Value::as_f64).unwrap_or(default)
        };
        Ok(Resolved::Image {
            uri: uri.to_string(),
            width: dimension("width", self.config.default_image_width),
            height: dimension("height", self.config.default_image_height),
        })
    }

    /// Replace every occurrence of the token, then style the replacement.
    ///
    /// The styled range is the first occurrence of the replacement text
    /// anywhere in the document. If the same text already appears earlier,
    /// that earlier text is styled instead of the substituted value.
    async fn replace_text(
        &self,
        session: &mut EditSession<'_>,
        placeholder: &Placeholder,
        text: &str,
        style: &StyleDescriptor,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<()> {
        let occurrences = session
            .replace_all(&placeholder.token, text, self.config.match_case)
            .await?;
        if occurrences == 0 {
            push_warning(
                warnings,
                SubstitutionWarning::PlaceholderAbsent {
                    placeholder: placeholder.token.clone(),
                },
            );
            return Ok(());
        }
        if style.is_empty() {
            return Ok(());
        }

        // The replace call does not report where the text landed.
        let document = session.fetch().await?;
        match document.find_text(text) {
            Some(range) => {
                session
                    .apply(&[Request::UpdateTextStyle {
                        range,
                        style: style.clone(),
                    }])
                    .await?;
            }
            None => push_warning(
                warnings,
                SubstitutionWarning::StyleRangeNotFound {
                    placeholder: placeholder.token.clone(),
                    text: text.to_string(),
                },
            ),
        }
        Ok(())
    }

    /// Replace each occurrence of an image placeholder with an inline
    /// image: delete the token, then insert the image at its start.
    async fn swap_image(
        &self,
        session: &mut EditSession<'_>,
        placeholder: &Placeholder,
        uri: &str,
        width: f64,
        height: f64,
        warnings: &mut Vec<SubstitutionWarning>,
    ) -> Result<()> {
        let mut document = session.fetch().await?;
        let occurrences = document.plain_text().matches(&placeholder.token).count();
        if occurrences == 0 {
            push_warning(
                warnings,
                SubstitutionWarning::ImageNotFound {
                    placeholder: placeholder.token.clone(),
                },
            );
            return Ok(());
        }

        for swapped in 0..occurrences {
            if swapped > 0 {
                document = session.fetch().await?;
            }
            let Some(range) = document.find_text(&placeholder.token) else {
                break;
            };
            session
                .apply(&[
                    Request::DeleteContentRange { range },
                    Request::InsertInlineImage {
                        index: range.start_index,
                        uri: uri.to_string(),
                        width,
                        height,
                    },
                ])
                .await?;
            session.tracker.resync_after_deletion(range.start_index);

            let after = session.fetch().await?;
            if let Some(image) = after.find_image(range.start_index) {
                session.tracker.resync(image.start_index + 1);
            }
            document = after;
        }
        Ok(())
    }
}

fn push_warning(warnings: &mut Vec<SubstitutionWarning>, warning: SubstitutionWarning) {
    warning.log();
    warnings.push(warning);
}

fn log_state(session: &EditSession<'_>, state: SubstitutionState) {
    tracing::debug!(document = %session.document_id(), state = %state, "Substitution state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexRange;
    use crate::memory::{MemoryDocumentService, RecordedCall};
    use crate::style::RgbColor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(text: &str, data: Value) -> (MemoryDocumentService, String, Result<SubstitutionReport>) {
        let service = MemoryDocumentService::new();
        let id = service.insert_document("Doc", text);
        let data = DataTree::from_value(data).unwrap();
        let engine = SubstitutionEngine::default();
        let result = pollster::block_on(engine.substitute(&service, &id, &data));
        (service, id, result)
    }

    #[test]
    fn test_simple_replacement() {
        let (service, id, result) = run("Hi {{name}}!", json!({"name": "Ann"}));
        let report = result.unwrap();
        assert_eq!(report.state, SubstitutionState::Done);
        assert_eq!(service.text(&id).unwrap(), "Hi Ann!\n");

        let replaces: Vec<_> = service
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::ReplaceAllText {
                    search,
                    replacement,
                    occurrences,
                    ..
                } => Some((search, replacement, occurrences)),
                _ => None,
            })
            .collect();
        assert_eq!(replaces, vec![("{{name}}".to_string(), "Ann".to_string(), 1)]);
    }

    #[test]
    fn test_missing_key_rejects_without_mutation() {
        let (service, _, result) = run("{{missing.key}}", json!({}));
        match result.unwrap_err() {
            DoctemplifyError::Validation { missing } => assert_eq!(missing, vec!["missing.key"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(service.mutation_count(), 0);
    }

    #[test]
    fn test_every_missing_name_is_reported() {
        let (_, _, result) = run("{{b}} {{a.x}} {{ok}} {{b}}", json!({"ok": 1, "a": 3}));
        match result.unwrap_err() {
            DoctemplifyError::Validation { missing } => assert_eq!(missing, vec!["a.x", "b"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_image_placeholder_is_deleted_then_inserted() {
        let (service, id, result) = run(
            "Logo: {{IMAGE_PLACEHOLDER:logo}}",
            json!({"IMAGE_PLACEHOLDER:logo": {"url": "http://x/y.png"}}),
        );
        result.unwrap();
        assert_eq!(
            service.requests(),
            vec![
                Request::DeleteContentRange {
                    range: IndexRange::new(7, 33),
                },
                Request::InsertInlineImage {
                    index: 7,
                    uri: "http://x/y.png".to_string(),
                    width: 600.0,
                    height: 400.0,
                },
            ]
        );
        let doc = service.snapshot(&id).unwrap();
        assert_eq!(doc.plain_text(), "Logo: \n");
        assert_eq!(doc.find_image(1).map(|i| i.uri.as_str()), Some("http://x/y.png"));
    }

    #[test]
    fn test_repeated_image_placeholder_swaps_every_occurrence() {
        let (service, id, result) = run(
            "{{IMAGE_PLACEHOLDER:i}} and {{IMAGE_PLACEHOLDER:i}}",
            json!({"IMAGE_PLACEHOLDER:i": {"url": "u", "width": 10, "height": 20}}),
        );
        result.unwrap();
        assert_eq!(service.text(&id).unwrap(), " and \n");
        let images = service
            .requests()
            .into_iter()
            .filter(|r| {
                matches!(r, Request::InsertInlineImage { width, height, .. }
                    if *width == 10.0 && *height == 20.0)
            })
            .count();
        assert_eq!(images, 2);
    }

    #[test]
    fn test_inline_style_is_applied_to_replacement() {
        let (service, _, result) = run(
            "Total: {{amount:color:#00ff00;font-weight:bold}}",
            json!({"amount": 42}),
        );
        result.unwrap();
        assert_eq!(
            service.requests(),
            vec![Request::UpdateTextStyle {
                range: IndexRange::new(8, 10),
                style: StyleDescriptor {
                    foreground: Some(RgbColor::from_u8(0, 255, 0)),
                    bold: Some(true),
                    ..StyleDescriptor::default()
                },
            }]
        );
    }

    #[test]
    fn test_leaf_style_overrides_inline_style() {
        let (service, id, result) = run(
            "{{status:font-weight:bold}}",
            json!({"status": {"value": "Paid", "style": "font-style:italic"}}),
        );
        result.unwrap();
        assert_eq!(service.text(&id).unwrap(), "Paid\n");
        match &service.requests()[0] {
            Request::UpdateTextStyle { style, .. } => {
                assert_eq!(style.italic, Some(true));
                assert_eq!(style.bold, None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_leaf_without_style_keeps_inline_style() {
        let (service, _, result) = run(
            "{{status:font-weight:bold}}",
            json!({"status": {"value": "Paid"}}),
        );
        result.unwrap();
        assert!(matches!(
            &service.requests()[0],
            Request::UpdateTextStyle { style, .. } if style.bold == Some(true)
        ));
    }

    #[test]
    fn test_object_without_value_aborts_remaining_queue() {
        let (service, id, result) = run(
            "{{first}} {{broken}} {{last}}",
            json!({"first": "1", "broken": {"nope": 2}, "last": "3"}),
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DoctemplifyError::SubstitutionAborted { completed: 1, .. }
        ));
        assert!(matches!(
            err.root_cause(),
            DoctemplifyError::TemplateSyntax { placeholder, .. } if placeholder == "broken"
        ));
        assert_eq!(service.text(&id).unwrap(), "1 {{broken}} {{last}}\n");
    }

    #[test]
    fn test_failed_write_reports_completed_count() {
        let service = MemoryDocumentService::new();
        let id = service.insert_document("Doc", "{{a}} {{b}}");
        let data = DataTree::from_value(json!({"a": "1", "b": "2"})).unwrap();
        service.fail_next_writes(1);

        let err = pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data))
            .unwrap_err();

        assert!(matches!(
            err,
            DoctemplifyError::SubstitutionAborted { completed: 0, .. }
        ));
        assert!(matches!(err.root_cause(), DoctemplifyError::RemoteApi { .. }));
        assert_eq!(service.text(&id).unwrap(), "{{a}} {{b}}\n");
    }

    #[test]
    fn test_case_folded_replace_leaves_later_placeholder_absent() {
        let service = MemoryDocumentService::new();
        let id = service.insert_document("Doc", "{{a}} {{A}}");
        let data = DataTree::from_value(json!({"a": "x", "A": "y"})).unwrap();
        let engine = SubstitutionEngine::new(EngineConfig {
            match_case: false,
            ..EngineConfig::default()
        });

        let report = pollster::block_on(engine.substitute(&service, &id, &data)).unwrap();

        assert_eq!(
            report.warnings,
            vec![SubstitutionWarning::PlaceholderAbsent {
                placeholder: "{{A}}".to_string(),
            }]
        );
        assert_eq!(report.state, SubstitutionState::Done);
        assert_eq!(report.substituted, 2);
        assert_eq!(service.text(&id).unwrap(), "x x\n");
    }

    #[test]
    fn test_image_consumed_by_earlier_replace_is_a_warning() {
        let service = MemoryDocumentService::new();
        let id = service.insert_document(
            "Doc",
            "{{image_placeholder:logo}} {{IMAGE_PLACEHOLDER:logo}}",
        );
        let data = DataTree::from_value(json!({
            "image_placeholder": "gone",
            "IMAGE_PLACEHOLDER:logo": {"url": "http://x/y.png"},
        }))
        .unwrap();
        let engine = SubstitutionEngine::new(EngineConfig {
            match_case: false,
            ..EngineConfig::default()
        });

        let report = pollster::block_on(engine.substitute(&service, &id, &data)).unwrap();

        assert_eq!(
            report.warnings,
            vec![SubstitutionWarning::ImageNotFound {
                placeholder: "{{IMAGE_PLACEHOLDER:logo}}".to_string(),
            }]
        );
        assert_eq!(report.state, SubstitutionState::Done);
        assert!(
            !service
                .requests()
                .iter()
                .any(|r| matches!(r, Request::InsertInlineImage { .. }))
        );
        assert_eq!(service.text(&id).unwrap(), "gone gone\n");
    }

    #[test]
    fn test_list_index_paths_are_missing_for_validation() {
        let (service, _, result) = run("{{items.0.name}}", json!({"items": [{"name": "x"}]}));
        match result.unwrap_err() {
            DoctemplifyError::Validation { missing } => {
                assert_eq!(missing, vec!["items.0.name".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(service.mutation_count(), 0);
    }

    #[test]
    fn test_style_lands_on_first_match_of_replacement_text() {
        let (service, _, result) = run(
            "Ann wrote to {{name:font-weight:bold}}",
            json!({"name": "Ann"}),
        );
        result.unwrap();
        assert_eq!(
            service.requests(),
            vec![Request::UpdateTextStyle {
                range: IndexRange::new(1, 4),
                style: StyleDescriptor {
                    bold: Some(true),
                    ..StyleDescriptor::default()
                },
            }]
        );
    }

    #[test]
    fn test_null_value_renders_empty() {
        let (service, id, result) = run("[{{note}}]", json!({"note": null}));
        result.unwrap();
        assert_eq!(service.text(&id).unwrap(), "[]\n");
    }

    #[test]
    fn test_unlocatable_style_range_is_a_warning() {
        // An empty replacement cannot be found again to style it.
        let (_, _, result) = run("{{x:font-weight:bold}}", json!({"x": ""}));
        let report = result.unwrap();
        assert_eq!(
            report.warnings,
            vec![SubstitutionWarning::StyleRangeNotFound {
                placeholder: "{{x:font-weight:bold}}".to_string(),
                text: String::new(),
            }]
        );
    }

    #[test]
    fn test_placeholders_are_processed_once_in_document_order() {
        let (service, id, result) = run("{{b}} {{a}} {{b}}", json!({"a": "A", "b": "B"}));
        let report = result.unwrap();
        assert_eq!(report.substituted, 2);
        assert_eq!(service.text(&id).unwrap(), "B A B\n");
        let searches: Vec<_> = service
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::ReplaceAllText { search, .. } => Some(search),
                _ => None,
            })
            .collect();
        assert_eq!(searches, vec!["{{b}}", "{{a}}"]);
    }
}
