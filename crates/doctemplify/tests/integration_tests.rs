/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for doctemplify against the in-memory document service.
 */

use doctemplify::{
    DataTree, DoctemplifyError, DocumentAssembler, DocumentGenerator, EngineConfig, IndexRange,
    MemoryDocumentService, NamedStyle, Permission, RecordedCall, Request, RgbColor,
    StyleDescriptor, SubstitutionEngine, SubstitutionWarning, TemplateDescription,
    TemplateParser,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> std::path::PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", name))
}

fn generator(service: &MemoryDocumentService) -> DocumentGenerator<'_> {
    DocumentGenerator::new(service, service, EngineConfig::default())
}

#[test]
fn test_heading_from_fresh_document() {
    let service = MemoryDocumentService::new();
    let description = TemplateDescription::from_value(json!({
        "h": {"type": "heading", "content": "Title", "level": 1}
    }))
    .unwrap();

    let created =
        pollster::block_on(generator(&service).create_template(&description, "Doc", false))
            .unwrap();

    assert_eq!(created.assembly.cursor, 7);
    assert_eq!(
        service.requests(),
        vec![
            Request::InsertText {
                index: 1,
                text: "Title\n".to_string(),
            },
            Request::UpdateParagraphStyle {
                range: IndexRange::new(1, 7),
                named_style: NamedStyle::Heading(1),
            },
        ]
    );
    assert!(service.permissions(&created.document_id).is_empty());
}

#[test]
fn test_simple_substitution() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "Hi {{name}}!");
    let data = DataTree::from_value(json!({"name": "Ann"})).unwrap();

    pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data)).unwrap();

    let replaces: Vec<_> = service
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RecordedCall::ReplaceAllText { .. }))
        .collect();
    assert_eq!(
        replaces,
        vec![RecordedCall::ReplaceAllText {
            document_id: id.clone(),
            search: "{{name}}".to_string(),
            replacement: "Ann".to_string(),
            occurrences: 1,
        }]
    );
}

#[test]
fn test_validation_failure_issues_no_mutation() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "{{missing.key}}");
    let data = DataTree::from_value(json!({})).unwrap();

    let err = pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data))
        .unwrap_err();

    match err {
        DoctemplifyError::Validation { missing } => {
            assert_eq!(missing, vec!["missing.key".to_string()])
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(service.mutation_count(), 0);
    assert_eq!(service.text(&id).unwrap(), "{{missing.key}}\n");
}

#[test]
fn test_image_placeholder_defaults() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "{{IMAGE_PLACEHOLDER:logo}}");
    let data =
        DataTree::from_value(json!({"IMAGE_PLACEHOLDER:logo": {"url": "http://x/y.png"}})).unwrap();

    pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data)).unwrap();

    assert_eq!(
        service.requests(),
        vec![
            Request::DeleteContentRange {
                range: IndexRange::new(1, 27),
            },
            Request::InsertInlineImage {
                index: 1,
                uri: "http://x/y.png".to_string(),
                width: 600.0,
                height: 400.0,
            },
        ]
    );
}

#[test]
fn test_second_pass_finds_nothing_to_substitute() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "{{Name}}");
    let data = DataTree::from_value(json!({"Name": "Ann"})).unwrap();
    let engine = SubstitutionEngine::new(EngineConfig::default());

    pollster::block_on(engine.substitute(&service, &id, &data)).unwrap();
    let report = pollster::block_on(engine.substitute(&service, &id, &data)).unwrap();

    assert!(report.placeholders.is_empty());
    assert_eq!(report.substituted, 0);
    assert!(report.warnings.is_empty());
    assert_eq!(service.text(&id).unwrap(), "Ann\n");
}

#[test]
fn test_template_round_trip() {
    let service = MemoryDocumentService::new();
    let docs = generator(&service);
    let description = TemplateDescription::from_json_str(&load_fixture("invoice.json")).unwrap();
    let data = DataTree::from_json_str(&load_fixture("invoice-data.json")).unwrap();

    let template =
        pollster::block_on(docs.create_template(&description, "Invoice template", true)).unwrap();
    assert_eq!(template.assembly.elements, 4);
    assert!(template.assembly.warnings.is_empty());
    assert_eq!(
        service.permissions(&template.document_id),
        vec![Permission::public_writer()]
    );

    let template_text = service.text(&template.document_id).unwrap();
    assert_eq!(
        TemplateParser::default().find_parameters(&template_text),
        vec![
            "number",
            "customer.name:font-weight:bold",
            "item.name",
            "item.price",
            "IMAGE_PLACEHOLDER:logo",
        ]
    );

    service.clear_calls();
    let generated = pollster::block_on(docs.generate(&template.document_id, &data, "Invoice 7"))
        .unwrap();

    assert_ne!(generated.document_id, template.document_id);
    assert_eq!(generated.substitution.substituted, 5);
    assert_eq!(
        service.text(&generated.document_id).unwrap(),
        "Invoice 7\nDear Ann,\n\nItem\nPrice\nWidget\n$5\n\n\n"
    );
    // The template itself is untouched.
    assert_eq!(service.text(&template.document_id).unwrap(), template_text);

    assert_eq!(
        service.requests(),
        vec![
            Request::UpdateTextStyle {
                range: IndexRange::new(16, 19),
                style: StyleDescriptor {
                    bold: Some(true),
                    ..StyleDescriptor::default()
                },
            },
            Request::UpdateTextStyle {
                range: IndexRange::new(47, 49),
                style: StyleDescriptor {
                    foreground: Some(RgbColor::from_u8(255, 0, 0)),
                    ..StyleDescriptor::default()
                },
            },
            Request::DeleteContentRange {
                range: IndexRange::new(51, 77),
            },
            Request::InsertInlineImage {
                index: 51,
                uri: "https://example.com/logo.png".to_string(),
                width: 120.0,
                height: 400.0,
            },
        ]
    );
    assert_eq!(
        service.permissions(&generated.document_id),
        vec![Permission::public_writer()]
    );
}

#[test]
fn test_generate_reports_copy_failure() {
    let service = MemoryDocumentService::new();
    let data = DataTree::from_value(json!({})).unwrap();

    let err = pollster::block_on(generator(&service).generate("missing", &data, "Copy"))
        .unwrap_err();

    assert!(matches!(
        err,
        DoctemplifyError::RemoteApi { ref operation, .. } if operation == "files.copy"
    ));
}

#[test]
fn test_unsupported_font_is_reported_not_fatal() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "{{name:font-family:Papyrus Deluxe}}");
    let data = DataTree::from_value(json!({"name": "Ann"})).unwrap();

    let report =
        pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data))
            .unwrap();

    assert_eq!(
        report.warnings,
        vec![SubstitutionWarning::UnsupportedFont {
            font: "Papyrus Deluxe".to_string()
        }]
    );
    // The empty descriptor produces no style request.
    assert!(service.requests().is_empty());
    assert_eq!(service.text(&id).unwrap(), "Ann\n");
}

#[test]
fn test_read_retries_cover_transient_failures() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "Hi {{name}}");
    let data = DataTree::from_value(json!({"name": "Ann"})).unwrap();
    service.fail_next_reads(2);

    pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data)).unwrap();
    assert_eq!(service.text(&id).unwrap(), "Hi Ann\n");

    let strict = SubstitutionEngine::new(EngineConfig {
        read_retries: 0,
        ..EngineConfig::default()
    });
    let other = service.insert_document("Doc", "Hi {{name}}");
    service.fail_next_reads(1);
    let err = pollster::block_on(strict.substitute(&service, &other, &data)).unwrap_err();
    assert!(matches!(err, DoctemplifyError::RemoteApi { .. }));
}

#[test]
fn test_assembly_then_substitution_in_separate_sessions() {
    let service = MemoryDocumentService::new();
    let id = service.insert_document("Doc", "");
    let description = TemplateDescription::from_value(json!({
        "intro": {"type": "text", "content": "Items for {{who}}:"},
        "items": {"type": "list", "items": ["{{first}}", "{{second}}"]},
    }))
    .unwrap();
    pollster::block_on(DocumentAssembler::default().assemble(&service, &id, &description))
        .unwrap();

    let data = DataTree::from_value(json!({"who": "Bo", "first": "apples", "second": 2})).unwrap();
    pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data)).unwrap();

    assert_eq!(service.text(&id).unwrap(), "Items for Bo:\napples\n2\n\n");
}
