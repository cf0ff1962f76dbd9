//! Integration tests for control-report-core
//!
//! These tests verify the end-to-end workflow:
//! - Composition of the base report and its per-page stamp
//! - Appending attachments, skipping unusable ones
//! - Fallback and scratch cleanup
//! - The async pipeline with mock collaborators

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use control_report_core::{
    Attachment, AttachmentStatus, AttachmentStore, CaseProvider, CaseRecord, Error, MergeConfig,
    MergeOutcome, ReportConfig, ReportGenerator, ReportPipeline, Result, SkipReason,
};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

// =============================================================================
// Test Fixtures
// =============================================================================

/// A PDF with one Letter page per text.
fn create_test_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let page_tree_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        page_tree_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(page_tree_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

fn pdf_attachment(name: &str, text: &str) -> Attachment {
    Attachment::new(name, "application/pdf", create_test_pdf(&[text]))
}

fn generator() -> ReportGenerator {
    ReportGenerator::new(ReportConfig::default()).unwrap()
}

fn generator_with_scratch(scratch_dir: std::path::PathBuf) -> ReportGenerator {
    ReportGenerator::new(ReportConfig {
        merge: MergeConfig {
            max_attachment_bytes: None,
            scratch_dir: Some(scratch_dir),
        },
        ..ReportConfig::default()
    })
    .unwrap()
}

/// Extracted text of every page, in order.
fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    let count = u32::try_from(doc.get_pages().len()).unwrap();
    (1..=count)
        .map(|n| doc.extract_text(&[n]).unwrap())
        .collect()
}

fn sample_case(id: u32) -> CaseRecord {
    CaseRecord {
        city: Some("Bogota".to_string()),
        day: Some(14),
        month: Some(3),
        year: Some(2024),
        student_name: Some("Camila Rojas".to_string()),
        consultant_name: Some("Andres Mora".to_string()),
        document_number: Some("1012345678".to_string()),
        phone: Some("6015550199".to_string()),
        email: Some("andres@example.com".to_string()),
        case_description: Some("Solicita asesoria sobre un contrato de arrendamiento.".to_string()),
        ..CaseRecord::new(id)
    }
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn test_empty_record_two_stamped_pages() {
    let bytes = generator().generate(&CaseRecord::new(7)).unwrap();
    let texts = page_texts(&bytes);

    assert_eq!(texts.len(), 2);
    for text in &texts {
        assert_eq!(text.matches("PDF #").count(), 1, "one stamp per page");
        assert!(text.contains("PDF #7"));
    }
}

#[test]
fn test_set_fields_are_extractable() {
    let bytes = generator().generate(&sample_case(21)).unwrap();
    let text = page_texts(&bytes).concat();

    for value in [
        "Bogota",
        "Camila Rojas",
        "Andres Mora",
        "1012345678",
        "6015550199",
        "andres@example.com",
        "arrendamiento",
    ] {
        assert!(text.contains(value), "missing {value}");
    }
}

#[test]
fn test_malformed_record_json() {
    let result = CaseRecord::from_json(r#"{"ciudad": "Bogota"}"#);
    assert!(matches!(result, Err(Error::MalformedRecord(_))));

    let case = CaseRecord::from_json(r#"{"id": 3, "ciudad": "Bogota", "edad": 40}"#).unwrap();
    assert_eq!(case.city.as_deref(), Some("Bogota"));
    assert_eq!(case.age, Some(40));
}

// =============================================================================
// Attachments
// =============================================================================

#[test]
fn test_no_eligible_attachments_matches_generate() {
    let generator = generator();
    let case = sample_case(3);
    let base = generator.generate(&case).unwrap();

    let none = generator.generate_with_attachments(&case, &[]).unwrap();
    assert_eq!(none, base);

    let photo = Attachment::new("photo.png", "image/png", create_test_pdf(&["hidden"]));
    let report = generator.generate_with_summary(&case, &[photo]).unwrap();
    assert_eq!(report.bytes, base);
    assert_eq!(report.summary.outcome, MergeOutcome::NoAttachments);
    assert_eq!(
        report.summary.attachments[0].status,
        AttachmentStatus::Skipped(SkipReason::NotPdf)
    );
}

#[test]
fn test_attachments_follow_base_pages_in_order() {
    let generator = generator();
    let case = sample_case(11);
    let attachments = [
        pdf_attachment("first.pdf", "Attachment One"),
        pdf_attachment("second.PDF", "Attachment Two"),
        pdf_attachment("third.pdf", "Attachment Three"),
    ];

    let report = generator.generate_with_summary(&case, &attachments).unwrap();
    let texts = page_texts(&report.bytes);

    assert_eq!(report.summary.outcome, MergeOutcome::Merged);
    assert_eq!(texts.len(), 2 + 3);
    assert_eq!(report.summary.total_pages, 5);
    assert!(texts[0].contains("PDF #11"));
    assert!(texts[1].contains("PDF #11"));
    assert!(texts[2].contains("Attachment One"));
    assert!(texts[3].contains("Attachment Two"));
    assert!(texts[4].contains("Attachment Three"));
    assert!(!texts[2].contains("PDF #"), "attachments are not stamped");
}

#[test]
fn test_corrupt_attachment_among_valid_ones() {
    let attachments = [
        pdf_attachment("a.pdf", "Valid A"),
        Attachment::new("corrupt.pdf", "application/pdf", b"definitely not a pdf".to_vec()),
        pdf_attachment("b.pdf", "Valid B"),
    ];

    let report = generator()
        .generate_with_summary(&CaseRecord::new(2), &attachments)
        .unwrap();
    let texts = page_texts(&report.bytes);

    assert_eq!(texts.len(), 4);
    assert!(texts[2].contains("Valid A"));
    assert!(texts[3].contains("Valid B"));
    assert!(matches!(
        report.summary.attachments[1].status,
        AttachmentStatus::Skipped(_)
    ));
    assert_eq!(report.warnings().len(), 1);
}

#[test]
fn test_non_pdf_names_contribute_nothing() {
    let attachments = [
        Attachment::new("scan.pdf.bak", "application/pdf", create_test_pdf(&["Hidden"])),
        pdf_attachment("shown.pdf", "Shown"),
    ];
    let bytes = generator()
        .generate_with_attachments(&CaseRecord::new(5), &attachments)
        .unwrap();
    let texts = page_texts(&bytes);

    assert_eq!(texts.len(), 3);
    assert!(!texts.concat().contains("Hidden"));
}

#[test]
fn test_scratch_files_are_removed() {
    let scratch = tempfile::tempdir().unwrap();
    let generator = generator_with_scratch(scratch.path().to_path_buf());
    let attachments = [
        pdf_attachment("a.pdf", "A"),
        Attachment::new("bad.pdf", "application/pdf", b"%PDF-".to_vec()),
    ];

    generator
        .generate_with_attachments(&CaseRecord::new(1), &attachments)
        .unwrap();
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_fallback_returns_composed_bytes() {
    let scratch = tempfile::tempdir().unwrap();
    let generator = generator_with_scratch(scratch.path().join("missing"));
    let case = CaseRecord::new(8);

    let report = generator
        .generate_with_summary(&case, &[pdf_attachment("a.pdf", "A")])
        .unwrap();

    assert!(matches!(
        report.summary.outcome,
        MergeOutcome::FallbackToComposed(_)
    ));
    assert_eq!(report.bytes, generator.generate(&case).unwrap());
    assert_eq!(report.summary.total_pages, 2);
    assert!(!report.warnings().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_generation_is_independent() {
    let generator = Arc::new(generator());

    let handles: Vec<_> = [31_u32, 32]
        .into_iter()
        .map(|id| {
            let generator = Arc::clone(&generator);
            std::thread::spawn(move || {
                let attachments = [pdf_attachment("a.pdf", &format!("Attachment for {id}"))];
                let bytes = generator
                    .generate_with_attachments(&CaseRecord::new(id), &attachments)
                    .unwrap();
                (id, bytes)
            })
        })
        .collect();

    for handle in handles {
        let (id, bytes) = handle.join().unwrap();
        let texts = page_texts(&bytes);
        let other = if id == 31 { 32 } else { 31 };

        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains(&format!("PDF #{id}")));
        assert!(!texts.concat().contains(&format!("PDF #{other}")));
        assert!(texts[2].contains(&format!("Attachment for {id}")));
    }
}

// =============================================================================
// Pipeline
// =============================================================================

struct MockCases {
    cases: HashMap<u32, CaseRecord>,
}

#[async_trait]
impl CaseProvider for MockCases {
    fn name(&self) -> &'static str {
        "mock-cases"
    }

    async fn fetch_case(&self, id: u32) -> Result<CaseRecord> {
        self.cases.get(&id).cloned().ok_or(Error::CaseNotFound(id))
    }
}

struct MockStore {
    should_fail: bool,
}

#[async_trait]
impl AttachmentStore for MockStore {
    fn name(&self) -> &'static str {
        "mock-store"
    }

    async fn active_attachments(&self, case_id: u32) -> Result<Vec<Attachment>> {
        if self.should_fail {
            return Err(Error::Provider {
                source_name: "mock-store",
                reason: "connection refused".to_string(),
            });
        }
        Ok(vec![pdf_attachment("annex.pdf", &format!("Annex {case_id}"))])
    }
}

fn pipeline(store_fails: bool) -> ReportPipeline {
    let cases = MockCases {
        cases: HashMap::from([(14, sample_case(14))]),
    };
    ReportPipeline::new(
        Arc::new(generator()),
        Arc::new(cases),
        Arc::new(MockStore {
            should_fail: store_fails,
        }),
    )
}

#[tokio::test]
async fn test_pipeline_renders_with_attachments() {
    let report = pipeline(false).render(14).await.unwrap();

    assert_eq!(report.filename, "control_operativo_14_20240314.pdf");
    assert_eq!(report.summary.total_pages, 3);
    assert!(report.warnings.is_empty());
    assert!(page_texts(&report.bytes)[2].contains("Annex 14"));
}

#[tokio::test]
async fn test_pipeline_store_failure_degrades() {
    let report = pipeline(true).render(14).await.unwrap();

    assert_eq!(report.summary.outcome, MergeOutcome::NoAttachments);
    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.warnings.len(), 1);
}

#[tokio::test]
async fn test_pipeline_unknown_case() {
    let result = pipeline(false).render(99).await;
    assert!(matches!(result, Err(Error::CaseNotFound(99))));
}

#[tokio::test]
async fn test_pipeline_concurrent_renders() {
    let pipeline = pipeline(false);
    let results = futures::future::join_all([pipeline.render(14), pipeline.render(14)]).await;

    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first.bytes, second.bytes);
}
