//! End-to-end tests for the document pipeline and sinks.
//!
//! Uses a MockExtractor that returns pre-built PageContent without
//! invoking pdftotext, so these tests run without poppler-utils.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use rust_decimal_macros::dec;

use docgrid_core::error::DocgridError;
use docgrid_core::extraction::{PageContent, PageStream, PdfExtractor};
use docgrid_core::model::{DocType, DocumentMeta, Value};
use docgrid_core::normalize::invoice::InvoiceLine;
use docgrid_core::normalize::NormalizedDocument;
use docgrid_core::rules::builtin::load_preset;
use docgrid_core::rules::CompiledRuleSet;
use docgrid_core::schema::{Table, TableSet};
use docgrid_core::sink::relational::{RelationalSink, WriteMode};
use docgrid_core::sink::xlsx::XlsxSink;
use docgrid_core::sink::{Destination, Sink, TableOutcome};
use docgrid_core::source::{FetchedSource, Fetcher, Source};
use docgrid_core::{process_document, run_batch, DocumentStatus};

struct MockExtractor {
    pages: Vec<PageContent>,
}

impl PdfExtractor for MockExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<PageStream, DocgridError> {
        Ok(PageStream::from_pages(self.pages.clone()))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

fn page(number: usize, lines: &[&str]) -> PageContent {
    PageContent::from_text(number, &lines.join("\n"))
}

fn fetched(document_id: &str) -> FetchedSource {
    FetchedSource {
        identifier: format!("{document_id}.pdf"),
        document_id: document_id.to_string(),
        bytes: b"%PDF-1.7".to_vec(),
    }
}

fn rules(preset: &str) -> CompiledRuleSet {
    CompiledRuleSet::compile(&load_preset(preset).unwrap()).unwrap()
}

fn run_spec(document_id: &str, pages: Vec<PageContent>) -> NormalizedDocument {
    process_document(
        &fetched(document_id),
        DocType::Spec,
        &MockExtractor { pages },
        &rules("spec"),
    )
    .unwrap()
}

fn run_invoice(document_id: &str, pages: Vec<PageContent>) -> NormalizedDocument {
    process_document(
        &fetched(document_id),
        DocType::Invoice,
        &MockExtractor { pages },
        &rules("invoice"),
    )
    .unwrap()
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

fn count_rows(path: &Path, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Spec documents
// ---------------------------------------------------------------------------

#[test]
fn spec_section_heading_on_first_page() {
    let doc = run_spec(
        "specs",
        vec![
            page(1, &["Section 1 — General Provisions"]),
            page(2, &[]),
            page(3, &[]),
        ],
    );

    let sections = doc.tables.get("spec_sections").unwrap();
    assert_eq!(sections.rows.len(), 1);
    assert_eq!(sections.cell(0, "section_no"), Some(&Value::from("1")));
    assert_eq!(sections.cell(0, "title"), Some(&Value::from("General Provisions")));
    assert_eq!(sections.cell(0, "page_no"), Some(&Value::Integer(1)));

    let documents = doc.tables.get("documents").unwrap();
    assert_eq!(documents.cell(0, "page_count"), Some(&Value::Integer(3)));
    assert_eq!(documents.cell(0, "doc_type"), Some(&Value::from("spec")));
}

#[test]
fn page_without_matches_still_completes() {
    let doc = run_spec("blank", vec![page(1, &["nothing of interest here"])]);
    assert_eq!(doc.tables.row_count("spec_sections"), 0);
    assert_eq!(doc.tables.row_count("line_items"), 0);
    assert_eq!(doc.tables.row_count("documents"), 1);
    assert!(doc.dropped.is_empty());

    let inv = run_invoice("blank_inv", vec![page(1, &["nothing of interest here"])]);
    assert_eq!(inv.tables.row_count("details_invoice"), 0);
}

#[test]
fn degraded_page_is_flagged_and_skipped() {
    let doc = run_spec(
        "garbled",
        vec![
            page(1, &["Section 1 — General Provisions"]),
            PageContent::from_text(2, "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD} ab"),
            page(3, &["Section 2 — Scope"]),
        ],
    );
    assert_eq!(doc.warnings.len(), 1);
    assert_eq!(doc.warnings[0].page_number, 2);
    assert_eq!(doc.tables.row_count("spec_sections"), 2);
}

#[test]
fn spec_document_produces_all_tables_in_order() {
    let doc = run_spec(
        "jordan",
        vec![
            page(
                1,
                &[
                    "City of Jordan, MN",
                    "Standard Specifications for Utility Construction",
                    "2019 Edition",
                    "Based on EJCDC C-700 (2013)",
                ],
            ),
            page(
                2,
                &[
                    "02510 - WATER MAIN",
                    "Pipe shall be ductile iron.",
                    "02720 - STORM SEWER",
                ],
            ),
            page(
                3,
                &[
                    "STANDARD DETAIL PLATES",
                    "WATER",
                    "3001J  Hydrant Installation",
                    "STREETS",
                    "2001J  Curb & Gutter",
                ],
            ),
        ],
    );

    let names: Vec<&str> = doc.tables.iter().map(|t| t.name()).collect();
    assert_eq!(
        names,
        vec![
            "documents",
            "spec_sections",
            "detail_plates",
            "ejcdc_articles",
            "line_items",
            "line_item_tokens",
            "domain_distribution"
        ]
    );

    let documents = doc.tables.get("documents").unwrap();
    assert_eq!(documents.cell(0, "edition_year"), Some(&Value::from("2019")));

    let plates = doc.tables.get("detail_plates").unwrap();
    assert_eq!(plates.rows.len(), 2);
    assert_eq!(plates.cell(0, "domain"), Some(&Value::from("WATER")));
    assert_eq!(plates.cell(1, "domain"), Some(&Value::from("STREETS")));

    let sections = doc.tables.get("spec_sections").unwrap();
    assert_eq!(
        sections.cell(0, "body"),
        Some(&Value::from("Pipe shall be ductile iron."))
    );
    assert_eq!(doc.tables.row_count("line_items"), 4);
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

fn invoice_pages(total_cell: &str) -> Vec<PageContent> {
    let row = format!("Widget | 8471 | 3 | 10.00 | {total_cell}");
    vec![page(
        1,
        &[
            "TAX INVOICE",
            "Item | HSN | Qty | Unit Price | Total",
            &row,
            "Subtotal | 30.00",
        ],
    )]
}

#[test]
fn invoice_piped_row() {
    let doc = run_invoice("inv_1", invoice_pages("30.00"));
    let table = doc.tables.get("details_invoice").unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.cell(0, "item"), Some(&Value::from("Widget")));
    assert_eq!(table.cell(0, "hsn_code"), Some(&Value::from("8471")));
    assert_eq!(table.cell(0, "quantity"), Some(&Value::Decimal(dec!(3))));
    assert_eq!(table.cell(0, "unit_price"), Some(&Value::Decimal(dec!(10.00))));
    assert_eq!(table.cell(0, "total_price"), Some(&Value::Decimal(dec!(30.00))));
    assert_eq!(table.cell(0, "derived"), Some(&Value::Bool(false)));
}

#[test]
fn invoice_blank_total_is_derived() {
    let doc = run_invoice("inv_2", invoice_pages(""));
    let table = doc.tables.get("details_invoice").unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.cell(0, "total_price"), Some(&Value::Decimal(dec!(30.00))));
    assert_eq!(table.cell(0, "derived"), Some(&Value::Bool(true)));
    assert!(doc.dropped.is_empty());
    assert_eq!(doc.derived_count, 1);
}

#[test]
fn derived_total_equals_quantity_times_price() {
    let doc = run_invoice(
        "inv_law",
        vec![page(
            1,
            &[
                "Item | Qty | Rate | Amount",
                "Cable | 12 | 1,250.50 |",
                "Switch | 0.5 | $99.99 |",
                "Router | 2 | 75.00 | 150.00",
            ],
        )],
    );
    let table = doc.tables.get("details_invoice").unwrap();
    assert_eq!(table.rows.len(), 3);
    for row in 0..table.rows.len() {
        if table.cell(row, "derived") == Some(&Value::Bool(true)) {
            let q = table.cell(row, "quantity").and_then(Value::as_decimal).unwrap();
            let u = table.cell(row, "unit_price").and_then(Value::as_decimal).unwrap();
            let t = table.cell(row, "total_price").and_then(Value::as_decimal).unwrap();
            assert_eq!(t, q * u);
        }
    }
    assert_eq!(doc.derived_count, 2);
}

// ---------------------------------------------------------------------------
// Relational sink (SQLite)
// ---------------------------------------------------------------------------

fn invoice_doc(document_id: &str, count: usize) -> NormalizedDocument {
    let lines: Vec<InvoiceLine> = (1..=count)
        .map(|i| InvoiceLine {
            document_id: document_id.to_string(),
            line_no: i,
            item: Some(format!("Part {i}")),
            description: None,
            hsn_code: None,
            quantity: Some(dec!(1)),
            unit_price: Some(dec!(2.50)),
            total_price: Some(dec!(2.50)),
            derived: false,
            page_no: 1,
        })
        .collect();
    let mut tables = TableSet::default();
    tables.push(Table::from_rows(&lines));
    NormalizedDocument {
        meta: DocumentMeta {
            document_id: document_id.to_string(),
            doc_type: Some(DocType::Invoice),
            ..Default::default()
        },
        tables,
        dropped: vec![],
        warnings: vec![],
        derived_count: 0,
    }
}

#[test]
fn replace_leaves_only_new_batch() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("etl.db");

    let mut append = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Append).unwrap();
    append.write_document(&invoice_doc("old", 100)).unwrap();
    drop(append);
    assert_eq!(count_rows(&db, "details_invoice"), 100);

    let mut replace = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Replace).unwrap();
    let outcomes = replace.write_document(&invoice_doc("new", 3)).unwrap();
    assert_eq!(outcomes[0].inserted, 3);
    drop(replace);
    assert_eq!(count_rows(&db, "details_invoice"), 3);
}

#[test]
fn replace_recreates_each_table_once_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("etl.db");

    let mut replace = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Replace).unwrap();
    replace.write_document(&invoice_doc("a", 2)).unwrap();
    replace.write_document(&invoice_doc("b", 3)).unwrap();
    drop(replace);
    assert_eq!(count_rows(&db, "details_invoice"), 5);
}

#[test]
fn replace_twice_gives_identical_contents() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("etl.db");
    let doc = run_invoice("inv_1", invoice_pages(""));

    let dump = || -> Vec<(i64, String, String, String)> {
        let conn = rusqlite::Connection::open(&db).unwrap();
        let mut stmt = conn
            .prepare("SELECT id, item, quantity, total_price FROM details_invoice ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
            .unwrap();
        let dumped: Vec<_> = rows.map(|r| r.unwrap()).collect();
        dumped
    };

    let mut first = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Replace).unwrap();
    first.write_document(&doc).unwrap();
    drop(first);
    let before = dump();

    let mut second = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Replace).unwrap();
    second.write_document(&doc).unwrap();
    drop(second);

    assert_eq!(before, dump());
    assert_eq!(
        before,
        vec![(1, "Widget".to_string(), "3".to_string(), "30.00".to_string())]
    );
}

#[test]
fn append_reports_duplicate_key_and_commits_rest() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("etl.db");

    let first = run_spec("specs", vec![page(1, &["Section 1 — General Provisions"])]);
    let second = run_spec(
        "specs",
        vec![page(1, &["Section 1 — General Provisions", "Section 2 — Scope"])],
    );

    let mut sink = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Append).unwrap();
    sink.write_document(&first).unwrap();
    let outcomes = sink.write_document(&second).unwrap();
    drop(sink);

    let sections = outcomes.iter().find(|o| o.table == "spec_sections").unwrap();
    assert_eq!(sections.inserted, 1);
    assert_eq!(sections.duplicates.len(), 1);
    assert_eq!(sections.duplicates[0].key, "specs, 1");
    assert_eq!(count_rows(&db, "spec_sections"), 2);
}

#[test]
fn schema_mismatch_blocks_only_that_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("etl.db");
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE documents (document_id TEXT, legacy TEXT)")
            .unwrap();
    }

    let doc = run_spec("specs", vec![page(1, &["Section 1 — General Provisions"])]);
    let mut sink = RelationalSink::connect(&sqlite_url(&db), "public", WriteMode::Append).unwrap();
    let outcomes = sink.write_document(&doc).unwrap();
    drop(sink);

    let documents = outcomes.iter().find(|o| o.table == "documents").unwrap();
    assert!(documents.error.as_deref().unwrap().contains("legacy"));
    assert_eq!(documents.inserted, 0);

    let sections = outcomes.iter().find(|o| o.table == "spec_sections").unwrap();
    assert!(sections.error.is_none());
    assert_eq!(sections.inserted, 1);
    assert_eq!(count_rows(&db, "documents"), 0);
}

// ---------------------------------------------------------------------------
// Spreadsheet sink
// ---------------------------------------------------------------------------

fn workbook_bytes(doc: &NormalizedDocument) -> Vec<u8> {
    let mut sink = XlsxSink::new("unused.xlsx");
    sink.write_document(doc).unwrap();
    sink.to_buffer().unwrap()
}

fn column(range: &calamine::Range<Data>, name: &str) -> usize {
    (0..range.width())
        .find(|&c| matches!(range.get_value((0, c as u32)), Some(Data::String(s)) if s == name))
        .unwrap()
}

#[test]
fn spreadsheet_round_trip_by_column_name() {
    let doc = run_invoice("inv_1", invoice_pages(""));
    let bytes = workbook_bytes(&doc);

    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range("details_invoice").unwrap();

    let cell = |name: &str| range.get_value((1, column(&range, name) as u32)).cloned();
    assert_eq!(cell("id"), Some(Data::Float(1.0)));
    assert_eq!(cell("item"), Some(Data::String("Widget".into())));
    assert_eq!(cell("quantity"), Some(Data::Float(3.0)));
    assert_eq!(cell("unit_price"), Some(Data::Float(10.0)));
    assert_eq!(cell("total_price"), Some(Data::Float(30.0)));
    assert_eq!(cell("derived"), Some(Data::Bool(true)));
    assert!(matches!(cell("description"), None | Some(Data::Empty)));
}

#[test]
fn spreadsheet_is_byte_identical_across_runs() {
    let doc = run_spec("specs", vec![page(1, &["Section 1 — General Provisions"])]);
    assert_eq!(workbook_bytes(&doc), workbook_bytes(&doc));
}

#[test]
fn spreadsheet_has_one_sheet_per_table() {
    let doc = run_spec("specs", vec![page(1, &["Section 1 — General Provisions"])]);
    let workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(workbook_bytes(&doc))).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec![
            "documents",
            "spec_sections",
            "detail_plates",
            "ejcdc_articles",
            "line_items",
            "line_item_tokens",
            "domain_distribution"
        ]
    );
}

// ---------------------------------------------------------------------------
// Batch runs
// ---------------------------------------------------------------------------

#[test]
fn batch_continues_after_failed_document() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.pdf");
    std::fs::write(&good, b"%PDF-1.4").unwrap();
    let out = dir.path().join("out.xlsx");

    let sources = vec![
        Source::Local(dir.path().join("missing.pdf")),
        Source::Local(good),
    ];
    let extractor = MockExtractor {
        pages: invoice_pages("30.00"),
    };
    let mut sink = Sink::none();
    sink.push(Box::new(XlsxSink::new(&out)));

    let report = run_batch(
        &sources,
        DocType::Invoice,
        &Fetcher::local(),
        &extractor,
        &rules("invoice"),
        &mut sink,
    )
    .unwrap();

    assert!(report.has_failures());
    assert!(matches!(report.documents[0].status, DocumentStatus::Failed { .. }));
    let done: Vec<_> = report.completed().collect();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].document_id, "good");
    assert_eq!(done[0].rows, vec![("details_invoice".to_string(), 1)]);
    assert!(out.exists());
}

/// Fails every write of one document.
struct FailOn(&'static str);

impl Destination for FailOn {
    fn name(&self) -> &str {
        "fail-on"
    }

    fn write_document(&mut self, doc: &NormalizedDocument) -> Result<Vec<TableOutcome>, DocgridError> {
        if doc.meta.document_id == self.0 {
            return Err(DocgridError::Database("server closed the connection".into()));
        }
        Ok(vec![])
    }

    fn finish(&mut self) -> Result<(), DocgridError> {
        Ok(())
    }
}

#[test]
fn failed_document_leaves_no_rows_in_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.pdf");
    let good = dir.path().join("good.pdf");
    std::fs::write(&bad, b"%PDF-1.4").unwrap();
    std::fs::write(&good, b"%PDF-1.4").unwrap();
    let out = dir.path().join("out.xlsx");

    let mut sink = Sink::none();
    sink.push(Box::new(XlsxSink::new(&out)));
    sink.push(Box::new(FailOn("bad")));

    let report = run_batch(
        &[Source::Local(bad), Source::Local(good)],
        DocType::Invoice,
        &Fetcher::local(),
        &MockExtractor {
            pages: invoice_pages("30.00"),
        },
        &rules("invoice"),
        &mut sink,
    )
    .unwrap();

    assert!(matches!(report.documents[0].status, DocumentStatus::Failed { .. }));
    assert_eq!(report.completed().count(), 1);

    let mut workbook: Xlsx<_> = calamine::open_workbook(&out).unwrap();
    let range = workbook.worksheet_range("details_invoice").unwrap();
    assert_eq!(range.height(), 2);
    let doc_col = column(&range, "document_id");
    assert_eq!(
        range.get_value((1, doc_col as u32)),
        Some(&Data::String("good".into()))
    );
}

#[test]
fn workbook_parent_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("reports").join("2024").join("invoices.xlsx");
    let mut sink = XlsxSink::new(&out);
    sink.write_document(&run_invoice("inv_1", invoice_pages("30.00"))).unwrap();
    sink.finish().unwrap();
    assert!(out.is_file());
}

#[test]
fn batch_without_destination_still_reports() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("specs.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();

    let report = run_batch(
        &[Source::Local(pdf)],
        DocType::Spec,
        &Fetcher::local(),
        &MockExtractor {
            pages: vec![page(1, &["Section 1 — General Provisions"])],
        },
        &rules("spec"),
        &mut Sink::none(),
    )
    .unwrap();

    assert!(!report.has_failures());
    assert!(report.destinations.is_empty());
    let summary = report.completed().next().unwrap();
    assert!(summary.writes.is_empty());
}
