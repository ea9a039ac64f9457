pub mod error;
pub mod extraction;
pub mod model;
pub mod normalize;
pub mod parsing;
pub mod rules;
pub mod schema;
pub mod sink;
pub mod source;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, info_span, warn};

use error::DocgridError;
use extraction::PdfExtractor;
use model::{DocType, DocumentMeta};
use normalize::{DroppedRow, NormalizedDocument};
use parsing::{ParseOutcome, ParseWarning};
use rules::CompiledRuleSet;
use sink::{Sink, WriteReport};
use source::{FetchedSource, Fetcher, Source};

/// Extract and parse one fetched document without normalizing it.
pub fn parse_document(
    fetched: &FetchedSource,
    doc_type: DocType,
    extractor: &dyn PdfExtractor,
    rules: &CompiledRuleSet,
) -> Result<(DocumentMeta, ParseOutcome), DocgridError> {
    let pages = extractor.extract_pages(&fetched.bytes)?;
    let page_count = pages.page_count();
    info!(
        document = %fetched.document_id,
        backend = extractor.backend_name(),
        pages = page_count,
        "text extracted"
    );

    let outcome = parsing::parse_pages(pages, rules);
    let meta = DocumentMeta {
        document_id: fetched.document_id.clone(),
        identifier: fetched.identifier.clone(),
        doc_type: Some(doc_type),
        page_count,
        ..Default::default()
    };
    Ok((meta, outcome))
}

/// Main API entry point: turn one fetched PDF into typed tables.
pub fn process_document(
    fetched: &FetchedSource,
    doc_type: DocType,
    extractor: &dyn PdfExtractor,
    rules: &CompiledRuleSet,
) -> Result<NormalizedDocument, DocgridError> {
    let (meta, outcome) = parse_document(fetched, doc_type, extractor, rules)?;
    Ok(normalize::normalize(meta, outcome))
}

/// Per-document summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub page_count: usize,
    /// Row counts per table, in write order.
    pub rows: Vec<(String, usize)>,
    pub dropped: Vec<DroppedRow>,
    pub derived: usize,
    pub warnings: Vec<ParseWarning>,
    pub writes: Vec<WriteReport>,
}

impl DocumentSummary {
    fn new(doc: &NormalizedDocument, writes: Vec<WriteReport>) -> Self {
        DocumentSummary {
            document_id: doc.meta.document_id.clone(),
            page_count: doc.meta.page_count,
            rows: doc
                .tables
                .iter()
                .map(|t| (t.name().to_string(), t.rows.len()))
                .collect(),
            dropped: doc.dropped.clone(),
            derived: doc.derived_count,
            warnings: doc.warnings.clone(),
            writes,
        }
    }

    /// Dropped rows counted by cause.
    pub fn dropped_by_cause(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.dropped {
            *counts.entry(d.cause.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn duplicate_keys(&self) -> usize {
        self.writes
            .iter()
            .flat_map(|w| &w.tables)
            .map(|t| t.duplicates.len())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Completed(DocumentSummary),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub identifier: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

/// Outcome of a whole run, one entry per input in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub doc_type: Option<DocType>,
    pub destinations: Vec<String>,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.documents
            .iter()
            .any(|d| matches!(d.status, DocumentStatus::Failed { .. }))
    }

    pub fn completed(&self) -> impl Iterator<Item = &DocumentSummary> {
        self.documents.iter().filter_map(|d| match &d.status {
            DocumentStatus::Completed(s) => Some(s),
            DocumentStatus::Failed { .. } => None,
        })
    }
}

/// Process every source in order, writing each document before the next is fetched.
///
/// Document-level failures are recorded and the batch moves on; only a
/// failure to finalize the sink aborts the run.
pub fn run_batch(
    sources: &[Source],
    doc_type: DocType,
    fetcher: &Fetcher,
    extractor: &dyn PdfExtractor,
    rules: &CompiledRuleSet,
    sink: &mut Sink,
) -> Result<BatchReport, DocgridError> {
    if sink.is_empty() {
        warn!("no destination configured; results are only summarized");
    }

    let mut report = BatchReport {
        doc_type: Some(doc_type),
        destinations: sink.destination_names(),
        documents: Vec::with_capacity(sources.len()),
    };

    for source in sources {
        let identifier = source.identifier();
        let span = info_span!("document", source = %identifier);
        let _guard = span.enter();

        let result = fetcher
            .fetch(source)
            .and_then(|fetched| process_document(&fetched, doc_type, extractor, rules))
            .and_then(|doc| {
                let writes = sink.write(&doc)?;
                Ok(DocumentSummary::new(&doc, writes))
            });

        let status = match result {
            Ok(summary) => DocumentStatus::Completed(summary),
            Err(e) => {
                error!(error = %e, "document failed");
                DocumentStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        report.documents.push(DocumentReport { identifier, status });
    }

    sink.finish()?;
    Ok(report)
}
