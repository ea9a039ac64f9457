pub mod invoice;
pub mod spec;
pub mod text;
pub mod values;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use crate::model::{DocType, DocumentMeta, Value};
use crate::parsing::{ParseOutcome, ParseWarning};
use crate::schema::{TableRow, TableSchema, TableSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropCause {
    MissingRequiredField,
    UnparseableNumber,
    Duplicate,
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropCause::MissingRequiredField => write!(f, "missing_required_field"),
            DropCause::UnparseableNumber => write!(f, "unparseable_number"),
            DropCause::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// A candidate that did not become a row, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub table: String,
    pub page: usize,
    pub cause: DropCause,
    pub detail: String,
}

impl DroppedRow {
    pub fn new(
        schema: &TableSchema,
        page: usize,
        cause: DropCause,
        detail: impl Into<String>,
    ) -> Self {
        DroppedRow {
            table: schema.name.to_string(),
            page,
            cause,
            detail: detail.into(),
        }
    }
}

/// A document's typed tables plus everything that was filtered out.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub meta: DocumentMeta,
    pub tables: TableSet,
    pub dropped: Vec<DroppedRow>,
    pub warnings: Vec<ParseWarning>,
    /// Rows whose total was computed rather than read.
    pub derived_count: usize,
}

impl NormalizedDocument {
    pub fn dropped_by(&self, cause: DropCause) -> usize {
        self.dropped.iter().filter(|d| d.cause == cause).count()
    }
}

/// Turn parsed candidates into typed table rows for the document's type.
pub fn normalize(mut meta: DocumentMeta, outcome: ParseOutcome) -> NormalizedDocument {
    let doc = match meta.doc_type {
        Some(DocType::Invoice) => invoice::normalize_invoice(meta, outcome),
        _ => {
            meta.doc_type = Some(DocType::Spec);
            spec::normalize_spec(meta, outcome)
        }
    };
    info!(
        document = %doc.meta.document_id,
        rows = doc.tables.iter().map(|t| t.rows.len()).sum::<usize>(),
        dropped = doc.dropped.len(),
        derived = doc.derived_count,
        "document normalized"
    );
    doc
}

/// A typed row paired with the page it came from.
pub(crate) struct Sourced<R> {
    pub row: R,
    pub page: usize,
}

/// Drop rows that break non-null constraints, then exact duplicates and
/// primary-key collisions. The first occurrence wins.
pub(crate) fn dedupe<R: TableRow>(rows: Vec<Sourced<R>>, dropped: &mut Vec<DroppedRow>) -> Vec<R> {
    let schema = R::schema();
    let natural_key = schema.has_natural_key();
    let mut seen_rows: HashSet<Vec<Value>> = HashSet::new();
    let mut seen_keys: HashSet<Vec<Value>> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for Sourced { row, page } in rows {
        let values = row.values();

        let missing = schema.missing_required(&values);
        if !missing.is_empty() {
            dropped.push(DroppedRow::new(
                schema,
                page,
                DropCause::MissingRequiredField,
                format!("missing {}", missing.join(", ")),
            ));
            continue;
        }

        if seen_rows.contains(&values) {
            debug!(table = schema.name, page, "exact duplicate dropped");
            dropped.push(DroppedRow::new(
                schema,
                page,
                DropCause::Duplicate,
                "exact duplicate row",
            ));
            continue;
        }

        if natural_key {
            let key = schema.key_of(&values);
            if !seen_keys.insert(key.clone()) {
                dropped.push(DroppedRow::new(
                    schema,
                    page,
                    DropCause::Duplicate,
                    format!("duplicate key ({})", join_values(&key)),
                ));
                continue;
            }
        }

        seen_rows.insert(values);
        kept.push(row);
    }
    kept
}

pub(crate) fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
