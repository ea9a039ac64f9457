use rust_decimal::Decimal;

use super::text::{collapse_whitespace, lift_inline_hsn, repair_item_name, strip_hsn_label};
use super::values::parse_amount;
use super::{dedupe, DropCause, DroppedRow, NormalizedDocument, Sourced};
use crate::model::{CandidateRecord, DocumentMeta, Value};
use crate::parsing::ParseOutcome;
use crate::schema::{Table, TableRow, TableSchema, TableSet, DETAILS_INVOICE};

/// One invoice line as stored in `details_invoice`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub document_id: String,
    /// Assigned in document order once drops are known.
    pub line_no: usize,
    pub item: Option<String>,
    pub description: Option<String>,
    pub hsn_code: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub derived: bool,
    pub page_no: usize,
}

impl TableRow for InvoiceLine {
    fn schema() -> &'static TableSchema {
        &DETAILS_INVOICE
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Null,
            self.document_id.clone().into(),
            self.line_no.into(),
            self.item.clone().into(),
            self.description.clone().into(),
            self.hsn_code.clone().into(),
            self.quantity.into(),
            self.unit_price.into(),
            self.total_price.into(),
            self.derived.into(),
            self.page_no.into(),
        ]
    }
}

pub fn normalize_invoice(meta: DocumentMeta, outcome: ParseOutcome) -> NormalizedDocument {
    let mut dropped = Vec::new();
    let mut lines = Vec::new();

    for rec in &outcome.candidates {
        match invoice_line(&meta.document_id, rec) {
            Ok(line) => lines.push(Sourced {
                row: line,
                page: rec.page_number,
            }),
            Err(drop) => dropped.push(drop),
        }
    }

    let mut lines = dedupe(lines, &mut dropped);
    for (i, line) in lines.iter_mut().enumerate() {
        line.line_no = i + 1;
    }
    let derived_count = lines.iter().filter(|l| l.derived).count();

    let mut tables = TableSet::default();
    tables.push(Table::from_rows(&lines));

    NormalizedDocument {
        meta,
        tables,
        dropped,
        warnings: outcome.warnings,
        derived_count,
    }
}

/// Type one candidate row, computing the total when it is missing.
pub fn invoice_line(document_id: &str, rec: &CandidateRecord) -> Result<InvoiceLine, DroppedRow> {
    let page = rec.page_number;
    let reject = |cause, detail: String| DroppedRow::new(&DETAILS_INVOICE, page, cause, detail);

    let mut hsn_code = rec.field("hsn_code").and_then(strip_hsn_label);
    let mut item = rec.field("item").map(collapse_whitespace);
    if let Some(name) = item.take() {
        let (rest, inline_code) = lift_inline_hsn(&name);
        if hsn_code.is_none() {
            hsn_code = inline_code;
        }
        item = Some(repair_item_name(&rest)).filter(|s| !s.is_empty());
    }
    let Some(item) = item else {
        return Err(reject(
            DropCause::MissingRequiredField,
            format!("missing item in '{}'", rec.raw_text),
        ));
    };

    let number = |name: &str| {
        rec.field(name)
            .map_or(Ok(None), parse_amount)
            .map_err(|e| reject(DropCause::UnparseableNumber, format!("{name}: {e}")))
    };
    let quantity = number("quantity")?;
    let unit_price = number("unit_price")?;
    let mut total_price = number("total_price")?;

    if quantity.is_none() && unit_price.is_none() && total_price.is_none() {
        return Err(reject(
            DropCause::MissingRequiredField,
            format!("'{item}' has no quantity, unit price or total"),
        ));
    }

    let mut derived = false;
    if total_price.is_none() {
        if let (Some(q), Some(u)) = (quantity, unit_price) {
            let product = q.checked_mul(u).ok_or_else(|| {
                reject(
                    DropCause::UnparseableNumber,
                    format!("total overflow for '{item}': {q} x {u}"),
                )
            })?;
            total_price = Some(product);
            derived = true;
        }
    }

    Ok(InvoiceLine {
        document_id: document_id.to_string(),
        line_no: 0,
        item: Some(item),
        description: rec.field("description").map(collapse_whitespace),
        hsn_code,
        quantity,
        unit_price,
        total_price,
        derived,
        page_no: page,
    })
}
