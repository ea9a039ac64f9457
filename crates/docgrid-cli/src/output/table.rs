use docgrid_core::model::DocumentMeta;
use docgrid_core::parsing::ParseOutcome;
use docgrid_core::{BatchReport, DocumentStatus, DocumentSummary};

pub fn print_report(report: &BatchReport) {
    let doc_type = report
        .doc_type
        .map(|d| d.to_string())
        .unwrap_or_else(|| "documents".into());
    let destinations = if report.destinations.is_empty() {
        "none".to_string()
    } else {
        report.destinations.join(", ")
    };
    println!(
        "=== {}: {} document(s), destinations: {} ===\n",
        doc_type,
        report.documents.len(),
        destinations
    );

    for doc in &report.documents {
        match &doc.status {
            DocumentStatus::Completed(summary) => print_summary(summary),
            DocumentStatus::Failed { error } => {
                println!("  {}  FAILED: {}\n", doc.identifier, error);
            }
        }
    }

    let failed = report
        .documents
        .iter()
        .filter(|d| matches!(d.status, DocumentStatus::Failed { .. }))
        .count();
    println!(
        "{} completed, {} failed",
        report.documents.len() - failed,
        failed
    );
}

fn print_summary(summary: &DocumentSummary) {
    println!("  {}  ({} pages)", summary.document_id, summary.page_count);

    let width = summary
        .rows
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(10);
    for (name, count) in &summary.rows {
        println!("    {:<width$}  {:>6}", name, count, width = width);
    }

    if !summary.dropped.is_empty() {
        let causes: Vec<String> = summary
            .dropped_by_cause()
            .iter()
            .map(|(cause, n)| format!("{cause} {n}"))
            .collect();
        println!("    dropped: {} ({})", summary.dropped.len(), causes.join(", "));
    }
    if summary.derived > 0 {
        println!("    derived totals: {}", summary.derived);
    }
    if !summary.warnings.is_empty() {
        let pages: Vec<String> = summary
            .warnings
            .iter()
            .map(|w| w.page_number.to_string())
            .collect();
        println!("    flagged pages: {}", pages.join(", "));
    }

    for write in &summary.writes {
        let inserted: usize = write.tables.iter().map(|t| t.inserted).sum();
        let duplicates: usize = write.tables.iter().map(|t| t.duplicates.len()).sum();
        if duplicates > 0 {
            println!(
                "    {}: {} rows written, {} duplicate keys",
                write.destination, inserted, duplicates
            );
        } else {
            println!("    {}: {} rows written", write.destination, inserted);
        }
        for t in &write.tables {
            if let Some(ref err) = t.error {
                println!("      {}: skipped: {}", t.table, err);
            }
        }
    }
    println!();
}

/// Human-readable listing of the candidates found in one document.
pub fn format_parsed(meta: &DocumentMeta, outcome: &ParseOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== {} ({} pages, {} candidates) ===\n",
        meta.identifier,
        meta.page_count,
        outcome.candidates.len()
    ));

    let hints = &outcome.hints;
    for (label, value) in [
        ("Title", hints.resolved_title()),
        ("Edition", hints.edition_year.clone()),
        ("Jurisdiction", hints.jurisdiction.clone()),
        ("Standard", hints.standard_base.clone()),
    ] {
        if let Some(v) = value {
            out.push_str(&format!("  {label}: {v}\n"));
        }
    }
    out.push('\n');

    let tag_width = outcome
        .candidates
        .iter()
        .map(|c| c.tag.len())
        .max()
        .unwrap_or(8);
    for c in &outcome.candidates {
        let fields: Vec<String> = c
            .fields
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        out.push_str(&format!(
            "  p{:<4} {:<width$}  {}\n",
            c.page_number,
            c.tag,
            fields.join("  "),
            width = tag_width
        ));
    }

    for w in &outcome.warnings {
        out.push_str(&format!("  warning: page {}: {}\n", w.page_number, w.message));
    }
    out
}
