use docgrid_core::error::DocgridError;
use docgrid_core::extraction::pdftotext::PdftotextExtractor;
use docgrid_core::model::DocType;
use std::path::PathBuf;

use super::{collect_sources, fetcher_for, load_rules};
use crate::output;
use crate::SourceArgs;

pub fn run(
    doc_type: &str,
    source: &SourceArgs,
    output_format: &str,
    output_file: Option<PathBuf>,
    rules_file: Option<PathBuf>,
) -> Result<bool, DocgridError> {
    let doc_type = DocType::from_str_loose(doc_type)
        .ok_or_else(|| DocgridError::RulesetInvalid(format!("unknown document type '{doc_type}'")))?;
    let sources = collect_sources(source)?;
    let rules = load_rules(doc_type, rules_file.as_deref())?;
    let fetcher = fetcher_for(&sources)?;
    let extractor = PdftotextExtractor::new();

    let mut parsed = Vec::new();
    let mut all_ok = true;
    for src in &sources {
        let result = fetcher
            .fetch(src)
            .and_then(|f| docgrid_core::parse_document(&f, doc_type, &extractor, &rules));
        match result {
            Ok(doc) => parsed.push(doc),
            Err(e) => {
                tracing::error!(source = %src, error = %e, "parse failed");
                all_ok = false;
            }
        }
    }

    let json = serde_json::to_string_pretty(
        &parsed
            .iter()
            .map(|(meta, outcome)| serde_json::json!({ "document": meta, "parse": outcome }))
            .collect::<Vec<_>>(),
    )?;

    match output_file {
        Some(path) => {
            // Always write JSON when saving to file
            std::fs::write(&path, &json)?;
            let candidates: usize = parsed.iter().map(|(_, o)| o.candidates.len()).sum();
            eprintln!(
                "Parsed {} document(s), {} candidate(s), written to {}",
                parsed.len(),
                candidates,
                path.display()
            );
            for (meta, outcome) in &parsed {
                for w in &outcome.warnings {
                    eprintln!("  warning: {} page {}: {}", meta.document_id, w.page_number, w.message);
                }
            }
        }
        None => match output_format {
            "json" => println!("{json}"),
            _ => {
                for (meta, outcome) in &parsed {
                    println!("{}", output::table::format_parsed(meta, outcome));
                }
            }
        },
    }

    Ok(all_ok)
}
