use docgrid_core::error::DocgridError;
use docgrid_core::extraction::pdftotext::PdftotextExtractor;
use docgrid_core::model::DocType;
use docgrid_core::sink::relational::{RelationalSink, WriteMode};
use docgrid_core::sink::xlsx::XlsxSink;
use docgrid_core::sink::Sink;

use super::{collect_sources, fetcher_for, load_rules};
use crate::output;
use crate::RunArgs;

/// Returns `Ok(false)` when any document failed.
pub fn run(doc_type: DocType, args: &RunArgs) -> Result<bool, DocgridError> {
    let sources = collect_sources(&args.source)?;
    if sources.is_empty() {
        eprintln!("No PDF files found.");
        return Ok(true);
    }
    let rules = load_rules(doc_type, args.rules.as_deref())?;
    let fetcher = fetcher_for(&sources)?;

    let mut sink = Sink::none();
    if let Some(ref path) = args.out_xlsx {
        sink.push(Box::new(XlsxSink::new(path)));
    }
    if let Some(ref url) = args.pg_url {
        let mode = if args.replace {
            WriteMode::Replace
        } else {
            WriteMode::Append
        };
        sink.push(Box::new(RelationalSink::connect(url, &args.schema, mode)?));
    }

    let extractor = PdftotextExtractor::new();
    let report = docgrid_core::run_batch(&sources, doc_type, &fetcher, &extractor, &rules, &mut sink)?;

    match args.output.as_str() {
        "json" => output::json::print(&report)?,
        _ => output::table::print_report(&report),
    }

    Ok(!report.has_failures())
}
