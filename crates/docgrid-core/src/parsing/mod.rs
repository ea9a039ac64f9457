pub mod invoice;
pub mod metadata;
pub mod spec;

use serde::Serialize;
use tracing::{debug, warn};

use crate::extraction::PageContent;
use crate::model::{CandidateRecord, DocType};
use crate::rules::CompiledRuleSet;
use metadata::MetadataHints;

/// A page-level problem that did not stop the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseWarning {
    pub page_number: usize,
    pub message: String,
}

/// Everything the record parser learned from one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutcome {
    pub candidates: Vec<CandidateRecord>,
    pub warnings: Vec<ParseWarning>,
    pub hints: MetadataHints,
    pub pages_seen: usize,
}

/// Line-by-line parser for one document type.
trait PageParser {
    fn parse_page(&mut self, page: &PageContent, outcome: &mut ParseOutcome);

    fn finish(&mut self, outcome: &mut ParseOutcome);
}

/// Apply a ruleset to a sequence of pages.
///
/// Pages are consumed in order; a degraded page is recorded as a warning
/// and contributes no records.
pub fn parse_pages<I>(pages: I, rules: &CompiledRuleSet) -> ParseOutcome
where
    I: IntoIterator<Item = PageContent>,
{
    let mut parser: Box<dyn PageParser + '_> = match rules.doc_type {
        DocType::Spec => Box::new(spec::SpecParser::new(rules)),
        DocType::Invoice => Box::new(invoice::InvoiceParser::new(rules)),
    };

    let mut outcome = ParseOutcome::default();
    for page in pages {
        outcome.pages_seen += 1;
        if page.degraded {
            warn!(page = page.page_number, "text layer unusable, page skipped");
            outcome.warnings.push(ParseWarning {
                page_number: page.page_number,
                message: "text layer unreadable; page skipped".into(),
            });
            continue;
        }
        let before = outcome.candidates.len();
        parser.parse_page(&page, &mut outcome);
        debug!(
            page = page.page_number,
            records = outcome.candidates.len() - before,
            "page parsed"
        );
    }
    parser.finish(&mut outcome);
    outcome
}
