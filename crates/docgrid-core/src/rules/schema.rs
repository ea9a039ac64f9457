use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::DocType;

/// An ordered set of pattern rules for one document type.
///
/// Rules are evaluated top to bottom; the first rule that matches a line wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub doc_type: DocType,
    pub rules: Vec<PatternRuleDef>,
}

/// A single named predicate + extractor pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRuleDef {
    /// Unique rule name, recorded on every candidate the rule produces.
    pub tag: String,
    pub kind: RuleKind,
    /// Regular expression; named groups become candidate fields.
    pub pattern: String,
    /// Block entered by a `block_start` rule.
    #[serde(default)]
    pub block: Option<String>,
    /// Rule only applies while this block is active.
    #[serde(default)]
    pub within: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    BlockStart,
    PlateDomain,
    Section,
    DetailPlate,
    Article,
    ListItem,
    TableHeader,
    TableEnd,
    InvoiceRow,
}

impl RuleKind {
    pub fn doc_type(&self) -> DocType {
        match self {
            RuleKind::BlockStart
            | RuleKind::PlateDomain
            | RuleKind::Section
            | RuleKind::DetailPlate
            | RuleKind::Article
            | RuleKind::ListItem => DocType::Spec,
            RuleKind::TableHeader | RuleKind::TableEnd | RuleKind::InvoiceRow => DocType::Invoice,
        }
    }

    /// Named groups the pattern must define for the extractor to work.
    pub fn required_groups(&self) -> &'static [&'static str] {
        match self {
            RuleKind::Section | RuleKind::DetailPlate => &["code", "title"],
            RuleKind::PlateDomain => &["domain"],
            RuleKind::Article => &["number", "heading"],
            RuleKind::ListItem => &["text"],
            RuleKind::InvoiceRow => &["item"],
            RuleKind::BlockStart | RuleKind::TableHeader | RuleKind::TableEnd => &[],
        }
    }

    /// Whether matches of this kind become candidate records.
    ///
    /// Context kinds only steer the parser.
    pub fn emits_record(&self) -> bool {
        !matches!(
            self,
            RuleKind::BlockStart | RuleKind::PlateDomain | RuleKind::TableHeader | RuleKind::TableEnd
        )
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleKind::BlockStart => "block_start",
            RuleKind::PlateDomain => "plate_domain",
            RuleKind::Section => "section",
            RuleKind::DetailPlate => "detail_plate",
            RuleKind::Article => "article",
            RuleKind::ListItem => "list_item",
            RuleKind::TableHeader => "table_header",
            RuleKind::TableEnd => "table_end",
            RuleKind::InvoiceRow => "invoice_row",
        };
        write!(f, "{s}")
    }
}
