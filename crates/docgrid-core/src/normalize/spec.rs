use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::text::{clean_title, collapse_whitespace, title_tokens};
use super::values::{parse_integer, percent};
use super::{dedupe, DropCause, DroppedRow, NormalizedDocument, Sourced};
use crate::model::{CandidateRecord, DocumentMeta, Value};
use crate::parsing::ParseOutcome;
use crate::rules::schema::RuleKind;
use crate::schema::{
    Table, TableRow, TableSchema, TableSet, DETAIL_PLATES, DOCUMENTS, DOMAIN_DISTRIBUTION,
    EJCDC_ARTICLES, LINE_ITEMS, LINE_ITEM_TOKENS, SPEC_SECTIONS,
};

pub struct DocumentRow {
    pub document_id: String,
    pub title: Option<String>,
    pub edition_year: Option<String>,
    pub jurisdiction: Option<String>,
    pub source_path: Option<String>,
    pub standard_base: Option<String>,
    pub doc_type: String,
    pub page_count: usize,
}

impl TableRow for DocumentRow {
    fn schema() -> &'static TableSchema {
        &DOCUMENTS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.title.clone().into(),
            self.edition_year.clone().into(),
            self.jurisdiction.clone().into(),
            self.source_path.clone().into(),
            self.standard_base.clone().into(),
            self.doc_type.clone().into(),
            self.page_count.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SpecSection {
    pub document_id: String,
    pub section_no: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub page_no: usize,
}

impl TableRow for SpecSection {
    fn schema() -> &'static TableSchema {
        &SPEC_SECTIONS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.section_no.clone().into(),
            self.title.clone().into(),
            self.body.clone().into(),
            self.page_no.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct DetailPlate {
    pub document_id: String,
    pub code: Option<String>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub page_no: usize,
}

impl TableRow for DetailPlate {
    fn schema() -> &'static TableSchema {
        &DETAIL_PLATES
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.code.clone().into(),
            self.title.clone().into(),
            self.domain.clone().into(),
            self.page_no.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct EjcdcArticle {
    pub document_id: String,
    pub article_no: i64,
    pub heading: Option<String>,
    pub page_no: usize,
}

impl TableRow for EjcdcArticle {
    fn schema() -> &'static TableSchema {
        &EJCDC_ARTICLES
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.article_no.into(),
            self.heading.clone().into(),
            self.page_no.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct LineItem {
    pub document_id: String,
    pub code: Option<String>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub item_type: &'static str,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub title_clean: String,
}

impl TableRow for LineItem {
    fn schema() -> &'static TableSchema {
        &LINE_ITEMS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.code.clone().into(),
            self.title.clone().into(),
            self.domain.clone().into(),
            self.item_type.into(),
            self.description.clone().into(),
            self.quantity.into(),
            self.unit_price.into(),
            self.total.into(),
            self.title_clean.clone().into(),
        ]
    }
}

pub struct LineItemToken {
    pub document_id: String,
    pub token: String,
    pub count: usize,
    pub pct_of_items: Decimal,
}

impl TableRow for LineItemToken {
    fn schema() -> &'static TableSchema {
        &LINE_ITEM_TOKENS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.token.clone().into(),
            self.count.into(),
            self.pct_of_items.into(),
        ]
    }
}

pub struct DomainShare {
    pub document_id: String,
    pub domain: String,
    pub count: usize,
    pub pct_of_records: Decimal,
}

impl TableRow for DomainShare {
    fn schema() -> &'static TableSchema {
        &DOMAIN_DISTRIBUTION
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.document_id.clone().into(),
            self.domain.clone().into(),
            self.count.into(),
            self.pct_of_records.into(),
        ]
    }
}

fn text_field(rec: &CandidateRecord, name: &str) -> Option<String> {
    rec.field(name).map(collapse_whitespace)
}

pub fn normalize_spec(mut meta: DocumentMeta, outcome: ParseOutcome) -> NormalizedDocument {
    let ParseOutcome {
        candidates,
        warnings,
        hints,
        ..
    } = outcome;

    meta.title = meta.title.or_else(|| hints.resolved_title());
    meta.edition_year = meta.edition_year.or(hints.edition_year);
    meta.jurisdiction = meta.jurisdiction.or(hints.jurisdiction);
    meta.standard_base = meta.standard_base.or(hints.standard_base);

    let doc_id = meta.document_id.clone();
    let mut dropped = Vec::new();
    let mut sections = Vec::new();
    let mut plates = Vec::new();
    let mut articles = Vec::new();
    let mut list_items = Vec::new();

    for rec in &candidates {
        let page = rec.page_number;
        match rec.kind {
            RuleKind::Section => sections.push(Sourced {
                row: SpecSection {
                    document_id: doc_id.clone(),
                    section_no: text_field(rec, "code"),
                    title: text_field(rec, "title"),
                    body: rec.field("body").map(|b| b.trim().to_string()),
                    page_no: page,
                },
                page,
            }),
            RuleKind::DetailPlate => plates.push(Sourced {
                row: DetailPlate {
                    document_id: doc_id.clone(),
                    code: text_field(rec, "code"),
                    title: text_field(rec, "title"),
                    domain: text_field(rec, "domain"),
                    page_no: page,
                },
                page,
            }),
            RuleKind::Article => {
                let Some(number) = rec.field("number") else {
                    dropped.push(DroppedRow::new(
                        &EJCDC_ARTICLES,
                        page,
                        DropCause::MissingRequiredField,
                        "missing article_no",
                    ));
                    continue;
                };
                match parse_integer(number) {
                    Ok(article_no) => articles.push(Sourced {
                        row: EjcdcArticle {
                            document_id: doc_id.clone(),
                            article_no,
                            heading: text_field(rec, "heading"),
                            page_no: page,
                        },
                        page,
                    }),
                    Err(e) => dropped.push(DroppedRow::new(
                        &EJCDC_ARTICLES,
                        page,
                        DropCause::UnparseableNumber,
                        format!("article_no: {e}"),
                    )),
                }
            }
            RuleKind::ListItem => list_items.push(Sourced {
                row: line_item(&doc_id, None, text_field(rec, "text"), None, "list_item"),
                page,
            }),
            _ => {}
        }
    }

    let sections = dedupe(sections, &mut dropped);
    let plates = dedupe(plates, &mut dropped);
    let articles = dedupe(articles, &mut dropped);

    let mut items: Vec<Sourced<LineItem>> = Vec::new();
    for s in &sections {
        items.push(Sourced {
            row: line_item(&doc_id, s.section_no.clone(), s.title.clone(), None, "spec_section"),
            page: s.page_no,
        });
    }
    for p in &plates {
        items.push(Sourced {
            row: line_item(
                &doc_id,
                p.code.clone(),
                p.title.clone(),
                p.domain.clone(),
                "detail_plate",
            ),
            page: p.page_no,
        });
    }
    items.extend(list_items);
    let items = dedupe(items, &mut dropped);

    let tokens = token_frequencies(&doc_id, &items);
    let distribution = tag_distribution(&doc_id, &candidates);

    let document = DocumentRow {
        document_id: doc_id.clone(),
        title: meta.title.clone(),
        edition_year: meta.edition_year.clone(),
        jurisdiction: meta.jurisdiction.clone(),
        source_path: Some(meta.identifier.clone()).filter(|s| !s.is_empty()),
        standard_base: meta.standard_base.clone(),
        doc_type: "spec".into(),
        page_count: meta.page_count,
    };

    let mut tables = TableSet::default();
    tables.push(Table::from_rows(&[document]));
    tables.push(Table::from_rows(&sections));
    tables.push(Table::from_rows(&plates));
    tables.push(Table::from_rows(&articles));
    tables.push(Table::from_rows(&items));
    tables.push(Table::from_rows(&tokens));
    tables.push(Table::from_rows(&distribution));

    NormalizedDocument {
        meta,
        tables,
        dropped,
        warnings,
        derived_count: 0,
    }
}

fn line_item(
    document_id: &str,
    code: Option<String>,
    title: Option<String>,
    domain: Option<String>,
    item_type: &'static str,
) -> LineItem {
    let title_clean = title.as_deref().map(clean_title).unwrap_or_default();
    LineItem {
        document_id: document_id.to_string(),
        code,
        title,
        domain,
        item_type,
        description: None,
        quantity: None,
        unit_price: None,
        total: None,
        title_clean,
    }
}

/// Token counts over cleaned titles, most frequent first.
fn token_frequencies(document_id: &str, items: &[LineItem]) -> Vec<LineItemToken> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        for tok in title_tokens(&item.title_clean) {
            *counts.entry(tok).or_default() += 1;
        }
    }
    let mut tokens: Vec<LineItemToken> = counts
        .into_iter()
        .map(|(token, count)| LineItemToken {
            document_id: document_id.to_string(),
            token: token.to_string(),
            count,
            pct_of_items: percent(count, items.len()),
        })
        .collect();
    tokens.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.token.cmp(&b.token)));
    tokens
}

/// Candidate records per rule tag, most frequent first.
fn tag_distribution(document_id: &str, candidates: &[CandidateRecord]) -> Vec<DomainShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for rec in candidates {
        *counts.entry(rec.tag.as_str()).or_default() += 1;
    }
    let mut shares: Vec<DomainShare> = counts
        .into_iter()
        .map(|(tag, count)| DomainShare {
            document_id: document_id.to_string(),
            domain: tag.to_string(),
            count,
            pct_of_records: percent(count, candidates.len()),
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocType;
    use rust_decimal_macros::dec;

    fn candidate(page: usize, tag: &str, kind: RuleKind, fields: &[(&str, &str)]) -> CandidateRecord {
        CandidateRecord {
            page_number: page,
            tag: tag.into(),
            kind,
            raw_text: String::new(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn meta() -> DocumentMeta {
        DocumentMeta {
            document_id: "jordan_specs".into(),
            identifier: "specs/jordan_specs.pdf".into(),
            doc_type: Some(DocType::Spec),
            page_count: 3,
            ..Default::default()
        }
    }

    fn outcome(candidates: Vec<CandidateRecord>) -> ParseOutcome {
        ParseOutcome {
            candidates,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_section() {
        let doc = normalize_spec(
            meta(),
            outcome(vec![candidate(
                1,
                "section_heading",
                RuleKind::Section,
                &[("code", "1"), ("title", "General  Provisions")],
            )]),
        );
        let sections = doc.tables.get("spec_sections").unwrap();
        assert_eq!(sections.rows.len(), 1);
        assert_eq!(sections.cell(0, "section_no"), Some(&Value::from("1")));
        assert_eq!(sections.cell(0, "title"), Some(&Value::from("General Provisions")));
        assert_eq!(sections.cell(0, "page_no"), Some(&Value::Integer(1)));
        assert_eq!(doc.tables.row_count("documents"), 1);
        let docs = doc.tables.get("documents").unwrap();
        assert_eq!(docs.cell(0, "page_count"), Some(&Value::Integer(3)));
        assert_eq!(docs.cell(0, "doc_type"), Some(&Value::from("spec")));
    }

    #[test]
    fn test_roman_article_number_dropped() {
        let doc = normalize_spec(
            meta(),
            outcome(vec![
                candidate(2, "ejcdc_article", RuleKind::Article, &[("number", "IV"), ("heading", "Bonds")]),
                candidate(2, "ejcdc_article", RuleKind::Article, &[("number", "5"), ("heading", "Insurance")]),
            ]),
        );
        assert_eq!(doc.tables.row_count("ejcdc_articles"), 1);
        assert_eq!(doc.dropped_by(DropCause::UnparseableNumber), 1);
        assert_eq!(doc.dropped[0].table, "ejcdc_articles");
    }

    #[test]
    fn test_section_key_collision_reported() {
        let doc = normalize_spec(
            meta(),
            outcome(vec![
                candidate(1, "section_code", RuleKind::Section, &[("code", "02510"), ("title", "WATER MAIN")]),
                candidate(9, "section_code", RuleKind::Section, &[("code", "02510"), ("title", "WATER MAIN (CONT.)")]),
            ]),
        );
        assert_eq!(doc.tables.row_count("spec_sections"), 1);
        assert_eq!(doc.dropped_by(DropCause::Duplicate), 1);
        assert_eq!(doc.dropped[0].page, 9);
    }

    #[test]
    fn test_line_items_tokens_and_distribution() {
        let doc = normalize_spec(
            meta(),
            outcome(vec![
                candidate(1, "section_code", RuleKind::Section, &[("code", "02510"), ("title", "Water Main")]),
                candidate(5, "detail_plate", RuleKind::DetailPlate, &[("code", "3001J"), ("title", "Water Main Valves"), ("domain", "WATER")]),
                candidate(5, "detail_plate", RuleKind::DetailPlate, &[("code", "2001J"), ("title", "Curb & Gutter"), ("domain", "STREETS")]),
            ]),
        );

        let items = doc.tables.get("line_items").unwrap();
        assert_eq!(items.rows.len(), 3);
        assert_eq!(items.cell(0, "item_type"), Some(&Value::from("spec_section")));
        assert_eq!(items.cell(1, "domain"), Some(&Value::from("WATER")));
        assert_eq!(items.cell(1, "title_clean"), Some(&Value::from("WATER MAIN VALVE")));
        assert_eq!(items.cell(2, "title_clean"), Some(&Value::from("CURB GUTTER")));

        let tokens = doc.tables.get("line_item_tokens").unwrap();
        assert_eq!(tokens.cell(0, "token"), Some(&Value::from("MAIN")));
        assert_eq!(tokens.cell(0, "count"), Some(&Value::Integer(2)));
        assert_eq!(tokens.cell(0, "pct_of_items"), Some(&Value::Decimal(dec!(66.7))));

        let dist = doc.tables.get("domain_distribution").unwrap();
        assert_eq!(dist.rows.len(), 2);
        assert_eq!(dist.cell(0, "domain"), Some(&Value::from("detail_plate")));
        assert_eq!(dist.cell(0, "count"), Some(&Value::Integer(2)));
        assert_eq!(dist.cell(0, "pct_of_records"), Some(&Value::Decimal(dec!(66.7))));
        assert_eq!(dist.cell(1, "pct_of_records"), Some(&Value::Decimal(dec!(33.3))));
    }

    #[test]
    fn test_metadata_hints_fill_document_row() {
        let mut parsed = outcome(vec![]);
        parsed.hints.observe("Standard Specifications for Construction");
        parsed.hints.observe("2019 Edition");
        let doc = normalize_spec(meta(), parsed);
        let docs = doc.tables.get("documents").unwrap();
        assert_eq!(docs.cell(0, "edition_year"), Some(&Value::from("2019")));
        assert_eq!(
            docs.cell(0, "title"),
            Some(&Value::from("Standard Specifications for Construction"))
        );
        assert_eq!(
            docs.cell(0, "source_path"),
            Some(&Value::from("specs/jordan_specs.pdf"))
        );
    }

    #[test]
    fn test_empty_document_still_has_document_row() {
        let doc = normalize_spec(meta(), outcome(vec![]));
        assert_eq!(doc.tables.len(), 7);
        assert_eq!(doc.tables.row_count("documents"), 1);
        assert_eq!(doc.tables.row_count("spec_sections"), 0);
    }
}
