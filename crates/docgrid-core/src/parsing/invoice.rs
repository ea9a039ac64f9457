use std::collections::BTreeMap;
use tracing::debug;

use super::{PageParser, ParseOutcome};
use crate::extraction::table::{Column, ColumnLayout};
use crate::extraction::PageContent;
use crate::model::CandidateRecord;
use crate::normalize::text::collapse_whitespace;
use crate::rules::schema::RuleKind;
use crate::rules::{CompiledRule, CompiledRuleSet};

/// Parser for invoice item grids.
///
/// A header row opens the grid and fixes its column layout. Inside the grid
/// each line either ends it, restarts it with a new header, starts a row, or
/// continues the previous row. Rows may continue across page breaks.
pub struct InvoiceParser<'a> {
    ends: Vec<&'a CompiledRule>,
    headers: Vec<&'a CompiledRule>,
    freeform: Vec<&'a CompiledRule>,
    grid: Option<Grid<'a>>,
    /// Text seen in the grid before its first row.
    leading: Vec<String>,
    pending: Option<CandidateRecord>,
}

struct Grid<'a> {
    header_rule: &'a CompiledRule,
    layout: ColumnLayout,
}

impl<'a> InvoiceParser<'a> {
    pub fn new(rules: &'a CompiledRuleSet) -> Self {
        InvoiceParser {
            ends: rules.of_kind(RuleKind::TableEnd).collect(),
            headers: rules.of_kind(RuleKind::TableHeader).collect(),
            freeform: rules.of_kind(RuleKind::InvoiceRow).collect(),
            grid: None,
            leading: Vec::new(),
            pending: None,
        }
    }

    fn flush(&mut self, outcome: &mut ParseOutcome) {
        if let Some(rec) = self.pending.take() {
            outcome.candidates.push(rec);
        }
    }

    fn header_layout(&self, raw: &str, norm: &str) -> Option<(&'a CompiledRule, ColumnLayout)> {
        let rule = *self.headers.iter().find(|r| r.regex.is_match(norm))?;
        let layout = ColumnLayout::from_header(raw)?;
        Some((rule, layout))
    }

    fn start_row(&mut self, mut rec: CandidateRecord, outcome: &mut ParseOutcome) {
        self.flush(outcome);
        if rec.field("item").is_none() && !self.leading.is_empty() {
            rec.fields.insert("item".into(), self.leading.join(" "));
        }
        self.leading.clear();
        self.pending = Some(rec);
    }

    fn parse_line(&mut self, page_number: usize, raw: &str, outcome: &mut ParseOutcome) {
        let norm = collapse_whitespace(raw);
        if norm.is_empty() {
            return;
        }

        // A priced row never closes the grid, whatever its item is called.
        let closes = self.grid.as_ref().is_some_and(|g| {
            !ColumnLayout::is_item_row(&g.layout.split_row(raw))
                && self.ends.iter().any(|r| r.regex.is_match(&norm))
        });
        if closes {
            debug!(page = page_number, line = %norm, "grid closed");
            self.flush(outcome);
            self.grid = None;
            self.leading.clear();
            return;
        }

        if let Some((header_rule, layout)) = self.header_layout(raw, &norm) {
            debug!(page = page_number, columns = ?layout.columns(), "grid header");
            self.flush(outcome);
            self.leading.clear();
            self.grid = Some(Grid {
                header_rule,
                layout,
            });
            return;
        }

        let Some(grid) = self.grid.as_ref() else {
            return;
        };

        let cells = grid.layout.split_row(raw);
        let structured = ColumnLayout::is_data_row(&cells)
            || (grid.layout.is_piped()
                && raw.contains('|')
                && cells.iter().any(|(c, _)| *c == Column::Item));
        if structured {
            let rec = CandidateRecord {
                page_number,
                tag: grid.header_rule.tag.clone(),
                kind: RuleKind::InvoiceRow,
                raw_text: norm.clone(),
                fields: cells
                    .into_iter()
                    .map(|(c, text)| (c.field().to_string(), text))
                    .collect(),
            };
            self.start_row(rec, outcome);
            return;
        }

        let freeform = self
            .freeform
            .iter()
            .find_map(|r| r.regex.captures(&norm).map(|c| (*r, c)));
        if let Some((rule, caps)) = freeform {
            let fields: BTreeMap<String, String> = rule
                .regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().trim().to_string()))
                })
                .collect();
            let rec = CandidateRecord {
                page_number,
                tag: rule.tag.clone(),
                kind: RuleKind::InvoiceRow,
                raw_text: norm.clone(),
                fields,
            };
            self.start_row(rec, outcome);
            return;
        }

        let target = if grid.layout.has(Column::Description) {
            "description"
        } else {
            "item"
        };
        let piece = if grid.layout.is_piped() {
            norm.trim_matches(|c: char| c == '|' || c.is_whitespace())
                .to_string()
        } else {
            norm.clone()
        };
        match self.pending.as_mut() {
            Some(rec) => {
                let merged = match rec.fields.get(target).filter(|s| !s.trim().is_empty()) {
                    Some(existing) => format!("{} {}", existing, piece),
                    None => piece,
                };
                rec.fields.insert(target.to_string(), merged);
                rec.raw_text.push(' ');
                rec.raw_text.push_str(&norm);
            }
            None => self.leading.push(piece),
        }
    }
}

impl PageParser for InvoiceParser<'_> {
    fn parse_page(&mut self, page: &PageContent, outcome: &mut ParseOutcome) {
        for raw in &page.lines {
            self.parse_line(page.page_number, raw, outcome);
        }
    }

    fn finish(&mut self, outcome: &mut ParseOutcome) {
        self.flush(outcome);
    }
}
