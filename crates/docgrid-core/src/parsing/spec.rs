use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::{PageParser, ParseOutcome};
use crate::extraction::PageContent;
use crate::model::CandidateRecord;
use crate::normalize::text::collapse_whitespace;
use crate::rules::schema::RuleKind;
use crate::rules::{CompiledRule, CompiledRuleSet};

/// Parser for standard-specification documents.
///
/// Tracks which blocks are open (e.g. the detail plate index), the current
/// plate domain, and the section whose body is being collected.
pub struct SpecParser<'a> {
    rules: &'a CompiledRuleSet,
    active_blocks: HashSet<String>,
    domain: Option<String>,
    open_section: Option<usize>,
    body: Vec<String>,
}

impl<'a> SpecParser<'a> {
    pub fn new(rules: &'a CompiledRuleSet) -> Self {
        SpecParser {
            rules,
            active_blocks: HashSet::new(),
            domain: None,
            open_section: None,
            body: Vec::new(),
        }
    }

    fn applies(&self, rule: &CompiledRule) -> bool {
        rule.within
            .as_ref()
            .map_or(true, |b| self.active_blocks.contains(b))
    }

    fn close_section(&mut self, outcome: &mut ParseOutcome) {
        if let Some(idx) = self.open_section.take() {
            if !self.body.is_empty() {
                if let Some(rec) = outcome.candidates.get_mut(idx) {
                    rec.fields.insert("body".into(), self.body.join("\n"));
                }
            }
        }
        self.body.clear();
    }

    fn parse_line(&mut self, page_number: usize, line: &str, outcome: &mut ParseOutcome) {
        let rules = self.rules;
        let matched = rules
            .rules
            .iter()
            .filter(|r| self.applies(r))
            .find_map(|r| r.regex.captures(line).map(|c| (r, c)));

        let Some((rule, caps)) = matched else {
            if self.open_section.is_some() {
                self.body.push(line.to_string());
            }
            return;
        };

        if !rule.kind.emits_record() {
            match rule.kind {
                RuleKind::BlockStart => {
                    if let Some(ref block) = rule.block {
                        debug!(block = %block, page = page_number, "entering block");
                        self.active_blocks.insert(block.clone());
                    }
                    self.domain = None;
                }
                RuleKind::PlateDomain => {
                    self.domain = caps.name("domain").map(|m| m.as_str().trim().to_uppercase());
                }
                _ => {}
            }
            return;
        }

        let mut fields: BTreeMap<String, String> = rule
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().trim().to_string()))
            })
            .collect();

        if rule.kind == RuleKind::DetailPlate {
            if let Some(ref domain) = self.domain {
                fields.entry("domain".into()).or_insert_with(|| domain.clone());
            }
        }

        if rule.kind == RuleKind::Section {
            self.close_section(outcome);
            self.open_section = Some(outcome.candidates.len());
        }

        outcome.candidates.push(CandidateRecord {
            page_number,
            tag: rule.tag.clone(),
            kind: rule.kind,
            raw_text: line.to_string(),
            fields,
        });
    }
}

impl PageParser for SpecParser<'_> {
    fn parse_page(&mut self, page: &PageContent, outcome: &mut ParseOutcome) {
        for raw in &page.lines {
            let line = collapse_whitespace(raw);
            if line.is_empty() {
                continue;
            }
            outcome.hints.observe(&line);
            self.parse_line(page.page_number, &line, outcome);
        }
    }

    fn finish(&mut self, outcome: &mut ParseOutcome) {
        self.close_section(outcome);
    }
}
