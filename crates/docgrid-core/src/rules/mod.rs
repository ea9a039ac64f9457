pub mod builtin;
pub mod schema;

use crate::error::DocgridError;
use crate::model::DocType;
use regex::Regex;
use schema::{PatternRuleDef, RuleKind, RuleSetDef};
use std::collections::HashSet;
use std::path::Path;

/// Load a ruleset from a JSON file.
pub fn load_ruleset(path: &Path) -> Result<RuleSetDef, DocgridError> {
    let content = std::fs::read_to_string(path).map_err(|e| DocgridError::RulesetLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_ruleset(&content, path)
}

/// Parse a ruleset from a JSON string.
pub fn parse_ruleset(json: &str, source: &Path) -> Result<RuleSetDef, DocgridError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(|e| DocgridError::RulesetLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Parse a ruleset from a JSON string (no file path context).
pub fn parse_ruleset_str(json: &str) -> Result<RuleSetDef, DocgridError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(DocgridError::Json)?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Validate that a ruleset is well-formed.
pub fn validate_ruleset(ruleset: &RuleSetDef) -> Result<(), DocgridError> {
    if ruleset.rules.is_empty() {
        return Err(DocgridError::RulesetInvalid("rules must not be empty".into()));
    }

    let blocks: HashSet<&str> = ruleset
        .rules
        .iter()
        .filter(|r| r.kind == RuleKind::BlockStart)
        .filter_map(|r| r.block.as_deref())
        .collect();

    let mut tags = HashSet::new();
    for rule in &ruleset.rules {
        if rule.tag.trim().is_empty() {
            return Err(DocgridError::RulesetInvalid("rule tag must not be empty".into()));
        }
        if !tags.insert(rule.tag.as_str()) {
            return Err(DocgridError::RulesetInvalid(format!(
                "duplicate rule tag '{}'",
                rule.tag
            )));
        }

        if rule.kind.doc_type() != ruleset.doc_type {
            return Err(DocgridError::RulesetInvalid(format!(
                "rule '{}' has kind '{}' which does not apply to {} documents",
                rule.tag, rule.kind, ruleset.doc_type
            )));
        }

        let re = Regex::new(&rule.pattern).map_err(|e| {
            DocgridError::RulesetInvalid(format!("rule '{}' has an invalid pattern: {}", rule.tag, e))
        })?;

        let groups: HashSet<&str> = re.capture_names().flatten().collect();
        for required in rule.kind.required_groups() {
            if !groups.contains(required) {
                return Err(DocgridError::RulesetInvalid(format!(
                    "rule '{}' ({}) must define the named group '{}'",
                    rule.tag, rule.kind, required
                )));
            }
        }
        if rule.kind == RuleKind::InvoiceRow
            && !["quantity", "unit_price", "total_price"]
                .iter()
                .any(|g| groups.contains(g))
        {
            return Err(DocgridError::RulesetInvalid(format!(
                "rule '{}' must capture at least one of quantity, unit_price, total_price",
                rule.tag
            )));
        }

        if rule.kind == RuleKind::BlockStart && rule.block.as_deref().map_or(true, str::is_empty) {
            return Err(DocgridError::RulesetInvalid(format!(
                "block_start rule '{}' must name the block it opens",
                rule.tag
            )));
        }

        if let Some(ref within) = rule.within {
            if !blocks.contains(within.as_str()) {
                return Err(DocgridError::RulesetInvalid(format!(
                    "rule '{}' is scoped to unknown block '{}'",
                    rule.tag, within
                )));
            }
        }
    }

    Ok(())
}

/// A rule with its pattern compiled, ready for line matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub tag: String,
    pub kind: RuleKind,
    pub regex: Regex,
    pub block: Option<String>,
    pub within: Option<String>,
}

/// A validated ruleset with compiled patterns, in priority order.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    pub name: String,
    pub version: String,
    pub doc_type: DocType,
    pub rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    pub fn compile(def: &RuleSetDef) -> Result<CompiledRuleSet, DocgridError> {
        validate_ruleset(def)?;
        let rules = def
            .rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledRuleSet {
            name: def.name.clone(),
            version: def.version.clone(),
            doc_type: def.doc_type,
            rules,
        })
    }

    /// Rules of one kind, in priority order.
    pub fn of_kind(&self, kind: RuleKind) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }
}

fn compile_rule(def: &PatternRuleDef) -> Result<CompiledRule, DocgridError> {
    let regex = Regex::new(&def.pattern).map_err(|e| {
        DocgridError::RulesetInvalid(format!("rule '{}' has an invalid pattern: {}", def.tag, e))
    })?;
    Ok(CompiledRule {
        tag: def.tag.clone(),
        kind: def.kind,
        regex,
        block: def.block.clone(),
        within: def.within.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ruleset() {
        let json = r#"{
            "name": "Test",
            "version": "1.0",
            "doc_type": "spec",
            "rules": [
                { "tag": "sec", "kind": "section", "pattern": "^(?P<code>\\d+) - (?P<title>.+)$" }
            ]
        }"#;
        let rs = parse_ruleset_str(json).unwrap();
        assert_eq!(rs.name, "Test");
        assert_eq!(rs.rules.len(), 1);
        assert_eq!(rs.rules[0].kind, RuleKind::Section);
    }

    #[test]
    fn test_empty_rules_rejected() {
        let json = r#"{ "name": "Bad", "version": "1.0", "doc_type": "spec", "rules": [] }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_missing_named_group_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "spec",
            "rules": [
                { "tag": "sec", "kind": "section", "pattern": "^(?P<code>\\d+) - .+$" }
            ]
        }"#;
        let err = parse_ruleset_str(json).unwrap_err().to_string();
        assert!(err.contains("title"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "spec",
            "rules": [
                { "tag": "sec", "kind": "list_item", "pattern": "(?P<text>[a-z" }
            ]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "spec",
            "rules": [
                { "tag": "item", "kind": "list_item", "pattern": "^- (?P<text>.+)$" },
                { "tag": "item", "kind": "list_item", "pattern": "^\\* (?P<text>.+)$" }
            ]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_kind_for_other_doc_type_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "invoice",
            "rules": [
                { "tag": "sec", "kind": "section", "pattern": "^(?P<code>\\d+) (?P<title>.+)$" }
            ]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_unknown_block_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "spec",
            "rules": [
                { "tag": "plate", "kind": "detail_plate", "within": "plates",
                  "pattern": "^(?P<code>\\d{4}J) (?P<title>.+)$" }
            ]
        }"#;
        let err = parse_ruleset_str(json).unwrap_err().to_string();
        assert!(err.contains("unknown block"));
    }

    #[test]
    fn test_invoice_row_needs_a_number_group() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "doc_type": "invoice",
            "rules": [
                { "tag": "row", "kind": "invoice_row", "pattern": "^(?P<item>.+)$" }
            ]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }
}
