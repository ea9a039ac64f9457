use docgrid_core::rules::builtin;
use docgrid_core::rules::schema::RuleKind;
use docgrid_core::schema::{INVOICE_TABLES, SPEC_TABLES};
use std::path::Path;

pub fn list() -> Result<(), docgrid_core::error::DocgridError> {
    println!("Available predefined rulesets:\n");
    for name in builtin::PRESETS {
        let rs = builtin::load_preset(name)?;
        println!(
            "  {:<8} {} (v{}) [{}, {} rules]",
            name,
            rs.name,
            rs.version,
            rs.doc_type,
            rs.rules.len()
        );
        if let Some(ref desc) = rs.description {
            println!("           {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn show(preset: &str) -> Result<(), docgrid_core::error::DocgridError> {
    let rs = builtin::load_preset(preset)?;

    println!("{} (version {})\n", rs.name, rs.version);
    if let Some(ref desc) = rs.description {
        println!("{}\n", desc);
    }
    println!(
        "Rules for {} documents, in priority order (first match wins):\n",
        rs.doc_type
    );

    let tag_width = rs.rules.iter().map(|r| r.tag.len()).max().unwrap_or(10);
    for (i, rule) in rs.rules.iter().enumerate() {
        let scope = match (&rule.block, &rule.within) {
            (Some(block), _) => format!("  enters '{block}'"),
            (None, Some(within)) => format!("  within '{within}'"),
            (None, None) => String::new(),
        };
        println!(
            "  {:>2}. {:<width$}  {}{}",
            i + 1,
            rule.tag,
            rule.kind,
            scope,
            width = tag_width
        );
        println!("      {}", rule.pattern);
        if let Some(ref note) = rule.note {
            println!("      {}", note);
        }
    }
    println!();
    Ok(())
}

pub fn schema() -> Result<(), docgrid_core::error::DocgridError> {
    print!(
        r#"JSON Rule Schema
================

A rule file is an ordered list of named patterns. Each line of page text
is tested against the rules top to bottom; the first match wins. Named
capture groups become the fields of the candidate record.

Top-level fields:
  name          (string, required)  Human-readable name of the ruleset
  description   (string, optional)  What this ruleset is for
  version       (string, required)  Version identifier (e.g., "2019.1")
  doc_type      (string, required)  "spec" or "invoice"
  rules         (array, required)   Pattern rules in priority order

Each rule in the "rules" array:
  tag           (string, required)  Unique rule name, recorded on each record
  kind          (string, required)  What a match means (see below)
  pattern       (string, required)  Regular expression (Rust regex syntax)
  block         (string, optional)  Block entered by a block_start rule
  within        (string, optional)  Rule only applies inside this block
  note          (string, optional)  Free-form explanation

Kinds and their required named groups:
"#
    );
    let kinds = [
        RuleKind::BlockStart,
        RuleKind::PlateDomain,
        RuleKind::Section,
        RuleKind::DetailPlate,
        RuleKind::Article,
        RuleKind::ListItem,
        RuleKind::TableHeader,
        RuleKind::TableEnd,
        RuleKind::InvoiceRow,
    ];
    for kind in kinds {
        let groups = kind.required_groups();
        let groups = if groups.is_empty() {
            "-".to_string()
        } else {
            groups.join(", ")
        };
        println!(
            "  {:<14} {:<8} {}",
            kind.to_string(),
            kind.doc_type().to_string(),
            groups
        );
    }
    println!("  (invoice_row also needs one of quantity, unit_price, total_price)");

    print!(
        r#"
Example:
{{
  "name": "Vendor invoices",
  "version": "1.0",
  "doc_type": "invoice",
  "rules": [
    {{ "tag": "end", "kind": "table_end", "pattern": "(?i)^total\\b" }},
    {{ "tag": "header", "kind": "table_header",
       "pattern": "(?i)\\bitem\\b.*\\bqty\\b" }},
    {{ "tag": "row", "kind": "invoice_row",
       "pattern": "^(?P<item>.+?)\\s+(?P<quantity>\\d+)\\s+(?P<unit_price>[\\d.,]+)$" }}
  ]
}}

Target tables:
"#
    );
    for table in SPEC_TABLES.iter().chain(INVOICE_TABLES) {
        println!("  {}", table.name);
        for c in table.columns {
            let key = if table.primary_key.contains(&c.name) {
                " (key)"
            } else {
                ""
            };
            let null = if c.nullable { "" } else { " not null" };
            println!("    {:<16} {}{}{}", c.name, c.ty.as_str(), null, key);
        }
    }
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), docgrid_core::error::DocgridError> {
    let rs = docgrid_core::rules::load_ruleset(file)?;

    println!("Ruleset '{}' (v{}) is valid.", rs.name, rs.version);
    println!("  Document type: {}", rs.doc_type);
    println!("  Rules: {}", rs.rules.len());

    // Check for potential issues (warnings, not errors)
    let mut warnings = Vec::new();
    let has = |kind: RuleKind| rs.rules.iter().any(|r| r.kind == kind);
    if rs.doc_type == docgrid_core::model::DocType::Invoice && !has(RuleKind::TableHeader) {
        warnings.push("no table_header rule: invoice rows are only read inside a table".to_string());
    }
    if rs.doc_type == docgrid_core::model::DocType::Invoice && !has(RuleKind::TableEnd) {
        warnings.push("no table_end rule: tables run to the end of the document".to_string());
    }
    for rule in &rs.rules {
        if rule.kind != RuleKind::BlockStart && rule.block.is_some() {
            warnings.push(format!(
                "rule '{}' sets 'block' but is not a block_start rule; ignored",
                rule.tag
            ));
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
