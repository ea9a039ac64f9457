use crate::error::DocgridError;
use crate::model::DocType;
use crate::rules::schema::RuleSetDef;

const SPEC_DEFAULT_JSON: &str = include_str!("../../../../rules/spec-default.json");
const INVOICE_DEFAULT_JSON: &str = include_str!("../../../../rules/invoice-default.json");

/// Available predefined rulesets.
pub const PRESETS: &[&str] = &["spec", "invoice"];

/// Load a predefined ruleset by name.
pub fn load_preset(name: &str) -> Result<RuleSetDef, DocgridError> {
    match name {
        "spec" => Ok(serde_json::from_str(SPEC_DEFAULT_JSON)?),
        "invoice" => Ok(serde_json::from_str(INVOICE_DEFAULT_JSON)?),
        _ => Err(DocgridError::RulesetInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}

/// The preset used when no rule file is given for a document type.
pub fn default_for(doc_type: DocType) -> Result<RuleSetDef, DocgridError> {
    match doc_type {
        DocType::Spec => load_preset("spec"),
        DocType::Invoice => load_preset("invoice"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::validate_ruleset;

    #[test]
    fn test_load_spec_preset() {
        let rs = load_preset("spec").unwrap();
        assert_eq!(rs.doc_type, DocType::Spec);
        assert!(validate_ruleset(&rs).is_ok());
    }

    #[test]
    fn test_load_invoice_preset() {
        let rs = load_preset("invoice").unwrap();
        assert_eq!(rs.doc_type, DocType::Invoice);
        assert!(validate_ruleset(&rs).is_ok());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(load_preset("xyz").is_err());
    }

    #[test]
    fn test_default_for_matches_doc_type() {
        assert_eq!(default_for(DocType::Invoice).unwrap().doc_type, DocType::Invoice);
        assert_eq!(default_for(DocType::Spec).unwrap().doc_type, DocType::Spec);
    }
}
