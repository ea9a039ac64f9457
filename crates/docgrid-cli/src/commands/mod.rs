pub mod parse;
pub mod rules;
pub mod run;

use docgrid_core::error::DocgridError;
use docgrid_core::model::DocType;
use docgrid_core::rules::{builtin, load_ruleset, CompiledRuleSet};
use docgrid_core::source::{expand_input_dir, Fetcher, Source};
use std::path::Path;

use crate::SourceArgs;

/// Resolve the input flags into an ordered list of sources.
pub fn collect_sources(args: &SourceArgs) -> Result<Vec<Source>, DocgridError> {
    if let Some(ref path) = args.pdf {
        return Ok(vec![Source::Local(path.clone())]);
    }
    if let Some(ref uri) = args.s3_uri {
        return Ok(vec![Source::parse_s3_uri(uri)?]);
    }
    if let Some(ref url) = args.url {
        return Ok(vec![Source::Url(url.clone())]);
    }
    match args.input {
        Some(ref dir) => expand_input_dir(dir),
        None => Ok(Vec::new()),
    }
}

/// Only remote sources need the HTTP client.
pub fn fetcher_for(sources: &[Source]) -> Result<Fetcher, DocgridError> {
    if sources.iter().all(|s| matches!(s, Source::Local(_))) {
        Ok(Fetcher::local())
    } else {
        Fetcher::from_env()
    }
}

/// The built-in preset for `doc_type`, or a custom rule file of the same type.
pub fn load_rules(doc_type: DocType, file: Option<&Path>) -> Result<CompiledRuleSet, DocgridError> {
    let def = match file {
        Some(path) => load_ruleset(path)?,
        None => builtin::default_for(doc_type)?,
    };
    if def.doc_type != doc_type {
        return Err(DocgridError::RulesetInvalid(format!(
            "ruleset '{}' is for {} documents, not {}",
            def.name, def.doc_type, doc_type
        )));
    }
    CompiledRuleSet::compile(&def)
}
