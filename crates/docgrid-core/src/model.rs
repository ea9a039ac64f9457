use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::rules::schema::RuleKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Spec,
    Invoice,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Spec => write!(f, "spec"),
            DocType::Invoice => write!(f, "invoice"),
        }
    }
}

impl DocType {
    pub fn from_str_loose(s: &str) -> Option<DocType> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "spec" | "specs" | "specification" | "jordan" => Some(DocType::Spec),
            "invoice" | "invoices" => Some(DocType::Invoice),
            _ => None,
        }
    }
}

/// One source PDF, fixed once it has been fetched and extracted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub document_id: String,
    /// File name or URI the document was fetched from.
    pub identifier: String,
    pub doc_type: Option<DocType>,
    pub page_count: usize,
    pub title: Option<String>,
    pub edition_year: Option<String>,
    pub jurisdiction: Option<String>,
    pub standard_base: Option<String>,
}

/// A loosely matched row found on a page, before typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub page_number: usize,
    pub tag: String,
    pub kind: RuleKind,
    pub raw_text: String,
    /// Named captures (or layout cells) keyed by field name.
    pub fields: BTreeMap<String, String>,
}

impl CandidateRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// A typed cell of a normalized row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
