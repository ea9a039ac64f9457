//! Target table definitions shared by the normalizer and every sink.

use serde::Serialize;

use crate::model::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Database-assigned row id; never supplied on insert.
    Serial,
    Integer,
    Numeric,
    Text,
    Boolean,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Serial => "serial",
            ColumnType::Integer => "integer",
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        nullable: true,
    }
}

const fn req(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        nullable: false,
    }
}

#[derive(Debug, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Columns supplied on insert (everything except serial ids).
    pub fn insert_columns(&self) -> impl Iterator<Item = (usize, &ColumnDef)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.ty != ColumnType::Serial)
    }

    /// Whether the primary key can collide within one document.
    ///
    /// Keys made of a serial id are assigned by the database and never collide.
    pub fn has_natural_key(&self) -> bool {
        !self.primary_key.is_empty()
            && self.primary_key.iter().all(|k| {
                self.columns
                    .iter()
                    .any(|c| c.name == *k && c.ty != ColumnType::Serial)
            })
    }

    /// Primary-key values of a row, in key order.
    pub fn key_of(&self, row: &[Value]) -> Vec<Value> {
        self.primary_key
            .iter()
            .filter_map(|k| self.column_index(k))
            .map(|i| row.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Names of non-nullable columns holding NULL in `row`.
    pub fn missing_required(&self, row: &[Value]) -> Vec<&'static str> {
        self.columns
            .iter()
            .zip(row)
            .filter(|(c, v)| !c.nullable && c.ty != ColumnType::Serial && v.is_null())
            .map(|(c, _)| c.name)
            .collect()
    }
}

use ColumnType::{Boolean, Integer, Numeric, Serial, Text};

pub const DOCUMENTS: TableSchema = TableSchema {
    name: "documents",
    columns: &[
        req("document_id", Text),
        col("title", Text),
        col("edition_year", Text),
        col("jurisdiction", Text),
        col("source_path", Text),
        col("standard_base", Text),
        req("doc_type", Text),
        req("page_count", Integer),
    ],
    primary_key: &["document_id"],
};

pub const SPEC_SECTIONS: TableSchema = TableSchema {
    name: "spec_sections",
    columns: &[
        req("document_id", Text),
        req("section_no", Text),
        req("title", Text),
        col("body", Text),
        req("page_no", Integer),
    ],
    primary_key: &["document_id", "section_no"],
};

pub const DETAIL_PLATES: TableSchema = TableSchema {
    name: "detail_plates",
    columns: &[
        req("document_id", Text),
        req("code", Text),
        req("title", Text),
        col("domain", Text),
        req("page_no", Integer),
    ],
    primary_key: &["document_id", "code"],
};

pub const EJCDC_ARTICLES: TableSchema = TableSchema {
    name: "ejcdc_articles",
    columns: &[
        req("document_id", Text),
        req("article_no", Integer),
        req("heading", Text),
        req("page_no", Integer),
    ],
    primary_key: &[],
};

pub const LINE_ITEMS: TableSchema = TableSchema {
    name: "line_items",
    columns: &[
        req("document_id", Text),
        col("code", Text),
        req("title", Text),
        col("domain", Text),
        req("item_type", Text),
        col("description", Text),
        col("quantity", Numeric),
        col("unit_price", Numeric),
        col("total", Numeric),
        req("title_clean", Text),
    ],
    primary_key: &[],
};

pub const LINE_ITEM_TOKENS: TableSchema = TableSchema {
    name: "line_item_tokens",
    columns: &[
        req("document_id", Text),
        req("token", Text),
        req("count", Integer),
        req("pct_of_items", Numeric),
    ],
    primary_key: &[],
};

pub const DOMAIN_DISTRIBUTION: TableSchema = TableSchema {
    name: "domain_distribution",
    columns: &[
        req("document_id", Text),
        req("domain", Text),
        req("count", Integer),
        req("pct_of_records", Numeric),
    ],
    primary_key: &[],
};

pub const DETAILS_INVOICE: TableSchema = TableSchema {
    name: "details_invoice",
    columns: &[
        req("id", Serial),
        req("document_id", Text),
        req("line_no", Integer),
        req("item", Text),
        col("description", Text),
        col("hsn_code", Text),
        col("quantity", Numeric),
        col("unit_price", Numeric),
        col("total_price", Numeric),
        req("derived", Boolean),
        req("page_no", Integer),
    ],
    primary_key: &["id"],
};

/// Tables written for spec documents, in write order.
pub const SPEC_TABLES: &[&TableSchema] = &[
    &DOCUMENTS,
    &SPEC_SECTIONS,
    &DETAIL_PLATES,
    &EJCDC_ARTICLES,
    &LINE_ITEMS,
    &LINE_ITEM_TOKENS,
    &DOMAIN_DISTRIBUTION,
];

/// Tables written for invoices.
pub const INVOICE_TABLES: &[&TableSchema] = &[&DETAILS_INVOICE];

/// A typed row that knows its table.
pub trait TableRow {
    fn schema() -> &'static TableSchema;

    /// Cell values in schema column order; serial columns are `Value::Null`.
    fn values(&self) -> Vec<Value>;
}

/// Rows of one table for one document.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: &'static TableSchema,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_rows<R: TableRow>(rows: &[R]) -> Self {
        Table {
            schema: R::schema(),
            rows: rows.iter().map(TableRow::values).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Value of a named column in row `row`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let i = self.schema.column_index(column)?;
        self.rows.get(row)?.get(i)
    }
}

/// The tables produced for one document, in write order.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: Vec<Table>,
}

impl TableSet {
    pub fn push(&mut self, table: Table) {
        self.tables.push(table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.get(name).map_or(0, |t| t.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_table_order() {
        let names: Vec<_> = SPEC_TABLES.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "documents",
                "spec_sections",
                "detail_plates",
                "ejcdc_articles",
                "line_items",
                "line_item_tokens",
                "domain_distribution"
            ]
        );
    }

    #[test]
    fn test_sheet_names_fit_excel_limit() {
        for t in SPEC_TABLES.iter().chain(INVOICE_TABLES) {
            assert!(t.name.len() <= 31, "{}", t.name);
        }
    }

    #[test]
    fn test_natural_key() {
        assert!(SPEC_SECTIONS.has_natural_key());
        assert!(!DETAILS_INVOICE.has_natural_key());
        assert!(!LINE_ITEMS.has_natural_key());
    }

    #[test]
    fn test_key_of() {
        let row = vec![
            Value::from("doc"),
            Value::from("01100"),
            Value::from("Summary"),
            Value::Null,
            Value::from(1usize),
        ];
        assert_eq!(
            SPEC_SECTIONS.key_of(&row),
            vec![Value::from("doc"), Value::from("01100")]
        );
    }

    #[test]
    fn test_missing_required_skips_serial() {
        let row = vec![
            Value::Null,
            Value::from("inv"),
            Value::from(1usize),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::from(false),
            Value::from(1usize),
        ];
        assert_eq!(DETAILS_INVOICE.missing_required(&row), vec!["item"]);
    }

    #[test]
    fn test_insert_columns_skip_serial() {
        let names: Vec<_> = DETAILS_INVOICE.insert_columns().map(|(_, c)| c.name).collect();
        assert_eq!(names.first(), Some(&"document_id"));
        assert_eq!(names.len(), DETAILS_INVOICE.columns.len() - 1);
    }
}
