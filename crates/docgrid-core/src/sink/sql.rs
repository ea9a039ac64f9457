//! SQL text for the two supported dialects.

use crate::schema::{ColumnType, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Dialect {
    /// Table name, schema-qualified where the dialect has schemas.
    pub fn qualified(self, schema: &str, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("{}.{}", quote_ident(schema), quote_ident(table)),
            Dialect::Sqlite => quote_ident(table),
        }
    }

    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    /// SQLite keeps numerics as text so decimals round-trip exactly.
    fn column_type(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Postgres, ColumnType::Serial) => "BIGSERIAL",
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Postgres, ColumnType::Numeric) => "NUMERIC",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, ColumnType::Serial) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Numeric) => "TEXT",
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Boolean) => "INTEGER",
        }
    }

    pub fn create_schema(self, schema: &str) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))),
            Dialect::Sqlite => None,
        }
    }

    pub fn drop_table(self, schema: &str, table: &TableSchema) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified(schema, table.name))
    }

    pub fn create_table(self, schema: &str, table: &TableSchema) -> String {
        let mut defs: Vec<String> = Vec::with_capacity(table.columns.len() + 1);
        let mut inline_key = false;
        for c in table.columns {
            let mut def = format!("{} {}", quote_ident(c.name), self.column_type(c.ty));
            if c.ty == ColumnType::Serial && self == Dialect::Sqlite {
                def.push_str(" PRIMARY KEY AUTOINCREMENT");
                inline_key = true;
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            defs.push(def);
        }
        if !table.primary_key.is_empty() && !inline_key {
            let key: Vec<String> = table.primary_key.iter().map(|k| quote_ident(k)).collect();
            defs.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified(schema, table.name),
            defs.join(", ")
        )
    }

    /// Insert statement over the non-serial columns; conflicting rows are skipped.
    pub fn insert(self, schema: &str, table: &TableSchema) -> String {
        let columns: Vec<String> = table
            .insert_columns()
            .map(|(_, c)| quote_ident(c.name))
            .collect();
        let params: Vec<String> = (1..=columns.len()).map(|n| self.placeholder(n)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
            self.qualified(schema, table.name),
            columns.join(", "),
            params.join(", ")
        )
    }
}
