use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::sql::Dialect;
use super::{Destination, DuplicateKey, TableOutcome};
use crate::error::DocgridError;
use crate::model::Value;
use crate::normalize::{join_values, NormalizedDocument};
use crate::schema::{ColumnType, Table, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop and recreate each table on its first write in the run.
    Replace,
    /// Create missing tables and skip rows whose key already exists.
    Append,
}

/// One table write, executed as a single transaction.
#[derive(Debug)]
pub struct TableWrite<'a> {
    /// DDL run before the inserts (drop/create).
    pub setup: Vec<String>,
    pub insert: String,
    /// Types of the insert columns, for typed NULLs.
    pub types: Vec<ColumnType>,
    /// Insert values, serial columns removed.
    pub rows: Vec<Vec<&'a Value>>,
}

/// The small surface a database backend has to provide.
pub trait SqlConnection {
    fn dialect(&self) -> Dialect;

    fn execute_batch(&mut self, sql: &str) -> Result<(), DocgridError>;

    /// Column names of an existing table in ordinal order, or `None` when it does not exist.
    fn existing_columns(&mut self, schema: &str, table: &str) -> Result<Option<Vec<String>>, DocgridError>;

    /// Run setup and inserts in one transaction; returns whether each row was inserted.
    fn write_table(&mut self, write: &TableWrite<'_>) -> Result<Vec<bool>, DocgridError>;
}

/// Open a connection from a URL: `postgres://…`, `postgresql://…`,
/// `postgresql+psycopg2://…`, `sqlite:<path>` or `sqlite::memory:`.
pub fn connect(url: &str) -> Result<Box<dyn SqlConnection>, DocgridError> {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("postgresql+psycopg2://") {
        let url = format!("postgresql://{rest}");
        return Ok(Box::new(super::pg::PostgresConnection::connect(&url)?));
    }
    if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
        return Ok(Box::new(super::pg::PostgresConnection::connect(trimmed)?));
    }
    if let Some(rest) = trimmed.strip_prefix("sqlite:") {
        if rest == ":memory:" {
            return Ok(Box::new(super::sqlite::SqliteConnection::open_in_memory()?));
        }
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return Err(DocgridError::UnsupportedConnection(url.to_string()));
        }
        return Ok(Box::new(super::sqlite::SqliteConnection::open(path)?));
    }
    Err(DocgridError::UnsupportedConnection(url.to_string()))
}

/// Database destination.
pub struct RelationalSink {
    conn: Box<dyn SqlConnection>,
    schema: String,
    mode: WriteMode,
    schema_ready: bool,
    /// Tables already recreated (replace) or checked (append) in this run.
    prepared: HashSet<&'static str>,
    /// Tables whose existing layout does not match; skipped for the rest of the run.
    mismatched: HashMap<&'static str, String>,
}

impl RelationalSink {
    pub fn new(conn: Box<dyn SqlConnection>, schema: &str, mode: WriteMode) -> Self {
        RelationalSink {
            conn,
            schema: schema.to_string(),
            mode,
            schema_ready: false,
            prepared: HashSet::new(),
            mismatched: HashMap::new(),
        }
    }

    pub fn connect(url: &str, schema: &str, mode: WriteMode) -> Result<Self, DocgridError> {
        Ok(RelationalSink::new(connect(url)?, schema, mode))
    }

    fn ensure_schema(&mut self) -> Result<(), DocgridError> {
        if self.schema_ready {
            return Ok(());
        }
        if let Some(sql) = self.conn.dialect().create_schema(&self.schema) {
            self.conn.execute_batch(&sql)?;
        }
        self.schema_ready = true;
        Ok(())
    }

    /// DDL needed before writing `schema`, or the mismatch that blocks it.
    fn setup_for(&mut self, schema: &'static TableSchema) -> Result<Vec<String>, DocgridError> {
        if self.prepared.contains(schema.name) {
            return Ok(Vec::new());
        }

        let dialect = self.conn.dialect();
        let create = dialect.create_table(&self.schema, schema);
        let setup = match self.mode {
            WriteMode::Replace => vec![dialect.drop_table(&self.schema, schema), create],
            WriteMode::Append => match self.conn.existing_columns(&self.schema, schema.name)? {
                None => vec![create],
                Some(found) => {
                    let expected = schema.column_names();
                    if found != expected {
                        let err = DocgridError::SchemaMismatch {
                            table: schema.name.to_string(),
                            expected: expected.join(", "),
                            found: found.join(", "),
                        };
                        self.mismatched.insert(schema.name, err.to_string());
                        return Err(err);
                    }
                    Vec::new()
                }
            },
        };
        Ok(setup)
    }

    fn write_one(&mut self, table: &Table) -> Result<TableOutcome, DocgridError> {
        let schema = table.schema;
        let mut outcome = TableOutcome::new(schema.name);

        if let Some(reason) = self.mismatched.get(schema.name) {
            outcome.error = Some(reason.clone());
            return Ok(outcome);
        }
        let setup = match self.setup_for(schema) {
            Ok(setup) => setup,
            Err(e @ DocgridError::SchemaMismatch { .. }) => {
                warn!(table = schema.name, error = %e, "table skipped");
                outcome.error = Some(e.to_string());
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };

        let insert_idx: Vec<usize> = schema.insert_columns().map(|(i, _)| i).collect();
        let write = TableWrite {
            setup,
            insert: self.conn.dialect().insert(&self.schema, schema),
            types: schema.insert_columns().map(|(_, c)| c.ty).collect(),
            rows: table
                .rows
                .iter()
                .map(|row| insert_idx.iter().filter_map(|&i| row.get(i)).collect())
                .collect(),
        };

        let inserted = self.conn.write_table(&write)?;
        self.prepared.insert(schema.name);

        for (row, ok) in table.rows.iter().zip(&inserted) {
            if *ok {
                outcome.inserted += 1;
            } else {
                outcome.duplicates.push(DuplicateKey {
                    table: schema.name.to_string(),
                    key: join_values(&schema.key_of(row)),
                });
            }
        }
        if !outcome.duplicates.is_empty() {
            warn!(
                table = schema.name,
                duplicates = outcome.duplicates.len(),
                "rows skipped on existing key"
            );
        }
        Ok(outcome)
    }
}

impl Destination for RelationalSink {
    fn name(&self) -> &str {
        match self.conn.dialect() {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    fn write_document(&mut self, doc: &NormalizedDocument) -> Result<Vec<TableOutcome>, DocgridError> {
        self.ensure_schema()?;
        let mut outcomes = Vec::with_capacity(doc.tables.len());
        for table in doc.tables.iter() {
            outcomes.push(self.write_one(table)?);
        }
        info!(
            document = %doc.meta.document_id,
            destination = self.name(),
            inserted = outcomes.iter().map(|o| o.inserted).sum::<usize>(),
            "document written"
        );
        Ok(outcomes)
    }

    fn finish(&mut self) -> Result<(), DocgridError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_unknown_scheme() {
        assert!(matches!(
            connect("mysql://localhost/db"),
            Err(DocgridError::UnsupportedConnection(_))
        ));
        assert!(matches!(
            connect("sqlite:"),
            Err(DocgridError::UnsupportedConnection(_))
        ));
    }

    #[test]
    fn test_connect_sqlite_memory() {
        let conn = connect("sqlite::memory:").unwrap();
        assert_eq!(conn.dialect(), Dialect::Sqlite);
    }
}
