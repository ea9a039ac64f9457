use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

use super::relational::{SqlConnection, TableWrite};
use super::sql::{quote_ident, Dialect};
use crate::error::DocgridError;
use crate::model::Value;

/// SQLite backend. Schema names are ignored; decimals are stored as text.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocgridError> {
        Ok(SqliteConnection {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, DocgridError> {
        Ok(SqliteConnection {
            conn: Connection::open_in_memory()?,
        })
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}

impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DocgridError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn existing_columns(&mut self, _schema: &str, table: &str) -> Result<Option<Vec<String>>, DocgridError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    fn write_table(&mut self, write: &TableWrite<'_>) -> Result<Vec<bool>, DocgridError> {
        let tx = self.conn.transaction()?;
        for sql in &write.setup {
            tx.execute_batch(sql)?;
        }
        let mut inserted = Vec::with_capacity(write.rows.len());
        {
            let mut stmt = tx.prepare(&write.insert)?;
            for row in &write.rows {
                let n = stmt.execute(params_from_iter(row.iter().map(|v| to_sql(v))))?;
                inserted.push(n > 0);
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}
