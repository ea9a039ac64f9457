use postgres::types::ToSql;
use postgres::{Client, NoTls};

use super::relational::{SqlConnection, TableWrite};
use super::sql::Dialect;
use crate::error::DocgridError;
use crate::model::Value;
use crate::schema::ColumnType;

/// PostgreSQL backend over the synchronous `postgres` client.
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    pub fn connect(url: &str) -> Result<Self, DocgridError> {
        let client = Client::connect(url, NoTls)
            .map_err(|e| DocgridError::Database(format!("cannot connect to PostgreSQL: {e}")))?;
        Ok(PostgresConnection { client })
    }
}

/// Bind a cell with the Rust type matching its column, so NULLs are typed too.
fn to_param(value: &Value, ty: ColumnType) -> Box<dyn ToSql + Sync> {
    match ty {
        ColumnType::Serial | ColumnType::Integer => Box::new(match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        }),
        ColumnType::Numeric => Box::new(value.as_decimal()),
        ColumnType::Boolean => Box::new(match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }),
        ColumnType::Text => Box::new(match value {
            Value::Null => None,
            other => Some(other.to_string()),
        }),
    }
}

impl SqlConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DocgridError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn existing_columns(&mut self, schema: &str, table: &str) -> Result<Option<Vec<String>>, DocgridError> {
        let rows = self.client.query(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
            &[&schema, &table],
        )?;
        let columns: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    fn write_table(&mut self, write: &TableWrite<'_>) -> Result<Vec<bool>, DocgridError> {
        let mut tx = self.client.transaction()?;
        for sql in &write.setup {
            tx.batch_execute(sql)?;
        }
        let stmt = tx.prepare(&write.insert)?;
        let mut inserted = Vec::with_capacity(write.rows.len());
        for row in &write.rows {
            let params: Vec<Box<dyn ToSql + Sync>> = row
                .iter()
                .zip(&write.types)
                .map(|(v, ty)| to_param(v, *ty))
                .collect();
            let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
            let n = tx.execute(&stmt, &refs)?;
            inserted.push(n > 0);
        }
        tx.commit()?;
        Ok(inserted)
    }
}
