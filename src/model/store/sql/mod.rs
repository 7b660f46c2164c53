pub mod images;
pub mod people;
pub mod embeddings;

use rusqlite::{params_from_iter, ParamsFromIter, ToSql};
use tokio_rusqlite::Connection;

use crate::tools::log::{log_info, LogServiceType};

use super::super::error::Result;


pub async fn migrate_database(connection: &Connection) -> Result<usize> {
    let version = connection.call( |conn| {
        let mut version = conn.query_row(
            "SELECT user_version FROM pragma_user_version;",
            [],
            |row| {
                let version: usize = row.get(0)?;
                Ok(version)
            })?;

            if version < 1 {
                apply_initial_schema(conn)?;
                version = 1;
                conn.pragma_update(None, "user_version", version)?;
                log_info(LogServiceType::Database, format!("Update Database to version: {}", version));
            }

            Ok(version)
    }).await?;

    Ok(version)
}

/// The initial schema only uses `IF NOT EXISTS` statements so it doubles as
/// the repair path when a table goes missing at runtime.
pub fn apply_initial_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let initial = String::from_utf8_lossy(include_bytes!("001 - INITIAL.sql"));
    conn.execute_batch(&initial)
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}


pub enum QueryWhereType<'a> {
    Like(&'a str, &'a dyn ToSql),
    Equal(&'a str, &'a dyn ToSql),
    After(&'a str, &'a dyn ToSql),
    Before(&'a str, &'a dyn ToSql),
    Static(String),
}

impl<'a> QueryWhereType<'a> {
    pub fn expand(&'a self) -> (String, Vec<&'a dyn ToSql>) {
        let mut values: Vec<&'a dyn ToSql> = vec![];
        let text = match self {
            QueryWhereType::Equal(name, value) => {
                values.push(value);
                format!("{} = ?", name)
            },
            QueryWhereType::Like(name, value) => {
                values.push(value);
                format!("{} like ?", name)
            },
            QueryWhereType::After(name, value) => {
                values.push(value);
                format!("{} > ?", name)
            },
            QueryWhereType::Before(name, value) => {
                values.push(value);
                format!("{} < ?", name)
            },
            QueryWhereType::Static(s) => {
                s.to_string()
            },
        };
        (text, values)
    }
}

pub enum SqlOrder {
    ASC,
    DESC
}

pub struct OrderBuilder {
    column: String,
    order: SqlOrder
}

impl OrderBuilder {
    pub fn new(column: String, order: SqlOrder) -> Self {
        OrderBuilder { column, order }
    }
    pub fn format(&self) -> String {
        match self.order {
            SqlOrder::ASC => self.column.clone(),
            SqlOrder::DESC => format!("{} DESC", self.column),
        }
    }
}

pub struct QueryBuilder<'a> {

    wheres: Vec<QueryWhereType<'a>>,

    columns_update: Vec<String>,
    values_update: Vec<&'a dyn ToSql>,

    columns_orders: Vec<OrderBuilder>,
}

impl <'a> QueryBuilder<'a> {
    pub fn new() -> Self {
        Self {
            wheres: Vec::new(),
            columns_update: Vec::new(),
            values_update: Vec::new(),
            columns_orders: Vec::new()
        }
    }

    pub fn add_update<T: ToSql>(&mut self, optional: &'a Option<T>, column: &str)  {
        if let Some(value) = optional {
            self.columns_update.push(format!("{} = ?", column));
            self.values_update.push(value);
        }
    }

    pub fn add_where(&mut self, kind: QueryWhereType<'a>) {
        self.wheres.push(kind);
    }

    pub fn has_updates(&self) -> bool {
        !self.columns_update.is_empty()
    }

    pub fn format_update(&self) -> String {
        if !self.columns_update.is_empty() {
            self.columns_update.join(", ")
        } else {
            "".to_string()
        }
    }

    pub fn format(&self) -> String {
        if !self.wheres.is_empty() {
            let mut columns = vec![];
            for w in &self.wheres {
                let (t, _) = w.expand();
                columns.push(t);
            }
            format!("WHERE {}", columns.join(" and "))
        } else {
            "".to_string()
        }
    }

    pub fn add_oder(&mut self, order: OrderBuilder) {
        self.columns_orders.push(order);
    }

    pub fn format_order(&self) -> String {
        if !self.columns_orders.is_empty() {
            format!(" ORDER BY {}", self.columns_orders.iter().map(|o| o.format()).collect::<Vec<String>>().join(", "))
        } else {
            "".to_string()
        }
    }

    pub fn values(&'a mut self) -> ParamsFromIter<&Vec<&'a (dyn ToSql + 'a)>> {
        let all_values = &mut self.values_update;

        for w in &self.wheres {
            let (_, mut v) = w.expand();
            all_values.append(&mut v);
        }
        params_from_iter(all_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_roundtrip() {
        let embedding = vec![0.25f32, -1.5, 3.0, f32::MIN_POSITIVE];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn query_builder_formats_wheres_and_updates() {
        let name = Some("john".to_string());
        let after = 100i64;
        let mut builder = QueryBuilder::new();
        builder.add_update(&name, "name");
        builder.add_where(QueryWhereType::After("modified", &after));
        assert_eq!(builder.format_update(), "name = ?");
        assert_eq!(builder.format(), "WHERE modified > ?");
        assert!(builder.has_updates());
    }
}
