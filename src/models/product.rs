//! Product model
//!
//! Only the fields stock aggregation reads: a name and the packaging
//! multipliers used to count consumables.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub number_per_carton: Option<i64>,
    pub number_per_bag: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub number_per_carton: Option<i64>,
    pub number_per_bag: Option<i64>,
}

impl Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            number_per_carton: row.get("number_per_carton")?,
            number_per_bag: row.get("number_per_bag")?,
        })
    }

    pub fn create(conn: &Connection, data: &ProductCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO products (name, number_per_carton, number_per_bag) VALUES (?1, ?2, ?3)",
            params![data.name, data.number_per_carton, data.number_per_bag],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("product {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, number_per_carton, number_per_bag FROM products WHERE id = ?1",
        )?;

        match stmt.query_row([id], Self::from_row) {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
