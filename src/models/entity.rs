//! Entity model
//!
//! An entity is a lab or department owning a tree of store locations.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCreate {
    pub name: String,
    pub description: Option<String>,
}

impl Entity {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    pub fn create(conn: &Connection, data: &EntityCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO entities (name, description) VALUES (?1, ?2)",
            params![data.name, data.description],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("entity {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, description FROM entities WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(entity) => Ok(Some(entity)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Entities a person holds a read-capable permission on
    pub fn list_readable_by(conn: &Connection, person_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT e.id, e.name, e.description
            FROM entities e
            INNER JOIN permissions p
                ON p.person_id = ?1
               AND p.item_name IN ('all', 'entities')
               AND p.perm_name IN ('all', 'r', 'w')
               AND (p.entity_id = -1 OR p.entity_id = e.id)
            ORDER BY e.name
            "#,
        )?;

        let entities = stmt
            .query_map([person_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entities)
    }
}
