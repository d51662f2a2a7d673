//! Store Location model
//!
//! Physical places forming one tree per entity. A location only knows its
//! parent; children are found by querying on `parent_id`.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub id: i64,
    pub name: String,
    /// Whether storages may be placed here directly
    pub can_store: bool,
    pub color: Option<String>,
    /// Slash-separated names from the root down to this location
    pub full_path: String,
    pub entity_id: i64,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreLocationCreate {
    pub name: String,
    pub can_store: bool,
    pub color: Option<String>,
    pub entity_id: i64,
    pub parent_id: Option<i64>,
}

const COLUMNS: &str = "sl.id, sl.name, sl.can_store, sl.color, sl.full_path, sl.entity_id, sl.parent_id";

impl StoreLocation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            can_store: row.get::<_, i64>("can_store")? != 0,
            color: row.get("color")?,
            full_path: row.get("full_path")?,
            entity_id: row.get("entity_id")?,
            parent_id: row.get("parent_id")?,
        })
    }

    /// Create a store location, deriving its full path from the parent
    pub fn create(conn: &Connection, data: &StoreLocationCreate) -> DbResult<Self> {
        let full_path = match data.parent_id {
            Some(parent_id) => {
                let parent = Self::get_by_id(conn, parent_id)?.ok_or_else(|| {
                    DbError::NotFound(format!("parent store location {}", parent_id))
                })?;
                format!("{}/{}", parent.full_path, data.name)
            }
            None => data.name.clone(),
        };

        conn.execute(
            r#"
            INSERT INTO store_locations (name, can_store, color, full_path, entity_id, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.name,
                data.can_store as i64,
                data.color,
                full_path,
                data.entity_id,
                data.parent_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| DbError::NotFound(format!("store location {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let sql = format!("SELECT {} FROM store_locations sl WHERE sl.id = ?1", COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row([id], Self::from_row) {
            Ok(location) => Ok(Some(location)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Direct children of a location, ordered by name
    pub fn get_children(conn: &Connection, id: i64) -> DbResult<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM store_locations sl WHERE sl.parent_id = ?1 ORDER BY sl.name, sl.id",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let children = stmt
            .query_map([id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(children)
    }

    /// Parentless locations of every entity the person may read
    pub fn get_visible_roots(conn: &Connection, person_id: i64) -> DbResult<Vec<Self>> {
        let sql = format!(
            r#"
            SELECT {} FROM store_locations sl
            WHERE sl.parent_id IS NULL
              AND sl.entity_id IN (
                SELECT e.id FROM entities e
                INNER JOIN permissions p
                    ON p.person_id = ?1
                   AND p.item_name IN ('all', 'entities')
                   AND p.perm_name IN ('all', 'r', 'w')
                   AND (p.entity_id = -1 OR p.entity_id = e.id)
              )
            ORDER BY sl.name, sl.id
            "#,
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let roots = stmt
            .query_map([person_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roots)
    }
}
