//! Person and permission models
//!
//! Only what stock visibility needs: who a person is and which entities
//! they hold permissions on.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Entity id granting a permission on every entity
pub const ALL_ENTITIES: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub person_id: i64,
    /// r, w, all or n
    pub perm_name: String,
    /// entities, storages, products, ... or all
    pub item_name: String,
    pub entity_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCreate {
    pub person_id: i64,
    pub perm_name: String,
    pub item_name: String,
    pub entity_id: i64,
}

impl Person {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
        })
    }

    pub fn create(conn: &Connection, email: &str) -> DbResult<Self> {
        conn.execute("INSERT INTO people (email) VALUES (?1)", [email])?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("person {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT id, email FROM people WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(person) => Ok(Some(person)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Permission {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            person_id: row.get("person_id")?,
            perm_name: row.get("perm_name")?,
            item_name: row.get("item_name")?,
            entity_id: row.get("entity_id")?,
        })
    }

    /// Grant a permission, ignoring duplicates
    pub fn grant(conn: &Connection, data: &PermissionCreate) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT OR IGNORE INTO permissions (person_id, perm_name, item_name, entity_id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![data.person_id, data.perm_name, data.item_name, data.entity_id],
        )?;
        Ok(())
    }

    pub fn list_for_person(conn: &Connection, person_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, person_id, perm_name, item_name, entity_id FROM permissions WHERE person_id = ?1 ORDER BY id",
        )?;

        let permissions = stmt
            .query_map([person_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(permissions)
    }
}
