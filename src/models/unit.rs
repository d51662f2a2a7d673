//! Unit model
//!
//! Measurement units form chains: each unit points at a parent unit and
//! carries its size relative to that parent. A parentless unit is the root
//! of its family.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Family type of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Volume, mass and length: additive, totalled per family root
    Quantity,
    Temperature,
    Concentration,
    MolecularWeight,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Quantity => "quantity",
            UnitType::Temperature => "temperature",
            UnitType::Concentration => "concentration",
            UnitType::MolecularWeight => "molecular_weight",
        }
    }

    /// Parse from database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quantity" => Some(UnitType::Quantity),
            "temperature" => Some(UnitType::Temperature),
            "concentration" => Some(UnitType::Concentration),
            "molecular_weight" => Some(UnitType::MolecularWeight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub label: String,
    /// Size of one of this unit expressed in its parent unit
    pub multiplier: f64,
    pub unit_type: UnitType,
    pub parent_id: Option<i64>,
}

/// Data for defining a new unit (seeding and fixtures; see `Unit::create`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCreate {
    pub label: String,
    pub multiplier: f64,
    pub unit_type: UnitType,
    pub parent_id: Option<i64>,
}

impl Unit {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let raw_type: String = row.get("unit_type")?;
        let unit_type = UnitType::from_str(&raw_type).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(
                3,
                format!("unit_type '{}'", raw_type),
                rusqlite::types::Type::Text,
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            label: row.get("label")?,
            multiplier: row.get("multiplier")?,
            unit_type,
            parent_id: row.get("parent_id")?,
        })
    }

    /// True for the root of a quantity family (liter, gram, meter)
    pub fn is_reference(&self) -> bool {
        self.unit_type == UnitType::Quantity && self.parent_id.is_none()
    }

    /// Seeding helper: units normally come from the v2 migration
    pub fn create(conn: &Connection, data: &UnitCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO units (label, multiplier, unit_type, parent_id) VALUES (?1, ?2, ?3, ?4)",
            params![data.label, data.multiplier, data.unit_type.as_str(), data.parent_id],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("unit {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, label, multiplier, unit_type, parent_id FROM units WHERE id = ?1",
        )?;

        match stmt.query_row([id], Self::from_row) {
            Ok(unit) => Ok(Some(unit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_by_label(conn: &Connection, label: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, label, multiplier, unit_type, parent_id FROM units WHERE label = ?1",
        )?;

        match stmt.query_row([label], Self::from_row) {
            Ok(unit) => Ok(Some(unit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All defined units, ordered by type then id
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, label, multiplier, unit_type, parent_id FROM units ORDER BY unit_type, id",
        )?;

        let units = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    /// Re-point a unit at another parent. Maintenance and fixture helper;
    /// running services only see the change after a restart.
    pub fn set_parent(
        conn: &Connection,
        id: i64,
        parent_id: Option<i64>,
        multiplier: f64,
    ) -> DbResult<bool> {
        let rows = conn.execute(
            "UPDATE units SET parent_id = ?1, multiplier = ?2 WHERE id = ?3",
            params![parent_id, multiplier, id],
        )?;
        Ok(rows > 0)
    }
}
