//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (2)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- ENTITIES AND PEOPLE
        -- Labs and the people allowed to see them
        -- ============================================
        CREATE TABLE entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT
        );

        CREATE TABLE people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE
        );

        -- entity_id = -1 grants the permission on every entity
        CREATE TABLE permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            perm_name TEXT NOT NULL CHECK(perm_name IN ('r', 'w', 'all', 'n')),
            item_name TEXT NOT NULL,
            entity_id INTEGER NOT NULL DEFAULT -1,
            UNIQUE(person_id, item_name, perm_name, entity_id)
        );

        CREATE INDEX idx_permissions_person ON permissions(person_id);

        -- ============================================
        -- UNITS
        -- Each unit points at its parent; a parentless unit is a family root
        -- ============================================
        CREATE TABLE units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE,
            multiplier REAL NOT NULL DEFAULT 1.0,   -- size relative to parent unit
            unit_type TEXT NOT NULL CHECK(unit_type IN ('quantity', 'temperature', 'concentration', 'molecular_weight')),
            parent_id INTEGER REFERENCES units(id)
        );

        -- ============================================
        -- STORE LOCATIONS
        -- Tree of physical places, one tree per entity root
        -- ============================================
        CREATE TABLE store_locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            can_store INTEGER NOT NULL DEFAULT 0,   -- boolean
            color TEXT,
            full_path TEXT NOT NULL DEFAULT '',
            entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE RESTRICT,
            parent_id INTEGER REFERENCES store_locations(id) ON DELETE RESTRICT
        );

        CREATE INDEX idx_store_locations_parent ON store_locations(parent_id);
        CREATE INDEX idx_store_locations_entity ON store_locations(entity_id);

        -- ============================================
        -- PRODUCTS
        -- ============================================
        CREATE TABLE products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            number_per_carton INTEGER,           -- consumables only
            number_per_bag INTEGER               -- consumables only
        );

        -- ============================================
        -- STORAGES
        -- A quantity of one product at one store location.
        -- Rows with a parent storage are history snapshots.
        -- ============================================
        CREATE TABLE storages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE RESTRICT,
            store_location_id INTEGER NOT NULL REFERENCES store_locations(id) ON DELETE RESTRICT,
            quantity REAL,
            unit_id INTEGER REFERENCES units(id),
            number_of_unit INTEGER,
            number_of_bag INTEGER,
            number_of_carton INTEGER,
            archive INTEGER NOT NULL DEFAULT 0,  -- boolean
            parent_storage_id INTEGER REFERENCES storages(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_storages_product_location ON storages(product_id, store_location_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: Seed the unit families
fn migrate_v2(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        INSERT INTO units (label, multiplier, unit_type, parent_id) VALUES
            ('L', 1.0, 'quantity', NULL),
            ('g', 1.0, 'quantity', NULL),
            ('m', 1.0, 'quantity', NULL),
            ('°K', 1.0, 'temperature', NULL),
            ('M', 1.0, 'concentration', NULL),
            ('%', 1.0, 'concentration', NULL),
            ('X', 1.0, 'concentration', NULL),
            ('g/mol', 1.0, 'molecular_weight', NULL);

        INSERT INTO units (label, multiplier, unit_type, parent_id) VALUES
            ('mL', 0.001, 'quantity', (SELECT id FROM units WHERE label = 'L')),
            ('µL', 0.000001, 'quantity', (SELECT id FROM units WHERE label = 'L')),
            ('kg', 1000.0, 'quantity', (SELECT id FROM units WHERE label = 'g')),
            ('mg', 0.001, 'quantity', (SELECT id FROM units WHERE label = 'g')),
            ('µg', 0.000001, 'quantity', (SELECT id FROM units WHERE label = 'g')),
            ('dm', 0.1, 'quantity', (SELECT id FROM units WHERE label = 'm')),
            ('cm', 0.01, 'quantity', (SELECT id FROM units WHERE label = 'm')),
            ('°C', 1.0, 'temperature', (SELECT id FROM units WHERE label = '°K')),
            ('°F', 1.0, 'temperature', (SELECT id FROM units WHERE label = '°K')),
            ('mM', 0.001, 'concentration', (SELECT id FROM units WHERE label = 'M')),
            ('µM', 0.000001, 'concentration', (SELECT id FROM units WHERE label = 'M')),
            ('nM', 0.000000001, 'concentration', (SELECT id FROM units WHERE label = 'M'));
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
