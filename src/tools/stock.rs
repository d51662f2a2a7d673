//! Stock MCP Tools
//!
//! Tools for computing product stock and inspecting the units and store
//! locations it is reported against.

use std::sync::Arc;

use serde::Serialize;

use crate::db::Database;
use crate::models::{Entity, Permission, Person, Product, StoreLocation, Unit};
use crate::stock::{compute_stock, SqliteStockStore, StockOptions, StoreLocationStock, UnitFamilies};

/// Response for compute_product_stock
#[derive(Debug, Serialize)]
pub struct ComputeStockResponse {
    pub product_id: i64,
    pub product_name: String,
    pub person_id: i64,
    pub generated_at: String,
    pub location_count: usize,
    pub locations: Vec<StoreLocationStock>,
}

/// A unit with the reference unit it converts to, if any
#[derive(Debug, Serialize)]
pub struct UnitEntry {
    #[serde(flatten)]
    pub unit: Unit,
    pub reference_id: Option<i64>,
    /// One of this unit expressed in reference units
    pub factor: Option<f64>,
}

/// A reference axis and the labels of every unit totalled on it
#[derive(Debug, Serialize)]
pub struct ReferenceUnitEntry {
    #[serde(flatten)]
    pub unit: Unit,
    pub members: Vec<String>,
}

/// Response for list_visible_roots
#[derive(Debug, Serialize)]
pub struct VisibleRootsResponse {
    pub person_id: i64,
    pub email: String,
    pub permissions: Vec<Permission>,
    pub entities: Vec<Entity>,
    pub roots: Vec<StoreLocation>,
}

// ============================================================================
// Stock Tools
// ============================================================================

/// Compute the stock tree of a product for a person. `None` when the product does not exist.
pub async fn compute_product_stock(
    db: &Database,
    families: Arc<UnitFamilies>,
    options: StockOptions,
    product_id: i64,
    person_id: i64,
) -> Result<Option<ComputeStockResponse>, String> {
    let product = db
        .with_conn(|conn| Product::get_by_id(conn, product_id))
        .map_err(|e| format!("Failed to get product: {}", e))?;

    let Some(product) = product else {
        return Ok(None);
    };

    let store = SqliteStockStore::new(db.clone(), families);
    let locations = compute_stock(store, product.id, person_id, options)
        .await
        .map_err(|e| format!("Failed to compute stock: {}", e))?;

    let mut location_count = 0;
    for root in &locations {
        root.walk(&mut |_| location_count += 1);
    }

    Ok(Some(ComputeStockResponse {
        product_id: product.id,
        product_name: product.name,
        person_id,
        generated_at: chrono::Utc::now().to_rfc3339(),
        location_count,
        locations,
    }))
}

// ============================================================================
// Unit Tools
// ============================================================================

/// List every unit with its conversion to a reference unit
pub fn list_units(db: &Database, families: &UnitFamilies) -> Result<Vec<UnitEntry>, String> {
    let units = db
        .with_conn(Unit::list)
        .map_err(|e| format!("Failed to list units: {}", e))?;

    Ok(units
        .into_iter()
        .map(|unit| {
            let factor = families
                .root_of(unit.id)
                .and_then(|root| families.factor(unit.id, root));
            let reference_id = factor.and(families.root_of(unit.id));
            UnitEntry {
                unit,
                reference_id,
                factor,
            }
        })
        .collect())
}

/// List the reference units stock is totalled against
pub fn list_reference_units(
    db: &Database,
    families: &UnitFamilies,
) -> Result<Vec<ReferenceUnitEntry>, String> {
    let units = db
        .with_conn(Unit::list)
        .map_err(|e| format!("Failed to list units: {}", e))?;

    Ok(families
        .reference_axes()
        .iter()
        .map(|axis| ReferenceUnitEntry {
            unit: axis.clone(),
            members: units
                .iter()
                .filter(|u| families.factor(u.id, axis.id).is_some())
                .map(|u| u.label.clone())
                .collect(),
        })
        .collect())
}

// ============================================================================
// Visibility Tools
// ============================================================================

/// Entities and root store locations a person may read. `None` when the person does not exist.
pub fn list_visible_roots(
    db: &Database,
    person_id: i64,
) -> Result<Option<VisibleRootsResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let Some(person) = Person::get_by_id(&conn, person_id)
        .map_err(|e| format!("Failed to get person: {}", e))?
    else {
        return Ok(None);
    };

    let permissions = Permission::list_for_person(&conn, person.id)
        .map_err(|e| format!("Failed to list permissions: {}", e))?;
    let entities = Entity::list_readable_by(&conn, person.id)
        .map_err(|e| format!("Failed to list entities: {}", e))?;
    let roots = StoreLocation::get_visible_roots(&conn, person.id)
        .map_err(|e| format!("Failed to list store locations: {}", e))?;

    Ok(Some(VisibleRootsResponse {
        person_id: person.id,
        email: person.email,
        permissions,
        entities,
        roots,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::models::{EntityCreate, PermissionCreate, ProductCreate, StoreLocationCreate};

    fn setup() -> (tempfile::TempDir, Database, Arc<UnitFamilies>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("tools.db")).unwrap();
        let units = db
            .with_conn(|conn| {
                migrations::run_migrations(conn)?;
                Unit::list(conn)
            })
            .unwrap();
        let families = Arc::new(UnitFamilies::build(&units).unwrap());
        (dir, db, families)
    }

    #[test]
    fn temperature_units_have_no_reference() {
        let (_dir, db, families) = setup();
        let units = list_units(&db, &families).unwrap();

        let celsius = units.iter().find(|u| u.unit.label == "°C").unwrap();
        assert_eq!(celsius.factor, None);
        assert_eq!(celsius.reference_id, None);

        let kg = units.iter().find(|u| u.unit.label == "kg").unwrap();
        assert_eq!(kg.factor, Some(1000.0));
    }

    #[test]
    fn liter_family_lists_its_members() {
        let (_dir, db, families) = setup();
        let axes = list_reference_units(&db, &families).unwrap();

        let labels: Vec<&str> = axes.iter().map(|a| a.unit.label.as_str()).collect();
        assert_eq!(labels, vec!["L", "g", "m"]);
        assert_eq!(axes[0].members, vec!["L", "mL", "µL"]);
    }

    #[test]
    fn unknown_person_has_no_roots() {
        let (_dir, db, _) = setup();
        assert!(list_visible_roots(&db, 99).unwrap().is_none());
    }

    #[tokio::test]
    async fn stock_for_a_readable_location() {
        let (_dir, db, families) = setup();
        let (product, person) = db
            .with_transaction(|tx| {
                let entity = Entity::create(
                    tx,
                    &EntityCreate {
                        name: "Chemistry".into(),
                        description: None,
                    },
                )?;
                let person = Person::create(tx, "chemist@lab.test")?;
                Permission::grant(
                    tx,
                    &PermissionCreate {
                        person_id: person.id,
                        perm_name: "w".into(),
                        item_name: "entities".into(),
                        entity_id: entity.id,
                    },
                )?;
                StoreLocation::create(
                    tx,
                    &StoreLocationCreate {
                        name: "Cold room".into(),
                        can_store: false,
                        color: Some("#0000ff".into()),
                        entity_id: entity.id,
                        parent_id: None,
                    },
                )?;
                let product = Product::create(
                    tx,
                    &ProductCreate {
                        name: "Ethanol".into(),
                        ..Default::default()
                    },
                )?;
                Ok((product, person))
            })
            .unwrap();

        let visible = list_visible_roots(&db, person.id).unwrap().unwrap();
        assert_eq!(visible.permissions[0].perm_name, "w");
        assert_eq!(visible.entities.len(), 1);
        assert_eq!(visible.roots[0].name, "Cold room");

        let options = StockOptions::default();
        let response = compute_product_stock(&db, Arc::clone(&families), options, product.id, person.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.product_name, "Ethanol");
        assert_eq!(response.location_count, 1);
        assert_eq!(response.locations[0].stocks.len(), 5);

        let missing = compute_product_stock(&db, families, StockOptions::default(), 404, person.id)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
