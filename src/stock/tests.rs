use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::models::{StoreLocation, Unit, UnitType};

use super::*;

const PRODUCT: i64 = 1;
const PERSON: i64 = 7;
const LITER: i64 = 1;
const MILLILITER: i64 = 2;
const GRAM: i64 = 3;
const KELVIN: i64 = 4;

fn units() -> Vec<Unit> {
    let unit = |id, label: &str, multiplier, unit_type, parent_id| Unit {
        id,
        label: label.to_string(),
        multiplier,
        unit_type,
        parent_id,
    };
    vec![
        unit(LITER, "L", 1.0, UnitType::Quantity, None),
        unit(MILLILITER, "mL", 0.001, UnitType::Quantity, Some(LITER)),
        unit(GRAM, "g", 1.0, UnitType::Quantity, None),
        unit(KELVIN, "°K", 1.0, UnitType::Temperature, None),
    ]
}

fn location(id: i64, parent_id: Option<i64>) -> StoreLocation {
    StoreLocation {
        id,
        name: format!("loc-{:03}", id),
        can_store: true,
        color: None,
        full_path: format!("loc-{:03}", id),
        entity_id: 1,
        parent_id,
    }
}

/// In-memory store with optional scheduling jitter and injected failures
#[derive(Default)]
struct MemoryStore {
    locations: Vec<StoreLocation>,
    families: UnitFamilies,
    measured: HashMap<i64, Vec<(i64, f64)>>,
    unitless: HashMap<i64, f64>,
    consumable: HashMap<i64, f64>,
    /// Extra (parent, child) edges that bypass `parent_id`, to fake a corrupted tree
    extra_edges: Vec<(i64, i64)>,
    failing: HashSet<i64>,
    fail_visibility: bool,
    visibility_calls: AtomicUsize,
    visibility_delay: Option<Duration>,
    jitter_micros: u64,
    delay: Option<Duration>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            families: UnitFamilies::build(&units()).unwrap(),
            ..Default::default()
        }
    }

    fn add(&mut self, id: i64, parent_id: Option<i64>) -> &mut Self {
        self.locations.push(location(id, parent_id));
        self
    }

    fn measured(&mut self, id: i64, unit_id: i64, quantity: f64) -> &mut Self {
        self.measured.entry(id).or_default().push((unit_id, quantity));
        self
    }

    fn pause(&self) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.jitter_micros > 0 {
            let micros = rand::thread_rng().gen_range(0..self.jitter_micros);
            std::thread::sleep(Duration::from_micros(micros));
        }
    }

    fn check(&self, location_id: i64) -> StockResult<()> {
        if self.failing.contains(&location_id) {
            return Err(StockError::Db(crate::db::DbError::NotFound(format!(
                "store location {}",
                location_id
            ))));
        }
        Ok(())
    }
}

impl StockStore for MemoryStore {
    fn visible_roots(&self, _person_id: i64) -> StockResult<Vec<StoreLocation>> {
        self.visibility_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.visibility_delay {
            std::thread::sleep(delay);
        }
        if self.fail_visibility {
            return Err(StockError::Db(crate::db::DbError::NotFound("permissions".into())));
        }
        Ok(self
            .locations
            .iter()
            .filter(|l| l.parent_id.is_none())
            .cloned()
            .collect())
    }

    fn reference_axes(&self) -> StockResult<Vec<Unit>> {
        Ok(self.families.reference_axes().to_vec())
    }

    fn children_of(&self, location_id: i64) -> StockResult<Vec<StoreLocation>> {
        self.pause();
        let mut children: Vec<StoreLocation> = self
            .locations
            .iter()
            .filter(|l| l.parent_id == Some(location_id))
            .cloned()
            .collect();
        for (parent, child) in &self.extra_edges {
            if *parent == location_id {
                children.extend(self.locations.iter().filter(|l| l.id == *child).cloned());
            }
        }
        Ok(children)
    }

    fn sum_measured(&self, location_id: i64, product_id: i64, axis: &Unit) -> StockResult<f64> {
        self.pause();
        self.check(location_id)?;
        if product_id != PRODUCT {
            return Ok(0.0);
        }
        let sums = self.measured.get(&location_id).cloned().unwrap_or_default();
        Ok(self.families.convert_sum(&sums, axis.id))
    }

    fn sum_unitless(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        self.pause();
        self.check(location_id)?;
        if product_id != PRODUCT {
            return Ok(0.0);
        }
        Ok(self.unitless.get(&location_id).copied().unwrap_or(0.0))
    }

    fn sum_consumable(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        self.pause();
        self.check(location_id)?;
        if product_id != PRODUCT {
            return Ok(0.0);
        }
        Ok(self.consumable.get(&location_id).copied().unwrap_or(0.0))
    }
}

fn liters(node: &StoreLocationStock) -> &Stock {
    node.stock(StockKind::Quantity, Some(LITER)).unwrap()
}

async fn compute(store: MemoryStore) -> StockResult<Vec<StoreLocationStock>> {
    compute_stock(store, PRODUCT, PERSON, StockOptions::default()).await
}

/// total(node) == current(node) + sum of total(child), for every node and entry
fn assert_totals_consistent(node: &StoreLocationStock) {
    for stock in &node.stocks {
        let axis = stock.unit.as_ref().map(|u| u.id);
        let children: f64 = node
            .children
            .iter()
            .map(|c| c.stock(stock.kind, axis).unwrap().total)
            .sum();
        assert!(
            (stock.total - (stock.current + children)).abs() < 1e-9,
            "inconsistent {:?} at {}",
            stock,
            node.location.id
        );
    }
    for child in &node.children {
        assert_totals_consistent(child);
    }
}

#[tokio::test]
async fn child_stock_rolls_up_to_an_empty_root() {
    let mut store = MemoryStore::new();
    store.add(1, None).add(2, Some(1)).measured(2, LITER, 2.0);

    let roots = compute(store).await.unwrap();
    let root = &roots[0];
    let child = root.find(2).unwrap();

    assert_eq!((liters(child).current, liters(child).total), (2.0, 2.0));
    assert_eq!((liters(root).current, liters(root).total), (0.0, 2.0));
}

#[tokio::test]
async fn milliliters_are_reported_in_liters() {
    let mut store = MemoryStore::new();
    store.add(1, None).measured(1, MILLILITER, 1000.0);

    let roots = compute(store).await.unwrap();
    assert!((liters(&roots[0]).current - 1.0).abs() < 1e-12);
    assert_eq!(roots[0].stock(StockKind::Quantity, Some(GRAM)).unwrap().total, 0.0);
}

#[tokio::test]
async fn empty_location_still_gets_zero_entries() {
    let mut store = MemoryStore::new();
    store.add(1, None);

    let roots = compute(store).await.unwrap();
    let stocks = &roots[0].stocks;

    // L and g axes, then unitless and consumable; temperature is never an axis
    assert_eq!(stocks.len(), 4);
    assert!(stocks.iter().all(|s| s.current == 0.0 && s.total == 0.0));
    assert!(stocks.iter().all(|s| s.unit.as_ref().map(|u| u.id) != Some(KELVIN)));
    let kinds: Vec<StockKind> = stocks.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StockKind::Quantity, StockKind::Quantity, StockKind::Unitless, StockKind::Consumable]
    );
}

#[tokio::test]
async fn sibling_unitless_stock_adds_up() {
    let mut store = MemoryStore::new();
    store.add(1, None).add(2, Some(1)).add(3, Some(1));
    store.unitless.insert(2, 3.0);
    store.unitless.insert(3, 3.0);

    let roots = compute(store).await.unwrap();
    let parent = &roots[0];

    assert_eq!(parent.stock(StockKind::Unitless, None).unwrap().total, 6.0);
    for id in [2, 3] {
        assert_eq!(parent.find(id).unwrap().stock(StockKind::Unitless, None).unwrap().current, 3.0);
    }
}

#[tokio::test]
async fn grandchildren_count_toward_the_root_total() {
    let mut store = MemoryStore::new();
    store
        .add(1, None)
        .add(2, Some(1))
        .add(3, Some(2))
        .measured(1, LITER, 1.0)
        .measured(3, LITER, 4.0);
    store.consumable.insert(3, 20.0);

    let roots = compute(store).await.unwrap();
    assert_eq!(liters(&roots[0]).total, 5.0);
    assert_eq!(liters(roots[0].find(2).unwrap()).total, 4.0);
    assert_eq!(roots[0].stock(StockKind::Consumable, None).unwrap().total, 20.0);
    assert_totals_consistent(&roots[0]);
}

#[tokio::test]
async fn failing_location_counts_as_zero_without_stopping_siblings() {
    let mut store = MemoryStore::new();
    store
        .add(1, None)
        .add(2, Some(1))
        .add(3, Some(1))
        .measured(2, LITER, 5.0)
        .measured(3, LITER, 1.5);
    store.failing.insert(2);

    let roots = compute(store).await.unwrap();
    assert_eq!(liters(roots[0].find(2).unwrap()).current, 0.0);
    assert_eq!(liters(roots[0].find(3).unwrap()).current, 1.5);
    assert_eq!(liters(&roots[0]).total, 1.5);
}

#[tokio::test]
async fn visibility_failure_fails_the_call() {
    let mut store = MemoryStore::new();
    store.add(1, None);
    store.fail_visibility = true;

    assert!(matches!(compute(store).await, Err(StockError::Visibility(_))));
}

#[tokio::test]
async fn no_visible_roots_is_an_empty_report() {
    let store = MemoryStore::new();
    assert!(compute(store).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_reference_axis_is_a_configuration_error() {
    let mut store = MemoryStore::new();
    store.add(1, None);
    store.families = UnitFamilies::default();

    let err = compute(store).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn looping_hierarchy_is_reported_not_followed() {
    let mut store = MemoryStore::new();
    store.add(1, None).add(2, Some(1)).add(3, Some(2));
    store.extra_edges.push((3, 2));

    let err = compute(store).await.unwrap_err();
    assert!(matches!(err, StockError::HierarchyCycle { location_id: 2 }));
}

#[tokio::test]
async fn depth_bound_stops_runaway_trees() {
    let mut store = MemoryStore::new();
    store.add(1, None);
    for id in 2..=6 {
        store.add(id, Some(id - 1));
    }

    let options = StockOptions {
        max_depth: 3,
        ..StockOptions::default()
    };
    let err = compute_stock(store, PRODUCT, PERSON, options).await.unwrap_err();
    assert!(matches!(err, StockError::DepthExceeded { max_depth: 3, .. }));
}

#[tokio::test]
async fn cancelled_token_stops_the_computation() {
    let mut store = MemoryStore::new();
    store.add(1, None).add(2, Some(1));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = StockOptions {
        cancel,
        ..StockOptions::default()
    };

    let store = Arc::new(store);
    let result = compute_stock(Arc::clone(&store), PRODUCT, PERSON, options).await;
    assert!(matches!(result, Err(StockError::Cancelled)));
    assert_eq!(store.visibility_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_bounds_root_resolution() {
    let mut store = MemoryStore::new();
    store.add(1, None);
    store.visibility_delay = Some(Duration::from_millis(300));

    let options = StockOptions {
        timeout: Some(Duration::from_millis(20)),
        ..StockOptions::default()
    };
    let started = Instant::now();
    let result = compute_stock(store, PRODUCT, PERSON, options).await;

    assert!(matches!(result, Err(StockError::Cancelled)));
    assert!(started.elapsed() < Duration::from_millis(250));
}

#[tokio::test]
async fn carton_counts_roll_up_through_the_tree() {
    let mut store = MemoryStore::new();
    store.add(1, None).add(2, Some(1)).add(3, Some(2));
    // 3 cartons of 12 at the leaf, 4 loose units in the middle
    store.consumable.insert(3, 36.0);
    store.consumable.insert(2, 4.0);

    let roots = compute(store).await.unwrap();
    let consumable = |id: i64| {
        let node = roots[0].find(id).unwrap();
        node.stock(StockKind::Consumable, None).unwrap().clone()
    };

    assert_eq!((consumable(3).current, consumable(3).total), (36.0, 36.0));
    assert_eq!((consumable(2).current, consumable(2).total), (4.0, 40.0));
    assert_eq!((consumable(1).current, consumable(1).total), (0.0, 40.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_cancels_slow_walks() {
    let mut store = MemoryStore::new();
    store.add(1, None);
    for id in 2..=40 {
        store.add(id, Some(1));
    }
    store.delay = Some(Duration::from_millis(5));

    let options = StockOptions {
        timeout: Some(Duration::from_millis(20)),
        ..StockOptions::default()
    };
    let result = compute_stock(store, PRODUCT, PERSON, options).await;
    assert!(matches!(result, Err(StockError::Cancelled)));
}

#[tokio::test]
async fn other_products_see_zero_everywhere() {
    let mut store = MemoryStore::new();
    store.add(1, None).measured(1, LITER, 3.0);

    let roots = compute_stock(store, PRODUCT + 1, PERSON, StockOptions::default())
        .await
        .unwrap();
    assert!(roots[0].stocks.iter().all(|s| s.total == 0.0));
}

/// Random forest of store locations with random storages
fn random_store(seed: u64, jitter_micros: u64) -> MemoryStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = MemoryStore::new();
    store.jitter_micros = jitter_micros;

    for id in 1..=40_i64 {
        let parent = if id <= 3 { None } else { Some(rng.gen_range(1..id)) };
        store.add(id, parent);

        if rng.gen_bool(0.5) {
            let unit = [LITER, MILLILITER, GRAM, KELVIN][rng.gen_range(0..4)];
            store.measured(id, unit, rng.gen_range(1..500) as f64);
        }
        if rng.gen_bool(0.3) {
            store.unitless.insert(id, rng.gen_range(1..10) as f64);
        }
        if rng.gen_bool(0.3) {
            store.consumable.insert(id, rng.gen_range(1..50) as f64);
        }
    }
    store
}

/// Sequential recursion over the same data, keyed by (location, kind, axis)
fn reference_stocks(
    store: &MemoryStore,
    location_id: i64,
    measure: &Measure,
    out: &mut HashMap<(i64, StockKind, Option<i64>), (f64, f64)>,
) -> f64 {
    let current = match measure {
        Measure::Quantity(axis) => store.sum_measured(location_id, PRODUCT, axis).unwrap(),
        Measure::Unitless => store.sum_unitless(location_id, PRODUCT).unwrap(),
        Measure::Consumable => store.sum_consumable(location_id, PRODUCT).unwrap(),
    };
    let mut total = current;
    for child in store.children_of(location_id).unwrap() {
        total += reference_stocks(store, child.id, measure, out);
    }
    out.insert(
        (location_id, measure.kind(), measure.axis().map(|u| u.id)),
        (current, total),
    );
    total
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_match_a_sequential_walk() {
    let reference_store = random_store(42, 0);
    let mut expected = HashMap::new();
    let measures: Vec<Measure> = reference_store
        .families
        .reference_axes()
        .iter()
        .cloned()
        .map(Measure::Quantity)
        .chain([Measure::Unitless, Measure::Consumable])
        .collect();
    for root in reference_store.visible_roots(PERSON).unwrap() {
        for measure in &measures {
            reference_stocks(&reference_store, root.id, measure, &mut expected);
        }
    }

    for _ in 0..8 {
        let store = Arc::new(random_store(42, 300));
        let roots = compute_stock(Arc::clone(&store), PRODUCT, PERSON, StockOptions::default())
            .await
            .unwrap();

        let mut seen = 0;
        for root in &roots {
            assert_totals_consistent(root);
            root.walk(&mut |node| {
                for stock in &node.stocks {
                    let key = (node.location.id, stock.kind, stock.unit.as_ref().map(|u| u.id));
                    let (current, total) = expected[&key];
                    assert!((stock.current - current).abs() < 1e-9);
                    assert!((stock.total - total).abs() < 1e-9);
                    seen += 1;
                }
            });
        }
        assert_eq!(seen, expected.len());
    }
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let first = compute(random_store(7, 0)).await.unwrap();
    let second = compute(random_store(7, 0)).await.unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

mod sqlite {
    use super::*;
    use crate::db::{migrations, Database};
    use crate::models::{
        Entity, EntityCreate, Permission, PermissionCreate, Person, Product, ProductCreate, Storage,
        StorageCreate, StoreLocationCreate, ALL_ENTITIES,
    };

    struct Lab {
        _dir: tempfile::TempDir,
        database: Database,
        person: i64,
        entity: i64,
    }

    fn lab() -> Lab {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path().join("stock.db")).unwrap();
        let (person, entity) = database
            .with_conn(|conn| {
                migrations::run_migrations(conn)?;
                let entity = Entity::create(
                    conn,
                    &EntityCreate {
                        name: "Chemistry".into(),
                        description: None,
                    },
                )?;
                let person = Person::create(conn, "chemist@lab.test")?;
                Permission::grant(
                    conn,
                    &PermissionCreate {
                        person_id: person.id,
                        perm_name: "r".into(),
                        item_name: "entities".into(),
                        entity_id: entity.id,
                    },
                )?;
                Ok((person.id, entity.id))
            })
            .unwrap();
        Lab { _dir: dir, database, person, entity }
    }

    fn add_location(lab: &Lab, name: &str, parent_id: Option<i64>) -> StoreLocation {
        lab.database
            .with_conn(|conn| {
                StoreLocation::create(
                    conn,
                    &StoreLocationCreate {
                        name: name.into(),
                        can_store: true,
                        color: None,
                        entity_id: lab.entity,
                        parent_id,
                    },
                )
            })
            .unwrap()
    }

    fn unit_id(lab: &Lab, label: &str) -> i64 {
        lab.database
            .with_conn(|conn| Unit::get_by_label(conn, label))
            .unwrap()
            .unwrap()
            .id
    }

    async fn compute(lab: &Lab, product_id: i64, person_id: i64) -> Vec<StoreLocationStock> {
        let store = SqliteStockStore::load(lab.database.clone()).unwrap();
        compute_stock(store, product_id, person_id, StockOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stock_tree_from_the_database() {
        let lab = lab();
        let room = add_location(&lab, "Room 101", None);
        let cabinet = add_location(&lab, "Cabinet", Some(room.id));
        let shelf = add_location(&lab, "Shelf", Some(cabinet.id));
        assert_eq!(shelf.full_path, "Room 101/Cabinet/Shelf");

        let (ml, liter, kelvin) = (unit_id(&lab, "mL"), unit_id(&lab, "L"), unit_id(&lab, "°K"));
        let product = lab
            .database
            .with_conn(|conn| {
                let product = Product::create(
                    conn,
                    &ProductCreate {
                        name: "Acetone".into(),
                        number_per_bag: Some(10),
                        ..Default::default()
                    },
                )?;
                let at = |location_id: i64| StorageCreate {
                    product_id: product.id,
                    store_location_id: location_id,
                    ..Default::default()
                };
                let measured = |location_id: i64, quantity: f64, unit_id: i64| StorageCreate {
                    quantity: Some(quantity),
                    unit_id: Some(unit_id),
                    ..at(location_id)
                };

                Storage::create(conn, &measured(shelf.id, 500.0, ml))?;
                Storage::create(conn, &measured(cabinet.id, 2.0, liter))?;
                Storage::create(conn, &measured(cabinet.id, 300.0, kelvin))?;
                Storage::create(conn, &StorageCreate { number_of_bag: Some(2), ..at(shelf.id) })?;
                Storage::create(conn, &StorageCreate { quantity: Some(4.0), ..at(room.id) })?;
                Ok(product)
            })
            .unwrap();

        let roots = compute(&lab, product.id, lab.person).await;
        assert_eq!(roots.len(), 1);
        let root = &roots[0];
        assert_totals_consistent(root);

        let liters = |node: &StoreLocationStock| {
            node.stock(StockKind::Quantity, Some(liter)).unwrap().clone()
        };
        assert!((liters(root.find(shelf.id).unwrap()).current - 0.5).abs() < 1e-12);
        assert!((liters(root.find(cabinet.id).unwrap()).total - 2.5).abs() < 1e-12);
        assert!((liters(root).total - 2.5).abs() < 1e-12);
        assert_eq!(root.stock(StockKind::Unitless, None).unwrap().current, 4.0);
        assert_eq!(root.stock(StockKind::Consumable, None).unwrap().total, 20.0);
    }

    #[tokio::test]
    async fn roots_follow_entity_permissions() {
        let lab = lab();
        add_location(&lab, "Visible", None);
        let (stranger, admin) = lab
            .database
            .with_conn(|conn| {
                let other = Entity::create(
                    conn,
                    &EntityCreate {
                        name: "Biology".into(),
                        description: None,
                    },
                )?;
                StoreLocation::create(
                    conn,
                    &StoreLocationCreate {
                        name: "Hidden".into(),
                        can_store: true,
                        color: Some("#ff0000".into()),
                        entity_id: other.id,
                        parent_id: None,
                    },
                )?;
                let stranger = Person::create(conn, "visitor@lab.test")?;
                let admin = Person::create(conn, "admin@lab.test")?;
                Permission::grant(
                    conn,
                    &PermissionCreate {
                        person_id: admin.id,
                        perm_name: "all".into(),
                        item_name: "all".into(),
                        entity_id: ALL_ENTITIES,
                    },
                )?;
                Ok((stranger.id, admin.id))
            })
            .unwrap();

        let names = |roots: Vec<StoreLocationStock>| -> Vec<String> {
            roots.into_iter().map(|r| r.location.name).collect()
        };
        assert_eq!(names(compute(&lab, 1, lab.person).await), vec!["Visible"]);
        assert!(compute(&lab, 1, stranger).await.is_empty());
        assert_eq!(names(compute(&lab, 1, admin).await), vec!["Hidden", "Visible"]);
    }

    #[tokio::test]
    async fn archived_and_history_rows_are_ignored() {
        let lab = lab();
        let room = add_location(&lab, "Room", None);
        let gram = unit_id(&lab, "g");
        let kg = unit_id(&lab, "kg");
        let product = lab
            .database
            .with_conn(|conn| {
                let product = Product::create(
                    conn,
                    &ProductCreate {
                        name: "NaCl".into(),
                        ..Default::default()
                    },
                )?;
                let measured = |quantity: f64, unit_id: i64| StorageCreate {
                    product_id: product.id,
                    store_location_id: room.id,
                    quantity: Some(quantity),
                    unit_id: Some(unit_id),
                    ..Default::default()
                };

                let live = Storage::create(conn, &measured(1.5, kg))?;
                let history = StorageCreate {
                    parent_storage_id: Some(live.id),
                    ..measured(9.0, kg)
                };
                Storage::create(conn, &history)?;
                let gone = Storage::create(conn, &measured(100.0, gram))?;
                Storage::archive(conn, gone.id)?;
                Ok(product)
            })
            .unwrap();

        let roots = compute(&lab, product.id, lab.person).await;
        assert_eq!(roots[0].stock(StockKind::Quantity, Some(gram)).unwrap().total, 1500.0);
    }

    #[tokio::test]
    async fn carton_packaging_rolls_up_through_the_tree() {
        let lab = lab();
        let room = add_location(&lab, "Store room", None);
        let rack = add_location(&lab, "Rack", Some(room.id));
        let (boxed, loose) = lab
            .database
            .with_conn(|conn| {
                let boxed = Product::create(
                    conn,
                    &ProductCreate {
                        name: "Pipette tips".into(),
                        number_per_carton: Some(12),
                        ..Default::default()
                    },
                )?;
                let loose = Product::create(
                    conn,
                    &ProductCreate {
                        name: "Gloves".into(),
                        ..Default::default()
                    },
                )?;
                for product_id in [boxed.id, loose.id] {
                    let cartons = StorageCreate {
                        product_id,
                        store_location_id: rack.id,
                        number_of_carton: Some(3),
                        number_of_bag: Some(5),
                        ..Default::default()
                    };
                    Storage::create(conn, &cartons)?;
                }
                let units = StorageCreate {
                    product_id: boxed.id,
                    store_location_id: room.id,
                    number_of_unit: Some(4),
                    ..Default::default()
                };
                Storage::create(conn, &units)?;
                Ok((boxed.id, loose.id))
            })
            .unwrap();

        let roots = compute(&lab, boxed, lab.person).await;
        let consumable = |node: &StoreLocationStock| {
            let stock = node.stock(StockKind::Consumable, None).unwrap();
            (stock.current, stock.total)
        };
        // 3 cartons of 12; the bags count nothing without a per-bag multiplier
        assert_eq!(consumable(roots[0].find(rack.id).unwrap()), (36.0, 36.0));
        assert_eq!(consumable(&roots[0]), (4.0, 40.0));

        let roots = compute(&lab, loose, lab.person).await;
        assert_eq!(consumable(&roots[0]), (0.0, 0.0));
    }

    #[test]
    fn broken_unit_chain_fails_store_loading() {
        let lab = lab();
        lab.database
            .with_conn(|conn| {
                let ml = Unit::get_by_label(conn, "mL")?.unwrap();
                Unit::set_parent(conn, ml.id, Some(ml.id), 0.001)?;
                Ok(())
            })
            .unwrap();

        match SqliteStockStore::load(lab.database.clone()) {
            Err(err) => assert!(err.is_configuration()),
            Ok(_) => panic!("a unit pointing at itself must be rejected"),
        }
    }
}
