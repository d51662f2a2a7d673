//! Recursive stock aggregation
//!
//! One `Aggregator` walks one root's sub-tree depth-first for one measure:
//! a quantity axis, unitless storages or consumables. Every store read and
//! every tree mutation goes through the context's single mutex, so walks for
//! different measures can run side by side over the same nodes.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::models::{StoreLocation, Unit};

use super::error::{StockError, StockResult};
use super::store::StockStore;
use super::tree::{Stock, StockKind, StockTree};

/// What one walk sums
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    /// Unit-bearing storages converted to this reference axis
    Quantity(Unit),
    Unitless,
    Consumable,
}

impl Measure {
    pub fn kind(&self) -> StockKind {
        match self {
            Measure::Quantity(_) => StockKind::Quantity,
            Measure::Unitless => StockKind::Unitless,
            Measure::Consumable => StockKind::Consumable,
        }
    }

    pub fn axis(&self) -> Option<&Unit> {
        match self {
            Measure::Quantity(axis) => Some(axis),
            _ => None,
        }
    }

    /// Stock held directly at one location
    fn current<S: StockStore>(
        &self,
        store: &S,
        location_id: i64,
        product_id: i64,
    ) -> StockResult<f64> {
        match self {
            Measure::Quantity(axis) => store.sum_measured(location_id, product_id, axis),
            Measure::Unitless => store.sum_unitless(location_id, product_id),
            Measure::Consumable => store.sum_consumable(location_id, product_id),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Quantity(axis) => write!(f, "{}", axis.label),
            Measure::Unitless => write!(f, "unitless"),
            Measure::Consumable => write!(f, "consumable"),
        }
    }
}

struct Session<S> {
    store: S,
    tree: StockTree,
}

/// State shared by every worker of one stock computation
pub struct StockContext<S> {
    product_id: i64,
    max_depth: usize,
    cancel: CancellationToken,
    session: Mutex<Session<S>>,
}

impl<S: StockStore> StockContext<S> {
    pub fn new(store: S, product_id: i64, max_depth: usize, cancel: CancellationToken) -> Self {
        Self {
            product_id,
            max_depth,
            cancel,
            session: Mutex::new(Session {
                store,
                tree: StockTree::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session<S>> {
        // A panicked worker leaves the tree consistent: each mutation is a single push
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the caller's visible roots and the reference axes, and seed the tree with the roots
    pub fn resolve(&self, person_id: i64) -> StockResult<(Vec<StoreLocation>, Vec<Unit>)> {
        let mut session = self.lock();

        let roots = session
            .store
            .visible_roots(person_id)
            .map_err(|e| StockError::Visibility(e.to_string()))?;

        let axes = session.store.reference_axes()?;
        if axes.is_empty() {
            return Err(StockError::Configuration(
                "no reference unit to total quantities against".to_string(),
            ));
        }

        session.tree = StockTree::new(&roots);
        Ok((roots, axes))
    }

    /// Hand the populated tree to the caller, leaving an empty one behind
    pub fn take_tree(&self) -> StockTree {
        std::mem::take(&mut self.lock().tree)
    }
}

/// One depth-first walk for one measure
pub struct Aggregator<'a, S> {
    ctx: &'a StockContext<S>,
    measure: Measure,
    /// Locations from the walk's root down to the node being visited
    path: Vec<i64>,
}

impl<'a, S: StockStore> Aggregator<'a, S> {
    pub fn new(ctx: &'a StockContext<S>, measure: Measure) -> Self {
        Self {
            ctx,
            measure,
            path: Vec::new(),
        }
    }

    /// Walk the sub-tree under `root`, returning its total
    pub fn run(mut self, root: &StoreLocation) -> StockResult<f64> {
        self.visit(root, 0)
    }

    fn visit(&mut self, location: &StoreLocation, depth: usize) -> StockResult<f64> {
        if self.ctx.cancel.is_cancelled() {
            return Err(StockError::Cancelled);
        }
        if depth > self.ctx.max_depth {
            return Err(StockError::DepthExceeded {
                location_id: location.id,
                max_depth: self.ctx.max_depth,
            });
        }

        let (current, children) = {
            let mut session = self.ctx.lock();

            let current = match self
                .measure
                .current(&session.store, location.id, self.ctx.product_id)
            {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        "{} stock query failed at store location {} ({}): {}. Counting 0.",
                        self.measure,
                        location.id,
                        location.name,
                        e
                    );
                    0.0
                }
            };

            let children = match session.store.children_of(location.id) {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(
                        "Could not load children of store location {} ({}): {}. Skipping its sub-tree.",
                        location.id,
                        location.name,
                        e
                    );
                    Vec::new()
                }
            };

            if let Some(looping) = children
                .iter()
                .find(|c| c.id == location.id || self.path.contains(&c.id))
            {
                return Err(StockError::HierarchyCycle {
                    location_id: looping.id,
                });
            }

            for child in &children {
                session.tree.attach_child(location.id, child);
            }

            (current, children)
        };

        tracing::debug!(
            product_id = self.ctx.product_id,
            store_location = %location.name,
            measure = %self.measure,
            current,
            "stock at store location"
        );

        self.path.push(location.id);
        let mut total = current;
        for child in &children {
            total += self.visit(child, depth + 1)?;
        }
        self.path.pop();

        self.ctx.lock().tree.push_stock(
            location.id,
            Stock {
                kind: self.measure.kind(),
                unit: self.measure.axis().cloned(),
                current,
                total,
            },
        );

        Ok(total)
    }
}
