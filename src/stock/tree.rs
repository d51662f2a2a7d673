//! In-memory stock tree
//!
//! Workers share one `StockTree` per computation. Nodes live in a map keyed
//! by location id and link to children by id, so concurrent walks of the
//! same sub-tree for different axes meet on the same node.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{StoreLocation, Unit};

/// What a stock entry measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockKind {
    /// Unit-bearing storages normalized to a reference axis
    Quantity,
    /// Storages with a bare quantity and no unit
    Unitless,
    /// Bag, carton and unit counts
    Consumable,
}

/// Stock of a product at one location for one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub kind: StockKind,
    /// Reference axis; `None` for unitless and consumable entries
    pub unit: Option<Unit>,
    /// Quantity stored directly at the location
    pub current: f64,
    /// `current` plus the total of every child
    pub total: f64,
}

/// A store location with its aggregated stocks and sub-tree
#[derive(Debug, Clone, Serialize)]
pub struct StoreLocationStock {
    #[serde(flatten)]
    pub location: StoreLocation,
    pub children: Vec<StoreLocationStock>,
    pub stocks: Vec<Stock>,
}

impl StoreLocationStock {
    /// Stock entry of a given kind, matching the axis for quantity entries
    pub fn stock(&self, kind: StockKind, axis_id: Option<i64>) -> Option<&Stock> {
        self.stocks
            .iter()
            .find(|s| s.kind == kind && s.unit.as_ref().map(|u| u.id) == axis_id)
    }

    /// Depth-first search for a location in this sub-tree
    pub fn find(&self, location_id: i64) -> Option<&StoreLocationStock> {
        if self.location.id == location_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(location_id))
    }

    /// Visit this node and every descendant
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a StoreLocationStock)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

#[derive(Debug)]
struct Node {
    location: StoreLocation,
    children: Vec<i64>,
    stocks: Vec<Stock>,
}

impl Node {
    fn new(location: StoreLocation) -> Self {
        Self {
            location,
            children: Vec::new(),
            stocks: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StockTree {
    nodes: HashMap<i64, Node>,
    roots: Vec<i64>,
}

impl StockTree {
    pub fn new(roots: &[StoreLocation]) -> Self {
        let mut tree = Self::default();
        for root in roots {
            if tree.nodes.contains_key(&root.id) {
                continue;
            }
            tree.roots.push(root.id);
            tree.nodes.insert(root.id, Node::new(root.clone()));
        }
        tree
    }

    /// Link `child` under `parent_id` unless already linked. Returns true when the link is new.
    pub fn attach_child(&mut self, parent_id: i64, child: &StoreLocation) -> bool {
        let Some(parent) = self.nodes.get_mut(&parent_id) else {
            return false;
        };
        if parent.children.contains(&child.id) {
            return false;
        }
        parent.children.push(child.id);
        self.nodes
            .entry(child.id)
            .or_insert_with(|| Node::new(child.clone()));
        true
    }

    pub fn push_stock(&mut self, location_id: i64, stock: Stock) {
        if let Some(node) = self.nodes.get_mut(&location_id) {
            node.stocks.push(stock);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Assemble the nested output. Stocks are ordered quantity axes first
    /// (by axis id), then unitless, then consumable.
    pub fn into_roots(mut self) -> Vec<StoreLocationStock> {
        let mut emitted = HashSet::new();
        let roots = std::mem::take(&mut self.roots);
        roots
            .into_iter()
            .filter_map(|id| self.assemble(id, &mut emitted))
            .collect()
    }

    fn assemble(&mut self, id: i64, emitted: &mut HashSet<i64>) -> Option<StoreLocationStock> {
        if !emitted.insert(id) {
            return None;
        }
        let mut node = self.nodes.remove(&id)?;
        node.stocks
            .sort_by_key(|s| (s.kind, s.unit.as_ref().map(|u| u.id)));

        let children = node
            .children
            .iter()
            .filter_map(|child_id| self.assemble(*child_id, emitted))
            .collect();

        Some(StoreLocationStock {
            location: node.location,
            children,
            stocks: node.stocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: i64, parent_id: Option<i64>) -> StoreLocation {
        StoreLocation {
            id,
            name: format!("loc-{}", id),
            can_store: true,
            color: None,
            full_path: format!("loc-{}", id),
            entity_id: 1,
            parent_id,
        }
    }

    fn stock(kind: StockKind, current: f64, total: f64) -> Stock {
        Stock { kind, unit: None, current, total }
    }

    #[test]
    fn attaching_the_same_child_twice_links_once() {
        let mut tree = StockTree::new(&[location(1, None)]);
        assert!(tree.attach_child(1, &location(2, Some(1))));
        assert!(!tree.attach_child(1, &location(2, Some(1))));

        let roots = tree.into_roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 1);
    }

    #[test]
    fn attaching_under_an_unknown_parent_is_ignored() {
        let mut tree = StockTree::new(&[location(1, None)]);
        assert!(StockTree::default().is_empty());
        assert!(!tree.attach_child(7, &location(2, Some(7))));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn stocks_come_out_in_kind_order() {
        let mut tree = StockTree::new(&[location(1, None)]);
        tree.push_stock(1, stock(StockKind::Consumable, 1.0, 1.0));
        tree.push_stock(1, stock(StockKind::Unitless, 2.0, 2.0));
        tree.push_stock(1, stock(StockKind::Quantity, 3.0, 3.0));

        let roots = tree.into_roots();
        let kinds: Vec<StockKind> = roots[0].stocks.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StockKind::Quantity, StockKind::Unitless, StockKind::Consumable]);
    }

    #[test]
    fn assembly_survives_a_child_linked_twice() {
        let mut tree = StockTree::new(&[location(1, None)]);
        tree.attach_child(1, &location(2, Some(1)));
        tree.attach_child(2, &location(3, Some(2)));
        tree.attach_child(3, &location(2, Some(3)));

        let roots = tree.into_roots();
        let mut seen = Vec::new();
        roots[0].walk(&mut |n| seen.push(n.location.id));
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(roots[0].find(3).is_some());
    }

    #[test]
    fn duplicate_roots_are_collapsed() {
        let tree = StockTree::new(&[location(1, None), location(1, None)]);
        assert_eq!(tree.into_roots().len(), 1);
    }
}
