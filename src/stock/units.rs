//! Unit family resolution
//!
//! Every unit chain is flattened once into `unit -> (family root, factor)`
//! so that converting a stored quantity to a reference axis is a map lookup.
//! Only quantity roots (liter, gram, meter) act as axes; temperature and
//! concentration are not additive and never get a total.

use std::collections::{HashMap, HashSet};

use crate::models::Unit;

use super::error::{StockError, StockResult};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Lineage {
    root_id: i64,
    /// One of this unit expressed in root units
    factor: f64,
}

#[derive(Debug, Clone, Default)]
pub struct UnitFamilies {
    lineage: HashMap<i64, Lineage>,
    axes: Vec<Unit>,
}

impl UnitFamilies {
    /// Flatten unit chains. Fails on a chain pointing at an unknown unit or looping back on itself.
    pub fn build(units: &[Unit]) -> StockResult<Self> {
        let by_id: HashMap<i64, &Unit> = units.iter().map(|u| (u.id, u)).collect();
        let mut lineage = HashMap::with_capacity(units.len());

        for unit in units {
            let mut factor = 1.0;
            let mut current = unit;
            let mut seen = HashSet::new();

            while let Some(parent_id) = current.parent_id {
                if !seen.insert(current.id) {
                    return Err(StockError::Configuration(format!(
                        "unit chain from '{}' loops back on itself",
                        unit.label
                    )));
                }
                factor *= current.multiplier;
                current = by_id.get(&parent_id).copied().ok_or_else(|| {
                    StockError::Configuration(format!(
                        "unit '{}' points at missing parent unit {}",
                        current.label, parent_id
                    ))
                })?;
            }

            lineage.insert(
                unit.id,
                Lineage {
                    root_id: current.id,
                    factor,
                },
            );
        }

        let mut axes: Vec<Unit> = units.iter().filter(|u| u.is_reference()).cloned().collect();
        axes.sort_by_key(|u| u.id);

        Ok(Self { lineage, axes })
    }

    /// Fail when no quantity family exists to total against
    pub fn validate(&self) -> StockResult<()> {
        if self.axes.is_empty() {
            return Err(StockError::Configuration(
                "no parentless unit of type 'quantity' is defined".to_string(),
            ));
        }
        Ok(())
    }

    /// One root unit per measurable family
    pub fn reference_axes(&self) -> &[Unit] {
        &self.axes
    }

    /// Multiplier converting one `unit_id` into `axis_id` units, if both share a quantity family
    pub fn factor(&self, unit_id: i64, axis_id: i64) -> Option<f64> {
        if !self.axes.iter().any(|a| a.id == axis_id) {
            return None;
        }
        self.lineage
            .get(&unit_id)
            .filter(|l| l.root_id == axis_id)
            .map(|l| l.factor)
    }

    pub fn root_of(&self, unit_id: i64) -> Option<i64> {
        self.lineage.get(&unit_id).map(|l| l.root_id)
    }

    /// Fold per-unit sums into one quantity on the given axis; other families are dropped
    pub fn convert_sum(&self, sums: &[(i64, f64)], axis_id: i64) -> f64 {
        sums.iter()
            .filter_map(|(unit_id, quantity)| self.factor(*unit_id, axis_id).map(|f| quantity * f))
            .sum()
    }
}
