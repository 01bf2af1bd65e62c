//! Arena-backed cost trees shared by the bottom-up and top-down views.
//!
//! Rows live in one vector and refer to each other by `RowId`, so growing a
//! sibling list never invalidates an id handed out earlier. Parent links are
//! still assigned in a single terminal pass (`CostTreeBuilder::finish`) once
//! the shape is final; a `CostTree` therefore always has consistent links.

use super::location::Location;
use crate::utils::error::AggregationError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Stable index of a row inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(usize);

impl RowId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The four cost accumulators carried by every row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// Number of allocation calls
    pub allocations: u64,
    /// Peak bytes outstanding
    pub peak: u64,
    /// Bytes never freed
    pub leaked: u64,
    /// Bytes allocated in total
    pub allocated: u64,
}

impl Cost {
    /// Field-wise difference, clamped at zero
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self {
            allocations: self.allocations.saturating_sub(rhs.allocations),
            peak: self.peak.saturating_sub(rhs.peak),
            leaked: self.leaked.saturating_sub(rhs.leaked),
            allocated: self.allocated.saturating_sub(rhs.allocated),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        self.allocations = self.allocations.saturating_add(rhs.allocations);
        self.peak = self.peak.saturating_add(rhs.peak);
        self.leaked = self.leaked.saturating_add(rhs.leaked);
        self.allocated = self.allocated.saturating_add(rhs.allocated);
    }
}

/// One node of a cost tree
#[derive(Debug, Clone)]
pub struct CostRow {
    pub cost: Cost,
    pub location: Location,
    parent: Option<RowId>,
    children: Vec<RowId>,
}

impl CostRow {
    fn new(location: Location) -> Self {
        Self {
            cost: Cost::default(),
            location,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<RowId> {
        self.parent
    }

    /// Children in sibling (location) order
    pub fn children(&self) -> &[RowId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Mutable tree under construction; parent links are not available yet
#[derive(Debug, Default)]
pub struct CostTreeBuilder {
    rows: Vec<CostRow>,
    roots: Vec<RowId>,
}

impl CostTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row with `location` below `parent` (or at root level), created if missing
    ///
    /// Siblings stay sorted by location, so lookup is a binary search.
    pub fn find_or_insert(&mut self, parent: Option<RowId>, location: Location) -> RowId {
        let position = {
            let siblings = match parent {
                Some(id) => &self.rows[id.0].children,
                None => &self.roots,
            };
            siblings
                .binary_search_by(|sibling| self.rows[sibling.0].location.cmp(&location))
                .map(|found| siblings[found])
        };

        match position {
            Ok(id) => id,
            Err(insert_at) => {
                let id = RowId(self.rows.len());
                self.rows.push(CostRow::new(location));
                match parent {
                    Some(parent) => self.rows[parent.0].children.insert(insert_at, id),
                    None => self.roots.insert(insert_at, id),
                }
                id
            }
        }
    }

    pub fn add_cost(&mut self, id: RowId, cost: Cost) {
        self.rows[id.0].cost += cost;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Freeze the shape and assign every parent link
    ///
    /// # Errors
    /// * `AggregationError::InvariantViolation` - a row is reachable twice
    ///   (shared or cyclic child links) or a sibling list is out of order
    pub fn finish(mut self) -> Result<CostTree, AggregationError> {
        let mut visited = vec![false; self.rows.len()];
        let mut pending: Vec<(RowId, Option<RowId>)> =
            self.roots.iter().rev().map(|&id| (id, None)).collect();

        while let Some((id, parent)) = pending.pop() {
            if std::mem::replace(&mut visited[id.0], true) {
                return Err(AggregationError::InvariantViolation(format!(
                    "cost row {} is reachable more than once",
                    id.0
                )));
            }
            self.rows[id.0].parent = parent;
            pending.extend(self.rows[id.0].children.iter().rev().map(|&c| (c, Some(id))));
        }

        self.check_sibling_order(&self.roots)?;
        for row in &self.rows {
            self.check_sibling_order(&row.children)?;
        }

        debug!(
            "Cost tree finished: {} rows, {} roots",
            self.rows.len(),
            self.roots.len()
        );

        Ok(CostTree {
            rows: self.rows,
            roots: self.roots,
        })
    }

    fn check_sibling_order(&self, siblings: &[RowId]) -> Result<(), AggregationError> {
        for pair in siblings.windows(2) {
            let (left, right) = (&self.rows[pair[0].0], &self.rows[pair[1].0]);
            if left.location >= right.location {
                return Err(AggregationError::InvariantViolation(format!(
                    "siblings out of order: '{}' before '{}'",
                    left.location.function, right.location.function
                )));
            }
        }
        Ok(())
    }
}

/// A finished, immutable cost forest
#[derive(Debug, Clone, Default)]
pub struct CostTree {
    rows: Vec<CostRow>,
    roots: Vec<RowId>,
}

impl CostTree {
    pub fn roots(&self) -> &[RowId] {
        &self.roots
    }

    pub fn row(&self, id: RowId) -> &CostRow {
        &self.rows[id.0]
    }

    pub fn children(&self, id: RowId) -> &[RowId] {
        &self.rows[id.0].children
    }

    pub fn parent(&self, id: RowId) -> Option<RowId> {
        self.rows[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row id, in depth-first pre-order
    pub fn depth_first(&self) -> Vec<RowId> {
        let mut order = Vec::with_capacity(self.rows.len());
        let mut pending: Vec<RowId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            order.push(id);
            pending.extend(self.rows[id.0].children.iter().rev());
        }
        order
    }

    /// Leaf rows in depth-first order
    pub fn leaves(&self) -> Vec<RowId> {
        self.depth_first()
            .into_iter()
            .filter(|&id| self.rows[id.0].is_leaf())
            .collect()
    }

    /// Chain from `id` up to its root, `id` first
    pub fn ancestry(&self, id: RowId) -> Vec<RowId> {
        let mut chain = vec![id];
        let mut current = self.rows[id.0].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.rows[parent.0].parent;
        }
        chain
    }

    /// Sum of the cost over all root rows
    pub fn total_cost(&self) -> Cost {
        let mut total = Cost::default();
        for &id in &self.roots {
            total += self.rows[id.0].cost;
        }
        total
    }

    /// Sum of the cost over all leaf rows
    pub fn leaf_cost(&self) -> Cost {
        let mut total = Cost::default();
        for id in self.leaves() {
            total += self.rows[id.0].cost;
        }
        total
    }

    /// Cost of `id` not accounted for by any of its children
    ///
    /// For a leaf this is its whole cost. An interior row has self cost when
    /// some call path ends at it while others continue below.
    pub fn self_cost(&self, id: RowId) -> Cost {
        let row = &self.rows[id.0];
        let mut below = Cost::default();
        for &child in &row.children {
            below += self.rows[child.0].cost;
        }
        row.cost.saturating_sub(below)
    }

    /// Root row with the given function name, if any
    pub fn find_root(&self, function: &str) -> Option<RowId> {
        self.find_in(&self.roots, function)
    }

    /// Child of `id` with the given function name, if any
    pub fn find_child(&self, id: RowId, function: &str) -> Option<RowId> {
        self.find_in(&self.rows[id.0].children, function)
    }

    fn find_in(&self, siblings: &[RowId], function: &str) -> Option<RowId> {
        siblings
            .iter()
            .copied()
            .find(|&id| self.rows[id.0].location.function == function)
    }

    /// Id-linked copy of the arena, for serialization
    ///
    /// Row `i` of the result is the row with `RowId` index `i`, so the output
    /// nests no deeper than a single row however deep the call paths go.
    pub fn to_flat(&self) -> FlatTree {
        FlatTree {
            roots: self.roots.iter().map(|id| id.0).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| FlatRow {
                    location: row.location.clone(),
                    cost: row.cost,
                    parent: row.parent.map(|id| id.0),
                    children: row.children.iter().map(|id| id.0).collect(),
                })
                .collect(),
        }
    }
}

/// A cost tree as written to reports: rows linked by index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatTree {
    pub roots: Vec<usize>,
    pub rows: Vec<FlatRow>,
}

impl FlatTree {
    pub fn root_rows(&self) -> impl Iterator<Item = &FlatRow> + '_ {
        self.roots.iter().filter_map(|&index| self.rows.get(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub location: Location,
    #[serde(flatten)]
    pub cost: Cost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
}
