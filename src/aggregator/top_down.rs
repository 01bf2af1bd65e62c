//! Top-down cost tree: outermost callers at the roots, allocation sites below.
//!
//! Built by inverting the bottom-up tree. Each row carries only its self cost
//! into the inversion: an interior bottom-up row already sums every path
//! beneath it, and only the remainder belongs to paths that end at the row.

use super::tree::{CostTree, CostTreeBuilder, RowId};
use crate::utils::error::AggregationError;
use log::debug;

/// Invert a bottom-up forest
///
/// **Public** - main entry point for the top-down view
///
/// # Algorithm
/// 1. Visit the bottom-up rows in depth-first order
/// 2. Skip rows whose self cost is zero (fully covered by their children)
/// 3. Walk the row's parent chain (row first, allocation site last)
/// 4. Find-or-insert one top-down row per visited node, descending a level
///    per step, and add the self cost to each of them
pub fn to_top_down(bottom_up: &CostTree) -> Result<CostTree, AggregationError> {
    let mut builder = CostTreeBuilder::new();
    let mut path_count = 0usize;

    for id in bottom_up.depth_first() {
        let cost = bottom_up.self_cost(id);
        if cost.is_zero() {
            continue;
        }

        path_count += 1;
        let mut node = Some(id);
        let mut parent: Option<RowId> = None;
        while let Some(current) = node {
            let inserted =
                builder.find_or_insert(parent, bottom_up.row(current).location.clone());
            builder.add_cost(inserted, cost);
            parent = Some(inserted);
            node = bottom_up.parent(current);
        }
    }

    debug!(
        "Inverted {} bottom-up paths into {} top-down rows",
        path_count,
        builder.len()
    );
    builder.finish()
}
