//! Collapsed ("folded") stacks from a top-down cost tree.
//!
//! Format: "outer;inner;site weight"
//!
//! Example: "main;load_config;parse_json 4096"
//! This means: main called load_config which called parse_json, which
//! allocated 4096 bytes itself.

use crate::aggregator::{Cost, CostTree, RowId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The top-down tree, as handed to flame-graph builders
#[derive(Debug, Clone)]
pub struct FlameGraphData {
    pub top_down: Arc<CostTree>,
}

impl FlameGraphData {
    pub fn new(top_down: Arc<CostTree>) -> Self {
        Self { top_down }
    }

    pub fn collapsed(&self, field: CostField) -> Vec<CollapsedStack> {
        collapsed_stacks(&self.top_down, field)
    }
}

/// Which cost accumulator weighs a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostField {
    Allocations,
    Peak,
    Leaked,
    Allocated,
}

impl CostField {
    pub fn value(self, cost: &Cost) -> u64 {
        match self {
            CostField::Allocations => cost.allocations,
            CostField::Peak => cost.peak,
            CostField::Leaked => cost.leaked,
            CostField::Allocated => cost.allocated,
        }
    }
}

impl std::str::FromStr for CostField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allocations" | "count" => Ok(CostField::Allocations),
            "peak" | "consumed" => Ok(CostField::Peak),
            "leaked" | "leak" => Ok(CostField::Leaked),
            "allocated" | "bytes" => Ok(CostField::Allocated),
            other => Err(format!("unknown cost field '{}'", other)),
        }
    }
}

/// A single collapsed stack entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapsedStack {
    /// Frames from outermost to innermost, semicolon-separated
    pub stack: String,

    /// Cost attributed to the innermost frame itself
    pub weight: u64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }

    /// The line as written to a folded file
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Fold a top-down tree into collapsed stacks
///
/// Each row contributes its self cost (own cost minus its children's), so the
/// weights add up to the tree's total. Zero-weight stacks are dropped; the
/// result is sorted by weight, descending, then by stack.
pub fn collapsed_stacks(tree: &CostTree, field: CostField) -> Vec<CollapsedStack> {
    let mut stacks = Vec::new();
    let mut pending: Vec<(RowId, String)> = tree
        .roots()
        .iter()
        .rev()
        .map(|&id| (id, frame_name(tree, id)))
        .collect();

    while let Some((id, path)) = pending.pop() {
        let self_weight = field.value(&tree.self_cost(id));
        if self_weight > 0 {
            stacks.push(CollapsedStack::new(path.clone(), self_weight));
        }
        for &child in tree.children(id).iter().rev() {
            pending.push((child, format!("{};{}", path, frame_name(tree, child))));
        }
    }

    stacks.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));
    debug!("Folded {} collapsed stacks", stacks.len());
    stacks
}

/// Function name with separators that would break the folded format replaced
fn frame_name(tree: &CostTree, id: RowId) -> String {
    tree.row(id).location.function.replace(&[';', ' '][..], "_")
}
