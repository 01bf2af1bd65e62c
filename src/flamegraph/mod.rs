//! Flame-graph input derived from the top-down tree.
//!
//! Layout and rendering belong to external tools; this module only re-exposes
//! the top-down forest and folds it into collapsed-stack lines.

pub mod collapsed;

// Re-export main types
pub use collapsed::{collapsed_stacks, CollapsedStack, CostField, FlameGraphData};
