//! Cost-model.

use crate::memo::{Group, TableSet};
use crate::operators::Operator;

pub mod model;
pub mod selectivity;

pub type Cost = f64;

/// The cost of reading or writing a page.
pub const C_IO: f64 = 1.0;
/// The cost of processing a row.
pub const C_CPU: f64 = 0.01;
/// The cost of reading an index page.
pub const C_IO_INDEX: f64 = 0.75 * C_IO;
/// The cost of inserting a row into a hash table.
pub const HASH_BUILD_CPU: f64 = 3.0 * C_CPU;
/// The cost of looking up a row in a hash table.
pub const HASH_PROBE_CPU: f64 = 2.0 * C_CPU;
/// The cost of producing an output row.
pub const MERGE_CPU: f64 = C_CPU;
/// The cost of comparing two keys.
pub const COMPARE_CPU: f64 = C_CPU;

/// Estimates the cost, the cardinality and the row size of an operator.
/// Implementations must not fail: operators that can not be costed are assigned `f64::INFINITY`.
pub trait CostEstimator {
    /// Estimates the total cost of the given operator including the cost of its inputs.
    fn estimate_cost(&self, operator: &Operator, ctx: &CostEstimationContext) -> Cost;

    /// Estimates the number of rows produced by the given operator.
    fn estimate_cardinality(&self, operator: &Operator, ctx: &CostEstimationContext) -> f64;

    /// Estimates the average size of a row produced by the given operator in bytes.
    fn estimate_row_size(&self, operator: &Operator, ctx: &CostEstimationContext) -> f64;
}

/// Provides information about the inputs of an operator.
#[derive(Debug, Clone, Default)]
pub struct CostEstimationContext {
    inputs: Vec<InputGroup>,
}

impl CostEstimationContext {
    pub fn new(inputs: Vec<InputGroup>) -> Self {
        CostEstimationContext { inputs }
    }

    /// Returns the i-th input.
    pub fn input(&self, i: usize) -> Option<&InputGroup> {
        self.inputs.get(i)
    }

    pub fn inputs(&self) -> &[InputGroup] {
        &self.inputs
    }
}

/// A summary of the best known plan of an input group.
#[derive(Debug, Clone, PartialEq)]
pub struct InputGroup {
    pub tables: TableSet,
    /// The cost of the best expression of the group.
    pub cost: f64,
    /// The estimated number of rows.
    pub card: f64,
    /// The average row size in bytes.
    pub row_size: f64,
    /// Whether this is a single partition of a group rather than the group itself.
    pub partition: bool,
}

impl InputGroup {
    pub fn new(tables: TableSet, cost: f64, card: f64, row_size: f64) -> Self {
        InputGroup {
            tables,
            cost,
            card,
            row_size,
            partition: false,
        }
    }

    /// Summarises the best expression of the given group.
    pub fn from_group(group: &Group) -> Self {
        InputGroup::new(group.tables().clone(), group.best_cost(), group.best_card(), group.avg_row_size())
    }

    /// The estimated size of the input in bytes.
    pub fn bytes(&self) -> f64 {
        self.card * self.row_size
    }

    /// Returns one of `num_partitions` equal partitions of this input.
    /// Reading a partition costs nothing: the cost of the input is accounted for by the caller.
    pub fn partition(&self, num_partitions: f64) -> InputGroup {
        InputGroup {
            tables: self.tables.clone(),
            cost: 0.0,
            card: self.card / num_partitions,
            row_size: self.row_size,
            partition: true,
        }
    }
}
