//! Cost model of join algorithms.

use std::fmt::{Debug, Formatter};

use crate::catalog::{CatalogRef, TableStatisticsRef};
use crate::config::OptimizerConfig;
use crate::cost::selectivity::{range_fraction, selectivity};
use crate::cost::{
    Cost, CostEstimationContext, CostEstimator, InputGroup, COMPARE_CPU, C_CPU, C_IO, C_IO_INDEX, HASH_BUILD_CPU,
    HASH_PROBE_CPU, MERGE_CPU,
};
use crate::memo::TableSet;
use crate::operators::join::{CmpOp, JoinCondition, JoinType};
use crate::operators::logical::LogicalExpr;
use crate::operators::physical::PhysicalExpr;
use crate::operators::Operator;
use crate::statistics::{ColumnStatistics, DEFAULT_ROW_SIZE};

/// A [CostEstimator] that uses statistics stored in a [catalog](crate::catalog::Catalog).
///
/// The model is a pure function of an operator and the best known plans of its inputs:
/// it never modifies the catalog.
pub struct JoinCostModel {
    catalog: CatalogRef,
    config: OptimizerConfig,
}

impl JoinCostModel {
    pub fn new(catalog: CatalogRef, config: OptimizerConfig) -> Self {
        JoinCostModel { catalog, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Estimates the selectivity of the given join condition.
    /// The left column of the condition belongs to the `left` input and the right column to the `right` input.
    pub fn join_selectivity(&self, condition: &JoinCondition, left: &InputGroup, right: &InputGroup) -> f64 {
        let left_stats = self.column_owner(&left.tables, &condition.left_column);
        let right_stats = self.column_owner(&right.tables, &condition.right_column);
        selectivity(
            condition.op,
            column(&left_stats, &condition.left_column),
            column(&right_stats, &condition.right_column),
        )
    }

    // Statistics of a join result take precedence over statistics of its base tables.
    fn column_owner(&self, tables: &TableSet, column: &str) -> Option<TableStatisticsRef> {
        let key = tables.key();
        if let Some(stats) = self.catalog.get_statistics(&key) {
            if stats.column(column).is_some() {
                return Some(stats);
            }
        }
        if tables.len() > 1 {
            for table in tables.iter() {
                if let Some(stats) = self.catalog.get_statistics(table) {
                    if stats.column(column).is_some() {
                        return Some(stats);
                    }
                }
            }
        }
        None
    }

    fn pages(&self, input: &InputGroup) -> f64 {
        if !input.partition {
            if let Some(stats) = self.catalog.get_statistics(&input.tables.key()) {
                return stats.file_pages();
            }
        }
        (input.bytes() / self.config.page_size()).ceil()
    }

    fn join_card(&self, condition: &JoinCondition, left: &InputGroup, right: &InputGroup) -> f64 {
        left.card * right.card * self.join_selectivity(condition, left, right)
    }

    fn cost_scan(&self, table: &str, card: u64) -> Cost {
        match self.catalog.get_statistics(table) {
            Some(stats) => stats.file_pages() * C_IO + stats.row_count() * C_CPU,
            None => {
                let rows = card as f64;
                let pages = (rows * DEFAULT_ROW_SIZE / self.config.page_size()).ceil();
                log::trace!("Cost: no statistics for table {}. Estimated pages: {}", table, pages);
                pages * C_IO + rows * C_CPU
            }
        }
    }

    fn cost_generic_join(&self, condition: &JoinCondition, left: &InputGroup, right: &InputGroup) -> Cost {
        let sel = self.join_selectivity(condition, left, right);
        let penalty = skew_penalty(left.card, right.card);
        left.cost + right.cost + left.card * right.card * sel * COMPARE_CPU * penalty
    }

    fn cost_hash_join(
        &self,
        condition: &JoinCondition,
        build_side_left: bool,
        left: &InputGroup,
        right: &InputGroup,
    ) -> Cost {
        let (build, probe) = if build_side_left { (left, right) } else { (right, left) };

        let build_bytes = build.bytes();
        if build_bytes > self.config.work_memory_bytes() {
            log::debug!(
                "Cost: hash table does not fit into memory: {} bytes > {} bytes",
                build_bytes,
                self.config.work_memory_bytes()
            );
            return f64::INFINITY;
        }

        let sel = self.join_selectivity(condition, left, right);
        let join_card = build.card * probe.card * sel;
        let cpu_unmatched = unmatched_rows(condition.join_type, build_side_left, build.card, probe.card, sel) * COMPARE_CPU;

        build.cost
            + probe.cost
            + build.card * HASH_BUILD_CPU
            + probe.card * HASH_PROBE_CPU
            + join_card * COMPARE_CPU
            + cpu_unmatched
    }

    fn cost_partitioned_hash_join(
        &self,
        condition: &JoinCondition,
        build_side_left: bool,
        left: &InputGroup,
        right: &InputGroup,
        depth: usize,
    ) -> Cost {
        let (build, probe) = if build_side_left { (left, right) } else { (right, left) };
        let build_bytes = build.bytes();
        let probe_bytes = probe.bytes();
        let available = self.config.available_memory();

        if build_bytes * self.config.partition_memory_factor() < available {
            return self.cost_hash_join(condition, build_side_left, left, right);
        }
        if depth >= self.config.max_partition_depth() {
            log::trace!("Cost: partitioning depth limit reached. Falling back to block nested loop join");
            return self.cost_block_nested_loop_join(condition, build_side_left, left, right);
        }

        let num_partitions = (2.0 * build_bytes / available).ceil().max(2.0);

        // write and read both inputs once
        let io = (build_bytes + probe_bytes) / self.config.page_size() * 2.0 * C_IO;

        let left_partition = left.partition(num_partitions);
        let right_partition = right.partition(num_partitions);
        let (build_partition, probe_partition) = if build_side_left {
            (&left_partition, &right_partition)
        } else {
            (&right_partition, &left_partition)
        };

        let sel = self.join_selectivity(condition, left, right);
        let matches = build_partition.card * probe_partition.card * sel;
        let unmatched =
            unmatched_rows(condition.join_type, build_side_left, build_partition.card, probe_partition.card, sel);
        let cpu_partition = build_partition.card * HASH_BUILD_CPU
            + probe_partition.card * HASH_PROBE_CPU
            + matches * COMPARE_CPU
            + unmatched * COMPARE_CPU;
        let cpu = num_partitions * cpu_partition;

        let partition_cost =
            self.cost_partitioned_hash_join(condition, build_side_left, &left_partition, &right_partition, depth + 1);

        build.cost + probe.cost + io + cpu + num_partitions * partition_cost
    }

    fn cost_index_nested_loop_join(&self, condition: &JoinCondition, outer: &InputGroup, inner: &InputGroup) -> Cost {
        let index = inner
            .tables
            .single_table()
            .and_then(|table| self.catalog.get_index(table, &condition.right_column));
        let index = match index {
            Some(index) => index,
            None => {
                log::debug!("Cost: no index on {} of {}", condition.right_column, inner.tables);
                return f64::INFINITY;
            }
        };

        let outer_stats = self.column_owner(&outer.tables, &condition.left_column);
        let inner_stats = self.column_owner(&inner.tables, &condition.right_column);
        let outer_column = column(&outer_stats, &condition.left_column);
        let inner_column = column(&inner_stats, &condition.right_column);

        let sel = selectivity(condition.op, outer_column, inner_column);
        let is_range = condition.op.is_range();
        let seek_sel = if is_range {
            range_fraction(condition.op, outer_column, inner_column)
        } else {
            sel
        };

        let join_card = outer.card * inner.card * seek_sel;
        let fan_out = if outer.card > 0.0 {
            inner.card * seek_sel / outer.card
        } else {
            0.0
        };
        let seek_factor = if condition.op == CmpOp::NotEq { 2.0 } else { 1.0 };
        let height = index.height() as f64;
        let seek = if is_range {
            height * C_IO_INDEX + C_IO_INDEX * fan_out
        } else {
            height * C_IO_INDEX + C_IO_INDEX
        };

        let seek_io = outer.card * seek * seek_factor;
        let read_io = join_card * C_IO;
        let cpu = join_card * COMPARE_CPU;

        // inner rows without a match are found by a full scan of the index leaves
        let unmatched = if condition.join_type.preserves_right() {
            let unmatched_rows = inner.card * (1.0 - sel).max(0.0);
            index.leaf_pages() as f64 * C_IO + unmatched_rows * (C_IO + COMPARE_CPU)
        } else {
            0.0
        };

        outer.cost + inner.cost + seek_io + read_io + cpu + unmatched
    }

    fn cost_block_nested_loop_join(
        &self,
        condition: &JoinCondition,
        outer_left: bool,
        left: &InputGroup,
        right: &InputGroup,
    ) -> Cost {
        let (outer, inner) = if outer_left { (left, right) } else { (right, left) };

        let sel = self.join_selectivity(condition, left, right);
        let join_card = outer.card * inner.card * sel;

        let io = (self.pages(outer) + self.pages(inner)) * C_IO;

        let inner_bytes = inner.bytes();
        let penalty = if inner_bytes > 0.0 {
            ((outer.bytes() / inner_bytes).max(1.0) + 1.0).log2()
        } else {
            1.0
        };
        let cpu_compare = outer.card * inner.card * COMPARE_CPU * penalty;
        let cpu_merge = join_card * MERGE_CPU;
        let cpu_unmatched = unmatched_rows(condition.join_type, outer_left, outer.card, inner.card, sel) * MERGE_CPU;

        let total = outer.cost + inner.cost + io + cpu_compare + cpu_merge + cpu_unmatched;
        log::trace!(
            "Cost: block nested loop sel={} join_card={} io={} compare={} merge={} unmatched={} total={}",
            sel,
            join_card,
            io,
            cpu_compare,
            cpu_merge,
            cpu_unmatched,
            total
        );
        total
    }

    fn cost_sort_merge_join(
        &self,
        condition: &JoinCondition,
        already_sorted: bool,
        left: &InputGroup,
        right: &InputGroup,
    ) -> Cost {
        let sort = if condition.op == CmpOp::Eq && !already_sorted {
            self.sort_cost(left) + self.sort_cost(right)
        } else {
            0.0
        };

        let merge = if condition.op == CmpOp::Eq {
            (left.card + right.card) * COMPARE_CPU
        } else {
            // non-equi conditions compare every pair of rows
            left.card * right.card * COMPARE_CPU
        };

        let unmatched = match (condition.op, condition.join_type) {
            // all pairs of distinct keys form the output of an inner (full) join
            (CmpOp::NotEq, JoinType::Inner) | (CmpOp::NotEq, JoinType::Full) => 0.0,
            (_, join_type) => {
                let left_rows = if join_type.preserves_left() { left.card } else { 0.0 };
                let right_rows = if join_type.preserves_right() { right.card } else { 0.0 };
                (left_rows + right_rows) * COMPARE_CPU
            }
        };

        left.cost + right.cost + sort + merge + unmatched
    }

    // The cost of an external sort of the given input excluding the cost of the input itself.
    fn sort_cost(&self, input: &InputGroup) -> Cost {
        let pages = self.pages(input);
        let runs = (pages / self.config.work_memory_pages()).ceil().max(1.0);
        let passes = if runs <= 1.0 { 0.0 } else { runs.log2().ceil() };

        let io = pages * (passes + 1.0) * C_IO;
        let cpu = input.card * input.card.max(1.0).log2() * COMPARE_CPU;
        io + cpu
    }

    fn binary_inputs<'a>(&self, operator: &Operator, ctx: &'a CostEstimationContext) -> Option<(&'a InputGroup, &'a InputGroup)> {
        match (ctx.input(0), ctx.input(1)) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => {
                log::debug!("Cost: {} expects two inputs but got {}", operator, ctx.inputs().len());
                None
            }
        }
    }
}

impl CostEstimator for JoinCostModel {
    fn estimate_cost(&self, operator: &Operator, ctx: &CostEstimationContext) -> Cost {
        match operator {
            Operator::Logical(LogicalExpr::Scan { table, card }) => self.cost_scan(table, *card),
            Operator::Logical(LogicalExpr::Sort { .. }) => match ctx.input(0) {
                Some(input) => input.cost + self.sort_cost(input),
                None => f64::INFINITY,
            },
            Operator::Logical(LogicalExpr::Join { condition }) => match self.binary_inputs(operator, ctx) {
                Some((left, right)) => self.cost_generic_join(condition, left, right),
                None => f64::INFINITY,
            },
            Operator::Physical(expr) => {
                let (left, right) = match self.binary_inputs(operator, ctx) {
                    Some(inputs) => inputs,
                    None => return f64::INFINITY,
                };
                match expr {
                    PhysicalExpr::HashJoin {
                        condition,
                        build_side_left,
                        partitioned: false,
                    } => self.cost_hash_join(condition, *build_side_left, left, right),
                    PhysicalExpr::HashJoin {
                        condition,
                        build_side_left,
                        partitioned: true,
                    } => self.cost_partitioned_hash_join(condition, *build_side_left, left, right, 0),
                    PhysicalExpr::BlockNestedLoopJoin { condition, outer_left } => {
                        self.cost_block_nested_loop_join(condition, *outer_left, left, right)
                    }
                    PhysicalExpr::IndexNestedLoopJoin { condition, .. } => {
                        self.cost_index_nested_loop_join(condition, left, right)
                    }
                    PhysicalExpr::SortMergeJoin {
                        condition,
                        already_sorted,
                    } => self.cost_sort_merge_join(condition, *already_sorted, left, right),
                }
            }
        }
    }

    fn estimate_cardinality(&self, operator: &Operator, ctx: &CostEstimationContext) -> f64 {
        match operator {
            Operator::Logical(LogicalExpr::Scan { card, .. }) => *card as f64,
            Operator::Logical(LogicalExpr::Sort { .. }) => ctx.input(0).map(|i| i.card).unwrap_or(f64::INFINITY),
            _ => match (operator.join_condition(), self.binary_inputs(operator, ctx)) {
                (Some(condition), Some((left, right))) => self.join_card(condition, left, right),
                _ => f64::INFINITY,
            },
        }
    }

    fn estimate_row_size(&self, operator: &Operator, ctx: &CostEstimationContext) -> f64 {
        match operator {
            Operator::Logical(LogicalExpr::Scan { table, .. }) => self
                .catalog
                .get_statistics(table)
                .map(|s| s.avg_row_size())
                .unwrap_or(DEFAULT_ROW_SIZE),
            _ => ctx.inputs().iter().map(|i| i.row_size).sum(),
        }
    }
}

impl Debug for JoinCostModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinCostModel").field("config", &self.config).finish()
    }
}

fn column<'a>(stats: &'a Option<TableStatisticsRef>, name: &str) -> Option<&'a ColumnStatistics> {
    stats.as_ref().and_then(|s| s.column(name))
}

fn skew_penalty(left_card: f64, right_card: f64) -> f64 {
    if left_card > right_card && right_card > 0.0 {
        left_card / right_card
    } else {
        1.0
    }
}

// The number of rows of both sides of a join that have no match and appear in the output.
// `first_left` tells whether the first side is the left input of the join.
fn unmatched_rows(join_type: JoinType, first_left: bool, first_card: f64, second_card: f64, sel: f64) -> f64 {
    let (first_preserved, second_preserved) = if first_left {
        (join_type.preserves_left(), join_type.preserves_right())
    } else {
        (join_type.preserves_right(), join_type.preserves_left())
    };
    let first = if first_preserved { first_card * (1.0 - sel) } else { 0.0 };
    let second = if second_preserved { second_card * (1.0 - sel) } else { 0.0 };
    first + second
}
