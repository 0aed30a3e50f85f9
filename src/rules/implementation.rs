//! Implementation rules. See [rules module](super).

use crate::error::OptimizerError;
use crate::memo::{ExprId, GroupId, Memo, MemoExpr};
use crate::operators::join::{CmpOp, JoinCondition, JoinType};
use crate::operators::physical::PhysicalExpr;
use crate::rules::{insert_new, Rule, RuleContext, RuleType};
use crate::statistics::TableStatistics;

/// Implements an equi-join as a hash join that builds a hash table on the left input.
/// When the estimated size of the left input exceeds the [hash build threshold] the hash join is partitioned.
///
/// [hash build threshold]: crate::config::OptimizerConfig::hash_build_threshold
#[derive(Debug)]
pub struct HashJoinRule;

impl Rule for HashJoinRule {
    fn name(&self) -> String {
        "HashJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.operator().logical_join(), Some(condition) if condition.is_equi_join())
    }

    fn apply(&self, ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        let (condition, left, right) = match join_inputs(expr) {
            Some(inputs) => inputs,
            None => return Ok(Vec::new()),
        };

        let left_group = memo.get_group(left)?;
        // unknown cardinality is infinite: such inputs are partitioned
        let build_bytes = left_group.best_card() * left_group.avg_row_size();
        let partitioned = !(build_bytes < ctx.config().hash_build_threshold());

        log::debug!(
            "HashJoinRule: build side {} bytes={} threshold={} partitioned={}",
            left_group.tables(),
            build_bytes,
            ctx.config().hash_build_threshold(),
            partitioned
        );

        let hash_join = PhysicalExpr::HashJoin {
            condition,
            build_side_left: true,
            partitioned,
        };
        let mut out = Vec::new();
        insert_new(memo, hash_join.into(), vec![left, right], &mut out)?;
        Ok(out)
    }
}

/// Implements a join as an index nested loop join when there is an index on the join column of the right input.
#[derive(Debug)]
pub struct IndexNestedLoopJoinRule;

impl Rule for IndexNestedLoopJoinRule {
    fn name(&self) -> String {
        "IndexNestedLoopJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(
            expr.operator().logical_join(),
            Some(condition) if matches!(condition.join_type, JoinType::Inner | JoinType::Left | JoinType::Right)
        )
    }

    fn apply(&self, ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        let (condition, left, right) = match join_inputs(expr) {
            Some(inputs) => inputs,
            None => return Ok(Vec::new()),
        };

        let right_group = memo.get_group(right)?;
        let table = match right_group.tables().single_table() {
            Some(table) => table.to_string(),
            None => return Ok(Vec::new()),
        };
        let catalog = ctx.catalog();
        let index_path = match (
            catalog.get_index(&table, &condition.right_column),
            catalog.get_index_path(&table, &condition.right_column),
        ) {
            (Some(_), Some(path)) => path,
            _ => {
                log::debug!("IndexNestedLoopJoinRule: no index on {}.{}", table, condition.right_column);
                return Ok(Vec::new());
            }
        };

        let index_join = PhysicalExpr::IndexNestedLoopJoin { condition, index_path };
        let mut out = Vec::new();
        insert_new(memo, index_join.into(), vec![left, right], &mut out)?;
        Ok(out)
    }
}

/// Implements a join of two base tables stored in the order of their join columns as a merge join.
/// Both tables must fit into memory.
#[derive(Debug)]
pub struct SortMergeJoinRule;

impl Rule for SortMergeJoinRule {
    fn name(&self) -> String {
        "SortMergeJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn matches(&self, ctx: &RuleContext, memo: &Memo, expr: &MemoExpr) -> bool {
        let condition = match expr.operator().logical_join() {
            Some(condition) if condition.op != CmpOp::NotEq => condition,
            _ => return false,
        };
        let tables: Vec<String> = expr
            .children()
            .iter()
            .filter_map(|c| memo.get_group(*c).ok())
            .filter_map(|g| g.tables().single_table().map(String::from))
            .collect();
        let (left_table, right_table) = match tables.as_slice() {
            [left, right] => (left, right),
            _ => return false,
        };

        let catalog = ctx.catalog();
        let (left_stats, right_stats) = match (catalog.get_statistics(left_table), catalog.get_statistics(right_table)) {
            (Some(left), Some(right)) => (left, right),
            _ => return false,
        };

        let sorted = |stats: &TableStatistics, column: &str| {
            stats.column(column).map(|c| c.was_sorted()).unwrap_or_default()
        };
        let already_sorted =
            sorted(&left_stats, &condition.left_column) && sorted(&right_stats, &condition.right_column);
        let fits_memory = ctx.config().fits_merge_memory(left_stats.total_bytes() + right_stats.total_bytes());

        log::debug!("SortMergeJoinRule: sorted={} fits_memory={}", already_sorted, fits_memory);

        already_sorted && fits_memory
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        let (condition, left, right) = match join_inputs(expr) {
            Some(inputs) => inputs,
            None => return Ok(Vec::new()),
        };
        let merge_join = PhysicalExpr::SortMergeJoin {
            condition,
            already_sorted: true,
        };
        let mut out = Vec::new();
        insert_new(memo, merge_join.into(), vec![left, right], &mut out)?;
        Ok(out)
    }
}

/// Implements any join as a block nested loop join with the left input as the outer input.
#[derive(Debug)]
pub struct BlockNestedLoopJoinRule;

impl Rule for BlockNestedLoopJoinRule {
    fn name(&self) -> String {
        "BlockNestedLoopJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        expr.operator().logical_join().is_some()
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        let (condition, left, right) = match join_inputs(expr) {
            Some(inputs) => inputs,
            None => return Ok(Vec::new()),
        };
        let nested_loop = PhysicalExpr::BlockNestedLoopJoin {
            condition,
            outer_left: true,
        };
        let mut out = Vec::new();
        insert_new(memo, nested_loop.into(), vec![left, right], &mut out)?;
        Ok(out)
    }
}

fn join_inputs(expr: &MemoExpr) -> Option<(JoinCondition, GroupId, GroupId)> {
    match (expr.operator().logical_join(), expr.children()) {
        (Some(condition), [left, right]) => Some((condition.clone(), *left, *right)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::rules::testing::RuleTester;

    fn condition(join_type: JoinType, left: &str, right: &str, op: CmpOp) -> JoinCondition {
        JoinCondition::new(join_type, left, right, op)
    }

    #[test]
    fn test_hash_join() {
        let mut tester = RuleTester::new();
        let join = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::Eq), "A", "B");

        tester.apply(
            &HashJoinRule,
            join,
            r#"
02 Join INNER a1 = b1 [00, 01]
   HashJoin INNER a1 = b1 build=left [00, 01]
01 Scan B card=50
00 Scan A card=100
"#,
        );
    }

    #[test]
    fn test_hash_join_partitioned() {
        // 100 rows * 100 bytes >= 0.4 * 20_000
        let mut tester = RuleTester::with_config(OptimizerConfig::with_memory(20_000));
        let join = tester.join(condition(JoinType::Left, "a1", "b1", CmpOp::Eq), "A", "B");

        let new_exprs = tester.apply_rule(&HashJoinRule, join);
        assert_eq!(new_exprs, vec!["GraceHashJoin LEFT a1 = b1 build=left [00, 01]"]);
    }

    #[test]
    fn test_hash_join_unknown_cardinality_is_partitioned() {
        let mut tester = RuleTester::new();
        let ab = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::Eq), "A", "B");
        let ab = tester.group_of(ab);
        let abc = tester.join_groups(condition(JoinType::Inner, "b1", "c1", CmpOp::Eq), ab, "C");

        let new_exprs = tester.apply_rule(&HashJoinRule, abc);
        assert_eq!(new_exprs, vec!["GraceHashJoin INNER b1 = c1 build=left [02, 03]"]);
    }

    #[test]
    fn test_hash_join_requires_equality() {
        let mut tester = RuleTester::new();
        let join = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::Lt), "A", "B");
        tester.no_match(&HashJoinRule, join);
    }

    #[test]
    fn test_index_nested_loop() {
        let mut tester = RuleTester::new();
        let join = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::GtEq), "A", "B");

        tester.apply(
            &IndexNestedLoopJoinRule,
            join,
            r#"
02 Join INNER a1 >= b1 [00, 01]
   IndexNestedLoopJoin INNER a1 >= b1 index=B_b1.idx [00, 01]
01 Scan B card=50
00 Scan A card=100
"#,
        );
    }

    #[test]
    fn test_index_nested_loop_without_index() {
        let mut tester = RuleTester::new();
        // no index on B.b2
        let join = tester.join(condition(JoinType::Left, "a1", "b2", CmpOp::Eq), "A", "B");
        let new_exprs = tester.apply_rule(&IndexNestedLoopJoinRule, join);
        assert!(new_exprs.is_empty(), "no index: {:?}", new_exprs);

        let full = tester.join(condition(JoinType::Full, "a1", "b1", CmpOp::Eq), "A", "B");
        tester.no_match(&IndexNestedLoopJoinRule, full);
    }

    #[test]
    fn test_sort_merge() {
        let mut tester = RuleTester::new();
        let join = tester.join(condition(JoinType::Right, "a1", "b1", CmpOp::Lt), "A", "B");

        let new_exprs = tester.apply_rule(&SortMergeJoinRule, join);
        assert_eq!(new_exprs, vec!["MergeJoin RIGHT a1 < b1 [00, 01]"]);
    }

    #[test]
    fn test_sort_merge_does_not_match() {
        let mut tester = RuleTester::new();

        let not_equal = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::NotEq), "A", "B");
        tester.no_match(&SortMergeJoinRule, not_equal);

        let not_sorted = tester.join(condition(JoinType::Inner, "a1", "c1", CmpOp::Eq), "A", "C");
        tester.no_match(&SortMergeJoinRule, not_sorted);

        let ab = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::Eq), "A", "B");
        let ab = tester.group_of(ab);
        let not_base_table = tester.join_groups(condition(JoinType::Inner, "a1", "c1", CmpOp::Eq), ab, "C");
        tester.no_match(&SortMergeJoinRule, not_base_table);
    }

    #[test]
    fn test_sort_merge_requires_memory() {
        // 10_000 + 5_000 bytes * 1.2 > 16_000
        let mut tester = RuleTester::with_config(OptimizerConfig::with_memory(16_000));
        let join = tester.join(condition(JoinType::Inner, "a1", "b1", CmpOp::Eq), "A", "B");
        tester.no_match(&SortMergeJoinRule, join);
    }

    #[test]
    fn test_block_nested_loop() {
        let mut tester = RuleTester::new();
        let join = tester.join(condition(JoinType::Full, "a2", "b2", CmpOp::NotEq), "A", "B");

        let new_exprs = tester.apply_rule(&BlockNestedLoopJoinRule, join);
        assert_eq!(new_exprs, vec!["BlockNestedLoopJoin FULL a2 <> b2 outer=left [00, 01]"]);

        let new_exprs = tester.apply_rule(&BlockNestedLoopJoinRule, join);
        assert!(new_exprs.is_empty(), "duplicate expression");
    }
}
