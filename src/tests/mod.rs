use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::memo::{format_memo, Memo, TableSet};
use crate::operators::join::{CmpOp, Join, JoinCondition, JoinType};
use crate::operators::logical::LogicalExpr;
use crate::operators::physical::PhysicalExpr;
use crate::operators::Operator;
use crate::optimizer::Optimizer;
use crate::plan::{format_plan, PlanNode};
use crate::testing::OptimizerTester;

fn join(left: &str, left_column: &str, join_type: JoinType, right: &str, right_column: &str) -> Join {
    Join::new(left, right, JoinCondition::new(join_type, left_column, right_column, CmpOp::Eq))
}

fn scanned_tables(plan: &PlanNode) -> Vec<String> {
    fn collect(node: &PlanNode, tables: &mut Vec<String>) {
        if let Operator::Logical(LogicalExpr::Scan { table, .. }) = &node.operator {
            tables.push(table.clone());
        }
        for child in node.children.iter() {
            collect(child, tables);
        }
    }
    let mut tables = Vec::new();
    collect(plan, &mut tables);
    tables.sort();
    tables
}

fn expect_no_duplicates(memo: &Memo) {
    for group in memo.groups() {
        let exprs = memo.group_exprs(group.id()).unwrap();
        let unique: HashSet<String> = exprs.iter().map(|e| e.to_string()).collect();
        assert_eq!(unique.len(), exprs.len(), "group {} contains duplicates:\n{}", group.id(), format_memo(memo));
    }
}

fn chain_of_three() -> Vec<Join> {
    vec![
        Join::inner("customer", "c_custkey", "orders", "o_custkey"),
        Join::inner("orders", "o_orderkey", "lineitem", "l_orderkey"),
    ]
}

#[test]
fn test_hash_join() {
    let tester = OptimizerTester::new();
    tester.expect_plan(
        &[Join::inner("customer", "c_custkey", "orders", "o_custkey")],
        r#"
HashJoin INNER c_custkey = o_custkey build=left
  Scan customer card=15000
  Scan orders card=150000
"#,
    );
}

#[test]
fn test_sort_merge_join_of_sorted_tables() {
    let tester = OptimizerTester::new();
    let (plan, _) = tester.optimize(&[Join::inner("A", "a1", "B", "b1")]);

    assert!(
        matches!(&plan.best.operator, Operator::Physical(PhysicalExpr::SortMergeJoin { already_sorted: true, .. })),
        "plan:\n{}",
        format_plan(&plan.best)
    );
    // scans: 2 pages + 100 rows, 1 page + 50 rows. merge: 150 rows
    assert_eq!(plan.best.cost, 6.0);
    assert_eq!(plan.best.cardinality, 50.0);
}

#[test]
fn test_index_nested_loop_join() {
    let tester = OptimizerTester::new();
    tester.expect_plan(
        &[Join::inner("nation", "n_nationkey", "lineitem", "l_orderkey")],
        r#"
IndexNestedLoopJoin INNER n_nationkey = l_orderkey index=lineitem_l_orderkey.idx
  Scan nation card=25
  Scan lineitem card=600000
"#,
    );
}

#[test]
fn test_small_memory_requires_partitioned_hash_join() {
    let tester = OptimizerTester::with_config(OptimizerConfig::with_memory(4_000_000));
    let (plan, _) = tester.optimize(&[Join::inner("customer", "c_custkey", "orders", "o_custkey")]);

    assert!(
        matches!(&plan.best.operator, Operator::Physical(PhysicalExpr::HashJoin { partitioned: true, .. })),
        "plan:\n{}",
        format_plan(&plan.best)
    );
    assert!(plan.best.cost.is_finite());
}

#[test]
fn test_outer_join_keeps_its_type() {
    let tester = OptimizerTester::new();
    let (plan, memo) = tester.optimize(&[join("customer", "c_custkey", JoinType::Left, "orders", "o_custkey")]);

    for expr in memo.group_exprs(plan.root_group).unwrap() {
        let join_type = expr.operator().join_condition().map(|c| c.join_type);
        assert!(
            matches!(join_type, Some(JoinType::Left) | Some(JoinType::Right)),
            "unexpected expression: {}",
            expr
        );
    }
    assert!(memo.group_exprs(plan.root_group).unwrap().iter().any(|e| e.to_string().starts_with("Join RIGHT")));
    assert_eq!(scanned_tables(&plan.best), vec!["customer", "orders"]);
}

#[test]
fn test_full_join() {
    let tester = OptimizerTester::new();
    let (plan, _) = tester.optimize(&[join("A", "a1", JoinType::Full, "B", "b1")]);

    let condition = plan.best.operator.join_condition().expect("join");
    assert_eq!(condition.join_type, JoinType::Full);
    assert!(!matches!(&plan.best.operator, Operator::Physical(PhysicalExpr::IndexNestedLoopJoin { .. })));
}

#[test]
fn test_join_of_three_tables() {
    let tester = OptimizerTester::new();
    let (plan, memo) = tester.optimize(&chain_of_three());

    let root = memo.get_group(plan.root_group).unwrap();
    assert_eq!(root.tables(), &TableSet::new(vec!["customer", "orders", "lineitem"]));
    assert!(root.is_optimized());
    assert!(plan.best.cost.is_finite());
    assert_eq!(scanned_tables(&plan.best), vec!["customer", "lineitem", "orders"]);

    // (customer x orders) x lineitem => customer x (orders x lineitem)
    assert!(memo.find_group(&TableSet::new(vec!["orders", "lineitem"])).is_some());

    expect_no_duplicates(&memo);
}

#[test]
fn test_best_expressions_are_consistent() {
    let tester = OptimizerTester::new();
    let (_, memo) = tester.optimize(&chain_of_three());

    for group in memo.groups() {
        let best_expr = match group.best_expr() {
            Some(expr_id) => memo.get_expr(expr_id).unwrap(),
            None => continue,
        };
        assert!(best_expr.operator().is_costable(), "group {} best: {}", group.id(), best_expr);
        assert!(group.best_cost().is_finite());

        let mut input_cost = 0.0;
        for child in best_expr.children() {
            let child = memo.get_group(*child).unwrap();
            assert!(child.best_expr().is_some(), "input group {} has no best expression", child.id());
            input_cost += child.best_cost();
        }
        assert!(group.best_cost() >= input_cost, "group {}: {} < {}", group.id(), group.best_cost(), input_cost);
    }
}

#[test]
fn test_optimization_is_deterministic() {
    let first = OptimizerTester::new();
    let second = OptimizerTester::new();

    let (plan1, memo1) = first.optimize(&chain_of_three());
    let (plan2, memo2) = second.optimize(&chain_of_three());

    assert_eq!(format_memo(&memo1), format_memo(&memo2));
    assert_eq!(format_plan(&plan1.best), format_plan(&plan2.best));
    assert_eq!(plan1.best.cost, plan2.best.cost);
    assert_eq!(plan1.best.expr, plan2.best.expr);
}

#[test]
fn test_optimize_group_again() {
    let tester = OptimizerTester::new();
    let optimizer = Optimizer::with_catalog(tester.catalog().clone(), OptimizerConfig::default());
    let mut memo = Memo::new();
    let plan = optimizer.optimize_with_memo(&chain_of_three(), &mut memo).unwrap();

    let memo_before = format_memo(&memo);
    let best_before: Vec<_> = memo.groups().map(|g| (g.best_expr(), g.best_cost())).collect();

    let stats = optimizer.optimize_group(&mut memo, plan.root_group).unwrap();
    assert_eq!(stats.number_of_jobs, 1);
    assert_eq!(stats.rules_applied, 0);

    let best_after: Vec<_> = memo.groups().map(|g| (g.best_expr(), g.best_cost())).collect();
    assert_eq!(format_memo(&memo), memo_before);
    assert_eq!(best_after, best_before);
}

#[test]
fn test_join_statistics_are_published() {
    let tester = OptimizerTester::new();
    let (plan, memo) = tester.optimize(&chain_of_three());
    let catalog = tester.catalog();

    let group_id = memo.find_group(&TableSet::new(vec!["customer", "orders"])).unwrap();
    let group = memo.get_group(group_id).unwrap();
    let statistics = catalog.get_statistics("customer&orders").expect("statistics");
    assert_eq!(statistics.row_count(), group.best_card());
    assert_eq!(statistics.avg_row_size(), 290.0);
    assert!(statistics.column("c_custkey").is_some());
    assert!(!statistics.column("o_orderkey").unwrap().was_sorted());

    let root = catalog.get_statistics("customer&lineitem&orders").expect("statistics of the root group");
    assert_eq!(root.row_count(), plan.best.cardinality);
}

#[test]
fn test_alternatives() {
    let tester = OptimizerTester::with_config(OptimizerConfig::default().with_top_plans(2));
    let (plan, memo) = tester.optimize(&[Join::inner("A", "a1", "B", "b1")]);

    assert_eq!(plan.alternatives.len(), 2);
    assert_eq!(plan.alternatives[0].cost, plan.best.cost);
    assert!(plan.alternatives[0].cost <= plan.alternatives[1].cost);

    let printed: HashSet<String> = plan.alternatives.iter().map(format_plan).collect();
    assert_eq!(printed.len(), plan.alternatives.len());

    let physical = memo.group_exprs(plan.root_group).unwrap().iter().filter(|e| e.operator().is_physical()).count();
    assert!(physical > 2, "root group must contain more alternatives than requested");
}

#[test]
fn test_invalid_joins() {
    let tester = OptimizerTester::new();
    let optimizer = Optimizer::with_catalog(tester.catalog().clone(), OptimizerConfig::default());

    assert!(optimizer.optimize(&[]).is_err(), "empty join list");
    assert!(optimizer.optimize(&[Join::inner("A", "a1", "Z", "z1")]).is_err(), "unknown table");

    let disconnected = vec![Join::inner("A", "a1", "B", "b1"), Join::inner("nation", "n_nationkey", "C", "c1")];
    assert!(optimizer.optimize(&disconnected).is_err(), "disconnected joins");
}
