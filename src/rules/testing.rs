use std::sync::Arc;

use crate::catalog::mutable::MutableCatalog;
use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::memo::{ExprId, GroupId, Memo, MemoExpr, TableSet};
use crate::operators::join::JoinCondition;
use crate::operators::Operator;
use crate::rules::{Rule, RuleContext};
use crate::testing::{expect_memo, init_logger, test_catalog};

/// Provides methods to test [optimization rules].
/// Tables are taken from the [test catalog](crate::testing::test_catalog).
///
/// [optimization rules]: crate::rules::Rule
pub struct RuleTester {
    memo: Memo,
    catalog: Arc<MutableCatalog>,
    config: OptimizerConfig,
}

impl RuleTester {
    pub fn new() -> Self {
        RuleTester::with_config(OptimizerConfig::default())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        init_logger();

        RuleTester {
            memo: Memo::new(),
            catalog: test_catalog(),
            config,
        }
    }

    /// Adds a scan of the given table to the memo and returns its group.
    /// The cardinality and the row size of the group are taken from the catalog.
    pub fn scan(&mut self, table: &str) -> GroupId {
        let statistics = self.catalog.get_statistics(table).expect("Unknown table");
        self.memo
            .insert(Operator::scan(table, statistics.row_count() as u64), vec![])
            .expect("Failed to add a scan");

        let group_id = self.memo.find_group(&TableSet::single(table)).expect("No group");
        let group = self.memo.group_mut(group_id).expect("No group");
        group.set_estimated_card(statistics.row_count());
        group.set_avg_row_size(statistics.avg_row_size());
        group_id
    }

    /// Adds a join of two base tables to the memo.
    pub fn join(&mut self, condition: JoinCondition, left: &str, right: &str) -> ExprId {
        let left = self.scan(left);
        let right = self.scan(right);
        self.insert_join(condition, left, right)
    }

    /// Adds a join of the given group and a base table to the memo.
    pub fn join_groups(&mut self, condition: JoinCondition, left: GroupId, right: &str) -> ExprId {
        let right = self.scan(right);
        self.insert_join(condition, left, right)
    }

    pub fn group_of(&self, expr_id: ExprId) -> GroupId {
        self.memo.get_expr(expr_id).expect("No expression").group_id()
    }

    /// Applies the rule to the given expression and compares the memo with the expected one.
    pub fn apply(&mut self, rule: &dyn Rule, expr_id: ExprId, expected: &str) {
        let new_exprs = self.apply_rule(rule, expr_id);
        assert!(!new_exprs.is_empty(), "Rule matched but not applied: {:?}", rule);

        expect_memo(&self.memo, expected);
    }

    /// Applies the rule to the given expression and returns the expressions added to the memo.
    /// Fails if the rule does not match the expression.
    pub fn apply_rule(&mut self, rule: &dyn Rule, expr_id: ExprId) -> Vec<String> {
        let expr = self.get_expr(expr_id);
        let ctx = RuleContext::new(&*self.catalog, &self.config);
        assert!(rule.matches(&ctx, &self.memo, &expr), "Rule does not match: {:?} expr: {}", rule, expr);

        let new_exprs = match rule.apply(&ctx, &mut self.memo, &expr) {
            Ok(new_exprs) => new_exprs,
            Err(e) => panic!("Failed to apply a rule. Rule: {:?}. Error: {}", rule, e),
        };
        new_exprs
            .into_iter()
            .map(|id| self.memo.get_expr(id).expect("No expression").to_string())
            .collect()
    }

    /// Expects the rule not to match the given expression.
    pub fn no_match(&mut self, rule: &dyn Rule, expr_id: ExprId) {
        let expr = self.get_expr(expr_id);
        let ctx = RuleContext::new(&*self.catalog, &self.config);
        assert!(!rule.matches(&ctx, &self.memo, &expr), "Rule should not have matched. Rule: {:?} expr: {}", rule, expr);
    }

    fn get_expr(&self, expr_id: ExprId) -> MemoExpr {
        self.memo.get_expr(expr_id).expect("No expression").clone()
    }

    fn insert_join(&mut self, condition: JoinCondition, left: GroupId, right: GroupId) -> ExprId {
        let expr_id = self.memo.insert(Operator::join(condition), vec![left, right]).expect("Failed to add a join");
        expr_id.expect("Duplicate join")
    }
}
