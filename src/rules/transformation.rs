//! Transformation rules. See [rules module](super).

use crate::error::OptimizerError;
use crate::memo::{ExprId, Memo, MemoExpr};
use crate::operators::join::{JoinCondition, JoinType};
use crate::operators::Operator;
use crate::rules::{insert_new, Rule, RuleContext, RuleType};

/// `A join B` -> `B join A`. Applies to inner and full joins.
#[derive(Debug)]
pub struct JoinCommutativityRule;

impl Rule for JoinCommutativityRule {
    fn name(&self) -> String {
        "JoinCommutativityRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(
            expr.operator().logical_join(),
            Some(JoinCondition {
                join_type: JoinType::Inner,
                ..
            }) | Some(JoinCondition {
                join_type: JoinType::Full,
                ..
            })
        )
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        swap_inputs(memo, expr, None)
    }
}

/// `A left join B` -> `B right join A`.
#[derive(Debug)]
pub struct LeftToRightJoinRule;

impl Rule for LeftToRightJoinRule {
    fn name(&self) -> String {
        "LeftToRightJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.operator().logical_join(), Some(condition) if condition.join_type == JoinType::Left)
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        swap_inputs(memo, expr, Some(JoinType::Right))
    }
}

/// `A right join B` -> `B left join A`.
#[derive(Debug)]
pub struct RightToLeftJoinRule;

impl Rule for RightToLeftJoinRule {
    fn name(&self) -> String {
        "RightToLeftJoinRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn matches(&self, _ctx: &RuleContext, _memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.operator().logical_join(), Some(condition) if condition.join_type == JoinType::Right)
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        swap_inputs(memo, expr, Some(JoinType::Left))
    }
}

// Adds a join with swapped inputs, swapped columns and the flipped comparison to the group of `expr`.
fn swap_inputs(memo: &mut Memo, expr: &MemoExpr, join_type: Option<JoinType>) -> Result<Vec<ExprId>, OptimizerError> {
    let (condition, left, right) = match (expr.operator().logical_join(), expr.children()) {
        (Some(condition), [left, right]) => (condition, *left, *right),
        _ => return Ok(Vec::new()),
    };
    let swapped = condition.swapped();
    let swapped = match join_type {
        Some(join_type) => swapped.with_join_type(join_type),
        None => swapped,
    };

    let mut out = Vec::new();
    insert_new(memo, Operator::join(swapped), vec![right, left], &mut out)?;
    Ok(out)
}

/// `(A join B) join C` -> `A join (B join C)`. Applies to inner joins whose left input contains an inner join.
///
/// The new `B join C` compares the right column of `A join B` with the right column of the top join
/// using the flipped comparison of the top join. The new top join retains the condition of `A join B`.
#[derive(Debug)]
pub struct JoinAssociativityRule;

impl JoinAssociativityRule {
    fn left_inner_join(memo: &Memo, expr: &MemoExpr) -> Option<MemoExpr> {
        let left = expr.children().first()?;
        let exprs = memo.group_exprs(*left).ok()?;
        exprs
            .into_iter()
            .find(|e| {
                matches!(e.operator().logical_join(), Some(condition) if condition.join_type == JoinType::Inner)
            })
            .cloned()
    }
}

impl Rule for JoinAssociativityRule {
    fn name(&self) -> String {
        "JoinAssociativityRule".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn matches(&self, _ctx: &RuleContext, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.operator().logical_join() {
            Some(condition) if condition.join_type == JoinType::Inner => {
                JoinAssociativityRule::left_inner_join(memo, expr).is_some()
            }
            _ => false,
        }
    }

    fn apply(&self, _ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError> {
        let (top_condition, c) = match (expr.operator().logical_join(), expr.children()) {
            (Some(condition), [_, right]) if condition.join_type == JoinType::Inner => (condition, *right),
            _ => return Ok(Vec::new()),
        };
        let inner = match JoinAssociativityRule::left_inner_join(memo, expr) {
            Some(inner) => inner,
            None => return Ok(Vec::new()),
        };
        let (inner_condition, a, b) = match (inner.operator().logical_join(), inner.children()) {
            (Some(condition), [a, b]) => (condition.clone(), *a, *b),
            _ => return Ok(Vec::new()),
        };

        // [AxB]xC -> Ax[BxC]
        let bc_condition = JoinCondition::new(
            JoinType::Inner,
            &inner_condition.right_column,
            &top_condition.right_column,
            top_condition.op.flipped(),
        );

        let mut out = Vec::new();
        insert_new(memo, Operator::join(bc_condition), vec![b, c], &mut out)?;

        let bc_tables = memo.get_group(b)?.tables().union(memo.get_group(c)?.tables());
        let bc = memo.group_of(bc_tables);
        insert_new(memo, Operator::join(inner_condition), vec![a, bc], &mut out)?;

        Ok(out)
    }
}
