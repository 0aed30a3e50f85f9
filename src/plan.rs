//! Physical plans produced by the optimizer.

use std::fmt::Write;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::cost::{CostEstimationContext, CostEstimator, InputGroup};
use crate::error::OptimizerError;
use crate::memo::{ExprId, GroupId, Memo, MemoExpr};
use crate::operators::Operator;

/// A node of a physical plan copied out of a memo.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    /// The memo expression this node has been copied from.
    pub expr: ExprId,
    pub operator: Operator,
    /// The total cost of this node and its inputs.
    pub cost: f64,
    pub cardinality: f64,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Copies out the best plan of the given group.
    /// Returns an error if the group or one of its input groups has no best expression.
    pub fn best_plan(memo: &Memo, group_id: GroupId) -> Result<PlanNode, OptimizerError> {
        let group = memo.get_group(group_id)?;
        let expr_id = group
            .best_expr()
            .ok_or_else(|| OptimizerError::internal(format!("Group {} {} has no best expression", group_id, group.tables())))?;
        let expr = memo.get_expr(expr_id)?;
        PlanNode::from_expr(memo, expr, group.best_cost(), group.best_card())
    }

    fn from_expr(memo: &Memo, expr: &MemoExpr, cost: f64, cardinality: f64) -> Result<PlanNode, OptimizerError> {
        let children = expr
            .children()
            .iter()
            .map(|child| PlanNode::best_plan(memo, *child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PlanNode {
            expr: expr.id(),
            operator: expr.operator().clone(),
            cost,
            cardinality,
            children,
        })
    }
}

/// The result of optimization.
#[derive(Debug, Clone)]
pub struct OptimizedPlan {
    /// The group that contains all expressions of the query.
    pub root_group: GroupId,
    /// The cheapest plan.
    pub best: PlanNode,
    /// Physical expressions of the root group with their inputs expanded through the best plans
    /// of their groups, ordered by cost.
    pub alternatives: Vec<PlanNode>,
}

impl OptimizedPlan {
    /// Copies out the best plan and up to `top_plans` alternatives from the root group of the given memo.
    /// Alternatives with infinite costs are excluded.
    pub fn from_memo<T>(
        memo: &Memo,
        root_group: GroupId,
        cost_estimator: &T,
        top_plans: usize,
    ) -> Result<OptimizedPlan, OptimizerError>
    where
        T: CostEstimator + ?Sized,
    {
        let best = PlanNode::best_plan(memo, root_group)?;

        let mut alternatives = Vec::new();
        for expr in memo.group_exprs(root_group)? {
            if !expr.operator().is_physical() {
                continue;
            }
            let inputs = expr
                .children()
                .iter()
                .map(|c| memo.get_group(*c).map(InputGroup::from_group))
                .collect::<Result<Vec<_>, _>>()?;
            let ctx = CostEstimationContext::new(inputs);
            let cost = cost_estimator.estimate_cost(expr.operator(), &ctx);
            if !cost.is_finite() {
                log::debug!("Plan: alternative {} {} has no finite cost", expr.id(), expr);
                continue;
            }
            let cardinality = cost_estimator.estimate_cardinality(expr.operator(), &ctx);
            alternatives.push(PlanNode::from_expr(memo, expr, cost, cardinality)?);
        }

        alternatives.sort_by_key(|plan| OrderedFloat(plan.cost));
        let alternatives = alternatives.into_iter().unique_by(format_plan).take(top_plans).collect();

        Ok(OptimizedPlan {
            root_group,
            best,
            alternatives,
        })
    }
}

/// Builds a textual representation of the given plan: one operator per line, inputs are indented.
pub fn format_plan(plan: &PlanNode) -> String {
    fn write_node(buf: &mut String, node: &PlanNode, depth: usize) {
        // writing into a String never fails
        let _ = writeln!(buf, "{:indent$}{}", "", node.operator, indent = depth * 2);
        for child in node.children.iter() {
            write_node(buf, child, depth + 1);
        }
    }

    let mut buf = String::new();
    write_node(&mut buf, plan, 0);
    buf
}

/// Builds a textual representation of the logical plan of the given group
/// using the first logical expression of every group.
pub fn format_logical_plan(memo: &Memo, group_id: GroupId) -> Result<String, OptimizerError> {
    fn write_group(memo: &Memo, buf: &mut String, group_id: GroupId, depth: usize) -> Result<(), OptimizerError> {
        let exprs = memo.group_exprs(group_id)?;
        let expr = exprs
            .into_iter()
            .find(|e| e.operator().is_logical())
            .ok_or_else(|| OptimizerError::internal(format!("Group {} has no logical expression", group_id)))?;
        let _ = writeln!(buf, "{:indent$}{}", "", expr.operator(), indent = depth * 2);
        for child in expr.children() {
            write_group(memo, buf, *child, depth + 1)?;
        }
        Ok(())
    }

    let mut buf = String::new();
    write_group(memo, &mut buf, group_id, 0)?;
    Ok(buf)
}

/// Executes physical plans produced by the optimizer.
pub trait PlanExecutor {
    type Output;

    /// Executes the given plan.
    fn execute(&mut self, plan: &PlanNode) -> Result<Self::Output, OptimizerError>;

    /// Executes the alternatives of the given plan from the cheapest to the most expensive one.
    fn execute_top_plans(&mut self, plan: &OptimizedPlan) -> Result<Vec<Self::Output>, OptimizerError> {
        plan.alternatives.iter().map(|p| self.execute(p)).collect()
    }
}
