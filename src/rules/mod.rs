//! Rules used by the optimizer.

use std::fmt::{Debug, Formatter};

use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::memo::{ExprId, GroupId, Memo, MemoExpr, MAX_RULES};
use crate::operators::Operator;
use crate::rules::implementation::{BlockNestedLoopJoinRule, HashJoinRule, IndexNestedLoopJoinRule, SortMergeJoinRule};
use crate::rules::transformation::{
    JoinAssociativityRule, JoinCommutativityRule, LeftToRightJoinRule, RightToLeftJoinRule,
};

pub mod implementation;
#[cfg(test)]
pub mod testing;
pub mod transformation;

/// An optimization rule used by the optimizer. An optimization rule either adds a logically equivalent
/// expression to a memo or provides an implementation of the given logical expression.
pub trait Rule {
    /// The name of this rule.
    fn name(&self) -> String;

    /// Returns type type of this rule.
    fn rule_type(&self) -> RuleType;

    /// Checks whether this rule can be applied to the given expression `expr`.
    fn matches(&self, ctx: &RuleContext, memo: &Memo, expr: &MemoExpr) -> bool;

    /// Applies this rule to the given expression `expr` and returns expressions added to the memo.
    /// Expressions the memo already contains are not returned.
    /// If this rule can not be applied to the given expression this method must return an empty vec.
    fn apply(&self, ctx: &RuleContext, memo: &mut Memo, expr: &MemoExpr) -> Result<Vec<ExprId>, OptimizerError>;
}

impl Debug for dyn Rule + '_ {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        rule_debug_format(self, f)
    }
}

/// Rule type specifies which expressions a rule produces.
/// A transformation rule produce [logical expressions].
/// An implementation rule produce [physical expressions].
///
/// [logical expressions]: crate::operators::logical::LogicalExpr
/// [physical expressions]: crate::operators::physical::PhysicalExpr
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RuleType {
    /// Transformation rules produce equivalent logical expressions.
    Transformation,
    /// Implementation rules produce physical expressions.
    /// Physical expressions are used to compute cost of a query plan.
    Implementation,
}

#[derive(Debug)]
pub struct RuleContext<'a> {
    catalog: &'a dyn Catalog,
    config: &'a OptimizerConfig,
}

impl<'a> RuleContext<'a> {
    pub fn new(catalog: &'a dyn Catalog, config: &'a OptimizerConfig) -> Self {
        RuleContext { catalog, config }
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog
    }

    pub fn config(&self) -> &OptimizerConfig {
        self.config
    }
}

/// An opaque identifier of an optimization rule.
pub type RuleId = usize;

/// Provides access to optimization rules used by the optimizer.
pub trait RuleSet {
    /// Returns an iterator over available optimization rules.
    /// Rules are returned in the same order on every call.
    fn get_rules(&self) -> RuleIterator;

    /// Applies a rule with the given identifier to the expression `expr`.
    fn apply_rule(
        &self,
        rule_id: &RuleId,
        ctx: &RuleContext,
        memo: &mut Memo,
        expr: &MemoExpr,
    ) -> Result<Vec<ExprId>, OptimizerError>;
}

/// An iterator over available optimization rules.
pub struct RuleIterator<'r> {
    rules: std::vec::IntoIter<(RuleId, &'r dyn Rule)>,
}

impl<'r> RuleIterator<'r> {
    pub fn new(rules: Vec<(RuleId, &'r dyn Rule)>) -> Self {
        RuleIterator {
            rules: rules.into_iter(),
        }
    }
}

impl<'r> Iterator for RuleIterator<'r> {
    type Item = (RuleId, &'r dyn Rule);

    fn next(&mut self) -> Option<Self::Item> {
        self.rules.next()
    }
}

impl<'a> Debug for RuleIterator<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        struct DebugRule<'a> {
            rule: &'a dyn Rule,
        }
        impl Debug for DebugRule<'_> {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                rule_debug_format(self.rule, f)
            }
        }
        f.debug_list()
            .entries(self.rules.as_slice().iter().map(|(id, rule)| {
                let rule = DebugRule { rule: *rule };
                (id, rule)
            }))
            .finish()
    }
}

fn rule_debug_format(rule: &dyn Rule, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Rule")
        .field("name", &rule.name())
        .field("type", &rule.rule_type())
        .finish()
}

/// An implementation of [RuleSet] trait that uses a predefined set optimization rules.
/// The identifier of a rule is its position in the list of rules.
#[derive(Debug)]
pub struct StaticRuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl StaticRuleSet {
    /// Creates a new [RuleSet] from the given collection of rules.
    /// Returns an error if the number of rules exceeds the number of rules an expression can track.
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Result<Self, OptimizerError> {
        if rules.len() > MAX_RULES {
            return Err(OptimizerError::unsupported(format!(
                "Too many rules: {}. Max number of rules: {}",
                rules.len(),
                MAX_RULES
            )));
        }
        Ok(StaticRuleSet { rules })
    }

    /// Creates a rule set with all transformation and implementation rules.
    pub fn with_default_rules() -> Self {
        StaticRuleSet {
            rules: default_rules(),
        }
    }
}

impl RuleSet for StaticRuleSet {
    fn get_rules(&self) -> RuleIterator {
        let rules: Vec<(RuleId, &dyn Rule)> = self.rules.iter().enumerate().map(|(id, r)| (id, r.as_ref())).collect();
        RuleIterator::new(rules)
    }

    fn apply_rule(
        &self,
        rule_id: &RuleId,
        ctx: &RuleContext,
        memo: &mut Memo,
        expr: &MemoExpr,
    ) -> Result<Vec<ExprId>, OptimizerError> {
        match self.rules.get(*rule_id) {
            Some(rule) => rule.apply(ctx, memo, expr),
            None => Err(OptimizerError::internal(format!("Rule#{} does not exist", rule_id))),
        }
    }
}

/// Returns transformation rules followed by implementation rules.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(JoinCommutativityRule),
        Box::new(LeftToRightJoinRule),
        Box::new(RightToLeftJoinRule),
        Box::new(JoinAssociativityRule),
        Box::new(HashJoinRule),
        Box::new(IndexNestedLoopJoinRule),
        Box::new(SortMergeJoinRule),
        Box::new(BlockNestedLoopJoinRule),
    ]
}

// Inserts an expression into the memo and collects it if it has not been there.
fn insert_new(
    memo: &mut Memo,
    operator: Operator,
    children: Vec<GroupId>,
    out: &mut Vec<ExprId>,
) -> Result<(), OptimizerError> {
    if let Some(expr_id) = memo.insert(operator, children)? {
        out.push(expr_id);
    }
    Ok(())
}
