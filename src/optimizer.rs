use std::rc::Rc;

use crate::builder::LogicalBuilder;
use crate::catalog::CatalogRef;
use crate::config::OptimizerConfig;
use crate::cost::model::JoinCostModel;
use crate::cost::CostEstimator;
use crate::engine::{Engine, EngineStats, Job};
use crate::error::OptimizerError;
use crate::memo::{format_memo, GroupId, Memo};
use crate::operators::join::Join;
use crate::plan::{format_logical_plan, format_plan, OptimizedPlan};
use crate::rules::{RuleSet, StaticRuleSet};

/// Cost-based join optimizer.
///
/// The optimizer places the given joins into a [memo](crate::memo::Memo), explores the join orders
/// reachable with transformation rules, implements every logical join with available join algorithms
/// and selects the cheapest plan.
/// Statistics of the results of joins are written back into the catalog.
pub struct Optimizer<R, T> {
    rule_set: Rc<R>,
    cost_estimator: Rc<T>,
    catalog: CatalogRef,
    config: OptimizerConfig,
}

impl Optimizer<StaticRuleSet, JoinCostModel> {
    /// Creates an optimizer that uses all the rules and estimates costs with statistics from the given catalog.
    pub fn with_catalog(catalog: CatalogRef, config: OptimizerConfig) -> Self {
        let cost_model = JoinCostModel::new(catalog.clone(), config.clone());
        Optimizer::new(Rc::new(StaticRuleSet::with_default_rules()), Rc::new(cost_model), catalog, config)
    }
}

impl<R, T> Optimizer<R, T>
where
    R: RuleSet,
    T: CostEstimator,
{
    /// Creates a new instance of `Optimizer`.
    pub fn new(rule_set: Rc<R>, cost_estimator: Rc<T>, catalog: CatalogRef, config: OptimizerConfig) -> Self {
        Optimizer {
            rule_set,
            cost_estimator,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimizes the given list of joins.
    pub fn optimize(&self, joins: &[Join]) -> Result<OptimizedPlan, OptimizerError> {
        let mut memo = Memo::new();
        self.optimize_with_memo(joins, &mut memo)
    }

    /// Optimizes the given list of joins using the given memo.
    pub fn optimize_with_memo(&self, joins: &[Join], memo: &mut Memo) -> Result<OptimizedPlan, OptimizerError> {
        log::debug!("Optimizing joins: {:?}", joins);

        let builder = LogicalBuilder::new(self.catalog.as_ref());
        let root_group = builder.build(joins, memo)?;

        log::debug!("Initial plan:\n{}", format_logical_plan(memo, root_group)?);
        log::debug!("Initial memo:\n{}", format_memo(memo));

        self.optimize_group(memo, root_group)?;

        log::debug!("Final memo:\n{}", format_memo(memo));

        let plan = OptimizedPlan::from_memo(memo, root_group, self.cost_estimator.as_ref(), self.config.top_plans())?;
        log::debug!("Best plan: cost: {}\n{}", plan.best.cost, format_plan(&plan.best));

        Ok(plan)
    }

    /// Runs the optimization of the given group of the memo. Returns statistics of the run.
    /// Optimizing a group that has already been optimized does not change the memo.
    pub fn optimize_group(&self, memo: &mut Memo, group_id: GroupId) -> Result<EngineStats, OptimizerError> {
        let mut engine = Engine::new(
            memo,
            self.rule_set.as_ref(),
            self.cost_estimator.as_ref(),
            self.catalog.as_ref(),
            &self.config,
        );
        engine.schedule(Job::OptimizeGroup(group_id));
        let stats = engine.run()?.clone();
        Ok(stats)
    }
}
