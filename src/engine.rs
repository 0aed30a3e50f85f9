//! Job scheduler that drives exploration, implementation and costing of memo groups.

use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::cost::{CostEstimationContext, CostEstimator, InputGroup};
use crate::error::OptimizerError;
use crate::memo::{ExprId, GroupId, Memo, MemoExpr};
use crate::rules::{RuleContext, RuleSet, RuleType};
use crate::statistics::{synthesize_join_statistics, TableStatistics, TableStatisticsBuilder};

/// A unit of work of the [Engine].
/// A job that can not make progress schedules itself again together with the jobs it depends on.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Schedules exploration of every expression of a group.
    ExploreGroup(GroupId),
    /// Applies transformation rules to an expression.
    ExploreExpr(ExprId),
    /// Applies implementation rules to an expression.
    ImplementExpr(ExprId),
    /// Selects the cheapest expression of a group.
    OptimizeGroup(GroupId),
    /// Computes the cost of a physical expression input by input
    /// and abandons it once the cost exceeds `cost_limit`.
    OptInputs {
        expr: ExprId,
        child_index: usize,
        cost_limit: f64,
    },
}

impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Job::ExploreGroup(group_id) => write!(f, "ExploreGroup: {}", group_id),
            Job::ExploreExpr(expr_id) => write!(f, "ExploreExpr: {}", expr_id),
            Job::ImplementExpr(expr_id) => write!(f, "ImplementExpr: {}", expr_id),
            Job::OptimizeGroup(group_id) => write!(f, "OptimizeGroup: {}", group_id),
            Job::OptInputs {
                expr,
                child_index,
                cost_limit,
            } => write!(f, "OptInputs: {} child: {} limit: {}", expr, child_index, cost_limit),
        }
    }
}

/// Counters collected while the [Engine] runs.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub number_of_jobs: usize,
    pub max_stack_depth: usize,
    pub explore_group: usize,
    pub explore_expr: usize,
    pub implement_expr: usize,
    pub optimize_group: usize,
    pub opt_inputs: usize,
    pub rules_applied: usize,
    pub exprs_pruned: usize,
    pub optimization_time: Duration,
}

#[derive(Debug, Default)]
struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    fn schedule(&mut self, job: Job) {
        log::debug!(" + {}", &job);

        self.jobs.push(job);
    }

    fn retrieve(&mut self) -> Option<Job> {
        self.jobs.pop()
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}

/// Processes [jobs](Job) in LIFO order until no jobs are left.
///
/// Every rule is applied to an expression at most once and the memo never contains duplicate expressions.
/// Therefore the number of jobs is finite and [Engine::run] always terminates.
pub struct Engine<'a, R, T> {
    memo: &'a mut Memo,
    rule_set: &'a R,
    cost_estimator: &'a T,
    catalog: &'a dyn Catalog,
    config: &'a OptimizerConfig,
    jobs: JobQueue,
    stats: EngineStats,
}

impl<'a, R, T> Engine<'a, R, T>
where
    R: RuleSet,
    T: CostEstimator,
{
    pub fn new(
        memo: &'a mut Memo,
        rule_set: &'a R,
        cost_estimator: &'a T,
        catalog: &'a dyn Catalog,
        config: &'a OptimizerConfig,
    ) -> Self {
        Engine {
            memo,
            rule_set,
            cost_estimator,
            catalog,
            config,
            jobs: JobQueue::default(),
            stats: EngineStats::default(),
        }
    }

    /// Adds the given job to the queue.
    pub fn schedule(&mut self, job: Job) {
        self.jobs.schedule(job);
    }

    /// Runs scheduled jobs until the queue is empty.
    pub fn run(&mut self) -> Result<&EngineStats, OptimizerError> {
        let start_time = Instant::now();

        while let Some(job) = self.jobs.retrieve() {
            log::debug!("{}", &job);

            self.stats.number_of_jobs += 1;
            self.stats.max_stack_depth = self.stats.max_stack_depth.max(self.jobs.len() + 1);

            match job {
                Job::ExploreGroup(group_id) => self.explore_group(group_id)?,
                Job::ExploreExpr(expr_id) => self.explore_expr(expr_id)?,
                Job::ImplementExpr(expr_id) => self.implement_expr(expr_id)?,
                Job::OptimizeGroup(group_id) => self.optimize_group(group_id)?,
                Job::OptInputs {
                    expr,
                    child_index,
                    cost_limit,
                } => self.opt_inputs(expr, child_index, cost_limit)?,
            }
        }

        self.stats.optimization_time += start_time.elapsed();
        log::debug!("Stats: {:?}", self.stats);

        Ok(&self.stats)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    fn explore_group(&mut self, group_id: GroupId) -> Result<(), OptimizerError> {
        self.stats.explore_group += 1;

        let group = self.memo.group_mut(group_id)?;
        if group.is_explored() {
            return Ok(());
        }
        group.set_explored();

        let exprs: Vec<ExprId> = group.exprs().to_vec();
        for expr_id in exprs {
            self.jobs.schedule(Job::ExploreExpr(expr_id));
        }
        Ok(())
    }

    fn explore_expr(&mut self, expr_id: ExprId) -> Result<(), OptimizerError> {
        self.stats.explore_expr += 1;

        let new_exprs = self.apply_rules(expr_id, RuleType::Transformation)?;
        for new_expr in new_exprs {
            let group_id = self.memo.get_expr(new_expr)?.group_id();
            self.jobs.schedule(Job::ExploreGroup(group_id));
            self.jobs.schedule(Job::ExploreExpr(new_expr));
        }

        self.jobs.schedule(Job::ImplementExpr(expr_id));
        Ok(())
    }

    fn implement_expr(&mut self, expr_id: ExprId) -> Result<(), OptimizerError> {
        self.stats.implement_expr += 1;

        let new_exprs = self.apply_rules(expr_id, RuleType::Implementation)?;
        for new_expr in new_exprs {
            self.jobs.schedule(Job::ExploreExpr(new_expr));
            self.jobs.schedule(Job::OptInputs {
                expr: new_expr,
                child_index: 0,
                cost_limit: f64::INFINITY,
            });
        }
        Ok(())
    }

    // Applies every matching rule of the given type that has not been applied to the expression yet.
    fn apply_rules(&mut self, expr_id: ExprId, rule_type: RuleType) -> Result<Vec<ExprId>, OptimizerError> {
        let rule_set = self.rule_set;
        let ctx = RuleContext::new(self.catalog, self.config);
        let expr = self.memo.get_expr(expr_id)?.clone();
        let mut new_exprs = Vec::new();

        for (rule_id, rule) in rule_set.get_rules() {
            if rule.rule_type() != rule_type || self.memo.get_expr(expr_id)?.is_rule_applied(rule_id) {
                continue;
            }
            if !rule.matches(&ctx, self.memo, &expr) {
                continue;
            }
            self.memo.expr_mut(expr_id)?.mark_rule_applied(rule_id);
            self.stats.rules_applied += 1;

            let result = rule_set.apply_rule(&rule_id, &ctx, self.memo, &expr)?;
            log::debug!("Applied rule {} to {} {}. New expressions: {:?}", rule.name(), expr_id, expr, result);

            new_exprs.extend(result);
        }

        Ok(new_exprs)
    }

    fn optimize_group(&mut self, group_id: GroupId) -> Result<(), OptimizerError> {
        self.stats.optimize_group += 1;

        let group = self.memo.get_group(group_id)?;
        if !group.is_explored() {
            self.jobs.schedule(Job::OptimizeGroup(group_id));
            self.jobs.schedule(Job::ExploreGroup(group_id));
            return Ok(());
        }
        if group.is_optimized() {
            log::debug!("Group has already been optimized: {}", group_id);
            return Ok(());
        }
        if group.best_expr().is_some() {
            // the best expression has been selected by OptInputs jobs
            return self.group_optimized(group_id);
        }

        let exprs: Vec<MemoExpr> = self.memo.group_exprs(group_id)?.into_iter().cloned().collect();

        // inputs must be optimized first
        let mut pending = Vec::new();
        for expr in exprs.iter().filter(|e| e.operator().is_costable()) {
            for child_id in expr.children() {
                let child = self.memo.get_group(*child_id)?;
                if *child_id != group_id
                    && child.best_expr().is_none()
                    && !child.is_optimized()
                    && !pending.contains(child_id)
                {
                    pending.push(*child_id);
                }
            }
        }
        if !pending.is_empty() {
            self.jobs.schedule(Job::OptimizeGroup(group_id));
            for child_id in pending {
                self.jobs.schedule(Job::OptimizeGroup(child_id));
            }
            return Ok(());
        }

        let mut best: Option<(ExprId, f64, f64, f64)> = None;
        for expr in exprs.iter().filter(|e| e.operator().is_costable()) {
            if expr.children().contains(&group_id) {
                // an enforcer of a property of its own group (Sort) is not an alternative of that group
                continue;
            }
            let ctx = self.cost_estimation_ctx(expr)?;
            let operator = expr.operator();
            let cost = self.cost_estimator.estimate_cost(operator, &ctx);
            log::debug!("Expr cost: {} group: {} expr: {} {}", cost, group_id, expr.id(), expr);

            let best_cost = best.map(|(_, c, _, _)| c).unwrap_or(f64::INFINITY);
            if cost < best_cost {
                let card = self.cost_estimator.estimate_cardinality(operator, &ctx);
                let row_size = self.cost_estimator.estimate_row_size(operator, &ctx);
                best = Some((expr.id(), cost, card, row_size));
            }
        }

        if let Some((expr_id, cost, card, row_size)) = best {
            let group = self.memo.group_mut(group_id)?;
            if group.set_best(expr_id, cost, card, row_size) {
                log::debug!("New best expr: group: {} expr: {} cost: {} card: {}", group_id, expr_id, cost, card);
            }
        } else {
            log::debug!("Group {} has no expression with a finite cost", group_id);
        }

        self.group_optimized(group_id)
    }

    fn group_optimized(&mut self, group_id: GroupId) -> Result<(), OptimizerError> {
        self.memo.group_mut(group_id)?.set_optimized();
        self.publish_statistics(group_id)
    }

    fn opt_inputs(&mut self, expr_id: ExprId, child_index: usize, cost_limit: f64) -> Result<(), OptimizerError> {
        self.stats.opt_inputs += 1;

        let expr = self.memo.get_expr(expr_id)?.clone();
        let group_id = expr.group_id();
        let cost_limit = cost_limit.min(self.memo.get_group(group_id)?.best_cost());

        if let Some(child_id) = expr.children().get(child_index) {
            if *child_id == group_id {
                return Err(OptimizerError::internal(format!("Expression {} {} is an input of itself", expr_id, expr)));
            }
            let child = self.memo.get_group(*child_id)?;
            if child.best_expr().is_none() {
                if child.is_optimized() {
                    log::debug!("Expr abandoned: {} input {} has no plan", expr_id, child_id);
                    self.stats.exprs_pruned += 1;
                } else {
                    self.jobs.schedule(Job::OptInputs {
                        expr: expr_id,
                        child_index,
                        cost_limit,
                    });
                    self.jobs.schedule(Job::OptimizeGroup(*child_id));
                }
                return Ok(());
            }

            let new_limit = cost_limit - child.best_cost();
            if new_limit <= 0.0 {
                log::debug!("Expr abandoned: {} cost limit {} exceeded by input {}", expr_id, cost_limit, child_id);
                self.stats.exprs_pruned += 1;
                return Ok(());
            }
            self.jobs.schedule(Job::OptInputs {
                expr: expr_id,
                child_index: child_index + 1,
                cost_limit: new_limit,
            });
            return Ok(());
        }

        let ctx = self.cost_estimation_ctx(&expr)?;
        let operator = expr.operator();
        let cost = self.cost_estimator.estimate_cost(operator, &ctx);
        let input_cost: f64 = ctx.inputs().iter().map(|i| i.cost).sum();
        log::debug!("Expr cost: {} group: {} expr: {} {}", cost, group_id, expr_id, expr);

        if cost - input_cost > cost_limit {
            log::debug!("Expr abandoned: {} cost {} exceeds limit {}", expr_id, cost, cost_limit);
            self.stats.exprs_pruned += 1;
            return Ok(());
        }

        let card = self.cost_estimator.estimate_cardinality(operator, &ctx);
        let row_size = self.cost_estimator.estimate_row_size(operator, &ctx);
        let group = self.memo.group_mut(group_id)?;
        if group.set_best(expr_id, cost, card, row_size) {
            log::debug!("New best expr: group: {} expr: {} cost: {} card: {}", group_id, expr_id, cost, card);
            if group.is_optimized() {
                self.publish_statistics(group_id)?;
            }
        }
        Ok(())
    }

    fn cost_estimation_ctx(&self, expr: &MemoExpr) -> Result<CostEstimationContext, OptimizerError> {
        let inputs = expr
            .children()
            .iter()
            .map(|c| self.memo.get_group(*c).map(InputGroup::from_group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CostEstimationContext::new(inputs))
    }

    // Stores statistics of the result of the best expression of a group when that expression is a join.
    fn publish_statistics(&mut self, group_id: GroupId) -> Result<(), OptimizerError> {
        let group = self.memo.get_group(group_id)?;
        let best_expr = match group.best_expr() {
            Some(expr_id) => self.memo.get_expr(expr_id)?,
            None => return Ok(()),
        };
        let (left, right) = match best_expr.children() {
            [left, right] => (self.memo.get_group(*left)?, self.memo.get_group(*right)?),
            _ => return Ok(()),
        };

        let page_size = self.config.page_size();
        let left_stats = self.input_statistics(left.tables().key(), left.best_card(), left.avg_row_size())?;
        let right_stats = self.input_statistics(right.tables().key(), right.best_card(), right.avg_row_size())?;
        let statistics = synthesize_join_statistics(&left_stats, &right_stats, group.best_card(), page_size);

        let key = group.tables().key();
        log::debug!(
            "Statistics of {}: rows={} pages={} row_size={}",
            key,
            statistics.row_count(),
            statistics.file_pages(),
            statistics.avg_row_size()
        );
        self.catalog.put_statistics(&key, statistics)
    }

    fn input_statistics(&self, key: String, card: f64, row_size: f64) -> Result<TableStatistics, OptimizerError> {
        match self.catalog.get_statistics(&key) {
            Some(statistics) => Ok((*statistics).clone()),
            None => TableStatisticsBuilder::new(card.max(0.0).round() as u64)
                .avg_row_size(row_size)
                .page_size(self.config.page_size() as u64)
                .build(),
        }
    }
}
