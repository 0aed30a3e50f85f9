//! Memo data structure.
//!
//! A memo stores [groups](self::Group) of logically equivalent [expressions](self::MemoExpr).
//! Every group covers a set of base tables and every expression of a group covers exactly that set.
//! Groups and expressions are never removed: both are addressed by their position in the memo.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{Debug, Display, Formatter};

use crate::catalog::table_set_key;
use crate::error::OptimizerError;
use crate::operators::logical::LogicalExpr;
use crate::operators::Operator;
use crate::statistics::DEFAULT_ROW_SIZE;

/// The maximum number of rules whose applications can be tracked per expression.
pub const MAX_RULES: usize = 64;

/// A set of base tables.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct TableSet(BTreeSet<String>);

impl TableSet {
    pub fn new<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        TableSet(tables.into_iter().map(String::from).collect())
    }

    /// Creates a set that contains only the given table.
    pub fn single(table: &str) -> Self {
        TableSet::new(std::iter::once(table))
    }

    /// Returns a set that contains tables from both sets.
    pub fn union(&self, other: &TableSet) -> TableSet {
        TableSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn is_disjoint(&self, other: &TableSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.0.contains(table)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the name of the table if this set consists of exactly one table.
    pub fn single_table(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.iter().next().map(|t| t.as_str())
        } else {
            None
        }
    }

    /// Returns the tables in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.as_str())
    }

    /// The catalog key of this set of tables.
    pub fn key(&self) -> String {
        table_set_key(self.iter())
    }
}

impl Display for TableSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "))
    }
}

/// Uniquely identifies a memo group in a memo.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GroupId(usize);

impl GroupId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GroupId").field(&self.0).finish()
    }
}

/// Uniquely identifies a memo expression in a memo.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ExprId(usize);

impl ExprId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Debug for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExprId").field(&self.0).finish()
    }
}

/// An operator with its input groups.
/// The operator and the inputs of an expression never change once it has been added to a memo.
#[derive(Debug, Clone)]
pub struct MemoExpr {
    id: ExprId,
    group_id: GroupId,
    operator: Operator,
    children: Vec<GroupId>,
    applied_rules: u64,
}

impl MemoExpr {
    pub fn id(&self) -> ExprId {
        self.id
    }

    /// The group this expression belongs to.
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// The input groups of this expression.
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    /// Returns `true` if the rule with the given id has already been applied to this expression.
    pub fn is_rule_applied(&self, rule_id: usize) -> bool {
        rule_id < MAX_RULES && self.applied_rules & (1u64 << rule_id) != 0
    }

    pub(crate) fn mark_rule_applied(&mut self, rule_id: usize) {
        debug_assert!(rule_id < MAX_RULES, "rule id is out of bounds: {}", rule_id);
        self.applied_rules |= 1u64 << rule_id;
    }
}

impl Display for MemoExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operator)?;
        if !self.children.is_empty() {
            let children: Vec<String> = self.children.iter().map(|c| c.to_string()).collect();
            write!(f, " [{}]", children.join(", "))?;
        }
        Ok(())
    }
}

/// A group of logically equivalent expressions together with the cheapest known way to compute them.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    tables: TableSet,
    exprs: Vec<ExprId>,
    best_cost: f64,
    best_expr: Option<ExprId>,
    best_card: f64,
    avg_row_size: f64,
    explored: bool,
    optimized: bool,
}

impl Group {
    fn new(id: GroupId, tables: TableSet, avg_row_size: f64) -> Self {
        Group {
            id,
            tables,
            exprs: Vec::new(),
            best_cost: f64::INFINITY,
            best_expr: None,
            best_card: f64::INFINITY,
            avg_row_size,
            explored: false,
            optimized: false,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The set of base tables covered by this group.
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// Expressions of this group in the order they have been added.
    pub fn exprs(&self) -> &[ExprId] {
        &self.exprs
    }

    /// The cost of the best expression. `+inf` if no expression has been costed yet.
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    pub fn best_expr(&self) -> Option<ExprId> {
        self.best_expr
    }

    /// The estimated number of rows produced by the best expression.
    pub fn best_card(&self) -> f64 {
        self.best_card
    }

    /// The average size of a row produced by this group in bytes.
    pub fn avg_row_size(&self) -> f64 {
        self.avg_row_size
    }

    /// Whether transformation rules have been applied to the expressions of this group.
    pub fn is_explored(&self) -> bool {
        self.explored
    }

    /// Whether all expressions of this group have been costed.
    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    pub(crate) fn set_explored(&mut self) {
        self.explored = true;
    }

    pub(crate) fn set_optimized(&mut self) {
        self.optimized = true;
    }

    pub(crate) fn set_avg_row_size(&mut self, avg_row_size: f64) {
        self.avg_row_size = avg_row_size;
    }

    /// Sets the number of rows known before any expression of this group has been costed.
    pub(crate) fn set_estimated_card(&mut self, card: f64) {
        if self.best_expr.is_none() {
            self.best_card = card;
        }
    }

    /// Installs the given expression as the best expression of this group.
    /// Returns `false` and leaves the group unchanged if the cost is not lower than the current best cost.
    pub(crate) fn set_best(&mut self, expr: ExprId, cost: f64, card: f64, avg_row_size: f64) -> bool {
        if cost < self.best_cost {
            self.best_cost = cost;
            self.best_expr = Some(expr);
            self.best_card = card;
            self.avg_row_size = avg_row_size;
            true
        } else {
            false
        }
    }
}

/// `Memo` owns all groups and expressions and deduplicates expressions upon insertion.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<MemoExpr>,
    groups_by_tables: HashMap<TableSet, GroupId>,
    expr_index: HashMap<(Operator, Vec<GroupId>), ExprId>,
}

impl Memo {
    pub fn new() -> Self {
        Memo::default()
    }

    /// Returns the group that covers the given set of tables. Creates a new group if there is no such group.
    pub fn group_of(&mut self, tables: TableSet) -> GroupId {
        self.get_or_create_group(tables, DEFAULT_ROW_SIZE)
    }

    /// Returns the group that covers the given set of tables.
    pub fn find_group(&self, tables: &TableSet) -> Option<GroupId> {
        self.groups_by_tables.get(tables).copied()
    }

    /// Adds an expression with the given operator and inputs to the memo.
    ///
    /// The expression is placed into the group that covers the tables of its operator (a scan)
    /// or of its inputs (other operators). Returns `None` if the memo already contains an expression
    /// with the same operator and the same inputs.
    pub fn insert(&mut self, operator: Operator, children: Vec<GroupId>) -> Result<Option<ExprId>, OptimizerError> {
        let (tables, avg_row_size) = self.expr_tables(&operator, &children)?;

        let key = (operator, children);
        if let Some(existing) = self.expr_index.get(&key) {
            log::debug!("Memo: duplicate expression {} of {}", existing, key.0);
            return Ok(None);
        }

        let group_id = self.get_or_create_group(tables, avg_row_size);
        let expr_id = ExprId(self.exprs.len());
        let (operator, children) = key;

        self.expr_index.insert((operator.clone(), children.clone()), expr_id);
        self.exprs.push(MemoExpr {
            id: expr_id,
            group_id,
            operator,
            children,
            applied_rules: 0,
        });
        self.groups[group_id.index()].exprs.push(expr_id);

        log::debug!("Memo: added expression {} {} to group {}", expr_id, self.exprs[expr_id.index()], group_id);

        Ok(Some(expr_id))
    }

    pub fn get_group(&self, group_id: GroupId) -> Result<&Group, OptimizerError> {
        self.groups
            .get(group_id.index())
            .ok_or_else(|| OptimizerError::internal(format!("Group does not exist: {}", group_id)))
    }

    pub fn get_expr(&self, expr_id: ExprId) -> Result<&MemoExpr, OptimizerError> {
        self.exprs
            .get(expr_id.index())
            .ok_or_else(|| OptimizerError::internal(format!("Expression does not exist: {}", expr_id)))
    }

    pub(crate) fn group_mut(&mut self, group_id: GroupId) -> Result<&mut Group, OptimizerError> {
        self.groups
            .get_mut(group_id.index())
            .ok_or_else(|| OptimizerError::internal(format!("Group does not exist: {}", group_id)))
    }

    pub(crate) fn expr_mut(&mut self, expr_id: ExprId) -> Result<&mut MemoExpr, OptimizerError> {
        self.exprs
            .get_mut(expr_id.index())
            .ok_or_else(|| OptimizerError::internal(format!("Expression does not exist: {}", expr_id)))
    }

    /// Returns an iterator over groups in the order they have been created.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Returns the expressions of the given group.
    pub fn group_exprs(&self, group_id: GroupId) -> Result<Vec<&MemoExpr>, OptimizerError> {
        let group = self.get_group(group_id)?;
        group.exprs.iter().map(|id| self.get_expr(*id)).collect()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    fn get_or_create_group(&mut self, tables: TableSet, avg_row_size: f64) -> GroupId {
        if let Some(group_id) = self.groups_by_tables.get(&tables) {
            return *group_id;
        }
        let group_id = GroupId(self.groups.len());
        log::debug!("Memo: added group {} {}", group_id, tables);

        self.groups_by_tables.insert(tables.clone(), group_id);
        self.groups.push(Group::new(group_id, tables, avg_row_size));
        group_id
    }

    // Returns the tables covered by an expression and the average size of its rows.
    fn expr_tables(&self, operator: &Operator, children: &[GroupId]) -> Result<(TableSet, f64), OptimizerError> {
        let expected = match operator {
            Operator::Logical(LogicalExpr::Scan { .. }) => 0,
            Operator::Logical(LogicalExpr::Sort { .. }) => 1,
            _ => 2,
        };
        if children.len() != expected {
            return Err(OptimizerError::invalid_inputs(format!(
                "{} expects {} input(s) but got {}",
                operator,
                expected,
                children.len()
            )));
        }

        match (operator, children) {
            (Operator::Logical(LogicalExpr::Scan { table, .. }), _) => Ok((TableSet::single(table), DEFAULT_ROW_SIZE)),
            (Operator::Logical(LogicalExpr::Sort { .. }), [input]) => {
                let input = self.get_group(*input)?;
                Ok((input.tables.clone(), input.avg_row_size))
            }
            (_, [left, right]) => {
                let left = self.get_group(*left)?;
                let right = self.get_group(*right)?;
                if !left.tables.is_disjoint(&right.tables) {
                    return Err(OptimizerError::invalid_inputs(format!(
                        "Inputs of {} overlap: {} {}",
                        operator, left.tables, right.tables
                    )));
                }
                Ok((left.tables.union(&right.tables), left.avg_row_size + right.avg_row_size))
            }
            _ => Err(OptimizerError::internal(format!("Unexpected inputs of {}", operator))),
        }
    }
}

/// Builds a textual representation of the given memo.
/// Groups are written in reverse order of their creation, one line per expression.
pub fn format_memo(memo: &Memo) -> String {
    let mut buf = String::new();

    for group in memo.groups.iter().rev() {
        buf.push_str(format!("{} ", group.id).as_str());
        for (i, expr_id) in group.exprs.iter().enumerate() {
            if i > 0 {
                // newline + 3 spaces
                buf.push_str("\n   ");
            }
            let expr = &memo.exprs[expr_id.index()];
            buf.push_str(expr.to_string().as_str());
        }
        buf.push('\n');
    }

    buf
}
