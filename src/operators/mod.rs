//! Operators of a join query.

use crate::operators::join::JoinCondition;
use crate::operators::logical::LogicalExpr;
use crate::operators::physical::PhysicalExpr;
use std::fmt::{Display, Formatter};

pub mod join;
pub mod logical;
pub mod physical;

/// An operator stored in a memo expression. An operator is either logical or physical.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Operator {
    Logical(LogicalExpr),
    Physical(PhysicalExpr),
}

impl Operator {
    /// Creates a logical scan of the given table.
    pub fn scan(table: &str, card: u64) -> Self {
        Operator::Logical(LogicalExpr::Scan {
            table: table.into(),
            card,
        })
    }

    /// Creates a logical join.
    pub fn join(condition: JoinCondition) -> Self {
        Operator::Logical(LogicalExpr::Join { condition })
    }

    /// Creates a logical sort.
    pub fn sort(key: &str) -> Self {
        Operator::Logical(LogicalExpr::Sort { key: key.into() })
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    /// Returns the join condition of a logical or a physical join.
    pub fn join_condition(&self) -> Option<&JoinCondition> {
        match self {
            Operator::Logical(expr) => expr.join_condition(),
            Operator::Physical(expr) => Some(expr.condition()),
        }
    }

    /// Returns the logical join condition if this operator is a logical join.
    pub fn logical_join(&self) -> Option<&JoinCondition> {
        match self {
            Operator::Logical(expr) => expr.join_condition(),
            Operator::Physical(_) => None,
        }
    }

    /// Returns `true` if this operator is a logical or a physical join (an operator with two inputs).
    pub fn is_binary(&self) -> bool {
        self.join_condition().is_some()
    }

    /// Returns `true` if a cost can be assigned to this operator.
    /// Logical joins only describe the search space and are never part of a plan.
    pub fn is_costable(&self) -> bool {
        !matches!(self, Operator::Logical(LogicalExpr::Join { .. }))
    }
}

impl From<LogicalExpr> for Operator {
    fn from(expr: LogicalExpr) -> Self {
        Operator::Logical(expr)
    }
}

impl From<PhysicalExpr> for Operator {
    fn from(expr: PhysicalExpr) -> Self {
        Operator::Physical(expr)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Logical(expr) => write!(f, "{}", expr),
            Operator::Physical(expr) => write!(f, "{}", expr),
        }
    }
}
