use crate::operators::join::JoinCondition;
use std::fmt::{Display, Formatter};

/// A logical expression describes a high-level operator without specifying an implementation algorithm to be used.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum LogicalExpr {
    /// Reads all rows of a base table.
    Scan { table: String, card: u64 },
    /// Joins the rows of its two inputs.
    Join { condition: JoinCondition },
    /// Orders the rows of its input by the given column.
    /// No rule produces a sort. Callers insert it into the memo on top of a group when they need ordered rows.
    Sort { key: String },
}

impl LogicalExpr {
    /// Returns the join condition if this is a join.
    pub fn join_condition(&self) -> Option<&JoinCondition> {
        match self {
            LogicalExpr::Join { condition } => Some(condition),
            _ => None,
        }
    }
}

impl Display for LogicalExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalExpr::Scan { table, card } => write!(f, "Scan {} card={}", table, card),
            LogicalExpr::Join { condition } => write!(f, "Join {}", condition),
            LogicalExpr::Sort { key } => write!(f, "Sort {}", key),
        }
    }
}
