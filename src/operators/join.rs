use crate::error::OptimizerError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The type of a join.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Returns the join type of the same join with its inputs swapped.
    pub fn mirrored(&self) -> JoinType {
        match self {
            JoinType::Left => JoinType::Right,
            JoinType::Right => JoinType::Left,
            other => *other,
        }
    }

    /// Returns `true` if rows of the left input without a match appear in the output.
    pub fn preserves_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Returns `true` if rows of the right input without a match appear in the output.
    pub fn preserves_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl Display for JoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for JoinType {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL" => Ok(JoinType::Full),
            _ => Err(OptimizerError::argument(format!("Unknown join type: {}", s))),
        }
    }
}

/// A binary comparison between a column of the left input and a column of the right input.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    /// Returns the operator that produces the same result when its operands are swapped.
    /// `a < b` becomes `b > a`, equality and inequality stay as they are.
    pub fn flipped(&self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::LtEq => CmpOp::GtEq,
            CmpOp::GtEq => CmpOp::LtEq,
            other => *other,
        }
    }

    /// Returns `true` if this is one of `<`, `<=`, `>`, `>=`.
    pub fn is_range(&self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "<>",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        }
    }
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for CmpOp {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(CmpOp::Eq),
            "<>" | "!=" => Ok(CmpOp::NotEq),
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::LtEq),
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::GtEq),
            _ => Err(OptimizerError::argument(format!("Unknown comparison operator: {}", s))),
        }
    }
}

/// Join condition: `left_column <op> right_column`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct JoinCondition {
    pub join_type: JoinType,
    pub left_column: String,
    pub right_column: String,
    pub op: CmpOp,
}

impl JoinCondition {
    pub fn new(join_type: JoinType, left_column: &str, right_column: &str, op: CmpOp) -> Self {
        JoinCondition {
            join_type,
            left_column: left_column.into(),
            right_column: right_column.into(),
            op,
        }
    }

    /// Returns the condition for the same join with its inputs swapped.
    /// The columns are exchanged and the comparison is flipped, the join type is left as is.
    pub fn swapped(&self) -> JoinCondition {
        JoinCondition {
            join_type: self.join_type,
            left_column: self.right_column.clone(),
            right_column: self.left_column.clone(),
            op: self.op.flipped(),
        }
    }

    /// Returns a copy of this condition with the given join type.
    pub fn with_join_type(mut self, join_type: JoinType) -> JoinCondition {
        self.join_type = join_type;
        self
    }

    /// Returns `true` if this is an equi-join condition.
    pub fn is_equi_join(&self) -> bool {
        self.op == CmpOp::Eq
    }
}

impl Display for JoinCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.join_type, self.left_column, self.op, self.right_column)
    }
}

/// A join between two base tables as produced by a query parser.
/// A join query is an ordered list of such joins that forms a connected chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Join {
    pub left_table: String,
    pub right_table: String,
    pub condition: JoinCondition,
}

impl Join {
    pub fn new(left_table: &str, right_table: &str, condition: JoinCondition) -> Self {
        Join {
            left_table: left_table.into(),
            right_table: right_table.into(),
            condition,
        }
    }

    /// Shorthand for an inner equi-join `left_table.left_column = right_table.right_column`.
    pub fn inner(left_table: &str, left_column: &str, right_table: &str, right_column: &str) -> Self {
        Join::new(left_table, right_table, JoinCondition::new(JoinType::Inner, left_column, right_column, CmpOp::Eq))
    }
}
