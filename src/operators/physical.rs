use crate::operators::join::JoinCondition;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// A physical expression represents an algorithm that can be used to implement a [logical expression].
///
/// [logical expression]: crate::operators::logical::LogicalExpr
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PhysicalExpr {
    /// Builds a hash table on one input and probes it with the other.
    /// A partitioned hash join splits both inputs into partitions that are joined one by one.
    HashJoin {
        condition: JoinCondition,
        build_side_left: bool,
        partitioned: bool,
    },
    /// Scans the inner input once per block of the outer input.
    BlockNestedLoopJoin { condition: JoinCondition, outer_left: bool },
    /// Looks up matching rows of the right input in an index on its join column.
    IndexNestedLoopJoin { condition: JoinCondition, index_path: PathBuf },
    /// Merges two inputs ordered by their join columns.
    SortMergeJoin { condition: JoinCondition, already_sorted: bool },
}

impl PhysicalExpr {
    pub fn condition(&self) -> &JoinCondition {
        match self {
            PhysicalExpr::HashJoin { condition, .. } => condition,
            PhysicalExpr::BlockNestedLoopJoin { condition, .. } => condition,
            PhysicalExpr::IndexNestedLoopJoin { condition, .. } => condition,
            PhysicalExpr::SortMergeJoin { condition, .. } => condition,
        }
    }
}

impl Display for PhysicalExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalExpr::HashJoin {
                condition,
                build_side_left,
                partitioned,
            } => {
                let name = if *partitioned { "GraceHashJoin" } else { "HashJoin" };
                let build = if *build_side_left { "left" } else { "right" };
                write!(f, "{} {} build={}", name, condition, build)
            }
            PhysicalExpr::BlockNestedLoopJoin { condition, outer_left } => {
                let outer = if *outer_left { "left" } else { "right" };
                write!(f, "BlockNestedLoopJoin {} outer={}", condition, outer)
            }
            PhysicalExpr::IndexNestedLoopJoin { condition, index_path } => {
                write!(f, "IndexNestedLoopJoin {} index={}", condition, index_path.display())
            }
            PhysicalExpr::SortMergeJoin {
                condition,
                already_sorted,
            } => {
                let name = if *already_sorted { "MergeJoin" } else { "SortMergeJoin" };
                write!(f, "{} {}", name, condition)
            }
        }
    }
}
