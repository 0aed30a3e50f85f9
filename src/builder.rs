//! Creates the initial memo from a list of joins.

use crate::catalog::Catalog;
use crate::error::OptimizerError;
use crate::memo::{GroupId, Memo, TableSet};
use crate::operators::join::Join;
use crate::operators::Operator;

/// Turns a list of [joins](crate::operators::join::Join) into a left-deep tree of logical joins stored in a memo.
///
/// The first join joins two base tables. Every subsequent join joins the result of the previous joins
/// with its right table. The left table of a subsequent join must be one of the tables joined so far.
pub struct LogicalBuilder<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> LogicalBuilder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        LogicalBuilder { catalog }
    }

    /// Adds scans of the joined tables and the joins to the given memo and returns the group of the last join.
    pub fn build(&self, joins: &[Join], memo: &mut Memo) -> Result<GroupId, OptimizerError> {
        if joins.is_empty() {
            return Err(OptimizerError::invalid_joins("Join list is empty"));
        }

        let mut current: Option<(GroupId, TableSet)> = None;

        for join in joins {
            let (left, left_tables) = match current.take() {
                None => {
                    let left = self.add_scan(&join.left_table, memo)?;
                    (left, TableSet::single(&join.left_table))
                }
                Some((group_id, tables)) if tables.contains(&join.left_table) => (group_id, tables),
                Some((_, tables)) => {
                    return Err(OptimizerError::invalid_joins(format!(
                        "Join {} -> {} is not connected to tables {}",
                        join.left_table, join.right_table, tables
                    )))
                }
            };
            if left_tables.contains(&join.right_table) {
                return Err(OptimizerError::invalid_joins(format!(
                    "Table {} has already been joined: {}",
                    join.right_table, left_tables
                )));
            }

            let right = self.add_scan(&join.right_table, memo)?;
            memo.insert(Operator::join(join.condition.clone()), vec![left, right])?;

            let tables = left_tables.union(&TableSet::single(&join.right_table));
            let group_id = memo
                .find_group(&tables)
                .ok_or_else(|| OptimizerError::internal(format!("No group for tables {}", tables)))?;

            log::debug!("Builder: {} {} -> group {}", join.condition, tables, group_id);
            current = Some((group_id, tables));
        }

        match current {
            Some((group_id, _)) => Ok(group_id),
            None => Err(OptimizerError::internal("No joins have been added")),
        }
    }

    // Adds a scan of a base table. The group of the scan knows the number of rows of the table
    // and its average row size before the scan is costed.
    fn add_scan(&self, table: &str, memo: &mut Memo) -> Result<GroupId, OptimizerError> {
        let statistics = self
            .catalog
            .get_statistics(table)
            .ok_or_else(|| OptimizerError::unknown_table(table))?;

        memo.insert(Operator::scan(table, statistics.row_count() as u64), vec![])?;

        let tables = TableSet::single(table);
        let group_id = memo
            .find_group(&tables)
            .ok_or_else(|| OptimizerError::internal(format!("No group for table {}", table)))?;
        let group = memo.group_mut(group_id)?;
        group.set_estimated_card(statistics.row_count());
        group.set_avg_row_size(statistics.avg_row_size());

        Ok(group_id)
    }
}
