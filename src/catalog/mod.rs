//! Database catalog.

use std::any::Any;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;

use crate::error::OptimizerError;
use crate::statistics::TableStatistics;

pub mod mutable;

pub type CatalogRef = Arc<dyn Catalog>;
pub type TableStatisticsRef = triomphe::Arc<TableStatistics>;

/// The fan-out of an index B+Tree.
pub const INDEX_FAN_OUT: f64 = 129.0;

/// Provides statistics and index metadata used by the optimizer and accepts statistics the optimizer
/// derives for the results of joins.
///
/// Statistics are keyed either by the name of a base table or by the [key](table_set_key) of a set of tables.
pub trait Catalog: Debug + Sync + Send {
    /// Returns this catalog as [`Any`](std::any::Any) in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// Returns statistics of a table or of a join result with the given key.
    fn get_statistics(&self, key: &str) -> Option<TableStatisticsRef>;

    /// Returns metadata of an index on the given column.
    fn get_index(&self, table: &str, column: &str) -> Option<IndexMeta>;

    /// Returns the location of an index on the given column.
    fn get_index_path(&self, table: &str, column: &str) -> Option<PathBuf>;

    /// Stores statistics of a join result under the given key, replacing the previous ones.
    fn put_statistics(&self, key: &str, statistics: TableStatistics) -> Result<(), OptimizerError>;
}

/// Returns the key of a set of tables: names of the tables in ascending order joined by `&`.
/// The key of a single table is its name.
pub fn table_set_key<'a, I>(tables: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    tables.into_iter().sorted().dedup().join("&")
}

/// Metadata of a B+Tree index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMeta {
    leaf_pages: u64,
    height: u32,
}

impl IndexMeta {
    pub fn new(leaf_pages: u64, height: u32) -> Self {
        IndexMeta { leaf_pages, height }
    }

    /// Creates index metadata from the number of pages used by an index.
    /// The height is derived from the [fan-out](self::INDEX_FAN_OUT) and is at least 1.
    pub fn from_pages(pages: u64) -> Self {
        let height = if pages > 1 {
            ((pages as f64).ln() / INDEX_FAN_OUT.ln()).ceil() as u32
        } else {
            0
        };
        IndexMeta {
            leaf_pages: pages,
            height: height.max(1),
        }
    }

    /// The number of leaf pages.
    pub fn leaf_pages(&self) -> u64 {
        self.leaf_pages
    }

    /// The number of levels to traverse to reach a leaf page.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Compiles only if `T` can be shared between the threads that run optimizations.
pub(crate) fn ensure_sync_send<T>()
where
    T: Sync + Send,
{
}
