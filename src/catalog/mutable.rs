//! Mutable implementation of a database catalog.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::catalog::{ensure_sync_send, Catalog, IndexMeta, TableStatisticsRef};
use crate::error::OptimizerError;
use crate::statistics::TableStatistics;

/// A [database catalog] that stores statistics and index metadata in memory.
///
/// # Error handling
///
/// Errors returned by methods of the `MutableCatalog` are recoverable.
///
/// [database catalog]: crate::catalog::Catalog
#[derive(Debug, Default)]
pub struct MutableCatalog {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    statistics: HashMap<String, TableStatisticsRef>,
    tables: Vec<String>,
    indexes: HashMap<(String, String), (IndexMeta, PathBuf)>,
}

impl MutableCatalog {
    /// Creates a instance of [MutableCatalog].
    pub fn new() -> Self {
        MutableCatalog::default()
    }

    /// Adds statistics of a base table. If the table already exists this method returns an error.
    pub fn add_table(&self, name: &str, statistics: TableStatistics) -> Result<(), OptimizerError> {
        let mut guard = self.write()?;
        let inner = &mut *guard;
        if name.contains('&') {
            return Err(OptimizerError::argument(format!("Add table: Invalid table name: {}", name)));
        }
        match inner.statistics.entry(name.into()) {
            Entry::Occupied(_) => Err(OptimizerError::argument(format!("Add table: Table already exists. Table: {}", name))),
            Entry::Vacant(v) => {
                v.insert(triomphe::Arc::new(statistics));
                inner.tables.push(name.into());
                Ok(())
            }
        }
    }

    /// Registers an index on the given column. The table must exist and the column must not be indexed yet.
    pub fn add_index(&self, table: &str, column: &str, meta: IndexMeta, path: &Path) -> Result<(), OptimizerError> {
        let mut inner = self.write()?;
        if !inner.tables.iter().any(|t| t == table) {
            return Err(OptimizerError::unknown_table(table));
        }
        match inner.indexes.entry((table.into(), column.into())) {
            Entry::Occupied(_) => Err(OptimizerError::argument(format!(
                "Add index: Index already exists. Table: {}, column: {}",
                table, column
            ))),
            Entry::Vacant(v) => {
                v.insert((meta, path.to_path_buf()));
                Ok(())
            }
        }
    }

    /// Removes a base table with its indexes and all statistics of join results that include it.
    /// If the table does not exist this method returns an error.
    pub fn remove_table(&self, name: &str) -> Result<(), OptimizerError> {
        let mut inner = self.write()?;
        if !inner.tables.iter().any(|t| t == name) {
            return Err(OptimizerError::unknown_table(name));
        }
        inner.tables.retain(|t| t != name);
        inner.indexes.retain(|(t, _), _| t != name);
        inner.statistics.retain(|key, _| !key.split('&').any(|t| t == name));
        Ok(())
    }

    /// Returns the names of registered base tables in the order they were added.
    pub fn tables(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(inner) => inner.tables.clone(),
            Err(_) => Vec::new(),
        }
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, OptimizerError> {
        self.inner.write().map_err(|_| OptimizerError::internal("Catalog lock is poisoned"))
    }

    fn read(&self) -> Option<RwLockReadGuard<'_, Inner>> {
        self.inner.read().ok()
    }
}

impl Catalog for MutableCatalog {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_statistics(&self, key: &str) -> Option<TableStatisticsRef> {
        let inner = self.read()?;
        inner.statistics.get(key).cloned()
    }

    fn get_index(&self, table: &str, column: &str) -> Option<IndexMeta> {
        let inner = self.read()?;
        inner.indexes.get(&(table.to_string(), column.to_string())).map(|(meta, _)| *meta)
    }

    fn get_index_path(&self, table: &str, column: &str) -> Option<PathBuf> {
        let inner = self.read()?;
        inner.indexes.get(&(table.to_string(), column.to_string())).map(|(_, path)| path.clone())
    }

    fn put_statistics(&self, key: &str, statistics: TableStatistics) -> Result<(), OptimizerError> {
        let mut inner = self.write()?;
        if inner.tables.iter().any(|t| t == key) {
            let message = format!("Statistics of a base table can not be replaced. Table: {}", key);
            return Err(OptimizerError::argument(message));
        }
        inner.statistics.insert(key.into(), triomphe::Arc::new(statistics));
        Ok(())
    }
}

const _: fn() = ensure_sync_send::<MutableCatalog>;

#[cfg(test)]
mod test {
    use crate::catalog::mutable::MutableCatalog;
    use crate::catalog::{Catalog, IndexMeta};
    use crate::error::{ArgumentKind, OptimizerError};
    use crate::statistics::TableStatisticsBuilder;
    use std::path::Path;

    #[test]
    fn test_tables() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        catalog.add_table("A", TableStatisticsBuilder::new(100).build()?)?;

        let statistics = catalog.get_statistics("A").unwrap_or_else(|| panic!("table A is missing"));
        assert_eq!(statistics.row_count(), 100.0);

        let err = catalog.add_table("A", TableStatisticsBuilder::new(10).build()?);
        assert!(err.is_err(), "table has been added twice");

        catalog.remove_table("A")?;
        assert!(catalog.get_statistics("A").is_none(), "table has not been removed");
        let err = catalog.remove_table("A").unwrap_err();
        assert_eq!(err.argument_kind(), Some(ArgumentKind::UnknownTable));
        Ok(())
    }

    #[test]
    fn test_indexes() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        catalog.add_table("A", TableStatisticsBuilder::new(100).build()?)?;

        let path = Path::new("/tmp/A_a1.idx");
        catalog.add_index("A", "a1", IndexMeta::new(10, 2), path)?;

        assert_eq!(catalog.get_index("A", "a1"), Some(IndexMeta::new(10, 2)));
        assert_eq!(catalog.get_index_path("A", "a1"), Some(path.to_path_buf()));
        assert_eq!(catalog.get_index("A", "a2"), None);

        let err = catalog.add_index("B", "b1", IndexMeta::new(1, 1), path).unwrap_err();
        assert_eq!(err.argument_kind(), Some(ArgumentKind::UnknownTable), "table B does not exist");
        assert!(catalog.add_index("A", "a1", IndexMeta::new(1, 1), path).is_err(), "index already exists");

        catalog.remove_table("A")?;
        assert_eq!(catalog.get_index("A", "a1"), None, "table A has been removed but its index is still available");
        Ok(())
    }

    #[test]
    fn test_join_statistics() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        catalog.add_table("A", TableStatisticsBuilder::new(100).build()?)?;
        catalog.add_table("B", TableStatisticsBuilder::new(100).build()?)?;

        catalog.put_statistics("A&B", TableStatisticsBuilder::new(42).build()?)?;
        assert_eq!(catalog.get_statistics("A&B").map(|s| s.row_count()), Some(42.0));

        assert!(catalog.put_statistics("A", TableStatisticsBuilder::new(1).build()?).is_err());

        catalog.remove_table("B")?;
        assert!(catalog.get_statistics("A&B").is_none(), "join statistics must be removed with the table");
        assert_eq!(catalog.tables(), vec!["A".to_string()]);
        Ok(())
    }
}
