//! Table and column statistics.

use std::collections::HashMap;

use crate::datatypes::DataType;
use crate::error::OptimizerError;
use crate::statistics::prefix::PrefixHistogram;
use crate::statistics::quantiles::QuantileSketch;

pub mod builder;
pub mod hll;
pub mod prefix;
pub mod quantiles;

/// The average size of a row in bytes when it is not known.
pub const DEFAULT_ROW_SIZE: f64 = 100.0;

/// Statistics of a base table or of the result of a join of several tables.
#[derive(Debug, Clone)]
pub struct TableStatistics {
    row_count: f64,
    file_pages: f64,
    total_bytes: f64,
    avg_row_size: f64,
    columns: HashMap<String, ColumnStatistics>,
}

impl TableStatistics {
    /// The number of rows.
    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    /// The number of pages the rows occupy on disk.
    pub fn file_pages(&self) -> f64 {
        self.file_pages
    }

    /// The total size of all rows in bytes.
    pub fn total_bytes(&self) -> f64 {
        self.total_bytes
    }

    /// The average size of a row in bytes.
    pub fn avg_row_size(&self) -> f64 {
        self.avg_row_size
    }

    /// Returns statistics of the given column.
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &ColumnStatistics)> {
        self.columns.iter()
    }
}

/// A builder to create instances of [TableStatistics].
#[derive(Debug, Clone)]
pub struct TableStatisticsBuilder {
    row_count: u64,
    file_pages: Option<u64>,
    total_bytes: Option<u64>,
    avg_row_size: Option<f64>,
    page_size: u64,
    columns: Vec<(String, ColumnStatistics)>,
}

impl TableStatisticsBuilder {
    /// Creates a builder for statistics of a table with the given number of rows.
    pub fn new(row_count: u64) -> Self {
        TableStatisticsBuilder {
            row_count,
            file_pages: None,
            total_bytes: None,
            avg_row_size: None,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            columns: Vec::new(),
        }
    }

    /// Sets the total size of the table in bytes.
    pub fn total_bytes(mut self, bytes: u64) -> Self {
        self.total_bytes = Some(bytes);
        self
    }

    /// Sets the average row size. When omitted it is computed from the total size of the table.
    pub fn avg_row_size(mut self, bytes: f64) -> Self {
        self.avg_row_size = Some(bytes);
        self
    }

    /// Sets the number of pages. When omitted it is computed from the total size of the table.
    pub fn file_pages(mut self, pages: u64) -> Self {
        self.file_pages = Some(pages);
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Adds statistics of a column.
    pub fn add_column(mut self, name: &str, statistics: ColumnStatistics) -> Self {
        self.columns.push((name.into(), statistics));
        self
    }

    /// Creates an instance of [TableStatistics].
    pub fn build(self) -> Result<TableStatistics, OptimizerError> {
        if self.page_size == 0 {
            return Err(OptimizerError::argument("Page size must be positive"));
        }
        if let Some(avg) = self.avg_row_size {
            if !avg.is_finite() || avg < 0.0 {
                return Err(OptimizerError::argument(format!("Invalid average row size: {}", avg)));
            }
        }

        let row_count = self.row_count as f64;
        let (total_bytes, avg_row_size) = match (self.total_bytes, self.avg_row_size) {
            (Some(total), Some(avg)) => (total as f64, avg),
            (Some(total), None) if self.row_count > 0 => (total as f64, total as f64 / row_count),
            (Some(total), None) => (total as f64, 0.0),
            (None, Some(avg)) => (row_count * avg, avg),
            (None, None) => (row_count * DEFAULT_ROW_SIZE, DEFAULT_ROW_SIZE),
        };
        let file_pages = match self.file_pages {
            Some(pages) => pages as f64,
            None => (total_bytes / self.page_size as f64).ceil(),
        };

        let mut columns = HashMap::with_capacity(self.columns.len());
        for (name, statistics) in self.columns {
            if columns.contains_key(&name) {
                return Err(OptimizerError::argument(format!("Column statistics already exist. Column: {}", name)));
            }
            columns.insert(name, statistics);
        }

        Ok(TableStatistics {
            row_count,
            file_pages,
            total_bytes,
            avg_row_size,
            columns,
        })
    }
}

/// Statistics of a single column.
#[derive(Debug, Clone)]
pub struct ColumnStatistics {
    data_type: DataType,
    ndv: f64,
    min: Option<f64>,
    max: Option<f64>,
    null_count: u64,
    value_count: u64,
    quantiles: Option<QuantileSketch>,
    prefixes: Option<PrefixHistogram>,
    was_sorted: bool,
}

impl ColumnStatistics {
    /// Creates statistics of a column with the given number of distinct values.
    pub fn new(data_type: DataType, ndv: f64) -> Self {
        ColumnStatistics {
            data_type,
            ndv,
            min: None,
            max: None,
            null_count: 0,
            value_count: 0,
            quantiles: None,
            prefixes: None,
            was_sorted: false,
        }
    }

    /// Sets the minimum and the maximum values. Dates are represented as days since the unix epoch.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets the number of nulls among `value_count` values (nulls included).
    pub fn with_nulls(mut self, null_count: u64, value_count: u64) -> Self {
        self.null_count = null_count;
        self.value_count = value_count;
        self
    }

    pub fn with_quantiles(mut self, quantiles: QuantileSketch) -> Self {
        self.quantiles = Some(quantiles);
        self
    }

    pub fn with_prefixes(mut self, prefixes: PrefixHistogram) -> Self {
        self.prefixes = Some(prefixes);
        self
    }

    /// Marks the column as stored in ascending order.
    pub fn with_sorted(mut self, sorted: bool) -> Self {
        self.was_sorted = sorted;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The estimated number of distinct values.
    pub fn ndv(&self) -> f64 {
        self.ndv
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    pub fn value_count(&self) -> u64 {
        self.value_count
    }

    /// Returns the quantile sketch if it contains at least one value.
    pub fn quantiles(&self) -> Option<&QuantileSketch> {
        self.quantiles.as_ref().filter(|q| !q.is_empty())
    }

    /// Returns the prefix histogram if it contains at least one value.
    pub fn prefixes(&self) -> Option<&PrefixHistogram> {
        self.prefixes.as_ref().filter(|p| !p.is_empty())
    }

    /// Whether values of this column are stored in ascending order.
    pub fn was_sorted(&self) -> bool {
        self.was_sorted
    }

    /// The fraction of values that are not null.
    pub fn non_null_fraction(&self) -> f64 {
        if self.value_count == 0 {
            1.0
        } else {
            let nulls = self.null_count.min(self.value_count) as f64;
            1.0 - nulls / self.value_count as f64
        }
    }
}

/// Creates statistics of the result of a join of two inputs with the given statistics.
///
/// Column statistics of both inputs are merged (the left input takes precedence when both contain
/// a column with the same name), the number of distinct values is capped at the new row count
/// and no column of the result is considered sorted.
pub fn synthesize_join_statistics(
    left: &TableStatistics,
    right: &TableStatistics,
    row_count: f64,
    page_size: f64,
) -> TableStatistics {
    let row_count = row_count.max(0.0);
    let avg_row_size = left.avg_row_size + right.avg_row_size;
    let total_bytes = row_count * avg_row_size;
    let file_pages = (total_bytes / page_size).ceil();

    let mut columns = HashMap::with_capacity(left.columns.len() + right.columns.len());
    for (name, statistics) in right.columns.iter().chain(left.columns.iter()) {
        let mut statistics = statistics.clone();
        statistics.ndv = statistics.ndv.min(row_count);
        statistics.was_sorted = false;
        columns.insert(name.clone(), statistics);
    }

    TableStatistics {
        row_count,
        file_pages,
        total_bytes,
        avg_row_size,
        columns,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn build_table_statistics() {
        let statistics = TableStatisticsBuilder::new(1000)
            .total_bytes(50_000)
            .page_size(8192)
            .add_column("a1", ColumnStatistics::new(DataType::Int32, 100.0))
            .build()
            .unwrap();

        assert_eq!(statistics.row_count(), 1000.0);
        assert_eq!(statistics.avg_row_size(), 50.0);
        assert_eq!(statistics.file_pages(), 7.0);
        assert_eq!(statistics.column("a1").map(|c| c.ndv()), Some(100.0));
        assert!(statistics.column("a2").is_none());
    }

    #[test]
    fn default_row_size() {
        let statistics = TableStatisticsBuilder::new(10).build().unwrap();
        assert_eq!(statistics.avg_row_size(), DEFAULT_ROW_SIZE);
        assert_eq!(statistics.total_bytes(), 1000.0);
        assert_eq!(statistics.file_pages(), 1.0);
    }

    #[test]
    fn reject_invalid_statistics() {
        let duplicate = TableStatisticsBuilder::new(10)
            .add_column("a1", ColumnStatistics::new(DataType::Int32, 1.0))
            .add_column("a1", ColumnStatistics::new(DataType::Int32, 1.0))
            .build();
        assert!(duplicate.is_err(), "duplicate column");

        let negative = TableStatisticsBuilder::new(10).avg_row_size(-1.0).build();
        assert!(negative.is_err(), "negative row size");
    }

    #[test]
    fn non_null_fraction() {
        let column = ColumnStatistics::new(DataType::Int32, 10.0).with_nulls(25, 100);
        assert_eq!(column.non_null_fraction(), 0.75);

        let column = ColumnStatistics::new(DataType::Int32, 10.0);
        assert_eq!(column.non_null_fraction(), 1.0);
    }

    #[test]
    fn synthesize_statistics() {
        let left = TableStatisticsBuilder::new(100)
            .avg_row_size(40.0)
            .add_column("id", ColumnStatistics::new(DataType::Int32, 100.0).with_sorted(true))
            .add_column("a1", ColumnStatistics::new(DataType::Int32, 100.0).with_sorted(true))
            .build()
            .unwrap();
        let right = TableStatisticsBuilder::new(50)
            .avg_row_size(60.0)
            .add_column("id", ColumnStatistics::new(DataType::String, 50.0))
            .add_column("b1", ColumnStatistics::new(DataType::Int32, 20.0))
            .build()
            .unwrap();

        let joined = synthesize_join_statistics(&left, &right, 30.0, 8192.0);

        assert_eq!(joined.row_count(), 30.0);
        assert_eq!(joined.avg_row_size(), 100.0);
        assert_eq!(joined.total_bytes(), 3000.0);
        assert_eq!(joined.file_pages(), 1.0);

        let id = joined.column("id").unwrap();
        assert_eq!(id.data_type(), DataType::Int32, "left column wins");
        assert_eq!(id.ndv(), 30.0, "ndv is capped");
        assert!(!id.was_sorted());

        assert_eq!(joined.column("b1").map(|c| c.ndv()), Some(20.0));
        assert_eq!(joined.columns().count(), 3);
    }
}
