use std::path::PathBuf;
use std::sync::{Arc, Once};

use serde::Deserialize;

use crate::catalog::mutable::MutableCatalog;
use crate::catalog::IndexMeta;
use crate::config::OptimizerConfig;
use crate::datatypes::DataType;
use crate::memo::{format_memo, Memo};
use crate::operators::join::Join;
use crate::optimizer::Optimizer;
use crate::plan::{format_plan, OptimizedPlan};
use crate::statistics::{ColumnStatistics, TableStatisticsBuilder};

static INIT_LOG: Once = Once::new();

pub fn init_logger() {
    INIT_LOG.call_once(pretty_env_logger::init);
}

/// Tables used by tests.
///
/// `A`, `B` and `C` are small tables used by unit tests.
/// `nation`, `customer`, `orders` and `lineitem` are used by tests of the optimizer.
pub const TEST_TABLES: &str = r#"
- name: A
  rows: 100
  row_size: 100
  columns:
    - { name: a1, type: int32, ndv: 100, min: 0, max: 99, sorted: true }
    - { name: a2, type: int32, ndv: 10, min: 0, max: 9 }
- name: B
  rows: 50
  row_size: 100
  columns:
    - { name: b1, type: int32, ndv: 50, min: 0, max: 49, sorted: true }
    - { name: b2, type: int32, ndv: 10, min: 0, max: 9 }
  indexes:
    - { column: b1, leaf_pages: 4, height: 2 }
- name: C
  rows: 10
  row_size: 100
  columns:
    - { name: c1, type: int32, ndv: 10, min: 0, max: 9 }
    - { name: c2, type: string, ndv: 5 }
- name: nation
  rows: 25
  row_size: 120
  columns:
    - { name: n_nationkey, type: int32, ndv: 25, min: 0, max: 24, sorted: true }
    - { name: n_name, type: char, ndv: 25 }
- name: customer
  rows: 15000
  row_size: 180
  columns:
    - { name: c_custkey, type: int32, ndv: 15000, min: 1, max: 15000, sorted: true }
    - { name: c_nationkey, type: int32, ndv: 25, min: 0, max: 24 }
    - { name: c_acctbal, type: decimal, ndv: 14000, min: -999, max: 9999, nulls: 150 }
- name: orders
  rows: 150000
  row_size: 110
  columns:
    - { name: o_orderkey, type: int64, ndv: 150000, min: 1, max: 600000, sorted: true }
    - { name: o_custkey, type: int32, ndv: 10000, min: 1, max: 15000 }
    - { name: o_orderdate, type: date, ndv: 2400, min: 8035, max: 10440 }
  indexes:
    - { column: o_custkey, leaf_pages: 300 }
- name: lineitem
  rows: 600000
  row_size: 130
  columns:
    - { name: l_orderkey, type: int64, ndv: 150000, min: 1, max: 600000, sorted: true }
    - { name: l_partkey, type: int32, ndv: 20000, min: 1, max: 20000 }
    - { name: l_shipdate, type: date, ndv: 2500, min: 8036, max: 10561 }
  indexes:
    - { column: l_orderkey, leaf_pages: 1200 }
"#;

#[derive(Debug, Deserialize)]
struct TableSpec {
    name: String,
    rows: u64,
    row_size: f64,
    #[serde(default)]
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    indexes: Vec<IndexSpec>,
}

#[derive(Debug, Deserialize)]
struct ColumnSpec {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    ndv: f64,
    min: Option<f64>,
    max: Option<f64>,
    #[serde(default)]
    nulls: u64,
    #[serde(default)]
    sorted: bool,
}

#[derive(Debug, Deserialize)]
struct IndexSpec {
    column: String,
    leaf_pages: u64,
    height: Option<u32>,
}

/// Creates a catalog from a YAML list of table descriptions.
/// An index on column `c` of table `t` is stored at path `t_c.idx`.
pub fn catalog_from_yaml(yaml: &str) -> Arc<MutableCatalog> {
    let tables: Vec<TableSpec> = serde_yaml::from_str(yaml).expect("Invalid catalog description");
    let catalog = MutableCatalog::new();

    for table in tables {
        let mut builder = TableStatisticsBuilder::new(table.rows).avg_row_size(table.row_size);
        for column in table.columns.iter() {
            let data_type: DataType = column.data_type.parse().expect("Invalid data type");
            let mut statistics = ColumnStatistics::new(data_type, column.ndv).with_sorted(column.sorted);
            if let (Some(min), Some(max)) = (column.min, column.max) {
                statistics = statistics.with_range(min, max);
            }
            if column.nulls > 0 {
                statistics = statistics.with_nulls(column.nulls, table.rows);
            }
            builder = builder.add_column(&column.name, statistics);
        }
        let statistics = builder.build().expect("Invalid table statistics");
        catalog.add_table(&table.name, statistics).expect("Failed to add a table");

        for index in table.indexes {
            let meta = match index.height {
                Some(height) => IndexMeta::new(index.leaf_pages, height),
                None => IndexMeta::from_pages(index.leaf_pages),
            };
            let path = PathBuf::from(format!("{}_{}.idx", table.name, index.column));
            catalog.add_index(&table.name, &index.column, meta, &path).expect("Failed to add an index");
        }
    }

    Arc::new(catalog)
}

/// Returns a new catalog that contains [test tables](self::TEST_TABLES).
pub fn test_catalog() -> Arc<MutableCatalog> {
    catalog_from_yaml(TEST_TABLES)
}

/// Compares the textual representation of the memo with the expected one.
pub fn expect_memo(memo: &Memo, expected: &str) {
    let actual = format_memo(memo);
    assert_eq!(actual.trim(), expected.trim(), "memo does not match");
}

/// Provides a test setup for the [optimizer](crate::optimizer::Optimizer).
/// Every tester uses its own copy of the [test catalog](self::test_catalog).
pub struct OptimizerTester {
    catalog: Arc<MutableCatalog>,
    config: OptimizerConfig,
}

impl OptimizerTester {
    pub fn new() -> Self {
        OptimizerTester::with_config(OptimizerConfig::default())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        init_logger();

        OptimizerTester {
            catalog: test_catalog(),
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<MutableCatalog> {
        &self.catalog
    }

    /// Optimizes the given joins and returns the result together with the memo.
    pub fn optimize(&self, joins: &[Join]) -> (OptimizedPlan, Memo) {
        let optimizer = Optimizer::with_catalog(self.catalog.clone(), self.config.clone());
        let mut memo = Memo::new();
        let plan = optimizer.optimize_with_memo(joins, &mut memo).expect("Failed to optimize joins");
        (plan, memo)
    }

    /// Optimizes the given joins and compares the best plan with the expected one.
    pub fn expect_plan(&self, joins: &[Join], expected: &str) -> OptimizedPlan {
        let (plan, _) = self.optimize(joins);
        let actual = format_plan(&plan.best);
        assert_eq!(actual.trim(), expected.trim(), "plan does not match");
        plan
    }
}
