use std::path::Path;
use std::sync::Arc;

use keenjoin::catalog::mutable::MutableCatalog;
use keenjoin::catalog::{Catalog, CatalogRef, IndexMeta};
use keenjoin::config::OptimizerConfig;
use keenjoin::datatypes::DataType;
use keenjoin::error::OptimizerError;
use keenjoin::operators::join::Join;
use keenjoin::optimizer::Optimizer;
use keenjoin::plan::format_plan;
use keenjoin::statistics::{ColumnStatistics, TableStatisticsBuilder};

fn main() -> Result<(), OptimizerError> {
    pretty_env_logger::init();

    // 1. Create a catalog
    let catalog = create_catalog()?;

    // 2. Create the optimizer.
    let config = OptimizerConfig::default().with_top_plans(3);
    let optimizer = Optimizer::with_catalog(catalog.clone(), config);

    // 3. Describe a query
    let joins = vec![
        Join::inner("customer", "c_custkey", "orders", "o_custkey"),
        Join::inner("orders", "o_orderkey", "lineitem", "l_orderkey"),
    ];

    // 4. Select the cheapest plan.
    let plan = optimizer.optimize(&joins)?;

    println!("-----");
    println!("cost: {:.2} rows: {:.0}", plan.best.cost, plan.best.cardinality);
    print!("{}", format_plan(&plan.best));
    println!("-----");

    for (i, alternative) in plan.alternatives.iter().enumerate() {
        println!("#{} cost: {:.2}", i + 1, alternative.cost);
        print!("{}", format_plan(alternative));
    }

    // 5. Statistics of join results are available to subsequent queries.
    if let Some(statistics) = catalog.get_statistics("customer&lineitem&orders") {
        println!("-----");
        println!("customer&lineitem&orders: rows: {:.0}", statistics.row_count());
    }

    Ok(())
}

fn create_catalog() -> Result<CatalogRef, OptimizerError> {
    let catalog = MutableCatalog::new();

    let customer = TableStatisticsBuilder::new(15_000)
        .avg_row_size(180.0)
        .add_column(
            "c_custkey",
            ColumnStatistics::new(DataType::Int32, 15_000.0).with_range(1.0, 15_000.0).with_sorted(true),
        )
        .build()?;
    catalog.add_table("customer", customer)?;

    let orders = TableStatisticsBuilder::new(150_000)
        .avg_row_size(110.0)
        .add_column(
            "o_orderkey",
            ColumnStatistics::new(DataType::Int32, 150_000.0).with_range(1.0, 150_000.0).with_sorted(true),
        )
        .add_column("o_custkey", ColumnStatistics::new(DataType::Int32, 10_000.0).with_range(1.0, 15_000.0))
        .build()?;
    catalog.add_table("orders", orders)?;

    let lineitem = TableStatisticsBuilder::new(600_000)
        .avg_row_size(130.0)
        .add_column(
            "l_orderkey",
            ColumnStatistics::new(DataType::Int32, 150_000.0).with_range(1.0, 150_000.0).with_sorted(true),
        )
        .build()?;
    catalog.add_table("lineitem", lineitem)?;
    catalog.add_index("lineitem", "l_orderkey", IndexMeta::new(1200, 3), Path::new("lineitem_l_orderkey.idx"))?;

    Ok(Arc::new(catalog))
}
