use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use keenjoin::catalog::mutable::MutableCatalog;
use keenjoin::catalog::IndexMeta;
use keenjoin::config::OptimizerConfig;
use keenjoin::datatypes::DataType;
use keenjoin::operators::join::Join;
use keenjoin::optimizer::Optimizer;
use keenjoin::statistics::{ColumnStatistics, TableStatisticsBuilder};

fn create_catalog(num_tables: usize) -> Arc<MutableCatalog> {
    let catalog = MutableCatalog::new();

    for i in 0..num_tables {
        let name = format!("t{}", i);
        let rows = 1000 * (i as u64 + 1);
        let key = ColumnStatistics::new(DataType::Int32, rows as f64).with_range(0.0, (rows - 1) as f64).with_sorted(true);
        let fk = ColumnStatistics::new(DataType::Int32, 500.0).with_range(0.0, 499.0);
        let statistics = TableStatisticsBuilder::new(rows)
            .avg_row_size(100.0 + i as f64 * 10.0)
            .add_column("id", key)
            .add_column("fk", fk)
            .build()
            .unwrap();

        catalog.add_table(&name, statistics).unwrap();
        if i % 2 == 1 {
            let path = format!("{}_id.idx", name);
            catalog.add_index(&name, "id", IndexMeta::from_pages(rows / 100 + 1), Path::new(&path)).unwrap();
        }
    }

    Arc::new(catalog)
}

fn join_chain(num_tables: usize) -> Vec<Join> {
    (1..num_tables)
        .map(|i| Join::inner(&format!("t{}", i - 1), "fk", &format!("t{}", i), "id"))
        .collect()
}

fn optimizer_bench(c: &mut Criterion) {
    fn add_benchmark(c: &mut Criterion, num_tables: usize, config: OptimizerConfig) {
        let catalog = create_catalog(num_tables);
        let joins = join_chain(num_tables);
        let optimizer = Optimizer::with_catalog(catalog, config.clone());

        c.bench_function(
            format!("optimize_join_chain_{}_tables memory={}", num_tables, config.available_memory()).as_str(),
            |b| {
                b.iter(|| {
                    let plan = optimizer.optimize(&joins).unwrap();
                    black_box(plan);
                });
            },
        );
    }

    add_benchmark(c, 3, OptimizerConfig::default());
    add_benchmark(c, 5, OptimizerConfig::default());
    add_benchmark(c, 5, OptimizerConfig::with_memory(1024 * 1024));
}

criterion_group!(benches, optimizer_bench);
criterion_main!(benches);
