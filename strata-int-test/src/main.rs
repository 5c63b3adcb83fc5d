use strata::errors::StrataResult;
use strata::index::IndexKind;
use strata_int_test::test_util::{create_test_context_with, point_schema, uniform_points, xy_keys};

fn main() -> StrataResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context_with(8, 7)?;
    let context = ctx.context();

    let count = 50_000;
    let left = context.relation(point_schema(), uniform_points(count, 10_000.0, 0, 1))?;
    let right = context.relation(point_schema(), uniform_points(count, 10_000.0, count as i64, 2))?;

    let start = std::time::Instant::now();
    let index = context.build_index(&right, IndexKind::RTree, &xy_keys(), "stress")?;
    println!(
        "Indexed {} rows into {} partitions in {:?}",
        index.count(),
        index.num_partitions(),
        start.elapsed()
    );

    let start = std::time::Instant::now();
    let joined = context.knn_join(&left, &right, &xy_keys(), &xy_keys(), 5)?;
    println!("Joined {} rows in {:?}", joined.count(), start.elapsed());
    Ok(())
}
