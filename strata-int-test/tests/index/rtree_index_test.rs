//! Integration tests for partitioned R-tree indexes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::geometry::{Mbr, Point};
use strata::index::{IndexKind, LocalIndex};
use strata_int_test::test_util::{
    assert_distances_eq, brute_force_distances, cleanup, create_test_context, id_of, point_of,
    point_schema, run_test, uniform_points, xy_keys,
};

#[test]
fn test_self_query_finds_each_row_at_distance_zero() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows = uniform_points(2_000, 100.0, 0, ctx.seed());
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "self_query")?;

            for row in rows.iter().step_by(17) {
                let found = index.knn(&point_of(row), 1)?;
                assert_eq!(found.len(), 1);
                assert_eq!(found[0].1, 0.0);
                assert_eq!(id_of(&found[0].0), id_of(row));
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_knn_matches_brute_force() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows = uniform_points(3_000, 1_000.0, 0, ctx.seed());
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "knn")?;

            let mut rng = StdRng::seed_from_u64(7);
            for k in [1, 7, 40] {
                for _ in 0..20 {
                    let query = Point::new([rng.gen_range(-50.0..1050.0), rng.gen_range(-50.0..1050.0)]);
                    let found = index.knn(&query, k)?;
                    let distances: Vec<f64> = found.iter().map(|(_, d)| *d).collect();
                    assert_distances_eq(&distances, &brute_force_distances(&query, &rows, k));
                }
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_partition_records_cover_every_row() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(point_schema(), uniform_points(1_000, 10.0, 0, ctx.seed()))?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "cover")?;

            assert_eq!(index.num_partitions(), 4);
            let records = index.partition_records()?;
            assert_eq!(records.len(), 4);
            assert_eq!(records.iter().map(|r| r.count).sum::<usize>(), 1_000);

            for record in records {
                let partition = index.partition(record.id).expect("partition of record");
                assert_eq!(partition.len(), record.count);
                for row in partition.rows() {
                    assert!(record.mbr.contains_point(&point_of(row))?);
                }
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_local_trees_are_valid() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(point_schema(), uniform_points(2_500, 50.0, 0, ctx.seed()))?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "valid")?;

            for partition in index.partitions() {
                let tree = partition
                    .index()
                    .and_then(LocalIndex::as_rtree)
                    .expect("r-tree partition");
                tree.check_integrity()?;
                assert_eq!(tree.len(), partition.len());
                assert!(tree.max_entries() == 8);
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_sampled_build_stays_exact() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            // above the sample threshold, so boundaries come from a sample
            let rows = uniform_points(12_000, 500.0, 0, ctx.seed());
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "sampled")?;

            assert_eq!(index.count(), 12_000);
            assert_eq!(index.num_partitions(), 4);
            assert!(index.partition_counts().iter().all(|c| *c > 12_000 / 8));

            let query = Point::new([250.0, 250.0]);
            let distances: Vec<f64> = index.knn(&query, 25)?.iter().map(|(_, d)| *d).collect();
            assert_distances_eq(&distances, &brute_force_distances(&query, &rows, 25));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_range_and_circle_queries() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows = uniform_points(2_000, 100.0, 0, ctx.seed());
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "ranges")?;

            let window = Mbr::new(Point::new([20.0, 30.0]), Point::new([45.0, 60.0]))?;
            let mut found: Vec<i64> = index.range_query(&window)?.iter().map(id_of).collect();
            found.sort_unstable();
            let mut expected: Vec<i64> = rows
                .iter()
                .filter(|r| window.contains_point(&point_of(r)).unwrap_or(false))
                .map(id_of)
                .collect();
            expected.sort_unstable();
            assert_eq!(found, expected);
            assert!(index.candidate_partitions(&window)?.len() <= 4);

            let center = Point::new([50.0, 50.0]);
            let within = index.circle_range(&center, 10.0)?;
            let expected = rows
                .iter()
                .filter(|r| center.min_dist(&point_of(r)).map(|d| d <= 10.0).unwrap_or(false))
                .count();
            assert_eq!(within.len(), expected);
            assert!(within.windows(2).all(|w| w[0].1 <= w[1].1));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rebuild_is_idempotent() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(point_schema(), uniform_points(1_500, 30.0, 0, ctx.seed()))?;
            let first = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "rebuild")?;
            let second = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "rebuild")?;

            assert_eq!(first.partition_records()?, second.partition_records()?);
            let query = Point::new([12.0, 17.0]);
            assert_eq!(first.knn(&query, 9)?, second.knn(&query, 9)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_lookup_by_coordinates() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows = uniform_points(500, 10.0, 0, ctx.seed());
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "lookup")?;

            let target = &rows[123];
            let found = index.lookup(&(&point_of(target)).into())?;
            assert_eq!(found, vec![target.clone()]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_points_on_one_meridian_fill_every_partition() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows: Vec<_> = (0..400).map(|i| strata::row![i, 12.5, i as f64 * 0.25]).collect();
            let relation = context.relation(point_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::RTree, &xy_keys(), "meridian")?;

            assert_eq!(index.partition_counts(), vec![100, 100, 100, 100]);
            let query = Point::new([12.5, 50.0]);
            let distances: Vec<f64> = index.knn(&query, 6)?.iter().map(|(_, d)| *d).collect();
            assert_distances_eq(&distances, &brute_force_distances(&query, &rows, 6));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
