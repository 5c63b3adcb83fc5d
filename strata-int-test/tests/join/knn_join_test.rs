//! Integration tests for the distributed KNN join.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use strata::common::{Neighbor, Row};
use strata::errors::ErrorKind;
use strata::join::{merge_top_k, KnnJoin, KnnMatches, LocalJoinStrategy};
use strata::row;
use strata_int_test::test_util::{
    assert_distances_eq, brute_force_distances, cleanup, clustered_points, create_test_context,
    create_test_context_with, id_of, point_of, point_schema, run_test, uniform_points, xy_keys,
    TestContext,
};

fn distances_by_outer(matches: Vec<KnnMatches>) -> HashMap<i64, Vec<f64>> {
    matches
        .into_iter()
        .map(|(row, neighbors)| (id_of(&row), neighbors.iter().map(|n| n.distance).collect()))
        .collect()
}

fn check_against_brute_force(
    ctx: &TestContext,
    left: Vec<Row>,
    right: Vec<Row>,
    k: usize,
    strategy: LocalJoinStrategy,
) -> strata::errors::StrataResult<()> {
    let context = ctx.context();
    let outer = context.relation(point_schema(), left.clone())?;
    let inner = context.relation(point_schema(), right.clone())?;
    let matches = KnnJoin::new(context.config())
        .strategy(strategy)
        .neighbors(&outer, &inner, &xy_keys(), &xy_keys(), k)?;

    let actual = distances_by_outer(matches.collect());
    assert_eq!(actual.len(), left.len());
    for row in &left {
        let expected = brute_force_distances(&point_of(row), &right, k);
        assert_distances_eq(&actual[&id_of(row)], &expected);
    }
    Ok(())
}

#[test]
fn test_join_matches_brute_force() {
    run_test(
        || create_test_context(),
        |ctx| {
            let left = uniform_points(300, 100.0, 0, ctx.seed());
            let right = uniform_points(700, 100.0, 10_000, ctx.seed() + 1);
            check_against_brute_force(&ctx, left, right, 5, LocalJoinStrategy::NestedLoop)
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rtree_probe_matches_brute_force() {
    run_test(
        || create_test_context(),
        |ctx| {
            let left = uniform_points(300, 100.0, 0, ctx.seed());
            let right = uniform_points(900, 100.0, 10_000, ctx.seed() + 1);
            check_against_brute_force(&ctx, left, right, 8, LocalJoinStrategy::RTreeProbe)
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_skewed_input_is_exact() {
    run_test(
        || create_test_context_with(5, 99),
        |ctx| {
            let left = uniform_points(200, 1_000.0, 0, ctx.seed());
            let right = clustered_points(1_000, 2, ctx.seed());
            check_against_brute_force(&ctx, left, right, 3, LocalJoinStrategy::NestedLoop)
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_small_exact_example() {
    run_test(
        || create_test_context_with(3, 17),
        |ctx| {
            let context = ctx.context();
            let left = context.relation(point_schema(), vec![row![1, 0.0, 0.0], row![2, 5.0, 5.0]])?;
            let right = context.relation(
                point_schema(),
                vec![
                    row![10, 1.0, 0.0],
                    row![11, 0.0, 1.0],
                    row![12, 5.0, 6.0],
                    row![13, 10.0, 10.0],
                ],
            )?;
            let joined = context.knn_join(&left, &right, &xy_keys(), &xy_keys(), 1)?;
            assert_eq!(joined.schema().len(), 6);

            let pairs: HashMap<i64, i64> = joined
                .collect()
                .iter()
                .map(|r| (id_of(r), r.get(3).and_then(|v| v.as_i64()).unwrap_or(-1)))
                .collect();
            assert_eq!(pairs.len(), 2);
            assert!(pairs[&1] == 10 || pairs[&1] == 11);
            assert_eq!(pairs[&2], 12);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_k_larger_than_inner_returns_every_inner_row() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let left = context.relation(point_schema(), uniform_points(40, 10.0, 0, ctx.seed()))?;
            let right = context.relation(point_schema(), uniform_points(3, 10.0, 100, ctx.seed()))?;
            let joined = context.knn_join(&left, &right, &xy_keys(), &xy_keys(), 10)?;
            assert_eq!(joined.count(), 40 * 3);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_zero_k_is_rejected_for_every_relation() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let empty = context.relation(point_schema(), Vec::new())?;
            let some = context.relation(point_schema(), uniform_points(10, 1.0, 0, ctx.seed()))?;
            for (left, right) in [(&empty, &empty), (&some, &empty), (&some, &some)] {
                let err = context
                    .knn_join(left, right, &xy_keys(), &xy_keys(), 0)
                    .unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidConfiguration);
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_self_join_finds_each_row() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(point_schema(), uniform_points(500, 50.0, 0, ctx.seed()))?;
            let joined = context.knn_join(&relation, &relation, &xy_keys(), &xy_keys(), 1)?;
            assert_eq!(joined.count(), 500);
            for row in joined.collect() {
                assert_eq!(row.get(0), row.get(3));
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_result_does_not_depend_on_seed() {
    let run = |seed: u64| {
        let ctx = create_test_context_with(4, seed).unwrap();
        let context = ctx.context();
        let left = context
            .relation(point_schema(), uniform_points(150, 20.0, 0, 1))
            .unwrap();
        let right = context
            .relation(point_schema(), uniform_points(300, 20.0, 1_000, 2))
            .unwrap();
        let matches = KnnJoin::new(context.config())
            .neighbors(&left, &right, &xy_keys(), &xy_keys(), 4)
            .unwrap();
        let mut result: Vec<(i64, Vec<f64>)> = distances_by_outer(matches.collect()).into_iter().collect();
        result.sort_by_key(|(id, _)| *id);
        result
    };
    assert_eq!(run(1), run(2));
    assert_eq!(run(3), run(3));
}

#[test]
fn test_merge_grouping_does_not_matter() {
    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..50 {
        let k = rng.gen_range(1..8);
        let lists: Vec<Vec<Neighbor<u32>>> = (0..rng.gen_range(1..6))
            .map(|_| {
                (0..rng.gen_range(0..6))
                    .map(|i| Neighbor::new(i, rng.gen_range(0..20) as f64))
                    .collect()
            })
            .collect();

        let mut all: Vec<f64> = lists.iter().flatten().map(|n| n.distance).collect();
        all.sort_by(f64::total_cmp);
        all.truncate(k);

        let mut shuffled = lists.clone();
        shuffled.shuffle(&mut rng);
        let folded = shuffled
            .into_iter()
            .fold(Vec::new(), |acc, list| merge_top_k(acc, list, k));
        let right_folded = lists
            .into_iter()
            .rev()
            .fold(Vec::new(), |acc, list| merge_top_k(list, acc, k));

        let distances = |v: &[Neighbor<u32>]| v.iter().map(|n| n.distance).collect::<Vec<_>>();
        assert_eq!(distances(&folded), all);
        assert_eq!(distances(&right_folded), all);
    }
}
