//! Integration tests for hash and ordered indexes.

use strata::common::{col, DataType, Field, Row, Schema, Value};
use strata::errors::ErrorKind;
use strata::geometry::Point;
use strata::index::IndexKind;
use strata::row;
use strata_int_test::test_util::{cleanup, create_test_context, id_of, run_test};

fn people_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int),
        Field::new("city", DataType::String),
        Field::new("age", DataType::Int),
    ])
}

fn people(n: i64) -> Vec<Row> {
    let cities = ["oslo", "lima", "pune", "kobe", "nice"];
    (0..n)
        .map(|i| row![i, cities[(i % 5) as usize], 18 + (i * 7) % 60])
        .collect()
}

#[test]
fn test_hash_lookup() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(people_schema(), people(500))?;
            let index = context.build_index(&relation, IndexKind::Hash, &[col("city")], "by_city")?;

            assert_eq!(index.count(), 500);
            let found = index.lookup(&Value::from("pune"))?;
            assert_eq!(found.len(), 100);
            assert!(found.iter().all(|r| id_of(r) % 5 == 2));
            assert!(index.lookup(&Value::from("rome"))?.is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_ordered_range_scan_matches_filter() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let rows = people(800);
            let relation = context.relation(people_schema(), rows.clone())?;
            let index = context.build_index(&relation, IndexKind::Ordered, &[col("age")], "by_age")?;

            let bounds = index.boundaries()?;
            assert!(bounds.windows(2).all(|w| w[0] < w[1]));

            for (low, high) in [(18.0, 18.0), (20.0, 35.5), (40.0, 77.0), (90.0, 99.0)] {
                let mut found: Vec<i64> = index.range_scan(low, high)?.iter().map(id_of).collect();
                found.sort_unstable();
                let expected: Vec<i64> = rows
                    .iter()
                    .filter(|r| {
                        let age = r.get(2).and_then(Value::as_f64).unwrap_or(f64::NAN);
                        age >= low && age <= high
                    })
                    .map(id_of)
                    .collect();
                assert_eq!(found, expected);
            }
            assert!(index.range_scan(50.0, 20.0)?.is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_capability_mismatch() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(people_schema(), people(20))?;
            let index = context.build_index(&relation, IndexKind::Hash, &[col("id")], "by_id")?;

            let err = index.knn(&Point::new([0.0, 0.0]), 1).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexTypeMismatch);
            let err = index.range_scan(0.0, 1.0).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexTypeMismatch);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_configuration_errors_fail_before_build() {
    run_test(
        || create_test_context(),
        |ctx| {
            let context = ctx.context();
            let relation = context.relation(people_schema(), people(20))?;

            let err = "btree".parse::<IndexKind>().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedIndexKind);
            assert_eq!("TreeMap".parse::<IndexKind>()?, IndexKind::Ordered);

            let err = context
                .build_index(&relation, IndexKind::RTree, &[col("city")], "bad")
                .unwrap_err();
            assert!(err.is_configuration_error());
            let err = context
                .build_index(&relation, IndexKind::Ordered, &[col("missing")], "bad")
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ColumnNotFound);
            assert!(context.cached_index("bad").is_err());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
