use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::time::Instant;
use strata::common::{col, DataType, Field, KeyExpr, Row, Schema, Value};
use strata::errors::StrataResult;
use strata::geometry::Point;
use strata::{row, StrataConfig, StrataContext};

/// Runs `test` between `before` and `after`. `after` runs even when the
/// test fails; a failure or panic is reported with its backtrace and then
/// fails the calling test.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> StrataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> StrataResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> StrataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let error = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", start_time.elapsed());
    eprintln!("Error: {}", error.0);
    if !error.1.is_empty() && !error.1.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", error.1);
    }
    eprintln!("=====================================================\n");
    panic!("Test failed. Last error: {}", error.0);
}

#[derive(Clone)]
pub struct TestContext {
    context: StrataContext,
    seed: u64,
}

impl TestContext {
    pub fn new(context: StrataContext, seed: u64) -> Self {
        Self { context, seed }
    }

    pub fn context(&self) -> StrataContext {
        self.context.clone()
    }

    /// Seed of the session, also used for generated test data.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

pub fn create_test_context() -> StrataResult<TestContext> {
    create_test_context_with(4, 42)
}

pub fn create_test_context_with(partitions: usize, seed: u64) -> StrataResult<TestContext> {
    let config = StrataConfig::builder()
        .shuffle_partitions(partitions)
        .max_entries_per_node(8)
        .worker_threads(4)
        .sample_threshold(5_000)
        .sample_rate(0.2)
        .random_seed(seed)
        .build()?;
    Ok(TestContext::new(StrataContext::new(config), seed))
}

pub fn cleanup(ctx: TestContext) -> StrataResult<()> {
    ctx.context().catalog().clear();
    Ok(())
}

/// `id: Int, x: Float, y: Float`
pub fn point_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int),
        Field::new("x", DataType::Float),
        Field::new("y", DataType::Float),
    ])
}

pub fn xy_keys() -> Vec<KeyExpr> {
    vec![col("x"), col("y")]
}

/// `n` rows uniformly spread over `[0, extent)²`, ids starting at `first_id`.
pub fn uniform_points(n: usize, extent: f64, first_id: i64, seed: u64) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            row![
                first_id + i as i64,
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent)
            ]
        })
        .collect()
}

/// `n` rows gathered around `clusters` random centers, for skewed inputs.
pub fn clustered_points(n: usize, clusters: usize, seed: u64) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<(f64, f64)> = (0..clusters.max(1))
        .map(|_| (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
        .collect();
    (0..n)
        .map(|i| {
            let (cx, cy) = centers[i % centers.len()];
            row![
                i as i64,
                cx + rng.gen_range(-5.0..5.0),
                cy + rng.gen_range(-5.0..5.0)
            ]
        })
        .collect()
}

pub fn id_of(row: &Row) -> i64 {
    row.get(0).and_then(Value::as_i64).unwrap_or(-1)
}

pub fn point_of(row: &Row) -> Point {
    Point::new([
        row.get(1).and_then(Value::as_f64).unwrap_or(f64::NAN),
        row.get(2).and_then(Value::as_f64).unwrap_or(f64::NAN),
    ])
}

/// The `k` smallest distances from `query` to `candidates`, ascending.
pub fn brute_force_distances(query: &Point, candidates: &[Row], k: usize) -> Vec<f64> {
    let mut distances: Vec<f64> = candidates
        .iter()
        .filter_map(|r| query.min_dist(&point_of(r)).ok())
        .collect();
    distances.sort_by(f64::total_cmp);
    distances.truncate(k);
    distances
}

pub fn assert_distances_eq(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
    }
}
