//! Integration tests for sort-tile-recursive partitioning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::geometry::{Mbr, Point};
use strata::partitioner::{Partitioner, StrPartitioner};
use strata_int_test::test_util::{clustered_points, point_of, uniform_points};

fn assign(partitioner: &StrPartitioner, points: &[Point]) -> Vec<Vec<Point>> {
    let mut cells = vec![Vec::new(); partitioner.num_partitions()];
    for point in points {
        let id = partitioner.partition_of(point).unwrap();
        cells[id].push(point.clone());
    }
    cells
}

fn assert_balanced(cells: &[Vec<Point>], expected: usize) {
    assert_eq!(cells.len(), expected);
    let sizes: Vec<usize> = cells.iter().map(Vec::len).collect();
    let min = *sizes.iter().min().unwrap();
    let max = *sizes.iter().max().unwrap();
    assert!(min > 0, "{:?}", sizes);
    assert!(max <= 2 * min, "{:?}", sizes);
}

#[test]
fn test_uniform_points_are_balanced() {
    let points: Vec<Point> = uniform_points(5_000, 1_000.0, 0, 3).iter().map(point_of).collect();
    for partitions in [1, 2, 4, 7, 16, 30] {
        let partitioner = StrPartitioner::build(points.clone(), partitions).unwrap();
        assert_balanced(&assign(&partitioner, &points), partitions);
    }
}

#[test]
fn test_clustered_points_are_balanced() {
    let points: Vec<Point> = clustered_points(4_000, 3, 11).iter().map(point_of).collect();
    for partitions in [4, 9, 12] {
        let partitioner = StrPartitioner::build(points.clone(), partitions).unwrap();
        assert_balanced(&assign(&partitioner, &points), partitions);
    }
}

#[test]
fn test_partition_boxes_cover_their_points() {
    let points: Vec<Point> = uniform_points(2_000, 10.0, 0, 5).iter().map(point_of).collect();
    let partitioner = StrPartitioner::build(points.clone(), 6).unwrap();
    let cells = assign(&partitioner, &points);

    let boxes: Vec<Mbr> = cells
        .iter()
        .map(|cell| Mbr::from_points(cell.iter()).unwrap().unwrap())
        .collect();
    let mut covered = 0;
    for (cell, mbr) in cells.iter().zip(&boxes) {
        for point in cell {
            assert!(mbr.contains_point(point).unwrap());
            covered += 1;
        }
    }
    assert_eq!(covered, points.len());
}

#[test]
fn test_sampled_boundaries_place_unseen_points() {
    let mut rng = StdRng::seed_from_u64(21);
    let all: Vec<Point> = (0..10_000)
        .map(|_| Point::new([rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)]))
        .collect();
    let sample: Vec<Point> = all.iter().step_by(10).cloned().collect();
    let partitioner = StrPartitioner::build(sample, 8).unwrap();

    let cells = assign(&partitioner, &all);
    assert_eq!(cells.iter().map(Vec::len).sum::<usize>(), all.len());
    assert!(cells.iter().all(|c| c.len() > all.len() / 16));

    // points far outside the sampled extent still land in a partition
    let outside = Point::new([-1e6, 1e6]);
    assert!(partitioner.partition_of(&outside).unwrap() < 8);
}

#[test]
fn test_build_is_deterministic() {
    let points: Vec<Point> = uniform_points(3_000, 50.0, 0, 8).iter().map(point_of).collect();
    let first = StrPartitioner::build(points.clone(), 5).unwrap();
    let second = StrPartitioner::build(points.clone(), 5).unwrap();
    for point in &points {
        assert_eq!(
            first.partition_of(point).unwrap(),
            second.partition_of(point).unwrap()
        );
    }
}
