use crate::common::Neighbor;

/// Combines two partial neighbor lists of the same outer row into the best
/// `k` of both.
///
/// The result is sorted ascending by distance. Combining is associative and
/// commutative up to the order of equidistant neighbors, so partial lists can
/// be merged in any grouping.
pub fn merge_top_k<T>(mut left: Vec<Neighbor<T>>, right: Vec<Neighbor<T>>, k: usize) -> Vec<Neighbor<T>> {
    left.extend(right);
    left.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    left.truncate(k);
    left
}
