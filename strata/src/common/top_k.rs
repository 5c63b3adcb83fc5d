use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate paired with its distance to a query.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor<T> {
    pub item: T,
    pub distance: f64,
}

impl<T> Neighbor<T> {
    pub fn new(item: T, distance: f64) -> Neighbor<T> {
        Neighbor { item, distance }
    }
}

/// Heap slot ordered by distance only, so `T` needs no ordering of its own.
struct Slot<T>(Neighbor<T>);

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.distance.total_cmp(&other.0.distance)
    }
}

/// Bounded top-k structure: a max-heap of capacity `k` whose top is always
/// the worst of the best `k` candidates seen so far.
///
/// A candidate at exactly the current worst distance does not displace the
/// incumbent once the heap is full.
///
/// # Examples
///
/// ```rust
/// use strata::common::TopK;
///
/// let mut top = TopK::new(2);
/// top.push("a", 3.0);
/// top.push("b", 1.0);
/// top.push("c", 2.0);
/// let best: Vec<_> = top.into_sorted_vec().into_iter().map(|n| n.item).collect();
/// assert_eq!(best, vec!["b", "c"]);
/// ```
pub struct TopK<T> {
    k: usize,
    heap: BinaryHeap<Slot<T>>,
}

impl<T> TopK<T> {
    pub fn new(k: usize) -> TopK<T> {
        TopK {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Distance of the current worst retained candidate.
    pub fn worst(&self) -> Option<f64> {
        self.heap.peek().map(|slot| slot.0.distance)
    }

    /// Checks whether a candidate at `distance` could still be retained.
    pub fn admits(&self, distance: f64) -> bool {
        if self.k == 0 {
            return false;
        }
        match self.worst() {
            Some(worst) if self.is_full() => distance < worst,
            _ => true,
        }
    }

    /// Offers a candidate; returns `true` if it was retained.
    pub fn push(&mut self, item: T, distance: f64) -> bool {
        if !self.admits(distance) {
            return false;
        }
        if self.is_full() {
            self.heap.pop();
        }
        self.heap.push(Slot(Neighbor::new(item, distance)));
        true
    }

    /// Retained candidates in ascending distance order.
    pub fn into_sorted_vec(self) -> Vec<Neighbor<T>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|slot| slot.0)
            .collect()
    }
}
