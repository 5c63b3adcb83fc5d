use std::ops::Bound;

/// Sorted `(key, position)` pairs supporting binary-search range scans.
///
/// Equal keys keep their position order.
#[derive(Clone, Debug, Default)]
pub struct OrderedIndex {
    entries: Vec<(f64, usize)>,
}

impl OrderedIndex {
    /// Indexes `keys[i]` at position `i`.
    pub fn build(keys: impl IntoIterator<Item = f64>) -> OrderedIndex {
        let mut entries: Vec<(f64, usize)> = keys
            .into_iter()
            .enumerate()
            .map(|(position, key)| (key, position))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        OrderedIndex { entries }
    }

    /// Positions of rows whose key equals `key`.
    pub fn get(&self, key: f64) -> Vec<usize> {
        self.range(Bound::Included(key), Bound::Included(key))
    }

    /// Positions of rows whose key falls within the bounds, in key order.
    pub fn range(&self, low: Bound<f64>, high: Bound<f64>) -> Vec<usize> {
        let start = match low {
            Bound::Included(v) => self.entries.partition_point(|(k, _)| *k < v),
            Bound::Excluded(v) => self.entries.partition_point(|(k, _)| *k <= v),
            Bound::Unbounded => 0,
        };
        let end = match high {
            Bound::Included(v) => self.entries.partition_point(|(k, _)| *k <= v),
            Bound::Excluded(v) => self.entries.partition_point(|(k, _)| *k < v),
            Bound::Unbounded => self.entries.len(),
        };
        if start >= end {
            return Vec::new();
        }
        self.entries[start..end].iter().map(|(_, p)| *p).collect()
    }

    pub fn min_key(&self) -> Option<f64> {
        self.entries.first().map(|(k, _)| *k)
    }

    pub fn max_key(&self) -> Option<f64> {
        self.entries.last().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
