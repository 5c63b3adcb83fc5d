use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::common::Value;

type Positions = SmallVec<[usize; 2]>;

/// Scalar key to row positions within one partition.
///
/// Positions of duplicate keys come back in insertion order, but callers
/// must not rely on it.
#[derive(Clone, Debug, Default)]
pub struct HashIndex {
    map: IndexMap<Value, Positions>,
    len: usize,
}

impl HashIndex {
    /// Indexes `keys[i]` at position `i`. Null keys are skipped.
    pub fn build(keys: impl IntoIterator<Item = Value>) -> HashIndex {
        let mut map: IndexMap<Value, Positions> = IndexMap::new();
        let mut len = 0;
        for (position, key) in keys.into_iter().enumerate() {
            if key.is_null() {
                continue;
            }
            map.entry(key).or_default().push(position);
            len += 1;
        }
        HashIndex { map, len }
    }

    pub fn get(&self, key: &Value) -> &[usize] {
        self.map.get(key).map(|p| p.as_slice()).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.map.contains_key(key)
    }

    pub fn distinct_keys(&self) -> usize {
        self.map.len()
    }

    /// Number of indexed positions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
