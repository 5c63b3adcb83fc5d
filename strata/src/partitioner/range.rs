use super::Partitioner;
use crate::errors::{ErrorKind, StrataError, StrataResult};

/// Splits a numeric key space at sorted boundaries.
///
/// Partition `i` holds keys in `(bounds[i - 1], bounds[i]]`; the first is
/// unbounded below and the last unbounded above.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangePartitioner {
    bounds: Vec<f64>,
}

impl RangePartitioner {
    /// Picks up to `num_partitions - 1` boundaries at the quantiles of
    /// `sample`. Duplicate quantiles collapse, so heavily repeated keys may
    /// produce fewer partitions.
    pub fn from_sample(mut sample: Vec<f64>, num_partitions: usize) -> RangePartitioner {
        sample.sort_by(f64::total_cmp);
        let len = sample.len();
        let num_partitions = num_partitions.max(1);
        let mut bounds: Vec<f64> = Vec::with_capacity(num_partitions);
        if len > 0 {
            for i in 1..num_partitions {
                let at = (i * len / num_partitions).saturating_sub(1);
                bounds.push(sample[at]);
            }
        }
        bounds.dedup();
        // the largest sampled key needs no bound of its own
        if bounds.last().is_some_and(|b| Some(b) == sample.last()) {
            bounds.pop();
        }
        RangePartitioner { bounds }
    }

    /// Uses explicit boundaries, which must be sorted and free of NaN.
    pub fn with_bounds(bounds: Vec<f64>) -> StrataResult<RangePartitioner> {
        if bounds.iter().any(|b| b.is_nan()) || bounds.windows(2).any(|w| w[0] >= w[1]) {
            log::error!("Range boundaries must be strictly increasing: {:?}", bounds);
            return Err(StrataError::new(
                &format!("Range boundaries must be strictly increasing: {:?}", bounds),
                ErrorKind::InvalidConfiguration,
            ));
        }
        Ok(RangePartitioner { bounds })
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Partition ids that may hold keys within `[low, high]`.
    pub fn partitions_for_range(&self, low: f64, high: f64) -> std::ops::RangeInclusive<usize> {
        self.locate(low)..=self.locate(high)
    }

    fn locate(&self, key: f64) -> usize {
        self.bounds.partition_point(|b| *b < key)
    }
}

impl Partitioner<f64> for RangePartitioner {
    fn num_partitions(&self) -> usize {
        self.bounds.len() + 1
    }

    fn partition_of(&self, key: &f64) -> StrataResult<usize> {
        if key.is_nan() {
            return Err(StrataError::new(
                "Cannot range-partition a NaN key",
                ErrorKind::TypeError,
            ));
        }
        Ok(self.locate(*key))
    }
}
