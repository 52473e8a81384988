//! Row splits: per-cloud partition boundaries inside a concatenated batch.

use std::ops::Range;

use crate::error::{CoreError, Result};

/// Prefix-sum boundaries of `b` clouds concatenated into one buffer.
///
/// Holds `b + 1` non-decreasing offsets with `splits[0] == 0` and
/// `splits[b] == n`. Cloud `i` occupies `splits[i]..splits[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowSplits(Vec<usize>);

impl RowSplits {
    /// Validate and wrap a raw offset sequence.
    pub fn new(splits: Vec<usize>) -> Result<Self> {
        if splits.len() < 2 {
            return Err(CoreError::InvalidRowSplits {
                reason: format!("need at least 2 offsets, got {}", splits.len()),
            });
        }
        if splits[0] != 0 {
            return Err(CoreError::InvalidRowSplits {
                reason: format!("first offset must be 0, got {}", splits[0]),
            });
        }
        if let Some(w) = splits.windows(2).find(|w| w[1] < w[0]) {
            return Err(CoreError::InvalidRowSplits {
                reason: format!("offsets decrease from {} to {}", w[0], w[1]),
            });
        }
        Ok(Self(splits))
    }

    /// Build splits from per-cloud point counts.
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut splits = Vec::with_capacity(counts.len() + 1);
        let mut total = 0;
        splits.push(0);
        for &count in counts {
            total += count;
            splits.push(total);
        }
        Self(splits)
    }

    /// Splits describing a single cloud of `n` points.
    pub fn single(n: usize) -> Self {
        Self(vec![0, n])
    }

    /// Number of clouds in the batch.
    #[inline]
    pub fn num_clouds(&self) -> usize {
        self.0.len() - 1
    }

    /// Total number of points across all clouds.
    #[inline]
    pub fn total(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Raw offsets.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Index range of cloud `i`.
    #[inline]
    pub fn range(&self, i: usize) -> Range<usize> {
        self.0[i]..self.0[i + 1]
    }

    /// Index ranges of every cloud, in batch order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.0.windows(2).map(|w| w[0]..w[1])
    }

    /// Point count of every cloud, in batch order.
    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.windows(2).map(|w| w[1] - w[0])
    }

    /// Index of the cloud that owns global point `index`.
    pub fn cloud_of(&self, index: usize) -> Option<usize> {
        if index >= self.total() {
            return None;
        }
        // partition_point gives the first offset strictly greater than index.
        Some(self.0.partition_point(|&s| s <= index) - 1)
    }

    /// Coarsened splits after subsampling every cloud by `stride`.
    ///
    /// Each non-empty cloud keeps `max(1, count / stride)` points so that no
    /// cloud disappears from deeper pyramid levels; empty clouds stay empty.
    pub fn downsample(&self, stride: usize) -> Self {
        let stride = stride.max(1);
        let counts: Vec<usize> = self
            .counts()
            .map(|count| match count {
                0 => 0,
                c => (c / stride).max(1),
            })
            .collect();
        Self::from_counts(&counts)
    }

    /// Check that a buffer of `len` rows matches these splits.
    pub fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.total() {
            return Err(CoreError::ShapeMismatch {
                what,
                expected: self.total(),
                got: len,
            });
        }
        Ok(())
    }

    /// Check that `other` describes the same number of clouds.
    pub fn check_same_batch(&self, other: &RowSplits) -> Result<()> {
        if self.num_clouds() != other.num_clouds() {
            return Err(CoreError::BatchMismatch {
                left: self.num_clouds(),
                right: other.num_clouds(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<usize>> for RowSplits {
    type Error = CoreError;

    fn try_from(splits: Vec<usize>) -> Result<Self> {
        Self::new(splits)
    }
}
