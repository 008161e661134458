//! Sparse Distributed Representation (SDR).
//!
//! An SDR is a fixed-size group of bits of which only a small fraction are
//! active. It is stored as the sorted list of active indices and converted to
//! a dense 0/1 vector on demand, which is the form encoders hand to the
//! spatial pooler.

use crate::error::{HtmError, Result};
use crate::types::{ElemDense, ElemSparse, Real, UInt};
use crate::utils::Random;

use std::fmt;

/// Dense SDR data (one byte per bit, 0 or 1).
pub type SdrDense = Vec<ElemDense>;

/// Sparse SDR data (sorted indices of active bits).
pub type SdrSparse = Vec<ElemSparse>;

/// Sparse Distributed Representation.
///
/// # Example
///
/// ```rust
/// use neocortex::types::Sdr;
///
/// let mut sdr = Sdr::new(&[10, 10]);
/// sdr.set_sparse(&[1, 4, 8, 15, 42]).unwrap();
///
/// assert_eq!(sdr.get_sum(), 5);
/// assert_eq!(sdr.get_dense()[4], 1);
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Sdr {
    dimensions: Vec<UInt>,
    size: usize,
    sparse: SdrSparse,
}

impl Sdr {
    /// Creates an all-zero SDR with the given shape.
    #[must_use]
    pub fn new(dimensions: &[UInt]) -> Self {
        let size = if dimensions.is_empty() {
            0
        } else {
            dimensions.iter().map(|&d| d as usize).product()
        };
        Self {
            dimensions: dimensions.to_vec(),
            size,
            sparse: Vec::new(),
        }
    }

    /// Creates an SDR from sorted, unique active indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the indices are unsorted, repeated or out of range.
    pub fn from_sparse(dimensions: &[UInt], indices: &[ElemSparse]) -> Result<Self> {
        let mut sdr = Self::new(dimensions);
        sdr.set_sparse(indices)?;
        Ok(sdr)
    }

    /// Creates an SDR from a dense 0/1 vector.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len()` differs from the SDR size.
    pub fn from_dense(dimensions: &[UInt], data: &[ElemDense]) -> Result<Self> {
        let mut sdr = Self::new(dimensions);
        sdr.set_dense(data)?;
        Ok(sdr)
    }

    /// Shape of the SDR.
    #[must_use]
    pub fn dimensions(&self) -> &[UInt] {
        &self.dimensions
    }

    /// Total number of bits.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Deactivates every bit.
    pub fn zero(&mut self) {
        self.sparse.clear();
    }

    // ========================================================================
    // Dense format
    // ========================================================================

    /// Sets the value from a dense array where non-zero means active.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length doesn't match the SDR size.
    pub fn set_dense(&mut self, data: &[ElemDense]) -> Result<()> {
        if data.len() != self.size {
            return Err(HtmError::DimensionMismatch {
                expected: vec![self.size as u32],
                actual: vec![data.len() as u32],
            });
        }

        self.sparse = data
            .iter()
            .enumerate()
            .filter(|(_, &bit)| bit != 0)
            .map(|(i, _)| i as ElemSparse)
            .collect();
        Ok(())
    }

    /// Dense 0/1 representation.
    #[must_use]
    pub fn get_dense(&self) -> SdrDense {
        let mut dense = vec![0; self.size];
        for &idx in &self.sparse {
            dense[idx as usize] = 1;
        }
        dense
    }

    /// Dense boolean representation.
    #[must_use]
    pub fn get_dense_bool(&self) -> Vec<bool> {
        let mut dense = vec![false; self.size];
        for &idx in &self.sparse {
            dense[idx as usize] = true;
        }
        dense
    }

    // ========================================================================
    // Sparse format
    // ========================================================================

    /// Sets the value from sorted, unique active indices.
    ///
    /// # Errors
    ///
    /// Returns an error if indices are not sorted, contain duplicates, or are
    /// out of bounds.
    pub fn set_sparse(&mut self, indices: &[ElemSparse]) -> Result<()> {
        self.validate_sparse(indices)?;
        self.sparse = indices.to_vec();
        Ok(())
    }

    /// Sets sparse indices the caller already knows to be sorted, unique and
    /// in range.
    pub(crate) fn set_sparse_unchecked(&mut self, indices: SdrSparse) {
        debug_assert!(self.validate_sparse(&indices).is_ok());
        self.sparse = indices;
    }

    fn validate_sparse(&self, indices: &[ElemSparse]) -> Result<()> {
        if let Some(&last) = indices.last() {
            if last as usize >= self.size {
                return Err(HtmError::IndexOutOfBounds {
                    index: last as usize,
                    size: self.size,
                });
            }
        }
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HtmError::InvalidSdrData(
                "Sparse indices must be sorted and unique".to_string(),
            ));
        }
        Ok(())
    }

    /// Sorted indices of the active bits.
    #[must_use]
    pub fn get_sparse(&self) -> &[ElemSparse] {
        &self.sparse
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Number of active bits.
    #[must_use]
    pub fn get_sum(&self) -> usize {
        self.sparse.len()
    }

    /// Fraction of active bits.
    #[must_use]
    pub fn get_sparsity(&self) -> Real {
        if self.size == 0 {
            return 0.0;
        }
        self.get_sum() as Real / self.size as Real
    }

    /// Number of bits active in both SDRs.
    #[must_use]
    pub fn get_overlap(&self, other: &Sdr) -> usize {
        sorted_overlap(&self.sparse, &other.sparse)
    }

    /// Overlap divided by the larger active count; 0 when either side is empty.
    #[must_use]
    pub fn similarity(&self, other: &Sdr) -> Real {
        sorted_similarity(&self.sparse, &other.sparse)
    }

    /// Activates `round(sparsity * size)` uniformly chosen bits.
    pub fn randomize(&mut self, sparsity: Real, rng: &mut Random) {
        let num_active = ((self.size as Real) * sparsity).round() as usize;
        let all: SdrSparse = (0..self.size as ElemSparse).collect();
        self.sparse = rng.sample_sorted(all, num_active.min(self.size));
    }

    /// Moves `round(fraction * active)` active bits to random inactive
    /// positions, keeping the active count.
    pub fn add_noise(&mut self, fraction_noise: Real, rng: &mut Random) {
        let num_to_move = ((self.sparse.len() as Real) * fraction_noise).round() as usize;
        if num_to_move == 0 {
            return;
        }

        let dense = self.get_dense_bool();
        let inactive: SdrSparse = (0..self.size as ElemSparse)
            .filter(|&i| !dense[i as usize])
            .collect();
        let num_to_move = num_to_move.min(inactive.len());

        let turn_off = rng.sample_sorted(self.sparse.clone(), num_to_move);
        let turn_on = rng.sample(inactive, num_to_move);

        let mut next: SdrSparse = self
            .sparse
            .iter()
            .copied()
            .filter(|idx| turn_off.binary_search(idx).is_err())
            .chain(turn_on)
            .collect();
        next.sort_unstable();
        self.sparse = next;
    }
}

/// Counts common elements of two sorted index lists.
#[must_use]
pub fn sorted_overlap(a: &[ElemSparse], b: &[ElemSparse]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// `|a ∩ b| / max(|a|, |b|)` for sorted index lists, 0 when either is empty.
#[must_use]
pub fn sorted_similarity(a: &[ElemSparse], b: &[ElemSparse]) -> Real {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    sorted_overlap(a, b) as Real / a.len().max(b.len()) as Real
}

impl fmt::Debug for Sdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SDR({:?}) {:?}", self.dimensions, self.sparse)
    }
}

impl fmt::Display for Sdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dimensions.iter().map(ToString::to_string).collect();
        let bits: Vec<String> = self.sparse.iter().map(ToString::to_string).collect();
        write!(f, "SDR( {} ) {}", dims.join(", "), bits.join(", "))
    }
}
