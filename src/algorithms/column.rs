//! Proximal side of a column: its potential pool over the input space and
//! the permanence of every potential synapse.

use crate::algorithms::HtmConfig;
use crate::types::{clamp_permanence, CellIdx, ColumnIdx, Permanence, Real, UInt};
use crate::utils::Topology;

use std::ops::Range;

/// Proximal learning constants, resolved once from [`HtmConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermanenceRule {
    /// Increment for synapses to active inputs.
    pub active_inc: Permanence,
    /// Decrement for synapses to inactive inputs.
    pub inactive_dec: Permanence,
    /// Values below this are zeroed.
    pub trim_threshold: Permanence,
    /// Connected threshold.
    pub connected: Permanence,
    /// Step used when raising weak columns.
    pub below_stimulus_inc: Permanence,
    /// Minimum connected synapses a column is kept at.
    pub stimulus_threshold: Real,
}

impl PermanenceRule {
    /// Reads the rule out of a configuration.
    #[must_use]
    pub fn from_config(config: &HtmConfig) -> Self {
        Self {
            active_inc: config.syn_perm_active_inc,
            inactive_dec: config.syn_perm_inactive_dec,
            trim_threshold: config.syn_perm_trim_threshold(),
            connected: config.syn_perm_connected,
            below_stimulus_inc: config.syn_perm_below_stimulus_inc(),
            stimulus_threshold: config.stimulus_threshold,
        }
    }
}

/// One competitive unit over the input space.
///
/// The potential pool is fixed at construction; `permanences[i]` belongs to
/// input bit `potential_pool[i]`. A synapse is connected when its permanence
/// reaches the rule's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    index: ColumnIdx,
    potential_pool: Vec<UInt>,
    permanences: Vec<Permanence>,
    num_connected: usize,
}

impl Column {
    /// Builds a column from a sorted potential pool and matching initial
    /// permanences, trimming and raising them according to `rule`.
    #[must_use]
    pub fn new(
        index: ColumnIdx,
        potential_pool: Vec<UInt>,
        permanences: Vec<Permanence>,
        rule: &PermanenceRule,
    ) -> Self {
        debug_assert_eq!(potential_pool.len(), permanences.len());
        let mut column = Self {
            index,
            potential_pool,
            permanences,
            num_connected: 0,
        };
        column.settle(rule, true);
        column
    }

    /// Index of the column.
    #[inline]
    pub fn index(&self) -> ColumnIdx {
        self.index
    }

    /// Sorted input indices this column may connect to.
    #[inline]
    pub fn potential_pool(&self) -> &[UInt] {
        &self.potential_pool
    }

    /// Permanences, parallel to [`Column::potential_pool`].
    #[inline]
    pub fn permanences(&self) -> &[Permanence] {
        &self.permanences
    }

    /// Number of connected proximal synapses.
    #[inline]
    pub fn num_connected(&self) -> usize {
        self.num_connected
    }

    /// Cells owned by this column.
    #[must_use]
    pub fn cells(&self, cells_per_column: UInt) -> Range<CellIdx> {
        let first = self.index * cells_per_column;
        first..first + cells_per_column
    }

    /// Permanence of the synapse to `input`, if it is in the pool.
    #[must_use]
    pub fn permanence_for_input(&self, input: UInt) -> Option<Permanence> {
        self.potential_pool
            .binary_search(&input)
            .ok()
            .map(|i| self.permanences[i])
    }

    /// Input bits reached by connected synapses.
    #[must_use]
    pub fn connected_inputs(&self, connected: Permanence) -> Vec<UInt> {
        self.potential_pool
            .iter()
            .zip(&self.permanences)
            .filter(|(_, &p)| p >= connected)
            .map(|(&input, _)| input)
            .collect()
    }

    /// Number of connected synapses whose input bit is active in the dense
    /// `input`.
    #[must_use]
    pub fn overlap(&self, input: &[bool], connected: Permanence) -> u32 {
        self.potential_pool
            .iter()
            .zip(&self.permanences)
            .filter(|(&bit, &p)| p >= connected && input[bit as usize])
            .count() as u32
    }

    /// Hebbian update: synapses to active inputs gain, the rest lose.
    pub fn adapt(&mut self, input: &[bool], rule: &PermanenceRule) {
        for (&bit, perm) in self.potential_pool.iter().zip(self.permanences.iter_mut()) {
            if input[bit as usize] {
                *perm += rule.active_inc;
            } else {
                *perm -= rule.inactive_dec;
            }
        }
        self.settle(rule, true);
    }

    /// Raises every permanence by `delta`.
    pub fn bump(&mut self, delta: Permanence, rule: &PermanenceRule) {
        for perm in &mut self.permanences {
            *perm += delta;
        }
        self.settle(rule, false);
    }

    /// Trims, clamps, optionally raises the column up to the stimulus
    /// threshold, then recounts connected synapses.
    fn settle(&mut self, rule: &PermanenceRule, raise: bool) {
        for perm in &mut self.permanences {
            if *perm < rule.trim_threshold {
                *perm = 0.0;
            }
            *perm = clamp_permanence(*perm);
        }
        if raise {
            self.raise_permanences_to_threshold(rule);
        }
        self.num_connected = self.count_connected(rule.connected);
    }

    /// Raises the whole pool in `below_stimulus_inc` steps until at least
    /// `stimulus_threshold` synapses (or the whole pool) are connected.
    fn raise_permanences_to_threshold(&mut self, rule: &PermanenceRule) {
        if rule.below_stimulus_inc <= 0.0 {
            return;
        }
        let target = (rule.stimulus_threshold.ceil().max(0.0) as usize).min(self.permanences.len());
        while self.count_connected(rule.connected) < target {
            for perm in &mut self.permanences {
                *perm = clamp_permanence(*perm + rule.below_stimulus_inc);
            }
        }
    }

    fn count_connected(&self, connected: Permanence) -> usize {
        self.permanences.iter().filter(|&&p| p >= connected).count()
    }

    /// Sum of all proximal permanences.
    #[must_use]
    pub fn permanence_sum(&self) -> Permanence {
        self.permanences.iter().sum()
    }

    /// Mean extent, over the input dimensions, of the bounding box of the
    /// connected inputs. 0 when nothing is connected.
    #[must_use]
    pub fn avg_connected_span(&self, input_dimensions: &[UInt], connected: Permanence) -> Real {
        let connected_inputs = self.connected_inputs(connected);
        if connected_inputs.is_empty() || input_dimensions.is_empty() {
            return 0.0;
        }

        let mut min = vec![UInt::MAX; input_dimensions.len()];
        let mut max = vec![0; input_dimensions.len()];
        for &input in &connected_inputs {
            let coords = Topology::index_to_coordinates(input as usize, input_dimensions);
            for (dim, &c) in coords.iter().enumerate() {
                min[dim] = min[dim].min(c);
                max[dim] = max[dim].max(c);
            }
        }

        let total: UInt = min.iter().zip(&max).map(|(&lo, &hi)| hi - lo + 1).sum();
        total as Real / input_dimensions.len() as Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> PermanenceRule {
        PermanenceRule {
            active_inc: 0.05,
            inactive_dec: 0.01,
            trim_threshold: 0.025,
            connected: 0.1,
            below_stimulus_inc: 0.01,
            stimulus_threshold: 0.0,
        }
    }

    fn dense(size: usize, active: &[usize]) -> Vec<bool> {
        let mut bits = vec![false; size];
        for &a in active {
            bits[a] = true;
        }
        bits
    }

    #[test]
    fn test_new_trims_and_counts() {
        let column = Column::new(3, vec![0, 2, 4, 6], vec![0.02, 0.1, 0.3, 0.05], &rule());
        assert_eq!(column.permanences(), &[0.0, 0.1, 0.3, 0.05]);
        assert_eq!(column.num_connected(), 2);
        assert_eq!(column.connected_inputs(0.1), vec![2, 4]);
        assert_eq!(column.cells(4), 12..16);
    }

    #[test]
    fn test_overlap_counts_connected_active_inputs() {
        let column = Column::new(0, vec![1, 3, 5, 7], vec![0.2, 0.05, 0.15, 0.3], &rule());
        let input = dense(10, &[1, 3, 5]);
        assert_eq!(column.overlap(&input, 0.1), 2);
    }

    #[test]
    fn test_adapt() {
        let mut column = Column::new(0, vec![1, 2], vec![0.5, 0.5], &rule());
        column.adapt(&dense(4, &[1]), &rule());
        assert!((column.permanence_for_input(1).unwrap() - 0.55).abs() < 1e-6);
        assert!((column.permanence_for_input(2).unwrap() - 0.49).abs() < 1e-6);
        assert_eq!(column.permanence_for_input(3), None);
    }

    #[test]
    fn test_adapt_clamps() {
        let mut column = Column::new(0, vec![0, 1], vec![0.99, 0.03], &rule());
        column.adapt(&dense(2, &[0]), &rule());
        assert_eq!(column.permanences(), &[1.0, 0.0]);
    }

    #[test]
    fn test_raise_to_stimulus_threshold() {
        let strict = PermanenceRule {
            stimulus_threshold: 3.0,
            ..rule()
        };
        let column = Column::new(0, vec![0, 1, 2, 3], vec![0.0, 0.05, 0.06, 0.2], &strict);
        assert!(column.num_connected() >= 3);
    }

    #[test]
    fn test_raise_stops_at_pool_size() {
        let strict = PermanenceRule {
            stimulus_threshold: 10.0,
            ..rule()
        };
        let column = Column::new(0, vec![0, 1], vec![0.0, 0.0], &strict);
        assert_eq!(column.num_connected(), 2);
    }

    #[test]
    fn test_bump() {
        let mut column = Column::new(0, vec![0, 1], vec![0.05, 0.095], &rule());
        column.bump(0.01, &rule());
        assert_eq!(column.num_connected(), 1);
        assert!((column.permanence_sum() - 0.165).abs() < 1e-6);
    }

    #[test]
    fn test_avg_connected_span() {
        let column = Column::new(0, vec![0, 12, 15], vec![0.2, 0.2, 0.0], &rule());
        // Inputs 0 and 12 on a 4x4 grid: rows 0..3, columns 0..0.
        assert!((column.avg_connected_span(&[4, 4], 0.1) - 2.5).abs() < 1e-6);
        assert_eq!(Column::new(0, vec![1], vec![0.0], &rule()).avg_connected_span(&[4, 4], 0.1), 0.0);
    }
}
