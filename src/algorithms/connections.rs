//! Connections - the synaptic graph shared by every learning stage.
//!
//! `Connections` owns all long-lived state of a layer:
//!
//! - the proximal [`Column`]s with their potential pools and permanences,
//! - per-column duty cycles and boost factors,
//! - the distal [`SegmentArena`],
//! - the transient [`CellState`] of the current cycle.
//!
//! It decides nothing on its own. The spatial pooler writes the proximal side
//! and the homeostasis arrays; the temporal memory writes the distal side
//! through the segment and synapse operations below, and the cell state. The
//! two never run at the same time.

use crate::algorithms::{Column, HtmConfig, SegmentArena};
use crate::error::Result;
use crate::types::{
    CellIdx, ColumnIdx, Permanence, Real, Segment, Synapse, SynapseIdx, UInt, EPSILON,
};
use crate::utils::Random;

use smallvec::SmallVec;

use std::ops::Range;

/// Transient per-cycle cell state written by the temporal memory.
///
/// All lists are sorted ascending. Segment lists are sorted by owning cell,
/// then by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellState {
    /// Cells active this cycle.
    pub active_cells: Vec<CellIdx>,
    /// Cells chosen to learn this cycle.
    pub winner_cells: Vec<CellIdx>,
    /// Cells depolarized for the next cycle.
    pub predictive_cells: Vec<CellIdx>,
    /// Segments with enough active connected synapses.
    pub active_segments: Vec<Segment>,
    /// Segments with enough active potential synapses.
    pub matching_segments: Vec<Segment>,
    /// Active potential synapses per segment slot.
    pub num_active_potential: Vec<SynapseIdx>,
}

impl CellState {
    /// Clears every list; permanences are untouched.
    pub fn clear(&mut self) {
        self.active_cells.clear();
        self.winner_cells.clear();
        self.predictive_cells.clear();
        self.active_segments.clear();
        self.matching_segments.clear();
        self.num_active_potential.clear();
    }
}

/// The synaptic graph of one layer.
#[derive(Debug, Clone)]
pub struct Connections {
    config: HtmConfig,

    pub(crate) columns: Vec<Column>,

    pub(crate) overlap_duty_cycles: Vec<Real>,
    pub(crate) active_duty_cycles: Vec<Real>,
    pub(crate) min_overlap_duty_cycles: Vec<Real>,
    pub(crate) boost_factors: Vec<Real>,
    pub(crate) inhibition_radius: UInt,
    boosting_frozen: bool,

    pub(crate) distal: SegmentArena,
    pub(crate) cell_state: CellState,

    /// Output of the most recent spatial pooler cycle.
    pub(crate) last_active_columns: Option<Vec<ColumnIdx>>,
}

impl Connections {
    /// Validates `config` and allocates the graph.
    ///
    /// Columns are empty until a [`SpatialPooler`](crate::algorithms::SpatialPooler)
    /// is built on this instance.
    ///
    /// # Errors
    ///
    /// Returns the configuration error reported by [`HtmConfig::validate`].
    pub fn new(config: HtmConfig) -> Result<Self> {
        config.validate()?;

        let num_columns = config.num_columns();
        let distal = SegmentArena::new(config.num_cells(), config.connected_permanence);

        log::debug!(
            "connections: {} columns x {} cells, {} inputs",
            num_columns,
            config.cells_per_column,
            config.num_inputs()
        );

        Ok(Self {
            columns: Vec::new(),
            overlap_duty_cycles: vec![0.0; num_columns],
            active_duty_cycles: vec![0.0; num_columns],
            min_overlap_duty_cycles: vec![0.0; num_columns],
            boost_factors: vec![1.0; num_columns],
            inhibition_radius: 0,
            boosting_frozen: false,
            distal,
            cell_state: CellState::default(),
            last_active_columns: None,
            config,
        })
    }

    /// Run configuration.
    #[inline]
    pub fn config(&self) -> &HtmConfig {
        &self.config
    }

    /// Number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.overlap_duty_cycles.len()
    }

    /// Number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.distal.num_cells()
    }

    /// Cells in every column.
    #[inline]
    pub fn cells_per_column(&self) -> UInt {
        self.config.cells_per_column
    }

    /// Column owning `cell`.
    #[inline]
    pub fn column_for_cell(&self, cell: CellIdx) -> ColumnIdx {
        cell / self.config.cells_per_column
    }

    /// Cells owned by `column`.
    #[inline]
    pub fn cells_for_column(&self, column: ColumnIdx) -> Range<CellIdx> {
        let first = column * self.config.cells_per_column;
        first..first + self.config.cells_per_column
    }

    // ========================================================================
    // Proximal side
    // ========================================================================

    /// Proximal columns; empty before a spatial pooler is built.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Moving average of how often each column had non-zero overlap.
    #[inline]
    pub fn overlap_duty_cycles(&self) -> &[Real] {
        &self.overlap_duty_cycles
    }

    /// Moving average of how often each column was active.
    #[inline]
    pub fn active_duty_cycles(&self) -> &[Real] {
        &self.active_duty_cycles
    }

    /// Overlap duty cycle below which a column is bumped.
    #[inline]
    pub fn min_overlap_duty_cycles(&self) -> &[Real] {
        &self.min_overlap_duty_cycles
    }

    /// Boost factor of each column (>= 1).
    #[inline]
    pub fn boost_factors(&self) -> &[Real] {
        &self.boost_factors
    }

    /// Current inhibition radius in columns.
    #[inline]
    pub fn inhibition_radius(&self) -> UInt {
        self.inhibition_radius
    }

    /// Whether boosting and weak-column bumping have been switched off.
    #[inline]
    pub fn is_boosting_frozen(&self) -> bool {
        self.boosting_frozen
    }

    /// Ends the newborn stage: boost factors return to 1 and stay there, and
    /// weak columns are no longer bumped.
    pub fn freeze_boosting(&mut self) {
        self.boosting_frozen = true;
        self.boost_factors.fill(1.0);
        self.min_overlap_duty_cycles.fill(0.0);
    }

    /// Active columns of the last spatial pooler cycle, if one has run.
    pub fn last_active_columns(&self) -> Option<&[ColumnIdx]> {
        self.last_active_columns.as_deref()
    }

    // ========================================================================
    // Distal side
    // ========================================================================

    /// Distal segments and synapses.
    #[inline]
    pub fn distal(&self) -> &SegmentArena {
        &self.distal
    }

    /// Cell state of the current cycle.
    #[inline]
    pub fn cell_state(&self) -> &CellState {
        &self.cell_state
    }

    /// Moves a distal synapse's permanence by `delta`, clamped to `[0, 1]`,
    /// and returns the new value.
    pub fn adjust_permanence(&mut self, synapse: Synapse, delta: Permanence) -> Permanence {
        let current = self.distal.data_for_synapse(synapse).permanence;
        self.distal.update_synapse_permanence(synapse, current + delta);
        self.distal.data_for_synapse(synapse).permanence
    }

    /// Grows a distal synapse from `presynaptic_cell` onto `segment`.
    pub fn grow_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: CellIdx,
        permanence: Permanence,
    ) -> Synapse {
        self.distal.create_synapse(segment, presynaptic_cell, permanence)
    }

    /// Removes a distal synapse.
    pub fn destroy_synapse(&mut self, synapse: Synapse) {
        self.distal.destroy_synapse(synapse);
    }

    /// Removes a distal segment with all its synapses.
    pub fn destroy_segment(&mut self, segment: Segment) {
        self.distal.destroy_segment(segment);
    }

    /// Evicts the weakest distal segment of `cell`.
    pub fn destroy_weakest_segment(&mut self, cell: CellIdx) -> Option<Segment> {
        self.distal.destroy_weakest_segment(cell)
    }

    /// Creates a distal segment on `cell`, evicting the weakest ones while
    /// the cell holds `max_segments_per_cell`.
    pub fn create_segment(&mut self, cell: CellIdx) -> Segment {
        let max = self.config.max_segments_per_cell as usize;
        while self.distal.num_segments_on_cell(cell) >= max {
            if self.destroy_weakest_segment(cell).is_none() {
                break;
            }
        }
        self.distal.create_segment(cell)
    }

    /// Hebbian update of one segment against the sorted `active_cells`:
    /// synapses from active cells gain `increment`, the rest lose `decrement`.
    ///
    /// Synapses that fall below [`EPSILON`] are destroyed, and so is the
    /// segment once it has no synapses left. Returns whether the segment
    /// survived.
    pub fn adapt_segment(
        &mut self,
        segment: Segment,
        active_cells: &[CellIdx],
        increment: Permanence,
        decrement: Permanence,
    ) -> bool {
        let synapses: SmallVec<[Synapse; 32]> = self
            .distal
            .synapses_for_segment(segment)
            .iter()
            .copied()
            .collect();

        for synapse in synapses {
            let presynaptic_cell = self.distal.data_for_synapse(synapse).presynaptic_cell;
            let delta = if active_cells.binary_search(&presynaptic_cell).is_ok() {
                increment
            } else {
                -decrement
            };
            if self.adjust_permanence(synapse, delta) < EPSILON {
                self.destroy_synapse(synapse);
            }
        }

        if self.distal.num_synapses_on_segment(segment) == 0 {
            self.destroy_segment(segment);
            return false;
        }
        true
    }

    /// Grows up to `num_new` synapses on `segment` to randomly chosen
    /// `candidates` it does not listen to yet, at the configured initial
    /// permanence.
    ///
    /// When the segment would exceed `max_synapses_per_segment`, its weakest
    /// synapses (other than those to candidates) are destroyed first; if
    /// there is still no room the growth is truncated.
    pub fn grow_synapses(
        &mut self,
        segment: Segment,
        candidates: &[CellIdx],
        num_new: usize,
        rng: &mut Random,
    ) {
        let existing = self.distal.presynaptic_cells_for_segment(segment);
        let fresh: Vec<CellIdx> = candidates
            .iter()
            .copied()
            .filter(|c| !existing.contains(c))
            .collect();

        let mut num_new = num_new.min(fresh.len());
        if num_new == 0 {
            return;
        }

        let max = self.config.max_synapses_per_segment as usize;
        let current = self.distal.num_synapses_on_segment(segment);
        if current + num_new > max {
            self.distal
                .destroy_min_permanence_synapses(segment, current + num_new - max, candidates);
            let room = max.saturating_sub(self.distal.num_synapses_on_segment(segment));
            num_new = num_new.min(room);
        }

        let permanence = self.config.initial_permanence;
        for presynaptic_cell in rng.sample_sorted(fresh, num_new) {
            self.grow_synapse(segment, presynaptic_cell, permanence);
        }
    }
}
