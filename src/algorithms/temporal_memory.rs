//! Temporal Memory implementation.
//!
//! The Temporal Memory learns sequences of active columns. Cells whose distal
//! segments were active in the previous step are predictive; when their
//! column turns on, only they fire. Columns nobody predicted burst, and one
//! winner cell per bursting column learns the transition.
//!
//! All state lives in [`Connections`]; the temporal memory owns only its
//! parameters and random generator. It always runs on the calling thread.

use crate::algorithms::{ComputeCycle, Connections};
use crate::error::{HtmError, Result};
use crate::types::{CellIdx, ColumnIdx, Permanence, Sdr, Segment, SynapseIdx, UInt};
use crate::utils::Random;

use std::ops::Range;

/// The Temporal Memory algorithm.
///
/// # Example
///
/// ```rust
/// use neocortex::algorithms::{Connections, HtmConfig, TemporalMemory};
/// use neocortex::types::Sdr;
///
/// let mut conn = Connections::new(HtmConfig {
///     input_dimensions: vec![64],
///     column_dimensions: vec![64],
///     cells_per_column: 8,
///     ..Default::default()
/// })
/// .unwrap();
/// let mut tm = TemporalMemory::new(&conn).unwrap();
///
/// let columns = Sdr::from_sparse(&[64], &[1, 7, 12]).unwrap();
/// let cycle = tm.compute(&mut conn, &columns, true).unwrap();
/// assert_eq!(cycle.active_cells.len(), 3 * 8);
/// ```
#[derive(Debug, Clone)]
pub struct TemporalMemory {
    column_dimensions: Vec<UInt>,
    num_columns: usize,
    cells_per_column: UInt,

    activation_threshold: SynapseIdx,
    min_threshold: SynapseIdx,
    max_new_synapse_count: usize,
    permanence_increment: Permanence,
    permanence_decrement: Permanence,
    predicted_segment_decrement: Permanence,

    rng: Random,
    iteration: u64,
}

impl TemporalMemory {
    /// Creates a temporal memory over the cells of `connections`.
    ///
    /// # Errors
    ///
    /// Returns the configuration error reported by
    /// [`HtmConfig::validate`](crate::algorithms::HtmConfig::validate).
    pub fn new(connections: &Connections) -> Result<Self> {
        let config = connections.config();
        config.validate()?;

        log::debug!(
            "temporal memory: {} columns x {} cells, activation {} / matching {}",
            config.num_columns(),
            config.cells_per_column,
            config.activation_threshold,
            config.min_threshold
        );

        Ok(Self {
            column_dimensions: config.column_dimensions.clone(),
            num_columns: config.num_columns(),
            cells_per_column: config.cells_per_column,
            activation_threshold: config.activation_threshold,
            min_threshold: config.min_threshold,
            max_new_synapse_count: config.max_new_synapse_count as usize,
            permanence_increment: config.permanence_increment,
            permanence_decrement: config.permanence_decrement,
            predicted_segment_decrement: config.predicted_segment_decrement,
            rng: Random::new(config.seed),
            iteration: 0,
        })
    }

    /// Main compute method.
    ///
    /// Activates cells for `active_columns`, learns on the previous step's
    /// winners when `learn` is set, then computes the predictions for the
    /// next step.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::DimensionMismatch`] if `active_columns` does not
    /// span the column space, and [`HtmError::StaleActiveColumns`] if it
    /// contains a column the spatial pooler did not just activate. Nothing
    /// changes in either case.
    pub fn compute(
        &mut self,
        connections: &mut Connections,
        active_columns: &Sdr,
        learn: bool,
    ) -> Result<ComputeCycle> {
        self.check_active_columns(connections, active_columns)?;
        self.iteration += 1;

        let columns = active_columns.get_sparse();
        self.activate_cells(connections, columns, learn);
        self.activate_dendrites(connections);

        let state = connections.cell_state();
        log::trace!(
            "temporal memory: iteration {} columns {} active cells {} predictive {}",
            self.iteration,
            columns.len(),
            state.active_cells.len(),
            state.predictive_cells.len()
        );

        Ok(ComputeCycle {
            active_columns: columns.to_vec(),
            active_cells: state.active_cells.clone(),
            winner_cells: state.winner_cells.clone(),
            predictive_cells: state.predictive_cells.clone(),
        })
    }

    fn check_active_columns(&self, connections: &Connections, active_columns: &Sdr) -> Result<()> {
        if active_columns.size() != self.num_columns {
            return Err(HtmError::DimensionMismatch {
                expected: self.column_dimensions.clone(),
                actual: active_columns.dimensions().to_vec(),
            });
        }
        if let Some(last) = connections.last_active_columns() {
            if let Some(&column) = active_columns
                .get_sparse()
                .iter()
                .find(|c| last.binary_search(c).is_err())
            {
                return Err(HtmError::StaleActiveColumns { column });
            }
        }
        Ok(())
    }

    /// Clears all cell activity. Learned synapses are kept.
    pub fn reset(&mut self, connections: &mut Connections) {
        connections.cell_state.clear();
        log::trace!("temporal memory: reset at iteration {}", self.iteration);
    }

    // ========================================================================
    // Cell activation
    // ========================================================================

    fn activate_cells(&mut self, connections: &mut Connections, columns: &[ColumnIdx], learn: bool) {
        let state = &mut connections.cell_state;
        let prev_active = std::mem::take(&mut state.active_cells);
        let prev_winners = std::mem::take(&mut state.winner_cells);
        let num_active_potential = std::mem::take(&mut state.num_active_potential);

        // Owners are resolved up front: learning may free and recycle slots.
        let distal = &connections.distal;
        let active: Vec<(CellIdx, Segment)> = std::mem::take(&mut state.active_segments)
            .into_iter()
            .map(|s| (distal.cell_for_segment(s), s))
            .collect();
        let matching: Vec<(CellIdx, Segment)> = std::mem::take(&mut state.matching_segments)
            .into_iter()
            .map(|s| (distal.cell_for_segment(s), s))
            .collect();

        let learning = Learning {
            prev_active: &prev_active,
            prev_winners: &prev_winners,
            num_active_potential: &num_active_potential,
            learn,
        };

        let mut active_cells = Vec::new();
        let mut winner_cells = Vec::new();

        for &column in columns {
            let cells = self.cells_for_column(column);
            let column_active = owned_by(&active, &cells);

            if column_active.is_empty() {
                let column_matching = owned_by(&matching, &cells);
                active_cells.extend(cells.clone());
                let winner = self.burst_column(connections, cells, column_matching, &learning);
                winner_cells.push(winner);
            } else {
                for &(cell, segment) in column_active {
                    if active_cells.last() != Some(&cell) {
                        active_cells.push(cell);
                        winner_cells.push(cell);
                    }
                    if learn {
                        self.reinforce(connections, segment, &learning);
                    }
                }
            }
        }

        if learn && self.predicted_segment_decrement > 0.0 {
            for &(cell, segment) in &matching {
                let column = cell / self.cells_per_column;
                if columns.binary_search(&column).is_err() {
                    connections.adapt_segment(
                        segment,
                        &prev_active,
                        -self.predicted_segment_decrement,
                        0.0,
                    );
                }
            }
        }

        connections.cell_state.active_cells = active_cells;
        connections.cell_state.winner_cells = winner_cells;
    }

    /// Activates every cell of an unpredicted column and returns its winner:
    /// the cell of the best matching segment, or else the least used cell.
    fn burst_column(
        &mut self,
        connections: &mut Connections,
        cells: Range<CellIdx>,
        matching: &[(CellIdx, Segment)],
        learning: &Learning<'_>,
    ) -> CellIdx {
        let best = matching.iter().max_by(|a, b| {
            learning
                .potential(a.1)
                .cmp(&learning.potential(b.1))
                .then(b.1.cmp(&a.1))
        });

        if let Some(&(cell, segment)) = best {
            if learning.learn {
                self.reinforce(connections, segment, learning);
            }
            return cell;
        }

        let cell = self.least_used_cell(connections, cells);
        if learning.learn {
            let num_new = self.max_new_synapse_count.min(learning.prev_winners.len());
            if num_new > 0 {
                let segment = connections.create_segment(cell);
                connections.grow_synapses(segment, learning.prev_winners, num_new, &mut self.rng);
            }
        }
        cell
    }

    /// Adapts `segment` toward the previous active cells and tops it up with
    /// synapses to previous winners.
    fn reinforce(&mut self, connections: &mut Connections, segment: Segment, learning: &Learning<'_>) {
        let survived = connections.adapt_segment(
            segment,
            learning.prev_active,
            self.permanence_increment,
            self.permanence_decrement,
        );
        if !survived {
            return;
        }

        let num_new = self
            .max_new_synapse_count
            .saturating_sub(learning.potential(segment) as usize);
        if num_new > 0 {
            connections.grow_synapses(segment, learning.prev_winners, num_new, &mut self.rng);
        }
    }

    /// Cell with the fewest segments; ties are broken at random.
    fn least_used_cell(&mut self, connections: &Connections, cells: Range<CellIdx>) -> CellIdx {
        let distal = connections.distal();
        let fewest = cells
            .clone()
            .map(|c| distal.num_segments_on_cell(c))
            .min()
            .unwrap_or(0);
        let candidates: Vec<CellIdx> = cells
            .filter(|&c| distal.num_segments_on_cell(c) == fewest)
            .collect();
        candidates[self.rng.index_below(candidates.len())]
    }

    // ========================================================================
    // Dendrite activation
    // ========================================================================

    /// Computes segment activity from the current active cells and derives
    /// the predictive cells for the next step.
    fn activate_dendrites(&self, connections: &mut Connections) {
        let distal = &connections.distal;
        let state = &mut connections.cell_state;
        let activity = distal.compute_activity(&state.active_cells);

        let mut active: Vec<(CellIdx, Segment)> = Vec::new();
        let mut matching: Vec<(CellIdx, Segment)> = Vec::new();
        for (slot, (&connected, &potential)) in
            activity.connected.iter().zip(&activity.potential).enumerate()
        {
            let segment = slot as Segment;
            let data = distal.data_for_segment(segment);
            if !data.is_alive() {
                continue;
            }
            if connected >= self.activation_threshold {
                active.push((data.cell, segment));
            }
            if potential >= self.min_threshold {
                matching.push((data.cell, segment));
            }
        }
        active.sort_unstable();
        matching.sort_unstable();

        state.predictive_cells = active.iter().map(|&(cell, _)| cell).collect();
        state.predictive_cells.dedup();
        state.active_segments = active.into_iter().map(|(_, s)| s).collect();
        state.matching_segments = matching.into_iter().map(|(_, s)| s).collect();
        state.num_active_potential = activity.potential;
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Cells owned by `column`.
    pub fn cells_for_column(&self, column: ColumnIdx) -> Range<CellIdx> {
        let first = column * self.cells_per_column;
        first..first + self.cells_per_column
    }

    /// Column owning `cell`.
    pub fn column_for_cell(&self, cell: CellIdx) -> ColumnIdx {
        cell / self.cells_per_column
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Returns the number of cells per column.
    pub fn cells_per_column(&self) -> UInt {
        self.cells_per_column
    }

    /// Returns the number of computes since creation.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Returns the activation threshold.
    pub fn activation_threshold(&self) -> SynapseIdx {
        self.activation_threshold
    }

    /// Returns the matching threshold.
    pub fn min_threshold(&self) -> SynapseIdx {
        self.min_threshold
    }
}

/// Previous-step context shared by every learning decision of one compute.
struct Learning<'a> {
    prev_active: &'a [CellIdx],
    prev_winners: &'a [CellIdx],
    num_active_potential: &'a [SynapseIdx],
    learn: bool,
}

impl Learning<'_> {
    fn potential(&self, segment: Segment) -> SynapseIdx {
        self.num_active_potential
            .get(segment as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Entries of a `(cell, segment)` list sorted by cell that fall in `cells`.
fn owned_by<'a>(
    segments: &'a [(CellIdx, Segment)],
    cells: &Range<CellIdx>,
) -> &'a [(CellIdx, Segment)] {
    let lo = segments.partition_point(|&(cell, _)| cell < cells.start);
    let hi = segments.partition_point(|&(cell, _)| cell < cells.end);
    &segments[lo..hi]
}
