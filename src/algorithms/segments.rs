//! Distal segment arena.
//!
//! Segments and synapses live in flat vectors addressed by [`Segment`] and
//! [`Synapse`] slots. Destroyed slots are recycled. Presynaptic lookup maps
//! let segment activity be computed from the set of active cells without
//! scanning every synapse.

use crate::types::{clamp_permanence, CellIdx, Permanence, Segment, Synapse, SynapseIdx};

use ahash::AHashMap;
use smallvec::SmallVec;

/// Data associated with a distal synapse.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseData {
    /// The presynaptic cell this synapse listens to.
    pub presynaptic_cell: CellIdx,

    /// Permanence in `[0, 1]`.
    pub permanence: Permanence,

    /// The segment this synapse belongs to.
    pub segment: Segment,

    alive: bool,
}

impl SynapseData {
    fn new(presynaptic_cell: CellIdx, permanence: Permanence, segment: Segment) -> Self {
        Self {
            presynaptic_cell,
            permanence,
            segment,
            alive: true,
        }
    }

    /// Whether the slot holds a live synapse.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Data associated with a distal segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentData {
    /// Synapses on this segment.
    pub synapses: SmallVec<[Synapse; 32]>,

    /// The cell this segment belongs to.
    pub cell: CellIdx,

    /// Number of connected synapses (permanence >= threshold).
    pub num_connected: SynapseIdx,

    alive: bool,
}

impl SegmentData {
    fn new(cell: CellIdx) -> Self {
        Self {
            synapses: SmallVec::new(),
            cell,
            num_connected: 0,
            alive: true,
        }
    }

    /// Whether the slot holds a live segment.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Per-segment activity for one set of active presynaptic cells, indexed by
/// segment slot.
#[derive(Debug, Clone, Default)]
pub struct SegmentActivity {
    /// Active connected synapses per segment.
    pub connected: Vec<SynapseIdx>,
    /// Active synapses of any permanence per segment.
    pub potential: Vec<SynapseIdx>,
}

/// Flat storage for every distal segment and synapse of a layer.
#[derive(Debug, Clone)]
pub struct SegmentArena {
    cells: Vec<SmallVec<[Segment; 8]>>,
    segments: Vec<SegmentData>,
    destroyed_segments: Vec<Segment>,
    synapses: Vec<SynapseData>,
    destroyed_synapses: Vec<Synapse>,
    connected_threshold: Permanence,

    /// Presynaptic cell -> all synapses listening to it.
    potential_synapses_for_presynaptic_cell: AHashMap<CellIdx, Vec<Synapse>>,

    /// Presynaptic cell -> connected synapses listening to it.
    connected_synapses_for_presynaptic_cell: AHashMap<CellIdx, Vec<Synapse>>,

    pruned_synapses: usize,
    pruned_segments: usize,
}

impl SegmentArena {
    /// Creates an empty arena for `num_cells` cells.
    #[must_use]
    pub fn new(num_cells: usize, connected_threshold: Permanence) -> Self {
        Self {
            cells: vec![SmallVec::new(); num_cells],
            segments: Vec::new(),
            destroyed_segments: Vec::new(),
            synapses: Vec::new(),
            destroyed_synapses: Vec::new(),
            connected_threshold,
            potential_synapses_for_presynaptic_cell: AHashMap::new(),
            connected_synapses_for_presynaptic_cell: AHashMap::new(),
            pruned_synapses: 0,
            pruned_segments: 0,
        }
    }

    /// Number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of live segments.
    pub fn num_segments(&self) -> usize {
        self.segments.len() - self.destroyed_segments.len()
    }

    /// Number of live synapses.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len() - self.destroyed_synapses.len()
    }

    /// Number of segments on `cell`.
    pub fn num_segments_on_cell(&self, cell: CellIdx) -> usize {
        self.cells[cell as usize].len()
    }

    /// Number of synapses on `segment`.
    pub fn num_synapses_on_segment(&self, segment: Segment) -> usize {
        self.segments[segment as usize].synapses.len()
    }

    /// Length of the segment slot list, the size of per-segment arrays.
    pub fn segment_flat_list_length(&self) -> usize {
        self.segments.len()
    }

    /// Total segments and synapses removed by pruning or eviction.
    pub fn pruned(&self) -> (usize, usize) {
        (self.pruned_segments, self.pruned_synapses)
    }

    // ========================================================================
    // Segment operations
    // ========================================================================

    /// Allocates an empty segment on `cell`, reusing a destroyed slot when
    /// one is free. Per-cell caps are enforced by
    /// [`Connections::create_segment`](crate::algorithms::Connections::create_segment).
    pub fn create_segment(&mut self, cell: CellIdx) -> Segment {
        let segment = if let Some(reuse) = self.destroyed_segments.pop() {
            self.segments[reuse as usize] = SegmentData::new(cell);
            reuse
        } else {
            let segment = self.segments.len() as Segment;
            self.segments.push(SegmentData::new(cell));
            segment
        };

        self.cells[cell as usize].push(segment);
        segment
    }

    /// Destroys a segment and all its synapses.
    pub fn destroy_segment(&mut self, segment: Segment) {
        if !self.segments[segment as usize].alive {
            return;
        }
        let cell = self.segments[segment as usize].cell;

        let synapses: SmallVec<[Synapse; 32]> = self.segments[segment as usize].synapses.clone();
        for synapse in synapses {
            self.destroy_synapse(synapse);
        }

        let cell_segments = &mut self.cells[cell as usize];
        if let Some(pos) = cell_segments.iter().position(|&s| s == segment) {
            cell_segments.remove(pos);
        }

        self.segments[segment as usize].alive = false;
        self.destroyed_segments.push(segment);
        self.pruned_segments += 1;
    }

    /// Destroys the segment on `cell` with the lowest permanence sum, the
    /// least recently effective one. Ties go to the lowest slot.
    pub fn destroy_weakest_segment(&mut self, cell: CellIdx) -> Option<Segment> {
        let weakest = self.cells[cell as usize]
            .iter()
            .copied()
            .map(|segment| (segment, self.permanence_sum(segment)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(segment, _)| segment)?;

        log::trace!("evicting segment {weakest} from cell {cell}");
        self.destroy_segment(weakest);
        Some(weakest)
    }

    /// Sum of the permanences on a segment.
    pub fn permanence_sum(&self, segment: Segment) -> Permanence {
        self.segments[segment as usize]
            .synapses
            .iter()
            .map(|&s| self.synapses[s as usize].permanence)
            .sum()
    }

    /// Segments on `cell`, in creation order.
    #[inline]
    pub fn segments_for_cell(&self, cell: CellIdx) -> &[Segment] {
        &self.cells[cell as usize]
    }

    /// Cell that owns `segment`.
    #[inline]
    pub fn cell_for_segment(&self, segment: Segment) -> CellIdx {
        self.segments[segment as usize].cell
    }

    /// Segment data for `segment`.
    #[inline]
    pub fn data_for_segment(&self, segment: Segment) -> &SegmentData {
        &self.segments[segment as usize]
    }

    // ========================================================================
    // Synapse operations
    // ========================================================================

    /// Creates a synapse from `presynaptic_cell` on `segment`.
    ///
    /// A segment holds at most one synapse per presynaptic cell; if one exists
    /// it is returned and keeps the higher of the two permanences.
    pub fn create_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: CellIdx,
        permanence: Permanence,
    ) -> Synapse {
        let existing = self.segments[segment as usize]
            .synapses
            .iter()
            .copied()
            .find(|&s| self.synapses[s as usize].presynaptic_cell == presynaptic_cell);

        if let Some(existing) = existing {
            if permanence > self.synapses[existing as usize].permanence {
                self.update_synapse_permanence(existing, permanence);
            }
            return existing;
        }

        let permanence = clamp_permanence(permanence);
        let data = SynapseData::new(presynaptic_cell, permanence, segment);

        let synapse = if let Some(reuse) = self.destroyed_synapses.pop() {
            self.synapses[reuse as usize] = data;
            reuse
        } else {
            let synapse = self.synapses.len() as Synapse;
            self.synapses.push(data);
            synapse
        };

        self.segments[segment as usize].synapses.push(synapse);

        self.potential_synapses_for_presynaptic_cell
            .entry(presynaptic_cell)
            .or_default()
            .push(synapse);
        if permanence >= self.connected_threshold {
            self.segments[segment as usize].num_connected += 1;
            self.connected_synapses_for_presynaptic_cell
                .entry(presynaptic_cell)
                .or_default()
                .push(synapse);
        }

        synapse
    }

    /// Destroys a synapse.
    pub fn destroy_synapse(&mut self, synapse: Synapse) {
        let data = &self.synapses[synapse as usize];
        if !data.alive {
            return;
        }
        let segment = data.segment;
        let presynaptic_cell = data.presynaptic_cell;
        let was_connected = data.permanence >= self.connected_threshold;

        let segment_data = &mut self.segments[segment as usize];
        if let Some(pos) = segment_data.synapses.iter().position(|&s| s == synapse) {
            segment_data.synapses.remove(pos);
        }
        if was_connected {
            segment_data.num_connected = segment_data.num_connected.saturating_sub(1);
            remove_from(
                &mut self.connected_synapses_for_presynaptic_cell,
                presynaptic_cell,
                synapse,
            );
        }
        remove_from(
            &mut self.potential_synapses_for_presynaptic_cell,
            presynaptic_cell,
            synapse,
        );

        self.synapses[synapse as usize].alive = false;
        self.destroyed_synapses.push(synapse);
        self.pruned_synapses += 1;
    }

    /// Sets a synapse's permanence, clamped to `[0, 1]`, keeping the connected
    /// bookkeeping current.
    pub fn update_synapse_permanence(&mut self, synapse: Synapse, permanence: Permanence) {
        let permanence = clamp_permanence(permanence);
        let data = &mut self.synapses[synapse as usize];
        let was_connected = data.permanence >= self.connected_threshold;
        let is_connected = permanence >= self.connected_threshold;
        data.permanence = permanence;

        if was_connected == is_connected {
            return;
        }

        let presynaptic_cell = data.presynaptic_cell;
        let segment = &mut self.segments[data.segment as usize];
        if is_connected {
            segment.num_connected += 1;
            self.connected_synapses_for_presynaptic_cell
                .entry(presynaptic_cell)
                .or_default()
                .push(synapse);
        } else {
            segment.num_connected = segment.num_connected.saturating_sub(1);
            remove_from(
                &mut self.connected_synapses_for_presynaptic_cell,
                presynaptic_cell,
                synapse,
            );
        }
    }

    /// Synapses on `segment`.
    #[inline]
    pub fn synapses_for_segment(&self, segment: Segment) -> &[Synapse] {
        &self.segments[segment as usize].synapses
    }

    /// Synapse data for `synapse`.
    #[inline]
    pub fn data_for_synapse(&self, synapse: Synapse) -> &SynapseData {
        &self.synapses[synapse as usize]
    }

    /// Presynaptic cells of every synapse on `segment`.
    pub fn presynaptic_cells_for_segment(&self, segment: Segment) -> Vec<CellIdx> {
        self.segments[segment as usize]
            .synapses
            .iter()
            .map(|&s| self.synapses[s as usize].presynaptic_cell)
            .collect()
    }

    /// Iterates over every live synapse.
    pub fn live_synapses(&self) -> impl Iterator<Item = &SynapseData> {
        self.synapses.iter().filter(|s| s.alive)
    }

    // ========================================================================
    // Activity and eviction
    // ========================================================================

    /// Counts, per segment, the synapses listening to `active_cells`.
    pub fn compute_activity(&self, active_cells: &[CellIdx]) -> SegmentActivity {
        let mut activity = SegmentActivity {
            connected: vec![0; self.segments.len()],
            potential: vec![0; self.segments.len()],
        };

        for cell in active_cells {
            if let Some(synapses) = self.connected_synapses_for_presynaptic_cell.get(cell) {
                for &synapse in synapses {
                    activity.connected[self.synapses[synapse as usize].segment as usize] += 1;
                }
            }
            if let Some(synapses) = self.potential_synapses_for_presynaptic_cell.get(cell) {
                for &synapse in synapses {
                    activity.potential[self.synapses[synapse as usize].segment as usize] += 1;
                }
            }
        }

        activity
    }

    /// Destroys the `n_destroy` lowest-permanence synapses of `segment`,
    /// skipping synapses from `exclude_cells`.
    pub fn destroy_min_permanence_synapses(
        &mut self,
        segment: Segment,
        n_destroy: usize,
        exclude_cells: &[CellIdx],
    ) {
        if n_destroy == 0 {
            return;
        }

        let mut victims: Vec<(Synapse, Permanence)> = self.segments[segment as usize]
            .synapses
            .iter()
            .map(|&s| (s, &self.synapses[s as usize]))
            .filter(|(_, data)| !exclude_cells.contains(&data.presynaptic_cell))
            .map(|(s, data)| (s, data.permanence))
            .collect();

        victims.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        for (synapse, _) in victims.into_iter().take(n_destroy) {
            log::trace!("evicting synapse {synapse} from segment {segment}");
            self.destroy_synapse(synapse);
        }
    }
}

fn remove_from(map: &mut AHashMap<CellIdx, Vec<Synapse>>, cell: CellIdx, synapse: Synapse) {
    if let Some(synapses) = map.get_mut(&cell) {
        if let Some(pos) = synapses.iter().position(|&s| s == synapse) {
            synapses.swap_remove(pos);
        }
        if synapses.is_empty() {
            map.remove(&cell);
        }
    }
}
