//! Spatial Pooler implementation.
//!
//! The Spatial Pooler turns an input SDR into a sparse set of active columns.
//! Columns compete through inhibition; winners adapt their proximal synapses
//! toward the input. Duty cycles, boosting and weak-column bumping keep every
//! column in use while the pooler is young.
//!
//! All long-lived state lives in [`Connections`]. The pooler itself holds the
//! random generator, iteration counters, per-cycle scratch buffers and, in
//! multithreaded mode, a dedicated worker pool.

use crate::algorithms::{
    Column, Connections, ExecutionMode, HomeostaticPlasticityController, HtmConfig,
    PermanenceRule,
};
use crate::error::{HtmError, Result};
use crate::types::{ColumnIdx, Permanence, Real, Sdr, UInt, MAX_PERMANENCE, MIN_PERMANENCE};
use crate::utils::{Neighborhood, Random, Topology, WrappingMode};

use ahash::AHashMap;
use rayon::prelude::*;
use rayon::ThreadPool;

use std::sync::Arc;

/// The Spatial Pooler algorithm.
///
/// # Example
///
/// ```rust
/// use neocortex::algorithms::{Connections, HtmConfig, SpatialPooler};
/// use neocortex::types::Sdr;
///
/// let mut conn = Connections::new(HtmConfig {
///     input_dimensions: vec![100],
///     column_dimensions: vec![200],
///     potential_radius: 50,
///     local_area_density: 0.1,
///     ..Default::default()
/// })
/// .unwrap();
/// let mut sp = SpatialPooler::new(&mut conn).unwrap();
///
/// let mut input = Sdr::new(&[100]);
/// let mut output = Sdr::new(&[200]);
///
/// input.set_sparse(&[1, 5, 10, 20, 30]).unwrap();
/// sp.compute(&mut conn, &input, true, &mut output).unwrap();
/// assert_eq!(output.get_sum(), 20);
/// ```
#[derive(Debug)]
pub struct SpatialPooler {
    rule: PermanenceRule,
    rng: Random,

    /// Worker pool; `None` in single-threaded mode.
    pool: Option<Arc<ThreadPool>>,

    /// Cached neighbourhoods for local inhibition.
    neighbors: Neighborhood,

    overlaps: Vec<UInt>,
    boosted_overlaps: Vec<Real>,

    iteration_num: u64,
    iteration_learn_num: u64,

    homeostatic: Option<HomeostaticPlasticityController>,
}

impl SpatialPooler {
    /// Builds the proximal columns on `connections` and returns a pooler
    /// ready to compute.
    ///
    /// Every column gets a potential pool sampled around its mapped input
    /// centre and random initial permanences, all drawn from a generator
    /// seeded with the configured seed.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::ThreadPool`] if the worker pool of a
    /// multithreaded run cannot be created.
    pub fn new(connections: &mut Connections) -> Result<Self> {
        let config = connections.config().clone();
        let rule = PermanenceRule::from_config(&config);

        let pool = match config.execution {
            ExecutionMode::SingleThreaded => None,
            ExecutionMode::MultiThreaded { num_threads } => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("spatial-pooler-{i}"))
                    .build()
                    .map_err(|e| HtmError::ThreadPool(e.to_string()))?,
            )),
        };

        let mut sp = Self {
            rule,
            rng: Random::new(config.seed),
            pool,
            neighbors: Neighborhood::default(),
            overlaps: vec![0; config.num_columns()],
            boosted_overlaps: vec![0.0; config.num_columns()],
            iteration_num: 0,
            iteration_learn_num: 0,
            homeostatic: None,
        };

        connections.columns = sp.initialize_columns(&config);
        connections.inhibition_radius = 0;
        sp.update_inhibition_radius(connections);

        log::debug!(
            "spatial pooler: {} columns over {} inputs, inhibition radius {}, {:?}",
            config.num_columns(),
            config.num_inputs(),
            connections.inhibition_radius(),
            config.execution
        );

        Ok(sp)
    }

    /// Attaches a controller that watches output stability and ends the
    /// newborn stage.
    pub fn attach_homeostatic(&mut self, controller: HomeostaticPlasticityController) {
        self.homeostatic = Some(controller);
    }

    /// The attached homeostatic controller, if any.
    pub fn homeostatic(&self) -> Option<&HomeostaticPlasticityController> {
        self.homeostatic.as_ref()
    }

    fn initialize_columns(&mut self, config: &HtmConfig) -> Vec<Column> {
        let wrap = WrappingMode::from(config.wrap_around);

        (0..config.num_columns())
            .map(|index| {
                let region = Topology::map_potential_pool(
                    index,
                    &config.column_dimensions,
                    &config.input_dimensions,
                    config.potential_radius,
                    wrap,
                );
                let num_potential =
                    ((region.len() as Real * config.potential_pct).round() as usize).max(1);
                let pool: Vec<UInt> = self
                    .rng
                    .sample_sorted(region, num_potential)
                    .into_iter()
                    .map(|i| i as UInt)
                    .collect();
                let permanences = self.init_permanences(pool.len(), config);

                Column::new(index as ColumnIdx, pool, permanences, &self.rule)
            })
            .collect()
    }

    fn init_permanences(&mut self, count: usize, config: &HtmConfig) -> Vec<Permanence> {
        (0..count)
            .map(|_| {
                if self.rng.chance(config.init_connected_pct) {
                    self.init_perm_connected()
                } else {
                    self.init_perm_non_connected()
                }
            })
            .collect()
    }

    fn init_perm_connected(&mut self) -> Permanence {
        let p = self.rule.connected + self.rng.permanence() * self.rule.active_inc / 4.0;
        p.min(MAX_PERMANENCE)
    }

    fn init_perm_non_connected(&mut self) -> Permanence {
        let p = self.rule.connected * self.rng.permanence();
        p.max(MIN_PERMANENCE)
    }

    /// The main compute method.
    ///
    /// Writes the active columns for `input` into `output`. With `learn` set,
    /// also adapts the winners' synapses and the homeostasis state. The
    /// result is identical in single- and multithreaded mode.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::DimensionMismatch`] if `input` or `output` do not
    /// match the configured sizes, or if `connections` has no columns. No
    /// state changes in that case.
    pub fn compute(
        &mut self,
        connections: &mut Connections,
        input: &Sdr,
        learn: bool,
        output: &mut Sdr,
    ) -> Result<()> {
        self.check_dimensions(connections, input, output)?;
        self.update_bookkeeping_vars(learn);

        let dense = input.get_dense_bool();
        self.calculate_overlaps(connections, &dense);
        self.boost_overlaps(connections, learn);
        let active = self.inhibit_columns(connections);

        if learn {
            self.adapt_synapses(connections, &dense, &active);
            self.update_duty_cycles(connections, &active);
            self.bump_up_weak_columns(connections);
            self.update_boost_factors(connections);

            if self.is_update_round(connections.config()) {
                self.update_inhibition_radius(connections);
                self.update_min_duty_cycles(connections);
            }
        }

        log::trace!(
            "spatial pooler: iteration {} learn {} -> {} active columns",
            self.iteration_num,
            learn,
            active.len()
        );

        output.set_sparse_unchecked(active.clone());
        connections.last_active_columns = Some(active);

        if let Some(controller) = self.homeostatic.as_mut() {
            controller.compute(connections, input.get_sparse(), output.get_sparse());
        }

        Ok(())
    }

    fn check_dimensions(&self, connections: &Connections, input: &Sdr, output: &Sdr) -> Result<()> {
        let config = connections.config();
        if connections.columns().len() != config.num_columns() {
            return Err(HtmError::DimensionMismatch {
                expected: config.column_dimensions.clone(),
                actual: vec![connections.columns().len() as UInt],
            });
        }
        if input.size() != config.num_inputs() {
            return Err(HtmError::DimensionMismatch {
                expected: config.input_dimensions.clone(),
                actual: input.dimensions().to_vec(),
            });
        }
        if output.size() != config.num_columns() {
            return Err(HtmError::DimensionMismatch {
                expected: config.column_dimensions.clone(),
                actual: output.dimensions().to_vec(),
            });
        }
        Ok(())
    }

    /// Counts connected synapses to active input bits, one column per task.
    fn calculate_overlaps(&mut self, connections: &Connections, input: &[bool]) {
        let connected = self.rule.connected;
        let columns = connections.columns();
        self.overlaps = match &self.pool {
            Some(pool) => pool.install(|| {
                columns
                    .par_iter()
                    .map(|c| c.overlap(input, connected))
                    .collect::<Vec<_>>()
            }),
            None => columns.iter().map(|c| c.overlap(input, connected)).collect(),
        };
    }

    /// Boost factors apply only while learning.
    fn boost_overlaps(&mut self, connections: &Connections, learn: bool) {
        let boost = learn && !connections.is_boosting_frozen();
        self.boosted_overlaps.clear();
        self.boosted_overlaps.extend(
            self.overlaps
                .iter()
                .zip(connections.boost_factors())
                .map(|(&o, &b)| if boost { o as Real * b } else { o as Real }),
        );
    }

    /// Fraction of columns that may win within one inhibition area.
    fn inhibition_density(connections: &Connections) -> Real {
        let config = connections.config();
        if config.local_area_density > 0.0 {
            return config.local_area_density;
        }

        let diameter = 2.0 * f64::from(connections.inhibition_radius()) + 1.0;
        let area = diameter
            .powi(config.column_dimensions.len() as i32)
            .min(config.num_columns() as f64);
        ((f64::from(config.num_active_columns_per_inh_area) / area) as Real)
            .min(config.max_inhibition_density)
    }

    /// Returns the sorted winning columns.
    fn inhibit_columns(&self, connections: &Connections) -> Vec<ColumnIdx> {
        let density = Self::inhibition_density(connections);
        if connections.config().global_inhibition {
            self.inhibit_columns_global(connections, density)
        } else {
            self.inhibit_columns_local(connections, density)
        }
    }

    /// Picks the top `density * num_columns` columns by boosted overlap,
    /// breaking ties by lower index.
    fn inhibit_columns_global(&self, connections: &Connections, density: Real) -> Vec<ColumnIdx> {
        let num_columns = connections.num_columns();
        let num_active = ((num_columns as Real * density).round() as usize).clamp(1, num_columns);
        let stimulus_threshold = connections.config().stimulus_threshold;

        let boosted = &self.boosted_overlaps;
        let by_rank =
            |a: &usize, b: &usize| boosted[*b].total_cmp(&boosted[*a]).then(a.cmp(b));

        let mut order: Vec<usize> = (0..num_columns).collect();
        match &self.pool {
            Some(pool) => pool.install(|| order.par_sort_unstable_by(by_rank)),
            None => {
                if num_active < num_columns {
                    order.select_nth_unstable_by(num_active - 1, by_rank);
                }
            }
        }
        order.truncate(num_active);

        let mut active: Vec<ColumnIdx> = order
            .into_iter()
            .filter(|&c| self.overlaps[c] as Real >= stimulus_threshold)
            .map(|c| c as ColumnIdx)
            .collect();
        active.sort_unstable();
        active
    }

    /// A column wins if fewer than `round(density * (|neighbourhood| + 1))`
    /// of its neighbours rank above it.
    fn inhibit_columns_local(&self, connections: &Connections, density: Real) -> Vec<ColumnIdx> {
        let stimulus_threshold = connections.config().stimulus_threshold;
        let boosted = &self.boosted_overlaps;
        let overlaps = &self.overlaps;
        let neighbors = &self.neighbors;

        let wins = |column: usize| -> Option<ColumnIdx> {
            if (overlaps[column] as Real) < stimulus_threshold {
                return None;
            }
            let hood = neighbors.get(column);
            let num_active = (0.5 + density * (hood.len() + 1) as Real) as usize;
            let value = boosted[column];
            let num_bigger = hood
                .iter()
                .filter(|&&n| boosted[n] > value || (boosted[n] == value && n < column))
                .count();
            (num_bigger < num_active).then_some(column as ColumnIdx)
        };

        let num_columns = connections.num_columns();
        match &self.pool {
            Some(pool) => pool.install(|| {
                (0..num_columns)
                    .into_par_iter()
                    .filter_map(wins)
                    .collect::<Vec<_>>()
            }),
            None => (0..num_columns).filter_map(wins).collect(),
        }
    }

    /// Hebbian update of the winners' proximal synapses. Each column owns
    /// its permanences, so winners adapt independently.
    fn adapt_synapses(&self, connections: &mut Connections, input: &[bool], active: &[ColumnIdx]) {
        let rule = self.rule;
        match &self.pool {
            Some(pool) => {
                let mut is_active = vec![false; connections.num_columns()];
                for &c in active {
                    is_active[c as usize] = true;
                }
                pool.install(|| {
                    connections
                        .columns
                        .par_iter_mut()
                        .zip(is_active.par_iter())
                        .filter(|(_, &winner)| winner)
                        .for_each(|(column, _)| column.adapt(input, &rule));
                });
            }
            None => {
                for &c in active {
                    connections.columns[c as usize].adapt(input, &rule);
                }
            }
        }
    }

    fn update_duty_cycles(&self, connections: &mut Connections, active: &[ColumnIdx]) {
        let period = u64::from(connections.config().duty_cycle_period)
            .min(self.iteration_num)
            .max(1) as Real;

        for (duty, &overlap) in connections
            .overlap_duty_cycles
            .iter_mut()
            .zip(&self.overlaps)
        {
            let value = if overlap > 0 { 1.0 } else { 0.0 };
            *duty = ((period - 1.0) * *duty + value) / period;
        }

        let mut is_active = vec![false; connections.num_columns()];
        for &c in active {
            is_active[c as usize] = true;
        }
        for (duty, &winner) in connections.active_duty_cycles.iter_mut().zip(&is_active) {
            let value = if winner { 1.0 } else { 0.0 };
            *duty = ((period - 1.0) * *duty + value) / period;
        }
    }

    /// Raises every permanence of columns whose overlap duty cycle fell
    /// below their minimum.
    fn bump_up_weak_columns(&self, connections: &mut Connections) {
        if connections.is_boosting_frozen() {
            return;
        }
        let rule = self.rule;
        for i in 0..connections.columns.len() {
            if connections.overlap_duty_cycles[i] < connections.min_overlap_duty_cycles[i] {
                connections.columns[i].bump(rule.below_stimulus_inc, &rule);
            }
        }
    }

    /// `boost = exp(strength * (target - active_duty))`, kept in
    /// `[1, max_boost]`. The target is the inhibition density globally and
    /// the neighbourhood mean active duty cycle locally.
    fn update_boost_factors(&self, connections: &mut Connections) {
        if connections.is_boosting_frozen() {
            return;
        }
        let config = connections.config();
        let (strength, max_boost) = (config.boost_strength, config.max_boost);
        let global = config.global_inhibition;
        if strength <= 0.0 || max_boost <= 0.0 {
            connections.boost_factors.fill(1.0);
            return;
        }

        let targets: Vec<Real> = if global {
            vec![Self::inhibition_density(connections); connections.num_columns()]
        } else {
            let duty = connections.active_duty_cycles();
            (0..connections.num_columns())
                .map(|c| {
                    let hood = self.neighbors.get(c);
                    let sum: Real = hood.iter().map(|&n| duty[n]).sum::<Real>() + duty[c];
                    sum / (hood.len() + 1) as Real
                })
                .collect()
        };

        for ((boost, &duty), target) in connections
            .boost_factors
            .iter_mut()
            .zip(&connections.active_duty_cycles)
            .zip(targets)
        {
            *boost = (strength * (target - duty)).exp().clamp(1.0, max_boost);
        }
    }

    /// Globally the radius spans the whole column space. Locally it follows
    /// the average receptive field:
    /// `round((avg_connected_span * avg_columns_per_input - 1) / 2)`, at least 1.
    fn update_inhibition_radius(&mut self, connections: &mut Connections) {
        let config = connections.config();
        let radius = if config.global_inhibition {
            config.column_dimensions.iter().copied().max().unwrap_or(1)
        } else {
            let connected = self.rule.connected;
            let columns = connections.columns();
            let total_span: Real = columns
                .iter()
                .map(|c| c.avg_connected_span(&config.input_dimensions, connected))
                .sum();
            let avg_span = total_span / columns.len().max(1) as Real;
            let diameter = avg_span * Self::avg_columns_per_input(config);
            (((diameter - 1.0) / 2.0).round() as UInt).max(1)
        };

        let cached = config.global_inhibition || !self.neighbors.is_empty();
        if radius == connections.inhibition_radius && cached {
            return;
        }

        log::debug!(
            "spatial pooler: inhibition radius {} -> {}",
            connections.inhibition_radius,
            radius
        );
        if !config.global_inhibition {
            self.neighbors = Neighborhood::compute_all(
                &config.column_dimensions,
                radius,
                WrappingMode::from(config.wrap_around),
            );
        }
        connections.inhibition_radius = radius;
    }

    /// Mean over dimensions of columns per input bit.
    fn avg_columns_per_input(config: &HtmConfig) -> Real {
        let dims = config.column_dimensions.len();
        let ratio: Real = config
            .column_dimensions
            .iter()
            .enumerate()
            .map(|(d, &columns)| {
                let inputs = config.input_dimensions.get(d).copied().unwrap_or(1);
                columns as Real / inputs as Real
            })
            .sum();
        ratio / dims as Real
    }

    /// Minimum overlap duty cycle is a fraction of the highest one, over all
    /// columns or over each neighbourhood.
    fn update_min_duty_cycles(&self, connections: &mut Connections) {
        if connections.is_boosting_frozen() {
            return;
        }
        let pct = connections.config().min_pct_overlap_duty_cycles;

        if connections.config().global_inhibition {
            let max_duty = connections
                .overlap_duty_cycles
                .iter()
                .copied()
                .fold(0.0, Real::max);
            connections.min_overlap_duty_cycles.fill(pct * max_duty);
        } else {
            let duty = &connections.overlap_duty_cycles;
            for (c, min_duty) in connections.min_overlap_duty_cycles.iter_mut().enumerate() {
                let max_duty = self
                    .neighbors
                    .get(c)
                    .iter()
                    .map(|&n| duty[n])
                    .fold(duty[c], Real::max);
                *min_duty = pct * max_duty;
            }
        }
    }

    fn update_bookkeeping_vars(&mut self, learn: bool) {
        self.iteration_num += 1;
        if learn {
            self.iteration_learn_num += 1;
        }
    }

    fn is_update_round(&self, config: &HtmConfig) -> bool {
        self.iteration_num % u64::from(config.update_period) == 0
    }

    /// Removes columns that have never won while learning from `active`.
    pub fn strip_unlearned_columns(connections: &Connections, active: &mut Sdr) {
        let duty = connections.active_duty_cycles();
        let kept: Vec<ColumnIdx> = active
            .get_sparse()
            .iter()
            .copied()
            .filter(|&c| duty.get(c as usize).is_some_and(|&d| d > 0.0))
            .collect();
        active.set_sparse_unchecked(kept);
    }

    /// Maps `active_columns` back onto the input space.
    ///
    /// Each input index in the potential pool of one of the columns gets the
    /// sum of that column's permanences to it. Indices no column reaches are
    /// absent from the map. The strongest entries of a learned output are the
    /// input bits that drove it.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::IndexOutOfBounds`] for a column index outside the
    /// layer.
    pub fn reconstruct(
        connections: &Connections,
        active_columns: &[ColumnIdx],
    ) -> Result<AHashMap<UInt, Real>> {
        let columns = connections.columns();
        let mut input = AHashMap::new();

        for &c in active_columns {
            let column = columns
                .get(c as usize)
                .ok_or(HtmError::IndexOutOfBounds {
                    index: c as usize,
                    size: columns.len(),
                })?;
            for (&i, &perm) in column.potential_pool().iter().zip(column.permanences()) {
                *input.entry(i).or_insert(0.0) += Real::from(perm);
            }
        }

        Ok(input)
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Returns the current iteration number.
    pub fn iteration_num(&self) -> u64 {
        self.iteration_num
    }

    /// Returns the current learning iteration number.
    pub fn iteration_learn_num(&self) -> u64 {
        self.iteration_learn_num
    }

    /// Raw overlaps from the last compute.
    pub fn overlaps(&self) -> &[UInt] {
        &self.overlaps
    }

    /// Boosted overlaps from the last compute.
    pub fn boosted_overlaps(&self) -> &[Real] {
        &self.boosted_overlaps
    }

    /// Returns whether per-column work runs on a worker pool.
    pub fn is_multithreaded(&self) -> bool {
        self.pool.is_some()
    }

    /// Worker count, 1 in single-threaded mode.
    pub fn num_threads(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HtmConfig {
        HtmConfig {
            input_dimensions: vec![100],
            column_dimensions: vec![200],
            cells_per_column: 4,
            potential_radius: 50,
            local_area_density: 0.1,
            ..Default::default()
        }
    }

    fn build(config: HtmConfig) -> (Connections, SpatialPooler) {
        let mut conn = Connections::new(config).unwrap();
        let sp = SpatialPooler::new(&mut conn).unwrap();
        (conn, sp)
    }

    fn sdr(size: u32, active: &[u32]) -> Sdr {
        Sdr::from_sparse(&[size], active).unwrap()
    }

    #[test]
    fn test_create_spatial_pooler() {
        let (conn, sp) = build(config());

        assert_eq!(conn.columns().len(), 200);
        assert_eq!(conn.inhibition_radius(), 200);
        assert!(!sp.is_multithreaded());
        for column in conn.columns() {
            assert!(!column.potential_pool().is_empty());
            assert!(column.potential_pool().windows(2).all(|w| w[0] < w[1]));
            assert!(column
                .permanences()
                .iter()
                .all(|&p| (MIN_PERMANENCE..=MAX_PERMANENCE).contains(&p)));
        }
    }

    #[test]
    fn test_compute_basic() {
        let (mut conn, mut sp) = build(config());
        let input = sdr(100, &[1, 5, 10, 20, 30]);
        let mut output = Sdr::new(&[200]);

        sp.compute(&mut conn, &input, true, &mut output).unwrap();

        assert_eq!(output.get_sum(), 20);
        assert_eq!(conn.last_active_columns(), Some(output.get_sparse()));
        assert_eq!(sp.iteration_num(), 1);
        assert_eq!(sp.iteration_learn_num(), 1);
    }

    #[test]
    fn test_input_size_mismatch_changes_nothing() {
        let (mut conn, mut sp) = build(config());
        let before = conn.columns().to_vec();
        let mut output = Sdr::new(&[200]);

        let result = sp.compute(&mut conn, &sdr(99, &[1]), true, &mut output);

        assert!(matches!(result, Err(HtmError::DimensionMismatch { .. })));
        assert_eq!(conn.columns(), &before[..]);
        assert_eq!(sp.iteration_num(), 0);
        assert!(conn.last_active_columns().is_none());
    }

    #[test]
    fn test_missing_columns_rejected() {
        let mut conn = Connections::new(config()).unwrap();
        let mut sp = SpatialPooler::new(&mut conn).unwrap();
        let mut fresh = Connections::new(config()).unwrap();
        let mut output = Sdr::new(&[200]);

        assert!(sp
            .compute(&mut fresh, &sdr(100, &[1]), false, &mut output)
            .is_err());
    }

    #[test]
    fn test_learning_changes_permanences() {
        let (mut conn, mut sp) = build(config());
        let input = sdr(100, &[0, 1, 2, 3, 4, 50, 51, 52]);
        let mut output = Sdr::new(&[200]);

        sp.compute(&mut conn, &input, false, &mut output).unwrap();
        let winner = output.get_sparse()[0] as usize;
        let initial = conn.columns()[winner].permanences().to_vec();

        for _ in 0..20 {
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }

        assert_ne!(conn.columns()[winner].permanences(), &initial[..]);
    }

    #[test]
    fn test_inference_is_read_only() {
        let (mut conn, mut sp) = build(config());
        let input = sdr(100, &[3, 9, 27, 81]);
        let mut output = Sdr::new(&[200]);
        let before = conn.columns().to_vec();

        sp.compute(&mut conn, &input, false, &mut output).unwrap();

        assert_eq!(conn.columns(), &before[..]);
        assert!(conn.active_duty_cycles().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_global_ties_break_by_index() {
        let (mut conn, mut sp) = build(config());
        let mut output = Sdr::new(&[200]);

        // No input bit is on: every overlap is 0, so the lowest indices win.
        sp.compute(&mut conn, &Sdr::new(&[100]), false, &mut output).unwrap();

        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(output.get_sparse(), &expected[..]);
    }

    #[test]
    fn test_stimulus_threshold_blocks_weak_columns() {
        let (mut conn, mut sp) = build(HtmConfig {
            stimulus_threshold: 1000.0,
            ..config()
        });
        let mut output = Sdr::new(&[200]);

        sp.compute(&mut conn, &sdr(100, &[1, 2, 3]), true, &mut output)
            .unwrap();
        assert_eq!(output.get_sum(), 0);
    }

    #[test]
    fn test_num_active_columns_per_inh_area() {
        let (mut conn, mut sp) = build(HtmConfig {
            local_area_density: 0.0,
            num_active_columns_per_inh_area: 10.0,
            ..config()
        });
        let mut output = Sdr::new(&[200]);

        sp.compute(&mut conn, &sdr(100, &[1, 2, 3, 40]), true, &mut output)
            .unwrap();
        assert_eq!(output.get_sum(), 10);
    }

    #[test]
    fn test_local_inhibition() {
        let (mut conn, mut sp) = build(HtmConfig {
            input_dimensions: vec![10, 10],
            column_dimensions: vec![20, 20],
            potential_radius: 3,
            global_inhibition: false,
            local_area_density: 0.05,
            wrap_around: false,
            ..config()
        });
        assert!(conn.inhibition_radius() >= 1);

        let mut rng = Random::new(7);
        let mut input = Sdr::new(&[10, 10]);
        let mut output = Sdr::new(&[20, 20]);
        for _ in 0..10 {
            input.randomize(0.1, &mut rng);
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
            assert!(output.get_sum() > 0);
            assert!(output.get_sparsity() < 0.5);
        }
    }

    #[test]
    fn test_boosting_favours_idle_columns() {
        let (mut conn, mut sp) = build(HtmConfig {
            boost_strength: 10.0,
            ..config()
        });
        let input = sdr(100, &[10, 11, 12, 13, 14, 15]);
        let mut output = Sdr::new(&[200]);

        for _ in 0..50 {
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }

        let boosts = conn.boost_factors();
        assert!(boosts.iter().all(|&b| (1.0..=10.0).contains(&b)));
        let duty = conn.active_duty_cycles();
        let idle = (0..200usize)
            .min_by(|&a, &b| duty[a].total_cmp(&duty[b]))
            .unwrap();
        assert!(duty[idle] < 0.1);
        assert!(boosts[idle] > 1.0);
    }

    #[test]
    fn test_duty_cycles_track_activity() {
        let (mut conn, mut sp) = build(config());
        let input = sdr(100, &[5, 6, 7, 8, 9]);
        let mut output = Sdr::new(&[200]);

        for _ in 0..10 {
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }

        for &c in output.get_sparse() {
            assert!(conn.active_duty_cycles()[c as usize] > 0.0);
        }
        let total: Real = conn.active_duty_cycles().iter().sum();
        assert!((total - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_strip_unlearned_columns() {
        let (mut conn, mut sp) = build(config());
        let input = sdr(100, &[1, 2, 3]);
        let mut output = Sdr::new(&[200]);
        sp.compute(&mut conn, &input, true, &mut output).unwrap();
        let learned = output.get_sparse()[0];
        let unlearned = (0..200).find(|&c| conn.active_duty_cycles()[c as usize] == 0.0).unwrap();

        let mut candidates = Sdr::new(&[200]);
        let mut both = vec![learned, unlearned];
        both.sort_unstable();
        candidates.set_sparse(&both).unwrap();
        SpatialPooler::strip_unlearned_columns(&conn, &mut candidates);

        assert_eq!(candidates.get_sparse(), &[learned]);
    }

    #[test]
    fn test_reconstruct_learned_input() {
        let (mut conn, mut sp) = build(config());
        let bits = [0, 1, 2, 3, 4, 50, 51, 52];
        let input = sdr(100, &bits);
        let mut output = Sdr::new(&[200]);

        for _ in 0..30 {
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }
        sp.compute(&mut conn, &input, false, &mut output).unwrap();

        let reconstructed = SpatialPooler::reconstruct(&conn, output.get_sparse()).unwrap();
        assert!(reconstructed.values().all(|&v| v >= 0.0));

        let mut ranked: Vec<(UInt, Real)> = reconstructed.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut strongest: Vec<UInt> = ranked.iter().take(bits.len()).map(|&(i, _)| i).collect();
        strongest.sort_unstable();
        assert_eq!(strongest, bits);
    }

    #[test]
    fn test_reconstruct_sums_permanences() {
        let (conn, _) = build(config());
        let column = &conn.columns()[7];

        let reconstructed = SpatialPooler::reconstruct(&conn, &[7, 7]).unwrap();

        assert_eq!(reconstructed.len(), column.potential_pool().len());
        for (i, &perm) in column.potential_pool().iter().zip(column.permanences()) {
            assert!((reconstructed[i] - 2.0 * Real::from(perm)).abs() < 1e-6);
        }
        assert!(SpatialPooler::reconstruct(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_reconstruct_unknown_column() {
        let (conn, _) = build(config());

        let result = SpatialPooler::reconstruct(&conn, &[3, 200]);

        assert!(matches!(
            result,
            Err(HtmError::IndexOutOfBounds { index: 200, size: 200 })
        ));
    }

    #[test]
    fn test_multithreaded_pool() {
        let (conn, sp) = build(HtmConfig {
            execution: ExecutionMode::MultiThreaded { num_threads: 2 },
            ..config()
        });
        assert!(sp.is_multithreaded());
        assert_eq!(sp.num_threads(), 2);
        assert_eq!(conn.columns().len(), 200);
    }
}
