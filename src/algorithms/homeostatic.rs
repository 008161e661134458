//! Homeostatic Plasticity Controller.
//!
//! Watches the spatial pooler while it is in the newborn stage. Every input
//! pattern is tracked by its exact set of active bits. A pattern is stable
//! once its output SDR keeps reproducing itself (similarity above a threshold)
//! and its active-column count stops moving. When every pattern seen so far
//! has been stable long enough, observers are told the pooler is stable.
//!
//! After `min_cycles` the controller freezes boosting on the
//! [`Connections`], ending the newborn stage.

use crate::algorithms::Connections;
use crate::types::{sorted_similarity, ElemSparse, Real};

use ahash::AHashMap;

use std::collections::VecDeque;
use std::fmt;

/// Parameters of the [`HomeostaticPlasticityController`].
#[derive(Debug, Clone, PartialEq)]
pub struct HomeostaticParams {
    /// Cycles after which boosting is frozen and stability may be reported.
    pub min_cycles: u64,

    /// Consecutive stable cycles every pattern needs before the pooler counts
    /// as stable.
    pub num_of_cycles_to_wait_on_change: u64,

    /// Minimum similarity between consecutive outputs of one pattern.
    pub required_similarity_threshold: Real,

    /// Length of the per-pattern window of active-column counts.
    pub max_previous_elements: usize,
}

impl Default for HomeostaticParams {
    fn default() -> Self {
        Self {
            min_cycles: 1000,
            num_of_cycles_to_wait_on_change: 50,
            required_similarity_threshold: 0.97,
            max_previous_elements: 5,
        }
    }
}

/// Notification sent when the pooler enters or leaves the stable state.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityEvent {
    /// True on entering the stable state, false on leaving it.
    pub is_stable: bool,
    /// Distinct input patterns seen so far.
    pub num_patterns: usize,
    /// Mean active-column count of the latest output of every pattern.
    pub avg_active_columns: Real,
    /// Inputs processed, including the one that triggered the event.
    pub inputs_seen: u64,
}

/// Receives [`StabilityEvent`]s.
pub trait StabilityObserver: Send {
    /// Called once per stable/unstable transition.
    fn on_stability_change(&mut self, event: &StabilityEvent);
}

impl<F> StabilityObserver for F
where
    F: FnMut(&StabilityEvent) + Send,
{
    fn on_stability_change(&mut self, event: &StabilityEvent) {
        self(event);
    }
}

#[derive(Debug, Clone)]
struct PatternState {
    last_output: Vec<ElemSparse>,
    active_counts: VecDeque<usize>,
    stable_cycles: u64,
}

impl PatternState {
    fn new(output: &[ElemSparse], window: usize) -> Self {
        Self {
            last_output: output.to_vec(),
            active_counts: std::iter::repeat(0).take(window).collect(),
            stable_cycles: 0,
        }
    }

    fn remember_count(&mut self, count: usize) {
        if self.active_counts.is_empty() {
            return;
        }
        self.active_counts.pop_front();
        self.active_counts.push_back(count);
    }

    /// Mean absolute change between consecutive remembered counts.
    fn avg_count_delta(&self) -> Real {
        if self.active_counts.len() < 2 {
            return 0.0;
        }
        let total: usize = self
            .active_counts
            .iter()
            .zip(self.active_counts.iter().skip(1))
            .map(|(&a, &b)| a.abs_diff(b))
            .sum();
        total as Real / (self.active_counts.len() - 1) as Real
    }
}

/// Tracks per-pattern output stability of a spatial pooler.
pub struct HomeostaticPlasticityController {
    params: HomeostaticParams,
    patterns: AHashMap<Vec<ElemSparse>, PatternState>,
    observers: Vec<Box<dyn StabilityObserver>>,
    cycle: u64,
    is_stable: bool,
    frozen: bool,
}

impl fmt::Debug for HomeostaticPlasticityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeostaticPlasticityController")
            .field("params", &self.params)
            .field("num_patterns", &self.patterns.len())
            .field("observers", &self.observers.len())
            .field("cycle", &self.cycle)
            .field("is_stable", &self.is_stable)
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl HomeostaticPlasticityController {
    /// Creates a controller with no observers.
    #[must_use]
    pub fn new(params: HomeostaticParams) -> Self {
        Self {
            params,
            patterns: AHashMap::new(),
            observers: Vec::new(),
            cycle: 0,
            is_stable: false,
            frozen: false,
        }
    }

    /// Registers an observer for stability transitions.
    pub fn add_observer(&mut self, observer: impl StabilityObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Builder-style [`add_observer`](Self::add_observer).
    #[must_use]
    pub fn with_observer(mut self, observer: impl StabilityObserver + 'static) -> Self {
        self.add_observer(observer);
        self
    }

    /// Parameters in use.
    pub fn params(&self) -> &HomeostaticParams {
        &self.params
    }

    /// Inputs processed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Whether the pooler is currently reported stable.
    pub fn is_stable(&self) -> bool {
        self.is_stable
    }

    /// Whether boosting has been frozen by this controller.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Distinct input patterns seen so far.
    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Consecutive stable cycles of `input`, if it has been seen.
    pub fn stable_cycles(&self, input: &[ElemSparse]) -> Option<u64> {
        self.patterns.get(input).map(|p| p.stable_cycles)
    }

    /// Processes one input/output pair of the pooler. Returns whether the
    /// pooler is stable after this cycle.
    pub fn compute(
        &mut self,
        connections: &mut Connections,
        input: &[ElemSparse],
        output: &[ElemSparse],
    ) -> bool {
        if self.cycle >= self.params.min_cycles && !self.frozen {
            connections.freeze_boosting();
            self.frozen = true;
            log::info!(
                "homeostasis: boosting frozen after {} cycles ({} patterns)",
                self.cycle,
                self.patterns.len()
            );
        }

        let window = self.params.max_previous_elements;
        match self.patterns.get_mut(input) {
            None => {
                self.patterns
                    .insert(input.to_vec(), PatternState::new(output, window));
            }
            Some(state) => {
                state.remember_count(output.len());
                let similarity = sorted_similarity(&state.last_output, output);
                state.last_output.clear();
                state.last_output.extend_from_slice(output);

                if similarity >= self.params.required_similarity_threshold {
                    if state.avg_count_delta() == 0.0 {
                        state.stable_cycles += 1;
                    } else {
                        state.stable_cycles = 0;
                    }
                    let stable_cycles = state.stable_cycles;
                    self.check_stable(stable_cycles);
                } else {
                    state.stable_cycles = 0;
                    if self.is_stable {
                        self.is_stable = false;
                        log::warn!(
                            "homeostasis: output of a known pattern changed (similarity {similarity:.3}), pooler unstable again"
                        );
                        self.notify(false);
                    }
                }
            }
        }

        self.cycle += 1;
        log::trace!(
            "homeostasis: cycle {} patterns {} stable {}",
            self.cycle,
            self.patterns.len(),
            self.is_stable
        );
        self.is_stable
    }

    fn check_stable(&mut self, stable_cycles: u64) {
        if self.is_stable || self.cycle < self.params.min_cycles {
            return;
        }
        let wait = self.params.num_of_cycles_to_wait_on_change;
        if stable_cycles > wait && self.patterns.values().all(|p| p.stable_cycles >= wait) {
            self.is_stable = true;
            log::info!(
                "homeostasis: stable after {} cycles over {} patterns",
                self.cycle + 1,
                self.patterns.len()
            );
            self.notify(true);
        }
    }

    fn notify(&mut self, is_stable: bool) {
        let event = StabilityEvent {
            is_stable,
            num_patterns: self.patterns.len(),
            avg_active_columns: self.avg_active_columns(),
            inputs_seen: self.cycle + 1,
        };
        for observer in &mut self.observers {
            observer.on_stability_change(&event);
        }
    }

    fn avg_active_columns(&self) -> Real {
        if self.patterns.is_empty() {
            return 0.0;
        }
        let total: usize = self.patterns.values().map(|p| p.last_output.len()).sum();
        total as Real / self.patterns.len() as Real
    }

    /// Dumps per-pattern state at debug level.
    pub fn trace_state(&self) {
        log::debug!(
            "homeostasis: cycle {} stable {} frozen {} patterns {}",
            self.cycle,
            self.is_stable,
            self.frozen,
            self.patterns.len()
        );
        for (input, state) in &self.patterns {
            log::debug!(
                "  pattern of {} bits: stable for {} cycles, {} active columns, counts {:?}",
                input.len(),
                state.stable_cycles,
                state.last_output.len(),
                state.active_counts
            );
        }
    }
}
