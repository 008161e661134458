//! Run configuration shared by every learning stage.

use crate::error::{HtmError, Result};
use crate::types::{Permanence, Real, UInt};
use crate::utils::Topology;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the spatial pooler schedules its per-column work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExecutionMode {
    /// Everything runs on the calling thread.
    #[default]
    SingleThreaded,
    /// Overlap, inhibition and proximal learning fan out over a dedicated
    /// pool of `num_threads` workers.
    MultiThreaded {
        /// Worker count of the pool.
        num_threads: usize,
    },
}

/// Immutable per-run settings.
///
/// Spatial pooler fields come first, then temporal memory fields. Exactly
/// one of `local_area_density` and `num_active_columns_per_inh_area` must be
/// positive; it decides how many columns win each cycle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HtmConfig {
    /// Shape of the input space (e.g., `vec![100]`).
    pub input_dimensions: Vec<UInt>,

    /// Shape of the column space (e.g., `vec![2048]`).
    pub column_dimensions: Vec<UInt>,

    /// Cells in every column.
    pub cells_per_column: UInt,

    /// Radius, in input bits, of the region a column's potential pool is
    /// drawn from.
    pub potential_radius: UInt,

    /// Fraction of the potential region sampled into the pool, in (0, 1].
    pub potential_pct: Real,

    /// If true, all columns compete globally. If false, within neighbourhoods.
    pub global_inhibition: bool,

    /// Target fraction of active columns per inhibition area.
    pub local_area_density: Real,

    /// Target number of active columns per inhibition area.
    pub num_active_columns_per_inh_area: Real,

    /// Minimum overlap for a column to become active.
    pub stimulus_threshold: Real,

    /// Permanence decrement for inactive inputs of an active column.
    pub syn_perm_inactive_dec: Permanence,

    /// Permanence increment for active inputs of an active column.
    pub syn_perm_active_inc: Permanence,

    /// Proximal connected-permanence threshold.
    pub syn_perm_connected: Permanence,

    /// Fraction of each potential pool initialised above the threshold.
    pub init_connected_pct: Real,

    /// Fraction of the (neighbourhood) maximum overlap duty cycle below which
    /// a column counts as weak and gets its permanences bumped.
    pub min_pct_overlap_duty_cycles: Real,

    /// Window of the duty cycle moving averages.
    pub duty_cycle_period: UInt,

    /// Learning cycles between refreshes of the minimum duty cycles and the
    /// inhibition radius.
    pub update_period: UInt,

    /// Boosting strength; 0 disables boosting.
    pub boost_strength: Real,

    /// Upper bound on a boost factor; 0 disables boosting.
    pub max_boost: Real,

    /// Upper bound on the inhibition density.
    pub max_inhibition_density: Real,

    /// Whether topology wraps around at the edges.
    pub wrap_around: bool,

    /// Active connected synapses for a distal segment to be active.
    pub activation_threshold: UInt,

    /// Active potential synapses for a distal segment to be matching.
    pub min_threshold: UInt,

    /// Permanence of newly grown distal synapses.
    pub initial_permanence: Permanence,

    /// Distal connected-permanence threshold.
    pub connected_permanence: Permanence,

    /// Maximum synapses grown onto a segment per learning step.
    pub max_new_synapse_count: UInt,

    /// Maximum synapses on one distal segment.
    pub max_synapses_per_segment: UInt,

    /// Maximum distal segments on one cell.
    pub max_segments_per_cell: UInt,

    /// Distal permanence increment.
    pub permanence_increment: Permanence,

    /// Distal permanence decrement.
    pub permanence_decrement: Permanence,

    /// Punishment applied to matching segments of columns that stayed
    /// inactive.
    pub predicted_segment_decrement: Permanence,

    /// Seed of every random decision.
    pub seed: u64,

    /// Threading of the spatial pooler.
    pub execution: ExecutionMode,
}

impl Default for HtmConfig {
    fn default() -> Self {
        Self {
            input_dimensions: vec![100],
            column_dimensions: vec![2048],
            cells_per_column: 32,
            potential_radius: 16,
            potential_pct: 0.5,
            global_inhibition: true,
            local_area_density: 0.02,
            num_active_columns_per_inh_area: 0.0,
            stimulus_threshold: 0.0,
            syn_perm_inactive_dec: 0.008,
            syn_perm_active_inc: 0.05,
            syn_perm_connected: 0.1,
            init_connected_pct: 0.5,
            min_pct_overlap_duty_cycles: 0.001,
            duty_cycle_period: 1000,
            update_period: 50,
            boost_strength: 0.0,
            max_boost: 10.0,
            max_inhibition_density: 0.5,
            wrap_around: true,
            activation_threshold: 13,
            min_threshold: 10,
            initial_permanence: 0.21,
            connected_permanence: 0.5,
            max_new_synapse_count: 20,
            max_synapses_per_segment: 255,
            max_segments_per_cell: 255,
            permanence_increment: 0.1,
            permanence_decrement: 0.1,
            predicted_segment_decrement: 0.0,
            seed: 42,
            execution: ExecutionMode::SingleThreaded,
        }
    }
}

fn invalid(name: &'static str, message: impl Into<String>) -> HtmError {
    HtmError::InvalidParameter {
        name,
        message: message.into(),
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, format!("Must be in range [0, 1], got {value}")))
    }
}

impl HtmConfig {
    /// Number of input bits.
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        Topology::num_elements(&self.input_dimensions)
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        Topology::num_elements(&self.column_dimensions)
    }

    /// Number of cells.
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.num_columns() * self.cells_per_column as usize
    }

    /// Permanence bump applied to weak columns and used to raise columns to
    /// the stimulus threshold.
    #[must_use]
    pub fn syn_perm_below_stimulus_inc(&self) -> Permanence {
        self.syn_perm_connected / 10.0
    }

    /// Proximal permanences below this value are zeroed.
    #[must_use]
    pub fn syn_perm_trim_threshold(&self) -> Permanence {
        self.syn_perm_active_inc / 2.0
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::InvalidDimensions`] for empty or zero-sized shapes
    /// and [`HtmError::InvalidParameter`] for any out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        for (name, dims) in [
            ("input_dimensions", &self.input_dimensions),
            ("column_dimensions", &self.column_dimensions),
        ] {
            if dims.is_empty() || dims.contains(&0) {
                return Err(HtmError::InvalidDimensions(format!(
                    "{name} must be non-empty and non-zero, got {dims:?}"
                )));
            }
        }

        if self.cells_per_column == 0 {
            return Err(invalid("cells_per_column", "Must be at least 1"));
        }
        if self.num_cells() > u32::MAX as usize {
            return Err(HtmError::InvalidDimensions(format!(
                "{} cells exceed the cell index range",
                self.num_cells()
            )));
        }
        if self.potential_radius as usize > self.num_inputs() {
            return Err(invalid(
                "potential_radius",
                format!(
                    "Potential pool radius {} exceeds the {} input bits",
                    self.potential_radius,
                    self.num_inputs()
                ),
            ));
        }
        if self.potential_pct <= 0.0 || self.potential_pct > 1.0 {
            return Err(invalid("potential_pct", "Must be in range (0, 1]"));
        }

        let by_density = self.local_area_density > 0.0;
        let by_count = self.num_active_columns_per_inh_area > 0.0;
        if by_density == by_count {
            return Err(invalid(
                "local_area_density",
                "Exactly one of local_area_density and num_active_columns_per_inh_area must be positive",
            ));
        }
        if self.local_area_density > self.max_inhibition_density {
            return Err(invalid(
                "local_area_density",
                format!("Must not exceed {}", self.max_inhibition_density),
            ));
        }
        if self.stimulus_threshold < 0.0 {
            return Err(invalid("stimulus_threshold", "Must be non-negative"));
        }

        check_unit("syn_perm_inactive_dec", f64::from(self.syn_perm_inactive_dec))?;
        check_unit("syn_perm_active_inc", f64::from(self.syn_perm_active_inc))?;
        check_unit("syn_perm_connected", f64::from(self.syn_perm_connected))?;
        check_unit("init_connected_pct", f64::from(self.init_connected_pct))?;
        check_unit(
            "min_pct_overlap_duty_cycles",
            f64::from(self.min_pct_overlap_duty_cycles),
        )?;
        check_unit(
            "max_inhibition_density",
            f64::from(self.max_inhibition_density),
        )?;
        check_unit("initial_permanence", f64::from(self.initial_permanence))?;
        check_unit("connected_permanence", f64::from(self.connected_permanence))?;
        check_unit("permanence_increment", f64::from(self.permanence_increment))?;
        check_unit("permanence_decrement", f64::from(self.permanence_decrement))?;
        check_unit(
            "predicted_segment_decrement",
            f64::from(self.predicted_segment_decrement),
        )?;

        if self.duty_cycle_period == 0 {
            return Err(invalid("duty_cycle_period", "Must be at least 1"));
        }
        if self.update_period == 0 {
            return Err(invalid("update_period", "Must be at least 1"));
        }
        if self.boost_strength < 0.0 || self.max_boost < 0.0 {
            return Err(invalid("boost_strength", "Boosting settings must be non-negative"));
        }
        if self.max_boost > 0.0 && self.max_boost < 1.0 {
            return Err(invalid("max_boost", "Must be 0 (disabled) or at least 1"));
        }

        if self.activation_threshold == 0 {
            return Err(invalid("activation_threshold", "Must be at least 1"));
        }
        if self.min_threshold > self.activation_threshold {
            return Err(invalid(
                "min_threshold",
                "Must not exceed activation_threshold",
            ));
        }
        if self.max_segments_per_cell == 0 {
            return Err(invalid("max_segments_per_cell", "Must be at least 1"));
        }
        if self.max_synapses_per_segment == 0 {
            return Err(invalid("max_synapses_per_segment", "Must be at least 1"));
        }
        if let ExecutionMode::MultiThreaded { num_threads: 0 } = self.execution {
            return Err(invalid("execution", "A multithreaded run needs at least one thread"));
        }

        Ok(())
    }

    /// Parses a JSON settings document and validates it. Missing fields take
    /// their default values.
    ///
    /// ```rust
    /// use neocortex::algorithms::HtmConfig;
    ///
    /// let config = HtmConfig::from_json(r#"{ "column_dimensions": [512], "seed": 7 }"#).unwrap();
    /// assert_eq!(config.num_columns(), 512);
    /// assert_eq!(config.cells_per_column, 32);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::Config`] for malformed JSON and the errors of
    /// [`HtmConfig::validate`] for invalid settings.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| HtmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = HtmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_cells(), 2048 * 32);
        assert!((config.syn_perm_below_stimulus_inc() - 0.01).abs() < 1e-6);
        assert!((config.syn_perm_trim_threshold() - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_zero_columns_rejected() {
        let config = HtmConfig {
            column_dimensions: vec![0],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HtmError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_zero_cells_per_column_rejected() {
        let config = HtmConfig {
            cells_per_column: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HtmError::InvalidParameter {
                name: "cells_per_column",
                ..
            })
        ));
    }

    #[test]
    fn test_potential_pool_larger_than_input_rejected() {
        let config = HtmConfig {
            input_dimensions: vec![50],
            potential_radius: 51,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HtmError::InvalidParameter {
                name: "potential_radius",
                ..
            })
        ));
    }

    #[test]
    fn test_density_modes_are_exclusive() {
        let both = HtmConfig {
            num_active_columns_per_inh_area: 40.0,
            ..Default::default()
        };
        assert!(both.validate().is_err());

        let neither = HtmConfig {
            local_area_density: 0.0,
            ..Default::default()
        };
        assert!(neither.validate().is_err());

        let count_only = HtmConfig {
            local_area_density: 0.0,
            num_active_columns_per_inh_area: 40.0,
            ..Default::default()
        };
        assert!(count_only.validate().is_ok());
    }

    #[test]
    fn test_thresholds_ordered() {
        let config = HtmConfig {
            min_threshold: 20,
            activation_threshold: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = HtmConfig {
            execution: ExecutionMode::MultiThreaded { num_threads: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let config = HtmConfig::from_json(
            r#"{
                "input_dimensions": [64],
                "column_dimensions": [256],
                "potential_radius": 64,
                "global_inhibition": true,
                "execution": { "multi_threaded": { "num_threads": 4 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.num_inputs(), 64);
        assert_eq!(config.num_columns(), 256);
        assert_eq!(config.execution, ExecutionMode::MultiThreaded { num_threads: 4 });
        assert_eq!(config.seed, 42);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            HtmConfig::from_json("{ not json"),
            Err(HtmError::Config(_))
        ));
        assert!(matches!(
            HtmConfig::from_json(r#"{ "cells_per_column": 0 }"#),
            Err(HtmError::InvalidParameter { .. })
        ));
    }
}
