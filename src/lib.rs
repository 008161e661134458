//! # Neocortex - the learning core of a Hierarchical Temporal Memory layer
//!
//! Neocortex implements the two learning stages of an HTM layer and the
//! synaptic graph they share.
//!
//! ## Overview
//!
//! - **Sparse Distributed Representations (SDR)**: The fundamental data structure
//! - **Connections**: Columns, cells, segments and synapses with their permanences
//! - **Spatial Pooler**: Maps input SDRs to a stable sparse set of active columns,
//!   single-threaded or on a dedicated worker pool with identical results
//! - **Homeostatic Plasticity Controller**: Watches the pooler's output stability
//!   and ends its newborn stage
//! - **Temporal Memory**: Learns sequences of active columns and predicts the next one
//!
//! ## Quick Start
//!
//! ```rust
//! use neocortex::prelude::*;
//!
//! let mut layer = Layer::new(HtmConfig {
//!     input_dimensions: vec![100],
//!     column_dimensions: vec![512],
//!     cells_per_column: 8,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let input = Sdr::from_sparse(&[100], &[1, 4, 8, 15, 42, 77]).unwrap();
//! let cycle = layer.compute(&input, true).unwrap();
//!
//! assert_eq!(cycle.active_columns.len(), 10);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): JSON configuration via [`HtmConfig::from_json`](algorithms::HtmConfig::from_json)
//! - `double_precision`: Use `f64` for [`Real`](types::Real)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod algorithms;
pub mod types;
pub mod utils;

/// Re-export of commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::algorithms::{
        ComputeCycle, Connections, ExecutionMode, HomeostaticParams,
        HomeostaticPlasticityController, HtmConfig, Layer, SpatialPooler, StabilityEvent,
        StabilityObserver, TemporalMemory,
    };
    pub use crate::types::{
        CellIdx, ColumnIdx, Permanence, Real, Sdr, SdrDense, SdrSparse, Segment, Synapse,
        SynapseIdx, UInt,
    };
    pub use crate::utils::{Random, Topology, WrappingMode};
    pub use crate::{HtmError, Result};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library.
pub mod error {
    use crate::types::ColumnIdx;

    use thiserror::Error;

    /// Main error type for neocortex operations.
    #[derive(Error, Debug)]
    pub enum HtmError {
        /// Invalid dimensions provided.
        #[error("Invalid dimensions: {0}")]
        InvalidDimensions(String),

        /// Invalid parameter value.
        #[error("Invalid parameter '{name}': {message}")]
        InvalidParameter {
            /// Name of the invalid parameter.
            name: &'static str,
            /// Description of the error.
            message: String,
        },

        /// Index out of bounds.
        #[error("Index {index} out of bounds (size: {size})")]
        IndexOutOfBounds {
            /// The invalid index.
            index: usize,
            /// The valid size.
            size: usize,
        },

        /// Dimension mismatch between SDRs or other structures.
        #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
        DimensionMismatch {
            /// Expected dimensions.
            expected: Vec<u32>,
            /// Actual dimensions.
            actual: Vec<u32>,
        },

        /// SDR data is invalid (e.g., unsorted sparse indices).
        #[error("Invalid SDR data: {0}")]
        InvalidSdrData(String),

        /// The temporal memory was handed a column the spatial pooler did not
        /// activate in its last cycle.
        #[error("Column {column} is not among the spatial pooler's last active columns")]
        StaleActiveColumns {
            /// First offending column.
            column: ColumnIdx,
        },

        /// The worker pool of a multithreaded run could not be built.
        #[error("Thread pool error: {0}")]
        ThreadPool(String),

        /// Malformed configuration document.
        #[cfg(feature = "serde")]
        #[error("Configuration error: {0}")]
        Config(String),
    }

    /// Result type alias using HtmError.
    pub type Result<T> = std::result::Result<T, HtmError>;
}

pub use error::{HtmError, Result};
