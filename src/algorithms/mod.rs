//! HTM algorithms implementation.
//!
//! This module contains the learning core of a cortical layer:
//!
//! - **Connections**: The synaptic connectivity graph and all learned state
//! - **Spatial Pooler**: Creates sparse representations from input patterns
//! - **Homeostatic Plasticity Controller**: Ends the newborn stage once the
//!   Spatial Pooler is stable
//! - **Temporal Memory**: Learns temporal sequences
//! - **Layer**: Runs the two learning stages in sequence

mod column;
mod compute_cycle;
mod config;
mod connections;
mod homeostatic;
mod layer;
mod segments;
mod spatial_pooler;
mod temporal_memory;

pub use column::{Column, PermanenceRule};
pub use compute_cycle::ComputeCycle;
pub use config::{ExecutionMode, HtmConfig};
pub use connections::{CellState, Connections};
pub use homeostatic::{
    HomeostaticParams, HomeostaticPlasticityController, StabilityEvent, StabilityObserver,
};
pub use layer::Layer;
pub use segments::{SegmentActivity, SegmentArena, SegmentData, SynapseData};
pub use spatial_pooler::SpatialPooler;
pub use temporal_memory::TemporalMemory;
