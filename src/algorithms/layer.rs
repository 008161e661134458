//! A layer: one [`Connections`] driven by a spatial pooler and a temporal
//! memory in sequence.

use crate::algorithms::{
    ComputeCycle, Connections, HomeostaticPlasticityController, HtmConfig, SpatialPooler,
    TemporalMemory,
};
use crate::error::Result;
use crate::types::Sdr;

/// Spatial pooler followed by temporal memory over shared connections.
///
/// # Example
///
/// ```rust
/// use neocortex::algorithms::{HtmConfig, Layer};
/// use neocortex::types::Sdr;
///
/// let mut layer = Layer::new(HtmConfig {
///     input_dimensions: vec![64],
///     column_dimensions: vec![256],
///     cells_per_column: 8,
///     ..Default::default()
/// })
/// .unwrap();
///
/// let input = Sdr::from_sparse(&[64], &[3, 9, 27, 40, 51]).unwrap();
/// let cycle = layer.compute(&input, true).unwrap();
/// assert_eq!(cycle.active_columns.len(), 5);
/// ```
#[derive(Debug)]
pub struct Layer {
    connections: Connections,
    spatial_pooler: SpatialPooler,
    temporal_memory: TemporalMemory,
    active_columns: Sdr,
}

impl Layer {
    /// Validates `config` and builds every stage.
    ///
    /// # Errors
    ///
    /// Returns configuration and thread pool errors from the stages.
    pub fn new(config: HtmConfig) -> Result<Self> {
        let active_columns = Sdr::new(&config.column_dimensions);
        let mut connections = Connections::new(config)?;
        let spatial_pooler = SpatialPooler::new(&mut connections)?;
        let temporal_memory = TemporalMemory::new(&connections)?;

        Ok(Self {
            connections,
            spatial_pooler,
            temporal_memory,
            active_columns,
        })
    }

    /// Attaches a homeostatic controller to the spatial pooler.
    #[must_use]
    pub fn with_homeostatic(mut self, controller: HomeostaticPlasticityController) -> Self {
        self.spatial_pooler.attach_homeostatic(controller);
        self
    }

    /// Runs one spatial pooler and one temporal memory step on `input`.
    ///
    /// # Errors
    ///
    /// Returns [`HtmError::DimensionMismatch`](crate::HtmError::DimensionMismatch)
    /// if `input` does not match the input space.
    pub fn compute(&mut self, input: &Sdr, learn: bool) -> Result<ComputeCycle> {
        self.spatial_pooler.compute(
            &mut self.connections,
            input,
            learn,
            &mut self.active_columns,
        )?;
        self.temporal_memory
            .compute(&mut self.connections, &self.active_columns, learn)
    }

    /// Starts a new sequence. Learned synapses are kept.
    pub fn reset(&mut self) {
        self.temporal_memory.reset(&mut self.connections);
        self.active_columns.zero();
    }

    /// The shared synaptic graph.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// The spatial pooler.
    pub fn spatial_pooler(&self) -> &SpatialPooler {
        &self.spatial_pooler
    }

    /// The temporal memory.
    pub fn temporal_memory(&self) -> &TemporalMemory {
        &self.temporal_memory
    }

    /// Active columns of the last compute.
    pub fn active_columns(&self) -> &Sdr {
        &self.active_columns
    }
}
