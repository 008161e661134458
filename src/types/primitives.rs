//! Primitive type definitions shared by the learning algorithms.
//!
//! Index types are deliberately narrow: cells, segments and synapses are
//! addressed by `u32` slots in flat arenas.

/// 32-bit unsigned integer.
pub type UInt32 = u32;

/// 32-bit floating point number.
pub type Real32 = f32;

/// Default unsigned integer type.
pub type UInt = UInt32;

/// Default floating point type.
#[cfg(not(feature = "double_precision"))]
pub type Real = Real32;

/// Default floating point type (64-bit variant).
#[cfg(feature = "double_precision")]
pub type Real = f64;

/// Index of a column in the column map.
pub type ColumnIdx = UInt32;

/// Index of a cell in the layer. Cells of column `c` occupy
/// `c * cells_per_column .. (c + 1) * cells_per_column`.
pub type CellIdx = UInt32;

/// Slot of a distal segment in the segment arena.
pub type Segment = UInt32;

/// Slot of a distal synapse in the synapse arena.
pub type Synapse = UInt32;

/// Count of synapses on one segment.
pub type SynapseIdx = UInt32;

/// Synapse permanence value (0.0 to 1.0).
pub type Permanence = Real32;

/// Minimum permanence value.
pub const MIN_PERMANENCE: Permanence = 0.0;

/// Maximum permanence value.
pub const MAX_PERMANENCE: Permanence = 1.0;

/// Synapses whose permanence falls below this value are destroyed.
pub const EPSILON: Permanence = 1e-5;

/// Element type for dense SDR representation.
pub type ElemDense = u8;

/// Element type for sparse SDR representation (indices).
pub type ElemSparse = UInt32;

/// Clamps a permanence into `[MIN_PERMANENCE, MAX_PERMANENCE]`.
#[inline]
#[must_use]
pub fn clamp_permanence(value: Permanence) -> Permanence {
    value.clamp(MIN_PERMANENCE, MAX_PERMANENCE)
}
