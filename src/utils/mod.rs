//! Utility modules for the HTM library.
//!
//! Seeded random number generation and topology helpers for column and input
//! grids.

mod random;
mod topology;

pub use random::Random;
pub use topology::{Neighborhood, Topology, WrappingMode};
