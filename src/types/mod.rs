//! Core types shared by the learning algorithms: index and permanence
//! primitives and the SDR value exchanged between stages.

mod primitives;
mod sdr;

pub use primitives::*;
pub use sdr::*;
