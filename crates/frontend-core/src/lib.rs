//! Core utilities for the SDR front end
//!
//! This crate provides fundamental types and utilities used across the DSP chain:
//! - QFormat / Fixed for fixed-point bookkeeping and convergent rounding
//! - IqSample, the payload carried between stages
//! - Stream transport primitives (skid buffer, mux/demux, domain bridge)
//! - Pseudo-random generators for dither and test stimulus
//! - Common macros and debug utilities

pub mod build_error;
pub mod counter;
pub mod debug;
pub mod fixed;
pub mod iq;
pub mod prng;
pub mod round;
pub mod stream;

// Re-export commonly used items
pub use build_error::BuildErr;
pub use counter::ModCounter;
pub use fixed::{Fixed, QFormat, bits_for, ceil_log2, exact_log2};
pub use iq::IqSample;
pub use round::convergent_round;

/// Raw two's-complement sample value as carried through the data path.
/// Every stage keeps its values within the width of its declared QFormat.
pub type Raw = i64;
