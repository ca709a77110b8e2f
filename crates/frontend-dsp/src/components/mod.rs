//! Individual DSP stages and the arithmetic building blocks they share

pub mod cic;
pub mod codec;
pub mod coeffs;
pub mod dc_block;
pub mod fir;
pub mod halfband;
pub mod mac;
pub mod mcm;
pub mod mixer;
pub mod nco;
pub mod quarter_shift;
pub mod requantize;

pub use cic::{CicDecimator, CicInterpolator};
pub use coeffs::Taps;
pub use dc_block::DcBlock;
pub use fir::{ArmKind, Delay, FirFilter};
pub use halfband::{HalfBandDecimator, HalfBandInterpolator};
pub use mac::{MacFir, Multiplier16};
pub use mcm::ShiftAddMcm;
pub use mixer::{ComplexMultiplier, Mixer};
pub use nco::{Nco, ToneOverride};
pub use quarter_shift::QuarterShift;
pub use requantize::{LeftShift, Requantize};
