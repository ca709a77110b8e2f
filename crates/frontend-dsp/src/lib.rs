//! Fixed-point DSP stages and the receive/transmit chains built from them
//!
//! Stages implement the [`Stage`] trait and are wired into a [`Chain`], which
//! steps them in lockstep and moves samples along a valid/ready handshake.

#![allow(dead_code)]

pub mod analysis;
pub mod chain;
pub mod chains;
pub mod components;
pub mod stage;

// Re-export commonly used items
pub use chain::Chain;
pub use stage::{ControlFn, Stage};
