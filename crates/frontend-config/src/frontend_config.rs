use serde::Deserialize;
use std::sync::{Arc, RwLock};

/// Which way samples flow through the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Direction {
    /// ADC towards host, decimating
    Rx,
    /// Host towards DAC, interpolating
    Tx,
}

/// Chain topology and sample precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Profile {
    /// 8-bit samples, MCM half-band cascade, CIC on transmit
    Standard,
    /// CIC with droop compensation and serial-MAC half-bands, 12-bit host samples
    ExtPrecision,
    /// 4-bit host samples, no rate change
    HalfPrecision,
}

/// Frequency shift stage used on the receive path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ShiftMode {
    /// Exact fs/4 rotation by swapping and negating
    Quarter,
    /// NCO mixer with a programmable phase step
    Mixer,
}

#[derive(Debug, Clone)]
pub struct CfgChain {
    pub shift_mode: ShiftMode,
    /// DC block leak coefficient is 2^-dc_block_ratio
    pub dc_block_ratio: u32,
    /// Depth of the bridge to the host domain. Profile default if None.
    pub bridge_depth: Option<usize>,
    /// Serial MAC overclock factors for the two half-band decimators of the extended profile
    pub mac_overclock: [usize; 2],
}

impl Default for CfgChain {
    fn default() -> Self {
        Self {
            shift_mode: ShiftMode::Quarter,
            dc_block_ratio: 12,
            bridge_depth: None,
            mac_overclock: [4, 8],
        }
    }
}

/// Frequency response sweep settings
#[derive(Debug, Clone)]
pub struct CfgSweep {
    /// Measurement periods discarded before measuring, to let filters settle
    pub skip_periods: usize,
    /// Output samples per measurement period (FFT length)
    pub period: usize,
    /// Number of tone frequencies across the band
    pub steps: usize,
}

impl Default for CfgSweep {
    fn default() -> Self {
        Self {
            skip_periods: 4,
            period: 256,
            steps: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub direction: Direction,
    pub profile: Profile,
    pub debug_log: Option<String>,

    pub chain: CfgChain,
    pub sweep: CfgSweep,
}

impl FrontendConfig {
    pub fn new(direction: Direction, profile: Profile) -> Self {
        FrontendConfig {
            direction,
            profile,
            debug_log: None,
            chain: CfgChain::default(),
            sweep: CfgSweep::default(),
        }
    }

    /// Validate that all configuration fields are within supported ranges.
    pub fn validate(&self) -> Result<(), &str> {
        // Dither for both channels is sliced from one 32-bit PRNG word
        if self.chain.dc_block_ratio == 0 || self.chain.dc_block_ratio > 16 {
            return Err("chain.dc_block_ratio must be in 1..=16");
        }
        if let Some(depth) = self.chain.bridge_depth {
            if depth == 0 {
                return Err("chain.bridge_depth must be at least 1");
            }
        }
        if self.chain.mac_overclock.iter().any(|&o| o == 0) {
            return Err("chain.mac_overclock factors must be at least 1");
        }
        if self.sweep.period < 8 {
            return Err("sweep.period must be at least 8 samples");
        }
        if self.sweep.steps == 0 {
            return Err("sweep.steps must be at least 1");
        }
        Ok(())
    }
}

/// Runtime control registers. Written by the host side, sampled by the chain
/// at step boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlRegs {
    pub dc_block_enable: bool,
    pub shift_enable: bool,
    /// Quarter shift direction, up rotates by +90 degrees per sample
    pub shift_up: bool,
    /// Receive decimation setting, as log2 of the decimation factor
    pub rx_decim: u8,
    /// Transmit interpolation setting, as log2 of the interpolation factor
    pub tx_intrp: u8,
    /// NCO phase increment per sample
    pub phase_step: u16,
    /// Replace the transmit stream with the NCO tone
    pub nco_enable: bool,
    /// Invert Q at the converter boundary
    pub q_invert: bool,
}

/// Global shared configuration: immutable config + mutable control registers.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<FrontendConfig>,
    /// Control registers guarded with RwLock (written by the host side, read by chains).
    state: Arc<RwLock<ControlRegs>>,
}

impl SharedConfig {
    pub fn new(direction: Direction, profile: Profile) -> Self {
        Self::from_config(FrontendConfig::new(direction, profile))
    }

    pub fn from_config(cfg: FrontendConfig) -> Self {
        Self::from_parts(cfg, ControlRegs::default())
    }

    /// Builds the shared config, panicking on an invalid configuration
    pub fn from_parts(cfg: FrontendConfig, state: ControlRegs) -> Self {
        match Self::try_from_parts(cfg, state) {
            Ok(c) => c,
            Err(e) => panic!("Invalid frontend configuration: {}", e),
        }
    }

    pub fn try_from_parts(cfg: FrontendConfig, state: ControlRegs) -> Result<Self, String> {
        cfg.validate().map_err(|e| e.to_string())?;
        Ok(Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<FrontendConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for the control registers.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, ControlRegs> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write guard for the control registers.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, ControlRegs> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current control registers
    pub fn controls(&self) -> ControlRegs {
        *self.state_read()
    }
}
