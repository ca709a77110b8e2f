//! Chain profiles: the fixed stage topologies of the receive and transmit paths

pub mod rx;
pub mod taps;
pub mod tx;

use frontend_config::{Direction, FrontendConfig, Profile, SharedConfig, ShiftMode};
use frontend_core::stream::DomainBridge;
use frontend_core::{BuildErr, IqSample};

use crate::Chain;

/// Builds the chain selected by the configuration and posts the current
/// control registers, so they apply on the first step.
pub fn build_chain(config: &SharedConfig) -> Result<Chain, BuildErr> {
    let cfg = config.config();
    if cfg.direction == Direction::Tx && cfg.chain.shift_mode == ShiftMode::Mixer {
        frontend_core::unimplemented_log!("transmit chains have no frequency shift, ignoring shift_mode Mixer");
    }
    let mut chain = match (cfg.direction, cfg.profile) {
        (Direction::Rx, Profile::Standard) => rx::standard(&cfg)?,
        (Direction::Rx, Profile::ExtPrecision) => rx::ext_precision(&cfg)?,
        (Direction::Rx, Profile::HalfPrecision) => rx::half_precision(&cfg)?,
        (Direction::Tx, Profile::Standard) => tx::standard(&cfg)?,
        (Direction::Tx, Profile::ExtPrecision) => tx::ext_precision(&cfg)?,
        (Direction::Tx, Profile::HalfPrecision) => tx::half_precision(&cfg)?,
    };
    tracing::info!("Built {} chain: {}", chain.name(), chain.stage_names().join(" -> "));
    chain.sync_controls(config);
    Ok(chain)
}

/// Bridge to or from the host domain, sized by the configuration or the profile default
fn host_bridge(cfg: &FrontendConfig, default_depth: usize) -> Result<DomainBridge<IqSample>, BuildErr> {
    DomainBridge::new(cfg.chain.bridge_depth.unwrap_or(default_depth))
}
