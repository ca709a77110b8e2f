use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use super::frontend_config::{CfgChain, CfgSweep, ControlRegs, Direction, FrontendConfig, Profile, SharedConfig, ShiftMode};

/// Build `SharedConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref chain) = root.chain {
        if !chain.extra.is_empty() {
            return Err(format!("Unrecognized fields in chain: {:?}", sorted_keys(&chain.extra)).into());
        }
    }
    if let Some(ref sweep) = root.sweep {
        if !sweep.extra.is_empty() {
            return Err(format!("Unrecognized fields in sweep: {:?}", sorted_keys(&sweep.extra)).into());
        }
    }
    if let Some(ref controls) = root.controls {
        if !controls.extra.is_empty() {
            return Err(format!("Unrecognized fields in controls: {:?}", sorted_keys(&controls.extra)).into());
        }
    }

    // Build config from required and optional values
    let mut cfg = FrontendConfig {
        direction: root.direction,
        profile: root.profile,
        debug_log: root.debug_log,
        chain: CfgChain::default(),
        sweep: CfgSweep::default(),
    };

    if let Some(chain) = root.chain {
        apply_chain_patch(&mut cfg.chain, chain);
    }
    if let Some(sweep) = root.sweep {
        apply_sweep_patch(&mut cfg.sweep, sweep);
    }

    // Initial control register contents
    let mut state = ControlRegs::default();
    if let Some(controls) = root.controls {
        apply_controls_patch(&mut state, controls);
    }

    Ok(SharedConfig::try_from_parts(cfg, state)?)
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn apply_chain_patch(dst: &mut CfgChain, src: ChainDto) {
    if let Some(v) = src.shift_mode {
        dst.shift_mode = v;
    }
    if let Some(v) = src.dc_block_ratio {
        dst.dc_block_ratio = v;
    }
    if let Some(v) = src.bridge_depth {
        dst.bridge_depth = Some(v);
    }
    if let Some(v) = src.mac_overclock {
        dst.mac_overclock = v;
    }
}

fn apply_sweep_patch(dst: &mut CfgSweep, src: SweepDto) {
    if let Some(v) = src.skip_periods {
        dst.skip_periods = v;
    }
    if let Some(v) = src.period {
        dst.period = v;
    }
    if let Some(v) = src.steps {
        dst.steps = v;
    }
}

fn apply_controls_patch(dst: &mut ControlRegs, src: ControlsDto) {
    if let Some(v) = src.dc_block_enable {
        dst.dc_block_enable = v;
    }
    if let Some(v) = src.shift_enable {
        dst.shift_enable = v;
    }
    if let Some(v) = src.shift_up {
        dst.shift_up = v;
    }
    if let Some(v) = src.rx_decim {
        dst.rx_decim = v;
    }
    if let Some(v) = src.tx_intrp {
        dst.tx_intrp = v;
    }
    if let Some(v) = src.phase_step {
        dst.phase_step = v;
    }
    if let Some(v) = src.nco_enable {
        dst.nco_enable = v;
    }
    if let Some(v) = src.q_invert {
        dst.q_invert = v;
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    direction: Direction,
    profile: Profile,
    debug_log: Option<String>,

    #[serde(default)]
    chain: Option<ChainDto>,

    #[serde(default)]
    sweep: Option<SweepDto>,

    #[serde(default)]
    controls: Option<ControlsDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct ChainDto {
    pub shift_mode: Option<ShiftMode>,
    pub dc_block_ratio: Option<u32>,
    pub bridge_depth: Option<usize>,
    pub mac_overclock: Option<[usize; 2]>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct SweepDto {
    pub skip_periods: Option<usize>,
    pub period: Option<usize>,
    pub steps: Option<usize>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct ControlsDto {
    pub dc_block_enable: Option<bool>,
    pub shift_enable: Option<bool>,
    pub shift_up: Option<bool>,
    pub rx_decim: Option<u8>,
    pub tx_intrp: Option<u8>,
    pub phase_step: Option<u16>,
    pub nco_enable: Option<bool>,
    pub q_invert: Option<bool>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
config_version = "0.1"
direction = "Rx"
profile = "ExtPrecision"
debug_log = "frontend.log"

[chain]
shift_mode = "Mixer"
dc_block_ratio = 10
bridge_depth = 32

[sweep]
skip_periods = 6
period = 512

[controls]
dc_block_enable = true
rx_decim = 3
phase_step = 4096
"#;

    #[test]
    fn test_parse_full() {
        let shared = from_toml_str(FULL).unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.direction, Direction::Rx);
        assert_eq!(cfg.profile, Profile::ExtPrecision);
        assert_eq!(cfg.debug_log.as_deref(), Some("frontend.log"));
        assert_eq!(cfg.chain.shift_mode, ShiftMode::Mixer);
        assert_eq!(cfg.chain.dc_block_ratio, 10);
        assert_eq!(cfg.chain.bridge_depth, Some(32));
        assert_eq!(cfg.chain.mac_overclock, [4, 8]);
        assert_eq!(cfg.sweep.skip_periods, 6);
        assert_eq!(cfg.sweep.period, 512);
        assert_eq!(cfg.sweep.steps, 16);

        let regs = shared.controls();
        assert!(regs.dc_block_enable);
        assert!(!regs.shift_enable);
        assert_eq!(regs.rx_decim, 3);
        assert_eq!(regs.phase_step, 4096);
    }

    #[test]
    fn test_minimal_defaults() {
        let shared = from_toml_str("config_version = \"0.1\"\ndirection = \"Tx\"\nprofile = \"Standard\"\n").unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.chain.dc_block_ratio, 12);
        assert_eq!(cfg.sweep.skip_periods, 4);
        assert_eq!(shared.controls(), ControlRegs::default());
    }

    #[test]
    fn test_rejects_wrong_version() {
        let err = from_toml_str("config_version = \"9.9\"\ndirection = \"Rx\"\nprofile = \"Standard\"\n").unwrap_err();
        assert!(err.to_string().contains("config_version"));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let toml = "config_version = \"0.1\"\ndirection = \"Rx\"\nprofile = \"Standard\"\n[controls]\nrx_decimation = 2\nfoo = 1\n";
        let err = from_toml_str(toml).unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized fields in controls: [\"foo\", \"rx_decimation\"]");
    }

    #[test]
    fn test_rejects_invalid_values() {
        let toml = "config_version = \"0.1\"\ndirection = \"Rx\"\nprofile = \"Standard\"\n[chain]\ndc_block_ratio = 0\n";
        assert!(from_toml_str(toml).is_err());
    }

    #[test]
    fn test_shipped_configs() {
        let rx = from_toml_str(include_str!("../../../config/frontend_rx.toml")).unwrap();
        assert_eq!(rx.config().profile, Profile::ExtPrecision);
        assert_eq!(rx.config().chain.shift_mode, ShiftMode::Mixer);
        assert_eq!(rx.controls().rx_decim, 1);
        let tx = from_toml_str(include_str!("../../../config/frontend_tx.toml")).unwrap();
        assert_eq!(tx.config().direction, Direction::Tx);
        assert_eq!(tx.config().chain.bridge_depth, Some(32));
    }
}
