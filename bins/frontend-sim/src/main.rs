use clap::Parser;

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use frontend_config::{Direction, FrontendConfig, Profile, SharedConfig, toml_config};
use frontend_core::stream::{BridgeReader, DomainBridge};
use frontend_core::{IqSample, QFormat, debug};
use frontend_dsp::Chain;
use frontend_dsp::chain::FLUSH_MAX_STEPS;
use frontend_dsp::analysis::run_sweep;
use frontend_dsp::chains::build_chain;
use frontend_dsp::chains::rx::{ADC_FORMAT, EXT_FORMAT, HALF_FORMAT};
use frontend_dsp::components::codec;

/// Depth of the bridge between the file reader thread and the sample domain
const SOURCE_BRIDGE_DEPTH: usize = 64;
/// Idle steps after the source ran dry before the chain counts as drained
const DRAIN_STEPS: usize = 1024;

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// Sample format exchanged with the host
fn host_format(cfg: &FrontendConfig) -> QFormat {
    match cfg.profile {
        Profile::Standard => ADC_FORMAT,
        Profile::ExtPrecision => EXT_FORMAT,
        Profile::HalfPrecision => HALF_FORMAT,
    }
}

/// Format of the samples entering the chain
fn input_format(cfg: &FrontendConfig) -> QFormat {
    match cfg.direction {
        Direction::Rx => ADC_FORMAT,
        Direction::Tx => host_format(cfg),
    }
}

/// Host samples are interleaved I/Q, one byte per value up to 8 bits, little-endian i16 above
fn decode_host(bytes: &[u8], fmt: QFormat) -> Vec<IqSample> {
    if fmt.width() <= 8 {
        bytes
            .chunks_exact(2)
            .map(|p| IqSample::new(fmt.wrap(p[0] as i8 as i64), fmt.wrap(p[1] as i8 as i64)))
            .collect()
    } else {
        bytes
            .chunks_exact(4)
            .map(|p| {
                let i = i16::from_le_bytes([p[0], p[1]]) as i64;
                let q = i16::from_le_bytes([p[2], p[3]]) as i64;
                IqSample::new(fmt.wrap(i), fmt.wrap(q))
            })
            .collect()
    }
}

fn encode_host(samples: &[IqSample], fmt: QFormat) -> Vec<u8> {
    if fmt.width() <= 8 {
        samples.iter().flat_map(|s| [s.i as i8 as u8, s.q as i8 as u8]).collect()
    } else {
        samples
            .iter()
            .flat_map(|s| [(s.i as i16).to_le_bytes(), (s.q as i16).to_le_bytes()])
            .flatten()
            .collect()
    }
}

fn read_input(path: Option<&str>) -> std::io::Result<Vec<u8>> {
    match path {
        Some(p) => std::fs::read(p),
        None => {
            let mut buf = vec![];
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Steps the chain with samples arriving from the source bridge until the
/// source is exhausted and the chain has drained, or until `running` clears
fn run_stream(chain: &mut Chain, mut source: BridgeReader<IqSample>, running: &AtomicBool) -> Vec<IqSample> {
    let mut outputs = vec![];
    let mut source_open = true;
    let mut idle = 0;
    let mut drained = 0;

    while running.load(Ordering::SeqCst) && idle < DRAIN_STEPS {
        if !source_open && source.peek().is_none() {
            if drained == FLUSH_MAX_STEPS {
                tracing::warn!("Chain still producing output after {} drain steps, stopping", drained);
                break;
            }
            drained += 1;
        }
        if source_open {
            source_open = if source.peek().is_none() && chain.ready() {
                source.wait(Duration::from_millis(100))
            } else {
                source.fill()
            };
        }

        let (accepted, out) = chain.step(source.peek().copied(), true);
        if accepted {
            source.pop();
        }
        match out {
            Some(s) => {
                outputs.push(s);
                idle = 0;
            }
            None if !source_open && source.peek().is_none() => idle += 1,
            None => {}
        }
    }
    if !running.load(Ordering::SeqCst) {
        tracing::warn!("Interrupted after {} steps", chain.steps());
    }
    outputs
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SDR front-end chain simulator",
    long_about = "Streams a sample file through the fixed-point receive or transmit chain selected by the TOML configuration"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with chain profile and control registers")]
    config: String,

    /// Input sample file. Raw ADC bytes for receive, host samples for transmit. Stdin if omitted.
    #[arg(short, long)]
    input: Option<String>,

    /// Output sample file. Host samples for receive, DAC words for transmit. Required unless sweeping.
    #[arg(short, long, required_unless_present = "sweep")]
    output: Option<String>,

    /// Measure the chain's frequency response instead of streaming samples
    #[arg(long)]
    sweep: bool,
}

fn main() {
    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let mut chain = match build_chain(&cfg) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build chain: {}", e);
            std::process::exit(1);
        }
    };
    let config = cfg.config();
    let controls = cfg.controls();

    if args.sweep {
        match run_sweep(&mut chain, input_format(&config), &config.sweep) {
            Ok(points) => {
                println!("{:>8} {:>10} {:>10}", "step", "f/fs", "gain dB");
                for p in points {
                    println!("{:>8} {:>10.5} {:>10.2}", p.phase_step, p.frequency, p.gain_db);
                }
            }
            Err(e) => {
                tracing::error!("Sweep failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let bytes = match read_input(args.input.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read input: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    let bridge = match DomainBridge::new(SOURCE_BRIDGE_DEPTH) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to create source bridge: {}", e);
            std::process::exit(1);
        }
    };
    let (writer, reader) = bridge.split();

    let direction = config.direction;
    let q_invert = controls.q_invert;
    let in_fmt = input_format(&config);
    let producer = thread::spawn(move || {
        let samples = match direction {
            Direction::Rx => codec::decode_adc_stream(&bytes, q_invert),
            Direction::Tx => decode_host(&bytes, in_fmt),
        };
        tracing::info!("Source: {} samples", samples.len());
        for s in samples {
            if writer.send(s).is_err() {
                tracing::debug!("Source: consumer gone");
                break;
            }
        }
    });

    let outputs = run_stream(&mut chain, reader, &running);
    if producer.join().is_err() {
        tracing::error!("Source thread panicked");
    }
    tracing::info!("{}: {} output samples in {} steps", chain.name(), outputs.len(), chain.steps());

    let encoded = match direction {
        Direction::Rx => encode_host(&outputs, host_format(&config)),
        Direction::Tx => codec::encode_dac_stream(&outputs, q_invert),
    };
    let Some(path) = args.output else {
        tracing::error!("No output file given");
        std::process::exit(1);
    };
    if let Err(e) = std::fs::write(&path, &encoded) {
        tracing::error!("Failed to write output to {}: {}", path, e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontend_config::ControlRegs;

    #[test]
    fn test_tone_stream_is_bounded() {
        let cfg = SharedConfig::new(Direction::Tx, Profile::Standard);
        *cfg.state_write() = ControlRegs {
            nco_enable: true,
            phase_step: 1 << 14,
            ..Default::default()
        };
        let mut chain = build_chain(&cfg).unwrap();
        let (writer, reader) = DomainBridge::new(4).unwrap().split();
        writer.send(IqSample::new(1, 1)).unwrap();
        drop(writer);

        let running = AtomicBool::new(true);
        let out = run_stream(&mut chain, reader, &running);
        assert!(!out.is_empty());
        assert!(out.len() <= FLUSH_MAX_STEPS + 8, "{}", out.len());
    }

    #[test]
    fn test_host_sample_widths() {
        let samples = vec![IqSample::new(-8, 7), IqSample::new(3, -1)];
        let narrow = encode_host(&samples, HALF_FORMAT);
        assert_eq!(narrow, vec![0xF8, 0x07, 0x03, 0xFF]);
        assert_eq!(decode_host(&narrow, HALF_FORMAT), samples);

        let wide = vec![IqSample::new(-2048, 2047)];
        let bytes = encode_host(&wide, EXT_FORMAT);
        assert_eq!(bytes, vec![0x00, 0xF8, 0xFF, 0x07]);
        assert_eq!(decode_host(&bytes, EXT_FORMAT), wide);
    }
}
