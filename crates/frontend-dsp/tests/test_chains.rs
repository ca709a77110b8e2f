mod common;

use common::harness::{ChainTest, gaussian_input};
use frontend_config::{ControlRegs, Direction, Profile, SharedConfig};
use frontend_core::{IqSample, debug};
use frontend_dsp::chain::FLUSH_MAX_STEPS;
use frontend_dsp::chains::build_chain;

fn build(direction: Direction, profile: Profile, regs: ControlRegs) -> ChainTest {
    let config = SharedConfig::new(direction, profile);
    *config.state_write() = regs;
    ChainTest::new(build_chain(&config).unwrap())
}

fn noise(n: usize, width: u32) -> Vec<IqSample> {
    gaussian_input(n, width, 5)
        .into_iter()
        .zip(gaussian_input(n, width, 6))
        .map(|(i, q)| IqSample::new(i, q))
        .collect()
}

#[test]
fn test_rx_standard_rates() {
    debug::setup_logging_verbose();

    for decim in 0..=5u8 {
        let mut test = build(
            Direction::Rx,
            Profile::Standard,
            ControlRegs {
                rx_decim: decim,
                ..Default::default()
            },
        );
        let out = test.run(&noise(1024, 8));
        assert_eq!(out.len(), 1024 >> decim, "rx_decim {}", decim);
    }
}

#[test]
fn test_rx_ext_precision_rates() {
    debug::setup_logging_verbose();

    for decim in 0..=3u8 {
        let mut test = build(
            Direction::Rx,
            Profile::ExtPrecision,
            ControlRegs {
                rx_decim: decim,
                ..Default::default()
            },
        );
        // CIC by 2^(decim+2), then two half-bands
        let out = test.run(&noise(2048, 8));
        assert_eq!(out.len(), 2048 >> (decim + 4), "rx_decim {}", decim);
    }
}

#[test]
fn test_tx_standard_rates() {
    debug::setup_logging_verbose();

    let expected = [1, 2, 4, 8, 16, 32];
    for (intrp, factor) in expected.into_iter().enumerate() {
        let mut test = build(
            Direction::Tx,
            Profile::Standard,
            ControlRegs {
                tx_intrp: intrp as u8,
                ..Default::default()
            },
        );
        let out = test.run(&noise(64, 8));
        assert_eq!(out.len(), 64 * factor, "tx_intrp {}", intrp);
    }
}

#[test]
fn test_rx_standard_passthrough() {
    debug::setup_logging_verbose();

    // Every stage bypassed: samples reach the host unchanged
    let mut test = build(Direction::Rx, Profile::Standard, ControlRegs::default());
    let input = noise(300, 8);
    assert_eq!(test.run(&input), input);
}

#[test]
fn test_rx_dc_block_removes_offset() {
    debug::setup_logging_verbose();

    let mut test = build(
        Direction::Rx,
        Profile::Standard,
        ControlRegs {
            dc_block_enable: true,
            ..Default::default()
        },
    );
    let input = vec![IqSample::new(40, -25); 30000];
    let out = test.run(&input);
    let tail = &out[out.len() - 1000..];
    let mean_i = tail.iter().map(|s| s.i).sum::<i64>() as f64 / tail.len() as f64;
    let mean_q = tail.iter().map(|s| s.q).sum::<i64>() as f64 / tail.len() as f64;
    assert!(mean_i.abs() < 1.0 && mean_q.abs() < 1.0, "{} {}", mean_i, mean_q);
}

#[test]
fn test_half_precision_paths() {
    debug::setup_logging_verbose();

    let input = vec![IqSample::new(127, -128), IqSample::new(24, 40)];
    let mut rx = build(Direction::Rx, Profile::HalfPrecision, ControlRegs::default());
    let reduced = rx.run(&input);
    assert_eq!(reduced, vec![IqSample::new(7, -8), IqSample::new(2, 2)]);

    let mut tx = build(Direction::Tx, Profile::HalfPrecision, ControlRegs::default());
    assert_eq!(tx.run(&reduced), vec![IqSample::new(112, -128), IqSample::new(32, 32)]);
}

#[test]
fn test_tx_tone_override() {
    debug::setup_logging_verbose();

    let mut test = build(
        Direction::Tx,
        Profile::Standard,
        ControlRegs {
            nco_enable: true,
            phase_step: 1 << 14,
            ..Default::default()
        },
    );
    // The tone runs without any host input
    test.feed(&[], |_| false);
    let out = test.take_output();
    assert!(out.len() > 400);
    for n in 0..out.len() - 4 {
        assert_eq!(out[n], out[n + 4]);
    }
    assert!(out[..4].iter().all(|s| s.i.abs().max(s.q.abs()) > 100), "{:?}", &out[..4]);
}

#[test]
fn test_tone_run_terminates() {
    debug::setup_logging_verbose();

    let config = SharedConfig::new(Direction::Tx, Profile::Standard);
    *config.state_write() = ControlRegs {
        nco_enable: true,
        phase_step: 1 << 14,
        ..Default::default()
    };
    let mut chain = build_chain(&config).unwrap();
    // The tone never lets the chain go idle, so only the drain bound ends the run
    let out = chain.run(vec![IqSample::new(1, 1); 4]);
    assert!(out.len() > FLUSH_MAX_STEPS / 2, "{}", out.len());
    assert!(out.len() <= FLUSH_MAX_STEPS + 4, "{}", out.len());
    let tail = &out[out.len() - 8..];
    assert_eq!(tail[..4], tail[4..]);
}
