//! Receive chains: ADC rate in, host rate out through the domain bridge

use frontend_config::{FrontendConfig, ShiftMode};
use frontend_core::{BuildErr, QFormat};

use super::host_bridge;
use super::taps;
use crate::components::{
    ArmKind, CicDecimator, DcBlock, FirFilter, HalfBandDecimator, Mixer, Nco, QuarterShift, Requantize,
};
use crate::{Chain, Stage};

/// ADC samples, 8-bit signed
pub const ADC_FORMAT: QFormat = QFormat::sq(0, 7);
/// Extended-precision data path after the CIC
pub const EXT_FORMAT: QFormat = QFormat::sq(0, 11);
/// Half-precision host samples
pub const HALF_FORMAT: QFormat = QFormat::sq(0, 3);

const NCO_PHASE_WIDTH: u32 = 16;

fn shift_stage(cfg: &FrontendConfig) -> Result<Box<dyn Stage>, BuildErr> {
    Ok(match cfg.chain.shift_mode {
        ShiftMode::Quarter => Box::new(QuarterShift::new(ADC_FORMAT)),
        ShiftMode::Mixer => Box::new(Mixer::new(ADC_FORMAT, Nco::new(NCO_PHASE_WIDTH, ADC_FORMAT.width())?)?),
    })
}

fn front(name: &'static str, cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = Chain::new(name);
    chain.add_stage(
        "dc_block",
        Box::new(DcBlock::new(ADC_FORMAT.width(), cfg.chain.dc_block_ratio, false)?),
    );
    chain.add_stage("shift", shift_stage(cfg)?);
    Ok(chain)
}

/// DC block, frequency shift and five MCM half-band decimators.
/// `rx_decim > k` enables the k-th decimator counted from the host end.
pub fn standard(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = front("rx_standard", cfg)?;

    let stages = [
        ("hbfir5", taps::hb_std5()?, 4u8),
        ("hbfir4", taps::hb_std4()?, 3),
        ("hbfir3", taps::hb_std3()?, 2),
        ("hbfir2", taps::hb_std2()?, 1),
        ("hbfir1", taps::hb_std1()?, 0),
    ];
    for (name, taps, k) in stages {
        let hb = HalfBandDecimator::new(&taps, ADC_FORMAT, None, ArmKind::Mcm)?.with_control(move |r| r.rx_decim > k);
        chain.add_stage(name, Box::new(hb));
    }

    chain.add_stage("bridge", Box::new(host_bridge(cfg, 8)?));
    Ok(chain)
}

/// DC block, frequency shift, CIC decimator (4..32) with droop compensation,
/// then two serial-MAC half-band decimators at 12 bits.
pub fn ext_precision(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = front("rx_ext_precision", cfg)?;

    let cic = CicDecimator::new(4, 2, &[4, 8, 16, 32], ADC_FORMAT, Some(EXT_FORMAT.width()))?
        .with_control(|r| r.rx_decim as u32 + 2);
    chain.add_stage("cic", Box::new(cic));

    let comp = FirFilter::new(taps::cic_compensation()?, EXT_FORMAT, Some(EXT_FORMAT), ArmKind::Mcm)?;
    chain.add_stage("cic_comp", Box::new(comp));

    let [oc1, oc2] = cfg.chain.mac_overclock;
    let hb1 = HalfBandDecimator::new(&taps::hb_ext1()?, EXT_FORMAT, None, ArmKind::Mac { overclock: oc1 })?;
    chain.add_stage("hbfir1", Box::new(hb1));
    let hb2 = HalfBandDecimator::new(&taps::hb_ext2()?, EXT_FORMAT, None, ArmKind::Mac { overclock: oc2 })?;
    chain.add_stage("hbfir2", Box::new(hb2));

    chain.add_stage("bridge", Box::new(host_bridge(cfg, 8)?));
    Ok(chain)
}

/// DC block and reduction to 4-bit samples, no rate change
pub fn half_precision(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = Chain::new("rx_half_precision");
    chain.add_stage(
        "dc_block",
        Box::new(DcBlock::new(ADC_FORMAT.width(), cfg.chain.dc_block_ratio, false)?),
    );
    chain.add_stage("half_prec", Box::new(Requantize::new(ADC_FORMAT, HALF_FORMAT).saturating()));
    chain.add_stage("bridge", Box::new(host_bridge(cfg, 16)?));
    Ok(chain)
}
