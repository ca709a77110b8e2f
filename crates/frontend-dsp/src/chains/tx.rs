//! Transmit chains: host rate in through the domain bridge, DAC rate out

use frontend_config::FrontendConfig;
use frontend_core::BuildErr;
use frontend_core::stream::SkidBuffer;

use super::host_bridge;
use super::rx::{ADC_FORMAT as DAC_FORMAT, EXT_FORMAT, HALF_FORMAT};
use super::taps;
use crate::Chain;
use crate::components::{ArmKind, CicInterpolator, FirFilter, HalfBandInterpolator, LeftShift, Nco, ToneOverride};

/// Two MCM half-band interpolators and a CIC interpolator (1..8), with the
/// DAC optionally driven by the NCO test tone instead.
///
/// `tx_intrp` enables the half-bands for values above 0 and 1, and sets the
/// CIC factor to `2^(tx_intrp - 2)` above 2.
pub fn standard(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = Chain::new("tx_standard");
    chain.add_stage("bridge", Box::new(host_bridge(cfg, 8)?));

    let hb1 = HalfBandInterpolator::new(&taps::hb_std1()?, DAC_FORMAT, None, ArmKind::Mcm)?
        .with_control(|r| r.tx_intrp > 0);
    chain.add_stage("hbfir1", Box::new(hb1));
    chain.add_stage("skid2", Box::new(SkidBuffer::new()));

    let hb2 = HalfBandInterpolator::new(&taps::hb_std2()?, DAC_FORMAT, None, ArmKind::Mcm)?
        .with_control(|r| r.tx_intrp > 1);
    chain.add_stage("hbfir2", Box::new(hb2));
    chain.add_stage("skid3", Box::new(SkidBuffer::new()));

    let cic = CicInterpolator::new(3, 1, &[1, 2, 4, 8], DAC_FORMAT, Some(DAC_FORMAT.width()))?
        .with_control(|r| r.tx_intrp.saturating_sub(2) as u32);
    chain.add_stage("cic_interpolator", Box::new(cic));
    chain.add_stage("skid4", Box::new(SkidBuffer::new()));

    let tone = ToneOverride::new(Nco::new(16, DAC_FORMAT.width())?, DAC_FORMAT)?;
    chain.add_stage("tone", Box::new(tone));
    Ok(chain)
}

/// Two serial-MAC half-band interpolators at 12 bits, droop compensation and
/// a CIC interpolator (4..32) down to 8 bits. The CIC factor is `2^(tx_intrp + 2)`.
pub fn ext_precision(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = Chain::new("tx_ext_precision");
    chain.add_stage("bridge", Box::new(host_bridge(cfg, 8)?));

    // Mirrors the receive side: the longer filter gets the larger overclock
    let [oc_short, oc_long] = cfg.chain.mac_overclock;
    let hb1 = HalfBandInterpolator::new(&taps::hb_ext1()?, EXT_FORMAT, None, ArmKind::Mac { overclock: oc_long })?;
    chain.add_stage("hbfir1", Box::new(hb1));
    chain.add_stage("skid1", Box::new(SkidBuffer::new()));

    let hb2 = HalfBandInterpolator::new(&taps::hb_std2()?, EXT_FORMAT, None, ArmKind::Mac { overclock: oc_short })?;
    chain.add_stage("hbfir2", Box::new(hb2));
    chain.add_stage("skid2", Box::new(SkidBuffer::new()));

    let comp = FirFilter::new(taps::cic_compensation()?, EXT_FORMAT, Some(EXT_FORMAT), ArmKind::Mcm)?;
    chain.add_stage("cic_comp", Box::new(comp));

    let cic = CicInterpolator::new(4, 2, &[4, 8, 16, 32], EXT_FORMAT, Some(DAC_FORMAT.width()))?
        .with_control(|r| r.tx_intrp as u32 + 2);
    chain.add_stage("cic", Box::new(cic));
    Ok(chain)
}

/// Expansion of 4-bit host samples to the 8-bit DAC format
pub fn half_precision(cfg: &FrontendConfig) -> Result<Chain, BuildErr> {
    let mut chain = Chain::new("tx_half_precision");
    chain.add_stage("bridge", Box::new(host_bridge(cfg, 16)?));
    chain.add_stage("half_prec", Box::new(LeftShift::new(HALF_FORMAT, DAC_FORMAT.width() - HALF_FORMAT.width())));
    Ok(chain)
}
