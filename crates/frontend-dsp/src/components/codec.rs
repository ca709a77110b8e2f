//! Sample codecs at the converter boundary.
//!
//! The ADC delivers 8-bit offset-binary pairs and the DAC takes 10-bit
//! offset-binary words. The Q rail is inverted between the RF transceiver and
//! the converter. The ADC side folds a negation into the Q conversion unless
//! `q_invert` is set; the DAC side folds it in only when `q_invert` is set.

use frontend_core::IqSample;

/// DAC word for a zero sample, also driven while no sample is valid
pub const DAC_IDLE: u16 = 0x200;

const ADC_Q_MASK_PLAIN: u8 = 0x80;
const ADC_Q_MASK_NEGATED: u8 = 0x7F;
const DAC_Q_MASK_PLAIN: u16 = 0x200;
const DAC_Q_MASK_NEGATED: u16 = 0x1FF;

/// Converts a raw ADC byte pair to a signed 8-bit sample
pub fn decode_adc(raw: [u8; 2], q_invert: bool) -> IqSample {
    let q_mask = if q_invert { ADC_Q_MASK_PLAIN } else { ADC_Q_MASK_NEGATED };
    let i = (raw[0] ^ 0x80) as i8;
    let q = (raw[1] ^ q_mask) as i8;
    IqSample::new(i as i64, q as i64)
}

/// Converts a signed 8-bit sample to a pair of 10-bit DAC words
pub fn encode_dac(s: IqSample, q_invert: bool) -> [u16; 2] {
    let q_mask = if q_invert { DAC_Q_MASK_NEGATED } else { DAC_Q_MASK_PLAIN };
    let widen = |v: i64| ((v as u8 as u16) << 2) & 0x3FF;
    [widen(s.i) ^ 0x200, widen(s.q) ^ q_mask]
}

/// Decodes interleaved ADC bytes. A trailing odd byte is ignored.
pub fn decode_adc_stream(bytes: &[u8], q_invert: bool) -> Vec<IqSample> {
    bytes
        .chunks_exact(2)
        .map(|pair| decode_adc([pair[0], pair[1]], q_invert))
        .collect()
}

/// Encodes samples as interleaved little-endian DAC words
pub fn encode_dac_stream(samples: &[IqSample], q_invert: bool) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| encode_dac(s, q_invert))
        .flat_map(u16::to_le_bytes)
        .collect()
}
