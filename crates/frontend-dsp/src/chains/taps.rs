//! Fixed coefficient sets used by the chain profiles

use frontend_core::BuildErr;

use crate::components::Taps;

/// Last standard half-band, 23 taps: the sharpest transition, closest to the host
pub fn hb_std1() -> Result<Taps, BuildErr> {
    Taps::from_ints(
        &[-2, 0, 7, 0, -18, 0, 41, 0, -92, 0, 320, 512, 320, 0, -92, 0, 41, 0, -18, 0, 7, 0, -2],
        1024,
    )
}

pub fn hb_std2() -> Result<Taps, BuildErr> {
    Taps::from_ints(&[3, 0, -16, 0, 77, 128, 77, 0, -16, 0, 3], 256)
}

pub fn hb_std3() -> Result<Taps, BuildErr> {
    Taps::from_ints(&[-9, 0, 73, 128, 73, 0, -9], 256)
}

pub fn hb_std4() -> Result<Taps, BuildErr> {
    Taps::from_ints(&[-8, 0, 72, 128, 72, 0, -8], 256)
}

/// First standard half-band, 7 taps, running at the full ADC rate
pub fn hb_std5() -> Result<Taps, BuildErr> {
    Taps::from_ints(&[-1, 0, 9, 16, 9, 0, -1], 32)
}

/// Extended-precision half-band, 31 taps
pub fn hb_ext1() -> Result<Taps, BuildErr> {
    Taps::from_ints(
        &[
            -2, 0, 5, 0, -10, 0, 18, 0, -30, 0, 53, 0, -101, 0, 323, 512, 323, 0, -101, 0, 53, 0, -30, 0, 18, 0, -10,
            0, 5, 0, -2,
        ],
        1024,
    )
}

/// Extended-precision half-band, 47 taps
pub fn hb_ext2() -> Result<Taps, BuildErr> {
    Taps::from_ints(
        &[
            -6, 0, 19, 0, -44, 0, 89, 0, -163, 0, 278, 0, -452, 0, 711, 0, -1113, 0, 1800, 0, -3298, 0, 10370, 16384,
            10370, 0, -3298, 0, 1800, 0, -1113, 0, 711, 0, -452, 0, 278, 0, -163, 0, 89, 0, -44, 0, 19, 0, -6,
        ],
        32768,
    )
}

/// CIC droop compensation `[-1/8, 0, 3/4, 0, -1/8]`
pub fn cic_compensation() -> Result<Taps, BuildErr> {
    Taps::from_ints(&[-1, 0, 6, 0, -1], 8)
}
