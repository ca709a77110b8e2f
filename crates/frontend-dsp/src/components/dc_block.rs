//! DC-blocking leaky integrator with dithered quantization of the average.

use frontend_config::ControlRegs;
use frontend_core::prng::Xoroshiro64Aox;
use frontend_core::{BuildErr, IqSample, QFormat};

use crate::Stage;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    /// Previous output
    y: i64,
    /// Running average at `width + ratio` bits
    avg: i64,
    /// Average quantized back to `width` bits
    qavg: i64,
}

/// Subtracts a running average from each channel:
/// `y[n] = sat(x[n] - qavg[n-1])`, `avg[n] = avg[n-1] + y[n-1]`,
/// `qavg[n] = (avg[n] + dither) >> ratio`.
///
/// The average keeps tracking while bypassed, so enabling the block does not
/// start from a cold state.
pub struct DcBlock {
    ratio: u32,
    fmt: QFormat,
    avg_fmt: QFormat,
    dither_mask: u32,
    prng: Xoroshiro64Aox,
    channels: [ChannelState; 2],
    /// Enable as requested by the control registers
    enable: bool,
    /// Enable after resynchronization, applied to the data path
    enable_q: bool,
    out: Option<IqSample>,
}

impl DcBlock {
    pub fn new(width: u32, ratio: u32, enable: bool) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(width, (2..=32).contains(&width))?;
        // Both channels slice their dither from one 32-bit word
        frontend_core::expect_param!(ratio, (1..=16).contains(&ratio))?;

        let fmt = QFormat::signed_int(width);
        let avg_fmt = QFormat::signed_int(width + ratio);
        tracing::debug!("DcBlock: {} bits, ratio 2^-{}, enable {}", width, ratio, enable);
        Ok(Self {
            ratio,
            fmt,
            avg_fmt,
            dither_mask: (1u32 << ratio) - 1,
            prng: Xoroshiro64Aox::default(),
            channels: [ChannelState::default(); 2],
            enable,
            enable_q: enable,
            out: None,
        })
    }

    pub fn set_enable(&mut self, enable: bool) {
        if enable != self.enable {
            tracing::info!("DcBlock: enable {}", enable);
        }
        self.enable = enable;
    }

    pub fn enabled(&self) -> bool {
        self.enable_q
    }

    fn process(&mut self, x: IqSample) -> IqSample {
        let word = self.prng.next_u32();
        let mut y = [0i64; 2];
        for (c, st) in self.channels.iter_mut().enumerate() {
            let dither = ((word >> (c as u32 * self.ratio)) & self.dither_mask) as i64;
            let xc = x.channel(c);

            let out = self.fmt.saturate(xc - st.qavg);
            let avg = self.avg_fmt.wrap(st.avg + st.y);
            let qavg = self.fmt.wrap(self.avg_fmt.wrap(avg + dither) >> self.ratio);
            *st = ChannelState { y: out, avg, qavg };

            y[c] = if self.enable_q { out } else { xc };
        }
        IqSample::from_array(y)
    }
}

impl Stage for DcBlock {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        let y = self.process(sample);
        tracing::trace!("DcBlock: {:?} -> {:?}", sample, y);
        self.out = Some(y);
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn tick(&mut self) {
        self.enable_q = self.enable;
    }

    fn reset(&mut self) {
        self.prng.reset();
        self.channels = [ChannelState::default(); 2];
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        self.set_enable(regs.dc_block_enable);
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.fmt)
    }
}
