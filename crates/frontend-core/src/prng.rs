//! Small pseudo-random generators used by the data path.
//! These are bit-exact models, so their sequences are stable across platforms.

/// xoroshiro64 variant with the AOX output function, which replaces the
/// output multiplication with cheap and/or/xor logic.
#[derive(Debug, Clone)]
pub struct Xoroshiro64Aox {
    s0: u32,
    s1: u32,
}

impl Xoroshiro64Aox {
    const A: u32 = 26;
    const B: u32 = 9;
    const C: u32 = 13;

    pub fn new(s0: u32, s1: u32) -> Self {
        assert!(s0 != 0 || s1 != 0, "xoroshiro state must be non-zero");
        Self { s0, s1 }
    }

    /// Returns the output word for the current state, then advances the state
    pub fn next_u32(&mut self) -> u32 {
        let sx = self.s0 ^ self.s1;
        let sa = self.s0 & self.s1;
        let out = sx ^ (sa.rotate_left(1) | sa.rotate_left(2));
        self.s0 = self.s0.rotate_left(Self::A) ^ sx ^ (sx << Self::B);
        self.s1 = sx.rotate_left(Self::C);
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Xoroshiro64Aox {
    fn default() -> Self {
        Self { s0: 1, s1: 0 }
    }
}

/// Fibonacci LFSR shifting left, feedback into bit 0.
/// Taps are polynomial degrees, numbered from 1.
#[derive(Debug, Clone)]
pub struct Lfsr {
    degree: u32,
    taps: Vec<u32>,
    init: u64,
    value: u64,
}

impl Lfsr {
    pub fn new(degree: u32, taps: &[u32], init: u64) -> Self {
        assert!(init != 0, "LFSR seed must be non-zero");
        assert!((1..=63).contains(&degree));
        assert!(taps.iter().all(|&t| t >= 1 && t <= degree));
        Self {
            degree,
            taps: taps.to_vec(),
            init,
            value: init,
        }
    }

    /// Returns the current register value, then shifts once
    pub fn next_value(&mut self) -> u64 {
        let cur = self.value;
        let feedback = self.taps.iter().fold(0, |acc, &tap| acc ^ ((cur >> (tap - 1)) & 1));
        let mask = (1u64 << self.degree) - 1;
        self.value = ((cur << 1) & mask) | feedback;
        cur
    }

    /// Number of distinct states visited before the register returns to its seed
    pub fn period(&self) -> u64 {
        let mut walker = Lfsr::new(self.degree, &self.taps, self.init);
        let mut n = 0;
        loop {
            walker.next_value();
            n += 1;
            if walker.value == self.init {
                return n;
            }
        }
    }

    pub fn reset(&mut self) {
        self.value = self.init;
    }
}
