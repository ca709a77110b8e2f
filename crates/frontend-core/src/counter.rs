/// Counter that wraps around at a fixed modulus.
/// Used for tap selection in serial MAC engines and for rate dividers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModCounter {
    value: usize,
    modulus: usize,
}

impl ModCounter {
    pub fn new(modulus: usize) -> Self {
        assert!(modulus > 0, "ModCounter modulus must be non-zero");
        Self { value: 0, modulus }
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.value
    }

    pub fn modulus(&self) -> usize {
        self.modulus
    }

    /// True when the next increment wraps back to zero
    #[inline]
    pub fn is_last(&self) -> bool {
        self.value == self.modulus - 1
    }

    /// Advances by one. Returns true if the counter wrapped.
    #[inline]
    pub fn incr(&mut self) -> bool {
        if self.is_last() {
            self.value = 0;
            true
        } else {
            self.value += 1;
            false
        }
    }

    /// Steps backwards by one, wrapping below zero
    #[inline]
    pub fn decr(&mut self) {
        self.value = if self.value == 0 { self.modulus - 1 } else { self.value - 1 };
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Changes the modulus and restarts from zero
    pub fn set_modulus(&mut self, modulus: usize) {
        assert!(modulus > 0, "ModCounter modulus must be non-zero");
        self.modulus = modulus;
        self.value = 0;
    }
}
