//! Rounding helpers for dropping low-order bits of raw fixed-point values

/// Drops `shift` low bits of `value`, rounding to nearest with ties to even.
///
/// The result is rounded up iff the highest discarded bit is set and either any
/// lower discarded bit or the retained LSB is set. Unlike round-half-up this
/// has no statistical bias on uniformly distributed inputs.
#[inline]
pub fn convergent_round(value: i64, shift: u32) -> i64 {
    debug_assert!(shift < 64);
    if shift == 0 {
        return value;
    }
    let retained = value >> shift;
    let msb = (value >> (shift - 1)) & 1;
    let rest = (value & ((1i64 << (shift - 1)) - 1) != 0) as i64;
    let lsb = retained & 1;
    retained + (msb & (rest | lsb))
}

/// Drops `shift` low bits of `value`, rounding towards minus infinity.
#[inline]
pub fn truncate(value: i64, shift: u32) -> i64 {
    debug_assert!(shift < 64);
    value >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn round_half_up(value: i64, shift: u32) -> i64 {
        (value + (1 << (shift - 1))) >> shift
    }

    #[test]
    fn test_convergent_round_exhaustive() {
        for shift in 1..=5u32 {
            for value in -256i64..256 {
                let exact = value as f64 / (1i64 << shift) as f64;
                let expected = exact.round_ties_even() as i64;
                assert_eq!(convergent_round(value, shift), expected, "value {} shift {}", value, shift);
            }
        }
    }

    #[test]
    fn test_convergent_round_ties() {
        // 0.5 -> 0, 1.5 -> 2, 2.5 -> 2, -0.5 -> 0, -1.5 -> -2
        assert_eq!(convergent_round(1, 1), 0);
        assert_eq!(convergent_round(3, 1), 2);
        assert_eq!(convergent_round(5, 1), 2);
        assert_eq!(convergent_round(-1, 1), 0);
        assert_eq!(convergent_round(-3, 1), -2);
        assert_eq!(convergent_round(0b1011, 2), 3);
        assert_eq!(convergent_round(42, 0), 42);
    }

    #[test]
    fn test_truncate_floors() {
        assert_eq!(truncate(7, 2), 1);
        assert_eq!(truncate(-7, 2), -2);
    }

    #[test]
    fn test_convergent_round_unbiased() {
        let mut rng = StdRng::seed_from_u64(1);
        let count = 100_000;
        let mut err_conv = 0.0f64;
        let mut err_half_up = 0.0f64;
        for _ in 0..count {
            let value: i64 = rng.random_range(-(1 << 20)..(1 << 20));
            let exact = value as f64 / 2.0;
            err_conv += convergent_round(value, 1) as f64 - exact;
            err_half_up += round_half_up(value, 1) as f64 - exact;
        }
        let bias_conv = err_conv / count as f64;
        let bias_half_up = err_half_up / count as f64;
        assert!(bias_conv.abs() < 0.02, "convergent bias {}", bias_conv);
        assert!(bias_half_up > 0.2, "half-up bias {}", bias_half_up);
    }
}
