use super::DetectorAlgorithm;
use crate::area::Polarity;
use crate::config::sampler::MAX_CODE;
use fixed::types::I32F32;

/// Fast and slow exponential averages, where the slow one stops tracking while a target is
/// present.
///
/// Each update:
///
/// ```text
/// fast += (x - fast) / fast_divisor                   (always)
/// slow += (x - slow) / slow_divisor                   (only if toward < threshold)
/// metric = fast - slow
/// ```
///
/// where `toward` is `fast - slow` for [`Polarity::Rising`] and `slow - fast` for
/// [`Polarity::Falling`]. The freeze keeps a target that sits under the coil for a while from
/// being absorbed into the background. Movement away from a target keeps tracking.
pub struct AsymmetricEma {
    fast: I32F32,
    slow: I32F32,
    alpha_fast: I32F32,
    alpha_slow: I32F32,
    threshold: I32F32,
    polarity: Polarity,
}

impl AsymmetricEma {
    /// Creates a detector with coefficients `1 / fast_divisor` and `1 / slow_divisor`.
    pub fn with_divisors(
        fast_divisor: i64,
        slow_divisor: i64,
        threshold: u32,
        polarity: Polarity,
    ) -> Self {
        debug_assert!(fast_divisor > 0 && slow_divisor > 0);
        let one = I32F32::from_num(1);
        Self {
            fast: I32F32::from_num(0),
            slow: I32F32::from_num(0),
            alpha_fast: one / fast_divisor,
            alpha_slow: one / slow_divisor,
            threshold: I32F32::from_num(threshold),
            polarity,
        }
    }

    /// Whether the last update left the background untouched.
    pub fn is_frozen(&self) -> bool {
        self.toward_target() >= self.threshold
    }

    fn toward_target(&self) -> I32F32 {
        match self.polarity {
            Polarity::Rising => self.fast - self.slow,
            Polarity::Falling => self.slow - self.fast,
        }
    }

    pub fn fast(&self) -> I32F32 {
        self.fast
    }

    pub fn slow(&self) -> I32F32 {
        self.slow
    }

    fn metric(&self) -> i32 {
        (self.fast - self.slow).round_to_zero().to_num()
    }
}

impl DetectorAlgorithm for AsymmetricEma {
    fn init(&mut self, first_sample: u16) {
        let first = I32F32::from_num(first_sample.min(MAX_CODE));
        self.fast = first;
        self.slow = first;
    }

    fn update(&mut self, sample: u16) -> i32 {
        let x = I32F32::from_num(sample.min(MAX_CODE));

        self.fast += (x - self.fast) * self.alpha_fast;
        if !self.is_frozen() {
            self.slow += (x - self.slow) * self.alpha_slow;
        }

        self.metric()
    }

    fn background(&self) -> i32 {
        self.slow.round().to_num()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(threshold: u32) -> AsymmetricEma {
        AsymmetricEma::with_divisors(10, 200, threshold, Polarity::Rising)
    }

    #[test]
    fn seeded_constant_is_zero() {
        let mut d = detector(50);
        d.init(3000);
        for _ in 0..1000 {
            assert_eq!(d.update(3000), 0);
        }
        assert_eq!(d.background(), 3000);
    }

    #[test]
    fn fast_follows_step() {
        let mut d = detector(50);
        d.init(1000);
        let first = d.update(2000);
        // 0.1 of the step on the fast side, less 0.005 of it on the slow side
        assert!((94..=100).contains(&first), "metric {}", first);
        for _ in 0..200 {
            d.update(2000);
        }
        assert!(d.fast() > I32F32::from_num(1990));
    }

    #[test]
    fn background_freezes_while_target_present() {
        let mut d = detector(50);
        d.init(1000);

        // step well above threshold: after a few updates the slow side stops moving
        for _ in 0..10 {
            d.update(3000);
        }
        assert!(d.is_frozen());
        let frozen = d.slow();
        for _ in 0..500 {
            let metric = d.update(3000);
            assert!(metric >= 50);
            assert_eq!(d.slow(), frozen);
        }
    }

    #[test]
    fn background_resumes_once_target_leaves() {
        let mut d = detector(50);
        d.init(1000);
        for _ in 0..100 {
            d.update(3000);
        }
        let frozen = d.slow();

        // target gone, background drifted slightly: the first update under threshold moves slow
        let mut resumed_at = None;
        for i in 0..200 {
            d.update(1020);
            if d.slow() != frozen {
                resumed_at = Some(i);
                break;
            }
        }
        let i = resumed_at.unwrap();
        assert!(d.fast() - frozen < I32F32::from_num(50), "resumed late, at {}", i);
    }

    #[test]
    fn negative_excursions_keep_tracking() {
        let mut d = detector(50);
        d.init(3000);
        let before = d.slow();
        for _ in 0..50 {
            assert!(d.update(1000) <= 0);
        }
        assert!(d.slow() < before);
        assert!(!d.is_frozen());
    }

    #[test]
    fn falling_polarity_freezes_on_dips() {
        let mut d = AsymmetricEma::with_divisors(10, 200, 50, Polarity::Falling);
        d.init(3800);
        for _ in 0..10 {
            d.update(2000);
        }
        assert!(d.is_frozen());
        let frozen = d.slow();
        for _ in 0..500 {
            assert!(d.update(2000) <= -50);
            assert_eq!(d.slow(), frozen);
        }
        assert_eq!(d.background(), 3800);

        // a rise is the background moving, not a target
        let mut d = AsymmetricEma::with_divisors(10, 200, 50, Polarity::Falling);
        d.init(1000);
        for _ in 0..50 {
            d.update(3000);
        }
        assert!(!d.is_frozen());
        assert!(d.background() > 1000);
    }

    #[test]
    fn full_scale_does_not_overflow() {
        let mut d = detector(0);
        d.init(0);
        for _ in 0..10_000 {
            d.update(u16::MAX);
        }
        assert!(d.fast() <= I32F32::from_num(MAX_CODE));
        for _ in 0..10_000 {
            d.update(0);
        }
        assert!(d.fast() >= I32F32::from_num(0));
    }
}
