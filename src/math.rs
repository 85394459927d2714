//! Small integer helpers shared by the detectors and the tone computation.

/// Integer truncation, checked in debug mode.
pub trait Truncate<To> {
    fn truncate(self) -> To;
}

macro_rules! impl_truncate {
    ($from:ty => $to:ty) => {
        const _: () = assert!(<$to>::BITS <= <$from>::BITS);

        impl Truncate<$to> for $from {
            fn truncate(self) -> $to {
                debug_assert!(self <= <$to>::MAX as $from);
                #[allow(clippy::cast_possible_truncation)]
                let truncated = self as $to;
                truncated
            }
        }
    };
}

impl_truncate!(usize => u16);
impl_truncate!(u32 => u16);
impl_truncate!(u64 => u32);

/// Rounded integer division (half away from zero).
pub trait DivRound {
    fn div_round(self, by: Self) -> Self;
}

macro_rules! impl_divround {
    ($self:ty) => {
        impl DivRound for $self {
            fn div_round(self, by: Self) -> Self {
                let round = by / 2;
                #[allow(unused_comparisons)]
                if self >= 0 {
                    (self + round) / by
                } else {
                    (self - round) / by
                }
            }
        }
    };
}

impl_divround!(u32);
impl_divround!(i32);

/// Whether `len` samples of at most `max_code` can be summed in a `u32` without overflow.
///
/// Used in `const` assertions to size the running-sum accumulators.
pub const fn sum_fits_u32(len: usize, max_code: u16) -> bool {
    (len as u64) * (max_code as u64) <= u32::MAX as u64
}

/// Ceiling division for the tone range computation.
pub const fn div_ceil(x: u32, by: u32) -> u32 {
    (x + by - 1) / by
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_round_rounds_half_away_from_zero() {
        assert_eq!(7u32.div_round(2), 4);
        assert_eq!(6u32.div_round(4), 2);
        assert_eq!((-7i32).div_round(2), -4);
        assert_eq!((-5i32).div_round(4), -1);
    }

    #[test]
    fn accumulator_width() {
        assert!(sum_fits_u32(256, 4095));
        assert!(sum_fits_u32(1 << 20, 4095));
        assert!(!sum_fits_u32(1 << 20, u16::MAX));
    }

    #[test]
    fn ceiling_division() {
        assert_eq!(div_ceil(1_000_000, 65536), 16);
        assert_eq!(div_ceil(65536, 65536), 1);
    }
}
