//! Adaptive detectors turning the per-period decay feature into a detection metric.
//!
//! All detectors separate a fast-moving estimate (the target signature) from a slow-moving one
//! (environmental drift), without any ground truth. They share [`DetectorAlgorithm`] so the
//! pipeline, and the tests, can swap them freely; [`Detector`] is the concrete dispatch the
//! firmware holds, selected by [`DetectorKind`].
//!
//! Every strategy must be seeded with [`init`](DetectorAlgorithm::init) from the first observed
//! sample. Starting from zero instead would make the first few hundred periods look like a huge
//! target.

pub mod cascade;
pub mod dual_window;
pub mod ema;

use crate::area::Polarity;
use crate::config::detector as config;
use crate::config::sampler::MAX_CODE;
use crate::math::sum_fits_u32;
pub use cascade::Cascade;
pub use dual_window::DualWindow;
pub use ema::AsymmetricEma;

/// A stateful, single-input detector.
pub trait DetectorAlgorithm {
    /// Seeds all internal state to `first_sample`.
    fn init(&mut self, first_sample: u16);

    /// Consumes one sample and returns the current metric.
    fn update(&mut self, sample: u16) -> i32;

    /// Whether the metric is meaningful yet.
    fn is_warm(&self) -> bool {
        true
    }

    /// Whether the metric's sign says which way the input moved. Unsigned metrics are
    /// magnitudes only.
    fn is_signed(&self) -> bool {
        true
    }

    /// Current background (slow) estimate, in sampler codes.
    fn background(&self) -> i32;
}

/// Which detector the pipeline runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectorKind {
    DualWindow,
    Cascade,
    AsymmetricEma,
}

pub type DefaultDualWindow = DualWindow<{ config::FAST_WINDOW }, { config::SLOW_WINDOW }>;
pub type DefaultCascade =
    Cascade<{ config::STAGE0_SAMPLES }, { config::STAGE1_SAMPLES }, { config::STAGE2_SAMPLES }>;

/// The configured detector.
pub enum Detector {
    DualWindow(DefaultDualWindow),
    Cascade(DefaultCascade),
    AsymmetricEma(AsymmetricEma),
}

impl Detector {
    /// Builds the detector for `kind`.
    ///
    /// `threshold` and `polarity` are only used by [`AsymmetricEma`], which freezes its
    /// background while the metric points towards a target by at least `threshold`.
    pub fn new(kind: DetectorKind, threshold: u32, polarity: Polarity) -> Self {
        match kind {
            DetectorKind::DualWindow => Self::DualWindow(DualWindow::new()),
            DetectorKind::Cascade => Self::Cascade(Cascade::new()),
            DetectorKind::AsymmetricEma => Self::AsymmetricEma(AsymmetricEma::with_divisors(
                config::EMA_FAST_DIVISOR,
                config::EMA_SLOW_DIVISOR,
                threshold,
                polarity,
            )),
        }
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            Self::DualWindow(_) => DetectorKind::DualWindow,
            Self::Cascade(_) => DetectorKind::Cascade,
            Self::AsymmetricEma(_) => DetectorKind::AsymmetricEma,
        }
    }
}

impl DetectorAlgorithm for Detector {
    fn init(&mut self, first_sample: u16) {
        match self {
            Self::DualWindow(d) => d.init(first_sample),
            Self::Cascade(d) => d.init(first_sample),
            Self::AsymmetricEma(d) => d.init(first_sample),
        }
    }

    fn update(&mut self, sample: u16) -> i32 {
        match self {
            Self::DualWindow(d) => d.update(sample),
            Self::Cascade(d) => d.update(sample),
            Self::AsymmetricEma(d) => d.update(sample),
        }
    }

    fn is_warm(&self) -> bool {
        match self {
            Self::DualWindow(d) => d.is_warm(),
            Self::Cascade(d) => d.is_warm(),
            Self::AsymmetricEma(d) => d.is_warm(),
        }
    }

    fn is_signed(&self) -> bool {
        match self {
            Self::DualWindow(d) => d.is_signed(),
            Self::Cascade(d) => d.is_signed(),
            Self::AsymmetricEma(d) => d.is_signed(),
        }
    }

    fn background(&self) -> i32 {
        match self {
            Self::DualWindow(d) => d.background(),
            Self::Cascade(d) => d.background(),
            Self::AsymmetricEma(d) => d.background(),
        }
    }
}

/// Circular history of `N` samples with an O(1) running sum.
///
/// The sum is a `u32`; `N * MAX_CODE` is checked against it at compile time.
pub(crate) struct RunningWindow<const N: usize> {
    slots: [u16; N],
    next: usize,
    sum: u32,
}

impl<const N: usize> RunningWindow<N> {
    const SUM_FITS: () = {
        assert!(N > 0, "window must hold at least one sample");
        assert!(sum_fits_u32(N, MAX_CODE), "running sum would overflow u32");
    };

    pub(crate) const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SUM_FITS;
        Self {
            slots: [0; N],
            next: 0,
            sum: 0,
        }
    }

    /// Fills every slot with `value`.
    pub(crate) fn seed(&mut self, value: u16) {
        let value = value.min(MAX_CODE);
        self.slots = [value; N];
        self.next = 0;
        self.sum = u32::from(value) * N as u32;
    }

    /// Evicts the oldest sample and inserts `value`.
    pub(crate) fn push(&mut self, value: u16) {
        let value = value.min(MAX_CODE);
        self.sum -= u32::from(self.slots[self.next]);
        self.slots[self.next] = value;
        self.sum += u32::from(value);

        self.next += 1;
        if self.next == N {
            self.next = 0;
        }
    }

    /// Mean of the window, truncated.
    pub(crate) fn mean(&self) -> u32 {
        self.sum / N as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_window_tracks_sum() {
        let mut w = RunningWindow::<4>::new();
        w.seed(10);
        assert_eq!(w.mean(), 10);
        w.push(30);
        assert_eq!(w.sum, 60);
        for _ in 0..3 {
            w.push(30);
        }
        assert_eq!(w.mean(), 30);
        w.push(u16::MAX);
        assert_eq!(w.sum, 90 + u32::from(MAX_CODE));
    }

    #[test]
    fn every_kind_is_constructible() {
        for kind in [
            DetectorKind::DualWindow,
            DetectorKind::Cascade,
            DetectorKind::AsymmetricEma,
        ] {
            let mut detector = Detector::new(kind, 50, Polarity::Falling);
            assert_eq!(detector.kind(), kind);
            assert_eq!(detector.is_signed(), kind != DetectorKind::Cascade);
            detector.init(2000);
            assert_eq!(detector.background(), 2000);
            // a settled constant input never reads as a target
            let mut metric = 0;
            for _ in 0..4000 {
                metric = detector.update(2000);
            }
            assert!(detector.is_warm());
            assert_eq!(metric, 0);
        }
    }
}
