use super::{DetectorAlgorithm, RunningWindow};

/// Difference between a short and a long moving average.
///
/// Both windows evict their oldest sample on every update, so the background always tracks;
/// a target shows up for roughly `FAST` updates, then bleeds into the background over `SLOW`.
///
/// `metric = mean(last FAST samples) - mean(last SLOW samples)`
pub struct DualWindow<const FAST: usize, const SLOW: usize> {
    fast: RunningWindow<FAST>,
    slow: RunningWindow<SLOW>,
}

impl<const FAST: usize, const SLOW: usize> DualWindow<FAST, SLOW> {
    const FAST_IS_SHORTER: () = assert!(FAST < SLOW, "fast window must be shorter than slow");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FAST_IS_SHORTER;
        Self {
            fast: RunningWindow::new(),
            slow: RunningWindow::new(),
        }
    }

    fn metric(&self) -> i32 {
        // both means are at most MAX_CODE, which fits comfortably in i32
        #[allow(clippy::cast_possible_wrap)]
        let metric = self.fast.mean() as i32 - self.slow.mean() as i32;
        metric
    }
}

impl<const FAST: usize, const SLOW: usize> DetectorAlgorithm for DualWindow<FAST, SLOW> {
    fn init(&mut self, first_sample: u16) {
        self.fast.seed(first_sample);
        self.slow.seed(first_sample);
    }

    fn update(&mut self, sample: u16) -> i32 {
        self.fast.push(sample);
        self.slow.push(sample);
        self.metric()
    }

    fn background(&self) -> i32 {
        #[allow(clippy::cast_possible_wrap)]
        let background = self.slow.mean() as i32;
        background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Detector = DualWindow<16, 256>;

    #[test]
    fn constant_input_is_zero() {
        let mut d = Detector::new();
        d.init(1000);
        for _ in 0..1000 {
            assert_eq!(d.update(1000), 0);
        }
    }

    #[test]
    fn outlier_jumps_then_decays() {
        let v = 1000;
        let outlier = 2600;
        let mut d = Detector::new();
        d.init(v);
        for _ in 0..300 {
            d.update(v);
        }

        // jump of about (outlier - v) / FAST, less the slow window's share
        let jump = d.update(outlier);
        let expected = i32::from(outlier - v) / 16;
        let slack = i32::from(outlier - v) / 256 + 1;
        assert!((expected - slack..=expected).contains(&jump), "jump {}", jump);

        // the outlier leaves the fast window after FAST more samples
        let mut metric = jump;
        for _ in 0..16 {
            metric = d.update(v);
        }
        assert!(metric.abs() <= slack, "metric {}", metric);
        assert!(metric <= 0);

        // and the slow window after SLOW
        for _ in 16..256 {
            metric = d.update(v);
        }
        assert_eq!(metric, 0);
    }

    #[test]
    fn dip_reads_negative() {
        let mut d = Detector::new();
        d.init(3800);
        let mut metric = 0;
        for _ in 0..16 {
            metric = d.update(2000);
        }
        // fast window fully in the dip, slow window mostly not
        assert!(metric < -1500, "metric {}", metric);
        assert!(d.background() < 3800);
    }

    #[test]
    fn full_scale_does_not_overflow() {
        let mut d = DualWindow::<64, 1024>::new();
        d.init(4095);
        for _ in 0..2048 {
            assert_eq!(d.update(4095), 0);
        }
        for _ in 0..64 {
            d.update(0);
        }
        // 65 zeros in both windows, the rest of the slow window still at full scale
        assert_eq!(d.update(0), -(4095 * (1024 - 65) / 1024));
    }
}
