use super::{DetectorAlgorithm, RunningWindow};
use crate::config::sampler::MAX_CODE;
use crate::math::{sum_fits_u32, Truncate};

/// Three-level block decimation.
///
/// ```text
///  raw ──► stage 0 (K0 samples, summed) ──► stage 1 (last K1 block means)
///                                       └──► stage 2 (last K2 stage 1 means)
/// ```
///
/// Every K0 raw samples, the block mean is pushed into stage 1, and stage 1's mean is pushed
/// into stage 2. The metric is `|mean(stage 1) - mean(stage 2)|`, recomputed once per block.
///
/// The metric reads 0 until `K0 * K1 * K2` raw samples have been consumed.
pub struct Cascade<const K0: usize, const K1: usize, const K2: usize> {
    block_sum: u32,
    block_len: usize,
    stage1: RunningWindow<K1>,
    stage2: RunningWindow<K2>,
    consumed: usize,
    metric: i32,
}

impl<const K0: usize, const K1: usize, const K2: usize> Cascade<K0, K1, K2> {
    const WARM_UP: usize = K0 * K1 * K2;

    const BLOCK_FITS: () = {
        assert!(K0 > 0, "blocks must hold at least one sample");
        assert!(sum_fits_u32(K0, MAX_CODE), "block sum would overflow u32");
    };

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::BLOCK_FITS;
        Self {
            block_sum: 0,
            block_len: 0,
            stage1: RunningWindow::new(),
            stage2: RunningWindow::new(),
            consumed: 0,
            metric: 0,
        }
    }

    /// Mean of the stage 1 history, the short-term estimate.
    pub fn short_term(&self) -> u32 {
        self.stage1.mean()
    }

    fn emit_block(&mut self) {
        let block_mean: u16 = (self.block_sum / K0 as u32).truncate();
        self.block_sum = 0;
        self.block_len = 0;

        self.stage1.push(block_mean);
        let stage1_mean: u16 = self.stage1.mean().truncate();
        self.stage2.push(stage1_mean);

        #[allow(clippy::cast_possible_wrap)]
        let diff = self.stage1.mean() as i32 - self.stage2.mean() as i32;
        self.metric = diff.abs();
    }
}

impl<const K0: usize, const K1: usize, const K2: usize> DetectorAlgorithm for Cascade<K0, K1, K2> {
    fn init(&mut self, first_sample: u16) {
        self.block_sum = 0;
        self.block_len = 0;
        self.stage1.seed(first_sample);
        self.stage2.seed(first_sample);
        self.consumed = 0;
        self.metric = 0;
    }

    fn update(&mut self, sample: u16) -> i32 {
        self.block_sum += u32::from(sample.min(MAX_CODE));
        self.block_len += 1;
        if self.block_len == K0 {
            self.emit_block();
        }

        if self.consumed < Self::WARM_UP {
            self.consumed += 1;
        }

        if self.is_warm() {
            self.metric
        } else {
            0
        }
    }

    fn is_warm(&self) -> bool {
        self.consumed >= Self::WARM_UP
    }

    fn is_signed(&self) -> bool {
        false
    }

    fn background(&self) -> i32 {
        #[allow(clippy::cast_possible_wrap)]
        let background = self.stage2.mean() as i32;
        background
    }
}
