//! Pipeline configuration.
//!
//! Build-time constants come first, grouped the same way as the pipeline stages. The structs at
//! the bottom are what the pipeline is actually constructed from; the firmware builds them from
//! these constants, tests build them by hand. Their constructors validate every ordering and size
//! relationship, so a `Pipeline` can never be put together from an inconsistent configuration.

use crate::area::Polarity;
use crate::detector::DetectorKind;
use crate::math::div_ceil;
use fugit::HertzU32;

/// Sampler configuration
pub mod sampler {
    /// Sampler resolution (12-bit SAR ADC)
    pub const RESOLUTION_BITS: u32 = 12;

    /// Largest code the sampler can produce
    pub const MAX_CODE: u16 = (1 << RESOLUTION_BITS) - 1;

    /// Slots in the circular sample buffer
    pub const BUFFER_CAPACITY: usize = 2048;

    /// Capture indices are packed into 15 bits (see `phase::CaptureSlot`)
    pub const MAX_BUFFER_CAPACITY: usize = 1 << 15;

    const _: () = assert!(BUFFER_CAPACITY <= MAX_BUFFER_CAPACITY);
}

/// Excitation period, in ticks
pub mod phase {
    /// Excitation pin is high for ticks `0..EXCITE_WIDTH`
    pub const EXCITE_WIDTH: u16 = 25;
    /// Capture is latched on this tick, a little after the coil has been switched off
    pub const TRIGGER_OFFSET: u16 = 35;
    /// Ticks per period
    pub const TOTAL_WIDTH: u16 = 500;

    const _: () = assert!(EXCITE_WIDTH < TRIGGER_OFFSET && TRIGGER_OFFSET < TOTAL_WIDTH);
}

/// Window extraction and area-of-interest search
pub mod window {
    /// Samples per window
    pub const LEN: usize = 42;
    /// Upper bound for `PipelineConfig::window_len`, sizes the scratch buffer and telemetry line
    pub const MAX_LEN: usize = 64;
    /// The area of interest starts where the window crosses this level
    pub const INTEREST_THRESHOLD: u16 = 3500;

    const _: () = assert!(LEN <= MAX_LEN);
}

/// Detector parameters
pub mod detector {
    /// Dual-window average: fast window length
    pub const FAST_WINDOW: usize = 16;
    /// Dual-window average: slow (background) window length
    pub const SLOW_WINDOW: usize = 256;

    /// Cascade: raw samples averaged per stage 0 block
    pub const STAGE0_SAMPLES: usize = 4;
    /// Cascade: stage 1 history length
    pub const STAGE1_SAMPLES: usize = 16;
    /// Cascade: stage 2 history length
    pub const STAGE2_SAMPLES: usize = 48;

    /// Asymmetric EMA: fast coefficient, as 1 / `EMA_FAST_DIVISOR` (0.1)
    pub const EMA_FAST_DIVISOR: i64 = 10;
    /// Asymmetric EMA: slow coefficient, as 1 / `EMA_SLOW_DIVISOR` (0.005)
    pub const EMA_SLOW_DIVISOR: i64 = 200;

    /// Metric strength towards a target at or above this counts as a detection
    pub const DETECTION_THRESHOLD: u32 = 50;
}

/// Scheduling of the main loop
pub mod schedule {
    /// Capture events discarded at startup while the filters settle
    pub const STABILIZATION_EVENTS: u32 = 1000;
    /// Telemetry and status are produced once per this many capture events
    pub const REPORT_EVERY: u32 = 250;
}

/// Tone generator
pub mod tone {
    /// Counter clock of the tone timer, after its prescaler
    pub const TIMER_CLOCK_HZ: u32 = 1_000_000;
    /// Frequency at a metric of 0
    pub const BASE_HZ: u32 = 10;
    /// Added frequency per count of metric
    pub const HZ_PER_COUNT: u32 = 3;
    /// Upper limit of the feedback tone
    pub const MAX_HZ: u32 = 4_000;
}

/// Errors raised by configuration constructors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `excite_width < trigger_offset < total_width` does not hold
    PhaseOrder,
    /// Window length is zero
    WindowEmpty,
    /// Window is longer than `window::MAX_LEN`
    WindowTooLong,
    /// Window is longer than the sample buffer it is extracted from
    WindowExceedsBuffer,
    /// Sample buffer cannot be indexed by a packed capture event
    BufferTooLarge,
    /// Tone timer clock cannot produce any tone with a 16-bit counter
    ToneClockTooSlow,
    /// Tone range is empty after clamping to what the timer can represent
    ToneRangeEmpty,
    /// Reporting interval is zero
    ReportIntervalZero,
}

/// Tick positions of one excitation period.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseConfig {
    excite_width: u16,
    trigger_offset: u16,
    total_width: u16,
}

impl PhaseConfig {
    pub const DEFAULT: Self = Self {
        excite_width: phase::EXCITE_WIDTH,
        trigger_offset: phase::TRIGGER_OFFSET,
        total_width: phase::TOTAL_WIDTH,
    };

    pub const fn new(
        excite_width: u16,
        trigger_offset: u16,
        total_width: u16,
    ) -> Result<Self, ConfigError> {
        if excite_width < trigger_offset && trigger_offset < total_width {
            Ok(Self {
                excite_width,
                trigger_offset,
                total_width,
            })
        } else {
            Err(ConfigError::PhaseOrder)
        }
    }

    pub const fn excite_width(&self) -> u16 {
        self.excite_width
    }

    pub const fn trigger_offset(&self) -> u16 {
        self.trigger_offset
    }

    pub const fn total_width(&self) -> u16 {
        self.total_width
    }
}

/// Tone mapping, and the timer it is programmed into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FeedbackConfig {
    timer_clock: HertzU32,
    base: HertzU32,
    hz_per_count: u32,
    min: HertzU32,
    max: HertzU32,
    threshold: u32,
}

impl FeedbackConfig {
    /// Builds the tone mapping.
    ///
    /// `max` is lowered to what the timer can produce (`timer_clock / 2`, an auto-reload of 1).
    /// The lower bound is the slowest tone whose auto-reload still fits in 16 bits.
    pub fn new(
        timer_clock: HertzU32,
        base: HertzU32,
        hz_per_count: u32,
        max: HertzU32,
        threshold: u32,
    ) -> Result<Self, ConfigError> {
        let clock = timer_clock.to_Hz();
        if clock < 2 {
            return Err(ConfigError::ToneClockTooSlow);
        }

        let min = div_ceil(clock, 1 << 16).max(1);
        let max = max.to_Hz().min(clock / 2);
        if min > max {
            return Err(ConfigError::ToneRangeEmpty);
        }

        Ok(Self {
            timer_clock,
            base,
            hz_per_count,
            min: HertzU32::from_raw(min),
            max: HertzU32::from_raw(max),
            threshold,
        })
    }

    pub fn timer_clock(&self) -> HertzU32 {
        self.timer_clock
    }

    pub fn base(&self) -> HertzU32 {
        self.base
    }

    pub fn hz_per_count(&self) -> u32 {
        self.hz_per_count
    }

    /// Slowest representable tone.
    pub fn min(&self) -> HertzU32 {
        self.min
    }

    /// Fastest tone that will be produced.
    pub fn max(&self) -> HertzU32 {
        self.max
    }

    /// Magnitudes below this are silent.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        match Self::new(
            HertzU32::from_raw(tone::TIMER_CLOCK_HZ),
            HertzU32::from_raw(tone::BASE_HZ),
            tone::HZ_PER_COUNT,
            HertzU32::from_raw(tone::MAX_HZ),
            detector::DETECTION_THRESHOLD,
        ) {
            Ok(config) => config,
            Err(_) => unreachable!("default tone constants are valid"),
        }
    }
}

/// Everything the main-loop pipeline needs besides the tone mapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    pub window_len: usize,
    pub interest_threshold: u16,
    pub polarity: Polarity,
    pub stabilization_events: u32,
    pub report_every: u32,
    pub detection_threshold: u32,
    pub detector: DetectorKind,
}

impl PipelineConfig {
    pub const DEFAULT: Self = Self {
        window_len: window::LEN,
        interest_threshold: window::INTEREST_THRESHOLD,
        polarity: Polarity::Falling,
        stabilization_events: schedule::STABILIZATION_EVENTS,
        report_every: schedule::REPORT_EVERY,
        detection_threshold: detector::DETECTION_THRESHOLD,
        detector: DetectorKind::DualWindow,
    };

    /// Checks this configuration against a sample buffer of `capacity` slots.
    pub fn validate(self, capacity: usize) -> Result<Self, ConfigError> {
        if capacity > sampler::MAX_BUFFER_CAPACITY {
            return Err(ConfigError::BufferTooLarge);
        }
        if self.window_len == 0 {
            return Err(ConfigError::WindowEmpty);
        }
        if self.window_len > window::MAX_LEN {
            return Err(ConfigError::WindowTooLong);
        }
        if self.window_len > capacity {
            return Err(ConfigError::WindowExceedsBuffer);
        }
        if self.report_every == 0 {
            return Err(ConfigError::ReportIntervalZero);
        }
        Ok(self)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
