use pulsedet::config as pipeline;

pub fn dump_to_log() {
    defmt::info!(
        "\n\
        Debugging flags:\n\
        - LOG_ALL_EVENTS: {}\n\
        - LOG_STATUS: {}\n\
        - LOG_TIMING: {}\n\
        Clocks:\n\
        - HSE_FREQ: {} Hz\n\
        - SYSCLK:   {} Hz\n\
        - PCLK1:    {} Hz\n\
        - PCLK2:    {} Hz\n\
        - ADCCLK:   {} Hz\n\
        Tick:\n\
        - FREQ: {} Hz\n\
        - EXCITE_WIDTH:   {} ticks\n\
        - TRIGGER_OFFSET: {} ticks\n\
        - TOTAL_WIDTH:    {} ticks\n\
        - PERIODS_PER_SEC: {}\n\
        - TRIGGER: {=str}\n\
        ADC:\n\
        - SAMPLES_PER_SEC: {}\n\
        - BUF_LEN: {}\n\
        - WINDOW_LEN: {}\n\
        - INTEREST_THRESHOLD: {}\n\
        - WATCHDOG_LOW: {}\n\
        Detector:\n\
        - KIND: {}\n\
        - DETECTION_THRESHOLD: {}\n\
        - STABILIZATION_EVENTS: {}\n\
        - REPORT_EVERY: {}\n\
        Tone:\n\
        - TIMER_CLOCK: {} Hz\n\
        - BASE: {} Hz\n\
        - HZ_PER_COUNT: {}\n\
        - MAX: {} Hz\n\
        ",
        debug::LOG_ALL_EVENTS,
        debug::LOG_STATUS,
        debug::LOG_TIMING,
        clk::HSE_FREQ.to_Hz(),
        clk::SYSCLK.to_Hz(),
        clk::PCLK1.to_Hz(),
        clk::PCLK2.to_Hz(),
        clk::ADCCLK.to_Hz(),
        tick::FREQ.to_Hz(),
        pipeline::phase::EXCITE_WIDTH,
        pipeline::phase::TRIGGER_OFFSET,
        pipeline::phase::TOTAL_WIDTH,
        tick::PERIODS_PER_SEC,
        tick::TRIGGER,
        adc::SAMPLES_PER_SEC,
        adc::BUF_LEN,
        pipeline::window::LEN,
        pipeline::window::INTEREST_THRESHOLD,
        adc::WATCHDOG_LOW,
        detector::KIND,
        pipeline::detector::DETECTION_THRESHOLD,
        pipeline::schedule::STABILIZATION_EVENTS,
        pipeline::schedule::REPORT_EVERY,
        tone::TIMER_CLOCK_HZ,
        pipeline::tone::BASE_HZ,
        pipeline::tone::HZ_PER_COUNT,
        pipeline::tone::MAX_HZ,
    );
}

/// Debugging flags
pub mod debug {
    /// Print every capture event taken by the main loop
    pub const LOG_ALL_EVENTS: bool = false;

    /// Print the status snapshot alongside each telemetry line
    pub const LOG_STATUS: bool = false;

    /// Print how long each pipeline cycle took
    pub const LOG_TIMING: bool = false;
}

/// Clock configuration
///
/// See clock tree in https://www.st.com/resource/en/datasheet/stm32f103c8.pdf
/// Rough layout:
///
///   SYSCLK -> AHB prescaler -> APB1 prescaler -> PCLK1 -> TIM2, TIM3 (x2 if prescaled)
///              / 1,2..512   |   / 1,2,4,8,16
///                           |
///                           -> APB2 prescaler -> PCLK2
///                               / 1,2,4,8,16  |
///                                             |
///                                             -> ADC prescaler -> ADCCLK
///                                                 / 2,4,6,8
pub mod clk {
    use fugit::Rate;

    /// Use external oscillator (required to get max 72MHz sysclk)
    pub const HSE_FREQ: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(8);

    /// PLLMUL @ x9 (max 72MHz)
    pub const SYSCLK: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(72);
    pub const SYSCLK_HZ: u32 = SYSCLK.to_Hz();

    /// APB1 prescaler @ /2 (max 36MHz), timers on APB1 run at 72MHz
    pub const PCLK1: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(36);
    pub const APB1_TIMCLK: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(72);

    /// APB2 prescaler @ /1 (max 72MHz)
    pub const PCLK2: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(72);

    /// ADC prescaler @ /6 (max 14MHz), as fast as possible to resolve the decay
    pub const ADCCLK: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(12);
}

/// Phase clock tick
pub mod tick {
    use crate::config;
    use fugit::Rate;
    use pulsedet::config::phase;

    /// Tick interrupt rate (TIM2 update), 10us resolution for the excitation waveform
    pub const FREQ: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::kHz(100);

    pub(super) const PERIODS_PER_SEC: u32 = FREQ.to_Hz() / phase::TOTAL_WIDTH as u32;

    pub(super) const TRIGGER: &str = if cfg!(feature = "threshold-trigger") {
        "threshold-armed (ADC1 analog watchdog)"
    } else {
        "fixed tick"
    };

    // the interrupt must have time to finish before the next tick
    const _: () = assert!(config::clk::SYSCLK_HZ / FREQ.to_Hz() >= 500);
}

/// ADC configuration
pub mod adc {
    use crate::config;
    use stm32f1xx_hal::adc::SampleTime;

    /// Sample at ADCCLK / (28.5 + 12.5) = 292kHz
    const SAMPLE_CYC_X10: u32 = 285;
    pub const SAMPLE: SampleTime = match SAMPLE_CYC_X10 {
        15 => SampleTime::T_1,
        75 => SampleTime::T_7,
        135 => SampleTime::T_13,
        285 => SampleTime::T_28,
        415 => SampleTime::T_41,
        555 => SampleTime::T_55,
        715 => SampleTime::T_71,
        2395 => SampleTime::T_239,
        _ => panic!("Invalid sample cycles"),
    };

    /// Conversion takes 12.5 cycles on top of the sample time
    pub(super) const SAMPLES_PER_SEC: u32 =
        config::clk::ADCCLK.to_Hz() * 10 / (SAMPLE_CYC_X10 + 125);

    /// Circular DMA buffer, split into the two halves `CircBuffer` wants
    pub const BUF_LEN: usize = pulsedet::config::sampler::BUFFER_CAPACITY;
    pub const HALF_BUF_LEN: usize = BUF_LEN / 2;
    const _: () = assert!(HALF_BUF_LEN * 2 == BUF_LEN);

    /// Analog watchdog fires when a conversion falls below this (threshold-armed trigger only)
    pub const WATCHDOG_LOW: u16 = pulsedet::config::window::INTEREST_THRESHOLD;

    // the whole buffer must take longer to fill than one excitation period, so a capture
    // index is never overwritten before the main loop reads the window behind it
    const _: () = assert!(
        BUF_LEN as u32 * config::tick::FREQ.to_Hz()
            >= SAMPLES_PER_SEC * pulsedet::config::phase::TOTAL_WIDTH as u32
    );
}

/// Detector selection
pub mod detector {
    use pulsedet::detector::DetectorKind;

    pub const KIND: DetectorKind = DetectorKind::DualWindow;
}

/// Tone output (TIM3 channel 1)
pub mod tone {
    use crate::config;

    /// Counter clock after the prescaler
    pub const TIMER_CLOCK_HZ: u32 = pulsedet::config::tone::TIMER_CLOCK_HZ;

    pub const PRESCALER: u32 = config::clk::APB1_TIMCLK.to_Hz() / TIMER_CLOCK_HZ;
    const _: () = assert!(PRESCALER * TIMER_CLOCK_HZ == config::clk::APB1_TIMCLK.to_Hz());
    const _: () = assert!(PRESCALER >= 1 && PRESCALER <= 1 << 16);
}
