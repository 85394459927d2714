#![no_main]
#![no_std]
#![allow(
    clippy::assertions_on_constants,
    clippy::let_and_return,
    clippy::let_unit_value,
    clippy::type_complexity
)]
#![warn(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::ptr_as_ptr
)]

use defmt_rtt as _; // global logger
use stm32f1xx_hal as _; // memory layout

use panic_probe as _; // panicking-behavior

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

mod config;
mod hal;
mod panic;

use hal::dma::DmaRing;
use hal::pins;
use pulsedet::phase::{CaptureSlot, PhaseClock};

#[cfg(not(feature = "threshold-trigger"))]
type Backend = pulsedet::phase::FixedTick;
#[cfg(feature = "threshold-trigger")]
type Backend = pulsedet::phase::ThresholdArmed<hal::awd::AnalogWatchdog>;

/// Everything the tick and comparator interrupts touch.
pub struct Sampler {
    clock: PhaseClock<pins::B12_EXCITE, Backend>,
    ring: DmaRing,
    slot: &'static CaptureSlot,
}

/// Fine timestamp for capture events: the low half of the cycle counter.
fn timestamp() -> u16 {
    use pulsedet::math::Truncate;
    cortex_m::peripheral::DWT::cycle_count().truncate()
}

#[rtic::app(
    device = stm32f1xx_hal::pac,
    peripherals = true
)]
mod app {
    use crate::config;
    use crate::hal::dma::DmaRing;
    use crate::hal::pins;
    use crate::hal::tone::ToneTimer;
    use crate::{Backend, Sampler};
    use cortex_m::singleton;
    use dwt_systick_monotonic::DwtSystick;
    use fugit::HertzU32;
    use pulsedet::config::{FeedbackConfig, PhaseConfig, PipelineConfig};
    use pulsedet::feedback::{ToneOutput, ToneRegisters};
    use pulsedet::phase::{CaptureSlot, PhaseClock};
    use pulsedet::pipeline::Pipeline;
    use stm32f1xx_hal::adc::{Adc, AdcDma, Continuous};
    use stm32f1xx_hal::device::{ADC1, TIM2};
    use stm32f1xx_hal::dma::{dma1, CircBuffer};
    use stm32f1xx_hal::gpio::PinState;
    use stm32f1xx_hal::prelude::*;
    use stm32f1xx_hal::timer::{CounterHz, Event};

    #[shared]
    struct Shared {
        #[lock_free]
        sampler: Sampler,
    }

    #[local]
    struct Local {
        tick_timer: CounterHz<TIM2>,
        adc1_dma_transfer: CircBuffer<
            [u16; config::adc::HALF_BUF_LEN],
            AdcDma<ADC1, pins::A0_ADC1C0, Continuous, dma1::C1>,
        >,
        ring: DmaRing,
        slot: &'static CaptureSlot,
        pipeline: Pipeline,
        tone_timer: ToneTimer,
        debug_led: pins::C13_DEBUG_LED,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("Dumping config...");

        config::dump_to_log();

        defmt::info!("Starting init...");

        let dma1 = cx.device.DMA1.split();
        let mut flash = cx.device.FLASH.constrain();
        let mut gpioa = cx.device.GPIOA.split();
        let mut gpiob = cx.device.GPIOB.split();
        let mut gpioc = cx.device.GPIOC.split();
        let rcc = cx.device.RCC.constrain();

        defmt::info!("Configuring clocks...");

        let clocks = rcc
            .cfgr
            .use_hse(config::clk::HSE_FREQ)
            .sysclk(config::clk::SYSCLK)
            .pclk1(config::clk::PCLK1)
            .pclk2(config::clk::PCLK2)
            .adcclk(config::clk::ADCCLK)
            .freeze(&mut flash.acr);

        assert!(config::clk::SYSCLK == clocks.sysclk());
        assert!(config::clk::PCLK1 == clocks.pclk1());
        assert!(config::clk::PCLK2 == clocks.pclk2());
        assert!(config::clk::ADCCLK == clocks.adcclk());

        defmt::info!("Configuring excitation output...");

        // low before anything else, the coil must never be left energized
        let excite: pins::B12_EXCITE = gpiob
            .pb12
            .into_push_pull_output_with_state(&mut gpiob.crh, PinState::Low);

        defmt::info!("Configuring tone timer...");

        let tone_pin: pins::A6_TIM3C1_TONE = gpioa.pa6.into_alternate_push_pull(&mut gpioa.crl);
        let mut tone_timer = ToneTimer::new(cx.device.TIM3, tone_pin);

        defmt::info!("Building pipeline...");

        let feedback = FeedbackConfig::new(
            HertzU32::from_raw(config::tone::TIMER_CLOCK_HZ),
            HertzU32::from_raw(pulsedet::config::tone::BASE_HZ),
            pulsedet::config::tone::HZ_PER_COUNT,
            HertzU32::from_raw(pulsedet::config::tone::MAX_HZ),
            pulsedet::config::detector::DETECTION_THRESHOLD,
        );
        let pipeline = feedback.and_then(|feedback| {
            let pipeline_config = PipelineConfig {
                detector: config::detector::KIND,
                ..PipelineConfig::DEFAULT
            };
            Pipeline::new(pipeline_config, feedback, config::adc::BUF_LEN)
        });
        let pipeline = match pipeline {
            Ok(pipeline) => pipeline,
            Err(e) => {
                // leave the hardware safe, then stop
                let mut excite = excite;
                excite.set_low();
                tone_timer.apply(ToneRegisters::SILENT);
                defmt::panic!("Invalid configuration: {}", e);
            }
        };

        defmt::info!("Configuring ADC1 DMA transfer...");

        let mut adc1 = Adc::adc1(cx.device.ADC1, clocks);
        adc1.set_sample_time(config::adc::SAMPLE);

        let adc1_ch0: pins::A0_ADC1C0 = gpioa.pa0.into_analog(&mut gpioa.crl);

        let adc1_dma = adc1.with_dma(adc1_ch0, dma1.1);

        defmt::info!("Configuring monotonic timer...");

        // also enables the cycle counter used for capture timestamps
        let mono = DwtMono::new(
            &mut cx.core.DCB,
            cx.core.DWT,
            cx.core.SYST,
            clocks.sysclk().to_Hz(),
        );

        defmt::info!("Configuring debug indicator LED...");

        let led: pins::C13_DEBUG_LED = gpioc
            .pc13
            .into_push_pull_output_with_state(&mut gpioc.crh, PinState::High);

        defmt::info!("Preparing buffers...");

        let adc_dma_buf = singleton!(
            : [[u16; config::adc::HALF_BUF_LEN]; 2] = [[0; config::adc::HALF_BUF_LEN]; 2]
        )
        .unwrap();

        let slot: &'static CaptureSlot = singleton!(: CaptureSlot = CaptureSlot::new()).unwrap();

        // NOTE(unsafe): the transfer below is never stopped, it lives in `idle`'s locals
        let ring = unsafe { DmaRing::new(&*adc_dma_buf) };

        defmt::info!("Starting ADC DMA transfer...");

        let adc1_dma_transfer = adc1_dma.circ_read(adc_dma_buf);

        defmt::info!("Configuring trigger...");

        #[cfg(not(feature = "threshold-trigger"))]
        let backend: Backend = pulsedet::phase::FixedTick::new(&PhaseConfig::DEFAULT);
        #[cfg(feature = "threshold-trigger")]
        let backend: Backend = pulsedet::phase::ThresholdArmed::new(
            crate::hal::awd::AnalogWatchdog::new(config::adc::WATCHDOG_LOW),
        );

        let sampler = Sampler {
            clock: PhaseClock::new(PhaseConfig::DEFAULT, excite, backend),
            ring,
            slot,
        };

        defmt::info!("Starting tick timer...");

        let mut tick_timer = cx.device.TIM2.counter_hz(&clocks);
        if let Err(e) = tick_timer.start(config::tick::FREQ) {
            defmt::panic!("Tick timer could not start: {}", defmt::Debug2Format(&e));
        }
        tick_timer.listen(Event::Update);

        defmt::info!("Finished init.");

        (
            Shared { sampler },
            Local {
                tick_timer,
                adc1_dma_transfer,
                ring,
                slot,
                pipeline,
                tone_timer,
                debug_led: led,
            },
            init::Monotonics(mono),
        )
    }

    // Task priorities
    //
    // Prio | Task       | Description
    //    3 | tick       | drives the excitation pin and latches capture events
    //    3 | comparator | latches capture events on the analog watchdog (threshold-trigger only)
    //    2 | DwtMono    | monotonic timer interrupt
    //    0 | idle       | main loop, runs the pipeline for each capture event

    /// This provides a monotonic timer, used to time pipeline cycles.
    #[monotonic(
        binds = SysTick,
        priority = 2,
        default = true
    )]
    type DwtMono = DwtSystick<{ config::clk::SYSCLK_HZ }>;

    /// This task advances the excitation period by one tick.
    ///
    /// It has the highest priority since jitter here is jitter in the excitation pulse and in the
    /// capture point.
    #[task(
        binds = TIM2,
        shared = [
            sampler,
        ],
        local = [
            tick_timer,
        ],
        priority = 3,
    )]
    fn tick(cx: tick::Context) {
        // taken first, so the delay to the actual tick is consistent
        let timestamp = crate::timestamp();

        cx.local.tick_timer.clear_interrupt(Event::Update);

        let Sampler { clock, ring, slot } = cx.shared.sampler;
        clock.tick(&*ring, slot, timestamp);
    }

    /// This task latches the capture event when the analog watchdog fires.
    #[cfg(feature = "threshold-trigger")]
    #[task(
        binds = ADC1_2,
        shared = [
            sampler,
        ],
        priority = 3,
    )]
    fn comparator(cx: comparator::Context) {
        let timestamp = crate::timestamp();

        let Sampler { clock, ring, slot } = cx.shared.sampler;
        if clock.backend().comparator().is_pending() {
            clock.comparator_fired(&*ring, slot, timestamp);
        }
    }

    /// The main loop: waits for a capture event and runs the pipeline on it.
    #[idle(
        local = [
            adc1_dma_transfer,
            ring,
            slot,
            pipeline,
            tone_timer,
            debug_led,
        ],
    )]
    fn idle(cx: idle::Context) -> ! {
        // owned here so the DMA transfer behind `ring` is never dropped
        let _transfer = cx.local.adc1_dma_transfer;
        let ring = cx.local.ring;
        let slot = cx.local.slot;
        let pipeline = cx.local.pipeline;
        let tone_timer = cx.local.tone_timer;
        let debug_led = cx.local.debug_led;

        loop {
            // Note that using `wfi` here breaks debugging,
            // so if desired we should only do that in release mode.
            let event = match slot.take() {
                Some(event) => event,
                None => continue,
            };

            let start = monotonics::now();

            if config::debug::LOG_ALL_EVENTS {
                defmt::println!("Capture event: {}", event);
            }

            let outcome = pipeline.process(event, &*ring, &mut *tone_timer);

            if config::debug::LOG_TIMING {
                defmt::println!("Cycle took {}us", (monotonics::now() - start).to_micros());
            }

            if outcome.report {
                defmt::println!("{=str}", pipeline.telemetry());

                if config::debug::LOG_STATUS {
                    defmt::println!(
                        "Status: {}, dropped {}, superseded {}",
                        pipeline.status(),
                        pipeline.dropped(),
                        slot.superseded()
                    );
                }

                debug_led.toggle();
            }
        }
    }
}
