//! Audible feedback: mapping the detection metric onto a square-wave tone.
//!
//! The tone is produced by a PWM timer running from a fixed counter clock. Its frequency is set
//! through the auto-reload register (period is `auto_reload + 1` counter ticks) and the 50% duty
//! through the compare register:
//!
//! ```text
//!             auto_reload + 1 ticks
//!        |<------------------------->|
//!        +-------------+             +-------------+
//!        |             |             |             |
//!  ------+             +-------------+             +--
//!        |<----------->|
//!         compare ticks
//! ```
//!
//! A compare of 0 keeps the output low for the whole period, which is how silence is expressed.

use crate::config::FeedbackConfig;
use crate::math::{DivRound, Truncate};
use fugit::HertzU32;

/// What the tone generator is asked to play.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToneCommand {
    pub frequency: HertzU32,
    pub duty_percent: u8,
}

impl ToneCommand {
    pub const SILENT: Self = Self {
        frequency: HertzU32::from_raw(0),
        duty_percent: 0,
    };

    pub fn is_silent(&self) -> bool {
        self.duty_percent == 0
    }
}

/// Register values for a 16-bit PWM timer channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToneRegisters {
    pub auto_reload: u16,
    pub compare: u16,
}

impl ToneRegisters {
    pub const SILENT: Self = Self {
        auto_reload: u16::MAX,
        compare: 0,
    };
}

/// A tone-capable PWM output.
pub trait ToneOutput {
    /// Programs period and compare. Must be safe to call with unchanged values.
    fn apply(&mut self, registers: ToneRegisters);
}

/// Turns detection magnitudes into tone register writes.
pub struct FeedbackDriver {
    config: FeedbackConfig,
    last: ToneCommand,
}

impl FeedbackDriver {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            last: ToneCommand::SILENT,
        }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// The command most recently applied.
    pub fn last(&self) -> ToneCommand {
        self.last
    }

    /// Tone for a metric magnitude.
    ///
    /// Silent below the threshold; at or above it, `base + hz_per_count * magnitude`, clamped to
    /// the range the timer can represent.
    pub fn command_for(&self, magnitude: u32) -> ToneCommand {
        if magnitude < self.config.threshold() {
            return ToneCommand::SILENT;
        }

        let frequency = self
            .config
            .base()
            .to_Hz()
            .saturating_add(self.config.hz_per_count().saturating_mul(magnitude))
            .clamp(self.config.min().to_Hz(), self.config.max().to_Hz());

        ToneCommand {
            frequency: HertzU32::from_raw(frequency),
            duty_percent: 50,
        }
    }

    /// Register values for `command`.
    pub fn registers_for(&self, command: ToneCommand) -> ToneRegisters {
        let frequency = command.frequency.to_Hz();
        if command.is_silent() || frequency == 0 {
            return ToneRegisters::SILENT;
        }

        // Step 1: period in counter ticks, `FeedbackConfig` guarantees this is in 2..=65536
        let period = self
            .config
            .timer_clock()
            .to_Hz()
            .div_round(frequency)
            .clamp(2, 1 << 16);

        // Step 2: compare for the requested duty
        let auto_reload: u16 = (period - 1).truncate();
        let compare: u16 = (period * u32::from(command.duty_percent.min(100)) / 100).truncate();

        ToneRegisters {
            auto_reload,
            compare: compare.min(auto_reload),
        }
    }

    /// Maps `magnitude` to a tone and programs it into `out`.
    #[inline(never)]
    pub fn drive(&mut self, magnitude: u32, out: &mut impl ToneOutput) -> ToneCommand {
        let command = self.command_for(magnitude);
        out.apply(self.registers_for(command));

        if command.is_silent() != self.last.is_silent() {
            debug!("tone {=u32} Hz", command.frequency.to_Hz());
        }
        self.last = command;
        command
    }

    /// Forces the output silent.
    pub fn silence(&mut self, out: &mut impl ToneOutput) {
        out.apply(ToneRegisters::SILENT);
        self.last = ToneCommand::SILENT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        applied: Vec<ToneRegisters>,
    }

    impl ToneOutput for Recorder {
        fn apply(&mut self, registers: ToneRegisters) {
            self.applied.push(registers);
        }
    }

    fn driver(threshold: u32) -> FeedbackDriver {
        FeedbackDriver::new(
            FeedbackConfig::new(
                HertzU32::from_raw(1_000_000),
                HertzU32::from_raw(10),
                3,
                HertzU32::from_raw(4_000),
                threshold,
            )
            .unwrap(),
        )
    }

    #[test]
    fn below_threshold_is_silent() {
        let mut d = driver(50);
        let mut out = Recorder::default();
        for magnitude in [0, 1, 49] {
            assert_eq!(d.drive(magnitude, &mut out), ToneCommand::SILENT);
        }
        assert!(out.applied.iter().all(|&r| r == ToneRegisters::SILENT));
        assert_eq!(out.applied.len(), 3);
    }

    #[test]
    fn threshold_itself_sounds() {
        let d = driver(50);
        let command = d.command_for(50);
        assert_eq!(command.frequency.to_Hz(), 10 + 3 * 50);
        assert_eq!(command.duty_percent, 50);
        assert!(d.command_for(49).is_silent());
    }

    #[test]
    fn frequency_is_monotonic_and_bounded() {
        let d = driver(0);
        let mut previous = 0;
        for magnitude in (0..5_000).chain([u32::MAX / 2, u32::MAX]) {
            let frequency = d.command_for(magnitude).frequency.to_Hz();
            assert!(frequency >= previous, "not monotonic at {}", magnitude);
            assert!(frequency <= 4_000);
            previous = frequency;
        }
        assert_eq!(previous, 4_000);
    }

    #[test]
    fn low_frequencies_are_raised_to_what_the_timer_can_count() {
        let d = driver(0);
        // 10 Hz would need an auto-reload of 99_999
        assert_eq!(d.command_for(0).frequency.to_Hz(), 16);
        let registers = d.registers_for(d.command_for(0));
        assert_eq!(registers.auto_reload, 62_499);
        assert_eq!(registers.compare, 31_250);
    }

    #[test]
    fn registers_are_half_duty() {
        let d = driver(0);
        let registers = d.registers_for(ToneCommand {
            frequency: HertzU32::from_raw(1_000),
            duty_percent: 50,
        });
        assert_eq!(
            registers,
            ToneRegisters {
                auto_reload: 999,
                compare: 500,
            }
        );
        assert_eq!(d.registers_for(ToneCommand::SILENT), ToneRegisters::SILENT);
    }

    #[test]
    fn fastest_tone_still_toggles() {
        let d = FeedbackDriver::new(
            FeedbackConfig::new(
                HertzU32::from_raw(1_000),
                HertzU32::from_raw(10),
                1_000,
                HertzU32::from_raw(100_000),
                0,
            )
            .unwrap(),
        );
        let command = d.command_for(u32::MAX);
        assert_eq!(command.frequency.to_Hz(), 500);
        assert_eq!(
            d.registers_for(command),
            ToneRegisters {
                auto_reload: 1,
                compare: 1,
            }
        );
    }

    #[test]
    fn drive_is_idempotent() {
        let mut d = driver(50);
        let mut out = Recorder::default();
        let first = d.drive(200, &mut out);
        let second = d.drive(200, &mut out);
        assert_eq!(first, second);
        assert_eq!(out.applied[0], out.applied[1]);
        assert_eq!(d.last(), first);

        d.silence(&mut out);
        assert_eq!(d.last(), ToneCommand::SILENT);
        assert_eq!(out.applied.last(), Some(&ToneRegisters::SILENT));
    }
}
