//! Excitation phase clock and the capture handoff to the main loop.
//!
//! [`PhaseClock::tick`] runs inside the highest-priority tick interrupt. Per period it:
//!
//! ```text
//! tick:    0            excite_width   trigger_offset            total_width
//!          |                 |               |                        |
//! excite:  |‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾|_______________________________________ |‾‾‾‾
//! capture:                                   ^ (fixed-tick backend)
//!                                 <~~~~ anywhere here ~~~~> (threshold-armed backend)
//! ```
//!
//! Only bounded, constant-time work happens here: one pin write, a few comparisons, and at most
//! one atomic store into the [`CaptureSlot`]. The detectors and the tone driver never run in
//! this context.

use crate::buffer::WriteCursor;
use crate::config::PhaseConfig;
use crate::math::Truncate;
use core::convert::Infallible;
use core::sync::atomic::{AtomicU32, Ordering};
use embedded_hal::digital::v2::OutputPin;

/// A latched sampling reference: where the sampler was, and when, at the measurement point.
///
/// Validity is carried by the [`CaptureSlot`] it travels through, not by the event itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureEvent {
    /// Sampler write position when the event was latched
    pub write_index: u16,
    /// Free-running fine timer (e.g. cycle counter) when the event was latched
    pub phase_timestamp: u16,
}

// Packed layout of a `CaptureSlot`:
//
// | 31    | 30 .. 16    | 15 .. 0         |
// | valid | write_index | phase_timestamp |
const VALID: u32 = 1 << 31;
const INDEX_SHIFT: u32 = 16;
const INDEX_MASK: u32 = 0x7fff;

impl CaptureEvent {
    fn pack(self) -> u32 {
        debug_assert!(u32::from(self.write_index) <= INDEX_MASK);
        VALID
            | ((u32::from(self.write_index) & INDEX_MASK) << INDEX_SHIFT)
            | u32::from(self.phase_timestamp)
    }

    fn unpack(packed: u32) -> Option<Self> {
        if packed & VALID == 0 {
            return None;
        }
        Some(Self {
            write_index: ((packed >> INDEX_SHIFT) & INDEX_MASK).truncate(),
            phase_timestamp: (packed & 0xffff).truncate(),
        })
    }
}

/// Single-entry mailbox between the tick interrupt and the main loop.
///
/// The whole event, validity included, is one `u32`, so publishing and taking are each a single
/// atomic operation and the consumer can never see an index without its flag or a timestamp from
/// a different period. A new event replaces a pending one; events are never queued.
pub struct CaptureSlot {
    packed: AtomicU32,
    superseded: AtomicU32,
}

impl CaptureSlot {
    pub const fn new() -> Self {
        Self {
            packed: AtomicU32::new(0),
            superseded: AtomicU32::new(0),
        }
    }

    /// Publishes `event`, replacing any event that was not taken yet.
    ///
    /// Returns `true` if a pending event was replaced.
    pub fn publish(&self, event: CaptureEvent) -> bool {
        let previous = self.packed.swap(event.pack(), Ordering::AcqRel);
        let superseded = previous & VALID != 0;
        if superseded {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        superseded
    }

    /// Takes the pending event, leaving the slot empty.
    pub fn take(&self) -> Option<CaptureEvent> {
        CaptureEvent::unpack(self.packed.swap(0, Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.packed.load(Ordering::Acquire) & VALID != 0
    }

    /// Number of events that were replaced before the main loop took them.
    pub fn superseded(&self) -> u32 {
        self.superseded.load(Ordering::Relaxed)
    }
}

/// An amplitude comparator that fires its own interrupt when the sampled signal crosses a level
/// (e.g. an ADC analog watchdog).
pub trait Comparator {
    fn arm(&mut self);
    fn disarm(&mut self);
}

/// Decides when in the period a capture event is latched.
pub trait TriggerBackend {
    /// Start of a period (tick 0).
    fn arm(&mut self);

    /// Whether the capture should be latched on `tick`, checked every tick until the period's
    /// capture has happened.
    fn due(&mut self, tick: u16) -> bool;

    /// The period's capture has been latched.
    fn fired(&mut self);
}

/// Latches at a configured tick. Deterministic, but blind to the signal amplitude.
pub struct FixedTick {
    trigger_offset: u16,
}

impl FixedTick {
    pub fn new(config: &PhaseConfig) -> Self {
        Self {
            trigger_offset: config.trigger_offset(),
        }
    }
}

impl TriggerBackend for FixedTick {
    fn arm(&mut self) {}

    fn due(&mut self, tick: u16) -> bool {
        tick == self.trigger_offset
    }

    fn fired(&mut self) {}
}

/// Latches when a [`Comparator`] fires, see [`PhaseClock::comparator_fired`].
///
/// The comparator is armed at tick 0 and disarmed as soon as it fires, so it raises at most one
/// interrupt per period.
pub struct ThresholdArmed<C> {
    comparator: C,
}

impl<C: Comparator> ThresholdArmed<C> {
    pub fn new(mut comparator: C) -> Self {
        comparator.disarm();
        Self { comparator }
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }
}

impl<C: Comparator> TriggerBackend for ThresholdArmed<C> {
    fn arm(&mut self) {
        self.comparator.arm();
    }

    fn due(&mut self, _tick: u16) -> bool {
        false
    }

    fn fired(&mut self) {
        self.comparator.disarm();
    }
}

/// Tick-driven excitation state machine.
pub struct PhaseClock<P, B> {
    config: PhaseConfig,
    excite: P,
    backend: B,
    tick: u16,
    captured: bool,
    periods: u32,
}

impl<P, B> PhaseClock<P, B>
where
    P: OutputPin<Error = Infallible>,
    B: TriggerBackend,
{
    /// Takes ownership of the excitation output and drives it low until the first tick.
    pub fn new(config: PhaseConfig, mut excite: P, backend: B) -> Self {
        infallible(excite.set_low());
        Self {
            config,
            excite,
            backend,
            tick: 0,
            captured: false,
            periods: 0,
        }
    }

    /// Advances one tick. Call from the tick interrupt.
    ///
    /// `timestamp` is a fine-grained timer reading taken at the start of the interrupt.
    #[inline]
    pub fn tick(&mut self, cursor: &impl WriteCursor, slot: &CaptureSlot, timestamp: u16) {
        if self.tick == 0 {
            infallible(self.excite.set_high());
            self.captured = false;
            self.backend.arm();
        }

        if self.tick == self.config.excite_width() {
            infallible(self.excite.set_low());
        }

        if !self.captured && self.backend.due(self.tick) {
            self.latch(cursor, slot, timestamp);
        }

        self.tick += 1;
        if self.tick == self.config.total_width() {
            self.tick = 0;
            self.periods = self.periods.wrapping_add(1);
        }
    }

    /// Comparator interrupt entry point for the [`ThresholdArmed`] backend.
    ///
    /// A second firing within the same period is ignored.
    pub fn comparator_fired(&mut self, cursor: &impl WriteCursor, slot: &CaptureSlot, timestamp: u16) {
        if !self.captured {
            self.latch(cursor, slot, timestamp);
        } else {
            self.backend.fired();
        }
    }

    fn latch(&mut self, cursor: &impl WriteCursor, slot: &CaptureSlot, timestamp: u16) {
        let event = CaptureEvent {
            write_index: cursor.write_index().truncate(),
            phase_timestamp: timestamp,
        };
        self.captured = true;
        self.backend.fired();
        slot.publish(event);
    }

    /// Current tick, in `0..total_width`.
    pub fn current_tick(&self) -> u16 {
        self.tick
    }

    /// Completed excitation periods (wrapping).
    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Forces the excitation output low and gives back the pin and backend.
    pub fn release(mut self) -> (P, B) {
        infallible(self.excite.set_low());
        (self.excite, self.backend)
    }
}

fn infallible(result: Result<(), Infallible>) {
    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Pin<'a>(&'a Cell<bool>);

    impl OutputPin for Pin<'_> {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    struct Cursor(Cell<usize>);

    impl WriteCursor for Cursor {
        fn write_index(&self) -> usize {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct Watchdog {
        armed: bool,
        arms: u32,
    }

    impl Comparator for &mut Watchdog {
        fn arm(&mut self) {
            self.armed = true;
            self.arms += 1;
        }

        fn disarm(&mut self) {
            self.armed = false;
        }
    }

    fn config() -> PhaseConfig {
        PhaseConfig::new(3, 5, 10).unwrap()
    }

    #[test]
    fn excitation_waveform() {
        let level = Cell::new(true);
        let mut clock = PhaseClock::new(config(), Pin(&level), FixedTick::new(&config()));
        assert!(!level.get());

        let cursor = Cursor(Cell::new(0));
        let slot = CaptureSlot::new();
        let mut trace = [false; 20];
        for (t, x) in trace.iter_mut().enumerate() {
            clock.tick(&cursor, &slot, t as u16);
            *x = level.get();
        }

        let high = [true, true, true, false, false, false, false, false, false, false];
        assert_eq!(trace[..10], high);
        assert_eq!(trace[10..], high);
        assert_eq!(clock.periods(), 2);
        assert_eq!(clock.current_tick(), 0);
    }

    #[test]
    fn fixed_tick_latches_once_per_period() {
        let level = Cell::new(false);
        let mut clock = PhaseClock::new(config(), Pin(&level), FixedTick::new(&config()));
        let cursor = Cursor(Cell::new(0));
        let slot = CaptureSlot::new();

        for t in 0..5 {
            cursor.0.set(100 + t);
            clock.tick(&cursor, &slot, 7);
            assert!(!slot.is_pending());
        }

        // tick 5 is the trigger offset
        cursor.0.set(105);
        clock.tick(&cursor, &slot, 42);
        assert_eq!(
            slot.take(),
            Some(CaptureEvent {
                write_index: 105,
                phase_timestamp: 42,
            })
        );

        for _ in 6..10 {
            clock.tick(&cursor, &slot, 0);
        }
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn unconsumed_event_is_superseded() {
        let level = Cell::new(false);
        let mut clock = PhaseClock::new(config(), Pin(&level), FixedTick::new(&config()));
        let cursor = Cursor(Cell::new(0));
        let slot = CaptureSlot::new();

        for t in 0..30 {
            cursor.0.set(t);
            clock.tick(&cursor, &slot, 0);
        }

        // three periods latched at ticks 5, 15, 25; only the last one survives
        assert_eq!(slot.superseded(), 2);
        assert_eq!(slot.take().map(|e| e.write_index), Some(25));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn threshold_armed_fires_at_most_once_per_period() {
        let level = Cell::new(false);
        let mut watchdog = Watchdog::default();
        let cursor = Cursor(Cell::new(0));
        let slot = CaptureSlot::new();
        {
            let mut clock =
                PhaseClock::new(config(), Pin(&level), ThresholdArmed::new(&mut watchdog));

            // nothing latches on ticks alone
            for _ in 0..10 {
                clock.tick(&cursor, &slot, 0);
            }
            assert!(!slot.is_pending());

            clock.tick(&cursor, &slot, 0);
            cursor.0.set(1234);
            clock.comparator_fired(&cursor, &slot, 99);
            cursor.0.set(1300);
            clock.comparator_fired(&cursor, &slot, 100);

            assert_eq!(
                slot.take(),
                Some(CaptureEvent {
                    write_index: 1234,
                    phase_timestamp: 99,
                })
            );
            assert_eq!(slot.superseded(), 0);
            let (_, backend) = clock.release();
            assert!(!backend.comparator().armed);
        }
        assert_eq!(watchdog.arms, 2);
    }

    #[test]
    fn threshold_armed_rearms_at_period_start() {
        let level = Cell::new(false);
        let mut watchdog = Watchdog::default();
        let cursor = Cursor(Cell::new(0));
        let slot = CaptureSlot::new();
        let mut clock = PhaseClock::new(config(), Pin(&level), ThresholdArmed::new(&mut watchdog));

        clock.tick(&cursor, &slot, 0);
        assert!(clock.backend().comparator().armed);
        clock.comparator_fired(&cursor, &slot, 0);
        assert!(!clock.backend().comparator().armed);

        for _ in 1..10 {
            clock.tick(&cursor, &slot, 0);
            assert!(!clock.backend().comparator().armed);
        }
        clock.tick(&cursor, &slot, 0);
        assert!(clock.backend().comparator().armed);
    }

    #[test]
    fn packing_keeps_every_field() {
        let slot = CaptureSlot::new();
        let event = CaptureEvent {
            write_index: 0x7fff,
            phase_timestamp: 0xffff,
        };
        assert!(!slot.publish(event));
        assert!(slot.is_pending());
        assert_eq!(slot.take(), Some(event));
        assert!(!slot.is_pending());

        let zero = CaptureEvent {
            write_index: 0,
            phase_timestamp: 0,
        };
        slot.publish(zero);
        assert_eq!(slot.take(), Some(zero));
    }
}
