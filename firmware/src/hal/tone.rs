#![allow(unused_unsafe)]

use crate::config;
use crate::hal::pins;
use crate::panic::OptionalExt;
use pulsedet::feedback::{ToneOutput, ToneRegisters};
use stm32f1xx_hal::device::{RCC, TIM3};
use stm32f1xx_hal::rcc::{Enable, Reset};
use stm32f1xx_hal::timer::Ocm;

/// TIM3 channel 1 as a variable-frequency square wave.
///
/// The prescaler is fixed so the counter runs at `config::tone::TIMER_CLOCK_HZ`; frequency and
/// duty are then set directly through ARR and CCR1, both preloaded so a change only takes effect
/// at the next update event (no glitches mid-period).
pub struct ToneTimer {
    tim: TIM3,
    _pin: pins::A6_TIM3C1_TONE,
}

// modified from `OneshotTimer`, same register sequence with PWM mode 1 and no one-pulse mode
impl ToneTimer {
    pub fn new(tim: TIM3, pin: pins::A6_TIM3C1_TONE) -> Self {
        unsafe {
            //NOTE(unsafe) this reference will only be used for atomic writes with no side effects
            let rcc = &(*RCC::ptr());
            // Enable and reset the timer peripheral
            TIM3::enable(rcc);
            TIM3::reset(rcc);
        }

        let psc: u16 = (config::tone::PRESCALER - 1).try_into().unwrap_infallible();
        tim.psc.write(|w| unsafe { w.psc().bits(psc) });

        // 1 while CNT < CCR, 0 after
        let mode = Ocm::PwmMode1;
        tim.ccmr1_output().modify(|_, w| {
            w
                // enable preload on CCR
                .oc1pe()
                .set_bit()
                // set output control mode
                .oc1m()
                .bits(mode as _)
        });
        // start silent
        tim.ccr1.write(|w| unsafe { w.ccr().bits(ToneRegisters::SILENT.compare) });
        tim.ccer.modify(|_, w| w.cc1e().set_bit());

        // Enable preload for ARR
        tim.cr1.modify(|_, w| w.arpe().set_bit());
        tim.arr.write(|w| unsafe { w.arr().bits(ToneRegisters::SILENT.auto_reload) });

        // Trigger update event to load the registers
        // (also sets the URS bit to prevent an interrupt from being triggered by the UG bit)
        tim.cr1.modify(|_, w| w.urs().set_bit());
        tim.egr.write(|w| w.ug().set_bit());
        tim.cr1.modify(|_, w| w.urs().clear_bit());

        tim.cr1.modify(|_, w| w.cen().set_bit());

        Self { tim, _pin: pin }
    }
}

impl ToneOutput for ToneTimer {
    fn apply(&mut self, registers: ToneRegisters) {
        self.tim
            .arr
            .write(|w| unsafe { w.arr().bits(registers.auto_reload) });
        self.tim
            .ccr1
            .write(|w| unsafe { w.ccr().bits(registers.compare) });
    }
}
