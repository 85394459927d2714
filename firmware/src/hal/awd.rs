#![allow(unused_unsafe)]

use pulsedet::config::sampler::MAX_CODE;
use pulsedet::phase::Comparator;
use stm32f1xx_hal::pac::{adc1, ADC1};

/// ADC1 analog watchdog on the regular channel, as a capture trigger.
///
/// Fires the `ADC1_2` interrupt when a conversion lands below `low`. The ADC itself stays owned
/// by the DMA transfer; only the watchdog bits of CR1, SR, HTR and LTR are touched here.
pub struct AnalogWatchdog {
    _private: (),
}

impl AnalogWatchdog {
    /// Configures the watchdog on channel 0, disarmed.
    pub fn new(low: u16) -> Self {
        let adc = regs();
        adc.ltr.write(|w| unsafe { w.lt().bits(low.min(MAX_CODE)) });
        adc.htr.write(|w| unsafe { w.ht().bits(MAX_CODE) });
        adc.cr1.modify(|_, w| unsafe {
            w
                // guard one channel only
                .awdsgl()
                .set_bit()
                .awdch()
                .bits(0)
                // on regular conversions
                .awden()
                .set_bit()
                // but don't interrupt until armed
                .awdie()
                .clear_bit()
        });
        adc.sr.modify(|_, w| w.awd().clear_bit());

        Self { _private: () }
    }

    /// Whether the watchdog flag is set. Call from the `ADC1_2` interrupt.
    pub fn is_pending(&self) -> bool {
        regs().sr.read().awd().bit_is_set()
    }
}

impl Comparator for AnalogWatchdog {
    fn arm(&mut self) {
        let adc = regs();
        // a stale flag would fire immediately
        adc.sr.modify(|_, w| w.awd().clear_bit());
        adc.cr1.modify(|_, w| w.awdie().set_bit());
    }

    fn disarm(&mut self) {
        let adc = regs();
        adc.cr1.modify(|_, w| w.awdie().clear_bit());
        adc.sr.modify(|_, w| w.awd().clear_bit());
    }
}

fn regs() -> &'static adc1::RegisterBlock {
    // NOTE(unsafe): read-modify-write of watchdog bits only, from tasks of a single priority
    unsafe { &*ADC1::ptr() }
}
