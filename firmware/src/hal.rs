//! Extensions to the `stm32f1xx-hal` Hardware Abstraction Layer.

#[cfg(feature = "threshold-trigger")]
pub mod awd;
pub mod dma;
pub mod tone;

#[allow(non_camel_case_types)]
pub mod pins {
    use stm32f1xx_hal::gpio::{Alternate, Analog, Output, Pin, PushPull};

    /// Sense coil, after the front-end amplifier
    pub type A0_ADC1C0 = Pin<'A', 0, Analog>;

    /// Tone output to the piezo / speaker driver
    pub type A6_TIM3C1_TONE = Pin<'A', 6, Alternate<PushPull>>;

    /// Coil excitation (gate of the driver MOSFET)
    pub type B12_EXCITE = Pin<'B', 12, Output<PushPull>>;

    /// Debug LED output
    pub type C13_DEBUG_LED = Pin<'C', 13, Output<PushPull>>;
}
