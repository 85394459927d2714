use crate::config;
use crate::panic::OptionalExt;
use pulsedet::buffer::{SampleSource, WriteCursor};
use stm32f1xx_hal::pac::DMA1;

/// View of the circular ADC DMA buffer, while the transfer owns it.
///
/// The transfer writes each slot with a single halfword store, so a volatile read of any slot
/// always returns a complete sample. The write position comes from DMA1 channel 1's remaining
/// transfer count:
///
/// ```text
/// NDTR:   BUF_LEN  BUF_LEN-1  ...  1   (reload) BUF_LEN
/// next:   0        1          ...  BUF_LEN-1    0
/// ```
#[derive(Copy, Clone)]
pub struct DmaRing {
    base: *const u16,
}

// NOTE(unsafe): only performs reads, of memory the DMA transfer keeps alive forever
unsafe impl Send for DmaRing {}
unsafe impl Sync for DmaRing {}

impl DmaRing {
    /// # Safety
    ///
    /// `buf` must be the `'static` buffer of a circular DMA1 channel 1 transfer that is never
    /// stopped.
    pub unsafe fn new(buf: *const [[u16; config::adc::HALF_BUF_LEN]; 2]) -> Self {
        Self {
            base: buf.cast::<u16>(),
        }
    }
}

impl SampleSource for DmaRing {
    fn capacity(&self) -> usize {
        config::adc::BUF_LEN
    }

    fn sample(&self, index: usize) -> u16 {
        assert!(index < config::adc::BUF_LEN);
        // NOTE(unsafe): in bounds, and the buffer is 'static
        unsafe { self.base.add(index).read_volatile() }
    }
}

impl WriteCursor for DmaRing {
    fn write_index(&self) -> usize {
        // NOTE(unsafe): atomic read with no side effects
        let remaining = unsafe { (*DMA1::ptr()).ch1.ndtr.read().ndt().bits() };
        let len: u16 = config::adc::BUF_LEN.try_into().unwrap_infallible();
        usize::from(len - remaining.min(len)) % config::adc::BUF_LEN
    }
}
