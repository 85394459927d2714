//! The circular sample buffer and window extraction.
//!
//! The buffer is written by a sampler that runs independently of software (circular DMA on the
//! target, [`SampleRing`] in simulation). It is never locked: each slot is a single 16-bit word,
//! so a read returns either the old or the new code, both of which are valid samples. Only
//! recency matters, so a slot being overwritten while a window is copied out just means that
//! sample is one period newer than its neighbours.
//!
//! Software never follows the live write position for correctness. The position is sampled
//! once, inside the tick interrupt, into a [`CaptureEvent`](crate::phase::CaptureEvent), and
//! windows are extracted relative to that.

use crate::config::sampler::MAX_CODE;
use core::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

/// Read access to a circular buffer of raw sampler codes.
pub trait SampleSource {
    /// Number of slots in the ring.
    fn capacity(&self) -> usize;

    /// Reads slot `index`. `index` must be below [`capacity`](SampleSource::capacity).
    fn sample(&self, index: usize) -> u16;
}

/// Where the sampler will write next.
pub trait WriteCursor {
    /// Index of the slot the sampler writes next, in `0..capacity`.
    fn write_index(&self) -> usize;
}

impl<const N: usize> SampleSource for [u16; N] {
    fn capacity(&self) -> usize {
        N
    }

    fn sample(&self, index: usize) -> u16 {
        self[index]
    }
}

impl SampleSource for [u16] {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn sample(&self, index: usize) -> u16 {
        self[index]
    }
}

/// Copies the `out.len()` most recent samples ending just before `head_index` into `out`,
/// oldest first.
///
/// `head_index` is a write position, so the newest sample copied is the one at
/// `head_index - 1`. The start of the window wraps through the end of the ring:
///
/// ```text
/// capacity = 2048, head_index = 5, n = 42
///
/// |0 1 2 3 4|5 ....................... 2010|2011 ... 2047|
///  ^^^^^^^^^                                ^^^^^^^^^^^^^
///  newest                                   oldest
/// ```
///
/// Requires `out.len() <= source.capacity()`; the configuration constructors enforce this.
#[inline(never)]
pub fn extract_window<S>(source: &S, head_index: usize, out: &mut [u16])
where
    S: SampleSource + ?Sized,
{
    let capacity = source.capacity();
    let n = out.len();
    debug_assert!(n <= capacity);
    debug_assert!(head_index < capacity);

    let mut index = (head_index % capacity + capacity - n) % capacity;
    for slot in out.iter_mut() {
        *slot = source.sample(index);
        index += 1;
        if index == capacity {
            index = 0;
        }
    }
}

/// Fixed-capacity ring written by a single producer, read concurrently by anyone.
///
/// This is the software stand-in for the DMA buffer: it lets the phase clock and the pipeline run
/// against a simulated sampler, with the same ordering guarantees the hardware gives.
pub struct SampleRing<const N: usize> {
    slots: [AtomicU16; N],
    head: AtomicUsize,
}

impl<const N: usize> SampleRing<N> {
    const NOT_EMPTY: () = assert!(N > 0, "sample ring needs at least one slot");

    /// Creates a ring with every slot holding `fill`.
    pub fn new(fill: u16) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NOT_EMPTY;
        let fill = fill.min(MAX_CODE);
        Self {
            slots: core::array::from_fn(|_| AtomicU16::new(fill)),
            head: AtomicUsize::new(0),
        }
    }

    /// Writes one sample at the head and advances it. Codes above the sampler range are clamped.
    ///
    /// Only one context may push.
    pub fn push(&self, code: u16) {
        let head = self.head.load(Ordering::Relaxed);
        self.slots[head].store(code.min(MAX_CODE), Ordering::Relaxed);
        let next = if head + 1 == N { 0 } else { head + 1 };
        self.head.store(next, Ordering::Release);
    }

    /// Overwrites every slot with `code`, without moving the head.
    pub fn fill(&self, code: u16) {
        let code = code.min(MAX_CODE);
        for slot in &self.slots {
            slot.store(code, Ordering::Relaxed);
        }
    }
}

impl<const N: usize> SampleSource for SampleRing<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn sample(&self, index: usize) -> u16 {
        self.slots[index].load(Ordering::Relaxed)
    }
}

impl<const N: usize> WriteCursor for SampleRing<N> {
    fn write_index(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp<const N: usize>() -> [u16; N] {
        let mut buf = [0; N];
        for (i, x) in buf.iter_mut().enumerate() {
            *x = i as u16;
        }
        buf
    }

    #[test]
    fn window_wraps_through_zero() {
        let buf = ramp::<2048>();
        let mut out = [0; 42];
        extract_window(&buf, 5, &mut out);

        assert_eq!(out[0], 2011);
        assert_eq!(out[36], 2047);
        assert_eq!(out[37], 0);
        assert_eq!(out[41], 4);
        assert!(out.windows(2).all(|w| w[1] == (w[0] + 1) % 2048));
    }

    #[test]
    fn window_without_wrap() {
        let buf = ramp::<64>();
        let mut out = [0; 8];
        extract_window(&buf, 20, &mut out);
        assert_eq!(out, [12, 13, 14, 15, 16, 17, 18, 19]);
    }

    #[test]
    fn window_ending_at_zero_is_the_tail() {
        let buf = ramp::<16>();
        let mut out = [0; 4];
        extract_window(&buf, 0, &mut out);
        assert_eq!(out, [12, 13, 14, 15]);
    }

    #[test]
    fn full_capacity_window_is_the_whole_ring_in_order() {
        let buf = ramp::<16>();
        let mut out = [0; 16];
        extract_window(&buf, 9, &mut out);
        assert_eq!(out[0], 9);
        assert_eq!(out[6], 15);
        assert_eq!(out[7], 0);
        assert_eq!(out[15], 8);
    }

    #[test]
    fn every_head_and_length_is_chronological() {
        let buf = ramp::<32>();
        let mut out = [0; 32];
        for head in 0..32 {
            for n in 1..=32 {
                let out = &mut out[..n];
                extract_window(&buf, head, out);
                let newest = (head + 31) % 32;
                assert_eq!(usize::from(out[n - 1]), newest, "head {} n {}", head, n);
                assert!(out.windows(2).all(|w| w[1] == (w[0] + 1) % 32));
            }
        }
    }

    #[test]
    fn slices_are_sources() {
        let buf = ramp::<8>();
        let slice: &[u16] = &buf;
        let mut out = [0; 3];
        extract_window(slice, 1, &mut out);
        assert_eq!(out, [6, 7, 0]);
    }

    #[test]
    fn ring_push_advances_and_wraps() {
        let ring = SampleRing::<4>::new(7);
        assert_eq!(ring.write_index(), 0);
        assert!((0..4).all(|i| ring.sample(i) == 7));

        for code in [1, 2, 3, 4, 5] {
            ring.push(code);
        }
        assert_eq!(ring.write_index(), 1);

        let mut out = [0; 4];
        extract_window(&ring, ring.write_index(), &mut out);
        assert_eq!(out, [2, 3, 4, 5]);
    }

    #[test]
    fn ring_clamps_to_sampler_range() {
        let ring = SampleRing::<2>::new(u16::MAX);
        assert_eq!(ring.sample(0), MAX_CODE);
        ring.push(5000);
        assert_eq!(ring.sample(0), MAX_CODE);
        ring.fill(12);
        assert_eq!(ring.sample(1), 12);
    }
}
