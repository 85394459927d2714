//! Locating the decay extremum inside a captured window.
//!
//! The window ending at a capture point contains the tail of the excitation pulse followed by the
//! start of the ring-down. The "area of interest" begins where the window first crosses a fixed
//! level, and the feature handed to the detectors is the extremum after that crossing:
//!
//! ```text
//! Polarity::Falling                      Polarity::Rising
//!
//! threshold --+----------------          threshold ------+------------
//!         ....|.                                  .....  |
//!        .    | .       ...                             .|       ...
//!   .....     |  .    ..                                 |.    ..
//!             |   ....   <- extremum (min)               | ....  <- extremum (max)
//!           start                                      start
//! ```
//!
//! Which of the two applies depends on the front end (pulse-on vs. ring-down capture), so it is a
//! configuration parameter rather than a constant.

/// Which way the signal crosses into the area of interest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Area starts at the first sample above the threshold, extremum is the minimum after it.
    Falling,
    /// Area starts at the first sample below the threshold, extremum is the maximum after it.
    Rising,
}

impl Polarity {
    /// How far a signed detector `metric` points the way a target moves the extremum, 0 if it
    /// points the other way.
    ///
    /// A target shortens the decay, pushing the extremum further past the threshold: down for
    /// `Falling`, up for `Rising`. Movement the other way is the background catching up after a
    /// target has left.
    pub fn toward_target(self, metric: i32) -> u32 {
        match self {
            Self::Falling if metric < 0 => metric.unsigned_abs(),
            Self::Rising if metric > 0 => metric.unsigned_abs(),
            _ => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AreaOfInterest {
    /// Index of the crossing sample
    pub start: usize,
    /// Index of the extremum
    pub extremum_index: usize,
    /// Value of the extremum
    pub extremum: u16,
}

/// Finds the area of interest in `window`.
///
/// Returns `None` if the window never crosses `threshold`, or crosses only on its last sample
/// (leaving nothing to search).
#[inline(never)]
pub fn locate_area(window: &[u16], threshold: u16, polarity: Polarity) -> Option<AreaOfInterest> {
    // Step 1: find the crossing
    let start = window.iter().position(|&sample| match polarity {
        Polarity::Falling => sample > threshold,
        Polarity::Rising => sample < threshold,
    })?;

    // Step 2: find the extremum after it (first occurrence wins on ties)
    let mut extremum_index = start + 1;
    let mut extremum = *window.get(extremum_index)?;
    for (i, &sample) in window.iter().enumerate().skip(start + 2) {
        let better = match polarity {
            Polarity::Falling => sample < extremum,
            Polarity::Rising => sample > extremum,
        };
        if better {
            extremum_index = i;
            extremum = sample;
        }
    }

    Some(AreaOfInterest {
        start,
        extremum_index,
        extremum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_finds_minimum_after_crossing() {
        // low values before the crossing must not count
        let window = [100, 3900, 3600, 2100, 1800, 2500, 1800, 3000];
        let area = locate_area(&window, 3500, Polarity::Falling).unwrap();
        assert_eq!(
            area,
            AreaOfInterest {
                start: 1,
                extremum_index: 4,
                extremum: 1800,
            }
        );
    }

    #[test]
    fn rising_finds_maximum_after_crossing() {
        let window = [4000, 4000, 200, 900, 1500, 1200, 4095];
        let area = locate_area(&window, 500, Polarity::Rising).unwrap();
        assert_eq!(area.start, 2);
        assert_eq!(area.extremum_index, 6);
        assert_eq!(area.extremum, 4095);
    }

    #[test]
    fn crossing_at_first_sample() {
        let window = [3800, 3800, 3800, 3800];
        let area = locate_area(&window, 3500, Polarity::Falling).unwrap();
        assert_eq!(area.start, 0);
        assert_eq!(area.extremum_index, 1);
        assert_eq!(area.extremum, 3800);
    }

    #[test]
    fn target_direction_follows_polarity() {
        assert_eq!(Polarity::Falling.toward_target(-61), 61);
        assert_eq!(Polarity::Falling.toward_target(141), 0);
        assert_eq!(Polarity::Rising.toward_target(141), 141);
        assert_eq!(Polarity::Rising.toward_target(-61), 0);
        assert_eq!(Polarity::Falling.toward_target(i32::MIN), 1 << 31);
        assert_eq!(Polarity::Rising.toward_target(0), 0);
    }

    #[test]
    fn no_area() {
        assert_eq!(locate_area(&[10, 20, 30], 3500, Polarity::Falling), None);
        assert_eq!(locate_area(&[10, 20, 3600], 3500, Polarity::Falling), None);
        assert_eq!(locate_area(&[], 3500, Polarity::Rising), None);
    }
}
