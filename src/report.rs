//! Throttled telemetry and status output.
//!
//! Telemetry is a single ASCII line per report, meant for a log viewer (see the `visualizer`
//! crate), not a stable protocol:
//!
//! ```text
//! DATA[3800 3790 ... 2010 2003] 17 4 -61$
//!      ^^^^^^^^^^^^^^^^^^^^^^^  ^^ ^ ^^^
//!      window, oldest first     |  | metric
//!                               |  area of interest start
//!                               extremum index
//! ```
//!
//! Both indices are 0 when the window had no area of interest.

use crate::area::AreaOfInterest;
use crate::config::window::MAX_LEN;
use core::fmt::{self, Write};
use heapless::String;

/// Longest possible telemetry line: prefix, `MAX_LEN` 4-digit samples with separators, two
/// indices, an `i32` metric and the terminator.
pub const TELEMETRY_CAPACITY: usize = "DATA[".len() + MAX_LEN * 5 + "] ".len() + 2 * 6 + 11 + 1;

pub type TelemetryLine = String<TELEMETRY_CAPACITY>;

/// Formats one telemetry line into `out`, replacing its contents.
///
/// Fails only if `window` is longer than `window::MAX_LEN` or holds codes wider than 4 digits.
#[inline(never)]
pub fn format_telemetry(
    window: &[u16],
    area: Option<AreaOfInterest>,
    metric: i32,
    out: &mut TelemetryLine,
) -> fmt::Result {
    out.clear();

    out.write_str("DATA[")?;
    for (i, sample) in window.iter().enumerate() {
        if i != 0 {
            out.write_char(' ')?;
        }
        write!(out, "{}", sample)?;
    }

    let (extremum_index, start) = match area {
        Some(area) => (area.extremum_index, area.start),
        None => (0, 0),
    };
    write!(out, "] {} {} {}$", extremum_index, start, metric)
}

/// Everything shown on the status display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub metric: i32,
    pub background: i32,
    pub detected: bool,
    pub events: u32,
}

/// A two-line character display.
pub trait StatusDisplay {
    type Error;

    fn clear(&mut self) -> Result<(), Self::Error>;
    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Self::Error>;
    fn write_str(&mut self, s: &str) -> Result<(), Self::Error>;
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Redraws the display from `snapshot`:
///
/// ```text
/// metric:-61 bg:3797
/// DETECT #12500
/// ```
pub fn render_status<D: StatusDisplay>(
    display: &mut D,
    snapshot: &StatusSnapshot,
) -> Result<(), D::Error> {
    display.clear()?;

    display.set_cursor(0, 0)?;
    write_line(
        display,
        format_args!("metric:{} bg:{}", snapshot.metric, snapshot.background),
    )?;

    display.set_cursor(1, 0)?;
    let state = if snapshot.detected { "DETECT" } else { "----" };
    write_line(display, format_args!("{} #{}", state, snapshot.events))?;

    display.flush()
}

/// Streams formatted text straight into the display, without an intermediate buffer.
fn write_line<D: StatusDisplay>(display: &mut D, args: fmt::Arguments<'_>) -> Result<(), D::Error> {
    struct Adapter<'a, D: StatusDisplay> {
        display: &'a mut D,
        error: Option<D::Error>,
    }

    impl<D: StatusDisplay> Write for Adapter<'_, D> {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            D::write_str(self.display, s).map_err(|e| {
                self.error = Some(e);
                fmt::Error
            })
        }
    }

    let mut adapter = Adapter {
        display,
        error: None,
    };
    match adapter.write_fmt(args) {
        Ok(()) => Ok(()),
        Err(fmt::Error) => match adapter.error {
            Some(e) => Err(e),
            // formatting integers and strs cannot fail on its own
            None => Ok(()),
        },
    }
}
