/// Log lines kept for the bottom pane
pub const SCROLLBACK_LINES: usize = 100;

/// Longer log lines are cut, nothing is wrapped
pub const MAX_LINE_LENGTH: usize = 200;

/// Metric values kept for the history chart (at 250 events per report, ~2 minutes)
pub const METRIC_HISTORY: usize = 1000;

/// Decay slopes kept for the slope chart
pub const SLOPE_HISTORY: usize = 100;

/// Full scale of the sampler, for the window chart's y axis
pub const MAX_CODE: f64 = 4095.;

/// Start of a telemetry packet, anywhere on the line
pub const PACKET_START: &str = "DATA[";

/// End of a telemetry packet
pub const PACKET_END: char = '$';
