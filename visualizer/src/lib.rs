//! Live view of the detector's telemetry lines: the latest sample window with its area of
//! interest, the metric and decay slope over time, and everything else the firmware logged.
//! Packets can also be recorded to CSV.

pub mod config;
pub mod err;
pub mod export;
pub mod parse;
pub mod state;
pub mod terminal;
