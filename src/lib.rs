//! Sensing pipeline of a pulse-induction metal detector.
//!
//! The coil is excited once per period by [`phase::PhaseClock`], which runs from a fixed-rate
//! tick interrupt. At the decay-measurement point of each period it latches a
//! [`phase::CaptureEvent`] pointing into the free-running [`buffer::SampleSource`]. The main loop
//! takes that event, pulls the most recent window of samples out of the ring, locates the decay
//! extremum ([`area`]), feeds it through one of the adaptive [`detector`]s and drives the
//! audible [`feedback`] tone from the resulting metric. All of the main-loop state lives in
//! [`pipeline::Pipeline`].
//!
//! Nothing here touches a peripheral directly: the excitation pin is an `embedded-hal`
//! [`OutputPin`](embedded_hal::digital::v2::OutputPin), and the sampler, analog comparator and
//! tone timer are reached through the small traits in [`buffer`], [`phase`] and [`feedback`].
//!
//! ## Crate features
//!
//! - `defmt`: derive `defmt::Format` for public types and forward internal log messages to
//!   `defmt`. Without it, logging compiles to nothing.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::let_and_return, clippy::new_without_default)]
#![warn(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

// must come first, the logging macros are textually scoped
mod fmt;

pub mod area;
pub mod buffer;
pub mod config;
pub mod detector;
pub mod feedback;
pub mod math;
pub mod phase;
pub mod pipeline;
pub mod report;

pub use config::ConfigError;
