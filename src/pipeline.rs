//! The main-loop side of the sensing pipeline.
//!
//! [`Pipeline`] owns every piece of state that outlives a single cycle: the detector, the tone
//! driver, the window scratch buffer and the scheduling counters. The firmware holds exactly one
//! of these in its idle task, and calls [`Pipeline::process`] for every capture event it takes.
//!
//! One cycle:
//!
//! ```text
//! CaptureEvent ─► extract_window ─► locate_area ─► detector.update(extremum)
//!                                        │                    │
//!                                        └─ none: dropped     ▼
//!                                        │         DetectionResult ─► FeedbackDriver ─► tone
//!                                        ▼
//!                         telemetry, every `report_every` events
//! ```

use crate::area::{locate_area, AreaOfInterest};
use crate::buffer::{extract_window, SampleSource};
use crate::config::window::MAX_LEN;
use crate::config::{ConfigError, FeedbackConfig, PipelineConfig};
use crate::detector::{Detector, DetectorAlgorithm};
use crate::feedback::{FeedbackDriver, ToneCommand, ToneOutput};
use crate::phase::CaptureEvent;
use crate::report::{format_telemetry, StatusSnapshot, TelemetryLine};

/// Detector output for one cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DetectionResult {
    pub metric: i32,
    pub detected: bool,
}

/// Everything one cycle produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleOutcome {
    /// `None` if the window had no area of interest. The detector and the tone are then left
    /// untouched, and `result` and `tone` repeat the previous cycle's.
    pub area: Option<AreaOfInterest>,
    pub result: DetectionResult,
    pub tone: ToneCommand,
    /// Set once per report interval; [`Pipeline::telemetry`] and [`Pipeline::status`] then hold
    /// this cycle's report.
    pub report: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
    capacity: usize,
    detector: Detector,
    feedback: FeedbackDriver,
    scratch: [u16; MAX_LEN],
    seeded: bool,
    stabilizing: u32,
    since_report: u32,
    events: u32,
    dropped: u32,
    last: DetectionResult,
    telemetry: TelemetryLine,
}

impl Pipeline {
    /// Builds the pipeline for a sample buffer of `capacity` slots.
    pub fn new(
        config: PipelineConfig,
        feedback: FeedbackConfig,
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        let config = config.validate(capacity)?;
        Ok(Self {
            config,
            capacity,
            detector: Detector::new(
                config.detector,
                config.detection_threshold,
                config.polarity,
            ),
            feedback: FeedbackDriver::new(feedback),
            scratch: [0; MAX_LEN],
            seeded: false,
            stabilizing: config.stabilization_events,
            since_report: 0,
            events: 0,
            dropped: 0,
            last: DetectionResult {
                metric: 0,
                detected: false,
            },
            telemetry: TelemetryLine::new(),
        })
    }

    /// Runs one main-loop cycle for `event`.
    ///
    /// Every event counts towards stabilization and the report interval, including ones whose
    /// window has no area of interest.
    #[inline(never)]
    pub fn process<S, T>(&mut self, event: CaptureEvent, source: &S, tone: &mut T) -> CycleOutcome
    where
        S: SampleSource + ?Sized,
        T: ToneOutput,
    {
        debug_assert_eq!(source.capacity(), self.capacity);

        // Step 1: scheduling
        self.events = self.events.wrapping_add(1);
        let stabilizing = self.stabilizing > 0;
        if stabilizing {
            self.stabilizing -= 1;
            if self.stabilizing == 0 {
                info!("stabilized after {=u32} events", self.config.stabilization_events);
            }
        }

        // Step 2: pull the window ending at the captured position
        let head = usize::from(event.write_index) % self.capacity;
        let window = &mut self.scratch[..self.config.window_len];
        extract_window(source, head, window);

        // Step 3: find the feature
        let area = locate_area(window, self.config.interest_threshold, self.config.polarity);

        // Steps 4 and 5: detector and feedback
        let command = match area {
            Some(area) => self.detect(area, stabilizing, tone),
            None => {
                self.dropped = self.dropped.wrapping_add(1);
                trace!("no area of interest, dropped");
                self.feedback.last()
            }
        };

        // Step 6: throttled report
        self.since_report += 1;
        let report = self.since_report >= self.config.report_every;
        if report {
            self.since_report = 0;
            let window = &self.scratch[..self.config.window_len];
            if format_telemetry(window, area, self.last.metric, &mut self.telemetry).is_err() {
                warn!("telemetry line overflowed");
            }
        }

        CycleOutcome {
            area,
            result: self.last,
            tone: command,
            report,
        }
    }

    /// Feeds the extremum to the detector and drives the tone from the result.
    fn detect(
        &mut self,
        area: AreaOfInterest,
        stabilizing: bool,
        tone: &mut impl ToneOutput,
    ) -> ToneCommand {
        if !self.seeded {
            self.detector.init(area.extremum);
            self.seeded = true;
        }
        let metric = self.detector.update(area.extremum);

        // signed metrics only count in the direction a target moves the extremum
        let strength = if self.detector.is_signed() {
            self.config.polarity.toward_target(metric)
        } else {
            metric.unsigned_abs()
        };
        let trusted = !stabilizing && self.detector.is_warm();
        let result = DetectionResult {
            metric,
            detected: trusted && strength >= self.config.detection_threshold,
        };
        if result.detected != self.last.detected {
            debug!("detected: {=bool} (metric {=i32})", result.detected, metric);
        }
        self.last = result;

        if trusted {
            self.feedback.drive(strength, tone)
        } else {
            self.feedback.silence(tone);
            ToneCommand::SILENT
        }
    }

    /// Forces the tone off, e.g. before halting.
    pub fn silence(&mut self, tone: &mut impl ToneOutput) {
        self.feedback.silence(tone);
    }

    /// The most recently extracted window.
    pub fn window(&self) -> &[u16] {
        &self.scratch[..self.config.window_len]
    }

    /// The most recent telemetry line, empty until the first report.
    pub fn telemetry(&self) -> &str {
        self.telemetry.as_str()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            metric: self.last.metric,
            background: self.detector.background(),
            detected: self.last.detected,
            events: self.events,
        }
    }

    pub fn is_stabilizing(&self) -> bool {
        self.stabilizing > 0
    }

    /// Capture events processed, including dropped ones (wrapping).
    pub fn events(&self) -> u32 {
        self.events
    }

    /// Cycles dropped for lack of an area of interest (wrapping).
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn last_result(&self) -> DetectionResult {
        self.last
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}
