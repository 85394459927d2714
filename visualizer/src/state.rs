use crate::config;
use crate::parse::Packet;
use std::collections::VecDeque;

#[derive(Default)]
pub struct State {
    window: Vec<(f64, f64)>,
    extremum: Option<(f64, f64)>,
    start: Option<(f64, f64)>,
    metrics: VecDeque<(f64, f64)>,
    slopes: VecDeque<(f64, f64)>,
    packets: u64,
    logs: VecDeque<String>,
}

impl State {
    /// Latest window, as `(index, code)`.
    pub fn window(&self) -> &[(f64, f64)] {
        &self.window
    }

    /// Extremum and start of the area of interest in the latest window, if it had one.
    pub fn markers(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.extremum.iter().chain(self.start.iter()).copied()
    }

    /// Metric history, as `(packet number, metric)`, oldest first.
    pub fn metrics(&self) -> &VecDeque<(f64, f64)> {
        &self.metrics
    }

    /// Decay slope from area start to extremum, in codes per sample, as `(packet number, slope)`.
    /// Packets without an area of interest have no slope.
    pub fn slopes(&self) -> &VecDeque<(f64, f64)> {
        &self.slopes
    }

    pub fn slope_bounds(&self) -> ([f64; 2], [f64; 2]) {
        bounds(&self.slopes)
    }

    pub fn latest_metric(&self) -> Option<i32> {
        // metrics are i32s, so the round trip is exact
        self.metrics.back().map(|&(_, m)| m as i32)
    }

    /// Bounds of the metric history chart: the packet numbers it covers, and the metric range
    /// (always including 0).
    pub fn metric_bounds(&self) -> ([f64; 2], [f64; 2]) {
        bounds(&self.metrics)
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn push_packet(&mut self, packet: &Packet) {
        // reuse the allocation, windows are almost always the same length
        self.window.clear();
        self.window.extend(
            packet
                .samples
                .iter()
                .enumerate()
                .map(|(i, &s)| (i as f64, f64::from(s))),
        );

        // 0 0 means the window had no area of interest
        let has_area = packet.extremum_index != 0 || packet.start_index != 0;
        let marker = |i: usize| (i as f64, f64::from(packet.samples[i]));
        self.extremum = has_area.then(|| marker(packet.extremum_index));
        self.start = has_area.then(|| marker(packet.start_index));

        let number = self.packets as f64;
        if let (Some((e, ev)), Some((s, sv))) = (self.extremum, self.start) {
            if e != s {
                let slope = (ev - sv) / (e - s);
                push_bounded(&mut self.slopes, config::SLOPE_HISTORY, (number, slope));
            }
        }
        push_bounded(
            &mut self.metrics,
            config::METRIC_HISTORY,
            (number, f64::from(packet.metric)),
        );
        self.packets += 1;
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    pub fn push_log(&mut self, log: &str) {
        let log = match log.char_indices().nth(config::MAX_LINE_LENGTH) {
            Some((end, _)) => &log[..end],
            None => log,
        };

        let string = if self.logs.len() >= config::SCROLLBACK_LINES {
            // Reuse existing string allocation
            match self.logs.pop_front() {
                Some(mut existing_string) => {
                    existing_string.clear();
                    existing_string.push_str(log);
                    existing_string
                }
                None => unreachable!("cannot be empty"),
            }
        } else {
            // Not full yet, allocate new string
            log.to_string()
        };
        self.logs.push_back(string);
    }
}

fn push_bounded(history: &mut VecDeque<(f64, f64)>, len: usize, point: (f64, f64)) {
    if history.len() >= len {
        history.pop_front();
    }
    history.push_back(point);
}

/// Chart bounds for a history: the packet numbers it covers, and the value range (always
/// including 0).
fn bounds(history: &VecDeque<(f64, f64)>) -> ([f64; 2], [f64; 2]) {
    let x = match (history.front(), history.back()) {
        (Some(&(first, _)), Some(&(last, _))) => [first, last.max(first + 1.)],
        _ => [0., 1.],
    };
    let y = history
        .iter()
        .fold([0f64, 0f64], |[lo, hi], &(_, v)| [lo.min(v), hi.max(v)]);
    let y = if y[0] == y[1] { [y[0] - 1., y[1] + 1.] } else { y };
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(samples: &[u16], extremum_index: usize, start_index: usize, metric: i32) -> Packet {
        Packet {
            samples: samples.to_vec(),
            extremum_index,
            start_index,
            metric,
        }
    }

    #[test]
    fn markers_follow_the_area_of_interest() {
        let mut state = State::default();

        state.push_packet(&packet(&[3800, 3400, 2000, 2500], 2, 1, -61));
        assert_eq!(state.window().len(), 4);
        let markers: Vec<_> = state.markers().collect();
        assert_eq!(markers, [(2., 2000.), (1., 3400.)]);

        state.push_packet(&packet(&[3800, 3800, 3800], 0, 0, 0));
        assert_eq!(state.window().len(), 3);
        assert_eq!(state.markers().count(), 0);
    }

    #[test]
    fn slope_from_start_to_extremum() {
        let mut state = State::default();
        state.push_packet(&packet(&[3800, 3400, 2000, 2500], 2, 1, -61));
        state.push_packet(&packet(&[3800, 3800, 3800], 0, 0, 0));
        state.push_packet(&packet(&[3800, 3600, 3000, 2000], 3, 0, -70));
        assert_eq!(
            state.slopes().iter().copied().collect::<Vec<_>>(),
            [(0., -1400.), (2., -600.)]
        );
        assert_eq!(state.slope_bounds(), ([0., 2.], [-1400., 0.]));

        for _ in 0..config::SLOPE_HISTORY {
            state.push_packet(&packet(&[3800, 2000], 1, 0, 0));
        }
        assert_eq!(state.slopes().len(), config::SLOPE_HISTORY);
        assert_eq!(state.slopes().back(), Some(&(102., -1800.)));
    }

    #[test]
    fn metric_history_is_bounded() {
        let mut state = State::default();
        for i in 0..config::METRIC_HISTORY + 10 {
            state.push_packet(&packet(&[1], 0, 0, i as i32));
        }
        assert_eq!(state.metrics().len(), config::METRIC_HISTORY);
        assert_eq!(state.metrics().front(), Some(&(10., 10.)));
        assert_eq!(state.latest_metric(), Some(config::METRIC_HISTORY as i32 + 9));

        let (x, y) = state.metric_bounds();
        assert_eq!(x, [10., (config::METRIC_HISTORY + 9) as f64]);
        assert_eq!(y, [0., (config::METRIC_HISTORY + 9) as f64]);
    }

    #[test]
    fn flat_metric_still_has_a_range() {
        let mut state = State::default();
        assert_eq!(state.metric_bounds(), ([0., 1.], [-1., 1.]));

        state.push_packet(&packet(&[1], 0, 0, 0));
        assert_eq!(state.metric_bounds(), ([0., 1.], [-1., 1.]));
    }

    #[test]
    fn logs_are_truncated_and_scroll() {
        let mut state = State::default();
        for i in 0..config::SCROLLBACK_LINES + 5 {
            state.push_log(&i.to_string());
        }
        assert_eq!(state.logs().len(), config::SCROLLBACK_LINES);
        assert_eq!(state.logs().front().map(String::as_str), Some("5"));

        state.push_log(&"x".repeat(config::MAX_LINE_LENGTH * 2));
        assert_eq!(
            state.logs().back().map(String::len),
            Some(config::MAX_LINE_LENGTH)
        );
    }
}
