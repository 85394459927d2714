use crate::config;
use crate::state::State;
use crate::terminal::Redraw;
use std::fmt::{self, Display};
use std::num::ParseIntError;

/// One telemetry packet: `DATA[s0 s1 ...] <extremum index> <start index> <metric>$`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub samples: Vec<u16>,
    pub extremum_index: usize,
    pub start_index: usize,
    pub metric: i32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    NotAPacket,
    Unterminated,
    MissingField(&'static str),
    TrailingField,
    InvalidInt(ParseIntError),
    IndexOutOfWindow { index: usize, len: usize },
}

impl From<ParseIntError> for ParseError {
    fn from(e: ParseIntError) -> Self {
        Self::InvalidInt(e)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAPacket => write!(f, "not a packet"),
            Self::Unterminated => write!(f, "packet is not terminated"),
            Self::MissingField(name) => write!(f, "missing {}", name),
            Self::TrailingField => write!(f, "unexpected field after metric"),
            Self::InvalidInt(e) => write!(f, "invalid number: {}", e),
            Self::IndexOutOfWindow { index, len } => {
                write!(f, "index {} outside window of {} samples", index, len)
            }
        }
    }
}

/// Parses the packet in `line`, ignoring anything before the `DATA[` prefix (e.g. a log level or
/// timestamp added by the probe runner).
pub fn parse_packet(line: &str) -> Result<Packet, ParseError> {
    let start = line
        .find(config::PACKET_START)
        .ok_or(ParseError::NotAPacket)?;
    let rest = &line[start + config::PACKET_START.len()..];

    let (samples, rest) = rest.split_once(']').ok_or(ParseError::Unterminated)?;
    let (fields, _) = rest
        .split_once(config::PACKET_END)
        .ok_or(ParseError::Unterminated)?;

    let samples = samples
        .split_ascii_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<u16>, _>>()?;

    let mut fields = fields.split_ascii_whitespace();
    let mut next = |name| fields.next().ok_or(ParseError::MissingField(name));
    let extremum_index = next("extremum index")?.parse()?;
    let start_index = next("start index")?.parse()?;
    let metric = next("metric")?.parse()?;
    if fields.next().is_some() {
        return Err(ParseError::TrailingField);
    }

    // no area of interest is sent as 0 0, which is in range for any non-empty window
    for index in [extremum_index, start_index] {
        if index != 0 && index >= samples.len() {
            return Err(ParseError::IndexOutOfWindow {
                index,
                len: samples.len(),
            });
        }
    }

    Ok(Packet {
        samples,
        extremum_index,
        start_index,
        metric,
    })
}

pub fn handle_line(state: &mut State, line: &str) -> Redraw {
    let line = line.trim_end_matches('\n');
    let line = line.trim_end_matches('\r');

    if line.trim().is_empty() {
        return Redraw::No;
    }

    match parse_packet(line) {
        Ok(packet) => {
            state.push_packet(&packet);
            Redraw::Yes
        }
        Err(ParseError::NotAPacket) => {
            state.push_log(line);
            Redraw::Yes
        }
        Err(e) => {
            state.push_log(line);
            state.push_log(&format!("Error: {}", e));
            Redraw::Yes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packet() {
        let packet = parse_packet("DATA[3800 3790 2010 2003] 3 1 -61$").unwrap();
        assert_eq!(
            packet,
            Packet {
                samples: vec![3800, 3790, 2010, 2003],
                extremum_index: 3,
                start_index: 1,
                metric: -61,
            }
        );
    }

    #[test]
    fn skips_runner_prefix() {
        let packet = parse_packet("0.250000 INFO  DATA[1 2 3] 0 0 7$\r").unwrap();
        assert_eq!(packet.samples, [1, 2, 3]);
        assert_eq!(packet.metric, 7);
    }

    #[test]
    fn rejects_malformed_packets() {
        assert_eq!(parse_packet("Finished init."), Err(ParseError::NotAPacket));
        assert_eq!(parse_packet("DATA[1 2 3"), Err(ParseError::Unterminated));
        assert_eq!(parse_packet("DATA[1 2 3] 0 0 7"), Err(ParseError::Unterminated));
        assert_eq!(
            parse_packet("DATA[1 2 3] 0 0$"),
            Err(ParseError::MissingField("metric"))
        );
        assert_eq!(
            parse_packet("DATA[1 2 3] 0 0 7 8$"),
            Err(ParseError::TrailingField)
        );
        assert_eq!(
            parse_packet("DATA[1 2 3] 3 0 7$"),
            Err(ParseError::IndexOutOfWindow { index: 3, len: 3 })
        );
        assert!(matches!(
            parse_packet("DATA[1 x 3] 0 0 7$"),
            Err(ParseError::InvalidInt(_))
        ));
        assert!(matches!(
            parse_packet("DATA[1 2 3] 0 0 -$"),
            Err(ParseError::InvalidInt(_))
        ));
    }

    #[test]
    fn other_lines_are_logged() {
        let mut state = State::default();
        assert!(matches!(handle_line(&mut state, "\r\n"), Redraw::No));
        handle_line(&mut state, "Finished init.\n");
        handle_line(&mut state, "DATA[1 2] 5 0 0$\n");
        handle_line(&mut state, "DATA[1 2] 1 0 9$\n");

        let logs: Vec<_> = state.logs().iter().map(String::as_str).collect();
        assert_eq!(
            logs,
            [
                "Finished init.",
                "DATA[1 2] 5 0 0$",
                "Error: index 5 outside window of 2 samples",
            ]
        );
        assert_eq!(state.packets(), 1);
        assert_eq!(state.latest_metric(), Some(9));
    }
}
