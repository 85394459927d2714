use crate::state::State;
use std::io::{self, Write};

/// Records every packet's window as CSV rows of `packet,index,code,metric`.
pub struct CsvExport<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvExport<W> {
    pub fn new(writer: W) -> Result<Self, io::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["packet", "index", "code", "metric"])?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Appends the latest packet in `state`, if there is one.
    pub fn record(&mut self, state: &State) -> Result<(), io::Error> {
        let (packet, metric) = match (state.packets().checked_sub(1), state.latest_metric()) {
            (Some(packet), Some(metric)) => (packet.to_string(), metric.to_string()),
            _ => return Ok(()),
        };

        for &(index, code) in state.window() {
            // both are small non-negative integers, so the casts are exact
            let index = (index as usize).to_string();
            let code = (code as u16).to_string();
            self.writer.write_record([
                packet.as_str(),
                index.as_str(),
                code.as_str(),
                metric.as_str(),
            ])?;
        }

        // `exit` skips destructors, so nothing may stay buffered
        self.writer.flush()
    }

    pub fn into_inner(self) -> Result<W, io::Error> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}
