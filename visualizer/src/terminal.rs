use crate::config;
use crate::state::State;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use std::collections::VecDeque;
use std::io::{self, Stdout};
use tui::backend::Backend;
use tui::buffer::Buffer;
use tui::layout::{Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::symbols::Marker;
use tui::text::Span;
use tui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Widget};
use tui::Terminal;

#[derive(Copy, Clone)]
pub enum Redraw {
    Yes,
    No,
}

/// Raw mode and the alternate screen, restored on drop (including when unwinding).
pub struct Screen<'a> {
    stdout: &'a Stdout,
}

impl<'a> Screen<'a> {
    pub fn enter(stdout: &'a Stdout) -> Result<Self, io::Error> {
        enable_raw_mode()?;
        // from here on, drop restores raw mode even if entering the alt screen fails
        let screen = Self { stdout };
        execute!(&*screen.stdout, EnterAlternateScreen)?;
        Ok(screen)
    }

    /// Leaves the alternate screen and raw mode, for exiting without unwinding to the guard.
    pub fn restore(stdout: &Stdout) {
        let _ = execute!(&*stdout, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

impl Drop for Screen<'_> {
    fn drop(&mut self) {
        Self::restore(self.stdout);
    }
}

fn title(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
}

fn bold(text: String) -> Span<'static> {
    Span::styled(text, Style::default().add_modifier(Modifier::BOLD))
}

fn axis(name: &str, [min, max]: [f64; 2]) -> Axis<'_> {
    Axis::default()
        .title(name)
        .style(Style::default().fg(Color::Gray))
        .labels(vec![bold(min.to_string()), bold(max.to_string())])
        .bounds([min, max])
}

pub fn draw(state: &State, terminal: &mut Terminal<impl Backend>) -> Result<(), io::Error> {
    terminal.draw(|f| {
        let size = f.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Ratio(2, 5),
                Constraint::Ratio(2, 5),
                Constraint::Ratio(1, 5),
            ])
            .split(size);

        // Step 1: latest window, with the area of interest marked
        let markers: Vec<_> = state.markers().collect();
        let window_len = state.window().len().max(2) as f64;
        let window = Chart::new(vec![
            Dataset::default()
                .name("samples")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Cyan))
                .data(state.window()),
            Dataset::default()
                .name("extremum, start")
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&markers),
        ])
        .block(
            Block::default()
                .title(title("Window"))
                .borders(Borders::ALL),
        )
        .x_axis(axis("sample", [0., window_len - 1.]))
        .y_axis(axis("code", [0., config::MAX_CODE]));
        f.render_widget(window, chunks[0]);

        // Step 2: metric and decay slope over time
        let history_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(2, 3), Constraint::Ratio(1, 3)])
            .split(chunks[1]);

        let metric_title = match state.latest_metric() {
            Some(m) => format!("Metric ({} after {} packets)", m, state.packets()),
            None => "Metric".to_string(),
        };
        let (x_bounds, y_bounds) = state.metric_bounds();
        let (front, back) = state.metrics().as_slices();
        let history = Chart::new(vec![
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(front),
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(back),
        ])
        .block(
            Block::default()
                .title(title(&metric_title))
                .borders(Borders::ALL),
        )
        .x_axis(axis("packet", x_bounds))
        .y_axis(axis("metric", y_bounds));
        f.render_widget(history, history_chunks[0]);

        let (x_bounds, y_bounds) = state.slope_bounds();
        let (front, back) = state.slopes().as_slices();
        let slope = Chart::new(vec![
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Magenta))
                .data(front),
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Magenta))
                .data(back),
        ])
        .block(
            Block::default()
                .title(title("Slope"))
                .borders(Borders::ALL),
        )
        .x_axis(axis("packet", x_bounds))
        .y_axis(axis("codes/sample", y_bounds));
        f.render_widget(slope, history_chunks[1]);

        // Step 3: everything else
        struct LogWidget<'a> {
            logs: &'a VecDeque<String>,
        }
        impl<'a> Widget for LogWidget<'a> {
            fn render(self, area: Rect, buf: &mut Buffer) {
                let block = Block::default().title(title("Log")).borders(Borders::ALL);

                let area = {
                    let a = block.inner(area);
                    block.render(area, buf);
                    a
                };

                for (i, log) in self
                    .logs
                    .iter()
                    .rev()
                    .take(area.height as usize)
                    .enumerate()
                {
                    buf.set_string(
                        area.left(),
                        area.bottom() - 1 - i as u16,
                        log,
                        Style::default(),
                    );
                }
            }
        }
        f.render_widget(LogWidget { logs: state.logs() }, chunks[2]);
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use tui::backend::TestBackend;

    fn contents(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol.as_str())
            .collect()
    }

    #[test]
    fn draws_every_pane() {
        let mut state = State::default();
        parse::handle_line(&mut state, "Finished init.");
        parse::handle_line(&mut state, "DATA[3800 3400 2000 2500] 2 1 -61$");

        let mut terminal = Terminal::new(TestBackend::new(80, 40)).unwrap();
        draw(&state, &mut terminal).unwrap();

        let screen = contents(&terminal);
        assert!(screen.contains("Window"));
        assert!(screen.contains("Metric (-61 after 1 packets)"));
        assert!(screen.contains("Slope"));
        assert!(screen.contains("Finished init."));
    }

    #[test]
    fn draws_before_any_packet() {
        let state = State::default();
        let mut terminal = Terminal::new(TestBackend::new(40, 20)).unwrap();
        draw(&state, &mut terminal).unwrap();
        assert!(contents(&terminal).contains("Log"));
    }
}
