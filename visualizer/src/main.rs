use crossterm::event;
use crossterm::event::{Event, KeyCode, KeyModifiers};
use std::env;
use std::fs::File;
use std::io::{self, BufRead};
use std::process::exit;
use std::thread;
use std::time::Duration;
use tui::backend::CrosstermBackend;
use tui::Terminal;
use visualizer::err::DebugFromDisplay;
use visualizer::export::CsvExport;
use visualizer::parse;
use visualizer::state::State;
use visualizer::terminal::{self, Redraw, Screen};

fn main() -> Result<(), DebugFromDisplay<io::Error>> {
    if atty::is(atty::Stream::Stdin) {
        eprintln!("Input must be piped into stdin, e.g.:");
        eprintln!();
        eprintln!("    (cd firmware && cargo run --release) | cargo run -p visualizer [-- <out.csv>]");
        eprintln!();
        eprintln!("Telemetry lines look like:");
        eprintln!("    DATA[<sample> ...] <extremum index> <start index> <metric>$");
        eprintln!("Every other line is shown in the log pane.");
        eprintln!("If a path is given, every packet's window is also recorded there as CSV.");
        return Ok(());
    }

    let mut export = match env::args_os().nth(1) {
        Some(path) => Some(CsvExport::new(File::create(path)?)?),
        None => None,
    };

    let stdout = io::stdout();
    let mut stdin = io::stdin().lock();

    let mut terminal = Terminal::new(CrosstermBackend::new(&stdout))?;

    thread::scope(|s| {
        // spawn a background thread to handle user input (for exiting)
        s.spawn(|| {
            fn run() -> Result<(), io::Error> {
                loop {
                    if event::poll(Duration::from_secs(365 * 86400))? {
                        if let Event::Key(key) = event::read()? {
                            let ctrl_c = key.modifiers == KeyModifiers::CONTROL
                                && key.code == KeyCode::Char('c');
                            let q = key.modifiers == KeyModifiers::NONE
                                && key.code == KeyCode::Char('q');
                            if ctrl_c || q {
                                return Ok(());
                            }
                        }
                    }
                }
            }

            let status = match run() {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Failed to run input thread: {:?}", e);
                    1
                }
            };

            // `exit` skips destructors, so restore the terminal here
            Screen::restore(&stdout);
            exit(status);
        });

        let mut state = State::default();
        let mut line = String::new();

        // Wait for first line of input before we switch to the alt screen.
        // This helps in situations like `cargo run firmware | cargo run visualizer`,
        // where the firmware is still building (and hence writing to the screen),
        // so it doesn't stomp on the graph.
        if stdin.read_line(&mut line)? == 0 {
            // input stream closed
            return Ok(());
        }

        // We've seen our first line of input--switch to the alt screen and start rendering.
        let _screen = Screen::enter(&stdout)?;
        terminal.hide_cursor()?;

        loop {
            // Parse line
            let packets = state.packets();
            let redraw = parse::handle_line(&mut state, &line);

            // Record new packets
            if let Some(export) = &mut export {
                if state.packets() != packets {
                    export.record(&state)?;
                }
            }

            // Redraw if requested
            match redraw {
                Redraw::No => {}
                Redraw::Yes => terminal::draw(&state, &mut terminal)?,
            }

            // Read next line
            line.clear();
            if stdin.read_line(&mut line)? == 0 {
                // input stream closed
                return Ok(());
            }
        }
    })
}
