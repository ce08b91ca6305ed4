// SPDX-License-Identifier: MIT
//
// cellbox: interactive event viewer.
//
// Takes over the terminal, then shows every decoded event alongside the
// current input and output modes and a palette strip for the output mode.
//
//   F1  toggle ESC / ALT handling of the Escape byte
//   F2  toggle mouse reporting
//   F3  cycle output mode (normal, 256, 216, grayscale)
//   F4  clear the event log
//   q / Ctrl+Q  quit
//
// Logs go to a file (never to the terminal being drawn on). Set
// `CELLBOX_LOG` to a tracing filter such as `debug` for more detail.

use std::collections::VecDeque;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cellbox_term::{
    Attrs, ColorAttr, Config, Error, Event, InputMode, Key, KeyCode, KeyEvent, Modifiers,
    OutputMode, Session,
};

/// How many events the log keeps.
const LOG_LINES: usize = 200;

/// Rows above the event log.
const HEADER_ROWS: u16 = 5;

// ─── Arguments ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    log: Option<PathBuf>,
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--log" => {
                let path = iter.next().context("--log needs a path")?;
                args.log = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(Some(args))
}

fn print_help() {
    println!("cellbox {}", env!("CARGO_PKG_VERSION"));
    println!("Interactive terminal event viewer");
    println!();
    println!("USAGE:");
    println!("    cellbox [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Load session settings from a TOML file");
    println!("        --log <PATH>       Log file (default: cellbox.log in the temp dir)");
    println!("    -h, --help             Print help information");
}

// ─── Logging ────────────────────────────────────────────────────────────────

fn init_logging(path: Option<PathBuf>) {
    let path = path.unwrap_or_else(|| env::temp_dir().join("cellbox.log"));
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_env("CELLBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ─── Viewer ─────────────────────────────────────────────────────────────────

struct Viewer {
    events: VecDeque<String>,
    status: String,
}

impl Viewer {
    fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(LOG_LINES),
            status: String::from("ready"),
        }
    }

    fn record(&mut self, line: String) {
        if self.events.len() == LOG_LINES {
            self.events.pop_back();
        }
        self.events.push_front(line);
    }

    /// Handle one event. Returns `false` to quit.
    fn handle(&mut self, session: &mut Session, event: Event) -> Result<bool> {
        self.record(describe(&event));
        let Event::Key(key) = event else {
            return Ok(true);
        };
        match key.code {
            KeyCode::Char('q') if key.modifiers.is_empty() => return Ok(false),
            KeyCode::Key(Key::CTRL_Q) => return Ok(false),
            KeyCode::Key(Key::F1) => {
                let mode = session.input_mode()?;
                let mouse = mode & InputMode::MOUSE;
                let next = if mode.contains(InputMode::ALT) {
                    InputMode::ESC
                } else {
                    InputMode::ALT
                };
                session.set_input_mode(next | mouse)?;
                self.status = format!("input mode {:?}", session.input_mode()?);
            }
            KeyCode::Key(Key::F2) => {
                let mode = session.input_mode()?;
                session.set_input_mode(mode ^ InputMode::MOUSE)?;
                self.status = format!("input mode {:?}", session.input_mode()?);
            }
            KeyCode::Key(Key::F3) => {
                let next = match session.output_mode()? {
                    OutputMode::Normal => OutputMode::Colors256,
                    OutputMode::Colors256 => OutputMode::Colors216,
                    OutputMode::Colors216 => OutputMode::Grayscale,
                    OutputMode::Grayscale => OutputMode::Normal,
                };
                self.status = match session.set_output_mode(next) {
                    Ok(()) => format!("output mode {next:?}"),
                    Err(err @ Error::UnsupportedMode(_)) => err.to_string(),
                    Err(err) => return Err(err.into()),
                };
            }
            KeyCode::Key(Key::F4) => {
                self.events.clear();
                self.status = String::from("log cleared");
            }
            _ => {}
        }
        Ok(true)
    }

    fn draw(&self, session: &mut Session) -> Result<()> {
        session.clear()?;
        let width = session.width()?;
        let height = session.height()?;
        let title = ColorAttr::WHITE | Attrs::BOLD;

        session.print(0, 0, title, ColorAttr::BLUE, &pad("cellbox event viewer", width))?;
        let modes = format!(
            "input {:?}  output {:?}  size {}x{}",
            session.input_mode()?,
            session.output_mode()?,
            width,
            height
        );
        session.print(0, 1, ColorAttr::CYAN, ColorAttr::DEFAULT, &modes)?;
        session.print(
            0,
            2,
            ColorAttr::DEFAULT,
            ColorAttr::DEFAULT,
            "F1 esc/alt  F2 mouse  F3 output mode  F4 clear  q quit",
        )?;
        draw_palette(session, 3, width)?;
        session.print(0, 4, ColorAttr::YELLOW, ColorAttr::DEFAULT, &self.status)?;

        for (row, line) in (HEADER_ROWS..height).zip(&self.events) {
            session.print(0, row, ColorAttr::DEFAULT, ColorAttr::DEFAULT, line)?;
        }

        session.set_cursor(0, height.saturating_sub(1))?;
        session.present()?;
        Ok(())
    }
}

/// One background-colored cell per logical color of the current mode.
fn draw_palette(session: &mut Session, row: u16, width: u16) -> Result<()> {
    let max = session.output_mode()?.max_color();
    for (x, color) in (0..width).zip(1..=max) {
        let bg = session.encode(color, Attrs::empty())?;
        session.set_cell(x, row, ' ', ColorAttr::DEFAULT, bg)?;
    }
    Ok(())
}

fn pad(text: &str, width: u16) -> String {
    format!("{text:<width$}", width = usize::from(width))
}

fn describe(event: &Event) -> String {
    match event {
        Event::Key(KeyEvent { modifiers, code }) => {
            let code = match code {
                KeyCode::Key(key) => format!("{key} (0x{:04X})", key.code()),
                KeyCode::Char(ch) => format!("{ch:?} (U+{:04X})", u32::from(*ch)),
            };
            format!("key    {code}{}", modifiers_suffix(*modifiers))
        }
        Event::Mouse(mouse) => format!(
            "mouse  {:?} at {},{}{}",
            mouse.button,
            mouse.x,
            mouse.y,
            modifiers_suffix(mouse.modifiers)
        ),
        Event::Resize(size) => format!("resize {}x{}", size.cols, size.rows),
    }
}

fn modifiers_suffix(modifiers: Modifiers) -> String {
    if modifiers.is_empty() {
        String::new()
    } else {
        format!("  [{modifiers:?}]")
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let mut session =
        Session::init_with_config(&config).context("failed to initialize terminal")?;
    info!(?config, "viewer started");

    let mut viewer = Viewer::new();
    let result = (|| -> Result<()> {
        loop {
            viewer.draw(&mut session)?;
            let event = session.poll_event()?;
            if !viewer.handle(&mut session, event)? {
                return Ok(());
            }
        }
    })();

    if let Err(err) = session.shutdown() {
        warn!(%err, "terminal restore failed");
    }
    result
}

fn main() {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return,
        Err(err) => {
            eprintln!("cellbox: {err}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };
    init_logging(args.log.clone());

    if let Err(err) = run(args) {
        eprintln!("cellbox: {err:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbox_term::{MouseButton, MouseEvent, Size};
    use pretty_assertions::assert_eq;

    #[test]
    fn describe_names_keys_and_codes() {
        let event = Event::Key(KeyEvent::new(KeyCode::Key(Key::F1), Modifiers::empty()));
        assert_eq!(describe(&event), "key    F1 (0xFFFF)");
    }

    #[test]
    fn describe_shows_modifiers() {
        let event = Event::Key(KeyEvent::new(KeyCode::Char('a'), Modifiers::ALT));
        let text = describe(&event);
        assert!(text.starts_with("key    'a' (U+0061)"));
        assert!(text.contains("ALT"));
    }

    #[test]
    fn describe_mouse_and_resize() {
        let mouse = Event::Mouse(MouseEvent {
            button: MouseButton::Left,
            x: 3,
            y: 4,
            modifiers: Modifiers::empty(),
        });
        assert_eq!(describe(&mouse), "mouse  Left at 3,4");
        assert_eq!(describe(&Event::Resize(Size::new(80, 24))), "resize 80x24");
    }

    #[test]
    fn log_is_bounded_and_newest_first() {
        let mut viewer = Viewer::new();
        for i in 0..=LOG_LINES {
            viewer.record(i.to_string());
        }
        assert_eq!(viewer.events.len(), LOG_LINES);
        assert_eq!(viewer.events.front().map(String::as_str), Some("200"));
    }

    #[test]
    fn draw_and_keys_on_headless_session() {
        let (mut session, _feed) =
            Session::headless(std::io::sink(), Size::new(60, 10), &Config::default()).unwrap();
        let mut viewer = Viewer::new();
        viewer.draw(&mut session).unwrap();

        let f2 = Event::Key(KeyEvent::new(KeyCode::Key(Key::F2), Modifiers::empty()));
        assert!(viewer.handle(&mut session, f2).unwrap());
        assert!(session.input_mode().unwrap().contains(InputMode::MOUSE));

        let quit = Event::Key(KeyEvent::new(KeyCode::Char('q'), Modifiers::empty()));
        assert!(!viewer.handle(&mut session, quit).unwrap());
    }
}
