//! ttycore demo
//!
//! Run with: cargo run -- [options]
//!
//! Echoes decoded keys and mouse gestures. Ctrl+Q quits.
//!
//! Options:
//!   --config <path>   Load runtime configuration from a JSON file
//!   --no-mouse        Do not enable mouse tracking
//!   --frame-ms <n>    Main loop frame budget in milliseconds

use std::collections::VecDeque;
use std::env;

use log::info;
use tokio_util::sync::CancellationToken;

use ttycore::ansi::AnsiEscapeSequenceRequest;
use ttycore::core::{Attribute, Color, OutputBuffer, Rect, Size, TextStyle};
use ttycore::input::{ConsoleReader, KeyCode, KeyEvent, MouseEvent};
use ttycore::renderer::{AnsiOutput, ConsoleOutput, MouseMode};
use ttycore::runtime::{Application, MainLoopCoordinator};
use ttycore::RuntimeConfig;

const HISTORY: usize = 200;

struct Echo {
    lines: VecDeque<String>,
    dirty: bool,
    token: CancellationToken,
}

impl Echo {
    fn new(token: CancellationToken) -> Self {
        Self {
            lines: VecDeque::new(),
            dirty: true,
            token,
        }
    }

    fn log(&mut self, line: String) {
        if self.lines.len() == HISTORY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.dirty = true;
    }
}

impl Application for Echo {
    fn needs_draw(&self) -> bool {
        self.dirty
    }

    fn draw(&mut self, buffer: &mut OutputBuffer) {
        self.dirty = false;
        let cols = buffer.cols();
        let rows = buffer.rows();

        buffer.current_attribute = Attribute::new(Color::Black, Color::Cyan).with_style(TextStyle::BOLD);
        buffer.fill_rect(Rect::new(0, 0, cols, 1), ' ');
        buffer.move_to(1, 0);
        buffer.add_str("ttycore demo - press keys, click around, Ctrl+Q quits");

        buffer.current_attribute = Attribute::default();
        buffer.fill_rect(Rect::new(0, 1, cols, rows.saturating_sub(1)), ' ');
        let visible = rows.saturating_sub(1);
        let skip = self.lines.len().saturating_sub(visible);
        for (i, line) in self.lines.iter().skip(skip).enumerate() {
            buffer.move_to(0, i + 1);
            buffer.add_str(line);
        }
    }

    fn on_key_down(&mut self, event: &mut KeyEvent) {
        let key = event.key;
        if key.code == KeyCode::Char('q') && key.modifiers.ctrl {
            info!("Quit requested");
            self.token.cancel();
            return;
        }
        self.log(format!("key {:?} {:?}", key.code, key.modifiers));
    }

    fn on_mouse(&mut self, event: &mut MouseEvent) {
        self.log(format!(
            "mouse {:?} at {},{}",
            event.flags, event.position.x, event.position.y
        ));
    }

    fn on_resized(&mut self, size: Size) {
        self.log(format!("resized to {}x{}", size.cols, size.rows));
    }
}

#[cfg(unix)]
fn open_reader() -> ttycore::Result<Box<dyn ConsoleReader<char>>> {
    Ok(Box::new(ttycore::input::UnixConsoleReader::new()?))
}

#[cfg(not(unix))]
fn open_reader() -> ttycore::Result<Box<dyn ConsoleReader<char>>> {
    Err(ttycore::Error::StartupFailed("no console reader for this platform".into()))
}

fn print_help() {
    println!("ttycore-demo v0.1.0");
    println!();
    println!("Usage: ttycore-demo [options]");
    println!();
    println!("Options:");
    println!("  --config <path>   Load runtime configuration from a JSON file");
    println!("  --no-mouse        Do not enable mouse tracking");
    println!("  --frame-ms <n>    Main loop frame budget in milliseconds");
    println!("  --help, -h        Show this help");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line args
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<String> = None;
    let mut no_mouse = false;
    let mut frame_ms: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a path");
                    std::process::exit(1);
                }
            }
            "--frame-ms" => match args.get(i + 1).and_then(|v| v.parse::<u64>().ok()) {
                Some(ms) => {
                    frame_ms = Some(ms);
                    i += 2;
                }
                None => {
                    eprintln!("Error: --frame-ms requires a number of milliseconds");
                    std::process::exit(1);
                }
            },
            "--no-mouse" => {
                no_mouse = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown argument {}", other);
                std::process::exit(1);
            }
        }
    }

    let mut config = match config_path {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if no_mouse {
        config.mouse_mode = MouseMode::None;
        config.handle_mouse = false;
    }
    if let Some(ms) = frame_ms {
        config.frame_budget_ms = ms;
    }

    info!(
        "Starting (mouse: {}, frame: {}ms)",
        config.mouse_mode.as_str(),
        config.frame_budget_ms
    );

    let mouse_mode = config.mouse_mode;
    let alternate_screen = config.alternate_screen;
    let mut coordinator = MainLoopCoordinator::new(config, open_reader, move || {
        let mut output = AnsiOutput::stdout()
            .with_mouse_mode(mouse_mode)
            .with_alternate_screen(alternate_screen);
        output.init()?;
        Ok(Box::new(output) as Box<dyn ConsoleOutput>)
    });
    coordinator.start_async().await?;

    let request = AnsiEscapeSequenceRequest::named("device_attributes", |reply| {
        info!("Terminal attributes: {:?}", reply);
    })?;
    coordinator.driver_mut()?.send_request(request)?;

    let mut app = Echo::new(coordinator.cancellation_token());
    let result = coordinator.run(&mut app).await;
    coordinator.stop()?;
    result?;

    info!("Goodbye");
    Ok(())
}
