//! midiplayer - A terminal MIDI file player.
//!
//! Loads a Standard MIDI File and plays it through a SoundFont instrument,
//! with play/pause, stop, tempo control and a progress display.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --soundfont FluidR3_GM.sf2            # Start with an empty session
//! cargo run -- --soundfont FluidR3_GM.sf2 song.mid   # Load a file right away
//! ```
//!
//! Press `?` for help with keyboard shortcuts.

use midiplayer::audio::{RodioContext, SoundfontLoader};
use midiplayer::config::PlayerConfig;
use midiplayer::{ui, App};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Command-line options for the application.
#[derive(Debug, Default)]
struct CliOptions {
    /// Path to a SoundFont file.
    soundfont: Option<PathBuf>,
    /// General MIDI preset name.
    instrument: Option<String>,
    /// JSON configuration file.
    config: Option<PathBuf>,
    /// Write logs here instead of stderr.
    log_file: Option<PathBuf>,
    /// MIDI file to load after startup.
    file: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--soundfont <path>` or `-sf <path>`: SoundFont used for synthesis
    /// - `--instrument <name>` or `-i <name>`: General MIDI preset name
    /// - `--config <path>` or `-c <path>`: JSON configuration file
    /// - `--log-file <path>`: Write logs to a file
    /// - `--help` or `-h`: Print help and exit
    /// - A positional `.mid`/`.midi` path to load on startup
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self::default();
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--soundfont" | "-sf" => {
                    options.soundfont = Some(PathBuf::from(required_value(&args, &mut i)));
                }
                "--instrument" | "-i" => {
                    options.instrument = Some(required_value(&args, &mut i).to_string());
                }
                "--config" | "-c" => {
                    options.config = Some(PathBuf::from(required_value(&args, &mut i)));
                }
                "--log-file" => {
                    options.log_file = Some(PathBuf::from(required_value(&args, &mut i)));
                }
                "--help" | "-h" => {
                    print_help(args.first().map_or("midiplayer", String::as_str));
                    std::process::exit(0);
                }
                other => {
                    if other.ends_with(".sf2") {
                        options.soundfont = Some(PathBuf::from(other));
                    } else if !other.starts_with('-') && options.file.is_none() {
                        options.file = Some(PathBuf::from(other));
                    } else {
                        eprintln!("Unknown option: {}", other);
                        eprintln!("Use --help for usage information");
                        std::process::exit(1);
                    }
                }
            }
            i += 1;
        }

        options
    }

    /// Overrides configuration values with the ones given on the command line.
    fn apply(&self, config: &mut PlayerConfig) {
        if let Some(soundfont) = &self.soundfont {
            config.soundfont = Some(soundfont.clone());
        }
        if let Some(instrument) = &self.instrument {
            config.instrument = instrument.clone();
        }
    }
}

/// Returns the value following a flag, exiting if it is missing.
fn required_value<'a>(args: &'a [String], i: &mut usize) -> &'a str {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires an argument", flag);
            std::process::exit(1);
        }
    }
}

fn print_help(program: &str) {
    eprintln!("midiplayer - Terminal MIDI file player");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] [FILE.mid]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -sf, --soundfont PATH   SoundFont file (.sf2) used to render notes");
    eprintln!("  -i, --instrument NAME   General MIDI preset (default: acoustic_grand_piano)");
    eprintln!("  -c, --config PATH       JSON configuration file");
    eprintln!("      --log-file PATH     Write logs to a file (filter with RUST_LOG)");
    eprintln!("  -h, --help              Print this help message");
}

/// Installs the tracing subscriber.
///
/// Logs are filtered by `RUST_LOG` and go to stderr unless a log file is given.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse();
    init_logging(cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => PlayerConfig::load_from_file(path)?,
        None => PlayerConfig::default(),
    };
    cli.apply(&mut config);

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;

    let mut app: App = App::new(config);

    // Show the loading state while the SoundFont is read
    terminal.draw(|frame| ui::render(frame, &app))?;

    let loader = SoundfontLoader::new(app.config.soundfont.clone());
    if app.initialize_audio(RodioContext::initialize, &loader) {
        if let Some(path) = &cli.file {
            app.open_file(path);
        }
    }

    let result = run_app(&mut terminal, &mut app);

    app.shutdown();
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Advance playback and expire status messages
        app.tick();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Short timeout so note events are delivered on time
        if !event::poll(Duration::from_millis(16))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(());
        }

        if app.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                app.show_help = false;
            }
            continue;
        }

        if app.file_browser.open {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => app.file_browser_up(),
                KeyCode::Down | KeyCode::Char('j') => app.file_browser_down(),
                KeyCode::Enter => {
                    app.file_browser_select();
                }
                KeyCode::Esc => app.file_browser_cancel(),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char(' ') | KeyCode::Char('p') => app.toggle_playback(),
            KeyCode::Char('s') => app.stop_playback(),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => app.tempo_up(),
            KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Left => app.tempo_down(),
            KeyCode::Char('o') => app.open_file_browser(),
            KeyCode::Char('?') => app.show_help = true,
            _ => {}
        }
    }
}
