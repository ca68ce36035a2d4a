//! Terminal user interface components.
//!
//! The main screen shows the loaded file, an error banner, the transport
//! bar and a progress gauge. The file browser and help are overlays.

mod dialogs;
mod help;
mod transport;

use crate::app::App;
use crate::audio::AudioContext;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;

pub use dialogs::render_file_browser;
pub use help::render_help;
pub use transport::{render_transport, tempo_bar};

/// Text shown in the progress gauge, rounded to a whole percent.
pub fn progress_label(percent: f64) -> String {
    format!("{:.0}%", percent.clamp(0.0, 100.0))
}

/// Renders the whole interface.
pub fn render<C: AudioContext>(frame: &mut Frame, app: &App<C>) {
    let session = app.player.session();
    let banner_height = if session.last_error().is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // File
            Constraint::Length(banner_height), // Error banner
            Constraint::Length(3),             // Transport
            Constraint::Length(3),             // Progress
            Constraint::Min(3),                // Details / instructions
            Constraint::Length(1),             // Key hints
        ])
        .split(frame.area());

    render_file_header(frame, chunks[0], app);
    if let Some(error) = session.last_error() {
        render_error_banner(frame, chunks[1], error);
    }
    render_transport(frame, chunks[2], app);
    render_progress(frame, chunks[3], app);
    render_details(frame, chunks[4], app);
    render_key_hints(frame, chunks[5]);

    render_file_browser(frame, app);
    if app.show_help {
        render_help(frame);
    }
}

fn render_file_header<C: AudioContext>(frame: &mut Frame, area: Rect, app: &App<C>) {
    let block = Block::default()
        .title(" MIDI Player ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let session = app.player.session();
    let line = if app.is_loading() {
        Line::from(Span::styled(
            "Loading soundfont...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else if session.file_loaded() {
        Line::from(vec![
            Span::styled("File: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                session.file_name(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(Span::styled(
            "No file loaded",
            Style::default().fg(Color::DarkGray),
        ))
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_error_banner(frame: &mut Frame, area: Rect, error: &str) {
    let block = Block::default()
        .title(" Error ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    frame.render_widget(
        Paragraph::new(Span::styled(error, Style::default().fg(Color::Red)))
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn render_progress<C: AudioContext>(frame: &mut Frame, area: Rect, app: &App<C>) {
    let percent = app.player.session().progress_percent().clamp(0.0, 100.0);
    let color = if app.player.session().is_playing() {
        Color::Green
    } else {
        Color::DarkGray
    };

    let gauge = Gauge::default()
        .block(Block::default().title(" Progress ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .ratio(percent / 100.0)
        .label(progress_label(percent));
    frame.render_widget(gauge, area);
}

fn render_details<C: AudioContext>(frame: &mut Frame, area: Rect, app: &App<C>) {
    let session = app.player.session();
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);

    let lines = if !session.file_loaded() {
        vec![
            Line::from(Span::styled(
                "Press o to choose a MIDI file (.mid or .midi, up to 10MB).",
                value,
            )),
            Line::from(Span::styled(
                "Then press Space to play and +/- to change the tempo.",
                label,
            )),
        ]
    } else {
        vec![
            Line::from(vec![
                Span::styled("Format:  ", label),
                Span::styled(session.format_label(), value),
            ]),
            Line::from(vec![
                Span::styled("Tempo:   ", label),
                Span::styled(format!("{} BPM", session.tempo_bpm()), value),
            ]),
            Line::from(vec![
                Span::styled("Status:  ", label),
                Span::styled(app.player.status_label(), value),
            ]),
            Line::from(vec![
                Span::styled("Size:    ", label),
                Span::styled(
                    format!("{} bytes", session.file_buffer().map_or(0, |b| b.len())),
                    value,
                ),
            ]),
        ]
    };

    let block = Block::default().title(" Details ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_key_hints(frame: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let text = Style::default().fg(Color::DarkGray);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[Space]", key),
            Span::styled(" Play/Pause  ", text),
            Span::styled("[s]", key),
            Span::styled(" Stop  ", text),
            Span::styled("[+/-]", key),
            Span::styled(" Tempo  ", text),
            Span::styled("[o]", key),
            Span::styled(" Open  ", text),
            Span::styled("[?]", key),
            Span::styled(" Help  ", text),
            Span::styled("[q]", key),
            Span::styled(" Quit", text),
        ])),
        area,
    );
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
