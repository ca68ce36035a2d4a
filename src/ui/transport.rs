//! Transport bar rendering.
//!
//! Displays the playback status, tempo, file format and the transient
//! status message.

use crate::app::App;
use crate::audio::AudioContext;
use crate::midi::{MAX_TEMPO, MIN_TEMPO};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Width of the tempo slider in cells.
const TEMPO_BAR_WIDTH: usize = 10;

/// Draws the tempo as a slider, e.g. `[====------]`.
pub fn tempo_bar(bpm: u32) -> String {
    let span = (MAX_TEMPO - MIN_TEMPO) as usize;
    let offset = bpm.clamp(MIN_TEMPO, MAX_TEMPO) as usize - MIN_TEMPO as usize;
    let filled = (offset * TEMPO_BAR_WIDTH + span / 2) / span;
    format!(
        "[{}{}]",
        "=".repeat(filled),
        "-".repeat(TEMPO_BAR_WIDTH - filled)
    )
}

/// Renders the transport bar.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport<C: AudioContext>(frame: &mut Frame, area: Rect, app: &App<C>) {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // Playback status
            Constraint::Length(26), // Tempo
            Constraint::Length(16), // Format
            Constraint::Min(10),    // Status message
        ])
        .split(inner);

    let session = app.player.session();
    let enabled = app.player.can_play();

    let play_status = match app.player.status_label() {
        "Playing" => Span::styled(
            " [>] Playing ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        "Paused" => Span::styled(
            " [||] Paused ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        _ => Span::styled(
            " [.] Stopped ",
            Style::default().fg(if enabled { Color::Red } else { Color::DarkGray }),
        ),
    };
    frame.render_widget(Paragraph::new(Line::from(play_status)), chunks[0]);

    let value_style = if enabled {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let tempo = session.tempo_bpm();
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("BPM: ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:3} ", tempo), value_style.add_modifier(Modifier::BOLD)),
            Span::styled(tempo_bar(tempo), value_style),
        ])),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Format: ", Style::default().fg(Color::DarkGray)),
            Span::styled(session.format_label(), value_style),
        ])),
        chunks[2],
    );

    if let Some((msg, _)) = &app.status_message {
        frame.render_widget(
            Paragraph::new(Span::styled(
                msg.as_str(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            )),
            chunks[3],
        );
    }
}
