//! Help overlay rendering.
//!
//! Displays keyboard shortcuts in a modal overlay.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;

/// Key binding entry for the help display.
struct KeyBinding {
    key: &'static str,
    description: &'static str,
}

const PLAYBACK_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Space / p",
        description: "Play / Pause",
    },
    KeyBinding {
        key: "s",
        description: "Stop (rewind to start)",
    },
    KeyBinding {
        key: "+ / Right",
        description: "Tempo up 5 BPM",
    },
    KeyBinding {
        key: "- / Left",
        description: "Tempo down 5 BPM",
    },
];

const GENERAL_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "o",
        description: "Open a MIDI file",
    },
    KeyBinding {
        key: "?",
        description: "Toggle this help",
    },
    KeyBinding {
        key: "q / Esc",
        description: "Quit",
    },
    KeyBinding {
        key: "Ctrl+C",
        description: "Force quit",
    },
];

const BROWSER_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Up / Down",
        description: "Move selection",
    },
    KeyBinding {
        key: "Enter",
        description: "Open folder or load file",
    },
    KeyBinding {
        key: "Esc",
        description: "Close the browser",
    },
];

/// Renders the help overlay.
pub fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help - Keyboard Shortcuts ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(Color::White);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (title, bindings) in [
        ("Playback", PLAYBACK_BINDINGS),
        ("General", GENERAL_BINDINGS),
        ("File Browser", BROWSER_BINDINGS),
    ] {
        lines.push(Line::from(Span::styled(title, section_style)));
        for binding in bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("{:15}", binding.key), key_style),
                Span::styled(binding.description, desc_style),
            ]));
        }
        lines.push(Line::from(""));
    }

    frame.render_widget(Paragraph::new(lines), chunks[0]);
    frame.render_widget(
        Paragraph::new(Span::styled(
            "Press ? to close",
            Style::default().fg(Color::DarkGray),
        )),
        chunks[1],
    );
}
