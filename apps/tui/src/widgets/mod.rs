//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar, with a busy marker while an analysis is in flight.
pub(crate) fn status_bar(msg: &str, busy: bool) -> Paragraph<'_> {
    let mut spans = Vec::with_capacity(3);
    if busy {
        spans.push(Span::styled(
            " ⏳ Analyzing… ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ));
    }
    spans.push(Span::raw(format!(" {msg}")));
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}
