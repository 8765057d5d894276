//! "Analyze" screen: text or file input, background classification, and
//! saving the resulting draft as a new deal.

use std::path::Path;

use crossterm::event::{KeyCode, KeyModifiers};
use dealdesk_classifier::{ClassificationInput, today};
use dealdesk_core::dashboard::format_eur;
use dealdesk_core::load_attachment;
use dealdesk_shared::{DealDocument, DealDraft};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use super::{Action, SaveDraft, field_style};
use crate::app::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Text,
    File,
    Referent,
}

pub(crate) struct AnalyzeScreen {
    text: String,
    file: String,
    /// Index into the referent directory; `None` assigns the session user.
    referent: Option<usize>,
    focused: Field,
    editing: bool,
    /// Input of the call in flight or last completed.
    source_text: Option<String>,
    document: Option<DealDocument>,
    draft: Option<DealDraft>,
}

impl AnalyzeScreen {
    pub(crate) fn new() -> Self {
        Self {
            text: String::new(),
            file: String::new(),
            referent: None,
            focused: Field::Text,
            editing: false,
            source_text: None,
            document: None,
            draft: None,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    /// Deliver the outcome of a background analysis.
    pub(crate) fn set_result(&mut self, draft: DealDraft) {
        self.draft = Some(draft);
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(5), // Text
                Constraint::Length(3), // File
                Constraint::Length(3), // Referent
                Constraint::Length(1), // Hint
                Constraint::Min(1),    // Draft
            ])
            .split(area);

        let text = Paragraph::new(self.text.as_str())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Document text ")
                    .border_style(field_style(self.focused == Field::Text, self.editing)),
            );
        f.render_widget(text, chunks[0]);

        let file = Paragraph::new(self.file.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" File path (image or .txt/.md, optional) ")
                .border_style(field_style(self.focused == Field::File, self.editing)),
        );
        f.render_widget(file, chunks[1]);

        let referent = Paragraph::new(format!(
            "< {} >  (← → to change)",
            self.referent_name(session).unwrap_or("session user")
        ))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Responsible referent ")
                .border_style(field_style(self.focused == Field::Referent, false)),
        );
        f.render_widget(referent, chunks[2]);

        let hint = if session.is_analyzing() {
            "Analyzing… please wait"
        } else if self.editing {
            "Type to edit · Esc to stop editing · Tab to next field"
        } else if self.draft.is_some() {
            "s save as new deal · x discard · r analyze again"
        } else {
            "Enter to edit · Tab to next field · r analyze"
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[3],
        );

        let (title, lines) = match (&self.draft, session.is_analyzing()) {
            (_, true) => (" Analyzing… ", vec![Line::from("  Waiting for the model.")]),
            (Some(draft), false) => (" Draft ", draft_lines(draft)),
            (None, false) => (
                " Draft ",
                vec![Line::from("  Paste text or give a file path, then press r.")],
            ),
        };
        let body = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(body, chunks[4]);
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        session: &Session,
    ) -> Action {
        if self.editing {
            match code {
                KeyCode::Esc => self.editing = false,
                KeyCode::Tab => {
                    self.editing = false;
                    self.next_field();
                }
                KeyCode::Enter if self.focused == Field::Text => self.text.push('\n'),
                KeyCode::Enter => self.editing = false,
                KeyCode::Backspace => {
                    if let Some(field) = self.current_field_mut() {
                        field.pop();
                    }
                }
                KeyCode::Char(c) => {
                    if let Some(field) = self.current_field_mut() {
                        field.push(c);
                    }
                }
                _ => {}
            }
            return Action::None;
        }

        let referents = session.state().referents().len();
        match code {
            KeyCode::Enter if self.focused != Field::Referent => {
                self.editing = true;
                Action::None
            }
            KeyCode::Tab | KeyCode::Down => {
                self.next_field();
                Action::None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.prev_field();
                Action::None
            }
            KeyCode::Left if self.focused == Field::Referent => {
                self.referent = match self.referent {
                    None if referents > 0 => Some(referents - 1),
                    Some(0) | None => None,
                    Some(i) => Some(i - 1),
                };
                Action::None
            }
            KeyCode::Right if self.focused == Field::Referent => {
                self.referent = match self.referent {
                    None if referents > 0 => Some(0),
                    Some(i) if i + 1 < referents => Some(i + 1),
                    _ => None,
                };
                Action::None
            }
            KeyCode::Char('r') if session.is_analyzing() => {
                Action::Status("An analysis is already running.".into())
            }
            KeyCode::Char('r') => self.start(),
            KeyCode::Char('s') if !session.is_analyzing() => match self.draft.take() {
                Some(draft) => Action::SaveDraft(SaveDraft {
                    draft,
                    referent: self.referent_name(session).map(str::to_string),
                    source_text: self.source_text.take(),
                    document: self.document.take(),
                }),
                None => Action::Status("Nothing to save yet.".into()),
            },
            KeyCode::Char('x') if !session.is_analyzing() => {
                self.draft = None;
                Action::Status("Draft discarded.".into())
            }
            _ => Action::None,
        }
    }

    /// Build the classification input and hand it to the app.
    fn start(&mut self) -> Action {
        let typed = Some(self.text.trim().to_string()).filter(|t| !t.is_empty());
        let path = self.file.trim();

        let (input, document) = if path.is_empty() {
            let input = ClassificationInput {
                text: typed,
                image: None,
            };
            (input, None)
        } else {
            match load_attachment(Path::new(path)) {
                Ok(attachment) => {
                    let document = attachment.document(today());
                    (attachment.into_input(typed), Some(document))
                }
                Err(e) => return Action::Status(e.to_string()),
            }
        };

        if input.is_empty() {
            return Action::Status("Type some text or give a file path first.".into());
        }

        self.draft = None;
        self.source_text = input.text.clone();
        self.document = document;
        Action::Analyze(input)
    }

    fn referent_name<'a>(&self, session: &'a Session) -> Option<&'a str> {
        self.referent
            .and_then(|i| session.state().referents().get(i))
            .map(|r| r.name.as_str())
    }

    fn current_field_mut(&mut self) -> Option<&mut String> {
        match self.focused {
            Field::Text => Some(&mut self.text),
            Field::File => Some(&mut self.file),
            Field::Referent => None,
        }
    }

    fn next_field(&mut self) {
        self.focused = match self.focused {
            Field::Text => Field::File,
            Field::File => Field::Referent,
            Field::Referent => Field::Text,
        };
    }

    fn prev_field(&mut self) {
        self.focused = match self.focused {
            Field::Text => Field::Referent,
            Field::File => Field::Text,
            Field::Referent => Field::File,
        };
    }
}

fn draft_lines(draft: &DealDraft) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if draft.failed {
        lines.push(
            Line::from("Analysis failed; saving keeps the fallback values.")
                .style(Style::default().fg(Color::Red)),
        );
    }
    let mut field = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            lines.push(Line::from(format!("  {label:<14} {value}")));
        }
    };
    field("Title", draft.title.clone());
    field("Category", draft.category.map(|c| c.label().to_string()));
    field("Sub-type", draft.sub_type.clone());
    field("Location", draft.location.clone());
    field("Value", draft.indicative_value.map(format_eur));
    field("ROI", draft.roi.map(|v| format!("{v:.1}%")));
    field("CAGR", draft.cagr.map(|v| format!("{v:.1}%")));
    field("Priority", draft.priority.map(|p| p.label().to_string()));
    field("NDA signed", draft.nda_signed.map(|b| b.to_string()));
    field("Mandate", draft.mandate_acquired.map(|b| b.to_string()));
    field("Confidence", draft.confidence.map(|c| format!("{c}%")));
    field("Reason", draft.confidence_reason.clone());
    field("Description", draft.description.clone());
    if let Some(signals) = &draft.signals {
        for s in signals {
            lines.push(Line::from(format!("  {:<14} {}/10", s.label, s.score)));
        }
    }
    lines
}
