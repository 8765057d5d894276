//! "Referents" screen: contact directory with CSV import.

use std::path::PathBuf;

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use super::{Action, field_style, selection};
use crate::app::Session;

pub(crate) struct ReferentsScreen {
    selected: usize,
    import_path: String,
    editing: bool,
}

impl ReferentsScreen {
    pub(crate) fn new() -> Self {
        Self {
            selected: 0,
            import_path: String::new(),
            editing: false,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Min(1),    // Directory
                Constraint::Length(3), // CSV path
                Constraint::Length(1), // Hint
            ])
            .split(area);

        let referents = session.state().referents();
        let items: Vec<ListItem> = if referents.is_empty() {
            vec![ListItem::new("  The directory is empty. Press i to import a CSV.")]
        } else {
            referents
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let (style, prefix) = selection(i == self.selected);
                    ListItem::new(format!(
                        "{prefix}{:<24} {:<32} {:<20} {}",
                        r.name, r.email, r.role, r.department
                    ))
                    .style(style)
                })
                .collect()
        };
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Referents ({}) ", referents.len())),
        );
        f.render_widget(list, chunks[0]);

        let path = Paragraph::new(self.import_path.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" CSV file to import ")
                .border_style(field_style(self.editing, self.editing)),
        );
        f.render_widget(path, chunks[1]);

        let hint = if self.editing {
            "Type a path · Enter to import · Esc to cancel"
        } else {
            "i import CSV · d remove · ↑/↓ select"
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[2],
        );
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, session: &Session) -> Action {
        if self.editing {
            return match code {
                KeyCode::Esc => {
                    self.editing = false;
                    Action::None
                }
                KeyCode::Enter => {
                    let path = self.import_path.trim().to_string();
                    if path.is_empty() {
                        return Action::Status("Enter the path of a CSV file first.".into());
                    }
                    self.editing = false;
                    self.import_path.clear();
                    Action::ImportCsv(PathBuf::from(path))
                }
                KeyCode::Backspace => {
                    self.import_path.pop();
                    Action::None
                }
                KeyCode::Char(c) => {
                    self.import_path.push(c);
                    Action::None
                }
                _ => Action::None,
            };
        }

        let referents = session.state().referents();
        if self.selected >= referents.len() {
            self.selected = referents.len().saturating_sub(1);
        }
        match code {
            KeyCode::Char('i') => {
                self.editing = true;
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < referents.len() {
                    self.selected += 1;
                }
                Action::None
            }
            KeyCode::Char('d') => match referents.get(self.selected) {
                Some(r) => Action::DeleteReferent(r.id.clone()),
                None => Action::None,
            },
            _ => Action::None,
        }
    }
}
