//! "Deals" screen: filtered deal list and the single-deal detail view.

use crossterm::event::{KeyCode, KeyModifiers};
use dealdesk_core::dashboard::format_eur;
use dealdesk_core::{DealFilter, Navigation};
use dealdesk_shared::{Category, Deal};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use super::{Action, field_style, selection};
use crate::app::Session;

pub(crate) struct DealsScreen {
    filter: DealFilter,
    editing: bool,
    selected: usize,
}

impl DealsScreen {
    pub(crate) fn new() -> Self {
        Self {
            filter: DealFilter::default(),
            editing: false,
            selected: 0,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session, nav: &Navigation) {
        match nav.selected().and_then(|id| session.state().deal(id)) {
            Some(deal) => draw_detail(f, area, deal),
            None => self.draw_list(f, area, session),
        }
    }

    fn draw_list(&self, f: &mut Frame, area: Rect, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Search + category
                Constraint::Min(1),    // List
                Constraint::Length(1), // Hint
            ])
            .split(area);

        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[0]);

        let search = Paragraph::new(self.filter.search.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search ")
                .border_style(field_style(true, self.editing)),
        );
        f.render_widget(search, top[0]);

        let category = self.filter.category.map_or("All", |c| c.label());
        let category = Paragraph::new(format!("< {category} >")).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Category "),
        );
        f.render_widget(category, top[1]);

        let visible = self.filter.apply(session.state().deals());
        let items: Vec<ListItem> = if visible.is_empty() {
            vec![ListItem::new("  No deals match the current filter.")]
        } else {
            visible
                .iter()
                .enumerate()
                .map(|(i, deal)| {
                    let (style, prefix) = selection(i == self.selected);
                    let draft = if deal.is_draft { " (draft)" } else { "" };
                    ListItem::new(format!(
                        "{prefix}{:<22} {:<32} {:<12} {:>14}  {}{draft}",
                        deal.id.as_str(),
                        truncate(&deal.title, 32),
                        deal.category.label(),
                        format_eur(deal.indicative_value),
                        deal.status,
                    ))
                    .style(style)
                })
                .collect()
        };
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Deals ({}) ", visible.len())),
        );
        f.render_widget(list, chunks[1]);

        let hint = if self.editing {
            "Type to search · Enter/Esc to finish"
        } else {
            "/ search · c category · ↑/↓ select · Enter open"
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[2],
        );
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        session: &Session,
        nav: &Navigation,
    ) -> Action {
        if let Some(id) = nav.selected() {
            return match code {
                KeyCode::Esc | KeyCode::Backspace => Action::Back,
                KeyCode::Char('s') => match session.state().deal(id) {
                    Some(deal) => Action::SetStatus(id.clone(), deal.status.next()),
                    None => Action::Back,
                },
                KeyCode::Char('d') => Action::DeleteDeal(id.clone()),
                _ => Action::None,
            };
        }

        if self.editing {
            match code {
                KeyCode::Esc | KeyCode::Enter => self.editing = false,
                KeyCode::Backspace => {
                    self.filter.search.pop();
                    self.selected = 0;
                }
                KeyCode::Char(c) => {
                    self.filter.search.push(c);
                    self.selected = 0;
                }
                _ => {}
            }
            return Action::None;
        }

        let visible = self.filter.apply(session.state().deals());
        match code {
            KeyCode::Char('/') => {
                self.editing = true;
                Action::None
            }
            KeyCode::Char('c') => {
                self.filter.category = next_category(self.filter.category);
                self.selected = 0;
                Action::Status(format!(
                    "Category filter: {}",
                    self.filter.category.map_or("All", |c| c.label())
                ))
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < visible.len() {
                    self.selected += 1;
                }
                Action::None
            }
            KeyCode::Enter => match visible.get(self.selected) {
                Some(deal) => Action::OpenDeal(deal.id.clone()),
                None => Action::None,
            },
            _ => Action::None,
        }
    }
}

/// All → Finance → Real Estate → Corporate → All.
fn next_category(current: Option<Category>) -> Option<Category> {
    match current {
        None => Some(Category::ALL[0]),
        Some(c) => {
            let idx = Category::ALL.iter().position(|x| *x == c).unwrap_or(0);
            Category::ALL.get(idx + 1).copied()
        }
    }
}

fn draw_detail(f: &mut Frame, area: Rect, deal: &Deal) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[0]);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<16}"), Style::default().fg(Color::DarkGray)),
            Span::raw(value),
        ])
    };
    let pct = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{v:.1}%"));
    let dated = |done: bool, date: Option<chrono::NaiveDate>| match (done, date) {
        (true, Some(d)) => format!("yes ({d})"),
        (true, None) => "yes".to_string(),
        (false, _) => "no".to_string(),
    };

    let mut lines = vec![
        Line::from(deal.title.as_str()).style(bold),
        Line::from(""),
        row("Id", deal.id.to_string()),
        row("Category", format!("{} / {}", deal.category, deal.sub_type)),
        row("Location", deal.location.clone()),
        row(
            "Value",
            format!("{} ({})", format_eur(deal.indicative_value), deal.value_range),
        ),
        row("ROI / CAGR / IRR", format!("{} / {} / {}", pct(deal.roi), pct(deal.cagr), pct(deal.irr))),
        row("Status", deal.status.to_string()),
        row("Priority", deal.priority.to_string()),
        row("Referent", deal.internal_referent.clone()),
        row("Client", deal.client.clone()),
        row("Inserted", deal.insertion_date.to_string()),
        row("NDA", dated(deal.nda_signed, deal.nda_date)),
        row("Mandate", dated(deal.mandate_acquired, deal.mandate_date)),
        row("Confidence", format!("{}% {}", deal.confidence, deal.confidence_reason)),
    ];
    if deal.is_draft {
        lines.push(Line::from("Draft: created by document analysis").style(Style::default().fg(Color::Yellow)));
    }
    if !deal.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(deal.description.as_str()));
    }
    let info = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Deal "));
    f.render_widget(info, columns[0]);

    let mut side = Vec::new();
    side.push(Line::from("Signals").style(bold));
    if deal.signals.is_empty() {
        side.push(Line::from("  none"));
    }
    for s in &deal.signals {
        side.push(Line::from(format!("  {:<20} {:>2}/10", s.label, s.score)));
    }
    side.push(Line::from(""));
    side.push(Line::from("Contacts").style(bold));
    for c in &deal.contacts {
        let private = if c.is_private { " [private]" } else { "" };
        side.push(Line::from(format!("  {} ({}){private}", c.name, c.role)));
    }
    side.push(Line::from(""));
    side.push(Line::from("Documents").style(bold));
    for d in &deal.documents {
        side.push(Line::from(format!("  {} · {} · {}", d.name, d.size, d.upload_date)));
    }
    side.push(Line::from(""));
    side.push(Line::from("Audit log").style(bold));
    for entry in deal.audit_log.entries() {
        side.push(Line::from(format!(
            "  {} {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.user,
            entry.action
        )));
    }
    let history = Paragraph::new(side)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Activity "));
    f.render_widget(history, columns[1]);

    f.render_widget(
        Paragraph::new("s next status · d delete · Esc back")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        chunks[1],
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_filter_cycles_through_all() {
        let mut seen = Vec::new();
        let mut current = None;
        for _ in 0..4 {
            current = next_category(current);
            seen.push(current);
        }
        assert_eq!(
            seen,
            vec![
                Some(Category::Finance),
                Some(Category::RealEstate),
                Some(Category::Corporate),
                None
            ]
        );
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Città", 10), "Città");
        assert_eq!(truncate("Logistics warehouse", 10), "Logistics…");
    }
}
