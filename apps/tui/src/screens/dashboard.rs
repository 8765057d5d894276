//! "Dashboard" screen: KPIs, recent deals, and recommended actions.

use crossterm::event::KeyCode;
use dealdesk_core::Kpis;
use dealdesk_core::dashboard::{category_counts, format_eur, recent_deals, recommended_actions};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use super::{Action, selection};
use crate::app::Session;

pub(crate) struct DashboardScreen {
    selected: usize,
}

impl DashboardScreen {
    pub(crate) fn new() -> Self {
        Self { selected: 0 }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session) {
        let deals = session.state().deals();
        let kpis = Kpis::compute(deals);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([Constraint::Length(4), Constraint::Min(1)])
            .split(area);

        let tiles = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 6); 6])
            .split(rows[0]);

        let figures = [
            ("Active deals", kpis.active.to_string()),
            ("Total value", format_eur(kpis.total_value)),
            ("Average ROI", format!("{:.1}%", kpis.avg_roi)),
            ("NDA pending", kpis.pending_nda.to_string()),
            ("Mandate pending", kpis.pending_mandate.to_string()),
            ("Drafts", kpis.drafts.to_string()),
        ];
        for (i, (label, value)) in figures.into_iter().enumerate() {
            let tile = Paragraph::new(Line::from(value).style(Style::default().add_modifier(Modifier::BOLD)))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(format!(" {label} ")));
            f.render_widget(tile, tiles[i]);
        }

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let items: Vec<ListItem> = recent_deals(deals)
            .iter()
            .enumerate()
            .map(|(i, deal)| {
                let (style, prefix) = selection(i == self.selected);
                ListItem::new(format!(
                    "{prefix}{}  {}  {}  [{}]",
                    deal.id,
                    deal.title,
                    format_eur(deal.indicative_value),
                    deal.status
                ))
                .style(style)
            })
            .collect();
        let recent = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Recent deals (Enter to open) "),
        );
        f.render_widget(recent, body[0]);

        let mut lines: Vec<Line> = category_counts(deals)
            .into_iter()
            .map(|(category, count)| Line::from(format!("{:<12} {count}", category.label())))
            .collect();
        lines.push(Line::from(""));
        for action in recommended_actions(deals) {
            lines.push(
                Line::from(action.title).style(Style::default().fg(Color::Yellow)),
            );
            lines.push(Line::from(format!("  {}", action.detail)));
        }
        let side = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Categories & recommended actions "),
        );
        f.render_widget(side, body[1]);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, session: &Session) -> Action {
        let recent = recent_deals(session.state().deals());
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < recent.len() {
                    self.selected += 1;
                }
                Action::None
            }
            KeyCode::Enter => match recent.get(self.selected) {
                Some(deal) => Action::OpenDeal(deal.id.clone()),
                None => Action::None,
            },
            _ => Action::None,
        }
    }
}
