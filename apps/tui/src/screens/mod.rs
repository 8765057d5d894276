//! TUI screen definitions.
//!
//! Each screen corresponds to a tab and encapsulates its own view state.
//! Screens never mutate the application state directly: key handling returns
//! an [`Action`] that the app applies.

mod analyze;
mod dashboard;
mod deals;
mod referents;

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyModifiers};
use dealdesk_classifier::ClassificationInput;
use dealdesk_core::{Navigation, Tab};
use dealdesk_shared::{DealDocument, DealDraft, DealId, DealStatus, ReferentId};
use ratatui::prelude::*;

use crate::app::Session;

/// A request from a screen to the app.
#[derive(Debug)]
pub(crate) enum Action {
    None,
    Status(String),
    OpenDeal(DealId),
    Back,
    SetStatus(DealId, DealStatus),
    DeleteDeal(DealId),
    DeleteReferent(ReferentId),
    ImportCsv(PathBuf),
    Analyze(ClassificationInput),
    SaveDraft(SaveDraft),
}

/// Everything needed to turn an analysed draft into a deal.
#[derive(Debug)]
pub(crate) struct SaveDraft {
    pub draft: DealDraft,
    pub referent: Option<String>,
    pub source_text: Option<String>,
    pub document: Option<DealDocument>,
}

/// Per-screen state.
pub(crate) struct Screens {
    pub dashboard: dashboard::DashboardScreen,
    pub deals: deals::DealsScreen,
    pub referents: referents::ReferentsScreen,
    pub analyze: analyze::AnalyzeScreen,
}

impl Screens {
    pub(crate) fn new() -> Self {
        Self {
            dashboard: dashboard::DashboardScreen::new(),
            deals: deals::DealsScreen::new(),
            referents: referents::ReferentsScreen::new(),
            analyze: analyze::AnalyzeScreen::new(),
        }
    }

    /// Whether the current screen has an active text input field.
    pub(crate) fn is_editing(&self, tab: Tab) -> bool {
        match tab {
            Tab::Deals => self.deals.is_editing(),
            Tab::Referents => self.referents.is_editing(),
            Tab::Analyze => self.analyze.is_editing(),
            Tab::Dashboard => false,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session, nav: &Navigation) {
        match nav.tab() {
            Tab::Dashboard => self.dashboard.draw(f, area, session),
            Tab::Deals => self.deals.draw(f, area, session, nav),
            Tab::Referents => self.referents.draw(f, area, session),
            Tab::Analyze => self.analyze.draw(f, area, session),
        }
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        modifiers: KeyModifiers,
        session: &Session,
        nav: &Navigation,
    ) -> Action {
        match nav.tab() {
            Tab::Dashboard => self.dashboard.handle_key(code, session),
            Tab::Deals => self.deals.handle_key(code, modifiers, session, nav),
            Tab::Referents => self.referents.handle_key(code, session),
            Tab::Analyze => self.analyze.handle_key(code, modifiers, session),
        }
    }
}

/// Border style for a focusable field.
pub(crate) fn field_style(focused: bool, editing: bool) -> Style {
    match (focused, editing) {
        (true, true) => Style::default().fg(Color::Yellow),
        (true, false) => Style::default().fg(Color::Cyan),
        _ => Style::default(),
    }
}

/// Row style and prefix for list selection.
pub(crate) fn selection(selected: bool) -> (Style, &'static str) {
    if selected {
        (
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            "▸ ",
        )
    } else {
        (Style::default(), "  ")
    }
}
