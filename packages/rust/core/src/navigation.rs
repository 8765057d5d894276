//! Which view is showing, and which deal (if any) is open in detail.

use dealdesk_shared::DealId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Dashboard,
    Deals,
    Referents,
    Analyze,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Self::Dashboard, Self::Deals, Self::Referents, Self::Analyze];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Deals => "Deals",
            Self::Referents => "Referents",
            Self::Analyze => "Analyze",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    tab: Tab,
    selected: Option<DealId>,
}

impl Navigation {
    pub fn tab(&self) -> Tab {
        self.tab
    }

    /// The deal open in detail view.
    pub fn selected(&self) -> Option<&DealId> {
        self.selected.as_ref()
    }

    /// Switch tab. Any open detail view is closed.
    pub fn switch_to(&mut self, tab: Tab) {
        self.tab = tab;
        self.selected = None;
    }

    /// Open a deal in detail view (from any tab).
    pub fn open_deal(&mut self, id: DealId) {
        self.tab = Tab::Deals;
        self.selected = Some(id);
    }

    /// Leave the detail view, staying on the current tab.
    pub fn back(&mut self) {
        self.selected = None;
    }

    /// Keep navigation consistent after a deal is removed: if it was open,
    /// return to the deal list with nothing selected.
    pub fn on_deal_deleted(&mut self, id: &DealId) {
        if self.selected.as_ref() == Some(id) {
            self.tab = Tab::Deals;
            self.selected = None;
        }
    }
}
