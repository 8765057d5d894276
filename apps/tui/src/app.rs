//! Core TUI application state and event loop.

use std::io;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use dealdesk_classifier::{ClassificationInput, GeminiClassifier, today};
use dealdesk_core::{AppState, DeletionTarget, Navigation, PendingDeletion, Tab, analyze};
use dealdesk_shared::{AppConfig, DealDeskError, DealDraft, Result as DealDeskResult};
use dealdesk_storage::Storage;

use crate::screens::{Action, SaveDraft, Screens};
use crate::widgets::status_bar;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything the screens read from: the store, the classifier, and the
/// runtime that drives their async calls.
pub(crate) struct Session {
    rt: Runtime,
    state: AppState,
    classifier: Arc<GeminiClassifier>,
    config: AppConfig,
    /// Receives the draft of the analysis in flight.
    analysis: Option<mpsc::Receiver<DealDraft>>,
}

impl Session {
    pub(crate) fn open(config: AppConfig) -> Result<Self> {
        let rt = Runtime::new()?;
        let path = config.storage.resolved_db_path();
        info!(path = %path.display(), "opening database");
        let storage = rt.block_on(Storage::open(&path))?;
        let state = rt.block_on(AppState::open(Arc::new(storage), &config));
        let classifier = GeminiClassifier::from_config(&config.classifier)?;
        if !classifier.has_api_key() {
            warn!(
                env = %config.classifier.api_key_env,
                "no API key set, analyses will return the fallback draft"
            );
        }

        Ok(Self {
            rt,
            state,
            classifier: Arc::new(classifier),
            config,
            analysis: None,
        })
    }

    pub(crate) fn state(&self) -> &AppState {
        &self.state
    }

    pub(crate) fn is_analyzing(&self) -> bool {
        self.analysis.is_some()
    }

    /// Run the classification on a worker thread; the result is picked up by
    /// [`Session::poll_analysis`].
    fn start_analysis(&mut self, input: ClassificationInput) {
        let (tx, rx) = mpsc::channel();
        let handle = self.rt.handle().clone();
        let classifier = Arc::clone(&self.classifier);
        let cache = self
            .config
            .classifier
            .cache
            .then(|| Arc::clone(self.state.storage()));

        std::thread::spawn(move || {
            let draft = handle.block_on(analyze(
                classifier.as_ref(),
                cache.as_deref(),
                &input,
                today(),
            ));
            // The receiver is gone only if the app quit mid-call.
            let _ = tx.send(draft);
        });
        self.analysis = Some(rx);
    }

    fn poll_analysis(&mut self) -> Option<DealDraft> {
        let rx = self.analysis.as_ref()?;
        match rx.try_recv() {
            Ok(draft) => {
                self.analysis = None;
                Some(draft)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                error!("analysis worker stopped without a result");
                self.analysis = None;
                Some(dealdesk_classifier::fallback_draft())
            }
        }
    }

    fn save_draft(&mut self, save: SaveDraft) -> DealDeskResult<String> {
        let ctx = self
            .state
            .draft_context()
            .with_referent(save.referent)
            .with_source_text(save.source_text);
        let state = &mut self.state;
        self.rt.block_on(async move {
            let deal = state.create_deal_from_draft(&save.draft, &ctx).await?;
            if let Some(document) = save.document {
                state.append_document(&deal.id, document).await?;
            }
            Ok::<_, DealDeskError>(format!("Saved deal {} ({})", deal.id, deal.title))
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Application state.
pub(crate) struct App {
    pub nav: Navigation,
    pub screens: Screens,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
    /// Deletion awaiting a yes/no answer.
    pub confirm: Option<PendingDeletion>,
    pub session: Session,
}

impl App {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            nav: Navigation::default(),
            screens: Screens::new(),
            should_quit: false,
            status: format!("Signed in as {} · press ? for help", session.state().user()),
            show_help: false,
            confirm: None,
            session,
        }
    }

    fn is_editing(&self) -> bool {
        self.screens.is_editing(self.nav.tab())
    }

    fn switch_to(&mut self, tab: Tab) {
        self.nav.switch_to(tab);
        self.status = tab.title().to_string();
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Status(msg) => self.status = msg,
            Action::OpenDeal(id) => {
                self.status = format!("Deal {id}");
                self.nav.open_deal(id);
            }
            Action::Back => self.nav.back(),
            Action::SetStatus(id, status) => {
                let state = &mut self.session.state;
                match self.session.rt.block_on(state.set_status(&id, status)) {
                    Ok(()) => self.status = format!("{id} moved to {status}"),
                    Err(e) => self.fail(e),
                }
            }
            Action::DeleteDeal(id) => {
                match self.session.state.request_deal_deletion(&id) {
                    Ok(pending) => self.confirm = Some(pending),
                    Err(e) => self.fail(e),
                }
            }
            Action::DeleteReferent(id) => {
                match self.session.state.request_referent_deletion(&id) {
                    Ok(pending) => self.confirm = Some(pending),
                    Err(e) => self.fail(e),
                }
            }
            Action::ImportCsv(path) => {
                let text = match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        self.status = format!("Cannot read {}: {e}", path.display());
                        return;
                    }
                };
                let state = &mut self.session.state;
                match self.session.rt.block_on(state.import_referents(&text)) {
                    Ok(outcome) => self.status = outcome.summary(),
                    Err(e) => self.fail(e),
                }
            }
            Action::Analyze(input) => {
                self.session.start_analysis(input);
                self.status = "Analyzing document…".into();
            }
            Action::SaveDraft(save) => match self.session.save_draft(save) {
                Ok(msg) => self.status = msg,
                Err(e) => self.fail(e),
            },
        }
    }

    fn resolve_confirm(&mut self, yes: bool) {
        let Some(pending) = self.confirm.take() else {
            return;
        };
        if !yes {
            self.status = "Deletion cancelled.".into();
            return;
        }

        let target = pending.target().clone();
        let state = &mut self.session.state;
        match self.session.rt.block_on(state.confirm_deletion(pending)) {
            Ok(()) => match target {
                DeletionTarget::Deal { id, title } => {
                    self.nav.on_deal_deleted(&id);
                    self.status = format!("Deleted deal {id} ({title})");
                }
                DeletionTarget::Referent { name, .. } => {
                    self.status = format!("Removed {name}");
                }
            },
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, e: impl std::fmt::Display) {
        warn!(error = %e, "action failed");
        self.status = format!("Error: {e}");
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(config: AppConfig) -> Result<()> {
    let session = Session::open(config)?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, App::new(session));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, &app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut app, key.code, key.modifiers);
            }
        }

        if let Some(draft) = app.session.poll_analysis() {
            app.status = if draft.failed {
                "Analysis failed; showing the fallback draft.".into()
            } else {
                format!("Analysis complete ({}% confidence)", draft.confidence.unwrap_or(0))
            };
            app.screens.analyze.set_result(draft);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if matches!(code, KeyCode::Char('c')) && modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // A pending deletion captures every key until answered.
    if app.confirm.is_some() {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.resolve_confirm(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.resolve_confirm(false),
            _ => {}
        }
        return;
    }

    // Global keybindings (inactive while typing)
    if !app.is_editing() {
        match code {
            KeyCode::Char('q') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('?') => {
                app.show_help = !app.show_help;
                return;
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = (c as usize) - ('1' as usize);
                app.switch_to(Tab::ALL[idx]);
                return;
            }
            KeyCode::Tab if app.nav.tab() != Tab::Analyze => {
                app.switch_to(app.nav.tab().next());
                return;
            }
            KeyCode::BackTab if app.nav.tab() != Tab::Analyze => {
                app.switch_to(app.nav.tab().prev());
                return;
            }
            _ => {}
        }
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    let action = app
        .screens
        .handle_key(code, modifiers, &app.session, &app.nav);
    app.apply(action);
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let tab_titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{} {}", i + 1, t.title())))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" DealDesk "),
        )
        .select(app.nav.tab().index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    app.screens.draw(f, chunks[1], &app.session, &app.nav);

    let bar = status_bar(&app.status, app.session.is_analyzing());
    f.render_widget(bar, chunks[2]);

    if let Some(pending) = &app.confirm {
        draw_confirm(f, pending);
    } else if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_confirm(f: &mut Frame, pending: &PendingDeletion) {
    let area = centered_rect(50, 20, f.area());
    let text = vec![
        Line::from(pending.prompt()),
        Line::from(""),
        Line::from("This cannot be undone.").style(Style::default().fg(Color::Red)),
        Line::from(""),
        Line::from("y confirm · n / Esc cancel").style(Style::default().add_modifier(Modifier::BOLD)),
    ];
    let dialog = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Confirm deletion ")
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1-4          Switch to tab"),
        Line::from("  Tab/S-Tab    Next/previous tab"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Deals:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  /            Search"),
        Line::from("  c            Cycle category filter"),
        Line::from("  Enter        Open deal"),
        Line::from("  s / d / Esc  Next status / delete / back (detail)"),
        Line::from(""),
        Line::from("Referents:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  i            Import a CSV file"),
        Line::from("  d            Remove referent"),
        Line::from(""),
        Line::from("Analyze:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Enter        Edit field"),
        Line::from("  Tab          Next input field"),
        Line::from("  r / s / x    Analyze / save draft / discard"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help — press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_is_inside_parent() {
        let parent = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(50, 20, parent);
        assert_eq!(inner.width, 50);
        assert_eq!(inner.height, 8);
        assert!(inner.x >= parent.x && inner.right() <= parent.right());
        assert!(inner.y >= parent.y && inner.bottom() <= parent.bottom());
    }
}
