//! Main TUI application state.
//!
//! Handles:
//! - Slider input
//! - The Predict action (synchronous, on the UI thread)
//! - Rendering the sidebar and result panel

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};

use crate::adapters::gbm::GbmModel;
use crate::application::{AssessmentService, ModelService};
use crate::config::AppConfig;
use crate::RunoffError;

use super::ui::{
    render_disclaimer, render_header,
    result::{render_result, PresenterState},
    sidebar::{render_sidebar, ParameterFormState},
};

/// Steps moved by PgUp/PgDn
const PAGE_STEPS: i32 = 10;

/// Main application state
pub struct App {
    should_quit: bool,
    form: ParameterFormState,
    presenter: PresenterState,
    service: AssessmentService<GbmModel>,
    models: Arc<ModelService<GbmModel>>,
}

impl App {
    /// Create the application for the configured model.
    ///
    /// The model is loaded eagerly so a missing or unsigned artifact is
    /// reported on the first screen; the app stays usable for a retry.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let models = Arc::new(ModelService::from_config(config));
        let mut app = Self::with_models(models);

        if let Err(e) = app.models.handle() {
            tracing::error!("Model load failed: {}", e);
            app.presenter = PresenterState::LoadFailed {
                message: RunoffError::from(e).to_string(),
            };
        }

        app
    }

    /// Create application around an existing model service.
    #[must_use]
    pub fn with_models(models: Arc<ModelService<GbmModel>>) -> Self {
        Self {
            should_quit: false,
            form: ParameterFormState::default(),
            presenter: PresenterState::AwaitingInput,
            service: AssessmentService::new(Arc::clone(&models)),
            models,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn draw(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Title
                Constraint::Min(0),    // Content
                Constraint::Length(2), // Disclaimer
            ])
            .split(f.area());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
            .split(rows[1]);

        render_header(f, rows[0]);
        render_sidebar(f, columns[0], &self.form);
        render_result(f, columns[1], &self.presenter);
        render_disclaimer(f, rows[2]);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let mut changed = true;
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                changed = false;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                changed = false;
            }
            KeyCode::Up => {
                self.form.prev_field();
                changed = false;
            }
            KeyCode::Down | KeyCode::Tab => {
                self.form.next_field();
                changed = false;
            }
            KeyCode::Left => self.form.step(-1),
            KeyCode::Right => self.form.step(1),
            KeyCode::PageDown => self.form.step(-PAGE_STEPS),
            KeyCode::PageUp => self.form.step(PAGE_STEPS),
            KeyCode::Home => self.form.to_min(),
            KeyCode::End => self.form.to_max(),
            KeyCode::Char('d') | KeyCode::Char('D') => self.form.reset(),
            KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('P') => {
                self.predict();
                changed = false;
            }
            _ => changed = false,
        }

        // A shown result belongs to the inputs it was computed from.
        if changed && matches!(self.presenter, PresenterState::ShowingResult(_)) {
            self.presenter = PresenterState::AwaitingInput;
        }
    }

    /// Run the Predict action for the current parameters.
    pub fn predict(&mut self) {
        let outcome = self.service.assess(&self.form.params);
        if let Err(e) = &outcome {
            tracing::error!("Predict failed: {}", e);
        }
        self.presenter = PresenterState::from_outcome(outcome);
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[must_use]
    pub fn presenter(&self) -> &PresenterState {
        &self.presenter
    }

    #[must_use]
    pub fn parameters(&self) -> &crate::domain::ClinicalParameters {
        &self.form.params
    }
}
