//! Prediction result and explanation panel.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::force_plot::ForcePlotWidget;
use crate::domain::{Assessment, ExplanationOutcome, Push};
use crate::tui::styles::MedicalTheme;
use crate::RunoffError;

/// What the main panel shows
#[derive(Debug, Clone, Default)]
pub enum PresenterState {
    /// No prediction requested yet
    #[default]
    AwaitingInput,
    /// Result of the last Predict action
    ShowingResult(Assessment),
    /// The model could not be loaded
    LoadFailed { message: String },
    /// The model loaded but could not score the inputs
    PredictFailed { message: String },
}

impl PresenterState {
    /// State for the outcome of one Predict action.
    #[must_use]
    pub fn from_outcome(outcome: crate::Result<Assessment>) -> Self {
        match outcome {
            Ok(assessment) => Self::ShowingResult(assessment),
            Err(e @ RunoffError::ModelLoad(_)) => Self::LoadFailed {
                message: e.to_string(),
            },
            Err(e @ RunoffError::Model(_)) => Self::PredictFailed {
                message: e.to_string(),
            },
        }
    }
}

/// Render the main panel
pub fn render_result(f: &mut Frame, area: Rect, state: &PresenterState) {
    match state {
        PresenterState::AwaitingInput => render_idle(f, area),
        PresenterState::ShowingResult(assessment) => render_assessment(f, area, assessment),
        PresenterState::LoadFailed { message } => {
            render_error(f, area, "! Model unavailable", message)
        }
        PresenterState::PredictFailed { message } => {
            render_error(f, area, "! Prediction failed", message)
        }
    }
}

fn render_idle(f: &mut Frame, area: Rect) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Ready to assess runoff risk",
            MedicalTheme::text_secondary(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Adjust the parameters and press Enter to predict",
            MedicalTheme::text_muted(),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(content, area);
}

fn render_assessment(f: &mut Frame, area: Rect, assessment: &Assessment) {
    let block = Block::default()
        .title(Span::styled(" Prediction Result ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border_focused());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Label
            Constraint::Length(3), // Explanation heading + caption
            Constraint::Min(0),    // Chart or error
            Constraint::Length(1), // Legend
        ])
        .margin(1)
        .split(inner);

    let label = assessment.prediction.label;
    let outcome = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Predicted outcome: ", MedicalTheme::text()),
            Span::styled(label.as_str(), MedicalTheme::risk_label(label)),
        ]),
        Line::from(Span::styled(
            format!(
                "Probability of poor runoff: {:.1}%   (computed {})",
                assessment.prediction.probability * 100.0,
                assessment.computed_at.format("%H:%M:%S UTC")
            ),
            MedicalTheme::text_secondary(),
        )),
    ]);
    f.render_widget(outcome, chunks[0]);

    let heading = Paragraph::new(vec![
        Line::from(Span::styled(
            "Model Explanation (SHAP Values)",
            MedicalTheme::subtitle(),
        )),
        Line::from(Span::styled(
            "The force plot below shows how each feature contributes to the prediction:",
            MedicalTheme::text_secondary(),
        )),
    ])
    .wrap(Wrap { trim: true });
    f.render_widget(heading, chunks[1]);

    match &assessment.explanation {
        ExplanationOutcome::Chart(plot) => {
            f.render_widget(ForcePlotWidget::new(plot), chunks[2]);

            let legend = Paragraph::new(Line::from(vec![
                Span::styled("▶ ", MedicalTheme::push(Push::Higher)),
                Span::styled("higher  ", MedicalTheme::text_muted()),
                Span::styled("◀ ", MedicalTheme::push(Push::Lower)),
                Span::styled("lower  ", MedicalTheme::text_muted()),
                Span::styled("(log-odds)", MedicalTheme::text_muted()),
            ]));
            f.render_widget(legend, chunks[3]);
        }
        ExplanationOutcome::Failed { message } => {
            let error = Paragraph::new(Line::from(vec![
                Span::styled("! ", MedicalTheme::danger()),
                Span::styled(message.as_str(), MedicalTheme::danger()),
            ]))
            .wrap(Wrap { trim: true });
            f.render_widget(error, chunks[2]);
        }
    }
}

fn render_error(f: &mut Frame, area: Rect, heading: &str, message: &str) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(heading, MedicalTheme::danger())),
        Line::from(""),
        Line::from(Span::styled(message, MedicalTheme::text())),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to retry",
            MedicalTheme::text_muted(),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(MedicalTheme::danger()),
    );

    f.render_widget(content, area);
}
