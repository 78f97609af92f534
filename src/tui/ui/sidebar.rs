//! Parameter sliders and instructions.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::domain::{ClinicalParameters, ParameterId};
use crate::tui::styles::MedicalTheme;

/// Slider form state
#[derive(Debug, Clone, Default)]
pub struct ParameterFormState {
    pub params: ClinicalParameters,
    pub selected: usize,
}

impl ParameterFormState {
    /// Currently selected parameter
    #[must_use]
    pub fn selected_id(&self) -> ParameterId {
        ParameterId::ALL[self.selected % ParameterId::ALL.len()]
    }

    /// Move to the next slider
    pub fn next_field(&mut self) {
        self.selected = (self.selected + 1) % ParameterId::ALL.len();
    }

    /// Move to the previous slider
    pub fn prev_field(&mut self) {
        if self.selected == 0 {
            self.selected = ParameterId::ALL.len() - 1;
        } else {
            self.selected -= 1;
        }
    }

    /// Move the selected slider by `steps` steps
    pub fn step(&mut self, steps: i32) {
        self.params.nudge(self.selected_id(), steps);
    }

    pub fn to_min(&mut self) {
        self.params.set_to_min(self.selected_id());
    }

    pub fn to_max(&mut self) {
        self.params.set_to_max(self.selected_id());
    }

    pub fn reset(&mut self) {
        self.params.reset_defaults();
    }
}

/// Render the sidebar: one slider per parameter, help, then instructions
pub fn render_sidebar(f: &mut Frame, area: Rect, state: &ParameterFormState) {
    let block = Block::default()
        .title(Span::styled(" Clinical Parameters ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let slider_height = 2;
    let sliders = ParameterId::ALL.len() as u16 * slider_height;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(sliders), // Sliders
            Constraint::Length(4),       // Help for the selected slider
            Constraint::Min(0),          // Instructions
        ])
        .split(inner);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            ParameterId::ALL
                .iter()
                .map(|_| Constraint::Length(slider_height))
                .collect::<Vec<_>>(),
        )
        .split(chunks[0]);

    for (i, id) in ParameterId::ALL.iter().enumerate() {
        render_slider(f, rows[i], state, *id, i == state.selected);
    }

    render_help(f, chunks[1], state.selected_id());
    render_instructions(f, chunks[2]);
}

fn render_slider(
    f: &mut Frame,
    area: Rect,
    state: &ParameterFormState,
    id: ParameterId,
    is_selected: bool,
) {
    let spec = id.spec();
    let value = state.params.get(id);
    let value_text = spec.format(value);

    let title_style = if is_selected {
        MedicalTheme::focused()
    } else {
        MedicalTheme::text_secondary()
    };
    let marker = if is_selected { "▶ " } else { "  " };

    // Track width leaves room for the bounds and the current value.
    let min_text = spec.format(spec.min);
    let max_text = spec.format(spec.max);
    let reserved = 2 + min_text.len() + max_text.len() + value_text.len() + 5;
    let width = (area.width as usize).saturating_sub(reserved).max(4);
    let filled = ((spec.fraction(value) * (width - 1) as f64).round() as usize).min(width - 1);

    let slider = Line::from(vec![
        Span::raw("  "),
        Span::styled(min_text, MedicalTheme::text_muted()),
        Span::raw(" "),
        Span::styled("━".repeat(filled), MedicalTheme::slider_fill(is_selected)),
        Span::styled("●", MedicalTheme::slider_fill(is_selected)),
        Span::styled(
            "─".repeat(width - 1 - filled),
            MedicalTheme::slider_track(),
        ),
        Span::raw(" "),
        Span::styled(max_text, MedicalTheme::text_muted()),
        Span::raw(" "),
        Span::styled(
            value_text,
            if is_selected {
                MedicalTheme::thumb()
            } else {
                MedicalTheme::text()
            },
        ),
    ]);

    let content = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(marker, title_style),
            Span::styled(spec.label, title_style),
        ]),
        slider,
    ]);

    f.render_widget(content, area);
}

fn render_help(f: &mut Frame, area: Rect, id: ParameterId) {
    let help = Paragraph::new(Line::from(Span::styled(
        id.spec().help,
        MedicalTheme::text_secondary(),
    )))
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(help, area);
}

fn render_instructions(f: &mut Frame, area: Rect) {
    let keys = |k: &'static str, d: &'static str| {
        Line::from(vec![
            Span::styled(k, MedicalTheme::key_hint()),
            Span::styled(d, MedicalTheme::key_desc()),
        ])
    };

    let text = vec![
        Line::from(Span::styled("Instructions", MedicalTheme::subtitle())),
        Line::from(Span::styled(
            "1. Adjust parameters using the sliders",
            MedicalTheme::text(),
        )),
        Line::from(Span::styled(
            "2. Press Enter to predict",
            MedicalTheme::text(),
        )),
        Line::from(Span::styled(
            "3. View results and explanation in the main panel",
            MedicalTheme::text(),
        )),
        Line::from(""),
        keys("[↑↓] ", "Select  [←→] Step  [PgUp/PgDn] ×10"),
        keys("[Home/End] ", "Min/Max  [D] Defaults"),
        keys("[Enter/P] ", "Predict  [Q] Quit"),
    ];

    let p = Paragraph::new(text).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_wraps() {
        let mut state = ParameterFormState::default();
        state.prev_field();
        assert_eq!(state.selected_id(), ParameterId::Egfr);
        state.next_field();
        assert_eq!(state.selected_id(), ParameterId::PoplitealStenosis);
    }

    #[test]
    fn test_steps_stay_in_range() {
        let mut state = ParameterFormState::default();
        state.selected = ParameterId::Abi.index();

        state.step(1);
        assert!((state.params.abi - 0.81).abs() < 1e-9);

        state.step(10_000);
        assert!((state.params.abi - 1.5).abs() < 1e-9);

        state.to_min();
        assert_eq!(state.params.abi, 0.0);

        state.reset();
        assert_eq!(state.params, ClinicalParameters::default());
    }
}
