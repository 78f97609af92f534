//! Force plot widget.
//!
//! Draws the laid-out `ForcePlot` on a character grid:
//!
//! ```text
//!              f(x) = -0.73
//!   ◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀◀
//!  ───────────┴─────────────────────────────┬────
//!                               base value = -0.02
//!             TcPO2 = 40.0
//!                  eGFR = 60.0
//! ```
//!
//! Labels walk one row down per segment, a terminal rendition of the slanted
//! labels of a plotted force chart.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::domain::{ForcePlot, ForceSegment, Push, LABEL_ROTATION_DEGREES};
use crate::tui::styles::MedicalTheme;

/// Smallest area the chart is drawn in.
pub const MIN_WIDTH: u16 = 24;
pub const MIN_HEIGHT: u16 = 5;

/// Rows above the label area: caption, bars, axis, base caption.
const FIXED_ROWS: u16 = 4;

pub struct ForcePlotWidget<'a> {
    plot: &'a ForcePlot,
}

impl<'a> ForcePlotWidget<'a> {
    #[must_use]
    pub fn new(plot: &'a ForcePlot) -> Self {
        Self { plot }
    }

    fn column(&self, area: Rect, value: f64) -> u16 {
        let span = self.plot.axis_max - self.plot.axis_min;
        let t = if span > 0.0 {
            ((value - self.plot.axis_min) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        area.x + (t * f64::from(area.width - 1)).round() as u16
    }
}

/// Write `text` at `(x, y)`, clipped to `area`.
fn put(buf: &mut Buffer, area: Rect, x: u16, y: u16, text: &str, style: Style) {
    if y < area.top() || y >= area.bottom() || x >= area.right() {
        return;
    }
    let x = x.max(area.left());
    buf.set_stringn(x, y, text, usize::from(area.right() - x), style);
}

/// Start column so `text` is centered on `col` but stays inside `area`.
fn centered(area: Rect, col: u16, text: &str) -> u16 {
    let len = text.chars().count() as u16;
    let start = col.saturating_sub(len / 2);
    start
        .min(area.right().saturating_sub(len))
        .max(area.left())
}

/// Horizontal shift per label row for the slant, in columns.
fn slant_step() -> u16 {
    // Terminal cells are about twice as tall as wide.
    let run = 2.0 / LABEL_ROTATION_DEGREES.to_radians().tan();
    (run / 4.0).round().max(1.0) as u16
}

impl Widget for ForcePlotWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            put(
                buf,
                area,
                area.x,
                area.y,
                "Area too small for force plot",
                MedicalTheme::text_muted(),
            );
            return;
        }

        let caption_y = area.y;
        let bar_y = area.y + 1;
        let axis_y = area.y + 2;
        let base_y = area.y + 3;
        let label_top = area.y + FIXED_ROWS;
        let label_rows = area.height.saturating_sub(FIXED_ROWS);

        let out_col = self.column(area, self.plot.output_value);
        let base_col = self.column(area, self.plot.base_value);

        // Output caption
        let caption = format!("f(x) = {:.2}", self.plot.output_value);
        put(
            buf,
            area,
            centered(area, out_col, &caption),
            caption_y,
            &caption,
            MedicalTheme::title(),
        );

        // Bars
        for segment in &self.plot.segments {
            let (lo, hi) = if segment.start <= segment.end {
                (segment.start, segment.end)
            } else {
                (segment.end, segment.start)
            };
            let (c0, c1) = (self.column(area, lo), self.column(area, hi));
            let glyph = match segment.push() {
                Push::Higher => "▶",
                Push::Lower => "◀",
            };
            for x in c0..=c1 {
                put(buf, area, x, bar_y, glyph, MedicalTheme::push(segment.push()));
            }
        }

        // Axis with output and base ticks
        for x in area.left()..area.right() {
            put(buf, area, x, axis_y, "─", MedicalTheme::border());
        }
        put(buf, area, base_col, axis_y, "┬", MedicalTheme::text_secondary());
        put(buf, area, out_col, axis_y, "┴", MedicalTheme::text());

        let base = format!("base value = {:.2}", self.plot.base_value);
        put(
            buf,
            area,
            centered(area, base_col, &base),
            base_y,
            &base,
            MedicalTheme::text_secondary(),
        );

        if label_rows == 0 {
            return;
        }

        // Labels: each stack walks outward from f(x), one row down per label.
        let step = slant_step();
        let higher: Vec<&ForceSegment> =
            self.plot.pushing_higher().filter(|s| s.show_label).collect();
        let lower: Vec<&ForceSegment> =
            self.plot.pushing_lower().filter(|s| s.show_label).collect();

        for (k, segment) in higher.iter().enumerate() {
            let row = (k as u16) % label_rows;
            let mid = self.column(area, (segment.start + segment.end) / 2.0);
            let len = segment.label.chars().count() as u16;
            let x = mid
                .saturating_sub(row * step)
                .saturating_add(1)
                .saturating_sub(len)
                .max(area.left());
            put(
                buf,
                area,
                x,
                label_top + row,
                &segment.label,
                MedicalTheme::push(Push::Higher).add_modifier(Modifier::BOLD),
            );
        }

        for (k, segment) in lower.iter().enumerate() {
            let row = (k as u16) % label_rows;
            let mid = self.column(area, (segment.start + segment.end) / 2.0);
            let len = segment.label.chars().count() as u16;
            let x = mid
                .saturating_add(row * step)
                .min(area.right().saturating_sub(len))
                .max(area.left());
            put(
                buf,
                area,
                x,
                label_top + row,
                &segment.label,
                MedicalTheme::push(Push::Lower).add_modifier(Modifier::BOLD),
            );
        }
    }
}
