//! TUI module: Terminal User Interface using Ratatui.
//!
//! A single screen with:
//! - Parameter sliders and instructions (sidebar)
//! - Prediction result and force plot (main panel)

mod app;
mod styles;
pub mod ui;

pub use app::App;
pub use styles::MedicalTheme;
pub use ui::result::PresenterState;
