//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::{Priority, Status};

/// Used for the To do column
pub const SLATE_BLUE: Color = Color::Rgb(70, 110, 190);
/// Used for the Doing column
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for the Done column
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// High priority marker and error notices
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Cards waiting for the server
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);

pub fn status_color(status: Status) -> Color {
    match status {
        Status::Todo => SLATE_BLUE,
        Status::Doing => GOLD,
        Status::Done => DARK_GREEN,
    }
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Gray,
        Priority::Medium => Color::White,
        Priority::High => Color::LightRed,
    }
}

/// Readable foreground on top of `bg`.
pub fn text_on(bg: Color) -> Color {
    match bg {
        GOLD => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
