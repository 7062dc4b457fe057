use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

/// Dark palette; the live view reads best against a dark frame.
pub fn app_theme() -> Theme {
    Theme::custom(
        "Senior Watch",
        Palette {
            background: color!(0x1c, 0x1c, 0x1e),
            text: color!(0xcc, 0xcc, 0xcc),
            primary: color!(0x5e, 0x9f, 0xf5),
            success: color!(0x30, 0xd1, 0x58),
            warning: color!(0xff, 0xcc, 0x00),
            danger: color!(0xff, 0x45, 0x3a),
        },
    )
}

/// How a status line should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

pub fn status_color(theme: &Theme, kind: StatusKind) -> Color {
    let palette = theme.palette();
    match kind {
        StatusKind::Info => palette.text,
        StatusKind::Success => palette.success,
        StatusKind::Warning => palette.warning,
        StatusKind::Error => palette.danger,
    }
}
