//! Colour palette for the inventory browser.
//!
//! Dark and light variants share one structure so every widget styles itself
//! through [`ThemePalette`] rather than hard-coded colours.

use ratatui::style::{Color, Modifier, Style};

/// Warm dark palette used by default.
pub mod colors {
    use ratatui::style::Color;

    pub const BG: Color = Color::Rgb(28, 26, 23);
    pub const BG_PANEL: Color = Color::Rgb(40, 37, 33);
    pub const BG_CURSOR: Color = Color::Rgb(58, 53, 46);
    pub const RULE: Color = Color::Rgb(78, 71, 62);
    pub const RULE_ACTIVE: Color = Color::Rgb(176, 150, 110);

    pub const INK: Color = Color::Rgb(236, 228, 214);
    /// Keeps at least 3:1 against `BG`.
    pub const INK_SOFT: Color = Color::Rgb(150, 140, 125);

    pub const AMBER: Color = Color::Rgb(230, 170, 90);
    pub const SLATE: Color = Color::Rgb(150, 190, 200);
    pub const HERB: Color = Color::Rgb(140, 190, 110);
    pub const CLAY: Color = Color::Rgb(220, 140, 80);
    pub const MUSTARD: Color = Color::Rgb(235, 200, 100);
    pub const BRICK: Color = Color::Rgb(225, 95, 95);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub accent: Color,
    pub accent_alt: Color,
    pub bg: Color,
    pub fg: Color,
    pub surface: Color,
    pub highlight: Color,
    pub hint: Color,
    pub border: Color,
    pub border_focus: Color,
    pub ingredient: Color,
    pub product: Color,
    pub flagged: Color,
}

impl ThemePalette {
    pub fn light() -> Self {
        Self {
            accent: Color::Rgb(47, 107, 231),
            accent_alt: Color::Rgb(124, 93, 198),
            bg: Color::Rgb(250, 250, 252),
            fg: Color::Rgb(36, 41, 46),
            surface: Color::Rgb(240, 241, 245),
            highlight: Color::Rgb(226, 232, 240),
            hint: Color::Rgb(110, 118, 129),
            border: Color::Rgb(216, 222, 228),
            border_focus: Color::Rgb(47, 107, 231),
            ingredient: Color::Rgb(45, 138, 72),
            product: Color::Rgb(207, 107, 44),
            flagged: Color::Rgb(200, 40, 70),
        }
    }

    pub fn dark() -> Self {
        Self {
            accent: colors::AMBER,
            accent_alt: colors::SLATE,
            bg: colors::BG,
            fg: colors::INK,
            surface: colors::BG_PANEL,
            highlight: colors::BG_CURSOR,
            hint: colors::INK_SOFT,
            border: colors::RULE,
            border_focus: colors::RULE_ACTIVE,
            ingredient: colors::HERB,
            product: colors::CLAY,
            flagged: colors::BRICK,
        }
    }

    pub fn for_mode(dark: bool) -> Self {
        if dark { Self::dark() } else { Self::light() }
    }

    pub fn title(self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_style(self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focus
        } else {
            self.border
        })
    }

    pub fn hint_style(self) -> Style {
        Style::default().fg(self.hint)
    }

    /// Rows still mid-transition render dimmed.
    pub fn faded(self) -> Style {
        Style::default()
            .fg(self.hint)
            .add_modifier(Modifier::DIM)
    }

    pub fn selected(self) -> Style {
        Style::default()
            .bg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warning(self) -> Style {
        Style::default().fg(colors::MUSTARD)
    }
}

pub fn kbd_style(palette: ThemePalette) -> Style {
    Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::BOLD)
}
