//! Theme data model: built-in palettes and resolution from config.

use ratatui::style::Color;

use crate::config::{ThemeColorsConfig, ThemeConfig};

// ── Runtime theme colors ─────────────────────────────────────────────────────

/// All runtime colors used in the UI.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Tree panel
    pub tree_fg: Color,
    pub tree_focused_bg: Color,
    pub tree_selected_fg: Color,
    pub tree_dir_fg: Color,
    pub badge_fg: Color,

    pub preview_fg: Color,

    pub status_bg: Color,
    pub status_fg: Color,

    pub border_fg: Color,
    pub border_focused_fg: Color,

    // Semantic colors (not configurable)
    pub error_fg: Color,
    pub success_fg: Color,
    pub info_fg: Color,
    pub accent_fg: Color,
    pub dim_fg: Color,
}

// ── Built-in palettes ────────────────────────────────────────────────────────

/// Dark theme using Catppuccin Mocha palette.
pub fn dark_theme() -> ThemeColors {
    ThemeColors {
        tree_fg: Color::Rgb(205, 214, 244),         // #cdd6f4 (text)
        tree_focused_bg: Color::Rgb(69, 71, 90),    // #45475a (surface1)
        tree_selected_fg: Color::Rgb(249, 226, 175), // #f9e2af (yellow)
        tree_dir_fg: Color::Rgb(137, 180, 250),     // #89b4fa (blue)
        badge_fg: Color::Rgb(166, 227, 161),        // #a6e3a1 (green)

        preview_fg: Color::Rgb(205, 214, 244),

        status_bg: Color::Rgb(30, 30, 46), // #1e1e2e (base)
        status_fg: Color::Rgb(205, 214, 244),

        border_fg: Color::Rgb(88, 91, 112),           // #585b70 (surface2)
        border_focused_fg: Color::Rgb(137, 180, 250), // #89b4fa (blue)

        error_fg: Color::Rgb(243, 139, 168),  // #f38ba8 (red)
        success_fg: Color::Rgb(166, 227, 161), // #a6e3a1 (green)
        info_fg: Color::Rgb(137, 180, 250),   // #89b4fa (blue)
        accent_fg: Color::Rgb(203, 166, 247), // #cba6f7 (mauve)
        dim_fg: Color::Rgb(108, 112, 134),    // #6c7086 (overlay0)
    }
}

/// Light theme using Catppuccin Latte palette.
pub fn light_theme() -> ThemeColors {
    ThemeColors {
        tree_fg: Color::Rgb(76, 79, 105),             // #4c4f69 (text)
        tree_focused_bg: Color::Rgb(204, 208, 218),   // #ccd0da (surface1)
        tree_selected_fg: Color::Rgb(223, 142, 29),   // #df8e1d (yellow)
        tree_dir_fg: Color::Rgb(30, 102, 245),        // #1e66f5 (blue)
        badge_fg: Color::Rgb(64, 160, 43),            // #40a02b (green)

        preview_fg: Color::Rgb(76, 79, 105),

        status_bg: Color::Rgb(239, 241, 245), // #eff1f5 (base)
        status_fg: Color::Rgb(76, 79, 105),

        border_fg: Color::Rgb(172, 176, 190), // #acb0be (surface2)
        border_focused_fg: Color::Rgb(30, 102, 245),

        error_fg: Color::Rgb(210, 15, 57),   // #d20f39 (red)
        success_fg: Color::Rgb(64, 160, 43), // #40a02b (green)
        info_fg: Color::Rgb(30, 102, 245),
        accent_fg: Color::Rgb(136, 57, 239), // #8839ef (mauve)
        dim_fg: Color::Rgb(156, 160, 176),   // #9ca0b0 (overlay0)
    }
}

// ── Color parsing ────────────────────────────────────────────────────────────

/// Parse a hex color string like `"#aabbcc"` into a `ratatui::style::Color`.
/// Returns `None` for malformed input.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

// ── Theme resolution ─────────────────────────────────────────────────────────

/// Resolve the final `ThemeColors` from config.
///
/// `"custom"` starts from the dark palette and applies the hex overrides;
/// unknown schemes fall back to dark.
pub fn resolve_theme(config: &ThemeConfig) -> ThemeColors {
    match config.scheme.as_deref().unwrap_or("dark") {
        "light" => light_theme(),
        "custom" => {
            let mut theme = dark_theme();
            if let Some(custom) = &config.custom {
                apply_custom_colors(&mut theme, custom);
            }
            theme
        }
        _ => dark_theme(),
    }
}

/// Apply each well-formed hex override; malformed ones keep the base color.
fn apply_custom_colors(theme: &mut ThemeColors, custom: &ThemeColorsConfig) {
    let overrides = [
        (&mut theme.tree_fg, &custom.tree_fg),
        (&mut theme.tree_focused_bg, &custom.tree_focused_bg),
        (&mut theme.tree_selected_fg, &custom.tree_selected_fg),
        (&mut theme.tree_dir_fg, &custom.tree_dir_fg),
        (&mut theme.badge_fg, &custom.badge_fg),
        (&mut theme.preview_fg, &custom.preview_fg),
        (&mut theme.status_bg, &custom.status_bg),
        (&mut theme.status_fg, &custom.status_fg),
        (&mut theme.border_fg, &custom.border_fg),
    ];
    for (slot, hex) in overrides {
        if let Some(color) = hex.as_deref().and_then(parse_hex_color) {
            *slot = color;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
