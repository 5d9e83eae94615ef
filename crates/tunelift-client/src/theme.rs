//! Console color palettes for the light and dark themes.

use tunelift_proto::prefs::Theme;

#[derive(Debug, Clone, Copy)]
pub struct Rgb(pub u8, pub u8, pub u8);

// ── Color palette ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub success: Rgb,
    pub error: Rgb,
    pub pending: Rgb,
}

const DARK: Palette = Palette {
    primary: Rgb(210, 210, 225),
    secondary: Rgb(115, 115, 138),
    accent: Rgb(120, 100, 200),
    success: Rgb(80, 200, 120),
    error: Rgb(255, 95, 95),
    pending: Rgb(255, 184, 80),
};

const LIGHT: Palette = Palette {
    primary: Rgb(30, 30, 40),
    secondary: Rgb(90, 90, 110),
    accent: Rgb(29, 185, 84),
    success: Rgb(20, 130, 60),
    error: Rgb(200, 30, 30),
    pending: Rgb(170, 100, 0),
};

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => LIGHT,
            Theme::Dark => DARK,
        }
    }
}

// ── Styling ───────────────────────────────────────────────────────────────────

/// Wrap `text` in a 24-bit foreground color escape.
pub fn paint(color: Rgb, text: &str) -> String {
    let Rgb(r, g, b) = color;
    format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, text)
}

pub fn bold(text: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", text)
}

/// `[#####.....]  55%`
pub fn progress_bar(progress: u8, width: usize) -> String {
    let filled = (progress.min(100) as usize * width) / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(width - filled),
        progress.min(100)
    )
}
