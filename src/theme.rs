//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::token::TokenKind;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Token colours in TokenKind::color_index order, with the theme keys that may override each.
const TOKEN_KEYS: [(&[&str], Color); 6] = [
    (&["mem_box", "cpu_start"], Color::Rgb(0x98, 0xC3, 0x79)), // green
    (&["title", "cpu_mid"], Color::Rgb(0xE5, 0xC0, 0x7B)),     // yellow
    (&["cpu_end", "temp_end"], Color::Rgb(0xE0, 0x6C, 0x75)),  // red
    (&["cpu_box"], Color::Rgb(0x61, 0xAF, 0xEF)),              // blue
    (&["net_box"], Color::Rgb(0xC6, 0x78, 0xDD)),              // magenta
    (&["hi_fg", "proc_misc"], Color::Rgb(0x56, 0xB6, 0xC2)),   // cyan
];

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Drop colours, indexed by TokenKind::color_index.
    pub tokens: [Color; 6],
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (state, counters).
    pub main_fg: Color,
    /// Highlight / titles / cursor.
    pub title: Color,
    /// Closed (non-spawning) columns.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark defaults (hex values from onedark.theme).
    pub fn onedark_default() -> Self {
        Self {
            tokens: TOKEN_KEYS.map(|(_, c)| c),
            bg: Color::Rgb(0x31, 0x35, 0x3F),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }

    /// Load theme from a btop-style file; One Dark when `path` is None or missing.
    /// `palette` then overrides the token colours.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.tokens = [
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0xFF),
                ];
            }
            crate::Palette::Colorblind => {
                // Paul Tol's bright scheme; no red/green pair carries meaning alone.
                self.tokens = [
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0xCC, 0x33, 0x11),
                    Color::Rgb(0xEE, 0x33, 0x77),
                    Color::Rgb(0xBB, 0xBB, 0x00),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let defaults = Self::onedark_default();
        Self {
            tokens: TOKEN_KEYS.map(|(keys, fallback)| {
                keys.iter().find_map(|k| get(*k)).unwrap_or(fallback)
            }),
            bg: get("meter_bg").unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            inactive_fg: get("inactive_fg").unwrap_or(defaults.inactive_fg),
        }
    }

    #[inline]
    pub fn token_color(&self, kind: TokenKind) -> Color {
        self.tokens[kind.color_index() as usize % 6]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some((key, value)) = rest.split_once(']') else {
            continue;
        };
        let Some((_, value)) = value.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let bad = || ThemeError::InvalidHex(s.to_string());
    let channel = |i: usize, len: usize| u8::from_str_radix(&s[i..i + len], 16).map_err(|_| bad());
    let (r, g, b) = match s.len() {
        6 if s.is_ascii() => (channel(0, 2)?, channel(2, 2)?, channel(4, 2)?),
        3 if s.is_ascii() => (channel(0, 1)? * 17, channel(1, 1)? * 17, channel(2, 1)? * 17),
        _ => return Err(bad()),
    };
    Ok(Color::Rgb(r, g, b))
}
