use regex::Regex;

use crate::schedule::same_color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub color: &'static str,
}

/// Highlight colors offered on every task cell.
pub const SWATCHES: [Swatch; 5] = [
    Swatch {
        name: "yellow",
        color: "rgb(255, 249, 196)",
    },
    Swatch {
        name: "blue",
        color: "rgb(187, 222, 251)",
    },
    Swatch {
        name: "green",
        color: "rgb(200, 230, 201)",
    },
    Swatch {
        name: "pink",
        color: "rgb(248, 187, 208)",
    },
    Swatch {
        name: "purple",
        color: "rgb(225, 190, 231)",
    },
];

/// Accepts a 1-based swatch number or a swatch name.
pub fn resolve_swatch(token: &str) -> Option<Swatch> {
    let token = token.trim().to_ascii_lowercase();
    if let Ok(number) = token.parse::<usize>() {
        return number.checked_sub(1).and_then(|idx| SWATCHES.get(idx).copied());
    }
    SWATCHES.iter().copied().find(|swatch| swatch.name == token)
}

pub fn swatch_name(color: &str) -> Option<&'static str> {
    SWATCHES
        .iter()
        .find(|swatch| same_color(swatch.color, color))
        .map(|swatch| swatch.name)
}

/// Reads `rgb(r, g, b)` or `#rrggbb` into channel values.
pub fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let trimmed = color.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
        return Some((channel(0..2)?, channel(2..4)?, channel(4..6)?));
    }

    let rgb_re =
        Regex::new(r"(?i)^rgb\(\s*(?P<r>\d{1,3})\s*,\s*(?P<g>\d{1,3})\s*,\s*(?P<b>\d{1,3})\s*\)$")
            .ok()?;
    let captures = rgb_re.captures(trimmed)?;
    let r = captures.name("r")?.as_str().parse::<u8>().ok()?;
    let g = captures.name("g")?.as_str().parse::<u8>().ok()?;
    let b = captures.name("b")?.as_str().parse::<u8>().ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::{parse_rgb, resolve_swatch, swatch_name};

    #[test]
    fn swatches_resolve_by_number_or_name() {
        assert_eq!(resolve_swatch("1").map(|s| s.name), Some("yellow"));
        assert_eq!(resolve_swatch("Purple").map(|s| s.color), Some("rgb(225, 190, 231)"));
        assert!(resolve_swatch("0").is_none());
        assert!(resolve_swatch("6").is_none());
        assert!(resolve_swatch("orange").is_none());
    }

    #[test]
    fn names_stored_colors_regardless_of_spacing() {
        assert_eq!(swatch_name("rgb(255,249,196)"), Some("yellow"));
        assert_eq!(swatch_name("rgb(1, 2, 3)"), None);
    }

    #[test]
    fn parses_rgb_and_hex() {
        assert_eq!(parse_rgb("rgb(200, 230, 201)"), Some((200, 230, 201)));
        assert_eq!(parse_rgb("#ff0080"), Some((255, 0, 128)));
        assert_eq!(parse_rgb("rgb(300, 0, 0)"), None);
        assert_eq!(parse_rgb("teal"), None);
    }
}
