//! CSS color parsing and normalization.
//!
//! Normalized colors use the form a browser reports from computed style:
//! `rgb(r, g, b)` when opaque, `rgba(r, g, b, a)` otherwise.

use std::fmt;

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    pub fn to_css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            let alpha = (self.a * 1000.0).round() / 1000.0;
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }
}

/// A parsed color value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CssColor {
    Rgba(Rgba),
    /// `currentcolor`: resolves to the element's own `color`.
    CurrentColor,
}

impl CssColor {
    /// Resolve against the element's `color`.
    pub fn resolve(self, current: Rgba) -> Rgba {
        match self {
            CssColor::Rgba(c) => c,
            CssColor::CurrentColor => current,
        }
    }
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aqua", (0, 255, 255)),
    ("beige", (245, 245, 220)),
    ("black", (0, 0, 0)),
    ("blue", (0, 0, 255)),
    ("brown", (165, 42, 42)),
    ("coral", (255, 127, 80)),
    ("crimson", (220, 20, 60)),
    ("cyan", (0, 255, 255)),
    ("darkblue", (0, 0, 139)),
    ("darkgray", (169, 169, 169)),
    ("darkgreen", (0, 100, 0)),
    ("darkgrey", (169, 169, 169)),
    ("darkred", (139, 0, 0)),
    ("darkslategray", (47, 79, 79)),
    ("dimgray", (105, 105, 105)),
    ("fuchsia", (255, 0, 255)),
    ("gold", (255, 215, 0)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("grey", (128, 128, 128)),
    ("hotpink", (255, 105, 180)),
    ("indigo", (75, 0, 130)),
    ("ivory", (255, 255, 240)),
    ("khaki", (240, 230, 140)),
    ("lavender", (230, 230, 250)),
    ("lightblue", (173, 216, 230)),
    ("lightgray", (211, 211, 211)),
    ("lightgreen", (144, 238, 144)),
    ("lightgrey", (211, 211, 211)),
    ("lime", (0, 255, 0)),
    ("magenta", (255, 0, 255)),
    ("maroon", (128, 0, 0)),
    ("navy", (0, 0, 128)),
    ("olive", (128, 128, 0)),
    ("orange", (255, 165, 0)),
    ("orchid", (218, 112, 214)),
    ("pink", (255, 192, 203)),
    ("plum", (221, 160, 221)),
    ("purple", (128, 0, 128)),
    ("rebeccapurple", (102, 51, 153)),
    ("red", (255, 0, 0)),
    ("salmon", (250, 128, 114)),
    ("silver", (192, 192, 192)),
    ("skyblue", (135, 206, 235)),
    ("slategray", (112, 128, 144)),
    ("steelblue", (70, 130, 180)),
    ("tan", (210, 180, 140)),
    ("teal", (0, 128, 128)),
    ("tomato", (255, 99, 71)),
    ("turquoise", (64, 224, 208)),
    ("violet", (238, 130, 238)),
    ("wheat", (245, 222, 179)),
    ("white", (255, 255, 255)),
    ("whitesmoke", (245, 245, 245)),
    ("yellow", (255, 255, 0)),
];

/// Parse any supported CSS color syntax.
pub fn parse_color(input: &str) -> Option<CssColor> {
    let value = input.trim().to_ascii_lowercase();
    match value.as_str() {
        "" => return None,
        "transparent" => return Some(CssColor::Rgba(Rgba::TRANSPARENT)),
        "currentcolor" => return Some(CssColor::CurrentColor),
        _ => {}
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).map(CssColor::Rgba);
    }
    if let Some((func, args)) = value.split_once('(') {
        let args = args.strip_suffix(')')?;
        return match func.trim() {
            "rgb" | "rgba" => parse_rgb_args(args).map(CssColor::Rgba),
            "hsl" | "hsla" => parse_hsl_args(args).map(CssColor::Rgba),
            _ => None,
        };
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, (r, g, b))| CssColor::Rgba(Rgba::new(*r, *g, *b, 1.0)))
}

/// Normalize a concrete color to its computed-style spelling.
///
/// Returns `None` for `currentcolor` and anything unparseable.
pub fn normalize_color(input: &str) -> Option<String> {
    match parse_color(input)? {
        CssColor::Rgba(c) => Some(c.to_css()),
        CssColor::CurrentColor => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba::new(digit(0)?, digit(1)?, digit(2)?, 1.0)),
        4 => Some(Rgba::new(
            digit(0)?,
            digit(1)?,
            digit(2)?,
            f64::from(digit(3)?) / 255.0,
        )),
        6 => Some(Rgba::new(pair(0)?, pair(2)?, pair(4)?, 1.0)),
        8 => Some(Rgba::new(
            pair(0)?,
            pair(2)?,
            pair(4)?,
            f64::from(pair(6)?) / 255.0,
        )),
        _ => None,
    }
}

/// Split function arguments on commas, whitespace or `/`.
fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_channel(token: &str) -> Option<u8> {
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? * 255.0 / 100.0,
        None => token.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(token: Option<&&str>) -> Option<f64> {
    let Some(token) = token else {
        return Some(1.0);
    };
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => token.parse::<f64>().ok()?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    Some(Rgba::new(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
        parse_alpha(parts.get(3))?,
    ))
}

fn parse_hsl_args(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    let hue = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
    let sat = parts[1].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    let light = parts[2].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    let alpha = parse_alpha(parts.get(3))?;

    let (r, g, b) = hsl_to_rgb(hue, sat.clamp(0.0, 1.0), light.clamp(0.0, 1.0));
    Some(Rgba::new(r, g, b, alpha))
}

fn hsl_to_rgb(hue: f64, sat: f64, light: f64) -> (u8, u8, u8) {
    let h = hue.rem_euclid(360.0) / 360.0;
    let q = if light < 0.5 {
        light * (1.0 + sat)
    } else {
        light + sat - light * sat
    };
    let p = 2.0 * light - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(normalize_color("#fff").as_deref(), Some("rgb(255, 255, 255)"));
        assert_eq!(normalize_color("#667EEA").as_deref(), Some("rgb(102, 126, 234)"));
        assert_eq!(normalize_color("#ff000080").as_deref(), Some("rgba(255, 0, 0, 0.502)"));
        assert_eq!(normalize_color("#12345"), None);
    }

    #[test]
    fn test_functional_forms() {
        assert_eq!(normalize_color("rgb(1,2,3)").as_deref(), Some("rgb(1, 2, 3)"));
        assert_eq!(
            normalize_color("rgba(0, 0, 0, 0.05)").as_deref(),
            Some("rgba(0, 0, 0, 0.05)")
        );
        assert_eq!(normalize_color("rgb(0 128 255 / 50%)").as_deref(), Some("rgba(0, 128, 255, 0.5)"));
        assert_eq!(normalize_color("hsl(0, 100%, 50%)").as_deref(), Some("rgb(255, 0, 0)"));
        assert_eq!(normalize_color("hsl(120deg 100% 25%)").as_deref(), Some("rgb(0, 128, 0)"));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(normalize_color("Red").as_deref(), Some("rgb(255, 0, 0)"));
        assert_eq!(normalize_color("transparent").as_deref(), Some("rgba(0, 0, 0, 0)"));
        assert_eq!(parse_color("currentColor"), Some(CssColor::CurrentColor));
        assert_eq!(normalize_color("currentColor"), None);
        assert_eq!(normalize_color("var(--brand)"), None);
    }
}
