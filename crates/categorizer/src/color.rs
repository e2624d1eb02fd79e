/// Category colours.
///
/// Stored colours are always hex (`#RGB` / `#RRGGBB`). Generated colours are pastels:
/// a random hue at fixed saturation and lightness, converted from HSL to hex.
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

const PASTEL_SATURATION: f64 = 0.70;
const PASTEL_LIGHTNESS: f64 = 0.80;

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("valid regex"));

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value)
}

/// A pastel colour with a random hue.
pub fn random_pastel() -> String {
    let hue = rand::thread_rng().gen_range(0u16..360);
    hsl_to_hex(f64::from(hue), PASTEL_SATURATION, PASTEL_LIGHTNESS)
}

/// `hue` in degrees, `saturation` and `lightness` in `0.0..=1.0`. Returns `#RRGGBB`.
pub fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let hue = hue.rem_euclid(360.0);
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = lightness - chroma / 2.0;

    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b))
}
