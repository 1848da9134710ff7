use crate::foundation::error::{StageError, StageResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> StageResult<Self> {
        if den == 0 {
            return Err(StageError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StageError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// Straight-alpha RGBA8 color, as written in element props.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Fill used for sprites whose texture is missing or still loading (`#FF69B4`).
    pub const HOT_PINK: Self = Self::new(0xFF, 0x69, 0xB4, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Parse a CSS-like color string.
    ///
    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` (alpha in
    /// `[0, 1]`), `transparent` and a handful of named colors.
    pub fn parse(s: &str) -> StageResult<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_fn(args);
        }

        named(&lower).ok_or_else(|| StageError::validation(format!("unknown color \"{s}\"")))
    }
}

fn parse_hex(hex: &str) -> StageResult<Rgba8> {
    let bad = || StageError::validation(format!("invalid hex color \"#{hex}\""));
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    let nibble = |i: usize| {
        u8::from_str_radix(&hex[i..i + 1], 16)
            .map(|v| v * 17)
            .map_err(|_| bad())
    };

    match hex.len() {
        3 => Ok(Rgba8::new(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        6 => Ok(Rgba8::new(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Ok(Rgba8::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => Err(bad()),
    }
}

fn parse_rgb_fn(args: &str) -> StageResult<Rgba8> {
    let parts = args
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StageError::validation(format!("invalid rgb() component: {e}")))?;

    let channel = |v: f64| v.clamp(0.0, 255.0).round() as u8;
    match parts.as_slice() {
        [r, g, b] => Ok(Rgba8::new(channel(*r), channel(*g), channel(*b), 255)),
        [r, g, b, a] => Ok(Rgba8::new(
            channel(*r),
            channel(*g),
            channel(*b),
            (a.clamp(0.0, 1.0) * 255.0).round() as u8,
        )),
        _ => Err(StageError::validation(
            "rgb()/rgba() expects 3 or 4 components",
        )),
    }
}

fn named(name: &str) -> Option<Rgba8> {
    let c = match name {
        "transparent" => Rgba8::TRANSPARENT,
        "black" => Rgba8::BLACK,
        "white" => Rgba8::new(255, 255, 255, 255),
        "red" => Rgba8::new(255, 0, 0, 255),
        "green" => Rgba8::new(0, 128, 0, 255),
        "blue" => Rgba8::new(0, 0, 255, 255),
        "yellow" => Rgba8::new(255, 255, 0, 255),
        "gray" | "grey" => Rgba8::new(128, 128, 128, 255),
        "hotpink" => Rgba8::HOT_PINK,
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
