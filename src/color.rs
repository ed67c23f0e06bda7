//! sRGB transfer function and the RGBA128 literal parser (spec.md §6).

use crate::math::RGB128;

const SRGB_THRESHOLD: f32 = 0.0031308;
const SRGB_LINEAR_SLOPE: f32 = 12.92;
const SRGB_POWER: f32 = 2.4;
const SRGB_OFFSET: f32 = 0.055;

/// Linear -> sRGB (the "forward" direction spec.md §8 round-trips against
/// `inverse`).
pub fn srgb_forward(x: f32) -> f32 {
    if x <= SRGB_THRESHOLD {
        x * SRGB_LINEAR_SLOPE
    } else {
        (1.0 + SRGB_OFFSET) * x.powf(1.0 / SRGB_POWER) - SRGB_OFFSET
    }
}

/// sRGB -> linear.
pub fn srgb_inverse(x: f32) -> f32 {
    if x <= SRGB_THRESHOLD * SRGB_LINEAR_SLOPE {
        x / SRGB_LINEAR_SLOPE
    } else {
        ((x + SRGB_OFFSET) / (1.0 + SRGB_OFFSET)).powf(SRGB_POWER)
    }
}

/// A parsed RGBA128 literal: premultiplied-alpha-free, full-precision
/// color plus an opacity channel (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RGBA128 {
    pub color: RGB128,
    pub alpha: f32,
}

impl RGBA128 {
    pub fn opaque(color: RGB128) -> Self {
        Self { color, alpha: 1.0 }
    }
}

/// Parses the literal forms spec.md §6 lists: `0x...`, `#...` (1/3/4/6/8 hex
/// digits), `rgb(r, g, b[, a])` with 0-255 integers, and `hdr(r, g, b[, a])`
/// with floats. Whitespace is trimmed; a missing alpha channel defaults to
/// fully opaque.
pub fn parse_rgba128(literal: &str) -> Option<RGBA128> {
    let s = literal.trim();
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return parse_hex(rest);
    }
    if let Some(rest) = s.strip_prefix('#') {
        return parse_hex(rest);
    }
    if let Some(rest) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        return parse_rgb_call(rest, 255.0);
    }
    if let Some(rest) = s.strip_prefix("hdr(").and_then(|r| r.strip_suffix(')')) {
        return parse_rgb_call(rest, 1.0);
    }
    None
}

fn parse_rgb_call(body: &str, int_scale: f32) -> Option<RGBA128> {
    let parts: Vec<&str> = body.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let parse_channel = |text: &str| -> Option<f32> {
        if int_scale == 255.0 {
            text.parse::<u32>().ok().map(|v| v as f32 / 255.0)
        } else {
            text.parse::<f32>().ok()
        }
    };
    let r = parse_channel(parts[0])?;
    let g = parse_channel(parts[1])?;
    let b = parse_channel(parts[2])?;
    let alpha = if parts.len() == 4 { parse_channel(parts[3])? } else { 1.0 };
    Some(RGBA128 {
        color: RGB128::new(r, g, b),
        alpha,
    })
}

fn parse_hex(digits: &str) -> Option<RGBA128> {
    fn hex_pair(s: &str, i: usize) -> Option<f32> {
        u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok().map(|v| v as f32 / 255.0)
    }
    fn hex_single(s: &str, i: usize) -> Option<f32> {
        let c = s.as_bytes()[i] as char;
        u8::from_str_radix(&c.to_string(), 16).ok().map(|v| (v * 17) as f32 / 255.0)
    }

    match digits.len() {
        1 => {
            let v = hex_single(digits, 0)?;
            Some(RGBA128::opaque(RGB128::splat(v)))
        }
        3 => {
            let r = hex_single(digits, 0)?;
            let g = hex_single(digits, 1)?;
            let b = hex_single(digits, 2)?;
            Some(RGBA128::opaque(RGB128::new(r, g, b)))
        }
        4 => {
            let r = hex_single(digits, 0)?;
            let g = hex_single(digits, 1)?;
            let b = hex_single(digits, 2)?;
            let a = hex_single(digits, 3)?;
            Some(RGBA128 {
                color: RGB128::new(r, g, b),
                alpha: a,
            })
        }
        6 => {
            let r = hex_pair(digits, 0)?;
            let g = hex_pair(digits, 1)?;
            let b = hex_pair(digits, 2)?;
            Some(RGBA128::opaque(RGB128::new(r, g, b)))
        }
        8 => {
            let r = hex_pair(digits, 0)?;
            let g = hex_pair(digits, 1)?;
            let b = hex_pair(digits, 2)?;
            let a = hex_pair(digits, 3)?;
            Some(RGBA128 {
                color: RGB128::new(r, g, b),
                alpha: a,
            })
        }
        _ => None,
    }
}
