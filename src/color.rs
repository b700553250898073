use image::Rgba;

use crate::error::{Result, WaveError};

/// Parse `#RGB`, `#RRGGBB`, `#RRGGBBAA`, or `r,g,b[,a]` with components in `[0, 1]`.
pub fn parse_color(s: &str) -> Result<Rgba<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| {
            WaveError::input(format!(
                "color '{s}' must be a hexadecimal code like #RGB, #RRGGBB or #RRGGBBAA"
            ))
        });
    }

    let invalid = || {
        WaveError::input(format!(
            "color '{s}' must be in format 0.xx,0.xx,0.xx[,0.xx] or #RRGGBB"
        ))
    };
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| invalid())?;
    if !(3..=4).contains(&parts.len()) || parts.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(invalid());
    }

    let to_u8 = |v: f64| (v * 255.0) as u8;
    Ok(Rgba([
        to_u8(parts[0]),
        to_u8(parts[1]),
        to_u8(parts[2]),
        parts.get(3).map_or(255, |&a| to_u8(a)),
    ]))
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let alpha = if expanded.len() == 8 { byte(6)? } else { 255 };
    Some(Rgba([byte(0)?, byte(2)?, byte(4)?, alpha]))
}
