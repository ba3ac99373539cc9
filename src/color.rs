//! Hex colour strings for the overlay settings

use x11rb::protocol::render::Color;

/// A colour written as `#AARRGGBB`, or `#RRGGBB` for an opaque colour.
/// The leading `#` is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(u32);

impl HexColor {
    pub fn parse(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Self(0xFF00_0000 | value)),
            8 => Some(Self(value)),
            _ => None,
        }
    }

    pub fn from_argb32(argb: u32) -> Self {
        Self(argb)
    }

    pub fn argb32(&self) -> u32 {
        self.0
    }

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn to_hex_string(&self) -> String {
        format!("#{:08X}", self.0)
    }

    /// RENDER colour with premultiplied alpha, as composited by
    /// `FillRectangles` on an ARGB picture
    pub fn to_x11_color(&self) -> Color {
        let alpha = self.alpha() as u32;
        let channel = |shift: u32| {
            let value = (self.0 >> shift) & 0xFF;
            ((value * alpha / 0xFF) * 0x101) as u16
        };
        Color {
            red: channel(16),
            green: channel(8),
            blue: channel(0),
            alpha: (alpha * 0x101) as u16,
        }
    }
}
