/*
 *  render/color.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
 *
 *  LED palette shared by the segment builder and the overlays
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use embedded_graphics::pixelcolor::Rgb888;

use crate::quote::Direction;

const DONATE_PALETTE: [(u8, u8, u8); 7] = [
    (0xFF, 0x00, 0x00),
    (0xFF, 0x7F, 0x00),
    (0xFF, 0xFF, 0x00),
    (0x00, 0xFF, 0x00),
    (0x00, 0xB3, 0xFF),
    (0x4B, 0x00, 0x82),
    (0x94, 0x00, 0xD3),
];

/// Palette entry, defined once and converted for each drawing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedColor {
    /// symbol labels and the "Market:" caption
    Symbol,
    Up,
    Down,
    Unchanged,
    /// price without a previous close
    Gold,
    /// market closed status
    ClosedRed,
    Black,
    Rgba(u8, u8, u8, u8),
}

impl LedColor {
    pub fn rgba(&self) -> (u8, u8, u8, u8) {
        match self {
            LedColor::Symbol => (0, 179, 255, 255),
            LedColor::Up => (0, 255, 64, 255),
            LedColor::Down => (255, 64, 64, 255),
            LedColor::Unchanged => (255, 255, 255, 255),
            LedColor::Gold => (255, 215, 0, 255),
            LedColor::ClosedRed => (255, 85, 85, 255),
            LedColor::Black => (0, 0, 0, 255),
            LedColor::Rgba(r, g, b, a) => (*r, *g, *b, *a),
        }
    }

    /// Same hue at a different alpha.
    pub fn with_alpha(&self, alpha: u8) -> LedColor {
        let (r, g, b, _) = self.rgba();
        LedColor::Rgba(r, g, b, alpha)
    }

    pub fn to_skia(&self) -> tiny_skia::Color {
        let (r, g, b, a) = self.rgba();
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }

    pub fn to_rgb888(&self) -> Rgb888 {
        let (r, g, b, _) = self.rgba();
        Rgb888::new(r, g, b)
    }

    pub fn alpha(&self) -> u8 {
        self.rgba().3
    }

    /// Price color from the move direction; gold without a previous close.
    pub fn for_direction(direction: Option<Direction>) -> LedColor {
        match direction {
            Some(Direction::Up) => LedColor::Up,
            Some(Direction::Down) => LedColor::Down,
            Some(Direction::Flat) => LedColor::Unchanged,
            None => LedColor::Gold,
        }
    }

    /// Per-character color of the donate banner.
    pub fn donate(index: usize) -> LedColor {
        let (r, g, b) = DONATE_PALETTE[index % DONATE_PALETTE.len()];
        LedColor::Rgba(r, g, b, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_colors() {
        assert_eq!(LedColor::for_direction(Some(Direction::Up)), LedColor::Up);
        assert_eq!(LedColor::for_direction(Some(Direction::Down)), LedColor::Down);
        assert_eq!(LedColor::for_direction(None).rgba(), (255, 215, 0, 255));
    }

    #[test]
    fn test_alpha() {
        assert_eq!(LedColor::Up.with_alpha(50).rgba(), (0, 255, 64, 50));
        assert_eq!(LedColor::Symbol.to_rgb888(), Rgb888::new(0, 179, 255));
    }

    #[test]
    fn test_donate_cycles() {
        assert_eq!(LedColor::donate(0).rgba(), (255, 0, 0, 255));
        assert_eq!(LedColor::donate(4).rgba(), (0, 179, 255, 255));
        assert_eq!(LedColor::donate(7), LedColor::donate(0));
    }
}
