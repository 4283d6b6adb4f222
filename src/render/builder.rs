/*
 *  render/builder.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
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

//! Turns the price store into the ordered list of scroll segments.
//!
//! Segments are rebuilt wholesale. Layout only depends on the quotes, the
//! active glows and the visual settings, so two builds over the same state
//! produce the same widths and hit regions.

use log::debug;
use tiny_skia::Pixmap;

use super::canvas::{blit_scaled, new_pixmap};
use super::color::LedColor;
use super::glyphs::GlyphRenderer;
use super::segment::{HitRegion, RegionKind, RenderSegment};
use super::text::{scale_for, Face, TextRasterizer};
use super::RenderError;
use crate::config::{IndicatorStyle, Settings};
use crate::constants::{DONATE_TEXT, FONT_SCALE, GLOW_ALPHA, ICON_SCALE, SUBTLE_GLOW_ALPHA};
use crate::func_timer::FunctionTimer;
use crate::icons::IconCache;
use crate::market::MarketStatus;
use crate::price_state::PriceStore;
use crate::quote::{indicator_rotation, Direction, Quote};
use crate::symbol::Symbol;

const SEPARATOR: &str = "      ";
const ICON_GAP: u32 = 8;
const CHANGE_GAP: u32 = 10;
const TRAIL: u32 = 20;
const LINE_GAP: u32 = 2;
const DONATE_PAD: u32 = 20;
/// Small face height as a fraction of the panel.
const SMALL_SCALE: f32 = 0.35;

/// Visual settings a build depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Look {
    pub height: u32,
    pub show_change_pct: bool,
    pub global_text_glow: bool,
    pub indicator_style: IndicatorStyle,
}

impl From<&Settings> for Look {
    fn from(s: &Settings) -> Self {
        Self {
            height: s.ticker_height,
            show_change_pct: s.show_change_pct,
            global_text_glow: s.global_text_glow,
            indicator_style: s.price_indicator_style,
        }
    }
}

impl Look {
    fn main_scale(&self) -> u32 {
        scale_for(Face::Main, self.height, FONT_SCALE)
    }

    fn small_scale(&self) -> u32 {
        scale_for(Face::Small, self.height, SMALL_SCALE)
    }

    fn icon_size(&self) -> u32 {
        (self.height as f32 * ICON_SCALE) as u32
    }

    /// Width of `text` in the main face on the panel.
    fn main_width(&self, text: &str) -> u32 {
        Face::Main.text_width(text) * self.main_scale()
    }

    fn small_width(&self, text: &str) -> u32 {
        Face::Small.text_width(text) * self.small_scale()
    }

    /// Top of a main face line, vertically centred.
    fn main_top(&self) -> f32 {
        let h = Face::Main.cell().1 * self.main_scale();
        (self.height as f32 - h as f32) / 2.0
    }

    fn small_line(&self) -> u32 {
        Face::Small.cell().1 * self.small_scale()
    }
}

/// Draws scaled text rasters into one segment bitmap.
struct Pen<'a> {
    dst: &'a mut Pixmap,
    text: &'a TextRasterizer,
}

impl Pen<'_> {
    fn text(&mut self, s: &str, face: Face, color: LedColor, x: f32, y: f32, scale: u32) -> Result<(), RenderError> {
        if s.trim().is_empty() {
            return Ok(());
        }
        let raster = self.text.raster(s, face, color.with_alpha(255))?;
        blit_scaled(self.dst, &raster, x, y, scale as f32, color.alpha() as f32 / 255.0);
        Ok(())
    }

    /// Redraw `s` at every offset within `reach`, the centre excluded.
    #[allow(clippy::too_many_arguments)]
    fn halo(
        &mut self,
        s: &str,
        face: Face,
        color: LedColor,
        x: f32,
        y: f32,
        scale: u32,
        reach: i32,
    ) -> Result<(), RenderError> {
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if dx == 0 && dy == 0 {
                    continue;
                }
                self.text(s, face, color, x + dx as f32, y + dy as f32, scale)?;
            }
        }
        Ok(())
    }

    /// Text with whichever glow applies on top of its halo.
    #[allow(clippy::too_many_arguments)]
    fn glowing_text(
        &mut self,
        s: &str,
        face: Face,
        color: LedColor,
        x: f32,
        y: f32,
        scale: u32,
        glow: Glow,
    ) -> Result<(), RenderError> {
        match glow {
            Glow::Strong(halo) => self.halo(s, face, halo, x, y, scale, 2)?,
            Glow::Subtle => self.halo(s, face, color.with_alpha(SUBTLE_GLOW_ALPHA), x, y, scale, 1)?,
            Glow::None => {}
        }
        self.text(s, face, color, x, y, scale)
    }
}

#[derive(Debug, Clone, Copy)]
enum Glow {
    None,
    Subtle,
    Strong(LedColor),
}

/// Segment factory with memoized text and glyph rasters.
pub struct SegmentBuilder {
    text: TextRasterizer,
    glyphs: GlyphRenderer,
    donate: Option<RenderSegment>,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self {
            text: TextRasterizer::new(512),
            glyphs: GlyphRenderer::new(64),
            donate: None,
        }
    }

    /// Market status segment followed by one segment per symbol.
    pub fn build(
        &mut self,
        symbols: &[Symbol],
        store: &PriceStore,
        market: MarketStatus,
        icons: &mut IconCache,
        look: &Look,
    ) -> Result<Vec<RenderSegment>, RenderError> {
        let _timer = FunctionTimer::new("build_segments");
        let mut segments = Vec::with_capacity(symbols.len() + 1);
        segments.push(self.market_segment(market, look)?);
        for symbol in symbols {
            let quote = store.display_quote(symbol);
            let glow = store.glow(symbol).map(|_| glow_color(&quote));
            segments.push(self.symbol_segment(symbol, quote, glow, icons, look)?);
        }
        debug!("built {} segments", segments.len());
        Ok(segments)
    }

    fn market_segment(&self, market: MarketStatus, look: &Look) -> Result<RenderSegment, RenderError> {
        let label = "Market: ";
        let status = market.label();
        let label_w = look.main_width(label);
        let status_w = look.main_width(status);
        let x0 = ICON_GAP;
        let width = x0 + label_w + status_w + look.main_width(SEPARATOR) + TRAIL;

        let mut bitmap = new_pixmap(width, look.height)?;
        let status_color = if market.is_open() { LedColor::Up } else { LedColor::ClosedRed };
        let glow = if look.global_text_glow { Glow::Subtle } else { Glow::None };
        let (y, scale) = (look.main_top(), look.main_scale());
        {
            let mut pen = Pen { dst: &mut bitmap, text: &self.text };
            pen.glowing_text(label, Face::Main, LedColor::Symbol, x0 as f32, y, scale, glow)?;
            pen.glowing_text(status, Face::Main, status_color, (x0 + label_w) as f32, y, scale, glow)?;
        }
        let regions = vec![
            HitRegion::new(RegionKind::MarketLabel, None, x0 as i32, label_w, look.height),
            HitRegion::new(RegionKind::MarketStatus, None, (x0 + label_w) as i32, status_w, look.height),
        ];
        Ok(RenderSegment::new(bitmap, regions))
    }

    fn symbol_segment(
        &self,
        symbol: &Symbol,
        quote: Quote,
        glow: Option<LedColor>,
        icons: &mut IconCache,
        look: &Look,
    ) -> Result<RenderSegment, RenderError> {
        let h = look.height;
        let icon_size = look.icon_size();
        let name = format!("{} ", symbol.display_name());
        let name_w = look.main_width(&name);
        let price_text = quote.price_text();
        let price_w = look.main_width(&price_text);

        let change = quote.change_texts().map(|(abs, pct)| {
            let pct = if look.show_change_pct { Some(pct) } else { None };
            (abs, pct)
        });
        let glyph_size = look.small_line();
        let change_w = change.as_ref().map(|(abs, pct)| {
            let text_w = look.small_width(abs).max(pct.as_deref().map_or(0, |p| look.small_width(p)));
            text_w + LINE_GAP + glyph_size
        });

        let width = icon_size
            + ICON_GAP
            + name_w
            + price_w
            + change_w.map_or(0, |w| CHANGE_GAP + w)
            + look.main_width(SEPARATOR)
            + TRAIL;
        let mut bitmap = new_pixmap(width, h)?;
        let mut regions = Vec::with_capacity(3);

        if let Some(icon) = icons.get(symbol, icon_size) {
            let y = (h.saturating_sub(icon_size) / 2) as f32;
            blit_scaled(&mut bitmap, &icon, 0.0, y, 1.0, 1.0);
        }

        let subtle = if look.global_text_glow { Glow::Subtle } else { Glow::None };
        let value_glow = glow.map_or(subtle, Glow::Strong);
        let direction_color = LedColor::for_direction(quote.direction());
        let (y, scale) = (look.main_top(), look.main_scale());

        let mut x = icon_size + ICON_GAP;
        {
            let mut pen = Pen { dst: &mut bitmap, text: &self.text };
            pen.glowing_text(&name, Face::Main, LedColor::Symbol, x as f32, y, scale, subtle)?;
            regions.push(HitRegion::new(RegionKind::Symbol, Some(symbol), x as i32, name_w, h));
            x += name_w;

            pen.glowing_text(&price_text, Face::Main, direction_color, x as f32, y, scale, value_glow)?;
            regions.push(HitRegion::new(RegionKind::Price, Some(symbol), x as i32, price_w, h));
            x += price_w;
        }

        if let (Some((abs, pct)), Some(change_w)) = (change, change_w) {
            let line = look.small_line();
            let lines = if pct.is_some() { 2 } else { 1 };
            let stacked = lines * line + (lines - 1) * LINE_GAP;
            let top = (h.saturating_sub(stacked) / 2) as f32;
            let cx = (x + CHANGE_GAP) as f32;
            let small = look.small_scale();
            {
                let mut pen = Pen { dst: &mut bitmap, text: &self.text };
                pen.glowing_text(&abs, Face::Small, direction_color, cx, top, small, value_glow)?;
                if let Some(pct) = &pct {
                    let y2 = top + (line + LINE_GAP) as f32;
                    pen.glowing_text(pct, Face::Small, direction_color, cx, y2, small, value_glow)?;
                }
            }

            let pct_value = quote.change_pct().unwrap_or(0.0);
            let glyph = self.glyphs.glyph(
                look.indicator_style,
                indicator_rotation(pct_value),
                direction_color,
                glyph_size,
            )?;
            let gx = x + CHANGE_GAP + change_w - glyph_size;
            blit_scaled(&mut bitmap, &glyph, gx as f32, top, 1.0, 1.0);

            regions.push(HitRegion::new(RegionKind::Change, Some(symbol), (x + CHANGE_GAP) as i32, change_w, h));
        }

        Ok(RenderSegment::new(bitmap, regions))
    }

    /// Rainbow donate banner, built once per panel height.
    pub fn donate(&mut self, height: u32) -> Result<RenderSegment, RenderError> {
        if let Some(seg) = self.donate.as_ref().filter(|s| s.bitmap.height() == height.max(1)) {
            return Ok(seg.clone());
        }
        let look = Look {
            height,
            show_change_pct: false,
            global_text_glow: false,
            indicator_style: IndicatorStyle::default(),
        };
        let width = look.main_width(DONATE_TEXT) + 2 * DONATE_PAD;
        let mut bitmap = new_pixmap(width, height)?;
        let (y, scale) = (look.main_top(), look.main_scale());
        let advance = look.main_width(" ") as f32;
        {
            let mut pen = Pen { dst: &mut bitmap, text: &self.text };
            for (i, ch) in DONATE_TEXT.chars().enumerate() {
                let x = DONATE_PAD as f32 + i as f32 * advance;
                let s = ch.to_string();
                pen.text(&s, Face::Main, LedColor::Black, x + 1.0, y + 1.0, scale)?;
                pen.text(&s, Face::Main, LedColor::donate(i), x, y, scale)?;
            }
        }
        let regions = vec![HitRegion::new(RegionKind::Donate, None, 0, width, height)];
        let seg = RenderSegment::new(bitmap, regions);
        self.donate = Some(seg.clone());
        Ok(seg)
    }

    /// Drop memoized rasters, e.g. after a height change.
    pub fn clear(&mut self) {
        self.text.clear();
        self.glyphs.clear();
        self.donate = None;
    }
}

/// Halo color of an active glow, taken from the move as it stands now.
pub fn glow_color(quote: &Quote) -> LedColor {
    match quote.direction() {
        Some(Direction::Up) => LedColor::Rgba(0, 255, 0, GLOW_ALPHA),
        _ => LedColor::Rgba(255, 0, 0, GLOW_ALPHA),
    }
}
