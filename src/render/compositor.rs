/*
 *  render/compositor.rs
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

//! Continuous horizontal scroll over the segment sequence.
//!
//! The offset is a float so motion stays smooth at any refresh rate. One
//! cycle is every segment once; every third cycle also carries the donate
//! banner, so the sequence repeats after a supercycle of
//! `donate + 3 * cycle` pixels.

use std::time::Instant;

use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use log::debug;
use tiny_skia::Pixmap;

use super::canvas::{blit, blit_scaled, fill_rect, new_pixmap};
use super::color::LedColor;
use super::effects::{add_overlay, bloom, bloom_colors, PanelLayers};
use super::segment::{total_width, HitRegion, RegionKind, RenderSegment};
use super::text::{scale_for, Face, TextRasterizer};
use super::RenderError;
use crate::config::Settings;
use crate::constants::{
    DONATE_EVERY, FONT_SCALE, GHOST_OPACITY, LOADING_TEXT, MAX_FRAME_ELAPSED, SPEED_FRAME_RATE,
};
use crate::price_state::PriceStore;
use crate::symbol::Symbol;

const FLASH: LedColor = LedColor::Rgba(255, 255, 255, 70);

/// Overlay switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    pub bloom: bool,
    /// percent, 100 is nominal
    pub bloom_intensity: u32,
    pub ghosting: bool,
    pub glass_glare: bool,
}

impl From<&Settings> for Effects {
    fn from(s: &Settings) -> Self {
        Self {
            bloom: s.led_bloom_effect,
            bloom_intensity: s.led_bloom_intensity,
            ghosting: s.led_ghosting_effect,
            glass_glare: s.led_glass_glare,
        }
    }
}

pub struct ScrollCompositor {
    width: u32,
    height: u32,
    offset: f64,
    speed: f64,
    segments: Vec<RenderSegment>,
    donate: Option<RenderSegment>,
    cycle_width: u32,
    effects: Effects,
    user_paused: bool,
    hover_paused: bool,
    loading: bool,
    layers: Option<PanelLayers>,
    frame: Pixmap,
    regions: Vec<HitRegion>,
    text: TextRasterizer,
}

impl ScrollCompositor {
    pub fn new(width: u32, height: u32, speed: f64, effects: Effects) -> Result<Self, RenderError> {
        Ok(Self {
            width,
            height,
            offset: width as f64,
            speed,
            segments: Vec::new(),
            donate: None,
            cycle_width: 0,
            effects,
            user_paused: false,
            hover_paused: false,
            loading: true,
            layers: None,
            frame: new_pixmap(width, height)?,
            regions: Vec::new(),
            text: TextRasterizer::new(8),
        })
    }

    /// Swap in a fresh build. The offset carries over.
    pub fn set_segments(&mut self, segments: Vec<RenderSegment>, donate: Option<RenderSegment>) {
        self.cycle_width = total_width(&segments);
        self.segments = segments;
        self.donate = donate;
        self.wrap();
    }

    /// Restart from just off the right edge.
    pub fn reset(&mut self) {
        self.offset = self.width as f64;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn set_effects(&mut self, effects: Effects) {
        self.effects = effects;
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.frame = new_pixmap(width, height)?;
            self.layers = None;
        }
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.user_paused = !self.user_paused;
        self.user_paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.user_paused = paused;
    }

    /// Pointer entered (true) or left (false) the panel.
    pub fn set_hover(&mut self, inside: bool) {
        self.hover_paused = inside;
    }

    pub fn is_paused(&self) -> bool {
        self.user_paused || self.hover_paused
    }

    /// One full repeat of the sequence, donate banner included.
    ///
    /// The banner leads cycle 0 of every `DONATE_EVERY` cycles, so the
    /// pattern repeats after the banner plus that many symbol passes.
    pub fn supercycle(&self) -> u32 {
        let donate = self.donate.as_ref().map_or(0, |d| d.width);
        donate + DONATE_EVERY as u32 * self.cycle_width
    }

    /// Move the scroll by one frame's worth of `elapsed` seconds.
    pub fn advance(&mut self, elapsed: f64) -> f64 {
        if !self.is_paused() && elapsed > 0.0 {
            let step = elapsed.min(MAX_FRAME_ELAPSED);
            self.offset -= self.speed * step * SPEED_FRAME_RATE;
            self.wrap();
        }
        self.offset
    }

    fn wrap(&mut self) {
        let cycle = self.supercycle() as f64;
        if cycle <= 0.0 {
            return;
        }
        while self.offset <= -cycle {
            self.offset += cycle;
        }
    }

    /// Segments that intersect the panel when the sequence starts at
    /// `origin`, with their left edge.
    pub fn visible(&self, origin: i32) -> Vec<(i32, &RenderSegment)> {
        visible_in(&self.segments, self.donate.as_ref(), self.cycle_width, self.width, origin)
    }

    fn ghost_offset(&self) -> Option<i32> {
        if !self.effects.ghosting || self.is_paused() {
            return None;
        }
        Some(((self.speed * 1.5) as i32).max(2))
    }

    /// Composite the current frame.
    pub fn render(&mut self, store: &PriceStore, now: Instant) -> Result<&Pixmap, RenderError> {
        if !self.layers.as_ref().is_some_and(|l| l.fits(self.width, self.height)) {
            debug!("panel layers rebuilt at {}x{}", self.width, self.height);
            self.layers = Some(PanelLayers::new(self.width, self.height)?);
        }
        let Some(layers) = self.layers.as_ref() else {
            return Ok(&self.frame);
        };
        self.frame.data_mut().copy_from_slice(layers.background.data());
        self.regions.clear();

        if self.loading {
            let scale = scale_for(Face::Main, self.height, FONT_SCALE);
            let label = self.text.raster(LOADING_TEXT, Face::Main, LedColor::Gold)?;
            let (w, h) = (label.width() * scale, label.height() * scale);
            let x = (self.width as f32 - w as f32) / 2.0;
            let y = (self.height as f32 - h as f32) / 2.0;
            blit_scaled(&mut self.frame, &label, x, y, scale as f32, 1.0);
            if self.effects.bloom {
                let bounds = Rectangle::new(Point::new(x as i32, y as i32), Size::new(w, h));
                bloom(&mut self.frame, &bounds, LedColor::Unchanged, (35, 15), self.effects.bloom_intensity);
            }
            if self.effects.glass_glare {
                add_overlay(&mut self.frame, &layers.glare);
            }
            return Ok(&self.frame);
        }

        let origin = self.offset.floor() as i32;
        let mut drawn = Vec::new();
        for (x, seg) in visible_in(&self.segments, self.donate.as_ref(), self.cycle_width, self.width, origin) {
            blit(&mut self.frame, &seg.bitmap, x, 0, 1.0);
            drawn.extend(seg.regions.iter().map(|r| r.translated(x)));
        }

        let flashing = store.flashing(now);
        for r in drawn.iter().filter(|r| r.kind == RegionKind::Price) {
            if r.symbol.as_ref().is_some_and(|s| flashing.contains(s)) {
                let b = r.bounds;
                fill_rect(
                    &mut self.frame,
                    b.top_left.x as f32,
                    b.top_left.y as f32,
                    b.size.width as f32,
                    b.size.height as f32,
                    FLASH,
                );
            }
        }

        if self.effects.bloom {
            for r in &drawn {
                let price = r
                    .symbol
                    .as_ref()
                    .map(|s| LedColor::for_direction(store.display_quote(s).direction()))
                    .unwrap_or(LedColor::Gold);
                let (color, alphas) = bloom_colors(r, price);
                bloom(&mut self.frame, &r.bounds, color, alphas, self.effects.bloom_intensity);
            }
        }

        if let Some(dx) = self.ghost_offset() {
            let ghosts = visible_in(&self.segments, self.donate.as_ref(), self.cycle_width, self.width, origin + dx);
            for (x, seg) in ghosts {
                blit(&mut self.frame, &seg.bitmap, x, 0, GHOST_OPACITY);
            }
        }

        if self.effects.glass_glare {
            add_overlay(&mut self.frame, &layers.glare);
        }

        self.regions = drawn;
        Ok(&self.frame)
    }

    /// Last composited frame.
    pub fn frame(&self) -> &Pixmap {
        &self.frame
    }

    /// Hit regions of the last frame, in panel coordinates.
    pub fn regions(&self) -> &[HitRegion] {
        &self.regions
    }

    pub fn hit_test(&self, x: i32, y: i32) -> Option<(RegionKind, Option<Symbol>)> {
        self.regions
            .iter()
            .find(|r| r.contains(x, y))
            .map(|r| (r.kind, r.symbol.clone()))
    }

    /// Link behind the pixel, if any.
    pub fn link_at(&self, x: i32, y: i32) -> Option<String> {
        self.regions.iter().find(|r| r.contains(x, y)).and_then(|r| r.link())
    }
}

/// Walk the repeating sequence from `origin` until the panel is covered.
fn visible_in<'a>(
    segments: &'a [RenderSegment],
    donate: Option<&'a RenderSegment>,
    cycle_width: u32,
    width: u32,
    origin: i32,
) -> Vec<(i32, &'a RenderSegment)> {
    let mut out = Vec::new();
    if cycle_width == 0 {
        return out;
    }
    let width = width as i32;
    let mut x = origin;
    let mut cycle = 0usize;
    while x < width {
        let extra = if cycle % DONATE_EVERY == 0 { donate } else { None };
        for seg in segments.iter().chain(extra) {
            let w = seg.width as i32;
            if x + w > 0 && x < width {
                out.push((x, seg));
            }
            x += w;
        }
        cycle += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effects() -> Effects {
        Effects { bloom: true, bloom_intensity: 100, ghosting: true, glass_glare: true }
    }

    fn seg(width: u32, kind: RegionKind, symbol: Option<&str>) -> RenderSegment {
        let mut pm = new_pixmap(width, 20).unwrap();
        fill_rect(&mut pm, 0.0, 0.0, width as f32, 20.0, LedColor::Symbol);
        let sym = symbol.map(Symbol::new);
        RenderSegment::new(pm, vec![HitRegion::new(kind, sym.as_ref(), 0, width, 20)])
    }

    fn compositor() -> ScrollCompositor {
        let mut c = ScrollCompositor::new(100, 20, 2.0, effects()).unwrap();
        c.set_segments(
            vec![seg(30, RegionKind::Symbol, Some("AAPL")), seg(50, RegionKind::Price, Some("AAPL"))],
            Some(seg(40, RegionKind::Donate, None)),
        );
        c.set_loading(false);
        c
    }

    #[test]
    fn test_supercycle() {
        let c = compositor();
        assert_eq!(c.supercycle(), 40 + 3 * 80);
    }

    #[test]
    fn test_advance_monotonic_and_wraps() {
        let mut c = compositor();
        let cycle = c.supercycle() as f64;
        let mut last = c.offset();
        let mut travelled = 0.0;
        for _ in 0..2000 {
            let next = c.advance(1.0 / 60.0);
            let step = 2.0;
            if next < last {
                assert!((last - next - step).abs() < 1e-9);
            } else {
                // wrapped: same position modulo the supercycle
                assert!(((last - step) - (next - cycle)).abs() < 1e-9);
            }
            assert!(next > -cycle);
            travelled += step;
            last = next;
        }
        let expected = (100.0 - travelled).rem_euclid(cycle);
        assert!((c.offset().rem_euclid(cycle) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_stall_is_clamped() {
        let mut c = compositor();
        let start = c.offset();
        c.advance(2.5);
        // 2 px per 60 Hz frame, at most 50 ms
        assert!((start - c.offset() - 2.0 * 0.05 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_freezes_offset() {
        let mut c = compositor();
        c.set_hover(true);
        let at = c.offset();
        c.advance(0.016);
        assert_eq!(c.offset(), at);
        assert!(c.ghost_offset().is_none());
        c.set_hover(false);
        assert!(c.toggle_pause());
        c.advance(0.016);
        assert_eq!(c.offset(), at);
        assert!(!c.toggle_pause());
        c.advance(0.016);
        assert!(c.offset() < at);
        assert_eq!(c.ghost_offset(), Some(3));
    }

    #[test]
    fn test_donate_every_third_cycle() {
        let mut c = ScrollCompositor::new(1000, 20, 1.0, effects()).unwrap();
        c.set_segments(vec![seg(100, RegionKind::Symbol, Some("IBM"))], Some(seg(50, RegionKind::Donate, None)));
        let xs: Vec<(i32, u32)> = c.visible(0).iter().map(|(x, s)| (*x, s.width)).collect();
        // cycle 0 carries the banner, cycles 1 and 2 do not, cycle 3 does again
        assert_eq!(
            &xs[..6],
            &[(0, 100), (100, 50), (150, 100), (250, 100), (350, 100), (450, 50)]
        );
    }

    #[test]
    fn test_offscreen_segments_skipped() {
        let mut c = compositor();
        c.set_paused(true);
        c.reset();
        assert!(c.visible(c.offset() as i32).is_empty());
        let v = c.visible(-35);
        assert_eq!((v[0].0, v[0].1.width), (-5, 50));
        assert!(v.iter().all(|(x, s)| x + s.width as i32 > 0 && *x < 100));
    }

    #[test]
    fn test_hit_test_after_render() {
        let mut c = compositor();
        c.offset = -10.0;
        let store = PriceStore::new();
        c.render(&store, Instant::now()).unwrap();
        assert_eq!(c.hit_test(5, 10), Some((RegionKind::Symbol, Some(Symbol::new("AAPL")))));
        assert_eq!(c.hit_test(25, 10).map(|h| h.0), Some(RegionKind::Price));
        // donate follows the two segments of cycle 0
        assert_eq!(c.hit_test(75, 10).map(|h| h.0), Some(RegionKind::Donate));
        assert_eq!(c.link_at(75, 10).as_deref(), Some(crate::constants::DONATE_URL));
        assert!(c.hit_test(5, 25).is_none());
    }

    #[test]
    fn test_loading_label() {
        let mut c = ScrollCompositor::new(200, 40, 1.0, effects()).unwrap();
        let store = PriceStore::new();
        let frame = c.render(&store, Instant::now()).unwrap();
        let gold = frame.pixels().iter().filter(|p| p.red() > 200 && p.green() > 160 && p.blue() < 120).count();
        assert!(gold > 0);
        assert!(c.regions().is_empty());
    }

    #[test]
    fn test_resize_rebuilds_frame() {
        let mut c = compositor();
        c.resize(64, 10).unwrap();
        let store = PriceStore::new();
        let frame = c.render(&store, Instant::now()).unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 10));
    }
}
