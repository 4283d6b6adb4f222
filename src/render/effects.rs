/*
 *  render/effects.rs
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

//! LED panel overlays: substrate background, bloom and glass glare.
//!
//! Background and glare only depend on the panel size and are cached as
//! pixmaps until a resize.

use embedded_graphics::primitives::Rectangle;
use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap, PixmapPaint,
    Point, RadialGradient, Rect, Shader, SpreadMode, Transform,
};

use super::canvas::{fill_rect, new_pixmap};
use super::color::LedColor;
use super::segment::{HitRegion, RegionKind};
use super::RenderError;

const BASE: LedColor = LedColor::Rgba(8, 10, 12, 255);
const SCANLINE_PERIOD: u32 = 4;
const GRID_PERIOD: u32 = 6;
const GLASS_TEXTURE_PERIOD: u32 = 20;
const BLOOM_REACH: f32 = 0.8;

fn rgba(r: u8, g: u8, b: u8, a: u8) -> Color {
    Color::from_rgba8(r, g, b, a)
}

fn stops(list: &[(f32, Color)]) -> Vec<GradientStop> {
    list.iter().map(|(pos, c)| GradientStop::new(*pos, *c)).collect()
}

fn vertical(height: f32, list: &[(f32, Color)]) -> Option<Shader<'static>> {
    LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(0.0, height),
        stops(list),
        SpreadMode::Pad,
        Transform::identity(),
    )
}

fn radial(cx: f32, cy: f32, radius: f32, list: &[(f32, Color)]) -> Option<Shader<'static>> {
    let c = Point::from_xy(cx, cy);
    RadialGradient::new(c, c, radius, stops(list), SpreadMode::Pad, Transform::identity())
}

fn shade_rect(dst: &mut Pixmap, rect: Option<Rect>, shader: Option<Shader<'static>>, blend: BlendMode) {
    if let (Some(rect), Some(shader)) = (rect, shader) {
        let paint = Paint { shader, blend_mode: blend, anti_alias: false, ..Paint::default() };
        dst.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

/// Dark substrate with depth gradient, row scanlines and a column grid.
pub fn background(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let mut pm = new_pixmap(width, height)?;
    let (w, h) = (pm.width() as f32, pm.height() as f32);
    fill_rect(&mut pm, 0.0, 0.0, w, h, BASE);

    let depth = vertical(
        h,
        &[
            (0.0, rgba(15, 18, 22, 180)),
            (0.5, rgba(12, 14, 18, 120)),
            (1.0, rgba(8, 10, 14, 160)),
        ],
    );
    shade_rect(&mut pm, Rect::from_xywh(0.0, 0.0, w, h), depth, BlendMode::SourceOver);

    for y in (0..pm.height()).step_by(SCANLINE_PERIOD as usize) {
        fill_rect(&mut pm, 0.0, y as f32, w, 2.0, LedColor::Rgba(0, 0, 0, 80));
        if y + 2 < pm.height() {
            fill_rect(&mut pm, 0.0, (y + 2) as f32, w, 1.0, LedColor::Rgba(25, 30, 38, 40));
        }
    }
    for x in (0..pm.width()).step_by(GRID_PERIOD as usize) {
        fill_rect(&mut pm, x as f32, 0.0, 1.0, h, LedColor::Rgba(18, 22, 28, 30));
    }
    Ok(pm)
}

/// Reflections of a glass cover, meant to be added with `BlendMode::Plus`.
pub fn glass_glare(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let mut pm = new_pixmap(width, height)?;
    let (w, h) = (pm.width() as f32, pm.height() as f32);
    let plus = BlendMode::Plus;

    // top band
    let band = vertical(
        h,
        &[
            (0.0, rgba(255, 255, 255, 30)),
            (0.15, rgba(255, 255, 255, 12)),
            (0.3, rgba(255, 255, 255, 3)),
            (1.0, rgba(255, 255, 255, 0)),
        ],
    );
    shade_rect(&mut pm, Rect::from_xywh(0.0, 0.0, w, (h * 0.4).floor()), band, plus);

    // slanted secondary band
    let slant = LinearGradient::new(
        Point::from_xy(0.0, h * 0.25),
        Point::from_xy(w * 0.2, h * 0.5),
        stops(&[
            (0.0, rgba(200, 220, 255, 18)),
            (0.3, rgba(200, 220, 255, 8)),
            (0.7, rgba(200, 220, 255, 3)),
            (1.0, rgba(200, 220, 255, 0)),
        ]),
        SpreadMode::Pad,
        Transform::identity(),
    );
    let mut pb = PathBuilder::new();
    pb.move_to(0.0, (h * 0.25).floor());
    pb.line_to(w, (h * 0.3).floor());
    pb.line_to(w, (h * 0.5).floor());
    pb.line_to(0.0, (h * 0.45).floor());
    pb.close();
    if let (Some(path), Some(shader)) = (pb.finish(), slant) {
        let paint = Paint { shader, blend_mode: plus, anti_alias: false, ..Paint::default() };
        pm.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    for y in (0..pm.height()).step_by(GLASS_TEXTURE_PERIOD as usize) {
        fill_rect(&mut pm, 0.0, y as f32, w, 1.0, LedColor::Rgba(255, 255, 255, 3));
    }

    let short = w.min(h);
    let top_left = radial(
        0.0,
        0.0,
        short * 0.3,
        &[
            (0.0, rgba(255, 255, 255, 20)),
            (0.5, rgba(255, 255, 255, 5)),
            (1.0, rgba(255, 255, 255, 0)),
        ],
    );
    shade_rect(&mut pm, Rect::from_xywh(0.0, 0.0, (w * 0.3).floor(), (h * 0.4).floor()), top_left, plus);

    let bottom_right = radial(
        w,
        h,
        short * 0.2,
        &[
            (0.0, rgba(255, 255, 255, 10)),
            (0.7, rgba(255, 255, 255, 2)),
            (1.0, rgba(255, 255, 255, 0)),
        ],
    );
    shade_rect(
        &mut pm,
        Rect::from_xywh((w * 0.7).floor(), (h * 0.6).floor(), (w * 0.3).floor(), (h * 0.4).floor()),
        bottom_right,
        plus,
    );
    Ok(pm)
}

/// Centre and peak colors of the bloom behind a region.
///
/// `price_color` resolves the live color of a price region.
pub fn bloom_colors(region: &HitRegion, price_color: LedColor) -> (LedColor, (u8, u8)) {
    match region.kind {
        RegionKind::Price => (price_color, (30, 12)),
        RegionKind::Symbol => (LedColor::Symbol, (30, 12)),
        _ => (LedColor::Rgba(200, 220, 255, 255), (12, 5)),
    }
}

fn scaled(alpha: u8, intensity: u32) -> u8 {
    (alpha as u32 * intensity / 100).min(255) as u8
}

/// Additive radial glow centred on `bounds`, radius 0.8 of its longer side.
pub fn bloom(dst: &mut Pixmap, bounds: &Rectangle, color: LedColor, (inner, mid): (u8, u8), intensity: u32) {
    let (r, g, b, _) = color.rgba();
    let (w, h) = (bounds.size.width, bounds.size.height);
    let cx = bounds.top_left.x as f32 + w as f32 / 2.0;
    let cy = bounds.top_left.y as f32 + h as f32 / 2.0;
    let radius = w.max(h) as f32 * BLOOM_REACH;
    let shader = radial(
        cx,
        cy,
        radius,
        &[
            (0.0, rgba(r, g, b, scaled(inner, intensity))),
            (0.5, rgba(r, g, b, scaled(mid, intensity))),
            (1.0, rgba(255, 255, 255, 0)),
        ],
    );
    if let (Some(path), Some(shader)) = (PathBuilder::from_circle(cx, cy, radius), shader) {
        let paint = Paint { shader, blend_mode: BlendMode::Plus, anti_alias: false, ..Paint::default() };
        dst.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

/// Add a cached overlay pixmap on top of the frame.
pub fn add_overlay(dst: &mut Pixmap, overlay: &Pixmap) {
    let paint = PixmapPaint { blend_mode: BlendMode::Plus, ..PixmapPaint::default() };
    dst.draw_pixmap(0, 0, overlay.as_ref(), &paint, Transform::identity(), None);
}

/// Size-dependent layers, rebuilt only on resize.
pub struct PanelLayers {
    pub background: Pixmap,
    pub glare: Pixmap,
}

impl PanelLayers {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        Ok(Self {
            background: background(width, height)?,
            glare: glass_glare(width, height)?,
        })
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.background.width() == width.max(1) && self.background.height() == height.max(1)
    }
}
