/*
 *  render/canvas.rs
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use tiny_skia::{ColorU8, FilterQuality, Paint, Pixmap, PixmapPaint, Rect, Transform};

use super::color::LedColor;
use super::RenderError;

/// embedded-graphics draw target over an RGBA pixmap.
///
/// Pixels are written opaque; translucency is applied when the pixmap is
/// composited.
pub struct PixmapTarget<'a> {
    pixmap: &'a mut Pixmap,
}

impl<'a> PixmapTarget<'a> {
    pub fn new(pixmap: &'a mut Pixmap) -> Self {
        Self { pixmap }
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        let (w, h) = (self.pixmap.width() as usize, self.pixmap.height() as usize);
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < w && y < h {
                return Some(y * w + x);
            }
        }
        None
    }
}

impl OriginDimensions for PixmapTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.pixmap.width(), self.pixmap.height())
    }
}

impl DrawTarget for PixmapTarget<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                let px = ColorU8::from_rgba(c.r(), c.g(), c.b(), 255).premultiply();
                self.pixmap.pixels_mut()[i] = px;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let px = ColorU8::from_rgba(color.r(), color.g(), color.b(), 255).premultiply();
        let w = self.pixmap.width() as usize;
        for y in area.rows() {
            for x in area.columns() {
                self.pixmap.pixels_mut()[y as usize * w + x as usize] = px;
            }
        }
        Ok(())
    }
}

/// Allocate a transparent pixmap, zero sizes rounded up to one pixel.
pub fn new_pixmap(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    Pixmap::new(width.max(1), height.max(1)).ok_or(RenderError::Pixmap(width, height))
}

/// Fill a rectangle, clipped to the pixmap.
pub fn fill_rect(dst: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: LedColor) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = false;
        dst.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

/// Draw `src` at (x, y) scaled by `scale`, nearest-neighbour.
pub fn blit_scaled(dst: &mut Pixmap, src: &Pixmap, x: f32, y: f32, scale: f32, opacity: f32) {
    let paint = PixmapPaint {
        opacity,
        quality: FilterQuality::Nearest,
        ..PixmapPaint::default()
    };
    let transform = Transform::from_scale(scale, scale).post_translate(x, y);
    dst.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
}

/// Draw `src` unscaled at integer coordinates.
pub fn blit(dst: &mut Pixmap, src: &Pixmap, x: i32, y: i32, opacity: f32) {
    let paint = PixmapPaint { opacity, ..PixmapPaint::default() };
    dst.draw_pixmap(x, y, src.as_ref(), &paint, Transform::identity(), None);
}
