/*
 *  render/text.rs
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

//! Monospace text rasters, memoized across rebuilds.

use std::sync::Arc;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use mini_moka::sync::Cache;
use tiny_skia::Pixmap;

use super::canvas::{new_pixmap, PixmapTarget};
use super::color::LedColor;
use super::RenderError;

/// Font faces used on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// symbol and price
    Main,
    /// stacked change lines
    Small,
}

impl Face {
    fn font(&self) -> &'static MonoFont<'static> {
        match self {
            Face::Main => &FONT_10X20,
            Face::Small => &FONT_6X10,
        }
    }

    pub fn cell(&self) -> (u32, u32) {
        let font = self.font();
        (font.character_size.width + font.character_spacing, font.character_size.height)
    }

    /// Unscaled raster width of `text`.
    pub fn text_width(&self, text: &str) -> u32 {
        self.cell().0 * text.chars().count() as u32
    }
}

/// Renders text once per (face, color, string).
#[derive(Clone)]
pub struct TextRasterizer {
    cache: Arc<Cache<String, Arc<Pixmap>>>,
}

impl TextRasterizer {
    pub fn new(capacity: u64) -> Self {
        Self { cache: Arc::new(Cache::new(capacity)) }
    }

    pub fn raster(&self, text: &str, face: Face, color: LedColor) -> Result<Arc<Pixmap>, RenderError> {
        let key = format!("{:?}|{:?}|{}", face, color.rgba(), text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let (_, h) = face.cell();
        let mut pixmap = new_pixmap(face.text_width(text), h)?;
        {
            let mut target = PixmapTarget::new(&mut pixmap);
            let style = MonoTextStyle::new(face.font(), color.to_rgb888());
            // infallible target
            let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut target);
        }
        let pixmap = Arc::new(pixmap);
        self.cache.insert(key, Arc::clone(&pixmap));
        Ok(pixmap)
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

/// Integer upscale that brings `face` to `fraction` of `height`.
pub fn scale_for(face: Face, height: u32, fraction: f32) -> u32 {
    let (_, cell_h) = face.cell();
    ((height as f32 * fraction) / cell_h as f32).round().max(1.0) as u32
}
