/*
 *  render/glyphs.rs
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

//! Direction indicator glyphs, drawn from small SVG templates.
//!
//! Every template points up; the rotation encodes the size of the move.

use std::sync::Arc;

use log::debug;
use mini_moka::sync::Cache;
use resvg::{
    render,
    usvg::{Options as UsvgOptions, Transform, Tree},
};
use tiny_skia::Pixmap;

use super::canvas::new_pixmap;
use super::color::LedColor;
use super::RenderError;
use crate::config::IndicatorStyle;

const VIEW: f32 = 20.0;

fn template(style: IndicatorStyle) -> &'static str {
    match style {
        IndicatorStyle::Arrows => {
            r#"<path d="M10 1 L19 10 H13.5 V19 H6.5 V10 H1 Z" fill="{fill}"/>"#
        }
        IndicatorStyle::ThinArrows => {
            r#"<path d="M10 2 V18 M3.5 8.5 L10 2 L16.5 8.5" stroke="{fill}" stroke-width="2.2" stroke-linecap="square" fill="none"/>"#
        }
        IndicatorStyle::Triangles => r#"<path d="M10 3 L19 17 H1 Z" fill="{fill}"/>"#,
    }
}

/// Full SVG document for a glyph.
pub fn glyph_svg(style: IndicatorStyle, rotation: u16, color: LedColor) -> String {
    let (r, g, b, _) = color.rgba();
    let body = template(style).replace("{fill}", &format!("#{:02x}{:02x}{:02x}", r, g, b));
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20" viewBox="0 0 20 20"><g transform="rotate({} 10 10)">{}</g></svg>"#,
        rotation, body
    )
}

/// Rasterizes and memoizes indicator glyphs.
#[derive(Clone)]
pub struct GlyphRenderer {
    cache: Arc<Cache<String, Arc<Pixmap>>>,
}

impl GlyphRenderer {
    pub fn new(capacity: u64) -> Self {
        Self { cache: Arc::new(Cache::new(capacity)) }
    }

    /// Square glyph of `size` pixels.
    pub fn glyph(
        &self,
        style: IndicatorStyle,
        rotation: u16,
        color: LedColor,
        size: u32,
    ) -> Result<Arc<Pixmap>, RenderError> {
        let key = format!("{:?}|{}|{:?}|{}", style, rotation, color.rgba(), size);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let svg = glyph_svg(style, rotation, color);
        let tree = Tree::from_str(&svg, &UsvgOptions::default())
            .map_err(|e| RenderError::Svg(format!("{:?}", e)))?;
        let mut pixmap = new_pixmap(size, size)?;
        let scale = size as f32 / VIEW;
        render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());
        debug!("indicator {:?} {} rendered at {}px", style, rotation, size);

        let pixmap = Arc::new(pixmap);
        self.cache.insert(key, Arc::clone(&pixmap));
        Ok(pixmap)
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
