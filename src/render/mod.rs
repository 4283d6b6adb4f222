/*
 *  render/mod.rs
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

//! Panel rendering: segment bitmaps, the scroll compositor and its overlays.

use thiserror::Error;

pub mod builder;
pub mod canvas;
pub mod color;
pub mod compositor;
pub mod effects;
pub mod glyphs;
pub mod segment;
pub mod text;

pub use builder::SegmentBuilder;
pub use color::LedColor;
pub use compositor::ScrollCompositor;
pub use segment::{HitRegion, RegionKind, RenderSegment};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot allocate {0}x{1} pixmap")]
    Pixmap(u32, u32),
    #[error("svg: {0}")]
    Svg(String),
}
