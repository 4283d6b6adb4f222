/*
 *  render/segment.rs
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

use std::fmt;
use std::sync::Arc;

use embedded_graphics::prelude::{Point, Size, Transform};
use embedded_graphics::primitives::{ContainsPoint, Rectangle};
use tiny_skia::Pixmap;

use crate::constants::{CHART_URL, DONATE_URL};
use crate::symbol::Symbol;

/// What a clickable area of the panel stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    MarketLabel,
    MarketStatus,
    Symbol,
    Price,
    Change,
    Donate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRegion {
    pub kind: RegionKind,
    pub symbol: Option<Symbol>,
    pub bounds: Rectangle,
}

impl HitRegion {
    pub fn new(kind: RegionKind, symbol: Option<&Symbol>, x: i32, width: u32, height: u32) -> Self {
        Self {
            kind,
            symbol: symbol.cloned(),
            bounds: Rectangle::new(Point::new(x, 0), Size::new(width, height)),
        }
    }

    /// Same region shifted right by `dx` pixels.
    pub fn translated(&self, dx: i32) -> Self {
        Self {
            kind: self.kind,
            symbol: self.symbol.clone(),
            bounds: self.bounds.translate(Point::new(dx, 0)),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.bounds.contains(Point::new(x, y))
    }

    /// Link opened when the region is clicked.
    pub fn link(&self) -> Option<String> {
        link_for(self.kind, self.symbol.as_ref())
    }
}

/// Chart page for symbol regions, the donation page for the banner.
pub fn link_for(kind: RegionKind, symbol: Option<&Symbol>) -> Option<String> {
    match (kind, symbol) {
        (RegionKind::Donate, _) => Some(DONATE_URL.to_string()),
        (RegionKind::Symbol | RegionKind::Price | RegionKind::Change, Some(s)) => {
            Some(format!("{}/{}/", CHART_URL, s.as_str()))
        }
        _ => None,
    }
}

/// Immutable drawable unit of the scroll. Rebuilt, never patched.
#[derive(Clone)]
pub struct RenderSegment {
    pub width: u32,
    pub bitmap: Arc<Pixmap>,
    pub regions: Vec<HitRegion>,
}

impl RenderSegment {
    pub fn new(bitmap: Pixmap, regions: Vec<HitRegion>) -> Self {
        Self {
            width: bitmap.width(),
            bitmap: Arc::new(bitmap),
            regions,
        }
    }

    /// Layout fingerprint, equal for equal widths and hit regions.
    pub fn layout(&self) -> (u32, &[HitRegion]) {
        (self.width, &self.regions)
    }
}

impl fmt::Debug for RenderSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSegment")
            .field("width", &self.width)
            .field("regions", &self.regions)
            .finish()
    }
}

/// Sum of segment widths.
pub fn total_width(segments: &[RenderSegment]) -> u32 {
    segments.iter().map(|s| s.width).sum()
}
