/*
 *  quote.rs
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

use std::collections::HashMap;

use crate::symbol::Symbol;

/// One quote as the feeds deliver it; `None` is "N/A".
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
}

pub type QuoteMap = HashMap<Symbol, Quote>;

/// Sign of a move against the previous close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Quote {
    /// Normalizes feed values: zero or non-finite prices are treated as absent.
    pub fn new(price: Option<f64>, previous_close: Option<f64>) -> Self {
        Quote {
            price: price.filter(|p| p.is_finite() && *p != 0.0),
            previous_close: previous_close.filter(|p| p.is_finite()),
        }
    }

    pub fn absent() -> Self {
        Quote::default()
    }

    pub fn is_absent(&self) -> bool {
        self.price.is_none()
    }

    /// Absolute change against the previous close.
    pub fn change(&self) -> Option<f64> {
        Some(self.price? - self.previous_close?)
    }

    /// Signed percent change; zero when the previous close is zero.
    pub fn change_pct(&self) -> Option<f64> {
        Some(change_pct(self.price?, self.previous_close?))
    }

    pub fn direction(&self) -> Option<Direction> {
        let change = self.change()?;
        Some(if change > 0.0 {
            Direction::Up
        } else if change < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        })
    }

    /// Price text as drawn on the panel.
    pub fn price_text(&self) -> String {
        match self.price {
            Some(p) => format!("{:.2}", p),
            None => "N/A".to_string(),
        }
    }

    /// Stacked change lines, e.g. ("+1.25", "+0.84%").
    pub fn change_texts(&self) -> Option<(String, String)> {
        let change = self.change()?;
        let pct = self.change_pct()?;
        Some(match self.direction()? {
            Direction::Up => (format!("+{:.2}", change.abs()), format!("+{:.2}%", pct.abs())),
            Direction::Down => (format!("-{:.2}", change.abs()), format!("-{:.2}%", pct.abs())),
            Direction::Flat => (format!("{:.2}", change), format!("{:.2}%", pct)),
        })
    }
}

pub fn change_pct(price: f64, previous_close: f64) -> f64 {
    if previous_close == 0.0 {
        return 0.0;
    }
    (price - previous_close) / previous_close * 100.0
}

/// `|price - prev| / prev * 100`, the figure the glow rule is judged on.
pub fn abs_change_pct(price: f64, previous_close: f64) -> f64 {
    change_pct(price, previous_close).abs()
}

/// Rotation of the direction glyph in degrees, 0 pointing up.
///
/// Full moves (>= 1%) point straight up or down, smaller moves lean at
/// 45/135 and anything under 0.01% lies flat at 90.
pub fn indicator_rotation(pct: f64) -> u16 {
    let magnitude = pct.abs();
    if magnitude < 0.01 {
        90
    } else if magnitude >= 1.0 {
        if pct > 0.0 { 0 } else { 180 }
    } else if pct > 0.0 {
        45
    } else {
        135
    }
}
