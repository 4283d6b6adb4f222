/*
 *  symbol.rs
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

//! Ticker symbols and their display ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::constants::INDEX_PREFIX;

/// Which feed serves a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    /// `^`-prefixed, served by the no-key feed
    Index,
    /// served by the keyed feed
    Equity,
}

/// A ticker symbol, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Symbol(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn class(&self) -> SymbolClass {
        if self.0.starts_with(INDEX_PREFIX) {
            SymbolClass::Index
        } else {
            SymbolClass::Equity
        }
    }

    pub fn is_index(&self) -> bool {
        self.class() == SymbolClass::Index
    }

    /// Label drawn on the panel; known index codes get a friendly name.
    pub fn display_name(&self) -> &str {
        match self.0.as_str() {
            "^GSPC" => "S&P 500",
            "^DJI" => "DOW",
            "^IXIC" => "NASDAQ",
            "^NDX" => "NASDAQ 100",
            "^RUT" => "RUSSELL 2000",
            "^VIX" => "VIX",
            "^TNX" => "10Y YIELD",
            "^FTSE" => "FTSE 100",
            "^N225" => "NIKKEI",
            other => other,
        }
    }

    /// Specials (anything not starting alphanumeric) sort first.
    fn is_special(&self) -> bool {
        !self.0.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(&s)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display order: specials/indices first, then case-insensitive alphabetical.
pub fn display_order(a: &Symbol, b: &Symbol) -> Ordering {
    b.is_special()
        .cmp(&a.is_special())
        .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
}

/// Sort and de-duplicate a symbol list into display order.
pub fn sort_symbols(mut symbols: Vec<Symbol>) -> Vec<Symbol> {
    symbols.sort_by(display_order);
    symbols.dedup();
    symbols
}

/// Split a comma separated list (`AAPL, msft,^dji`).
pub fn parse_list(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
        .collect()
}
