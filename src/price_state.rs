/*
 *  price_state.rs
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

//! Per-symbol price bookkeeping: flash, glow and the stale-data grace.

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info};

use crate::constants::{FLASH_DURATION, GLOW_COOLDOWN, GLOW_DURATION, GLOW_THRESHOLD_PCT, STALE_GRACE_FAILURES};
use crate::quote::{abs_change_pct, Quote, QuoteMap};
use crate::symbol::Symbol;

/// An active large-move highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub started: Instant,
    /// price at the moment of triggering
    pub baseline: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PriceEntry {
    /// quote as displayed, stale substitution applied
    pub quote: Quote,
    pub previous: Option<Quote>,
    last_good: Option<Quote>,
    pub flashed_at: Option<Instant>,
    pub glow: Option<Glow>,
    /// previous close that last triggered a glow
    glow_history: Option<f64>,
    pub failures: u32,
    expired_at: Option<Instant>,
}

impl PriceEntry {
    fn in_cooldown(&self, now: Instant) -> bool {
        self.expired_at
            .is_some_and(|at| now.saturating_duration_since(at) < GLOW_COOLDOWN)
    }

    /// Start a glow when the move clears the threshold and this
    /// previous close has not glowed yet.
    fn try_glow(&mut self, symbol: &Symbol, now: Instant) -> bool {
        let (Some(price), Some(prev)) = (self.quote.price, self.quote.previous_close) else {
            return false;
        };
        if prev == 0.0 || self.glow.is_some() || self.glow_history == Some(prev) || self.in_cooldown(now) {
            return false;
        }
        let pct = abs_change_pct(price, prev);
        if pct < GLOW_THRESHOLD_PCT {
            return false;
        }
        info!("{} moved {:.2}% from {:.2}, glowing", symbol, pct, prev);
        self.glow = Some(Glow { started: now, baseline: price });
        self.glow_history = Some(prev);
        true
    }
}

/// What an `apply` changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// some displayed price differs from before
    pub any_price_changed: bool,
    pub glows_started: Vec<Symbol>,
}

/// Price state for every symbol seen so far. Entries live for the process.
#[derive(Debug, Default)]
pub struct PriceStore {
    entries: HashMap<Symbol, PriceEntry>,
    loaded: bool,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any fetch report has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn entry(&self, symbol: &Symbol) -> Option<&PriceEntry> {
        self.entries.get(symbol)
    }

    /// Quote to draw; unknown symbols read as absent.
    pub fn display_quote(&self, symbol: &Symbol) -> Quote {
        self.entries.get(symbol).map(|e| e.quote).unwrap_or_default()
    }

    pub fn glow(&self, symbol: &Symbol) -> Option<&Glow> {
        self.entries.get(symbol).and_then(|e| e.glow.as_ref())
    }

    pub fn is_flashing(&self, symbol: &Symbol, now: Instant) -> bool {
        self.entries
            .get(symbol)
            .and_then(|e| e.flashed_at)
            .is_some_and(|at| now.saturating_duration_since(at) < FLASH_DURATION)
    }

    /// Symbols whose price flash is still running.
    pub fn flashing(&self, now: Instant) -> Vec<Symbol> {
        self.entries
            .keys()
            .filter(|s| self.is_flashing(s, now))
            .cloned()
            .collect()
    }

    /// Merge a fetch report into the store.
    pub fn apply(&mut self, quotes: &QuoteMap, now: Instant) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for (symbol, fresh) in quotes {
            let existed = self.entries.contains_key(symbol);
            let entry = self.entries.entry(symbol.clone()).or_default();
            let old = entry.quote;

            let shown = match fresh.price {
                Some(_) => {
                    // a new previous close means a new trading day; an unknown
                    // close on either side proves nothing
                    let new_day = matches!(
                        (old.previous_close, fresh.previous_close),
                        (Some(was), Some(fresh_pc)) if was != fresh_pc
                    );
                    if new_day && entry.glow_history.is_some() {
                        debug!("{} previous close moved, glow history cleared", symbol);
                        entry.glow_history = None;
                    }
                    entry.failures = 0;
                    entry.last_good = Some(*fresh);
                    *fresh
                }
                None => {
                    entry.failures += 1;
                    match entry.last_good {
                        Some(good) if entry.failures < STALE_GRACE_FAILURES => {
                            debug!("{} failed {} time(s), showing last price", symbol, entry.failures);
                            good
                        }
                        _ => Quote::absent(),
                    }
                }
            };

            entry.previous = Some(old);
            entry.quote = shown;
            if shown.price.is_some() && shown.price != old.price {
                outcome.any_price_changed = true;
                entry.flashed_at = Some(now);
                if existed && entry.try_glow(symbol, now) {
                    outcome.glows_started.push(symbol.clone());
                }
            }
        }

        // catch symbols that sat above the threshold without moving
        for (symbol, entry) in self.entries.iter_mut() {
            if entry.try_glow(symbol, now) {
                outcome.glows_started.push(symbol.clone());
            }
        }

        self.loaded = true;
        outcome
    }

    /// Clear glows older than their duration and lapse finished cooldowns.
    /// Returns true when a glow ended.
    pub fn expire_glows(&mut self, now: Instant) -> bool {
        let mut expired = false;
        for (symbol, entry) in self.entries.iter_mut() {
            if let Some(glow) = entry.glow {
                if now.saturating_duration_since(glow.started) >= GLOW_DURATION {
                    info!("{} glow expired", symbol);
                    entry.glow = None;
                    entry.expired_at = Some(now);
                    expired = true;
                }
            } else if entry.expired_at.is_some() && !entry.in_cooldown(now) {
                entry.expired_at = None;
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quotes(items: &[(&str, Option<f64>, Option<f64>)]) -> QuoteMap {
        items
            .iter()
            .map(|(s, p, pc)| (Symbol::new(s), Quote::new(*p, *pc)))
            .collect()
    }

    #[test]
    fn test_stale_grace_then_absent() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let aapl = Symbol::new("AAPL");
        store.apply(&quotes(&[("AAPL", Some(100.0), Some(99.0))]), t);
        for n in 1..=2 {
            store.apply(&quotes(&[("AAPL", None, None)]), t);
            assert_eq!(store.display_quote(&aapl).price, Some(100.0), "failure {}", n);
        }
        store.apply(&quotes(&[("AAPL", None, None)]), t);
        assert_eq!(store.display_quote(&aapl).price_text(), "N/A");
        store.apply(&quotes(&[("AAPL", Some(101.0), Some(99.0))]), t);
        assert_eq!(store.entry(&aapl).unwrap().failures, 0);
    }

    #[test]
    fn test_flash_window() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let aapl = Symbol::new("AAPL");
        let out = store.apply(&quotes(&[("AAPL", Some(100.0), Some(99.0))]), t);
        // first sighting flashes and counts as a change
        assert!(out.any_price_changed);
        assert!(store.is_flashing(&aapl, t));
        let out = store.apply(&quotes(&[("AAPL", Some(100.5), Some(99.0))]), t);
        assert!(out.any_price_changed);
        assert!(store.is_flashing(&aapl, t + Duration::from_millis(399)));
        assert!(!store.is_flashing(&aapl, t + Duration::from_millis(400)));
        let out = store.apply(&quotes(&[("AAPL", Some(100.5), Some(99.0))]), t);
        assert!(!out.any_price_changed);
    }

    #[test]
    fn test_glow_once_per_previous_close() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let x = Symbol::new("X");
        let out = store.apply(&quotes(&[("X", Some(94.0), Some(100.0))]), t);
        assert_eq!(out.glows_started, vec![x.clone()]);

        assert!(!store.expire_glows(t + Duration::from_secs(299)));
        assert!(store.expire_glows(t + GLOW_DURATION));
        // same previous close, no second glow
        let later = t + GLOW_DURATION + Duration::from_secs(10);
        let out = store.apply(&quotes(&[("X", Some(93.0), Some(100.0))]), later);
        assert!(out.glows_started.is_empty());
        // a new trading day may glow again
        let out = store.apply(&quotes(&[("X", Some(110.0), Some(101.0))]), later);
        assert_eq!(out.glows_started, vec![x.clone()]);
        assert_eq!(store.glow(&x).unwrap().baseline, 110.0);
    }

    #[test]
    fn test_cooldown_blocks_retrigger() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let x = Symbol::new("X");
        store.apply(&quotes(&[("X", Some(110.0), Some(100.0))]), t);
        let end = t + GLOW_DURATION;
        store.expire_glows(end);
        // new previous close inside the cooldown window
        let out = store.apply(&quotes(&[("X", Some(120.0), Some(105.0))]), end + Duration::from_secs(2));
        assert!(out.glows_started.is_empty());
        // the sweep after the cooldown lapses picks it up
        let after = end + GLOW_COOLDOWN + Duration::from_secs(1);
        store.expire_glows(after);
        let out = store.apply(&QuoteMap::new(), after);
        assert_eq!(out.glows_started, vec![x]);
    }

    #[test]
    fn test_no_second_glow_after_na_recovery() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let x = Symbol::new("X");
        let out = store.apply(&quotes(&[("X", Some(110.0), Some(100.0))]), t);
        assert_eq!(out.glows_started, vec![x.clone()]);
        let end = t + GLOW_DURATION;
        store.expire_glows(end);
        let after = end + GLOW_COOLDOWN + Duration::from_secs(1);
        store.expire_glows(after);

        for _ in 0..STALE_GRACE_FAILURES {
            store.apply(&quotes(&[("X", None, None)]), after);
        }
        assert_eq!(store.display_quote(&x).price_text(), "N/A");

        // same previous close as the glow that already ran
        let out = store.apply(&quotes(&[("X", Some(110.0), Some(100.0))]), after);
        assert!(out.glows_started.is_empty());
        assert!(store.glow(&x).is_none());
    }

    #[test]
    fn test_recovery_from_na_flashes() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let ibm = Symbol::new("IBM");
        store.apply(&quotes(&[("IBM", Some(140.0), Some(139.0))]), t);
        for _ in 0..STALE_GRACE_FAILURES {
            store.apply(&quotes(&[("IBM", None, None)]), t);
        }
        let later = t + Duration::from_secs(60);
        assert!(!store.is_flashing(&ibm, later));
        let out = store.apply(&quotes(&[("IBM", Some(140.0), Some(139.0))]), later);
        assert!(out.any_price_changed);
        assert!(store.is_flashing(&ibm, later));
    }

    #[test]
    fn test_absent_first_quote_is_no_change() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        let out = store.apply(&quotes(&[("ZZZ", None, None)]), t);
        assert!(!out.any_price_changed);
        assert!(!store.is_flashing(&Symbol::new("ZZZ"), t));
    }

    #[test]
    fn test_sweep_catches_unchanged_symbols() {
        let mut store = PriceStore::new();
        let t = Instant::now();
        store.apply(&quotes(&[("A", Some(100.0), Some(100.0)), ("B", Some(50.0), Some(40.0))]), t);
        let out = store.apply(&quotes(&[("A", Some(100.1), Some(100.0))]), t);
        assert!(out.glows_started.is_empty());
        assert!(store.glow(&Symbol::new("B")).is_some());
    }
}
