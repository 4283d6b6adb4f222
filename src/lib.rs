/*
 *  lib.rs
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

//! LED-panel stock ticker.
//!
//! Quotes are polled on a market-aware schedule, merged into a price store
//! that tracks flashes, large-move glows and stale data, and rendered as a
//! continuously scrolling strip of segments with LED panel overlays.

pub mod config;
pub mod constants;
pub mod fetcher;
pub mod func_timer;
pub mod icons;
pub mod market;
pub mod notify;
pub mod pacer;
pub mod price_state;
pub mod quote;
pub mod render;
pub mod scheduler;
pub mod surface;
pub mod symbol;
pub mod ticker;

#[cfg(feature = "emulator")]
pub mod emulator_window;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

pub use config::Settings;
pub use fetcher::{ApiKeys, FetchReport, QuoteFetcher};
pub use price_state::PriceStore;
pub use quote::{Quote, QuoteMap};
pub use symbol::Symbol;
pub use ticker::{Ticker, TickerEvent};
