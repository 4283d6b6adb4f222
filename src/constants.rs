/*
 *  constants.rs
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

use std::time::Duration;

// Quote feeds
/// Keyed per-symbol quote endpoint (`?symbol=..&token=..`).
pub const KEYED_QUOTE_URL: &str = "https://finnhub.io/api/v1/quote";
/// No-key index endpoint, symbol appended as a path segment.
pub const INDEX_QUOTE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
/// Icon repository, `<SYMBOL>.png` appended.
pub const ICON_REPO_URL: &str = "https://raw.githubusercontent.com/krypdoh/stock-icons/refs/heads/main/ticker_icons";
/// Chart page opened for a clicked symbol.
pub const CHART_URL: &str = "https://www.tradingview.com/symbols";
pub const DONATE_URL: &str = "https://paypal.me/paypaulc";

/// Reserved prefix marking an index symbol.
pub const INDEX_PREFIX: char = '^';

// Fetching
pub const BATCH_SIZE: usize = 10;
pub const MAX_CONCURRENT_QUOTES: usize = 10;
pub const MAX_CONCURRENT_ICONS: usize = 5;
pub const QUOTE_TIMEOUT: Duration = Duration::from_secs(10);
pub const ICON_TIMEOUT: Duration = Duration::from_secs(5);
/// Calls on the primary key before switching to the secondary.
pub const KEY_SWITCH_CALLS: usize = 30;
/// Call count at which rotation restarts on the primary key.
pub const KEY_RESET_CALLS: usize = 60;

// Inter-batch pacing, seconds
pub const BATCH_DELAY_BASE: f64 = 1.0;
pub const ERROR_DELAY_STEP: f64 = 0.5;
pub const ERROR_DELAY_CAP: f64 = 5.0;
pub const RATE_LIMIT_DELAY_STEP: f64 = 1.0;
pub const RATE_LIMIT_DELAY_CAP: f64 = 10.0;

// Price state
pub const GLOW_THRESHOLD_PCT: f64 = 5.0;
pub const GLOW_DURATION: Duration = Duration::from_secs(300);
pub const GLOW_COOLDOWN: Duration = Duration::from_secs(5);
pub const FLASH_DURATION: Duration = Duration::from_millis(400);
/// Consecutive failures before a stale price is surfaced as absent.
pub const STALE_GRACE_FAILURES: u32 = 3;

// Scheduler
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(300);
pub const CLOSED_MARKET_MIN_INTERVAL: Duration = Duration::from_secs(900);
pub const CLOSED_MARKET_FACTOR: u32 = 3;
pub const MARKET_RECHECK: Duration = Duration::from_secs(5 * 60);
pub const BACKOFF_WINDOW: Duration = Duration::from_secs(300);
/// Rate-limited cycles in a row before backing off.
pub const BACKOFF_AFTER_CYCLES: u32 = 2;
/// Granularity of the scheduler timer.
pub const SCHEDULER_TICK: Duration = Duration::from_secs(1);

// Rendering
pub const TARGET_FPS: u32 = 60;
/// Largest frame delta fed to the scroll, seconds.
pub const MAX_FRAME_ELAPSED: f64 = 0.050;
/// Scroll speed is expressed per 60 Hz frame.
pub const SPEED_FRAME_RATE: f64 = 60.0;
/// Every n-th cycle carries the donate segment.
pub const DONATE_EVERY: usize = 3;
pub const ICON_SCALE: f32 = 0.85;
pub const FONT_SCALE: f32 = 0.7;
/// Downscale ratio of the icon pixelation pass.
pub const ICON_PIXELATE: f32 = 0.87;
pub const ICON_PIXELATE_MIN: u32 = 16;
pub const ICON_SCANLINE_PERIOD: u32 = 4;
pub const ICON_SCANLINE_ALPHA: u8 = 25;
/// LED matrix overlay on icons
pub const ICON_MATRIX_PERIOD: u32 = 6;
pub const ICON_MATRIX_ALPHA: u8 = 30;
pub const ICON_CACHE_LIMIT: usize = 100;
pub const GHOST_OPACITY: f32 = 0.6;
pub const GLOW_ALPHA: u8 = 50;
pub const SUBTLE_GLOW_ALPHA: u8 = 22;
pub const HOUSEKEEPING_EVERY: Duration = Duration::from_secs(1);
pub const SNAPSHOT_EVERY: Duration = Duration::from_secs(10);

pub const DONATE_TEXT: &str = "      Please Donate!          ";
pub const LOADING_TEXT: &str = "Loading";
