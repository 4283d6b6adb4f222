/*
 *  tests/ticker_scenarios.rs
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

//! End-to-end scenarios through the public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use tickertape::config::{IndicatorStyle, PacingPolicy, Settings, StockEntry};
use tickertape::fetcher::{ApiKeys, FetchError, QuoteFetcher, QuoteTransport};
use tickertape::icons::IconCache;
use tickertape::market::MarketStatus;
use tickertape::notify::Silent;
use tickertape::price_state::PriceStore;
use tickertape::quote::{Quote, QuoteMap};
use tickertape::render::builder::{glow_color, Look};
use tickertape::render::{LedColor, SegmentBuilder};
use tickertape::scheduler::{self, FetchPlan, SchedulerCommand, UpdateScheduler};
use tickertape::symbol::Symbol;
use tickertape::ticker::{Ticker, TickerEvent};

fn quotes(items: &[(&str, Option<f64>, Option<f64>)]) -> QuoteMap {
    items
        .iter()
        .map(|(s, p, c)| (Symbol::new(s), Quote::new(*p, *c)))
        .collect()
}

#[test]
fn glow_needs_five_percent_and_lasts_300s() {
    let mut store = PriceStore::new();
    let aapl = Symbol::new("AAPL");
    let t0 = Instant::now();

    // 4.76% below the close: no glow
    store.apply(&quotes(&[("AAPL", Some(100.0), Some(105.0))]), t0);
    assert!(store.glow(&aapl).is_none());

    // 9.09% below a new close: red glow
    let out = store.apply(&quotes(&[("AAPL", Some(100.0), Some(110.0))]), t0);
    assert_eq!(out.glows_started, vec![aapl.clone()]);
    assert!(store.glow(&aapl).is_some());
    let quote = store.display_quote(&aapl);
    assert_eq!(glow_color(&quote), LedColor::Rgba(255, 0, 0, 50));
    assert_eq!(LedColor::for_direction(quote.direction()), LedColor::Down);

    assert!(!store.expire_glows(t0 + Duration::from_secs(299)));
    assert!(store.glow(&aapl).is_some());
    assert!(store.expire_glows(t0 + Duration::from_secs(300)));
    assert!(store.glow(&aapl).is_none());

    // same previous close, still above threshold: no second glow
    let again = t0 + Duration::from_secs(302);
    store.apply(&quotes(&[("AAPL", Some(99.0), Some(110.0))]), again);
    assert!(store.glow(&aapl).is_none());
}

#[test]
fn absent_after_three_failures_reads_na() {
    let mut store = PriceStore::new();
    let ibm = Symbol::new("IBM");
    let t0 = Instant::now();
    store.apply(&quotes(&[("IBM", Some(140.0), Some(139.0))]), t0);
    for _ in 0..2 {
        store.apply(&quotes(&[("IBM", None, None)]), t0);
        assert_eq!(store.display_quote(&ibm).price_text(), "140.00");
    }
    store.apply(&quotes(&[("IBM", None, None)]), t0);
    assert_eq!(store.display_quote(&ibm).price_text(), "N/A");
}

#[derive(Default)]
struct Recording {
    keys: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    rate_limit: bool,
}

impl QuoteTransport for Recording {
    async fn index_quote(&self, _symbol: &Symbol) -> Result<Quote, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Quote::new(Some(5000.0), Some(4990.0)))
    }

    async fn keyed_quote(&self, symbol: &Symbol, key: &str) -> Result<Quote, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().insert(symbol.to_string(), key.to_string());
        if self.rate_limit {
            return Err(FetchError::RateLimited);
        }
        Ok(Quote::new(Some(10.0), Some(9.5)))
    }
}

#[tokio::test(start_paused = true)]
async fn forty_five_symbols_split_across_keys() {
    let transport = Arc::new(Recording::default());
    let fetcher = QuoteFetcher::with_transport(Arc::clone(&transport));
    let symbols: Vec<Symbol> = (0..45).map(|i| Symbol::new(&format!("T{:02}", i))).collect();
    let keys = ApiKeys::new(Some("primary"), Some("secondary"));

    let report = fetcher.fetch(&symbols, &keys, PacingPolicy::RateLimit).await;
    assert_eq!(report.keyed_calls, 45);

    let used = transport.keys.lock().unwrap();
    for (i, s) in symbols.iter().enumerate() {
        let expected = if i < 30 { "primary" } else { "secondary" };
        assert_eq!(used[s.as_str()], expected, "call {}", i + 1);
    }
    assert_eq!(used.values().filter(|k| *k == "secondary").count(), 15);
}

#[tokio::test(start_paused = true)]
async fn two_rate_limited_cycles_suspend_fetching() {
    let transport = Arc::new(Recording { rate_limit: true, ..Default::default() });
    let fetcher = QuoteFetcher::with_transport(Arc::clone(&transport));
    let plan = FetchPlan {
        symbols: vec![Symbol::new("AAPL")],
        keys: ApiKeys::new(Some("k"), None),
        pacing: PacingPolicy::RateLimit,
        interval: Duration::from_secs(10),
    };
    let sched = UpdateScheduler::new(plan.interval, None, tokio::time::Instant::now());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(scheduler::run(sched, fetcher, plan, cmd_rx, event_tx));

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    // still backing off: neither the timer nor a manual refresh fetch
    cmd_tx.send(SchedulerCommand::FetchNow).unwrap();
    tokio::time::sleep(Duration::from_secs(105)).await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

    let mut reports = 0;
    while let Ok(TickerEvent::Prices(report)) = event_rx.try_recv() {
        assert!(report.rate_limited);
        reports += 1;
    }
    assert_eq!(reports, 3);

    drop(cmd_tx);
    task.await.unwrap();
}

fn settings(symbols: &[&str]) -> Settings {
    Settings {
        width: 400,
        ticker_height: 40,
        speed: 3.0,
        stocks: symbols.iter().map(|s| StockEntry::new(s)).collect(),
        ..Settings::default()
    }
}

#[test]
fn scroll_is_monotonic_and_wraps_losslessly() {
    let dir = tempfile::tempdir().unwrap();
    let icons = IconCache::new(dir.path().to_path_buf(), 32, true);
    let mut ticker = Ticker::new(settings(&["AAPL", "MSFT", "^DJI"]), icons, Box::new(Silent)).unwrap();
    let now = Instant::now();
    ticker.handle(
        TickerEvent::Prices(tickertape::FetchReport {
            quotes: quotes(&[
                ("AAPL", Some(190.0), Some(188.0)),
                ("MSFT", Some(410.0), Some(415.0)),
                ("^DJI", Some(39000.0), Some(39000.0)),
            ]),
            ..Default::default()
        }),
        now,
    );
    ticker.rebuild();

    let cycle = ticker.compositor().supercycle() as f64;
    assert!(cycle > 0.0);
    let mut last = ticker.compositor().offset();
    let mut travelled: f64 = 0.0;
    let mut wraps = 0;
    let frames = ((400.0 + cycle * 2.5) / 3.0) as usize;
    for _ in 0..frames {
        ticker.frame(1.0 / 60.0, now).unwrap();
        let offset = ticker.compositor().offset();
        travelled += 3.0;
        if offset < last {
            assert!((last - offset - 3.0).abs() < 1e-6);
        } else {
            wraps += 1;
            assert!(((last - 3.0) - (offset - cycle)).abs() < 1e-6);
        }
        last = offset;
    }
    assert!(wraps >= 2);
    assert!(((400.0 - travelled).rem_euclid(cycle) - last.rem_euclid(cycle)).abs() < 1e-6);
}

#[test]
fn rebuild_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut icons = IconCache::new(dir.path().to_path_buf(), 32, true);
    let mut store = PriceStore::new();
    store.apply(
        &quotes(&[
            ("AAPL", Some(100.0), Some(110.0)),
            ("GOOG", Some(170.0), Some(169.5)),
            ("ZZZ", None, None),
        ]),
        Instant::now(),
    );
    let symbols: Vec<Symbol> = ["AAPL", "GOOG", "ZZZ"].iter().map(|s| Symbol::new(s)).collect();
    let look = Look {
        height: 60,
        show_change_pct: true,
        global_text_glow: true,
        indicator_style: IndicatorStyle::Triangles,
    };

    let mut builder = SegmentBuilder::new();
    let a = builder.build(&symbols, &store, MarketStatus::Open, &mut icons, &look).unwrap();
    let mut fresh = SegmentBuilder::new();
    let b = fresh.build(&symbols, &store, MarketStatus::Open, &mut icons, &look).unwrap();

    let width = |segs: &[tickertape::render::RenderSegment]| segs.iter().map(|s| s.width).sum::<u32>();
    assert_eq!(width(&a), width(&b));
    let layout_a: Vec<_> = a.iter().map(|s| s.regions.clone()).collect();
    let layout_b: Vec<_> = b.iter().map(|s| s.regions.clone()).collect();
    assert_eq!(layout_a, layout_b);
}

#[test]
fn icon_cache_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = IconCache::new(dir.path().to_path_buf(), 100, true);
    let hot = Symbol::new("HOT");
    for i in 0..250 {
        cache.get(&hot, 20);
        cache.get(&Symbol::new(&format!("C{:03}", i)), 20);
        assert!(cache.len() <= 100);
    }
    assert!(cache.contains(&hot, 20));
    assert!(!cache.contains(&Symbol::new("C000"), 20));
    assert!(cache.contains(&Symbol::new("C249"), 20));
}
