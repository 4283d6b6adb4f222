/*
 *  ticker.rs
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

//! The render-side engine.
//!
//! [`Ticker`] is the single owner of the price store, the icon cache and
//! the compositor. Workers never touch them; they post [`TickerEvent`]s
//! which the render loop drains before each frame.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tiny_skia::Pixmap;
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::config::Settings;
use crate::constants::{HOUSEKEEPING_EVERY, TARGET_FPS};
use crate::fetcher::FetchReport;
use crate::icons::IconCache;
use crate::market::{MarketCalendar, MarketStatus};
use crate::notify::Notifier;
use crate::pacer::FramePacer;
use crate::price_state::PriceStore;
use crate::render::builder::Look;
use crate::render::compositor::Effects;
use crate::render::{RegionKind, RenderError, ScrollCompositor, SegmentBuilder};
use crate::scheduler::{FetchPlan, SchedulerCommand};
use crate::surface::Surface;
use crate::symbol::Symbol;

/// Everything that may change engine state, funnelled through one queue.
#[derive(Debug)]
pub enum TickerEvent {
    Prices(FetchReport),
    IconDelivered(Symbol, Vec<u8>),
    Settings(Box<Settings>),
    /// pointer entered (true) or left the panel
    Hover(bool),
    TogglePause,
    FetchNow,
    Click { x: i32, y: i32 },
    Shutdown,
}

/// Follow-up the engine asks the outside world to perform.
#[derive(Debug, PartialEq)]
pub enum Reaction {
    Schedule(SchedulerCommand),
    Open(String),
    Quit,
}

pub struct Ticker {
    settings: Settings,
    symbols: Vec<Symbol>,
    store: PriceStore,
    icons: IconCache,
    builder: SegmentBuilder,
    compositor: ScrollCompositor,
    calendar: MarketCalendar,
    market: MarketStatus,
    notifier: Box<dyn Notifier>,
    dirty: bool,
    last_housekeeping: Option<Instant>,
}

impl Ticker {
    pub fn new(settings: Settings, icons: IconCache, notifier: Box<dyn Notifier>) -> Result<Self, RenderError> {
        let calendar = MarketCalendar::new(settings.market_holidays);
        let compositor = ScrollCompositor::new(
            settings.width,
            settings.ticker_height,
            settings.speed,
            Effects::from(&settings),
        )?;
        Ok(Self {
            symbols: settings.symbols(),
            market: calendar.status_now(),
            settings,
            store: PriceStore::new(),
            icons,
            builder: SegmentBuilder::new(),
            compositor,
            calendar,
            notifier,
            dirty: true,
            last_housekeeping: None,
        })
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub fn compositor(&self) -> &ScrollCompositor {
        &self.compositor
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn needs_rebuild(&self) -> bool {
        self.dirty
    }

    /// Single dispatch point for worker results and user input.
    pub fn handle(&mut self, event: TickerEvent, now: Instant) -> Option<Reaction> {
        match event {
            TickerEvent::Prices(report) => {
                self.apply_report(&report, now);
                None
            }
            TickerEvent::IconDelivered(symbol, bytes) => {
                debug!("icon for {} delivered", symbol);
                self.icons.deliver(symbol, bytes);
                self.dirty = true;
                None
            }
            TickerEvent::Settings(settings) => self.apply_settings(*settings),
            TickerEvent::Hover(inside) => {
                self.compositor.set_hover(inside);
                None
            }
            TickerEvent::TogglePause => {
                let paused = self.compositor.toggle_pause();
                info!("scrolling {}", if paused { "paused" } else { "resumed" });
                None
            }
            TickerEvent::FetchNow => Some(Reaction::Schedule(SchedulerCommand::FetchNow)),
            TickerEvent::Click { x, y } => {
                let hit = self.compositor.hit_test(x, y);
                let link = self.compositor.link_at(x, y);
                if let (Some((kind, symbol)), Some(link)) = (hit, link) {
                    match (kind, symbol) {
                        (RegionKind::Donate, _) => info!("donate clicked"),
                        (_, Some(s)) => info!("{} clicked", s),
                        _ => {}
                    }
                    return Some(Reaction::Open(link));
                }
                None
            }
            TickerEvent::Shutdown => Some(Reaction::Quit),
        }
    }

    /// Merge a fetch report; results always land, last write wins.
    pub fn apply_report(&mut self, report: &FetchReport, now: Instant) {
        let outcome = self.store.apply(&report.quotes, now);
        if outcome.any_price_changed && self.settings.play_sound_on_update {
            self.notifier.prices_changed();
        }
        if !outcome.glows_started.is_empty() {
            debug!("glow started for {:?}", outcome.glows_started);
        }
        if self.compositor.is_loading() {
            self.compositor.set_loading(false);
        }
        self.dirty = true;
    }

    fn apply_settings(&mut self, next: Settings) -> Option<Reaction> {
        let symbols = next.symbols();
        let stocks_changed = symbols != self.symbols;
        let fetch_changed = FetchPlan::from(&next) != FetchPlan::from(&self.settings);

        if next.visuals_differ(&self.settings) {
            self.icons.set_matrix(next.led_icon_matrix);
            if next.ticker_height != self.settings.ticker_height {
                self.builder.clear();
            }
            self.dirty = true;
        }
        self.icons.set_limit(next.icon_cache_limit);
        if let Err(e) = self.compositor.resize(next.width, next.ticker_height) {
            error!("resize failed: {}", e);
        }
        self.compositor.set_speed(next.speed);
        self.compositor.set_effects(Effects::from(&next));

        if stocks_changed {
            info!("stock list now {} symbols", symbols.len());
            self.symbols = symbols;
            self.compositor.reset();
            self.dirty = true;
        }
        let plan = FetchPlan::from(&next);
        self.settings = next;
        fetch_changed.then_some(Reaction::Schedule(SchedulerCommand::Reconfigure(plan)))
    }

    /// Glow expiry and market status, about once a second.
    pub fn housekeeping(&mut self, now: Instant) {
        if self
            .last_housekeeping
            .is_some_and(|at| now.saturating_duration_since(at) < HOUSEKEEPING_EVERY)
        {
            return;
        }
        self.last_housekeeping = Some(now);
        if self.store.expire_glows(now) {
            self.dirty = true;
        }
        let market = self.calendar.status_now();
        if market != self.market {
            info!("market {}", market.label());
            self.market = market;
            self.dirty = true;
        }
    }

    /// Wholesale rebuild when anything visual changed. A failed build
    /// keeps the previous segments on screen.
    pub fn rebuild(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let look = Look::from(&self.settings);
        let built = self
            .builder
            .build(&self.symbols, &self.store, self.market, &mut self.icons, &look)
            .and_then(|segments| self.builder.donate(look.height).map(|donate| (segments, donate)));
        match built {
            Ok((segments, donate)) => self.compositor.set_segments(segments, Some(donate)),
            Err(e) => error!("segment rebuild failed: {}", e),
        }
    }

    /// Advance the scroll and composite one frame.
    pub fn frame(&mut self, elapsed: f64, now: Instant) -> Result<&Pixmap, RenderError> {
        self.compositor.advance(elapsed);
        self.compositor.render(&self.store, now)
    }
}

/// Render loop: drain events, housekeep, rebuild, draw, sleep the rest of
/// the frame budget. Returns on shutdown or when every sender is gone.
pub async fn run<S: Surface>(
    mut ticker: Ticker,
    mut events: mpsc::UnboundedReceiver<TickerEvent>,
    scheduler: mpsc::UnboundedSender<SchedulerCommand>,
    mut surface: S,
) {
    let mut pacer = FramePacer::new(TARGET_FPS);
    loop {
        let now = Instant::now();
        let elapsed = pacer.begin(now);

        loop {
            match events.try_recv() {
                Ok(event) => match ticker.handle(event, now) {
                    Some(Reaction::Schedule(cmd)) => {
                        if scheduler.send(cmd).is_err() {
                            warn!("scheduler gone");
                        }
                    }
                    Some(Reaction::Open(link)) => info!("open {}", link),
                    Some(Reaction::Quit) => {
                        info!("ticker stopping");
                        return;
                    }
                    None => {}
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("event channel closed, ticker stopping");
                    return;
                }
            }
        }

        ticker.housekeeping(now);
        ticker.rebuild();
        match ticker.frame(elapsed, now) {
            Ok(frame) => {
                if let Err(e) = surface.present(frame, now) {
                    warn!("present failed: {}", e);
                }
            }
            Err(e) => error!("frame failed: {}", e),
        }

        let wait = pacer.finish(Instant::now());
        tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
    }
}

/// Bridge icon fetcher deliveries into the event queue.
pub async fn forward_icons(
    mut delivered: mpsc::UnboundedReceiver<(Symbol, Vec<u8>)>,
    events: mpsc::UnboundedSender<TickerEvent>,
) {
    while let Some((symbol, bytes)) = delivered.recv().await {
        if events.send(TickerEvent::IconDelivered(symbol, bytes)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StockEntry;
    use crate::notify::Silent;
    use crate::quote::Quote;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    impl Notifier for Counting {
        fn prices_changed(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings(symbols: &[&str]) -> Settings {
        Settings {
            width: 320,
            ticker_height: 40,
            stocks: symbols.iter().map(|s| StockEntry::new(s)).collect(),
            ..Settings::default()
        }
    }

    fn ticker(symbols: &[&str], notifier: Box<dyn Notifier>) -> (tempfile::TempDir, Ticker) {
        let dir = tempfile::tempdir().unwrap();
        let icons = IconCache::new(dir.path().to_path_buf(), 16, true);
        let t = Ticker::new(settings(symbols), icons, notifier).unwrap();
        (dir, t)
    }

    fn report(items: &[(&str, f64, f64)]) -> FetchReport {
        FetchReport {
            quotes: items
                .iter()
                .map(|(s, p, c)| (Symbol::new(s), Quote::new(Some(*p), Some(*c))))
                .collect(),
            ..FetchReport::default()
        }
    }

    #[test]
    fn test_loading_until_first_report() {
        let (_dir, mut t) = ticker(&["IBM"], Box::new(Silent));
        let now = Instant::now();
        t.rebuild();
        assert!(t.compositor().is_loading());
        t.handle(TickerEvent::Prices(report(&[("IBM", 100.0, 99.0)])), now);
        assert!(!t.compositor().is_loading());
        assert!(t.needs_rebuild());
        t.rebuild();
        assert!(!t.needs_rebuild());
        // market + IBM
        assert!(t.compositor().supercycle() > 0);
    }

    #[test]
    fn test_notifies_only_on_change() {
        let count = Arc::new(AtomicUsize::new(0));
        let (_dir, mut t) = ticker(&["IBM"], Box::new(Counting(Arc::clone(&count))));
        let now = Instant::now();
        // the first load counts as a change
        t.apply_report(&report(&[("IBM", 100.0, 99.0)]), now);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        t.apply_report(&report(&[("IBM", 100.0, 99.0)]), now);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        t.apply_report(&report(&[("IBM", 101.0, 99.0)]), now);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stock_change_reconfigures_and_resets() {
        let (_dir, mut t) = ticker(&["IBM"], Box::new(Silent));
        t.handle(TickerEvent::Prices(report(&[("IBM", 100.0, 99.0)])), Instant::now());
        t.rebuild();
        let reaction = t.handle(TickerEvent::Settings(Box::new(settings(&["MSFT", "IBM"]))), Instant::now());
        assert!(matches!(reaction, Some(Reaction::Schedule(SchedulerCommand::Reconfigure(_)))));
        assert_eq!(t.symbols(), &[Symbol::new("IBM"), Symbol::new("MSFT")]);
        assert_eq!(t.compositor().offset(), 320.0);
        assert!(t.needs_rebuild());
    }

    #[test]
    fn test_speed_change_needs_no_refetch() {
        let (_dir, mut t) = ticker(&["IBM"], Box::new(Silent));
        let mut next = settings(&["IBM"]);
        next.speed = 4.0;
        assert_eq!(t.handle(TickerEvent::Settings(Box::new(next)), Instant::now()), None);
    }

    #[test]
    fn test_click_opens_chart() {
        let (_dir, mut t) = ticker(&["IBM"], Box::new(Silent));
        let now = Instant::now();
        t.handle(TickerEvent::Prices(report(&[("IBM", 100.0, 99.0)])), now);
        t.rebuild();
        // scroll until the IBM symbol label sits at the left edge
        let market_w = t.compositor().visible(0)[0].1.width as f64;
        while t.compositor().offset() > -market_w - 40.0 {
            t.compositor.set_paused(false);
            t.compositor.advance(0.05);
        }
        t.frame(0.0, now).unwrap();
        let regions = t.compositor().regions().to_vec();
        let sym = regions
            .iter()
            .find(|r| r.kind == RegionKind::Symbol)
            .expect("symbol region visible");
        let (x, y) = (sym.bounds.top_left.x.max(0) + 1, 5);
        let reaction = t.handle(TickerEvent::Click { x, y }, now);
        assert_eq!(reaction, Some(Reaction::Open("https://www.tradingview.com/symbols/IBM/".into())));
    }

    #[test]
    fn test_glow_expiry_triggers_rebuild() {
        let (_dir, mut t) = ticker(&["AAPL"], Box::new(Silent));
        let t0 = Instant::now();
        t.apply_report(&report(&[("AAPL", 100.0, 110.0)]), t0);
        assert!(t.store().glow(&Symbol::new("AAPL")).is_some());
        t.rebuild();
        t.housekeeping(t0 + Duration::from_secs(299));
        assert!(t.store().glow(&Symbol::new("AAPL")).is_some());
        t.rebuild();
        t.housekeeping(t0 + Duration::from_secs(300));
        assert!(t.store().glow(&Symbol::new("AAPL")).is_none());
        assert!(t.needs_rebuild());
    }
}
