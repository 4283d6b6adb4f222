/*
 *  scheduler.rs
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

//! Fetch cadence: market-aware interval, manual refresh and rate-limit
//! backoff.
//!
//! [`UpdateScheduler`] is a plain state machine driven by explicit
//! instants; [`run`] wraps it in a task that owns the fetcher and hands
//! every report to the render loop.

use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{PacingPolicy, Settings};
use crate::constants::{
    BACKOFF_AFTER_CYCLES, BACKOFF_WINDOW, CLOSED_MARKET_FACTOR, CLOSED_MARKET_MIN_INTERVAL, MARKET_RECHECK,
    SCHEDULER_TICK,
};
use crate::fetcher::{ApiKeys, QuoteFetcher, QuoteTransport};
use crate::market::MarketCalendar;
use crate::symbol::Symbol;
use crate::ticker::TickerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Applying,
    Backoff { until: Instant },
}

pub struct UpdateScheduler {
    state: SchedulerState,
    interval: Duration,
    next_due: Instant,
    last_cycle: Option<Instant>,
    rate_limited_cycles: u32,
    calendar: Option<MarketCalendar>,
    market_open: bool,
    market_checked: Option<Instant>,
}

impl UpdateScheduler {
    /// First cycle is due at `now`. Without a calendar the market counts
    /// as always open.
    pub fn new(interval: Duration, calendar: Option<MarketCalendar>, now: Instant) -> Self {
        Self {
            state: SchedulerState::Idle,
            interval,
            next_due: now,
            last_cycle: None,
            rate_limited_cycles: 0,
            calendar,
            market_open: true,
            market_checked: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn in_backoff(&self) -> bool {
        matches!(self.state, SchedulerState::Backoff { .. })
    }

    /// Configured interval, widened while the market is closed.
    pub fn effective_interval(&self) -> Duration {
        if self.market_open {
            self.interval
        } else {
            (self.interval * CLOSED_MARKET_FACTOR).max(CLOSED_MARKET_MIN_INTERVAL)
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.reschedule();
    }

    fn reschedule(&mut self) {
        if let Some(last) = self.last_cycle {
            self.next_due = last + self.effective_interval();
        }
    }

    /// Recheck market hours, at most every five minutes.
    pub fn refresh_market(&mut self, now: Instant) {
        if self.market_checked.is_some_and(|at| now.saturating_duration_since(at) < MARKET_RECHECK) {
            return;
        }
        self.market_checked = Some(now);
        let open = self.calendar.as_ref().is_none_or(|c| c.is_open(Utc::now()));
        self.set_market_open(open);
    }

    pub fn set_market_open(&mut self, open: bool) {
        if open != self.market_open {
            self.market_open = open;
            info!(
                "market {}, refreshing every {:?}",
                if open { "open" } else { "closed" },
                self.effective_interval()
            );
            self.reschedule();
        }
    }

    /// Manual refresh. Ignored while backing off.
    pub fn fetch_now(&mut self, now: Instant) {
        if self.in_backoff() {
            info!("refresh requested during rate-limit backoff, ignored");
            return;
        }
        self.next_due = now;
    }

    /// True when a cycle should start now; moves to `Fetching`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let SchedulerState::Backoff { until } = self.state {
            if now < until {
                return false;
            }
            info!("rate-limit backoff over, resuming");
            self.state = SchedulerState::Idle;
            self.next_due = now;
        }
        if self.state == SchedulerState::Idle && now >= self.next_due {
            self.state = SchedulerState::Fetching;
            return true;
        }
        false
    }

    /// A fetch came back. Moves to `Applying`, or to `Backoff` after the
    /// second rate-limited cycle in a row. Returns true when backoff began.
    pub fn fetch_finished(&mut self, rate_limited: bool, now: Instant) -> bool {
        self.last_cycle = Some(now);
        if !rate_limited {
            self.rate_limited_cycles = 0;
            self.state = SchedulerState::Applying;
            return false;
        }
        self.rate_limited_cycles += 1;
        warn!("rate limited, {} cycle(s) in a row", self.rate_limited_cycles);
        if self.rate_limited_cycles >= BACKOFF_AFTER_CYCLES {
            self.rate_limited_cycles = 0;
            let until = now + BACKOFF_WINDOW;
            warn!("backing off for {:?}", BACKOFF_WINDOW);
            self.state = SchedulerState::Backoff { until };
            return true;
        }
        self.state = SchedulerState::Applying;
        false
    }

    /// Results handed over; count down to the next cycle.
    pub fn applied(&mut self, now: Instant) {
        if self.state == SchedulerState::Applying {
            self.state = SchedulerState::Idle;
            self.next_due = now + self.effective_interval();
            debug!("next fetch in {:?}", self.effective_interval());
        }
    }
}

/// What a cycle fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub symbols: Vec<Symbol>,
    pub keys: ApiKeys,
    pub pacing: PacingPolicy,
    pub interval: Duration,
}

impl From<&Settings> for FetchPlan {
    fn from(s: &Settings) -> Self {
        Self {
            symbols: s.symbols(),
            keys: ApiKeys::new(s.primary_key(), s.secondary_key()),
            pacing: s.pacing,
            interval: s.update_interval(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SchedulerCommand {
    FetchNow,
    Reconfigure(FetchPlan),
}

/// Scheduler task. Ends when the command channel closes or the render
/// loop stops listening.
pub async fn run<T: QuoteTransport>(
    mut scheduler: UpdateScheduler,
    fetcher: QuoteFetcher<T>,
    mut plan: FetchPlan,
    mut commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    events: mpsc::UnboundedSender<TickerEvent>,
) {
    let mut tick = tokio::time::interval(SCHEDULER_TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            cmd = commands.recv() => match cmd {
                Some(SchedulerCommand::FetchNow) => scheduler.fetch_now(Instant::now()),
                Some(SchedulerCommand::Reconfigure(next)) => {
                    scheduler.set_interval(next.interval);
                    let changed = next.symbols != plan.symbols || next.keys != plan.keys;
                    plan = next;
                    if changed {
                        scheduler.fetch_now(Instant::now());
                    }
                }
                None => break,
            }
        }

        let now = Instant::now();
        scheduler.refresh_market(now);
        if !scheduler.poll(now) {
            continue;
        }

        let report = fetcher.fetch(&plan.symbols, &plan.keys, plan.pacing).await;
        scheduler.fetch_finished(report.rate_limited, Instant::now());
        if events.send(TickerEvent::Prices(report)).is_err() {
            break;
        }
        scheduler.applied(Instant::now());
    }
    debug!("scheduler stopped");
}
