/*
 *  fetcher/mod.rs
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

//! Batched quote fetching over the index and keyed feeds.

pub mod transport;

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::PacingPolicy;
use crate::constants::{BATCH_SIZE, KEY_RESET_CALLS, KEY_SWITCH_CALLS, MAX_CONCURRENT_QUOTES, QUOTE_TIMEOUT};
use crate::pacer::BatchPacer;
use crate::quote::{Quote, QuoteMap};
use crate::symbol::Symbol;

pub use transport::{FetchError, HttpTransport, IconSource, QuoteTransport};

/// API keys for the keyed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl ApiKeys {
    pub fn new(primary: Option<&str>, secondary: Option<&str>) -> Self {
        ApiKeys {
            primary: primary.map(str::to_string),
            secondary: secondary.map(str::to_string),
        }
    }

    /// Key for the `call`-th keyed request of a cycle (0 based).
    ///
    /// Blocks of 30 calls alternate primary/secondary, the count
    /// restarting every 60 calls. Without a secondary the primary is used
    /// throughout.
    pub fn key_for_call(&self, call: usize) -> Option<&str> {
        let primary = self.primary.as_deref()?;
        match self.secondary.as_deref() {
            Some(secondary) if call % KEY_RESET_CALLS >= KEY_SWITCH_CALLS => Some(secondary),
            _ => Some(primary),
        }
    }
}

/// Outcome of one fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub quotes: QuoteMap,
    /// at least one request answered 429 this cycle
    pub rate_limited: bool,
    pub failures: usize,
    /// keyed feed requests issued
    pub keyed_calls: usize,
}

/// Issues the requests of a fetch cycle on a bounded worker pool.
pub struct QuoteFetcher<T: QuoteTransport> {
    transport: Arc<T>,
    limiter: Arc<Semaphore>,
}

impl<T: QuoteTransport> Clone for QuoteFetcher<T> {
    fn clone(&self) -> Self {
        QuoteFetcher { transport: Arc::clone(&self.transport), limiter: Arc::clone(&self.limiter) }
    }
}

enum Call {
    Index,
    Keyed(String),
}

impl<T: QuoteTransport> QuoteFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    pub fn with_transport(transport: Arc<T>) -> Self {
        QuoteFetcher { transport, limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_QUOTES)) }
    }

    /// Fetch every symbol once.
    ///
    /// Index symbols always go to the no-key feed. Keyed symbols are only
    /// requested when a primary key is set, in batches of 10 with an
    /// adaptive pause between batches. A failed request yields an absent
    /// quote for that symbol.
    pub async fn fetch(&self, symbols: &[Symbol], keys: &ApiKeys, pacing: PacingPolicy) -> FetchReport {
        let (indices, keyed): (Vec<Symbol>, Vec<Symbol>) =
            symbols.iter().cloned().partition(Symbol::is_index);
        let mut report = FetchReport::default();

        if !indices.is_empty() {
            let calls = indices.into_iter().map(|s| (s, Call::Index)).collect();
            let batch = self.run_batch(calls).await;
            report.absorb(batch);
        }

        if keyed.is_empty() {
            return report;
        }
        if keys.primary.is_none() {
            debug!("no API key, skipping {} keyed symbols", keyed.len());
            return report;
        }

        let mut pacer = BatchPacer::new(pacing);
        let batches: Vec<&[Symbol]> = keyed.chunks(BATCH_SIZE).collect();
        let last = batches.len().saturating_sub(1);
        for (n, batch) in batches.into_iter().enumerate() {
            let calls = batch
                .iter()
                .map(|s| {
                    let key = keys.key_for_call(report.keyed_calls).unwrap_or_default().to_string();
                    report.keyed_calls += 1;
                    (s.clone(), Call::Keyed(key))
                })
                .collect();
            let outcome = self.run_batch(calls).await;
            pacer.record(outcome.failures > 0, outcome.rate_limited);
            if outcome.rate_limited {
                warn!("rate limited during batch {} of {}", n + 1, last + 1);
            }
            report.absorb(outcome);
            if n < last {
                tokio::time::sleep(pacer.delay()).await;
            }
        }

        info!(
            "fetched {} quotes, {} failed{}",
            report.quotes.len(),
            report.failures,
            if report.rate_limited { ", rate limited" } else { "" }
        );
        report
    }

    async fn run_batch(&self, calls: Vec<(Symbol, Call)>) -> FetchReport {
        let mut report = FetchReport::default();
        let mut set = JoinSet::new();
        for (symbol, call) in calls {
            // absent until the request proves otherwise
            report.quotes.insert(symbol.clone(), Quote::absent());
            let transport = Arc::clone(&self.transport);
            let limiter = Arc::clone(&self.limiter);
            set.spawn(async move {
                let _permit = limiter.acquire_owned().await;
                let request = async {
                    match &call {
                        Call::Index => transport.index_quote(&symbol).await,
                        Call::Keyed(key) => transport.keyed_quote(&symbol, key).await,
                    }
                };
                let result = match tokio::time::timeout(QUOTE_TIMEOUT, request).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout),
                };
                (symbol, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((symbol, Ok(quote))) => {
                    if quote.is_absent() {
                        report.failures += 1;
                    }
                    report.quotes.insert(symbol, quote);
                }
                Ok((symbol, Err(e))) => {
                    report.failures += 1;
                    if e.is_rate_limited() {
                        report.rate_limited = true;
                    }
                    debug!("quote for {} failed: {}", symbol, e);
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("quote task failed: {}", e);
                }
            }
        }
        report
    }
}

impl FetchReport {
    fn absorb(&mut self, other: FetchReport) {
        self.quotes.extend(other.quotes);
        self.rate_limited |= other.rate_limited;
        self.failures += other.failures;
    }
}
