/*
 *  main.rs
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

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use tickertape::config::{self, Cli};
use tickertape::constants::SNAPSHOT_EVERY;
use tickertape::fetcher::{HttpTransport, QuoteFetcher};
use tickertape::icons::{IconCache, IconFetcher};
use tickertape::market::MarketCalendar;
use tickertape::notify::{BellNotifier, Notifier, Silent};
use tickertape::scheduler::{self, FetchPlan, UpdateScheduler};
use tickertape::surface::HeadlessSurface;
use tickertape::ticker::{self, Ticker, TickerEvent};
use tickertape::LONG_VERSION;

/// Waits for SIGINT or SIGTERM.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Re-read the config on SIGHUP and hand it to the render loop.
async fn reload_on_hangup(cli: Cli, events: mpsc::UnboundedSender<TickerEvent>) -> Result<(), std::io::Error> {
    let mut sighup = signal(SignalKind::hangup())?;
    while sighup.recv().await.is_some() {
        match config::load(&cli) {
            Ok(settings) => {
                info!("SIGHUP received, configuration reloaded");
                if events.send(TickerEvent::Settings(Box::new(settings))).is_err() {
                    break;
                }
            }
            Err(e) => warn!("SIGHUP received, config rejected: {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = config::load(&cli).context("loading configuration")?;

    let level = settings.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    if cli.dump_config {
        print!("{}", config::dump(&settings)?);
        return Ok(());
    }

    info!("tickertape {}", LONG_VERSION);
    info!("{} symbols, refresh every {}s", settings.stocks.len(), settings.update_interval);
    if settings.primary_key().is_none() {
        warn!("no quote API key configured, showing indices only");
    }

    let transport = Arc::new(HttpTransport::new(&settings).context("building HTTP client")?);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (sched_tx, sched_rx) = mpsc::unbounded_channel();
    let (icon_req_tx, icon_req_rx) = mpsc::unbounded_channel();
    let (icon_tx, icon_rx) = mpsc::unbounded_channel();

    // icons: preload whatever is not on disk yet
    let icon_dir = settings.icon_dir();
    let icon_fetcher = Arc::new(IconFetcher::new(Arc::clone(&transport), icon_dir.clone()));
    for symbol in icon_fetcher.missing(&settings.symbols()) {
        let _ = icon_req_tx.send(symbol);
    }
    tokio::spawn(Arc::clone(&icon_fetcher).run(icon_req_rx, icon_tx));
    tokio::spawn(ticker::forward_icons(icon_rx, event_tx.clone()));

    let icons = IconCache::new(icon_dir, settings.icon_cache_limit, settings.led_icon_matrix)
        .with_requests(icon_req_tx);
    let notifier: Box<dyn Notifier> = if settings.play_sound_on_update {
        Box::new(BellNotifier::stdout())
    } else {
        Box::new(Silent)
    };
    let engine = Ticker::new(settings.clone(), icons, notifier).context("creating the ticker")?;

    let update = UpdateScheduler::new(
        settings.update_interval(),
        Some(MarketCalendar::new(settings.market_holidays)),
        tokio::time::Instant::now(),
    );
    let fetcher = QuoteFetcher::with_transport(Arc::clone(&transport));
    tokio::spawn(scheduler::run(update, fetcher, FetchPlan::from(&settings), sched_rx, event_tx.clone()));

    let reload_events = event_tx.clone();
    let reload_cli = cli.clone();
    tokio::spawn(async move {
        if let Err(e) = reload_on_hangup(reload_cli, reload_events).await {
            error!("SIGHUP handler failed: {}", e);
        }
    });

    #[cfg(feature = "emulator")]
    if cli.window {
        use tickertape::emulator_window::{PreviewConfig, PreviewWindow};
        use tickertape::surface::{SharedFrame, SharedSurface};

        let shared = SharedFrame::default();
        tokio::spawn(ticker::run(engine, event_rx, sched_tx, SharedSurface::new(Arc::clone(&shared))));

        // winit needs the main thread
        let config = PreviewConfig {
            width: settings.width,
            height: settings.ticker_height,
            screenshot: cli.snapshot.clone().unwrap_or_else(|| "tickertape.png".into()),
            bg_color: [8, 10, 12, 255],
        };
        let window = PreviewWindow::new(shared, event_tx, config);
        return window.run().map_err(|e| anyhow::anyhow!(e.to_string()));
    }

    #[cfg(not(feature = "emulator"))]
    if cli.window {
        error!("Preview window requested but not compiled with --features emulator");
        anyhow::bail!("build with --features emulator to use --window");
    }

    let surface = HeadlessSurface::new(cli.snapshot.clone(), SNAPSHOT_EVERY);
    let mut render = tokio::spawn(ticker::run(engine, event_rx, sched_tx, surface));

    tokio::select! {
        result = signal_handler() => {
            result.context("installing signal handlers")?;
            let _ = event_tx.send(TickerEvent::Shutdown);
            let _ = render.await;
        }
        _ = &mut render => {
            info!("render loop ended");
        }
    }
    info!("tickertape stopped");
    Ok(())
}
