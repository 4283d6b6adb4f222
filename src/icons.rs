/*
 *  icons.rs
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

//! Company icons: bounded LRU of processed bitmaps over a disk cache,
//! with remote fetches done off the render thread.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};
use thiserror::Error;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::constants::*;
use crate::fetcher::{FetchError, IconSource};
use crate::render::canvas::fill_rect;
use crate::render::color::LedColor;
use crate::symbol::Symbol;

#[derive(Debug, Error)]
pub enum IconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("icon fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("PNG decode failed: {0}")]
    Decode(String),
    #[error("cannot allocate {0}x{0} icon")]
    Alloc(u32),
}

/// Local file for a symbol's raw icon.
pub fn icon_path(dir: &Path, symbol: &Symbol) -> PathBuf {
    dir.join(format!("{}.png", symbol.as_str()))
}

/// Processed icons keyed by (symbol, size), least recently used first.
///
/// Lives on the render thread. Raw bytes handed over by the icon fetcher
/// take precedence over the disk copy.
pub struct IconCache {
    entries: IndexMap<(Symbol, u32), Arc<Pixmap>>,
    limit: usize,
    dir: PathBuf,
    matrix: bool,
    delivered: HashMap<Symbol, Arc<Vec<u8>>>,
    requested: HashSet<Symbol>,
    requests: Option<mpsc::UnboundedSender<Symbol>>,
}

impl IconCache {
    pub fn new(dir: PathBuf, limit: usize, matrix: bool) -> Self {
        IconCache {
            entries: IndexMap::new(),
            limit: limit.max(1),
            dir,
            matrix,
            delivered: HashMap::new(),
            requested: HashSet::new(),
            requests: None,
        }
    }

    /// Route misses without a disk copy to the remote fetcher.
    pub fn with_requests(mut self, tx: mpsc::UnboundedSender<Symbol>) -> Self {
        self.requests = Some(tx);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol, size: u32) -> bool {
        self.entries.contains_key(&(symbol.clone(), size))
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &(Symbol, u32)> {
        self.entries.keys()
    }

    /// Processed icon; unresolvable icons come back transparent. `None`
    /// only when no bitmap of that size can be allocated.
    pub fn get(&mut self, symbol: &Symbol, size: u32) -> Option<Arc<Pixmap>> {
        let key = (symbol.clone(), size);
        if let Some(idx) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
            return Some(Arc::clone(&self.entries[last]));
        }

        let icon = match self.resolve(symbol, size) {
            Ok(icon) => icon,
            Err(e) => {
                debug!("icon for {} unavailable: {}", symbol, e);
                Pixmap::new(size.max(1), size.max(1))?
            }
        };
        let icon = Arc::new(icon);
        self.entries.insert(key, Arc::clone(&icon));
        self.evict();
        Some(icon)
    }

    fn resolve(&mut self, symbol: &Symbol, size: u32) -> Result<Pixmap, IconError> {
        let bytes = match self.delivered.get(symbol) {
            Some(bytes) => Arc::clone(bytes),
            None => match std::fs::read(icon_path(&self.dir, symbol)) {
                Ok(bytes) => Arc::new(bytes),
                Err(e) => {
                    self.request_remote(symbol);
                    return Err(e.into());
                }
            },
        };
        let decoded = Pixmap::decode_png(&bytes).map_err(|e| IconError::Decode(e.to_string()))?;
        process(&decoded, size, self.matrix)
    }

    fn request_remote(&mut self, symbol: &Symbol) {
        if let Some(tx) = &self.requests {
            if self.requested.insert(symbol.clone()) {
                let _ = tx.send(symbol.clone());
            }
        }
    }

    /// Raw bytes arrived from the fetcher; drop stale processed copies.
    pub fn deliver(&mut self, symbol: Symbol, bytes: Vec<u8>) {
        self.invalidate(&symbol);
        self.delivered.insert(symbol, Arc::new(bytes));
    }

    pub fn invalidate(&mut self, symbol: &Symbol) {
        self.entries.retain(|(s, _), _| s != symbol);
    }

    /// Toggle the LED matrix overlay; processed icons are redone.
    pub fn set_matrix(&mut self, matrix: bool) {
        if self.matrix != matrix {
            self.matrix = matrix;
            self.entries.clear();
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.evict();
    }

    /// Over the limit, drop the least recently used fifth in one pass.
    fn evict(&mut self) {
        let len = self.entries.len();
        if len <= self.limit {
            return;
        }
        let count = (self.limit / 5).max(len - self.limit).min(len);
        self.entries.drain(..count);
        debug!("icon cache evicted {} entries", count);
    }
}

/// Fit to `size`, pixelate, then scanlines and the optional LED matrix.
pub fn process(src: &Pixmap, size: u32, matrix: bool) -> Result<Pixmap, IconError> {
    let size = size.max(1);
    let fitted = fit(src, size, size, FilterQuality::Bicubic)?;

    let small = ((size as f32 * ICON_PIXELATE) as u32).max(ICON_PIXELATE_MIN).min(size);
    let reduced = fit_stretch(&fitted, small, FilterQuality::Bilinear)?;
    let mut out = fit_stretch(&reduced, size, FilterQuality::Bilinear)?;

    let s = size as f32;
    let scanline = LedColor::Black.with_alpha(ICON_SCANLINE_ALPHA);
    for y in (0..size).step_by(ICON_SCANLINE_PERIOD as usize) {
        fill_rect(&mut out, 0.0, y as f32, s, 1.0, scanline);
    }
    if matrix {
        let grid = LedColor::Black.with_alpha(ICON_MATRIX_ALPHA);
        for x in (0..size).step_by(ICON_MATRIX_PERIOD as usize) {
            fill_rect(&mut out, x as f32, 0.0, 1.0, s, grid);
        }
        for y in (0..size).step_by(ICON_MATRIX_PERIOD as usize) {
            fill_rect(&mut out, 0.0, y as f32, s, 1.0, grid);
        }
    }
    Ok(out)
}

/// Scale into a `w`x`h` box keeping the aspect ratio, centered.
fn fit(src: &Pixmap, w: u32, h: u32, quality: FilterQuality) -> Result<Pixmap, IconError> {
    let mut out = Pixmap::new(w, h).ok_or(IconError::Alloc(w))?;
    let scale = (w as f32 / src.width() as f32).min(h as f32 / src.height() as f32);
    let dx = (w as f32 - src.width() as f32 * scale) / 2.0;
    let dy = (h as f32 - src.height() as f32 * scale) / 2.0;
    let paint = PixmapPaint { quality, ..PixmapPaint::default() };
    out.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(scale, scale).post_translate(dx, dy), None);
    Ok(out)
}

/// Square resample ignoring the aspect ratio.
fn fit_stretch(src: &Pixmap, size: u32, quality: FilterQuality) -> Result<Pixmap, IconError> {
    let mut out = Pixmap::new(size, size).ok_or(IconError::Alloc(size))?;
    let sx = size as f32 / src.width() as f32;
    let sy = size as f32 / src.height() as f32;
    let paint = PixmapPaint { quality, ..PixmapPaint::default() };
    out.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(sx, sy), None);
    Ok(out)
}

/// Remote side of the icon cache: fetch, persist, hand the bytes back.
pub struct IconFetcher<S: IconSource> {
    source: Arc<S>,
    dir: PathBuf,
    limiter: Arc<Semaphore>,
}

impl<S: IconSource> IconFetcher<S> {
    pub fn new(source: Arc<S>, dir: PathBuf) -> Self {
        IconFetcher { source, dir, limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_ICONS)) }
    }

    /// Fetch one icon and persist the raw bytes.
    pub async fn fetch(&self, symbol: &Symbol) -> Result<Vec<u8>, IconError> {
        let bytes = tokio::time::timeout(ICON_TIMEOUT, self.source.icon_bytes(symbol))
            .await
            .map_err(|_| FetchError::Timeout)??;
        // make sure it decodes before it lands on disk
        Pixmap::decode_png(&bytes).map_err(|e| IconError::Decode(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(icon_path(&self.dir, symbol), &bytes).await?;
        Ok(bytes)
    }

    /// Symbols with no local file yet.
    pub fn missing(&self, symbols: &[Symbol]) -> Vec<Symbol> {
        symbols
            .iter()
            .filter(|s| !icon_path(&self.dir, s).exists())
            .cloned()
            .collect()
    }

    /// Serve fetch requests until the request channel closes. Each
    /// symbol is tried once; successes are sent to `delivered`.
    pub async fn run(
        self: Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<Symbol>,
        delivered: mpsc::UnboundedSender<(Symbol, Vec<u8>)>,
    ) {
        let mut tried: HashSet<Symbol> = HashSet::new();
        let mut set = JoinSet::new();
        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(symbol) = request else { break };
                    if !tried.insert(symbol.clone()) {
                        continue;
                    }
                    let this = Arc::clone(&self);
                    let tx = delivered.clone();
                    set.spawn(async move {
                        let _permit = this.limiter.acquire().await;
                        match this.fetch(&symbol).await {
                            Ok(bytes) => {
                                debug!("icon for {} fetched ({} bytes)", symbol, bytes.len());
                                let _ = tx.send((symbol, bytes));
                            }
                            Err(e) => debug!("icon for {} not fetched: {}", symbol, e),
                        }
                    });
                }
                Some(_) = set.join_next(), if !set.is_empty() => {}
            }
        }
        while set.join_next().await.is_some() {}
        info!("icon fetcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn png(color: LedColor, w: u32, h: u32) -> Vec<u8> {
        let mut pm = Pixmap::new(w, h).unwrap();
        pm.fill(color.to_skia());
        pm.encode_png().unwrap()
    }

    #[test]
    fn test_lru_bound_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = IconCache::new(dir.path().to_path_buf(), 10, false);
        for i in 0..10 {
            cache.get(&Symbol::new(&format!("S{}", i)), 16);
        }
        // touch S0 so S1 becomes the oldest
        cache.get(&Symbol::new("S0"), 16);
        cache.get(&Symbol::new("S10"), 16);
        assert!(cache.len() <= 10);
        assert!(cache.contains(&Symbol::new("S0"), 16));
        assert!(!cache.contains(&Symbol::new("S1"), 16));
        assert!(!cache.contains(&Symbol::new("S2"), 16));
        assert!(cache.contains(&Symbol::new("S10"), 16));
    }

    #[test]
    fn test_hit_returns_same_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = IconCache::new(dir.path().to_path_buf(), 10, true);
        let a = cache.get(&Symbol::new("X"), 20).unwrap();
        let b = cache.get(&Symbol::new("x"), 20).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!cache.contains(&Symbol::new("X"), 21));
    }

    #[test]
    fn test_disk_then_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AAPL.png"), png(LedColor::Up, 8, 8)).unwrap();
        std::fs::write(dir.path().join("BAD.png"), b"not a png").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut cache = IconCache::new(dir.path().to_path_buf(), 10, false).with_requests(tx);

        let icon = cache.get(&Symbol::new("AAPL"), 32).unwrap();
        assert_eq!((icon.width(), icon.height()), (32, 32));
        // scanline row darker than the row below it
        let top = icon.pixel(16, 0).unwrap().green();
        let next = icon.pixel(16, 1).unwrap().green();
        assert!(top < next);

        let bad = cache.get(&Symbol::new("BAD"), 32).unwrap();
        assert!(bad.pixels().iter().all(|p| p.alpha() == 0));

        let missing = cache.get(&Symbol::new("NONE"), 32).unwrap();
        assert!(missing.pixels().iter().all(|p| p.alpha() == 0));
        assert_eq!(rx.try_recv().unwrap(), Symbol::new("NONE"));
        // a second miss does not ask again
        cache.invalidate(&Symbol::new("NONE"));
        cache.get(&Symbol::new("NONE"), 32);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delivery_replaces_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = IconCache::new(dir.path().to_path_buf(), 10, false);
        let sym = Symbol::new("MSFT");
        assert_eq!(cache.get(&sym, 16).unwrap().pixel(8, 9).unwrap().alpha(), 0);
        cache.deliver(sym.clone(), png(LedColor::Symbol, 4, 4));
        assert!(!cache.contains(&sym, 16));
        assert!(cache.get(&sym, 16).unwrap().pixel(8, 9).unwrap().alpha() > 200);
    }

    #[test]
    fn test_matrix_overlay_darkens_columns() {
        let src = Pixmap::decode_png(&png(LedColor::Unchanged, 24, 24)).unwrap();
        let plain = process(&src, 24, false).unwrap();
        let grid = process(&src, 24, true).unwrap();
        let lit = plain.pixel(0, 1).unwrap().red();
        assert!(lit > 240);
        assert!(grid.pixel(0, 1).unwrap().red() + 20 < lit);
    }

    struct FakeIcons {
        asked: Mutex<Vec<String>>,
        body: Vec<u8>,
    }

    impl IconSource for FakeIcons {
        async fn icon_bytes(&self, symbol: &Symbol) -> Result<Vec<u8>, FetchError> {
            self.asked.lock().unwrap().push(symbol.to_string());
            if symbol.as_str() == "GONE" {
                return Err(FetchError::Status(404));
            }
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn test_fetcher_persists_and_delivers_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeIcons { asked: Mutex::new(vec![]), body: png(LedColor::Gold, 4, 4) });
        let fetcher = Arc::new(IconFetcher::new(Arc::clone(&source), dir.path().to_path_buf()));
        assert_eq!(fetcher.missing(&[Symbol::new("IBM")]).len(), 1);

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Arc::clone(&fetcher).run(req_rx, done_tx));
        req_tx.send(Symbol::new("IBM")).unwrap();
        req_tx.send(Symbol::new("IBM")).unwrap();
        req_tx.send(Symbol::new("GONE")).unwrap();
        drop(req_tx);
        task.await.unwrap();

        let (sym, bytes) = done_rx.recv().await.unwrap();
        assert_eq!(sym, Symbol::new("IBM"));
        assert_eq!(bytes, source.body);
        assert!(done_rx.recv().await.is_none());
        assert!(dir.path().join("IBM.png").exists());
        assert!(!dir.path().join("GONE.png").exists());
        assert_eq!(source.asked.lock().unwrap().len(), 2);
        assert!(fetcher.missing(&[Symbol::new("IBM")]).is_empty());
    }
}
