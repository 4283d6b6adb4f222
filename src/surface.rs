/*
 *  surface.rs
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

//! Where composited frames go: nowhere in particular (headless, with
//! optional PNG snapshots) or a shared buffer read by the preview window.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;
use tiny_skia::Pixmap;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("png: {0}")]
    Png(String),
    #[error("frame buffer lock poisoned")]
    Poisoned,
}

/// A drawable of fixed height receiving a continuous stream of frames.
pub trait Surface {
    fn present(&mut self, frame: &Pixmap, now: Instant) -> Result<(), SurfaceError>;
}

pub fn save_png(frame: &Pixmap, path: &Path) -> Result<(), SurfaceError> {
    frame.save_png(path).map_err(|e| SurfaceError::Png(e.to_string()))
}

/// No display attached; optionally writes the frame to a PNG now and then.
pub struct HeadlessSurface {
    snapshot: Option<PathBuf>,
    every: Duration,
    last: Option<Instant>,
    frames: u64,
}

impl HeadlessSurface {
    pub fn new(snapshot: Option<PathBuf>, every: Duration) -> Self {
        Self { snapshot, every, last: None, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Surface for HeadlessSurface {
    fn present(&mut self, frame: &Pixmap, now: Instant) -> Result<(), SurfaceError> {
        self.frames += 1;
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if self.last.is_some_and(|at| now.saturating_duration_since(at) < self.every) {
            return Ok(());
        }
        self.last = Some(now);
        save_png(frame, path)?;
        debug!("snapshot written to {}", path.display());
        Ok(())
    }
}

/// Latest frame as straight RGBA bytes.
#[derive(Debug, Default)]
pub struct FrameState {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub serial: u64,
}

pub type SharedFrame = Arc<Mutex<FrameState>>;

/// Publishes frames for a window running on another thread.
pub struct SharedSurface {
    shared: SharedFrame,
}

impl SharedSurface {
    pub fn new(shared: SharedFrame) -> Self {
        info!("frames published to the preview window");
        Self { shared }
    }
}

impl Surface for SharedSurface {
    fn present(&mut self, frame: &Pixmap, _now: Instant) -> Result<(), SurfaceError> {
        let mut state = self.shared.lock().map_err(|_| SurfaceError::Poisoned)?;
        state.width = frame.width();
        state.height = frame.height();
        state.rgba.clear();
        state.rgba.extend(frame.pixels().iter().flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        }));
        state.serial += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Pixmap {
        let mut pm = Pixmap::new(4, 2).unwrap();
        pm.fill(tiny_skia::Color::from_rgba8(10, 20, 30, 255));
        pm
    }

    #[test]
    fn test_shared_surface_copies() {
        let shared = SharedFrame::default();
        let mut s = SharedSurface::new(Arc::clone(&shared));
        s.present(&frame(), Instant::now()).unwrap();
        let state = shared.lock().unwrap();
        assert_eq!((state.width, state.height, state.serial), (4, 2, 1));
        assert_eq!(&state.rgba[..4], &[10, 20, 30, 255]);
        assert_eq!(state.rgba.len(), 32);
    }

    #[test]
    fn test_snapshot_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut s = HeadlessSurface::new(Some(path.clone()), Duration::from_secs(10));
        let t0 = Instant::now();
        s.present(&frame(), t0).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
        s.present(&frame(), t0 + Duration::from_secs(5)).unwrap();
        assert!(!path.exists());
        s.present(&frame(), t0 + Duration::from_secs(10)).unwrap();
        assert!(path.exists());
        assert_eq!(s.frames(), 3);
        let back = Pixmap::load_png(&path).unwrap();
        assert_eq!(back.width(), 4);
    }
}
