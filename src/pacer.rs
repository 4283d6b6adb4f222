/*
 *  pacer.rs
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
use std::time::{Duration, Instant};

use log::debug;

use crate::config::PacingPolicy;
use crate::constants::*;

/// Frame pacing toward a fixed refresh rate.
///
/// The caller draws, then asks for the time left in the frame budget and
/// sleeps it off before requesting the next draw. Frames are never dropped.
pub struct FramePacer {
    frame: Duration,
    frame_start: Instant,
    last_frame: Instant,
    ema_ms: f32,     // moving avg of draw time
    alpha: f32,      // smoothing (0.1 ~ 0.3)
    frames: u64,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros((1_000_000u32 / target_fps.max(1)) as u64);
        let now = Instant::now();
        Self { frame, frame_start: now, last_frame: now, ema_ms: 0.0, alpha: 0.2, frames: 0 }
    }

    /// Mark the start of a frame; returns seconds since the previous one.
    pub fn begin(&mut self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;
        self.frame_start = now;
        elapsed
    }

    /// Call right after drawing; returns what is left of the frame budget.
    pub fn finish(&mut self, now: Instant) -> Duration {
        let draw = now.saturating_duration_since(self.frame_start);
        let draw_ms = draw.as_secs_f32() * 1000.0;
        self.ema_ms = if self.ema_ms == 0.0 {
            draw_ms
        } else {
            self.alpha * draw_ms + (1.0 - self.alpha) * self.ema_ms
        };
        self.frames += 1;
        if self.frames % 600 == 0 {
            debug!("frame draw avg {:.2}ms over budget {:.2}ms", self.ema_ms, self.frame.as_secs_f32() * 1000.0);
        }
        self.frame.saturating_sub(draw)
    }
}

/// Inter-batch delay for one fetch cycle.
///
/// A fresh pacer is made per cycle; the delay only applies between batches.
#[derive(Debug, Clone)]
pub struct BatchPacer {
    policy: PacingPolicy,
    delay: f64,
    failing_batches: u32,
}

impl BatchPacer {
    pub fn new(policy: PacingPolicy) -> Self {
        BatchPacer { policy, delay: BATCH_DELAY_BASE, failing_batches: 0 }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }

    /// Feed the outcome of a finished batch.
    pub fn record(&mut self, had_failure: bool, had_rate_limit: bool) {
        match self.policy {
            PacingPolicy::ErrorAdaptive => {
                if had_failure {
                    self.failing_batches += 1;
                    if self.failing_batches >= 2 {
                        self.delay = (self.delay + ERROR_DELAY_STEP).min(ERROR_DELAY_CAP);
                        debug!("batch errors, inter-batch delay now {:.1}s", self.delay);
                    }
                } else {
                    self.failing_batches = 0;
                    self.delay = BATCH_DELAY_BASE;
                }
            }
            PacingPolicy::RateLimit => {
                if had_rate_limit {
                    self.delay = (self.delay + RATE_LIMIT_DELAY_STEP).min(RATE_LIMIT_DELAY_CAP);
                    debug!("rate limited, inter-batch delay now {:.1}s", self.delay);
                }
            }
        }
    }
}
