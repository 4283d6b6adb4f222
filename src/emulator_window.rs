/*
 *  emulator_window.rs
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

//! Desktop preview window standing in for the docked panel.
//!
//! winit wants the main thread, so the window runs there and reads the
//! latest frame from [`SharedFrame`]; input goes back to the render loop
//! as [`TickerEvent`]s.

use std::time::Instant;

use log::{error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use tiny_skia::{IntSize, Pixmap};
use tokio::sync::mpsc::UnboundedSender;
use winit::{
    dpi::PhysicalSize,
    event::{Event, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};
use winit_input_helper::WinitInputHelper;

use crate::surface::{save_png, SharedFrame};
use crate::ticker::TickerEvent;

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub screenshot: std::path::PathBuf,
    /// shown before the first frame arrives
    pub bg_color: [u8; 4],
}

struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
    current_fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self { last_update: Instant::now(), frame_count: 0, current_fps: 0.0 }
    }

    fn tick(&mut self) -> f32 {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();
        if elapsed.as_secs_f32() >= 1.0 {
            self.current_fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_update = Instant::now();
        }
        self.current_fps
    }
}

pub struct PreviewWindow {
    frame: SharedFrame,
    events: UnboundedSender<TickerEvent>,
    config: PreviewConfig,
    fps_counter: FpsCounter,
    last_serial: u64,
}

impl PreviewWindow {
    pub fn new(frame: SharedFrame, events: UnboundedSender<TickerEvent>, config: PreviewConfig) -> Self {
        Self { frame, events, config, fps_counter: FpsCounter::new(), last_serial: 0 }
    }

    fn send(&self, event: TickerEvent) {
        if self.events.send(event).is_err() {
            warn!("ticker no longer listening");
        }
    }

    /// Run the window event loop; never returns control on success.
    pub fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = (self.config.width, self.config.height);
        let event_loop = EventLoop::new();
        let mut input = WinitInputHelper::new();

        let window = WindowBuilder::new()
            .with_title("tickertape")
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false)
            .with_decorations(false)
            .build(&event_loop)?;

        let size = window.inner_size();
        let surface_texture = SurfaceTexture::new(size.width, size.height, &window);
        let mut pixels = Pixels::new(width, height, surface_texture)?;

        info!("preview {}x{}: Esc/Q quit, Space pause, R refresh, S screenshot, click opens links", width, height);

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            if let Event::WindowEvent { event: ref window_event, .. } = event {
                match window_event {
                    WindowEvent::CursorEntered { .. } => self.send(TickerEvent::Hover(true)),
                    WindowEvent::CursorLeft { .. } => self.send(TickerEvent::Hover(false)),
                    _ => {}
                }
            }

            if let Event::RedrawRequested(_) = event {
                self.render(pixels.frame_mut());
                if let Err(err) = pixels.render() {
                    error!("pixels.render() failed: {}", err);
                    self.send(TickerEvent::Shutdown);
                    *control_flow = ControlFlow::Exit;
                    return;
                }
                let fps = self.fps_counter.tick();
                if fps > 0.0 {
                    window.set_title(&format!("tickertape - {:.1} FPS", fps));
                }
            }

            if input.update(&event) {
                if input.key_pressed(VirtualKeyCode::Escape)
                    || input.key_pressed(VirtualKeyCode::Q)
                    || input.close_requested()
                {
                    self.send(TickerEvent::Shutdown);
                    *control_flow = ControlFlow::Exit;
                    return;
                }
                if input.key_pressed(VirtualKeyCode::Space) {
                    self.send(TickerEvent::TogglePause);
                }
                if input.key_pressed(VirtualKeyCode::R) {
                    self.send(TickerEvent::FetchNow);
                }
                if input.key_pressed(VirtualKeyCode::S) {
                    self.screenshot();
                }
                if input.mouse_pressed(0) {
                    if let Some(pos) = input.mouse() {
                        if let Ok((x, y)) = pixels.window_pos_to_pixel(pos) {
                            self.send(TickerEvent::Click { x: x as i32, y: y as i32 });
                        }
                    }
                }
            }

            window.request_redraw();
        });
    }

    fn render(&mut self, out: &mut [u8]) {
        let Ok(state) = self.frame.lock() else {
            return;
        };
        if state.serial == self.last_serial && state.serial != 0 {
            return;
        }
        self.last_serial = state.serial;
        if state.rgba.len() == out.len() {
            out.copy_from_slice(&state.rgba);
        } else {
            for px in out.chunks_exact_mut(4) {
                px.copy_from_slice(&self.config.bg_color);
            }
        }
    }

    fn screenshot(&self) {
        let Ok(state) = self.frame.lock() else {
            return;
        };
        let pixmap = IntSize::from_wh(state.width, state.height)
            .and_then(|size| Pixmap::from_vec(state.rgba.clone(), size));
        match pixmap {
            Some(pm) => match save_png(&pm, &self.config.screenshot) {
                Ok(()) => info!("screenshot saved to {}", self.config.screenshot.display()),
                Err(e) => warn!("screenshot failed: {}", e),
            },
            None => warn!("no frame to save yet"),
        }
    }
}
