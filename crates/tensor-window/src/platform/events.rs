use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use crate::error::{Error, Result};

use super::EventSource;

/// Records close requests; every other event is ignored.
#[derive(Debug, Default)]
struct CloseWatcher {
    close_requested: bool,
}

impl ApplicationHandler for CloseWatcher {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if matches!(event, WindowEvent::CloseRequested | WindowEvent::Destroyed) {
            self.close_requested = true;
        }
    }
}

/// winit event loop driven by non-blocking pumps from the render loop.
pub struct WinitEvents {
    event_loop: EventLoop<()>,
    watcher: CloseWatcher,
}

impl WinitEvents {
    /// Builds an event loop usable off the main thread.
    pub fn new() -> Result<Self> {
        Ok(Self {
            event_loop: build_event_loop()?,
            watcher: CloseWatcher::default(),
        })
    }

    pub fn event_loop(&self) -> &EventLoop<()> {
        &self.event_loop
    }
}

impl EventSource for WinitEvents {
    fn poll_close_requested(&mut self) -> Result<bool> {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.watcher);

        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            self.watcher.close_requested = true;
        }

        Ok(self.watcher.close_requested)
    }
}

#[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
fn build_event_loop() -> Result<EventLoop<()>> {
    use winit::platform::wayland::EventLoopBuilderExtWayland;
    use winit::platform::x11::EventLoopBuilderExtX11;

    let mut builder = EventLoop::builder();
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    } else {
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    builder
        .build()
        .map_err(|e| Error::Windowing(format!("failed to create event loop: {e}")))
}

#[cfg(target_os = "windows")]
fn build_event_loop() -> Result<EventLoop<()>> {
    use winit::platform::windows::EventLoopBuilderExtWindows;

    EventLoop::builder()
        .with_any_thread(true)
        .build()
        .map_err(|e| Error::Windowing(format!("failed to create event loop: {e}")))
}

#[cfg(not(any(
    target_os = "windows",
    all(unix, not(target_os = "macos"), not(target_os = "android"))
)))]
fn build_event_loop() -> Result<EventLoop<()>> {
    Err(Error::Windowing(
        "this platform only runs an event loop on the main thread".into(),
    ))
}
