use std::any::Any;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::interop::DeviceImage;
use crate::platform::{DefaultPlatform, GlPlatform, Platform};

use super::config::WindowConfig;
use super::render_loop;
use super::state::{FrameStats, LoopStatus, RenderState};
use super::submit::FrameSubmitter;

/// An on-screen window showing an RGBA32F device image.
///
/// Construction spawns the render thread and returns once the window, GL
/// context and display texture exist. `submit` may be called from any
/// thread, including several at once.
pub struct Window<P: Platform = DefaultPlatform> {
    title: String,
    width: u32,
    height: u32,
    status: Arc<LoopStatus>,
    submitter: FrameSubmitter<P::Context, P::Interop>,
    thread: Option<JoinHandle<()>>,
}

impl Window<GlPlatform> {
    /// Opens a `width` x `height` window with default settings.
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Result<Self> {
        Self::with_config(WindowConfig::new(width, height, title))
    }

    pub fn with_config(config: WindowConfig) -> Result<Self> {
        Self::with_platform(GlPlatform, config)
    }
}

impl<P: Platform> Window<P> {
    /// Opens a window on an explicit backend.
    ///
    /// Blocks until the render thread reports readiness. On failure the
    /// render thread has already exited when this returns.
    pub fn with_platform(platform: P, config: WindowConfig) -> Result<Self> {
        config.validate()?;

        let status = Arc::new(LoopStatus::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = thread::Builder::new()
            .name("tensor-window-render".into())
            .spawn({
                let status = status.clone();
                let config = config.clone();
                move || render_loop::run(platform, config, status, ready_tx)
            })
            .map_err(|e| Error::RenderThread(format!("failed to spawn render thread: {e}")))?;

        let gpu = match ready_rx.recv() {
            Ok(Ok(gpu)) => gpu,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let reason = match thread.join() {
                    Err(panic) => panic_message(panic.as_ref()),
                    Ok(()) => "exited without signalling readiness".to_string(),
                };
                return Err(Error::RenderThread(reason));
            }
        };

        log::info!(
            "window \"{}\" ready ({}x{})",
            config.title,
            config.width,
            config.height
        );

        Ok(Self {
            submitter: FrameSubmitter::new(gpu, status.clone(), config.width, config.height),
            title: config.title,
            width: config.width,
            height: config.height,
            status,
            thread: Some(thread),
        })
    }

    /// Copies `image` into the window's texture.
    ///
    /// Returns immediately without touching the GPU once the window is
    /// closing. The image must match the window's dimensions and have a row
    /// pitch of at least `width * 16` bytes.
    pub fn submit(&self, image: &DeviceImage) -> Result<()> {
        self.submitter.submit(image)
    }

    /// Asks the render loop to stop. Does not wait; repeated calls are no-ops.
    pub fn close(&self) {
        if self.status.request_stop() {
            log::info!("close requested for window \"{}\"", self.title);
        }
    }

    /// Waits for the render thread to finish.
    ///
    /// Without a prior [`Window::close`] this blocks until the user closes
    /// the window.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|panic| Error::RenderThread(panic_message(panic.as_ref()))),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> RenderState {
        self.status.state()
    }

    /// True while frames are being presented and submissions are accepted.
    pub fn is_running(&self) -> bool {
        !self.status.stop_requested() && self.status.state() == RenderState::Running
    }

    pub fn stats(&self) -> FrameStats {
        self.status.stats()
    }

    /// Texture and window size; fixed for the window's lifetime.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl<P: Platform> Drop for Window<P> {
    fn drop(&mut self) {
        self.status.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render thread for \"{}\" panicked", self.title);
            }
        }
    }
}

impl<P: Platform> std::fmt::Debug for Window<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("state", &self.state())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    format!("render thread panicked: {}", render_loop::panic_text(panic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InteropError, InteropOp, InteropStatus};
    use crate::interop::{DevicePtr, BYTES_PER_PIXEL};
    use crate::platform::fake::{FakePlatform, Faults, Probe};
    use std::sync::atomic::Ordering::SeqCst;
    use std::time::{Duration, Instant};

    fn config(width: u32, height: u32) -> WindowConfig {
        WindowConfig::new(width, height, "t").with_max_fps(Some(1000))
    }

    fn open(width: u32, height: u32) -> (Window<FakePlatform>, Arc<Probe>) {
        let (platform, probe) = FakePlatform::new();
        let window = Window::with_platform(platform, config(width, height)).unwrap();
        (window, probe)
    }

    fn frame(width: u32, height: u32) -> DeviceImage {
        unsafe { DeviceImage::packed(DevicePtr(0x7f00_0000), width, height) }
    }

    fn wait_for(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn construction_sizes_texture_to_window() {
        for (w, h) in [(800, 600), (1, 1), (3, 7)] {
            let (window, probe) = open(w, h);
            assert_eq!(window.state(), RenderState::Running);
            assert_eq!(window.dimensions(), (w, h));
            assert_eq!(probe.texture_dims(), Some((w, h)));
        }
    }

    #[test]
    fn zero_size_fails_before_spawning() {
        let (platform, probe) = FakePlatform::new();
        let err = Window::with_platform(platform, config(0, 10)).unwrap_err();
        assert!(matches!(err, Error::Windowing(_)));
        assert_eq!(probe.visible_binds.load(SeqCst), 0);
    }

    #[test]
    fn open_failure_is_a_creation_error() {
        let (platform, _probe) = FakePlatform::with_faults(Faults {
            fail_open: true,
            ..Faults::default()
        });
        let err = Window::with_platform(platform, config(8, 8)).unwrap_err();
        assert!(matches!(err, Error::Windowing(_)), "{err}");
        assert!(err.is_creation_error());
    }

    #[test]
    fn panic_during_setup_is_a_windowing_error() {
        let (platform, _probe) = FakePlatform::with_faults(Faults {
            panic_open: true,
            ..Faults::default()
        });
        let err = Window::with_platform(platform, config(8, 8)).unwrap_err();
        assert!(matches!(err, Error::Windowing(_)), "{err}");
        assert!(err.to_string().contains("no GL config matched"), "{err}");
    }

    #[test]
    fn compile_failure_tears_down_and_reports() {
        let (platform, probe) = FakePlatform::with_faults(Faults {
            fail_compile: true,
            ..Faults::default()
        });
        let err = Window::with_platform(platform, config(8, 8)).unwrap_err();
        assert!(matches!(err, Error::GraphicsCompile(_)), "{err}");
        // The render thread was joined and cleaned up before returning.
        assert!(probe.destroyed.load(SeqCst));
        assert_eq!(probe.holders.load(SeqCst), 0);
    }

    #[test]
    fn ones_frame_on_800x600_keeps_running() {
        let (window, probe) = open(800, 600);

        window.submit(&frame(800, 600)).unwrap();

        assert_eq!(window.state(), RenderState::Running);
        assert!(window.is_running());
        assert_eq!(probe.copies.load(SeqCst), 1);
        assert!(probe.hidden_binds.load(SeqCst) >= 1);
    }

    #[test]
    fn sequential_submissions_register_once() {
        let (window, probe) = open(64, 32);

        for _ in 0..20 {
            window.submit(&frame(64, 32)).unwrap();
            assert_eq!(window.state(), RenderState::Running);
        }

        assert_eq!(probe.registrations.load(SeqCst), 1);
        assert_eq!(probe.device_selections.load(SeqCst), 1);
        assert_eq!(probe.maps.load(SeqCst), 20);
        assert_eq!(probe.unmaps.load(SeqCst), 20);
        assert_eq!(window.stats().submitted, 20);
    }

    #[test]
    fn render_loop_presents_independently_of_submissions() {
        let (window, probe) = open(4, 4);
        wait_for("three presented frames", || probe.presents.load(SeqCst) >= 3);
        let presents = probe.presents.load(SeqCst);
        assert!(probe.draws.load(SeqCst) >= presents);
        assert!(probe.polls.load(SeqCst) >= presents);
        assert_eq!(probe.registrations.load(SeqCst), 0);
        assert!(window.stats().presented >= 3);
    }

    #[test]
    fn submit_after_close_is_a_no_op() {
        let (window, probe) = open(16, 16);

        window.close();
        window.submit(&frame(16, 16)).unwrap();

        assert_eq!(probe.interop_calls(), 0);
        assert_eq!(window.stats().submitted, 0);
        assert!(!window.is_running());
    }

    #[test]
    fn close_is_idempotent_and_loop_terminates() {
        let (window, probe) = open(16, 16);

        window.close();
        window.close();

        wait_for("termination", || window.state() == RenderState::Terminated);
        assert!(probe.destroyed.load(SeqCst));
        window.close();
        assert_eq!(window.state(), RenderState::Terminated);
    }

    #[test]
    fn close_does_not_wait_for_render_thread() {
        let (platform, _probe) = FakePlatform::with_faults(Faults {
            draw_delay: Duration::from_millis(200),
            ..Faults::default()
        });
        let window = Window::with_platform(platform, config(2, 2)).unwrap();

        let started = Instant::now();
        window.close();
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn concurrent_producers_never_share_the_context() {
        let (platform, probe) = FakePlatform::with_faults(Faults {
            draw_delay: Duration::from_micros(200),
            ..Faults::default()
        });
        let window = Window::with_platform(platform, config(32, 32)).unwrap();

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        window.submit(&frame(32, 32)).unwrap();
                    }
                });
            }
        });

        assert_eq!(probe.max_holders.load(SeqCst), 1);
        assert_eq!(probe.registrations.load(SeqCst), 1);
        assert_eq!(window.stats().submitted, 100);
        assert!(window.is_running());
    }

    #[test]
    fn user_close_stops_submissions() {
        let (window, probe) = open(8, 8);

        probe.close_requested.store(true, SeqCst);
        wait_for("termination", || window.state() == RenderState::Terminated);

        window.submit(&frame(8, 8)).unwrap();
        assert_eq!(probe.interop_calls(), 0);
    }

    #[test]
    fn short_row_pitch_is_rejected_without_interop_calls() {
        let (window, probe) = open(800, 600);
        let image = unsafe {
            DeviceImage::from_raw(DevicePtr(0x7f00_0000), 800, 600, 800 * std::mem::size_of::<f32>())
        };

        let err = window.submit(&image).unwrap_err();
        match err {
            Error::Interop(InteropError { op, status }) => {
                assert_eq!(op, InteropOp::Copy);
                assert_eq!(status.code, InteropStatus::INVALID_PITCH);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(probe.interop_calls(), 0);

        // Still usable with a well-formed frame.
        window.submit(&frame(800, 600)).unwrap();
    }

    #[test]
    fn padded_rows_are_accepted() {
        let (window, probe) = open(10, 4);
        let image = unsafe {
            DeviceImage::from_raw(DevicePtr(0x7f00_0000), 10, 4, 10 * BYTES_PER_PIXEL + 96)
        };
        window.submit(&image).unwrap();
        assert_eq!(probe.copies.load(SeqCst), 1);
    }

    #[test]
    fn transient_copy_failure_leaves_window_usable() {
        let (window, probe) = open(8, 8);
        probe.fail(InteropOp::Copy, false);

        let err = window.submit(&frame(8, 8)).unwrap_err();
        assert!(matches!(err, Error::Interop(InteropError { op: InteropOp::Copy, .. })));
        assert_eq!(probe.maps.load(SeqCst), probe.unmaps.load(SeqCst));

        window.submit(&frame(8, 8)).unwrap();
        assert_eq!(probe.registrations.load(SeqCst), 1);
        assert!(window.is_running());
    }

    #[test]
    fn failed_unmap_makes_later_submissions_fail() {
        let (window, probe) = open(8, 8);
        probe.fail(InteropOp::Unmap, false);

        assert!(window.submit(&frame(8, 8)).is_err());
        for _ in 0..3 {
            let err = window.submit(&frame(8, 8)).unwrap_err();
            assert!(matches!(err, Error::Interop(InteropError { op: InteropOp::Unmap, .. })));
        }
        assert_eq!(probe.maps.load(SeqCst), 1);
    }

    #[test]
    fn integrated_graphics_is_reported() {
        let (window, probe) = open(8, 8);
        probe.fail(InteropOp::SelectDevice, true);

        let err = window.submit(&frame(8, 8)).unwrap_err();
        assert!(matches!(err, Error::IntegrationGraphics(_)), "{err}");
        assert_eq!(probe.registrations.load(SeqCst), 0);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let (window, probe) = open(8, 8);
        assert!(window.submit(&frame(8, 9)).is_err());
        assert_eq!(probe.interop_calls(), 0);
    }

    #[test]
    fn render_failure_stops_the_loop() {
        let (platform, probe) = FakePlatform::with_faults(Faults {
            fail_present: true,
            ..Faults::default()
        });
        let window = Window::with_platform(platform, config(4, 4)).unwrap();

        wait_for("termination", || window.state() == RenderState::Terminated);
        assert!(!window.is_running());
        assert!(probe.destroyed.load(SeqCst));
        window.submit(&frame(4, 4)).unwrap();
    }

    #[test]
    fn teardown_unregisters_the_texture() {
        let (window, probe) = open(4, 4);
        window.submit(&frame(4, 4)).unwrap();

        window.close();
        window.join().unwrap();

        assert_eq!(probe.unregisters.load(SeqCst), 1);
        assert!(probe.destroyed.load(SeqCst));
        assert_eq!(probe.holders.load(SeqCst), 0);
    }

    #[test]
    fn poisoned_texture_is_unregistered_at_teardown() {
        let (window, probe) = open(4, 4);
        window.submit(&frame(4, 4)).unwrap();

        probe.fail(InteropOp::Unmap, false);
        assert!(window.submit(&frame(4, 4)).is_err());

        window.close();
        window.join().unwrap();

        assert_eq!(probe.registrations.load(SeqCst), 1);
        assert_eq!(probe.unregisters.load(SeqCst), 1);
    }

    #[test]
    fn teardown_destroys_context_it_cannot_bind() {
        let (window, probe) = open(4, 4);
        window.submit(&frame(4, 4)).unwrap();

        // The next render pass and the teardown bind both fail.
        probe.fail_binds.store(true, SeqCst);
        wait_for("termination", || window.state() == RenderState::Terminated);

        assert!(probe.destroyed.load(SeqCst));
        assert_eq!(probe.holders.load(SeqCst), 0);
        assert_eq!(probe.max_holders.load(SeqCst), 1);
        window.submit(&frame(4, 4)).unwrap();
        assert_eq!(probe.maps.load(SeqCst), 1);
    }
}
