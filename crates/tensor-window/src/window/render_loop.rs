use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use crate::context::{ContextBinding, GraphicsContextLock, Target};
use crate::error::{Error, Result};
use crate::interop::{InteropApi, InteropTextureSurface};
use crate::platform::{EventSource, Opened, Platform, RenderContext};
use crate::time::FramePacer;

use super::config::WindowConfig;
use super::state::{LoopStatus, RenderState};

/// Everything behind the context lock: the context and the texture it owns.
pub(crate) struct GpuState<C, I: InteropApi> {
    pub context: C,
    pub surface: InteropTextureSurface<I>,
}

impl<C: ContextBinding, I: InteropApi> ContextBinding for GpuState<C, I> {
    fn make_current(&mut self, target: Target) -> std::result::Result<(), String> {
        self.context.make_current(target)
    }

    fn make_not_current(&mut self) -> std::result::Result<(), String> {
        self.context.make_not_current()
    }

    fn is_destroyed(&self) -> bool {
        self.context.is_destroyed()
    }
}

pub(crate) type SharedGpu<C, I> = GraphicsContextLock<GpuState<C, I>>;

/// Readiness message sent once initialization finishes or fails.
pub(crate) type Ready<P> =
    Result<Arc<SharedGpu<<P as Platform>::Context, <P as Platform>::Interop>>>;

/// Body of the render thread.
///
/// Created -> Initializing -> Running -> Stopping -> Terminated. Readiness is
/// signalled exactly once, after the GL objects exist or initialization failed.
pub(crate) fn run<P: Platform>(
    platform: P,
    config: WindowConfig,
    status: Arc<LoopStatus>,
    ready: SyncSender<Ready<P>>,
) {
    status.set_state(RenderState::Initializing);

    let (mut events, gpu) = match initialize(platform, &config) {
        Ok(parts) => parts,
        Err(err) => {
            log::error!("window initialization failed: {err}");
            status.request_stop();
            status.set_state(RenderState::Terminated);
            let _ = ready.send(Err(err));
            return;
        }
    };

    status.set_state(RenderState::Running);
    if ready.send(Ok(gpu.clone())).is_err() {
        // Constructor gone; nobody can submit or close.
        status.request_stop();
    }
    drop(ready);

    drive(&mut events, &gpu, &status, &config);

    status.set_state(RenderState::Stopping);
    teardown(&gpu);
    drop(events);
    status.set_state(RenderState::Terminated);
    log::info!("render loop for \"{}\" terminated", config.title);
}

fn initialize<P: Platform>(
    platform: P,
    config: &WindowConfig,
) -> Result<(P::Events, Arc<SharedGpu<P::Context, P::Interop>>)> {
    // Native setup may panic (glutin's config picker cannot fail gracefully);
    // report that as a windowing failure instead of a dead render thread.
    let Opened {
        events,
        context,
        interop,
    } = panic::catch_unwind(AssertUnwindSafe(|| platform.open(config))).unwrap_or_else(|panic| {
        Err(Error::Windowing(format!(
            "platform setup panicked: {}",
            panic_text(panic.as_ref())
        )))
    })?;

    let gpu = Arc::new(GraphicsContextLock::new(GpuState {
        context,
        surface: InteropTextureSurface::new(interop, config.width, config.height),
    }));

    let prepared: Result<()> = gpu.with_current(Target::Visible, |state| {
        let texture = state.context.prepare(config.width, config.height)?;
        state.surface.attach_texture(texture);
        Ok(())
    });

    if let Err(err) = prepared {
        teardown(&gpu);
        return Err(err);
    }

    Ok((events, gpu))
}

fn drive<C, I, E>(events: &mut E, gpu: &SharedGpu<C, I>, status: &LoopStatus, config: &WindowConfig)
where
    C: RenderContext,
    I: InteropApi,
    E: EventSource,
{
    let mut pacer = FramePacer::new(config.max_fps);

    loop {
        if status.stop_requested() {
            log::debug!("stop requested");
            break;
        }

        match events.poll_close_requested() {
            Ok(false) => {}
            Ok(true) => {
                log::info!("window \"{}\" closed by the user", config.title);
                status.request_stop();
                break;
            }
            Err(err) => {
                log::error!("event polling failed: {err}");
                status.request_stop();
                break;
            }
        }

        let frame: Result<()> = gpu.with_current(Target::Visible, |state| {
            state.context.draw()?;
            state.context.present()
        });

        if let Err(err) = frame {
            log::error!("render pass failed, stopping: {err}");
            status.request_stop();
            break;
        }

        status.record_present();
        let tick = pacer.pace();
        log::trace!("frame {} presented after {:?}", tick.frame_index, tick.dt);
    }
}

/// Unregisters the texture and destroys the context, under the lock.
fn teardown<C: RenderContext, I: InteropApi>(gpu: &SharedGpu<C, I>) {
    let released: Result<()> = gpu.with_current(Target::Visible, |state| {
        if let Err(err) = state.surface.release() {
            log::error!("{err}");
        }
        state.context.destroy();
        Ok(())
    });

    if let Err(err) = released {
        log::error!("teardown could not bind the context ({err}); destroying it unbound");
        gpu.with_resource(|state| {
            if !state.context.is_destroyed() {
                state.context.destroy();
            }
        });
    }
}

/// Message carried by a panic payload.
pub(super) fn panic_text(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
