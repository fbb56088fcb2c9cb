use std::sync::Arc;

use crate::context::{ContextBindingError, Target};
use crate::error::Result;
use crate::interop::{DeviceImage, InteropApi, InteropTextureSurface};
use crate::platform::RenderContext;

use super::render_loop::SharedGpu;
use super::state::LoopStatus;

/// Copies producer frames into the display texture.
///
/// Runs on the caller's thread with the context bound to the hidden target.
/// Nothing is redrawn here; the render loop shows the new contents on its
/// next pass, so submissions faster than the render cadence coalesce.
pub(crate) struct FrameSubmitter<C, I: InteropApi> {
    gpu: Arc<SharedGpu<C, I>>,
    status: Arc<LoopStatus>,
    width: u32,
    height: u32,
}

impl<C: RenderContext, I: InteropApi> FrameSubmitter<C, I> {
    pub fn new(gpu: Arc<SharedGpu<C, I>>, status: Arc<LoopStatus>, width: u32, height: u32) -> Self {
        Self {
            gpu,
            status,
            width,
            height,
        }
    }

    /// Writes `image` into the texture. A no-op once the window is stopping.
    pub fn submit(&self, image: &DeviceImage) -> Result<()> {
        if self.status.stop_requested() {
            return Ok(());
        }

        image.check_fits(self.width, self.height)?;

        let mut current = match self.gpu.acquire_for(Target::Hidden) {
            Ok(current) => current,
            // Torn down between the stop check and the lock.
            Err(ContextBindingError::Destroyed) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        if self.status.stop_requested() {
            current.release()?;
            return Ok(());
        }

        let written = write_frame(&mut current.surface, image);
        let released = current.release();

        match (written, released) {
            (Ok(()), Ok(())) => {
                self.status.record_submit();
                Ok(())
            }
            (Ok(()), Err(unbind)) => Err(unbind.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unbind)) => {
                log::error!("{unbind} (after failed submission)");
                Err(err)
            }
        }
    }
}

/// Map, resolve, copy, unmap. The resource is unmapped on every path once mapped.
fn write_frame<I: InteropApi>(surface: &mut InteropTextureSurface<I>, image: &DeviceImage) -> Result<()> {
    let mut mapped = surface.map()?;

    let copied = mapped
        .array()
        .and_then(|array| mapped.copy_from(array, image));

    // Unmap is ordered after the async copy on the same stream; no explicit sync.
    let unmapped = mapped.unmap();

    match (copied, unmapped) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err.into()),
        (Err(err), Err(unmap)) => {
            log::error!("{unmap} (after {err})");
            Err(err.into())
        }
    }
}
