use crate::error::InteropStatus;
use crate::render::TextureName;

use super::image::DeviceImage;

/// How the registered texture will be accessed through the interop subsystem.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterAccess {
    /// Writer fully overwrites contents; prior data need not be preserved.
    WriteDiscard,
}

/// Cross-API resource sharing between the compute runtime and GL.
///
/// Every call is made with the rendering context current on the calling
/// thread. Statuses are returned raw; callers attach the operation name.
pub trait InteropApi: Send {
    /// Registered-resource token.
    type Resource: Copy + Send;

    /// Memory backing a mapped resource.
    type Array: Copy;

    /// Associates the runtime with the device backing the current GL context.
    ///
    /// Returns the number of compute devices that back the context.
    fn select_gl_device(&mut self) -> Result<u32, InteropStatus>;

    fn register_image(
        &mut self,
        texture: TextureName,
        access: RegisterAccess,
    ) -> Result<Self::Resource, InteropStatus>;

    fn map(&mut self, resource: Self::Resource) -> Result<(), InteropStatus>;

    fn mapped_array(&mut self, resource: Self::Resource) -> Result<Self::Array, InteropStatus>;

    /// Enqueues a 2D device-to-device copy of `src` into `dst`.
    ///
    /// Stream-ordered: returns once enqueued. The following `unmap` on the
    /// same stream is ordered after it.
    fn copy_to_array_async(&mut self, dst: Self::Array, src: &DeviceImage) -> Result<(), InteropStatus>;

    fn unmap(&mut self, resource: Self::Resource) -> Result<(), InteropStatus>;

    fn unregister(&mut self, resource: Self::Resource) -> Result<(), InteropStatus>;
}
