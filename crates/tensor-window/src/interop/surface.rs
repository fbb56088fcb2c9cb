use crate::error::{Error, InteropError, InteropOp, InteropStatus, Result};
use crate::render::TextureName;

use super::api::{InteropApi, RegisterAccess};
use super::image::DeviceImage;

enum Registration<R> {
    /// Not registered yet; happens on first submission.
    Pending,
    Registered(R),
    /// The resource is in an unknown state; every later write fails with this
    /// error. Still unregistered on release.
    Poisoned(R, InteropError),
    /// Unregistered during teardown.
    Released,
}

/// The display texture plus its interop registration.
///
/// Dimensions are fixed at construction. Registration happens at most once
/// and only while the context is current on the calling thread.
pub struct InteropTextureSurface<I: InteropApi> {
    interop: I,
    texture: Option<TextureName>,
    width: u32,
    height: u32,
    registration: Registration<I::Resource>,
}

impl<I: InteropApi> InteropTextureSurface<I> {
    pub fn new(interop: I, width: u32, height: u32) -> Self {
        Self {
            interop,
            texture: None,
            width,
            height,
            registration: Registration::Pending,
        }
    }

    /// Records the GL texture created by the render loop.
    pub fn attach_texture(&mut self, texture: TextureName) {
        self.texture = Some(texture);
    }

    pub fn texture(&self) -> Option<TextureName> {
        self.texture
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.registration, Registration::Registered(_))
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self.registration, Registration::Poisoned(..))
    }

    /// Registers the texture with the interop subsystem if not done yet.
    ///
    /// Device selection runs first: it fails with
    /// [`Error::IntegrationGraphics`] when the current context is not backed
    /// by a compute-capable device.
    pub fn ensure_registered(&mut self) -> Result<I::Resource> {
        match &self.registration {
            Registration::Registered(resource) => return Ok(*resource),
            Registration::Poisoned(_, err) => return Err(err.clone().into()),
            Registration::Released => {
                return Err(InteropError::new(
                    InteropOp::Register,
                    InteropStatus::new(InteropStatus::INVALID_VALUE, "texture surface has been released"),
                )
                .into());
            }
            Registration::Pending => {}
        }

        let texture = self.texture.ok_or_else(|| {
            InteropError::new(
                InteropOp::Register,
                InteropStatus::new(InteropStatus::INVALID_VALUE, "no texture attached"),
            )
        })?;

        let devices = self.interop.select_gl_device().map_err(|status| match status.code {
            InteropStatus::UNKNOWN => Error::IntegrationGraphics(format!(
                "{status}; the GL context may be running on integrated graphics"
            )),
            InteropStatus::RUNTIME_UNAVAILABLE => {
                InteropError::new(InteropOp::LoadRuntime, status).into()
            }
            _ => InteropError::new(InteropOp::SelectDevice, status).into(),
        })?;

        if devices == 0 {
            return Err(Error::IntegrationGraphics(
                "no compute device backs the current GL context".into(),
            ));
        }

        let resource = self
            .interop
            .register_image(texture, RegisterAccess::WriteDiscard)
            .map_err(|status| InteropError::new(InteropOp::Register, status))?;

        log::info!(
            "registered texture {} ({}x{}) for write-discard interop",
            texture.0,
            self.width,
            self.height
        );

        self.registration = Registration::Registered(resource);
        Ok(resource)
    }

    /// Maps the registered resource for exclusive access.
    pub fn map(&mut self) -> Result<MappedTexture<'_, I>> {
        let resource = self.ensure_registered()?;

        self.interop
            .map(resource)
            .map_err(|status| InteropError::new(InteropOp::Map, status))?;

        Ok(MappedTexture {
            surface: self,
            resource,
            unmapped: false,
        })
    }

    /// Unregisters the resource. Called once during teardown.
    pub fn release(&mut self) -> Result<(), InteropError> {
        let previous = std::mem::replace(&mut self.registration, Registration::Released);
        match previous {
            Registration::Registered(resource) | Registration::Poisoned(resource, _) => self
                .interop
                .unregister(resource)
                .map_err(|status| InteropError::new(InteropOp::Unregister, status)),
            _ => Ok(()),
        }
    }

    fn unmap_resource(&mut self, resource: I::Resource) -> Result<(), InteropError> {
        self.interop.unmap(resource).map_err(|status| {
            let err = InteropError::new(InteropOp::Unmap, status);
            self.registration = Registration::Poisoned(resource, err.clone());
            err
        })
    }
}

/// A mapped texture. Unmapped on [`MappedTexture::unmap`] or on drop.
pub struct MappedTexture<'a, I: InteropApi> {
    surface: &'a mut InteropTextureSurface<I>,
    resource: I::Resource,
    unmapped: bool,
}

impl<I: InteropApi> MappedTexture<'_, I> {
    /// Resolves the mapped resource to its image memory.
    pub fn array(&mut self) -> Result<I::Array, InteropError> {
        self.surface
            .interop
            .mapped_array(self.resource)
            .map_err(|status| InteropError::new(InteropOp::ResolveArray, status))
    }

    /// Enqueues the copy of `image` into `dst`.
    pub fn copy_from(&mut self, dst: I::Array, image: &DeviceImage) -> Result<(), InteropError> {
        self.surface
            .interop
            .copy_to_array_async(dst, image)
            .map_err(|status| InteropError::new(InteropOp::Copy, status))
    }

    /// Unmaps the resource; ordered after the enqueued copy.
    ///
    /// A failure poisons the surface.
    pub fn unmap(mut self) -> Result<(), InteropError> {
        self.unmapped = true;
        self.surface.unmap_resource(self.resource)
    }
}

impl<I: InteropApi> Drop for MappedTexture<'_, I> {
    fn drop(&mut self) {
        if self.unmapped {
            return;
        }
        if let Err(err) = self.surface.unmap_resource(self.resource) {
            log::error!("{err}");
        }
    }
}
