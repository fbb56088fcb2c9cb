//! Compute/graphics interop: the texture surface written by submissions.
//!
//! [`InteropApi`] is the raw subsystem; [`InteropTextureSurface`] layers the
//! register-once and unmap-on-every-path rules over it. The CUDA runtime
//! backend lives in [`cuda`].

mod api;
pub mod cuda;
mod image;
mod surface;

pub use api::{InteropApi, RegisterAccess};
pub use image::{DeviceImage, DevicePtr, BYTES_PER_PIXEL, CHANNELS};
pub use surface::{InteropTextureSurface, MappedTexture};
