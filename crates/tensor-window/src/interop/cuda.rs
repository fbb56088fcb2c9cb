//! CUDA runtime backend for [`InteropApi`].
//!
//! `libcudart` is loaded at runtime on first use, so the crate links and runs
//! (without interop) on machines that have no CUDA toolkit installed.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::sync::OnceLock;

use libloading::Library;

use crate::error::{InteropError, InteropOp, InteropStatus};
use crate::render::TextureName;

use super::api::{InteropApi, RegisterAccess};
use super::image::{DeviceImage, DevicePtr, CHANNELS};

type CudaError = c_int;
type RawResource = *mut c_void;
type RawArray = *mut c_void;
type RawStream = *mut c_void;

const CUDA_SUCCESS: CudaError = 0;

/// `cudaGLDeviceListAll`.
const GL_DEVICE_LIST_ALL: c_int = 1;
/// `cudaGraphicsRegisterFlagsWriteDiscard`.
const REGISTER_FLAGS_WRITE_DISCARD: c_uint = 2;
/// `cudaMemcpyHostToDevice`.
const MEMCPY_HOST_TO_DEVICE: c_int = 1;
/// `cudaMemcpyDeviceToDevice`.
const MEMCPY_DEVICE_TO_DEVICE: c_int = 3;
/// `GL_TEXTURE_2D`.
const GL_TEXTURE_2D: c_uint = 0x0DE1;

/// `cudaStreamLegacy`: the implicitly synchronizing default stream.
fn legacy_stream() -> RawStream {
    0x1 as RawStream
}

#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &[
    "cudart64_12.dll",
    "cudart64_110.dll",
    "cudart64_102.dll",
];

#[cfg(not(target_os = "windows"))]
const LIBRARY_CANDIDATES: &[&str] = &[
    "libcudart.so",
    "libcudart.so.12",
    "libcudart.so.11.0",
];

/// Entry points resolved from `libcudart`.
struct CudaRuntime {
    gl_get_devices: unsafe extern "C" fn(*mut c_uint, *mut c_int, c_uint, c_int) -> CudaError,
    set_device: unsafe extern "C" fn(c_int) -> CudaError,
    register_image: unsafe extern "C" fn(*mut RawResource, c_uint, c_uint, c_uint) -> CudaError,
    map_resources: unsafe extern "C" fn(c_int, *mut RawResource, RawStream) -> CudaError,
    mapped_array: unsafe extern "C" fn(*mut RawArray, RawResource, c_uint, c_uint) -> CudaError,
    memcpy_2d_to_array_async: unsafe extern "C" fn(
        RawArray,
        usize,
        usize,
        *const c_void,
        usize,
        usize,
        usize,
        c_int,
        RawStream,
    ) -> CudaError,
    unmap_resources: unsafe extern "C" fn(c_int, *mut RawResource, RawStream) -> CudaError,
    unregister_resource: unsafe extern "C" fn(RawResource) -> CudaError,
    malloc: unsafe extern "C" fn(*mut *mut c_void, usize) -> CudaError,
    memcpy: unsafe extern "C" fn(*mut c_void, *const c_void, usize, c_int) -> CudaError,
    free: unsafe extern "C" fn(*mut c_void) -> CudaError,
    error_string: unsafe extern "C" fn(CudaError) -> *const c_char,

    // Keeps the function pointers above valid.
    _library: Library,
}

// SAFETY: the table holds plain C function pointers into a library that is
// never unloaded; the CUDA runtime API is thread-safe.
unsafe impl Send for CudaRuntime {}
unsafe impl Sync for CudaRuntime {}

impl CudaRuntime {
    fn load() -> Result<Self, String> {
        let mut failures = Vec::new();

        for name in LIBRARY_CANDIDATES {
            // SAFETY: loading libcudart runs no initialization routines with
            // preconditions beyond those of any shared library.
            match unsafe { Library::new(name) } {
                Ok(library) => return unsafe { Self::resolve(library) }.map_err(|e| e.to_string()),
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        Err(format!("CUDA runtime library not found ({})", failures.join("; ")))
    }

    /// # Safety
    ///
    /// `library` must be a CUDA runtime exporting the symbols below with the
    /// signatures declared on [`CudaRuntime`].
    unsafe fn resolve(library: Library) -> Result<Self, libloading::Error> {
        // Symbols borrow `library`; copy the pointers out before moving it.
        let (gl_get_devices, set_device, register_image, map_resources) = unsafe {
            (
                *library.get(b"cudaGLGetDevices\0")?,
                *library.get(b"cudaSetDevice\0")?,
                *library.get(b"cudaGraphicsGLRegisterImage\0")?,
                *library.get(b"cudaGraphicsMapResources\0")?,
            )
        };
        let (mapped_array, memcpy_2d_to_array_async, unmap_resources, unregister_resource) = unsafe {
            (
                *library.get(b"cudaGraphicsSubResourceGetMappedArray\0")?,
                *library.get(b"cudaMemcpy2DToArrayAsync\0")?,
                *library.get(b"cudaGraphicsUnmapResources\0")?,
                *library.get(b"cudaGraphicsUnregisterResource\0")?,
            )
        };
        let (malloc, memcpy, free, error_string) = unsafe {
            (
                *library.get(b"cudaMalloc\0")?,
                *library.get(b"cudaMemcpy\0")?,
                *library.get(b"cudaFree\0")?,
                *library.get(b"cudaGetErrorString\0")?,
            )
        };

        Ok(Self {
            gl_get_devices,
            set_device,
            register_image,
            map_resources,
            mapped_array,
            memcpy_2d_to_array_async,
            unmap_resources,
            unregister_resource,
            malloc,
            memcpy,
            free,
            error_string,
            _library: library,
        })
    }

    fn check(&self, code: CudaError) -> Result<(), InteropStatus> {
        if code == CUDA_SUCCESS {
            return Ok(());
        }

        // SAFETY: cudaGetErrorString returns a static NUL-terminated string
        // for every input, including unrecognized codes.
        let message = unsafe {
            let text = (self.error_string)(code);
            if text.is_null() {
                "unrecognized CUDA error".to_string()
            } else {
                CStr::from_ptr(text).to_string_lossy().into_owned()
            }
        };
        Err(InteropStatus::new(code, message))
    }
}

fn runtime() -> Result<&'static CudaRuntime, InteropStatus> {
    static RUNTIME: OnceLock<Result<CudaRuntime, String>> = OnceLock::new();

    RUNTIME
        .get_or_init(|| {
            let loaded = CudaRuntime::load();
            match &loaded {
                Ok(_) => log::debug!("CUDA runtime loaded"),
                Err(e) => log::warn!("{e}"),
            }
            loaded
        })
        .as_ref()
        .map_err(|e| InteropStatus::new(InteropStatus::RUNTIME_UNAVAILABLE, e.clone()))
}

/// `cudaGraphicsResource_t`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CudaResource(RawResource);

// SAFETY: an opaque handle owned by the CUDA runtime; usable from any thread.
unsafe impl Send for CudaResource {}

/// `cudaArray_t` backing a mapped resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CudaArray(RawArray);

/// Interop through the CUDA runtime API on the legacy default stream.
#[derive(Debug, Default)]
pub struct CudaInterop {
    _private: (),
}

impl CudaInterop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteropApi for CudaInterop {
    type Resource = CudaResource;
    type Array = CudaArray;

    fn select_gl_device(&mut self) -> Result<u32, InteropStatus> {
        let rt = runtime()?;

        let mut count: c_uint = 0;
        let mut device: c_int = 0;
        // SAFETY: out-pointers reference live locals sized for one device.
        rt.check(unsafe { (rt.gl_get_devices)(&mut count, &mut device, 1, GL_DEVICE_LIST_ALL) })?;

        if count == 0 {
            return Ok(0);
        }

        rt.check(unsafe { (rt.set_device)(device) })?;
        log::debug!("selected CUDA device {device} for the current GL context");
        Ok(count)
    }

    fn register_image(
        &mut self,
        texture: TextureName,
        access: RegisterAccess,
    ) -> Result<CudaResource, InteropStatus> {
        let rt = runtime()?;
        let flags = match access {
            RegisterAccess::WriteDiscard => REGISTER_FLAGS_WRITE_DISCARD,
        };

        let mut resource: RawResource = std::ptr::null_mut();
        // SAFETY: `texture` names a live GL texture in the current context.
        rt.check(unsafe { (rt.register_image)(&mut resource, texture.0, GL_TEXTURE_2D, flags) })?;
        Ok(CudaResource(resource))
    }

    fn map(&mut self, resource: CudaResource) -> Result<(), InteropStatus> {
        let rt = runtime()?;
        let mut raw = resource.0;
        rt.check(unsafe { (rt.map_resources)(1, &mut raw, legacy_stream()) })
    }

    fn mapped_array(&mut self, resource: CudaResource) -> Result<CudaArray, InteropStatus> {
        let rt = runtime()?;
        let mut array: RawArray = std::ptr::null_mut();
        rt.check(unsafe { (rt.mapped_array)(&mut array, resource.0, 0, 0) })?;
        Ok(CudaArray(array))
    }

    fn copy_to_array_async(&mut self, dst: CudaArray, src: &DeviceImage) -> Result<(), InteropStatus> {
        let rt = runtime()?;
        // SAFETY: DeviceImage's constructor contract guarantees `src` spans
        // row_pitch * height bytes of device memory.
        rt.check(unsafe {
            (rt.memcpy_2d_to_array_async)(
                dst.0,
                0,
                0,
                src.ptr().0 as *const c_void,
                src.row_pitch(),
                src.row_bytes(),
                src.height() as usize,
                MEMCPY_DEVICE_TO_DEVICE,
                legacy_stream(),
            )
        })
    }

    fn unmap(&mut self, resource: CudaResource) -> Result<(), InteropStatus> {
        let rt = runtime()?;
        let mut raw = resource.0;
        rt.check(unsafe { (rt.unmap_resources)(1, &mut raw, legacy_stream()) })
    }

    fn unregister(&mut self, resource: CudaResource) -> Result<(), InteropStatus> {
        let rt = runtime()?;
        rt.check(unsafe { (rt.unregister_resource)(resource.0) })
    }
}

/// Packed RGBA32F image in device memory allocated with `cudaMalloc`.
///
/// For callers that start from host pixels; tensors from other libraries are
/// described directly with [`DeviceImage::from_raw`].
#[derive(Debug)]
pub struct DeviceBuffer {
    ptr: DevicePtr,
    width: u32,
    height: u32,
}

// SAFETY: owns a device allocation; the runtime API is thread-safe.
unsafe impl Send for DeviceBuffer {}
unsafe impl Sync for DeviceBuffer {}

impl DeviceBuffer {
    /// Uploads `pixels` (row-major, 4 floats per pixel) to a new allocation.
    pub fn from_host(pixels: &[f32], width: u32, height: u32) -> Result<Self, InteropError> {
        let op_err = |op| move |status| InteropError::new(op, status);

        let expected = width as usize * height as usize * CHANNELS;
        if pixels.len() != expected {
            return Err(InteropError::new(
                InteropOp::Copy,
                InteropStatus::new(
                    InteropStatus::INVALID_VALUE,
                    format!("expected {expected} floats for {width}x{height}, got {}", pixels.len()),
                ),
            ));
        }

        let rt = runtime().map_err(op_err(InteropOp::LoadRuntime))?;
        let bytes: &[u8] = bytemuck::cast_slice(pixels);

        let mut raw: *mut c_void = std::ptr::null_mut();
        rt.check(unsafe { (rt.malloc)(&mut raw, bytes.len()) })
            .map_err(op_err(InteropOp::Copy))?;

        let buffer = Self {
            ptr: DevicePtr(raw as u64),
            width,
            height,
        };

        // SAFETY: `raw` was just allocated with bytes.len() bytes.
        rt.check(unsafe {
            (rt.memcpy)(raw, bytes.as_ptr().cast(), bytes.len(), MEMCPY_HOST_TO_DEVICE)
        })
        .map_err(op_err(InteropOp::Copy))?;

        Ok(buffer)
    }

    /// Descriptor for submitting this buffer.
    pub fn image(&self) -> DeviceImage {
        // SAFETY: the allocation is exactly width * height packed pixels and
        // lives as long as `self`.
        unsafe { DeviceImage::packed(self.ptr, self.width, self.height) }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        let Ok(rt) = runtime() else {
            return;
        };
        if let Err(status) = rt.check(unsafe { (rt.free)(self.ptr.0 as *mut c_void) }) {
            log::error!("cudaFree failed: {status}");
        }
    }
}
