use crate::error::{InteropError, InteropOp, InteropStatus};

/// Channels per pixel. Images are always RGBA.
pub const CHANNELS: usize = 4;

/// Bytes per pixel: four `f32` channels.
pub const BYTES_PER_PIXEL: usize = CHANNELS * std::mem::size_of::<f32>();

/// Address in device memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Descriptor of an RGBA32F image held in device memory.
///
/// Rows are `row_pitch` bytes apart; the first `width * 16` bytes of each row
/// are pixel data. The descriptor does not own the memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceImage {
    ptr: DevicePtr,
    width: u32,
    height: u32,
    row_pitch: usize,
}

impl DeviceImage {
    /// # Safety
    ///
    /// `ptr` must address device memory of at least `row_pitch * height`
    /// bytes that stays allocated for as long as the descriptor is submitted.
    pub unsafe fn from_raw(ptr: DevicePtr, width: u32, height: u32, row_pitch: usize) -> Self {
        Self {
            ptr,
            width,
            height,
            row_pitch,
        }
    }

    /// Descriptor for a tightly packed image (`row_pitch == width * 16`).
    ///
    /// # Safety
    ///
    /// Same contract as [`DeviceImage::from_raw`].
    pub unsafe fn packed(ptr: DevicePtr, width: u32, height: u32) -> Self {
        unsafe { Self::from_raw(ptr, width, height, width as usize * BYTES_PER_PIXEL) }
    }

    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Bytes of pixel data per row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Checks that the image can be copied into a `width` x `height` texture.
    ///
    /// Rejections use the status codes the CUDA runtime reports for the same
    /// mistakes, so callers see one vocabulary whether the check happens here
    /// or in the driver.
    pub fn check_fits(&self, width: u32, height: u32) -> Result<(), InteropError> {
        let reject = |code, message: String| {
            Err(InteropError::new(InteropOp::Copy, InteropStatus::new(code, message)))
        };

        if self.ptr.is_null() {
            return reject(InteropStatus::INVALID_VALUE, "source pointer is null".into());
        }
        if self.width != width || self.height != height {
            return reject(
                InteropStatus::INVALID_VALUE,
                format!(
                    "image is {}x{} but the texture is {width}x{height}",
                    self.width, self.height
                ),
            );
        }
        if self.row_pitch < self.row_bytes() {
            return reject(
                InteropStatus::INVALID_PITCH,
                format!(
                    "row pitch {} is smaller than a {}-pixel RGBA32F row ({} bytes)",
                    self.row_pitch,
                    self.width,
                    self.row_bytes()
                ),
            );
        }
        Ok(())
    }
}
