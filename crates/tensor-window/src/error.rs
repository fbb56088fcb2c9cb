use std::fmt;

use thiserror::Error;

use crate::context::ContextBindingError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`crate::Window`] and the layers beneath it.
#[derive(Debug, Error)]
pub enum Error {
    /// Window, event loop or GL context creation failed, or event polling failed.
    #[error("windowing error: {0}")]
    Windowing(String),

    /// The display program failed to compile or link.
    #[error("failed to build display program: {0}")]
    GraphicsCompile(String),

    /// The GL context is not backed by a device the interop subsystem can use
    /// (commonly: the context landed on integrated graphics).
    #[error("GL context is not backed by a usable compute device: {0}")]
    IntegrationGraphics(String),

    /// Any registration/map/resolve/copy/unmap failure.
    #[error(transparent)]
    Interop(#[from] InteropError),

    /// Making the context current or not-current failed.
    #[error(transparent)]
    ContextBinding(#[from] ContextBindingError),

    /// The render thread went away before reporting readiness.
    #[error("render thread terminated during startup: {0}")]
    RenderThread(String),
}

impl Error {
    /// Returns true for errors that abort window construction.
    pub fn is_creation_error(&self) -> bool {
        matches!(
            self,
            Error::Windowing(_) | Error::GraphicsCompile(_) | Error::RenderThread(_)
        )
    }
}

/// Interop operation that produced a failure.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InteropOp {
    LoadRuntime,
    SelectDevice,
    Register,
    Map,
    ResolveArray,
    Copy,
    Unmap,
    Unregister,
}

impl fmt::Display for InteropOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteropOp::LoadRuntime => "load runtime",
            InteropOp::SelectDevice => "select GL device",
            InteropOp::Register => "register texture",
            InteropOp::Map => "map resource",
            InteropOp::ResolveArray => "resolve mapped array",
            InteropOp::Copy => "copy device buffer to texture",
            InteropOp::Unmap => "unmap resource",
            InteropOp::Unregister => "unregister resource",
        };
        f.write_str(name)
    }
}

/// Native status reported by the interop subsystem.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InteropStatus {
    pub code: i32,
    pub message: String,
}

impl InteropStatus {
    /// `cudaErrorInvalidValue`.
    pub const INVALID_VALUE: i32 = 1;
    /// `cudaErrorInvalidPitchValue`.
    pub const INVALID_PITCH: i32 = 12;
    /// `cudaErrorUnknown`; returned by device selection on integrated graphics.
    pub const UNKNOWN: i32 = 999;
    /// Not a runtime code: the interop library could not be loaded at all.
    pub const RUNTIME_UNAVAILABLE: i32 = -1;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for InteropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.code)
    }
}

/// A failed interop call.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("interop failure during {op}: {status}")]
pub struct InteropError {
    pub op: InteropOp,
    pub status: InteropStatus,
}

impl InteropError {
    pub fn new(op: InteropOp, status: InteropStatus) -> Self {
        Self { op, status }
    }
}
