//! Exclusive ownership of the single native rendering context.
//!
//! The context is a resource object living behind [`GraphicsContextLock`].
//! Threads never touch it directly; they acquire it for a [`Target`] and get
//! back a scoped [`CurrentContext`] that unbinds and unlocks on every exit path.

mod lock;

pub use lock::{ContextBinding, ContextBindingError, CurrentContext, GraphicsContextLock, Target};
