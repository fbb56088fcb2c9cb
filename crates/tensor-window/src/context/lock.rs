use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Surface a context is bound to while current.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Target {
    /// The on-screen window; used by the render loop.
    Visible,
    /// The invisible companion surface; used for interop work off the render thread.
    Hidden,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Visible => f.write_str("visible window"),
            Target::Hidden => f.write_str("hidden window"),
        }
    }
}

/// Native binding operations of a rendering context.
///
/// Implementations are only ever called with the owning lock held, so they
/// may assume no other thread has the context current.
pub trait ContextBinding: Send {
    /// Makes the context current on `target` for the calling thread.
    fn make_current(&mut self, target: Target) -> Result<(), String>;

    /// Detaches the context from the calling thread.
    ///
    /// Must succeed trivially once the context has been destroyed.
    fn make_not_current(&mut self) -> Result<(), String>;

    /// True once the native context has been torn down.
    fn is_destroyed(&self) -> bool;
}

/// Binding failure, carrying the driver's error text.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ContextBindingError {
    #[error("failed to make context current on {target}: {message}")]
    Bind { target: Target, message: String },

    #[error("failed to make context not current: {message}")]
    Unbind { message: String },

    #[error("rendering context has been destroyed")]
    Destroyed,
}

/// Serializes all use of one rendering context.
///
/// At most one thread holds the context at a time. Acquisition is not
/// reentrant: a thread holding a [`CurrentContext`] must not acquire again.
pub struct GraphicsContextLock<C> {
    resource: Mutex<C>,
}

impl<C: ContextBinding> GraphicsContextLock<C> {
    pub fn new(resource: C) -> Self {
        Self {
            resource: Mutex::new(resource),
        }
    }

    /// Blocks until the lock is free, then makes the context current on `target`.
    ///
    /// On a binding failure the lock is released before the error is returned.
    pub fn acquire_for(&self, target: Target) -> Result<CurrentContext<'_, C>, ContextBindingError> {
        let mut guard = self.lock_resource();

        if guard.is_destroyed() {
            return Err(ContextBindingError::Destroyed);
        }

        guard
            .make_current(target)
            .map_err(|message| ContextBindingError::Bind { target, message })?;

        Ok(CurrentContext {
            guard,
            target,
            released: false,
        })
    }

    /// Runs `f` with the context current on `target`, then unbinds.
    ///
    /// An error from `f` takes precedence over an unbind error; the latter is
    /// still logged.
    pub fn with_current<R, E, F>(&self, target: Target, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut C) -> Result<R, E>,
        E: From<ContextBindingError>,
    {
        let mut current = self.acquire_for(target)?;
        let result = f(&mut *current);
        let released = current.release();

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(unbind)) => Err(unbind.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unbind)) => {
                log::error!("{unbind} (while handling an earlier failure)");
                Err(err)
            }
        }
    }

    /// Locks the resource without binding the context.
    ///
    /// Used for work that must be serialized but must not have the context
    /// current, such as destroying it.
    pub fn with_resource<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut guard = self.lock_resource();
        f(&mut *guard)
    }

    fn lock_resource(&self) -> MutexGuard<'_, C> {
        // A panic while current still runs CurrentContext::drop, so the
        // context is detached even when the mutex is poisoned.
        self.resource.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        matches!(
            self.resource.try_lock(),
            Err(std::sync::TryLockError::WouldBlock)
        )
    }
}

/// Scoped "context current" region.
///
/// Dereferences to the owned resource. Prefer [`CurrentContext::release`] to
/// observe unbind failures; dropping unbinds too but can only log them.
pub struct CurrentContext<'a, C: ContextBinding> {
    guard: MutexGuard<'a, C>,
    target: Target,
    released: bool,
}

impl<C: ContextBinding> CurrentContext<'_, C> {
    pub fn target(&self) -> Target {
        self.target
    }

    /// Makes the context not current and releases the lock.
    pub fn release(mut self) -> Result<(), ContextBindingError> {
        self.released = true;
        self.guard
            .make_not_current()
            .map_err(|message| ContextBindingError::Unbind { message })
    }
}

impl<C: ContextBinding> Deref for CurrentContext<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C: ContextBinding> DerefMut for CurrentContext<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}

impl<C: ContextBinding> Drop for CurrentContext<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(message) = self.guard.make_not_current() {
            log::error!("failed to make context not current on {}: {message}", self.target);
        }
    }
}
