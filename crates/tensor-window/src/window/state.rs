use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Render loop lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum RenderState {
    Created = 0,
    Initializing = 1,
    Running = 2,
    Stopping = 3,
    Terminated = 4,
}

impl RenderState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RenderState::Created,
            1 => RenderState::Initializing,
            2 => RenderState::Running,
            3 => RenderState::Stopping,
            _ => RenderState::Terminated,
        }
    }
}

/// Counters for presented frames and accepted submissions.
///
/// The two are independent: submissions between render passes coalesce.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub presented: u64,
    pub submitted: u64,
}

/// State shared between the facade, the submitter and the render loop.
#[derive(Debug)]
pub(crate) struct LoopStatus {
    state: AtomicU8,
    stop: AtomicBool,
    presented: AtomicU64,
    submitted: AtomicU64,
}

impl LoopStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RenderState::Created as u8),
            stop: AtomicBool::new(false),
            presented: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: RenderState) {
        let previous = RenderState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        log::debug!("render loop {previous:?} -> {state:?}");
    }

    /// Sets the pending-stop flag. Returns true for the call that set it.
    ///
    /// The flag never goes back to false.
    pub fn request_stop(&self) -> bool {
        !self.stop.swap(true, Ordering::AcqRel)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn record_present(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            presented: self.presented.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
        }
    }
}
