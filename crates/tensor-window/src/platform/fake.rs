//! GPU-free platform for tests.
//!
//! Every native call bumps a counter on a shared [`Probe`]; failures are
//! injected per interop operation or through [`Faults`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::{ContextBinding, Target};
use crate::error::{Error, InteropOp, InteropStatus, Result};
use crate::interop::{DeviceImage, InteropApi, RegisterAccess};
use crate::render::TextureName;
use crate::window::WindowConfig;

use super::{EventSource, Opened, Platform, RenderContext};

#[derive(Default)]
pub(crate) struct Probe {
    pub holders: AtomicUsize,
    pub max_holders: AtomicUsize,
    /// Makes every later bind fail.
    pub fail_binds: AtomicBool,
    pub visible_binds: AtomicUsize,
    pub hidden_binds: AtomicUsize,

    pub prepared: Mutex<Option<(u32, u32)>>,
    pub draws: AtomicUsize,
    pub presents: AtomicUsize,
    pub destroyed: AtomicBool,

    pub polls: AtomicUsize,
    pub close_requested: AtomicBool,

    pub device_selections: AtomicUsize,
    pub registrations: AtomicUsize,
    pub maps: AtomicUsize,
    pub resolves: AtomicUsize,
    pub copies: AtomicUsize,
    pub unmaps: AtomicUsize,
    pub unregisters: AtomicUsize,

    failing: Mutex<Option<(InteropOp, bool)>>,
}

impl Probe {
    /// Makes `op` fail; once, or on every call when `persistent`.
    pub fn fail(&self, op: InteropOp, persistent: bool) {
        *self.failing.lock().unwrap() = Some((op, persistent));
    }

    pub fn interop_calls(&self) -> usize {
        [
            &self.device_selections,
            &self.registrations,
            &self.maps,
            &self.resolves,
            &self.copies,
            &self.unmaps,
        ]
        .iter()
        .map(|c| c.load(SeqCst))
        .sum()
    }

    pub fn texture_dims(&self) -> Option<(u32, u32)> {
        *self.prepared.lock().unwrap()
    }

    fn should_fail(&self, op: InteropOp) -> bool {
        let mut failing = self.failing.lock().unwrap();
        match *failing {
            Some((target, persistent)) if target == op => {
                if !persistent {
                    *failing = None;
                }
                true
            }
            _ => false,
        }
    }

    fn status_for(&self, op: InteropOp) -> Result<(), InteropStatus> {
        if !self.should_fail(op) {
            return Ok(());
        }
        let status = match op {
            InteropOp::SelectDevice => InteropStatus::new(InteropStatus::UNKNOWN, "unknown error"),
            _ => InteropStatus::new(700, "an illegal memory access was encountered"),
        };
        Err(status)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Faults {
    pub fail_open: bool,
    pub panic_open: bool,
    pub fail_compile: bool,
    pub fail_present: bool,
    /// Time spent inside `draw`, to widen race windows.
    pub draw_delay: Duration,
}

pub(crate) struct FakePlatform {
    probe: Arc<Probe>,
    faults: Faults,
}

impl FakePlatform {
    pub fn new() -> (Self, Arc<Probe>) {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Self {
                probe: probe.clone(),
                faults,
            },
            probe,
        )
    }
}

impl Platform for FakePlatform {
    type Context = FakeContext;
    type Events = FakeEvents;
    type Interop = FakeInterop;

    fn open(self, _config: &WindowConfig) -> Result<Opened<Self>> {
        if self.faults.fail_open {
            return Err(Error::Windowing("cannot open display".into()));
        }
        if self.faults.panic_open {
            panic!("no GL config matched the requested template");
        }

        Ok(Opened {
            events: FakeEvents {
                probe: self.probe.clone(),
            },
            context: FakeContext {
                probe: self.probe.clone(),
                faults: self.faults,
                current: false,
                destroyed: false,
            },
            interop: FakeInterop::new(self.probe),
        })
    }
}

pub(crate) struct FakeContext {
    probe: Arc<Probe>,
    faults: Faults,
    current: bool,
    destroyed: bool,
}

impl FakeContext {
    fn unbind(&mut self) {
        if self.current {
            self.current = false;
            self.probe.holders.fetch_sub(1, SeqCst);
        }
    }
}

impl ContextBinding for FakeContext {
    fn make_current(&mut self, target: Target) -> std::result::Result<(), String> {
        if self.probe.fail_binds.load(SeqCst) {
            return Err("BadMatch".into());
        }
        self.current = true;
        let now = self.probe.holders.fetch_add(1, SeqCst) + 1;
        self.probe.max_holders.fetch_max(now, SeqCst);
        match target {
            Target::Visible => self.probe.visible_binds.fetch_add(1, SeqCst),
            Target::Hidden => self.probe.hidden_binds.fetch_add(1, SeqCst),
        };
        Ok(())
    }

    fn make_not_current(&mut self) -> std::result::Result<(), String> {
        self.unbind();
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl RenderContext for FakeContext {
    fn prepare(&mut self, width: u32, height: u32) -> Result<TextureName> {
        if self.faults.fail_compile {
            return Err(Error::GraphicsCompile(
                "fragment shader: 0:7(1): error: syntax error".into(),
            ));
        }
        *self.probe.prepared.lock().unwrap() = Some((width, height));
        Ok(TextureName(1))
    }

    fn draw(&mut self) -> Result<()> {
        if !self.faults.draw_delay.is_zero() {
            std::thread::sleep(self.faults.draw_delay);
        }
        self.probe.draws.fetch_add(1, SeqCst);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.faults.fail_present {
            return Err(Error::Windowing("swap failed: BadSurface".into()));
        }
        self.probe.presents.fetch_add(1, SeqCst);
        Ok(())
    }

    fn destroy(&mut self) {
        // A destroyed context is no longer current anywhere.
        self.unbind();
        self.destroyed = true;
        self.probe.destroyed.store(true, SeqCst);
    }
}

pub(crate) struct FakeEvents {
    probe: Arc<Probe>,
}

impl EventSource for FakeEvents {
    fn poll_close_requested(&mut self) -> Result<bool> {
        self.probe.polls.fetch_add(1, SeqCst);
        Ok(self.probe.close_requested.load(SeqCst))
    }
}

pub(crate) struct FakeInterop {
    probe: Arc<Probe>,
}

impl FakeInterop {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self { probe }
    }
}

impl InteropApi for FakeInterop {
    type Resource = u32;
    type Array = u64;

    fn select_gl_device(&mut self) -> Result<u32, InteropStatus> {
        self.probe.device_selections.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::SelectDevice)?;
        Ok(1)
    }

    fn register_image(&mut self, texture: TextureName, access: RegisterAccess) -> Result<u32, InteropStatus> {
        assert_eq!(access, RegisterAccess::WriteDiscard);
        self.probe.registrations.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::Register)?;
        Ok(texture.0 + 100)
    }

    fn map(&mut self, _resource: u32) -> Result<(), InteropStatus> {
        self.probe.maps.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::Map)
    }

    fn mapped_array(&mut self, resource: u32) -> Result<u64, InteropStatus> {
        self.probe.resolves.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::ResolveArray)?;
        Ok(resource as u64 * 10)
    }

    fn copy_to_array_async(&mut self, _dst: u64, _src: &DeviceImage) -> Result<(), InteropStatus> {
        self.probe.copies.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::Copy)
    }

    fn unmap(&mut self, _resource: u32) -> Result<(), InteropStatus> {
        self.probe.unmaps.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::Unmap)
    }

    fn unregister(&mut self, _resource: u32) -> Result<(), InteropStatus> {
        self.probe.unregisters.fetch_add(1, SeqCst);
        self.probe.status_for(InteropOp::Unregister)
    }
}
