use std::cmp::Reverse;
use std::num::NonZeroU32;

use anyhow::{anyhow, Context as _};
use glutin::config::{Config, ConfigSurfaceTypes, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    PossiblyCurrentGlContext, Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{
    GlSurface, PbufferSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface,
};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::Window as NativeWindow;

use crate::context::{ContextBinding, Target};
use crate::error::{Error, Result};
use crate::interop::cuda::CudaInterop;
use crate::render::{TextureName, TextureRenderer};
use crate::window::WindowConfig;

use super::events::WinitEvents;
use super::{Opened, Platform, RenderContext};

/// winit + glutin + glow, with CUDA runtime interop.
#[derive(Debug, Default, Copy, Clone)]
pub struct GlPlatform;

impl Platform for GlPlatform {
    type Context = GlContext;
    type Events = WinitEvents;
    type Interop = CudaInterop;

    fn open(self, config: &WindowConfig) -> Result<Opened<Self>> {
        let events = WinitEvents::new()?;
        let context = GlContext::create(events.event_loop(), config)
            .map_err(|e| Error::Windowing(format!("{e:#}")))?;

        Ok(Opened {
            events,
            context,
            interop: CudaInterop::new(),
        })
    }
}

enum HiddenSurface {
    /// Created on the first `Hidden` bind.
    Uncreated,
    Pbuffer(Surface<PbufferSurface>),
    /// Display offers no pbuffers; the window surface stands in.
    Unavailable,
}

// Drop order matters: GL objects and surfaces, then the context, then the window.
struct Live {
    renderer: Option<TextureRenderer>,
    hidden: HiddenSurface,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    gl_config: Config,
    vsync: bool,
    window: NativeWindow,
}

impl Live {
    fn ensure_hidden(&mut self) {
        if !matches!(self.hidden, HiddenSurface::Uncreated) {
            return;
        }

        let attrs = SurfaceAttributesBuilder::<PbufferSurface>::new()
            .build(NonZeroU32::MIN, NonZeroU32::MIN);

        // SAFETY: the config and display outlive the surface; both are owned by `self`.
        let created = unsafe {
            self.gl_config
                .display()
                .create_pbuffer_surface(&self.gl_config, &attrs)
        };

        self.hidden = match created {
            Ok(surface) => {
                log::debug!("created 1x1 pbuffer for the hidden target");
                HiddenSurface::Pbuffer(surface)
            }
            Err(e) => {
                log::warn!("pbuffer unavailable ({e}); hidden target uses the window surface");
                HiddenSurface::Unavailable
            }
        };
    }
}

/// The window, its surfaces and the single GL context shared by both targets.
pub struct GlContext {
    live: Option<Live>,
}

// SAFETY: glutin marks current-capable contexts !Send because a context may
// only be current on one thread at a time. GlContext is only reachable through
// GraphicsContextLock, which binds it on at most one thread and unbinds it
// before another thread can lock it.
unsafe impl Send for GlContext {}

impl GlContext {
    fn create(event_loop: &EventLoop<()>, config: &WindowConfig) -> anyhow::Result<Self> {
        let window_attributes = NativeWindow::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let template = ConfigTemplateBuilder::new().with_alpha_size(8);

        let (window, gl_config) = DisplayBuilder::new()
            .with_window_attributes(Some(window_attributes))
            .build(event_loop, template, pick_config)
            .map_err(|e| anyhow!("failed to create GL display: {e}"))?;

        let window = window.context("GL display created without a window")?;
        let raw_window_handle = window.window_handle().ok().map(|h| h.as_raw());

        let (major, minor) = config.gl_version;
        let context_attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
            .build(raw_window_handle);

        let display = gl_config.display();

        // SAFETY: the raw window handle belongs to `window`, which outlives the context.
        let not_current = unsafe { display.create_context(&gl_config, &context_attributes) }
            .with_context(|| format!("failed to create OpenGL {major}.{minor} core context"))?;

        let surface_attributes = window
            .build_surface_attributes(Default::default())
            .context("failed to describe window surface")?;

        // SAFETY: as above; `window` is stored alongside the surface and dropped after it.
        let surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
            .context("failed to create window surface")?;

        log::info!(
            "created {}x{} window \"{}\" with OpenGL {major}.{minor} core context",
            config.width,
            config.height,
            config.title
        );

        Ok(Self {
            live: Some(Live {
                renderer: None,
                hidden: HiddenSurface::Uncreated,
                surface,
                context: not_current.treat_as_possibly_current(),
                gl_config,
                vsync: config.vsync,
                window,
            }),
        })
    }

    fn live_mut(&mut self) -> Result<&mut Live> {
        self.live
            .as_mut()
            .ok_or_else(|| Error::Windowing("rendering context has been destroyed".into()))
    }
}

/// Prefers pbuffer-capable, hardware-accelerated configs without multisampling.
///
/// glutin reports an empty match as an error before calling the picker, and
/// the picker cannot return one. A panic here is caught by the render loop
/// and surfaces as [`Error::Windowing`].
fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .max_by_key(|c| {
            (
                c.config_surface_types().contains(ConfigSurfaceTypes::PBUFFER),
                c.hardware_accelerated(),
                Reverse(c.num_samples()),
            )
        })
        .expect("display reported no GL configs")
}

impl ContextBinding for GlContext {
    fn make_current(&mut self, target: Target) -> std::result::Result<(), String> {
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| "rendering context has been destroyed".to_string())?;

        let bound = match target {
            Target::Visible => live.context.make_current(&live.surface),
            Target::Hidden => {
                live.ensure_hidden();
                match &live.hidden {
                    HiddenSurface::Pbuffer(pbuffer) => live.context.make_current(pbuffer),
                    _ => live.context.make_current(&live.surface),
                }
            }
        };

        bound.map_err(|e| e.to_string())
    }

    fn make_not_current(&mut self) -> std::result::Result<(), String> {
        match &self.live {
            Some(live) => live
                .context
                .make_not_current_in_place()
                .map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    fn is_destroyed(&self) -> bool {
        self.live.is_none()
    }
}

impl RenderContext for GlContext {
    fn prepare(&mut self, width: u32, height: u32) -> Result<TextureName> {
        let live = self.live_mut()?;

        if live.vsync {
            if let Err(e) = live
                .surface
                .set_swap_interval(&live.context, SwapInterval::Wait(NonZeroU32::MIN))
            {
                log::warn!("vsync unavailable: {e}");
            }
        }

        let display = live.gl_config.display();
        // SAFETY: the context is current; the loader resolves symbols from its display.
        let gl = unsafe { glow::Context::from_loader_function_cstr(|name| display.get_proc_address(name)) };

        let renderer = TextureRenderer::new(gl, width, height)?;
        let texture = renderer.texture_name();
        live.renderer = Some(renderer);

        log::debug!("display program and {width}x{height} RGBA32F texture ready");
        Ok(texture)
    }

    fn draw(&mut self) -> Result<()> {
        let live = self.live_mut()?;
        let renderer = live
            .renderer
            .as_ref()
            .ok_or_else(|| Error::Windowing("draw before prepare".into()))?;
        renderer.draw();
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let live = self.live_mut()?;
        live.window.pre_present_notify();
        live.surface
            .swap_buffers(&live.context)
            .map_err(|e| Error::Windowing(format!("failed to swap buffers: {e}")))
    }

    fn destroy(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };

        if let Some(renderer) = live.renderer.take() {
            renderer.destroy();
        }
        if let Err(e) = live.context.make_not_current_in_place() {
            log::warn!("failed to release context before destroying it: {e}");
        }

        drop(live);
        log::debug!("GL context and window destroyed");
    }
}
