// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! Hardware-accelerated render context on top of a dynamically loaded libEGL.
//!
//! Display/context/window-surface setup, binding, clearing, presenting and
//! teardown. Client buffers are shared through `eglBindWaylandDisplayWL`. Texture
//! import is not implemented: `create_image` reports `Unsupported`, so an EGL output
//! shows the clear colour only. It is therefore not part of the default probe list
//! and has to be requested by name.

use khronos_egl as egl;
use tracing::{debug, info};

use crate::context::{ImageId, Placement, ProcAddress, RenderContext};
use crate::error::ContextError;
use crate::surface::{BackendSurface, Frame, NativeHandle};

const NAME: &str = "egl";

type Instance = egl::DynamicInstance<egl::EGL1_4>;
type BindWaylandDisplayFn = unsafe extern "system" fn(egl::EGLDisplay, *mut std::ffi::c_void) -> egl::Boolean;
type ClearColorFn = unsafe extern "system" fn(f32, f32, f32, f32);
type ClearFn = unsafe extern "system" fn(u32);

const GL_COLOR_BUFFER_BIT: u32 = 0x0000_4000;

/// The GLES entry points a clear needs, resolved once the context is current.
#[derive(Clone, Copy)]
struct GlClear {
    clear_color: ClearColorFn,
    clear: ClearFn,
}

impl GlClear {
    fn load(instance: &Instance) -> Option<Self> {
        let clear_color = instance.get_proc_address("glClearColor")?;
        let clear = instance.get_proc_address("glClear")?;
        // SAFETY: both are core GLES 2.0 entry points with exactly these signatures.
        unsafe { Some(Self { clear_color: std::mem::transmute(clear_color), clear: std::mem::transmute(clear) }) }
    }
}

fn init_error(reason: impl ToString) -> ContextError {
    ContextError::Init { backend: NAME, reason: reason.to_string() }
}

/// A GLES context rendering into the backend surface's native window.
pub struct EglContext {
    instance: Instance,
    display: egl::Display,
    context: egl::Context,
    surface: egl::Surface,
    extensions: String,
    gl: GlClear,
    terminated: bool,
}

impl std::fmt::Debug for EglContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EglContext")
            .field("display", &self.display.as_ptr())
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl EglContext {
    /// Backend constructor for the probe list.
    pub fn create(surface: &mut dyn BackendSurface) -> Result<Box<dyn RenderContext>, ContextError> {
        let window = surface.native_window().ok_or_else(|| init_error("backend surface has no native window"))?;
        let native_display = surface.native_display().map_or(egl::DEFAULT_DISPLAY, |handle| handle.as_ptr());

        // SAFETY: loading libEGL runs its initializers; nothing else is loaded into the process by it.
        let instance = unsafe { Instance::load_required() }.map_err(init_error)?;
        // SAFETY: the native display comes from the device layer and outlives the context.
        let display =
            unsafe { instance.get_display(native_display) }.ok_or_else(|| init_error("eglGetDisplay failed"))?;

        let (major, minor) = instance.initialize(display).map_err(init_error)?;
        match Self::setup(&instance, display, window) {
            Ok((context, surface)) => {
                let Some(gl) = GlClear::load(&instance) else {
                    let _ = instance.make_current(display, None, None, None);
                    let _ = instance.destroy_surface(display, surface);
                    let _ = instance.destroy_context(display, context);
                    let _ = instance.terminate(display);
                    return Err(init_error("GLES clear entry points not found"));
                };
                let extensions = instance
                    .query_string(Some(display), egl::EXTENSIONS)
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!(major, minor, "EGL context initialized");
                Ok(Box::new(Self { instance, display, context, surface, extensions, gl, terminated: false }))
            }
            Err(err) => {
                let _ = instance.terminate(display);
                Err(err)
            }
        }
    }

    /// Chooses a config, creates the context and window surface and makes them current.
    /// Whatever was created is destroyed again on failure.
    fn setup(
        instance: &Instance,
        display: egl::Display,
        window: NativeHandle,
    ) -> Result<(egl::Context, egl::Surface), ContextError> {
        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            0,
            egl::NONE,
        ];
        instance.bind_api(egl::OPENGL_ES_API).map_err(init_error)?;
        let config = instance
            .choose_first_config(display, &config_attribs)
            .map_err(init_error)?
            .ok_or_else(|| init_error("no matching EGL config"))?;

        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = instance.create_context(display, config, None, &context_attribs).map_err(init_error)?;

        // SAFETY: the window handle is owned by the backend surface, which owns this context's output.
        let surface = match unsafe { instance.create_window_surface(display, config, window.as_ptr(), None) } {
            Ok(surface) => surface,
            Err(err) => {
                let _ = instance.destroy_context(display, context);
                return Err(init_error(err));
            }
        };

        if let Err(err) = instance.make_current(display, Some(surface), Some(surface), Some(context)) {
            let _ = instance.destroy_surface(display, surface);
            let _ = instance.destroy_context(display, context);
            return Err(init_error(err));
        }
        Ok((context, surface))
    }

    fn has_extension(&self, name: &str) -> bool {
        self.extensions.split_ascii_whitespace().any(|ext| ext == name)
    }
}

impl RenderContext for EglContext {
    fn backend_name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self) -> Result<(), ContextError> {
        if self.terminated {
            return Err(ContextError::Terminated);
        }
        self.instance
            .make_current(self.display, Some(self.surface), Some(self.surface), Some(self.context))
            .map_err(|err| ContextError::Bind(err.to_string()))
    }

    fn swap(&mut self, surface: &mut dyn BackendSurface) -> Result<(), ContextError> {
        if self.terminated {
            return Err(ContextError::Terminated);
        }
        self.instance
            .swap_buffers(self.display, self.surface)
            .map_err(|err| ContextError::Present(err.to_string()))?;
        surface.page_flip(Frame::Native)?;
        Ok(())
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let _ = self.instance.make_current(self.display, None, None, None);
        let _ = self.instance.destroy_surface(self.display, self.surface);
        let _ = self.instance.destroy_context(self.display, self.context);
        let _ = self.instance.terminate(self.display);
        debug!("EGL context terminated");
    }

    fn bind_to_display(&mut self, display: NativeHandle) -> Result<(), ContextError> {
        let unsupported = ContextError::Unsupported { backend: NAME, operation: "bind_to_display" };
        if !self.has_extension("EGL_WL_bind_wayland_display") {
            return Err(unsupported);
        }
        let proc = self.instance.get_proc_address("eglBindWaylandDisplayWL").ok_or(unsupported)?;
        // SAFETY: the extension is advertised, so the entry point has this signature.
        let bind: BindWaylandDisplayFn = unsafe { std::mem::transmute(proc) };
        // SAFETY: both handles are live for the duration of the call.
        let ok = unsafe { bind(self.display.as_ptr(), display.as_ptr()) };
        if ok == egl::TRUE {
            Ok(())
        } else {
            Err(ContextError::Bind("eglBindWaylandDisplayWL failed".to_string()))
        }
    }

    fn create_image(&mut self, _buffer: &novade_buffer_manager::BufferDetails) -> Result<ImageId, ContextError> {
        Err(ContextError::Unsupported { backend: NAME, operation: "create_image" })
    }

    fn destroy_image(&mut self, _image: ImageId) -> bool {
        false
    }

    fn get_proc_address(&self, name: &str) -> Option<ProcAddress> {
        self.instance.get_proc_address(name)
    }

    fn clear(&mut self, color: [f32; 4]) {
        if self.terminated {
            return;
        }
        let [r, g, b, a] = color;
        // SAFETY: the render pass binds this context before clearing, so the GL calls
        // go to it.
        unsafe {
            (self.gl.clear_color)(r, g, b, a);
            (self.gl.clear)(GL_COLOR_BUFFER_BIT);
        }
    }

    fn draw_image(&mut self, image: ImageId, _placement: Placement) -> Result<(), ContextError> {
        Err(ContextError::ImageNotFound(image))
    }
}
