// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! CPU render context. Always available, used when no hardware backend initializes.

use std::collections::HashMap;
use std::sync::Arc;

use novade_buffer_manager::{BufferDetails, BufferFormat, BufferType};
use tracing::trace;

use crate::context::{ImageId, Placement, RenderContext};
use crate::error::ContextError;
use crate::surface::{BackendSurface, Frame};

const NAME: &str = "software";

#[derive(Debug)]
struct SoftwareImage {
    width: u32,
    height: u32,
    pixels: Arc<[u32]>,
    y_inverted: bool,
    opaque: bool,
}

/// Renders into an ARGB framebuffer in system memory and hands it to the backend
/// surface on swap.
#[derive(Debug)]
pub struct SoftwareContext {
    width: u32,
    height: u32,
    framebuffer: Vec<u32>,
    images: HashMap<ImageId, SoftwareImage>,
    terminated: bool,
}

impl SoftwareContext {
    /// Backend constructor for the probe list.
    pub fn create(surface: &mut dyn BackendSurface) -> Result<Box<dyn RenderContext>, ContextError> {
        let (width, height) = surface.size();
        Ok(Box::new(Self::with_size(width, height)?))
    }

    /// Creates a context with a framebuffer of `width` x `height` pixels.
    pub fn with_size(width: u32, height: u32) -> Result<Self, ContextError> {
        let mut context =
            Self { width: 0, height: 0, framebuffer: Vec::new(), images: HashMap::new(), terminated: false };
        context.allocate(width, height)?;
        Ok(context)
    }

    /// The current framebuffer contents.
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn allocate(&mut self, width: u32, height: u32) -> Result<(), ContextError> {
        let len = width as usize * height as usize;
        let mut framebuffer = Vec::new();
        framebuffer.try_reserve_exact(len).map_err(|_| ContextError::OutOfMemory("framebuffer"))?;
        framebuffer.resize(len, 0);
        self.framebuffer = framebuffer;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn check_live(&self) -> Result<(), ContextError> {
        if self.terminated {
            Err(ContextError::Terminated)
        } else {
            Ok(())
        }
    }
}

fn pack_color(color: [f32; 4]) -> u32 {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
    let [r, g, b, a] = color;
    // Premultiplied, like the client buffers we composite.
    let alpha = a.clamp(0.0, 1.0);
    (channel(a) << 24) | (channel(r * alpha) << 16) | (channel(g * alpha) << 8) | channel(b * alpha)
}

/// Premultiplied source-over for one ARGB pixel.
fn blend_over(src: u32, dst: u32) -> u32 {
    let src_alpha = src >> 24;
    if src_alpha == 0xff {
        return src;
    }
    let inverse = 255 - src_alpha;
    let mut out = 0;
    for shift in [0u32, 8, 16, 24] {
        let s = (src >> shift) & 0xff;
        let d = (dst >> shift) & 0xff;
        let value = (s + (d * inverse + 127) / 255).min(255);
        out |= value << shift;
    }
    out
}

impl RenderContext for SoftwareContext {
    fn backend_name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self) -> Result<(), ContextError> {
        self.check_live()
    }

    fn swap(&mut self, surface: &mut dyn BackendSurface) -> Result<(), ContextError> {
        self.check_live()?;
        surface.page_flip(Frame::Pixels { data: &self.framebuffer, width: self.width, height: self.height })?;
        Ok(())
    }

    fn terminate(&mut self) {
        self.images.clear();
        self.framebuffer = Vec::new();
        self.terminated = true;
    }

    fn create_image(&mut self, buffer: &BufferDetails) -> Result<ImageId, ContextError> {
        self.check_live()?;
        let pixels = match (&buffer.buffer_type, &buffer.contents) {
            (BufferType::Shm, Some(pixels)) => pixels.clone(),
            _ => return Err(ContextError::Unsupported { backend: NAME, operation: "import of unmapped buffers" }),
        };
        if buffer.format == BufferFormat::Nv12 {
            return Err(ContextError::Unsupported { backend: NAME, operation: "import of NV12 buffers" });
        }
        let id = ImageId::new_unique();
        self.images.insert(
            id,
            SoftwareImage {
                width: buffer.width,
                height: buffer.height,
                pixels,
                y_inverted: buffer.y_inverted,
                opaque: !buffer.format.has_alpha(),
            },
        );
        trace!(image = ?id, buffer = ?buffer.id, "imported shm buffer");
        Ok(id)
    }

    fn destroy_image(&mut self, image: ImageId) -> bool {
        self.images.remove(&image).is_some()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), ContextError> {
        self.check_live()?;
        if (width, height) != (self.width, self.height) {
            self.allocate(width, height)?;
        }
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        let packed = pack_color(color);
        self.framebuffer.fill(packed);
    }

    fn draw_image(&mut self, image: ImageId, placement: Placement) -> Result<(), ContextError> {
        self.check_live()?;
        let image = self.images.get(&image).ok_or(ContextError::ImageNotFound(image))?;

        // Nearest-neighbour scaling from image space to the placement rectangle.
        let dst_x0 = i64::from(placement.x).max(0);
        let dst_y0 = i64::from(placement.y).max(0);
        let dst_x1 = (i64::from(placement.x) + i64::from(placement.width)).min(i64::from(self.width));
        let dst_y1 = (i64::from(placement.y) + i64::from(placement.height)).min(i64::from(self.height));
        if dst_x0 >= dst_x1 || dst_y0 >= dst_y1 || placement.width == 0 || placement.height == 0 {
            return Ok(());
        }

        let stride = self.width as usize;
        for dst_y in dst_y0..dst_y1 {
            let local_y = (dst_y - i64::from(placement.y)) * i64::from(image.height) / i64::from(placement.height);
            let src_y = (if image.y_inverted { i64::from(image.height) - 1 - local_y } else { local_y }) as usize;
            let src_row = src_y * image.width as usize;
            let dst_row = dst_y as usize * stride;
            for dst_x in dst_x0..dst_x1 {
                let src_x =
                    ((dst_x - i64::from(placement.x)) * i64::from(image.width) / i64::from(placement.width)) as usize;
                let src = image.pixels[src_row + src_x];
                let dst = &mut self.framebuffer[dst_row + dst_x as usize];
                *dst = if image.opaque { src | 0xff00_0000 } else { blend_over(src, *dst) };
            }
        }
        Ok(())
    }
}
