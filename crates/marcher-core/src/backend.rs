//! Render backends the host can attach

use image::RgbaImage;
use marcher_sdf::RenderSettings;

use crate::Result;
use crate::buffer::PrimitiveBuffer;
use crate::camera::Camera;
use crate::march::render_cpu;

/// Everything a backend needs to draw one frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub camera: &'a Camera,
    pub settings: &'a RenderSettings,
    pub buffer: &'a PrimitiveBuffer,
}

/// Something that can raymarch a frame over a source image
///
/// Implementations must return an image with the source's dimensions in which
/// every pixel whose ray misses the scene equals the source pixel.
pub trait RenderBackend: Send {
    /// Short label for logs
    fn name(&self) -> &str;

    fn render(&mut self, frame: &Frame<'_>, source: &RgbaImage) -> Result<RgbaImage>;
}

/// Multi-threaded CPU backend
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl RenderBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn render(&mut self, frame: &Frame<'_>, source: &RgbaImage) -> Result<RgbaImage> {
        Ok(render_cpu(
            frame.buffer.primitives(),
            frame.settings,
            frame.camera,
            source,
        ))
    }
}
