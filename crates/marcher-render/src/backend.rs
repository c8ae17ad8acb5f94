//! [`RenderBackend`] implementation on top of [`GpuRaymarcher`]

use image::RgbaImage;
use marcher_core::{Frame, RenderBackend};
use marcher_sdf::RenderSettings;
use tracing::info;

use crate::error::RenderError;
use crate::raymarcher::{GpuRaymarcher, init_headless};

/// Headless GPU backend
///
/// Primitives are re-uploaded only when the host buffer's revision differs
/// from the last one uploaded.
pub struct GpuBackend {
    raymarcher: GpuRaymarcher,
    uploaded_revision: Option<u64>,
}

impl GpuBackend {
    pub fn new(raymarcher: GpuRaymarcher) -> Self {
        Self {
            raymarcher,
            uploaded_revision: None,
        }
    }

    /// Open the default adapter and build a headless raymarcher on it
    pub fn headless(settings: &RenderSettings) -> Result<Self, RenderError> {
        let (device, queue) = pollster::block_on(init_headless())?;
        info!("Initialized headless GPU backend");
        Ok(Self::new(GpuRaymarcher::headless(device, queue, settings)))
    }

    /// Whether a frame of this size fits the device's texture limit
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        self.raymarcher.check_size(width, height).is_ok()
    }

    pub fn raymarcher(&self) -> &GpuRaymarcher {
        &self.raymarcher
    }
}

impl RenderBackend for GpuBackend {
    fn name(&self) -> &str {
        "gpu"
    }

    fn render(&mut self, frame: &Frame<'_>, source: &RgbaImage) -> marcher_core::Result<RgbaImage> {
        self.raymarcher.set_settings(frame.settings);

        let revision = frame.buffer.revision();
        if self.uploaded_revision != Some(revision) {
            self.raymarcher.upload(frame.buffer);
            self.uploaded_revision = Some(revision);
        }

        Ok(self.raymarcher.render_to_image(frame.camera, source)?)
    }
}
