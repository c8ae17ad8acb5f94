//! The render-loop host
//!
//! A [`Raymarcher`] owns the settings, the registry and the primitive buffer,
//! and forwards frames to an optional backend. Callers drive it the way an
//! engine drives a component: call [`Raymarcher::late_update`] once the
//! scene has been moved for the frame, then render.

use image::{Rgba, RgbaImage};
use marcher_sdf::RenderSettings;
use tracing::{debug, warn};

use crate::Result;
use crate::backend::{Frame, RenderBackend};
use crate::buffer::PrimitiveBuffer;
use crate::camera::Camera;
use crate::registry::PrimitiveRegistry;

pub struct Raymarcher {
    pub settings: RenderSettings,
    registry: PrimitiveRegistry,
    buffer: PrimitiveBuffer,
    backend: Option<Box<dyn RenderBackend>>,
}

impl Default for Raymarcher {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl std::fmt::Debug for Raymarcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raymarcher")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("buffer", &self.buffer)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Raymarcher {
    /// Create a host with no backend attached
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            registry: PrimitiveRegistry::new(),
            buffer: PrimitiveBuffer::new(),
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: impl RenderBackend + 'static) -> Self {
        self.set_backend(Some(Box::new(backend)));
        self
    }

    pub fn with_registry(mut self, registry: PrimitiveRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Attach, replace or detach the backend
    pub fn set_backend(&mut self, backend: Option<Box<dyn RenderBackend>>) {
        if let Some(backend) = &backend {
            debug!(backend = backend.name(), "Attached render backend");
        }
        self.backend = backend;
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn registry(&self) -> &PrimitiveRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PrimitiveRegistry {
        &mut self.registry
    }

    pub fn buffer(&self) -> &PrimitiveBuffer {
        &self.buffer
    }

    /// Bring the primitive buffer up to date with the registry
    ///
    /// Returns `true` when the buffer was rebuilt.
    pub fn late_update(&mut self) -> bool {
        self.buffer.sync(&self.registry)
    }

    /// Raymarch over `source`
    ///
    /// Without a backend the source is returned unchanged. Settings are
    /// validated before every backend frame since the field is public.
    pub fn render_image(&mut self, camera: &Camera, source: &RgbaImage) -> Result<RgbaImage> {
        self.late_update();

        let Some(backend) = self.backend.as_mut() else {
            warn!("No render backend attached, passing the source image through");
            return Ok(source.clone());
        };
        self.settings.validate()?;

        let frame = Frame {
            camera,
            settings: &self.settings,
            buffer: &self.buffer,
        };
        backend.render(&frame, source)
    }

    /// Raymarch over a blank frame filled with the background color
    pub fn render(&mut self, camera: &Camera, width: u32, height: u32) -> Result<RgbaImage> {
        let source = background_image(width, height, self.settings.background);
        self.render_image(camera, &source)
    }
}

/// Solid image in the given linear RGBA color
pub fn background_image(width: u32, height: u32, color: [f32; 4]) -> RgbaImage {
    let [r, g, b, a] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    RgbaImage::from_pixel(width, height, Rgba([r, g, b, a]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::backend::CpuBackend;
    use glam::Vec3;
    use marcher_sdf::SdfError;
    use marcher_sdf::primitive::sphere;

    fn camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO).with_aspect(1.0)
    }

    #[test]
    fn test_without_backend_copies_source() {
        let mut host = Raymarcher::default();
        host.registry_mut().push(sphere(1.0));
        let source = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 4]));

        let output = host.render_image(&camera(), &source).unwrap();
        assert_eq!(output, source);
    }

    #[test]
    fn test_render_syncs_buffer() {
        let mut host = Raymarcher::default().with_backend(CpuBackend);
        host.registry_mut().push(sphere(1.0));
        assert!(host.buffer().is_empty());

        host.render(&camera(), 4, 4).unwrap();
        assert_eq!(host.buffer().len(), 1);
        assert!(!host.late_update());
    }

    #[test]
    fn test_cpu_backend_draws_over_background() {
        let mut host = Raymarcher::default().with_backend(CpuBackend);
        host.registry_mut().push(sphere(1.0));

        let output = host.render(&camera(), 16, 16).unwrap();
        let background = background_image(1, 1, host.settings.background);

        assert_eq!(output.dimensions(), (16, 16));
        assert_eq!(output.get_pixel(0, 0), background.get_pixel(0, 0));
        assert_ne!(output.get_pixel(8, 8), background.get_pixel(0, 0));
    }

    #[test]
    fn test_replacing_registry_rebuilds_buffer() {
        let mut host = Raymarcher::default().with_backend(CpuBackend);
        host.late_update();
        assert!(host.buffer().is_empty());

        let mut host = host.with_registry([sphere(1.0)].into_iter().collect());
        assert!(host.late_update());
        assert_eq!(host.buffer().len(), 1);

        let output = host.render(&camera(), 16, 16).unwrap();
        let background = background_image(1, 1, host.settings.background);
        assert_ne!(output.get_pixel(8, 8), background.get_pixel(0, 0));
    }

    #[test]
    fn test_invalid_settings_are_rejected_before_rendering() {
        let mut host = Raymarcher::default().with_backend(CpuBackend);
        host.registry_mut().push(sphere(1.0));

        host.settings.ao_iterations = u32::MAX;
        let result = host.render(&camera(), 4, 4);
        assert!(matches!(
            result,
            Err(Error::Sdf(SdfError::InvalidSettings(_)))
        ));

        host.settings = RenderSettings {
            min_distance: f32::NAN,
            ..Default::default()
        };
        assert!(host.render(&camera(), 4, 4).is_err());

        host.settings = RenderSettings::default();
        assert!(host.render(&camera(), 4, 4).is_ok());
    }

    #[test]
    fn test_detaching_backend() {
        let mut host = Raymarcher::default().with_backend(CpuBackend);
        assert!(host.has_backend());
        host.set_backend(None);
        assert!(!host.has_backend());
    }

    #[test]
    fn test_background_image_color() {
        let image = background_image(2, 1, [1.0, 0.0, 0.5, 2.0]);
        assert_eq!(image.get_pixel(1, 0), &Rgba([255, 0, 128, 255]));
    }
}
