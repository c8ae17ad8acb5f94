//! GPU raymarch pipeline
//!
//! One render pipeline draws a full-screen triangle whose fragment shader
//! marches every pixel. The shader reads four bindings: camera uniforms,
//! settings uniforms, the primitive storage buffer and the source texture
//! that missed rays fall back to.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use marcher_core::{Camera, PrimitiveBuffer};
use marcher_sdf::{
    GPU_PRIMITIVE_SIZE, GpuPrimitive, RenderSettings, SettingsUniforms, ShaderFeatures,
    build_shader,
};
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::error::RenderError;

/// Format of headless render targets and of the source texture
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Camera uniforms sent to the GPU
/// This struct must match the WGSL `CameraUniforms` struct layout exactly
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    /// World-space frustum corners: top-left, top-right, bottom-right, bottom-left
    pub corners: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub _pad0: f32,
    pub resolution: [f32; 2],
    pub _pad1: [f32; 2],
}

impl CameraUniforms {
    pub fn from_camera(camera: &Camera, resolution: [f32; 2]) -> Self {
        Self {
            corners: camera
                .world_frustum_corners()
                .map(|corner| corner.extend(0.0).to_array()),
            position: camera.position.to_array(),
            _pad0: 0.0,
            resolution,
            _pad1: [0.0; 2],
        }
    }
}

struct SourceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// Raymarching renderer using WGPU
pub struct GpuRaymarcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipeline: wgpu::RenderPipeline,
    target_format: wgpu::TextureFormat,
    features: ShaderFeatures,
    settings: RenderSettings,

    camera_buffer: wgpu::Buffer,
    settings_buffer: wgpu::Buffer,
    primitive_buffer: wgpu::Buffer,
    /// Records the storage buffer was sized for
    primitive_capacity: usize,
    primitive_count: u32,

    source: Option<SourceTexture>,
}

impl GpuRaymarcher {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
        settings: &RenderSettings,
    ) -> Self {
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniforms::from_camera(
                &Camera::default(),
                [800.0, 600.0],
            )]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let settings_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Settings Uniform Buffer"),
            contents: bytemuck::cast_slice(&[SettingsUniforms::new(settings, 0)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let primitive_buffer = create_primitive_buffer(&device, &[]);

        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Raymarch Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let features = settings.features();
        let pipeline = create_pipeline(&device, &pipeline_layout, target_format, &features);

        Self {
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            pipeline,
            target_format,
            features,
            settings: settings.clone(),
            camera_buffer,
            settings_buffer,
            primitive_buffer,
            primitive_capacity: 0,
            primitive_count: 0,
            source: None,
        }
    }

    /// Create a raymarcher that renders into [`HEADLESS_FORMAT`] targets
    pub fn headless(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, settings: &RenderSettings) -> Self {
        Self::new(device, queue, HEADLESS_FORMAT, settings)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    pub fn features(&self) -> ShaderFeatures {
        self.features
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Number of primitives the shader will read
    pub fn primitive_count(&self) -> u32 {
        self.primitive_count
    }

    /// Apply new settings, rebuilding the pipeline if a shader feature changed
    pub fn set_settings(&mut self, settings: &RenderSettings) {
        let features = settings.features();
        if features != self.features {
            debug!(?features, "Shader features changed, rebuilding pipeline");
            self.pipeline = create_pipeline(
                &self.device,
                &self.pipeline_layout,
                self.target_format,
                &features,
            );
            self.features = features;
        }
        self.settings = settings.clone();
        self.write_settings();
    }

    fn write_settings(&self) {
        let uniforms = SettingsUniforms::new(&self.settings, self.primitive_count);
        self.queue
            .write_buffer(&self.settings_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Replace the primitive list
    ///
    /// The storage buffer is recreated when the record count changes and
    /// rewritten in place otherwise. An empty list keeps a single zeroed
    /// placeholder bound with a count of zero.
    pub fn set_primitives(&mut self, records: &[GpuPrimitive]) {
        if records.len() == self.primitive_capacity {
            if !records.is_empty() {
                self.queue
                    .write_buffer(&self.primitive_buffer, 0, bytemuck::cast_slice(records));
            }
        } else {
            self.primitive_buffer = create_primitive_buffer(&self.device, records);
            self.primitive_capacity = records.len();
        }
        self.primitive_count = u32::try_from(records.len()).unwrap_or(u32::MAX);

        debug!(
            count = records.len(),
            bytes = records.len() * GPU_PRIMITIVE_SIZE,
            "Uploaded primitive buffer"
        );
        self.write_settings();
    }

    /// Upload the contents of a host-side primitive buffer
    pub fn upload(&mut self, buffer: &PrimitiveBuffer) {
        self.set_primitives(buffer.records());
    }

    /// Largest width or height a frame may have on this device
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Check a frame size against [`Self::max_texture_dimension`]
    pub fn check_size(&self, width: u32, height: u32) -> Result<(), RenderError> {
        check_texture_size(width, height, self.max_texture_dimension())
    }

    /// Upload the image that missed rays show
    pub fn set_source_image(&mut self, image: &RgbaImage) -> Result<(), RenderError> {
        let size = image.dimensions();
        self.check_size(size.0, size.1)?;
        let source = match self.source.take() {
            Some(source) if source.size == size => source,
            _ => create_source_texture(&self.device, size),
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.0),
                rows_per_image: Some(size.1),
            },
            wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
        );
        self.source = Some(source);
        Ok(())
    }

    /// Size of the uploaded source image, if any
    pub fn source_size(&self) -> Option<(u32, u32)> {
        self.source.as_ref().map(|source| source.size)
    }

    /// Update uniforms from camera state
    pub fn update_camera(&self, camera: &Camera, resolution: [f32; 2]) {
        let uniforms = CameraUniforms::from_camera(camera, resolution);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Render a frame to the given texture view
    pub fn render(&self, view: &wgpu::TextureView) -> Result<(), RenderError> {
        let source = self.source.as_ref().ok_or(RenderError::NoSource)?;

        // Buffers may have been recreated since the last frame
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raymarch Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.settings_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.primitive_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Raymarch Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Raymarching Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Full-screen triangle
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Raymarch over `source` and read the frame back
    pub fn render_to_image(
        &mut self,
        camera: &Camera,
        source: &RgbaImage,
    ) -> Result<RgbaImage, RenderError> {
        let swap_red_blue = match self.target_format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => return Err(RenderError::UnsupportedFormat(other)),
        };

        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Ok(source.clone());
        }
        self.set_source_image(source)?;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Output Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.target_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.update_camera(camera, [width as f32, height as f32]);
        self.render(&view)?;

        // Create buffer to read back
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(height);

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Copy Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        // Read back
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();

        // Strip row padding
        let row_len = unpadded_bytes_per_row as usize;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in data.chunks(padded_bytes_per_row as usize).take(height as usize) {
            pixels.extend_from_slice(&row[..row_len]);
        }
        drop(data);
        output_buffer.unmap();

        if swap_red_blue {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("frame size mismatch".to_string()))
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    target_format: wgpu::TextureFormat,
    features: &ShaderFeatures,
) -> wgpu::RenderPipeline {
    let shader_source = build_shader(features);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Raymarching Shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Raymarching Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn create_primitive_buffer(device: &wgpu::Device, records: &[GpuPrimitive]) -> wgpu::Buffer {
    // Storage bindings cannot be empty
    let placeholder = [GpuPrimitive::zeroed()];
    let contents = if records.is_empty() {
        &placeholder[..]
    } else {
        records
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Primitive Storage Buffer"),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

/// Oversized textures are a wgpu validation error, which panics by default
fn check_texture_size(width: u32, height: u32, max: u32) -> Result<(), RenderError> {
    if width > max || height > max {
        return Err(RenderError::TooLarge { width, height, max });
    }
    Ok(())
}

fn create_source_texture(device: &wgpu::Device, size: (u32, u32)) -> SourceTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Source Texture"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HEADLESS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    SourceTexture {
        texture,
        view,
        size,
    }
}

fn request_device_descriptor() -> wgpu::DeviceDescriptor<'static> {
    wgpu::DeviceDescriptor {
        label: Some("Marcher Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }
}

/// Initialize WGPU for headless rendering (no window)
pub async fn init_headless() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>), RenderError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;
    debug!(adapter = ?adapter.get_info(), "Selected adapter");

    let (device, queue) = adapter.request_device(&request_device_descriptor()).await?;
    Ok((Arc::new(device), Arc::new(queue)))
}

/// Initialize WGPU for windowed rendering
pub async fn init_with_surface(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, wgpu::TextureFormat), RenderError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await?;
    debug!(adapter = ?adapter.get_info(), "Selected adapter");

    let (device, queue) = adapter.request_device(&request_device_descriptor()).await?;

    // Shader output is written unconverted, as in headless renders
    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);

    Ok((Arc::new(device), Arc::new(queue), surface_format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_camera_uniform_layout() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 96);
        assert_eq!(std::mem::offset_of!(CameraUniforms, position), 64);
        assert_eq!(std::mem::offset_of!(CameraUniforms, resolution), 80);
    }

    #[test]
    fn test_camera_uniforms_carry_corners() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let uniforms = CameraUniforms::from_camera(&camera, [640.0, 360.0]);

        let corners = camera.world_frustum_corners();
        for (packed, corner) in uniforms.corners.iter().zip(corners) {
            assert_eq!(&packed[..3], &corner.to_array());
            assert_eq!(packed[3], 0.0);
        }
        assert_eq!(uniforms.position, [0.0, 0.0, 5.0]);
        assert_eq!(uniforms.resolution, [640.0, 360.0]);
    }

    #[test]
    fn test_settings_uniform_size() {
        // Must stay a multiple of 16 for uniform binding
        assert_eq!(std::mem::size_of::<SettingsUniforms>() % 16, 0);
    }

    #[test]
    fn test_oversized_textures_are_rejected() {
        assert!(check_texture_size(8192, 8192, 8192).is_ok());
        assert!(matches!(
            check_texture_size(16384, 1080, 8192),
            Err(RenderError::TooLarge {
                width: 16384,
                height: 1080,
                max: 8192
            })
        ));
        assert!(check_texture_size(1, 8193, 8192).is_err());
    }
}
