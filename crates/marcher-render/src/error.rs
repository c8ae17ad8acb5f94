//! Error types for the GPU renderer

use thiserror::Error;

/// Errors raised while setting up or driving the GPU pipeline
#[derive(Error, Debug)]
pub enum RenderError {
    /// No adapter matched the request
    #[error("Failed to find an appropriate adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to open a device
    #[error("Failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// A window surface could not be created
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    /// Mapping the output buffer back to the host failed
    #[error("Failed to read back frame: {0}")]
    Readback(String),

    /// Rendering was requested before any source image was set
    #[error("No source image has been uploaded")]
    NoSource,

    /// A frame or source image exceeds the device's 2D texture limit
    #[error("Texture of {width}x{height} exceeds the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    /// The output texture format cannot be read back as RGBA8
    #[error("Unsupported readback format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
}

impl From<RenderError> for marcher_core::Error {
    fn from(error: RenderError) -> Self {
        marcher_core::Error::Backend(error.to_string())
    }
}
