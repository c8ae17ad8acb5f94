//! Marcher Render - WGPU raymarch backend
//!
//! This crate runs the raymarch shader on the GPU, either headless as a
//! [`marcher_core::RenderBackend`] or live in a preview window.
//!
//! ## Features
//!
//! - Full-screen raymarch pass over a source texture
//! - Shader feature flags injected into WGSL, pipeline rebuilt on change
//! - Interactive camera controls (orbit, pan, zoom)
//! - Hot reload of scene files
//!
//! ## Example
//!
//! ```rust,ignore
//! use marcher_core::SceneFile;
//! use marcher_render::GpuBackend;
//!
//! let scene = SceneFile::demo();
//! let camera = scene.camera(16.0 / 9.0);
//! let backend = GpuBackend::headless(&scene.settings)?;
//! let mut host = scene.into_raymarcher()?.with_backend(backend);
//! let image = host.render(&camera, 1280, 720)?;
//! ```

pub mod backend;
pub mod raymarcher;
pub mod watch;
pub mod window;

mod error;

// Re-export wgpu for users who need texture formats, etc.
pub use wgpu;
pub use winit;

pub use backend::GpuBackend;
pub use error::RenderError;
pub use raymarcher::{CameraUniforms, GpuRaymarcher, HEADLESS_FORMAT, init_headless, init_with_surface};
pub use watch::{SceneWatcher, WatchEvent};
pub use window::{WindowConfig, controls_help, run_preview};
