//! Marcher SDF - Platform-agnostic primitive records and shader generation
//!
//! This crate provides the data model shared by the CPU and GPU raymarchers:
//! primitive descriptors, the fixed-size GPU record they are packed into,
//! render settings with their feature flags, and WGSL shader generation.
//!
//! ## Key Types
//!
//! - [`Primitive`] - One of nine analytic shapes with placement and material
//! - [`GpuPrimitive`] - The 128-byte record uploaded to the primitive buffer
//! - [`RenderSettings`] - Raymarching, lighting, shadow and occlusion knobs
//! - [`ShaderFeatures`] - Compile-time branches baked into the shader
//!
//! ## Example
//!
//! ```rust
//! use marcher_sdf::{RenderSettings, build_shader, primitive};
//!
//! let ball = primitive::sphere(0.5);
//! assert_eq!(ball.parameters[0], 0.5);
//!
//! // Generate the complete shader for the default settings
//! let shader = build_shader(&RenderSettings::default().features());
//! assert!(shader.contains("fn scene_sdf"));
//! ```

mod error;
mod gpu;
pub mod primitive;
mod settings;
mod wgsl_gen;

pub use error::SdfError;
pub use gpu::{GPU_PRIMITIVE_SIZE, GpuPrimitive};
pub use primitive::{MAX_SHININESS, MIN_SCALE, Material, Placement, Primitive, PrimitiveKind};
pub use settings::{
    AmbientSource, DirectionalLight, NormalMode, RenderSettings, SettingsUniforms, ShaderFeatures,
    ShadowMode,
};
pub use wgsl_gen::{build_shader, get_base_shader, inject_features};

/// Distance reported for a scene without primitives.
///
/// Large enough that a single step carries any ray past `max_distance`.
pub const FAR_AWAY: f32 = 1.0e10;
