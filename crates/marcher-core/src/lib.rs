//! # Marcher Core
//!
//! Screen-space raymarching of analytic SDF primitives.
//!
//! Objects live in a [`PrimitiveRegistry`]. Once per frame the host
//! ([`Raymarcher`]) flattens the registry into a [`PrimitiveBuffer`] and hands
//! it, together with the camera and [`RenderSettings`], to a
//! [`RenderBackend`]. Rays that hit the union of all primitives are lit;
//! rays that miss keep the pixel of the source image.
//!
//! ## Quick Start
//!
//! ```rust
//! use marcher_core::prelude::*;
//!
//! let mut host = Raymarcher::default().with_backend(CpuBackend);
//! host.registry_mut().push(sphere(1.0));
//!
//! let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO).with_aspect(1.0);
//! let image = host.render(&camera, 32, 32)?;
//! assert_eq!(image.dimensions(), (32, 32));
//! # Ok::<(), marcher_core::Error>(())
//! ```
//!
//! ## Units and Conventions
//!
//! - **Distances**: Arbitrary world units
//! - **Angles**: Radians in code, degrees in scene files
//! - **Coordinate system**: Right-handed, Y-up, camera looks down -Z

pub mod backend;
pub mod buffer;
pub mod camera;
pub mod host;
pub mod march;
pub mod registry;
pub mod scene;
pub mod sdf;

mod error;

pub use error::{Error, Result};

pub use backend::{CpuBackend, Frame, RenderBackend};
pub use buffer::PrimitiveBuffer;
pub use camera::{Camera, Ray};
pub use host::Raymarcher;
pub use registry::{PrimitiveHandle, PrimitiveRegistry, RaymarchObject};
pub use scene::{CameraConfig, PrimitiveEntry, SceneFile};

pub use marcher_sdf::{
    Material, NormalMode, Placement, Primitive, PrimitiveKind, RenderSettings, ShadowMode,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{CpuBackend, RenderBackend};
    pub use crate::camera::Camera;
    pub use crate::host::Raymarcher;
    pub use crate::registry::{PrimitiveHandle, PrimitiveRegistry, RaymarchObject};
    pub use crate::scene::SceneFile;
    pub use crate::sdf::{Sdf, evaluate_union};

    pub use marcher_sdf::primitive::*;
    pub use marcher_sdf::{Material, Placement, RenderSettings};

    // Math (re-export glam)
    pub use glam::{Quat, Vec3};

    pub use crate::{Error, Result};
}
