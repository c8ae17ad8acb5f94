//! Primitive descriptors
//!
//! A primitive is one of nine analytic shapes placed in the world. The
//! descriptor stores the inverse of its rigid placement so a sample point
//! can be moved into object space with a single matrix multiply. Scale is
//! never baked into that matrix: it travels as a separate scalar and
//! multiplies the object-space distance after evaluation.
//!
//! All shapes are centered at the origin of their object space.

use std::fmt;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::SdfError;

/// Smallest magnitude a primitive scale is allowed to reach during evaluation
pub const MIN_SCALE: f32 = 1.0e-4;

/// Upper bound of the specular exponent
pub const MAX_SHININESS: f32 = 100.0;

// ============================================================================
// Constructor functions (ergonomic API)
// ============================================================================

/// Create the XZ ground plane (normal +Y)
pub fn plane() -> Primitive {
    Primitive::new(PrimitiveKind::Plane)
}

/// Create a box with the given full width, height and depth
pub fn box3(width: f32, height: f32, depth: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Box).with_parameters([width, height, depth])
}

/// Create a sphere with given radius
pub fn sphere(radius: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Sphere).with_parameters([radius, 0.0, 0.0])
}

/// Create an ellipsoid with the given full width, height and depth
pub fn ellipsoid(width: f32, height: f32, depth: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Ellipsoid).with_parameters([width, height, depth])
}

/// Create a Y-aligned capped cylinder
pub fn cylinder(height: f32, radius: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Cylinder).with_parameters([height, radius, 0.0])
}

/// Create a Y-aligned capsule; `height` is the distance between the cap centers
pub fn capsule(height: f32, radius: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Capsule).with_parameters([height, radius, 0.0])
}

/// Create a torus lying in the XZ plane
pub fn torus(radius: f32, width: f32) -> Primitive {
    Primitive::new(PrimitiveKind::Torus).with_parameters([radius, width, 0.0])
}

/// Create a triangular prism extruded along Z
pub fn tri_prism(size: f32, depth: f32) -> Primitive {
    Primitive::new(PrimitiveKind::TriangularPrism).with_parameters([size, depth, 0.0])
}

/// Create a hexagonal prism extruded along Z
pub fn hex_prism(size: f32, depth: f32) -> Primitive {
    Primitive::new(PrimitiveKind::HexagonalPrism).with_parameters([size, depth, 0.0])
}

// ============================================================================
// Shape kinds
// ============================================================================

/// The nine supported shapes. Discriminants are the tags written to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PrimitiveKind {
    Plane = 0,
    Box = 1,
    #[default]
    Sphere = 2,
    Ellipsoid = 3,
    Cylinder = 4,
    Capsule = 5,
    Torus = 6,
    #[serde(alias = "tri_prism")]
    TriangularPrism = 7,
    #[serde(alias = "hex_prism")]
    HexagonalPrism = 8,
}

impl PrimitiveKind {
    /// Every kind, in tag order
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Plane,
        PrimitiveKind::Box,
        PrimitiveKind::Sphere,
        PrimitiveKind::Ellipsoid,
        PrimitiveKind::Cylinder,
        PrimitiveKind::Capsule,
        PrimitiveKind::Torus,
        PrimitiveKind::TriangularPrism,
        PrimitiveKind::HexagonalPrism,
    ];

    /// Numeric tag stored in [`crate::GpuPrimitive::kind`]
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Plane => "Plane",
            PrimitiveKind::Box => "Box",
            PrimitiveKind::Sphere => "Sphere",
            PrimitiveKind::Ellipsoid => "Ellipsoid",
            PrimitiveKind::Cylinder => "Cylinder",
            PrimitiveKind::Capsule => "Capsule",
            PrimitiveKind::Torus => "Torus",
            PrimitiveKind::TriangularPrism => "Triangular Prism",
            PrimitiveKind::HexagonalPrism => "Hexagonal Prism",
        }
    }

    /// Labels of the free parameters this kind reads, in slot order.
    ///
    /// Slots past the end of the returned slice are ignored by the shape.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            PrimitiveKind::Plane => &[],
            PrimitiveKind::Box | PrimitiveKind::Ellipsoid => &["Width", "Height", "Depth"],
            PrimitiveKind::Sphere => &["Radius"],
            PrimitiveKind::Cylinder | PrimitiveKind::Capsule => &["Height", "Radius"],
            PrimitiveKind::Torus => &["Radius", "Width"],
            PrimitiveKind::TriangularPrism | PrimitiveKind::HexagonalPrism => &["Size", "Depth"],
        }
    }

    /// Parameters a freshly created primitive of this kind starts with
    pub fn default_parameters(self) -> [f32; 3] {
        match self {
            PrimitiveKind::Plane => [0.0, 0.0, 0.0],
            PrimitiveKind::Box | PrimitiveKind::Ellipsoid => [1.0, 1.0, 1.0],
            PrimitiveKind::Sphere => [0.5, 0.0, 0.0],
            PrimitiveKind::Cylinder | PrimitiveKind::Capsule => [1.0, 0.25, 0.0],
            PrimitiveKind::Torus => [0.5, 0.1, 0.0],
            PrimitiveKind::TriangularPrism | PrimitiveKind::HexagonalPrism => [0.5, 1.0, 0.0],
        }
    }
}

impl TryFrom<u32> for PrimitiveKind {
    type Error = SdfError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        PrimitiveKind::ALL
            .get(tag as usize)
            .copied()
            .ok_or(SdfError::UnknownKind(tag))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Material
// ============================================================================

/// Surface appearance of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Diffuse color (RGBA, 0-1)
    pub color: [f32; 4],
    /// Specular exponent, 0 to [`MAX_SHININESS`]
    pub shininess: f32,
    /// Specular color (RGBA, 0-1)
    pub specular_color: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [0.75, 0.75, 0.75, 1.0],
            shininess: 32.0,
            specular_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl Material {
    /// Default material with the given diffuse color
    pub fn new(color: [f32; 4]) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Set the specular exponent, clamped into `0..=MAX_SHININESS`
    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess.clamp(0.0, MAX_SHININESS);
        self
    }

    pub fn with_specular(mut self, specular_color: [f32; 4]) -> Self {
        self.specular_color = specular_color;
        self
    }
}

// ============================================================================
// Placement
// ============================================================================

/// Rigid world placement plus a per-axis scale
///
/// Only `scale.x` reaches the shader; it is applied as a uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// World-to-object matrix built from rotation and translation only
    pub fn inverse_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation.normalize(), self.position).inverse()
    }

    /// The scalar scale carried next to the transform
    pub fn uniform_scale(&self) -> f32 {
        self.scale.x
    }
}

// ============================================================================
// Primitive
// ============================================================================

/// A positioned, parameterised and shaded SDF shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    /// World-to-object transform (inverse of the placement, no scale)
    pub transform: Mat4,
    /// Uniform scale applied around the object origin
    pub scale: f32,
    /// Shape parameters, meaning given by [`PrimitiveKind::parameter_names`]
    pub parameters: [f32; 3],
    pub material: Material,
}

impl Default for Primitive {
    fn default() -> Self {
        Self::new(PrimitiveKind::default())
    }
}

impl Primitive {
    /// Create a primitive at the origin with the kind's default parameters
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            transform: Mat4::IDENTITY,
            scale: 1.0,
            parameters: kind.default_parameters(),
            material: Material::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: [f32; 3]) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.material.color = color;
        self
    }

    /// Builder form of [`Primitive::apply_placement`]
    pub fn placed(mut self, placement: &Placement) -> Self {
        self.apply_placement(placement);
        self
    }

    /// Refresh the inverse transform and scale from a world placement
    pub fn apply_placement(&mut self, placement: &Placement) {
        self.transform = placement.inverse_transform();
        self.scale = placement.uniform_scale();
    }

    /// Scale used during evaluation, kept away from zero
    pub fn effective_scale(&self) -> f32 {
        self.scale.abs().max(MIN_SCALE)
    }

    /// Move a world-space point into this primitive's unscaled object space
    pub fn to_object_space(&self, p: Vec3) -> Vec3 {
        self.transform.transform_point3(p)
    }

    /// Check the descriptor for values the shader cannot evaluate sensibly
    pub fn validate(&self) -> Result<(), SdfError> {
        if !self.transform.is_finite() {
            return Err(SdfError::InvalidPrimitive(format!(
                "{} transform contains non-finite values",
                self.kind
            )));
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(SdfError::InvalidPrimitive(format!(
                "{} scale must be finite and non-zero, got {}",
                self.kind, self.scale
            )));
        }
        for (name, value) in self
            .kind
            .parameter_names()
            .iter()
            .zip(self.parameters.iter())
        {
            if !value.is_finite() || *value < 0.0 {
                return Err(SdfError::InvalidPrimitive(format!(
                    "{} {} must be a non-negative number, got {}",
                    self.kind, name, value
                )));
            }
        }
        if !(0.0..=MAX_SHININESS).contains(&self.material.shininess) {
            return Err(SdfError::InvalidPrimitive(format!(
                "shininess must be within 0..={}, got {}",
                MAX_SHININESS, self.material.shininess
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tags_follow_declaration_order() {
        for (index, kind) in PrimitiveKind::ALL.iter().enumerate() {
            assert_eq!(kind.tag() as usize, index);
            assert_eq!(PrimitiveKind::try_from(kind.tag()), Ok(*kind));
        }
        assert_eq!(PrimitiveKind::try_from(9), Err(SdfError::UnknownKind(9)));
    }

    #[test]
    fn test_parameter_names() {
        assert!(PrimitiveKind::Plane.parameter_names().is_empty());
        assert_eq!(PrimitiveKind::Sphere.parameter_names(), &["Radius"]);
        assert_eq!(PrimitiveKind::Torus.parameter_names(), &["Radius", "Width"]);
        assert_eq!(PrimitiveKind::Box.parameter_names().len(), 3);
    }

    #[test]
    fn test_placement_excludes_scale_from_transform() {
        let placement = Placement::at(Vec3::new(1.0, 2.0, 3.0)).with_uniform_scale(4.0);
        let primitive = sphere(1.0).placed(&placement);

        assert_relative_eq!(primitive.scale, 4.0);
        // The placement origin maps to the object origin with no scaling applied
        let origin = primitive.to_object_space(Vec3::new(1.0, 2.0, 3.0));
        assert!(origin.length() < 1e-6);
        let offset = primitive.to_object_space(Vec3::new(2.0, 2.0, 3.0));
        assert_relative_eq!(offset.length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_is_inverted() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let primitive = box3(1.0, 1.0, 1.0).placed(&Placement::default().with_rotation(rotation));

        // A world point rotated by the placement returns to its object-space origin
        let object = Vec3::new(1.0, 0.0, 0.0);
        let world = rotation * object;
        let back = primitive.to_object_space(world);
        assert_relative_eq!(back.x, object.x, epsilon = 1e-5);
        assert_relative_eq!(back.z, object.z, epsilon = 1e-5);
    }

    #[test]
    fn test_uniform_scale_uses_x_axis() {
        let placement = Placement {
            scale: Vec3::new(2.0, 5.0, 7.0),
            ..Default::default()
        };
        assert_relative_eq!(placement.uniform_scale(), 2.0);
    }

    #[test]
    fn test_validate() {
        assert!(sphere(1.0).validate().is_ok());
        assert!(plane().validate().is_ok());
        assert!(sphere(-1.0).validate().is_err());
        assert!(box3(1.0, f32::NAN, 1.0).validate().is_err());

        let mut zero_scale = sphere(1.0);
        zero_scale.scale = 0.0;
        assert!(zero_scale.validate().is_err());

        // Unused slots are not checked
        let sphere_with_junk = sphere(1.0).with_parameters([1.0, -5.0, f32::NAN]);
        assert!(sphere_with_junk.validate().is_ok());
    }

    #[test]
    fn test_shininess_is_clamped() {
        assert_relative_eq!(Material::default().with_shininess(500.0).shininess, 100.0);
        assert_relative_eq!(Material::default().with_shininess(-1.0).shininess, 0.0);
    }

    #[test]
    fn test_effective_scale() {
        let mut primitive = sphere(1.0);
        primitive.scale = -2.0;
        assert_relative_eq!(primitive.effective_scale(), 2.0);
        primitive.scale = 0.0;
        assert_relative_eq!(primitive.effective_scale(), MIN_SCALE);
    }
}
