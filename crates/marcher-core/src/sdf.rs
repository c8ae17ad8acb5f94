//! Signed distance evaluation on the CPU
//!
//! These functions mirror the ones in the WGSL template one for one, so the
//! CPU kernel and the GPU pipeline agree on every shape. Negative values are
//! inside, positive values are outside, and zero is exactly on the surface.

use glam::{Vec2, Vec3, Vec3Swizzles};
use marcher_sdf::{FAR_AWAY, Material, Primitive, PrimitiveKind};

/// Smallest ellipsoid radius used during evaluation
const MIN_RADIUS: f32 = 1.0e-4;

/// The core SDF trait - any type that can compute distance from a point
pub trait Sdf: Send + Sync {
    /// Calculate the signed distance from world-space point `p` to the surface
    fn distance(&self, p: Vec3) -> f32;

    /// World-space box containing every point where the distance is negative
    fn bounds(&self) -> Aabb;
}

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Merge two bounding boxes
    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

// ============================================================================
// Shape distance functions (object space, unscaled)
// ============================================================================

/// Ground plane through the origin, normal +Y
pub fn sd_plane(p: Vec3) -> f32 {
    p.y
}

pub fn sd_box(p: Vec3, half_extents: Vec3) -> f32 {
    let q = p.abs() - half_extents;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

pub fn sd_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Bound (not exact) ellipsoid distance
pub fn sd_ellipsoid(p: Vec3, radii: Vec3) -> f32 {
    let r = radii.max(Vec3::splat(MIN_RADIUS));
    let k0 = (p / r).length();
    let k1 = (p / (r * r)).length();
    if k1 == 0.0 {
        return -r.min_element();
    }
    k0 * (k0 - 1.0) / k1
}

/// Y-aligned capped cylinder
pub fn sd_cylinder(p: Vec3, height: f32, radius: f32) -> f32 {
    let d = Vec2::new(p.xz().length(), p.y).abs() - Vec2::new(radius, height * 0.5);
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// Y-aligned capsule whose segment spans `height`
pub fn sd_capsule(p: Vec3, height: f32, radius: f32) -> f32 {
    let half_height = height * 0.5;
    let q = Vec3::new(p.x, p.y - p.y.clamp(-half_height, half_height), p.z);
    q.length() - radius
}

/// Torus lying in the XZ plane
pub fn sd_torus(p: Vec3, radius: f32, width: f32) -> f32 {
    let q = Vec2::new(p.xz().length() - radius, p.y);
    q.length() - width
}

/// Triangular prism extruded along Z
pub fn sd_tri_prism(p: Vec3, size: f32, depth: f32) -> f32 {
    let q = p.abs();
    (q.z - depth * 0.5).max((q.x * 0.866_025 + p.y * 0.5).max(-p.y) - size * 0.5)
}

/// Hexagonal prism extruded along Z
pub fn sd_hex_prism(p: Vec3, size: f32, depth: f32) -> f32 {
    let k = Vec3::new(-0.866_025_4, 0.5, 0.577_35);
    let q = p.abs();
    let xy = q.xy() - 2.0 * k.xy().dot(q.xy()).min(0.0) * k.xy();
    let d = Vec2::new(
        (xy - Vec2::new(xy.x.clamp(-k.z * size, k.z * size), size)).length()
            * sign(xy.y - size),
        q.z - depth * 0.5,
    );
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// WGSL `sign`: zero stays zero
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Distance from an object-space point to an unscaled shape
pub fn shape_distance(kind: PrimitiveKind, p: Vec3, parameters: [f32; 3]) -> f32 {
    let a = Vec3::from_array(parameters);
    match kind {
        PrimitiveKind::Plane => sd_plane(p),
        PrimitiveKind::Box => sd_box(p, a * 0.5),
        PrimitiveKind::Sphere => sd_sphere(p, a.x),
        PrimitiveKind::Ellipsoid => sd_ellipsoid(p, a * 0.5),
        PrimitiveKind::Cylinder => sd_cylinder(p, a.x, a.y),
        PrimitiveKind::Capsule => sd_capsule(p, a.x, a.y),
        PrimitiveKind::Torus => sd_torus(p, a.x, a.y),
        PrimitiveKind::TriangularPrism => sd_tri_prism(p, a.x, a.y),
        PrimitiveKind::HexagonalPrism => sd_hex_prism(p, a.x, a.y),
    }
}

/// Object-space box around an unscaled shape, `None` when unbounded
fn shape_local_bounds(kind: PrimitiveKind, parameters: [f32; 3]) -> Option<Aabb> {
    let [a, b, _] = parameters.map(f32::abs);
    let half = match kind {
        PrimitiveKind::Plane => return None,
        PrimitiveKind::Box | PrimitiveKind::Ellipsoid => Vec3::from_array(parameters).abs() * 0.5,
        PrimitiveKind::Sphere => Vec3::splat(a),
        PrimitiveKind::Cylinder => Vec3::new(b, a * 0.5, b),
        PrimitiveKind::Capsule => Vec3::new(b, a * 0.5 + b, b),
        PrimitiveKind::Torus => Vec3::new(a + b, b, a + b),
        // Apex at y = size, base at y = -size / 2
        PrimitiveKind::TriangularPrism => {
            return Some(Aabb::new(
                Vec3::new(-0.866_026 * a, -0.5 * a, -0.5 * b),
                Vec3::new(0.866_026 * a, a, 0.5 * b),
            ));
        }
        PrimitiveKind::HexagonalPrism => Vec3::new(a * 1.155, a, b * 0.5),
    };
    Some(Aabb::from_center(Vec3::ZERO, half))
}

impl Sdf for Primitive {
    /// World-space distance, scale applied as `sdf(p / s) * s`
    fn distance(&self, p: Vec3) -> f32 {
        let s = self.effective_scale();
        shape_distance(self.kind, self.to_object_space(p) / s, self.parameters) * s
    }

    fn bounds(&self) -> Aabb {
        let Some(local) = shape_local_bounds(self.kind, self.parameters) else {
            // Planes are framed as a floor tile around their origin
            let origin = self.transform.inverse().transform_point3(Vec3::ZERO);
            return Aabb::from_center(origin, Vec3::new(2.0, 0.0, 2.0));
        };
        let s = self.effective_scale();
        let to_world = self.transform.inverse();

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in local.corners() {
            let world = to_world.transform_point3(corner * s);
            min = min.min(world);
            max = max.max(world);
        }
        Aabb::new(min, max)
    }
}

// ============================================================================
// Union
// ============================================================================

/// Distance to the scene plus the material of the nearest primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub distance: f32,
    /// Index of the primitive that owns the sample
    pub index: usize,
    pub material: Material,
}

/// Union of all primitives by `min`, the nearest one donating its material
///
/// The first primitive initialises the running minimum and later ones only
/// replace it when strictly closer, so exact ties go to the earlier entry.
/// Returns `None` for an empty list.
pub fn evaluate_union(primitives: &[Primitive], p: Vec3) -> Option<SurfaceSample> {
    let mut nearest: Option<SurfaceSample> = None;
    for (index, primitive) in primitives.iter().enumerate() {
        let distance = primitive.distance(p);
        if nearest.is_none_or(|best| distance < best.distance) {
            nearest = Some(SurfaceSample {
                distance,
                index,
                material: primitive.material,
            });
        }
    }
    nearest
}

/// Union distance alone, [`FAR_AWAY`] for an empty list
pub fn union_distance(primitives: &[Primitive], p: Vec3) -> f32 {
    primitives
        .iter()
        .map(|primitive| primitive.distance(p))
        .fold(FAR_AWAY, f32::min)
}

/// Bounds of every primitive together, `None` for an empty list
pub fn scene_bounds(primitives: &[Primitive]) -> Option<Aabb> {
    primitives
        .iter()
        .map(Sdf::bounds)
        .reduce(|a, b| a.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;
    use marcher_sdf::Placement;
    use marcher_sdf::primitive::{
        box3, capsule, cylinder, ellipsoid, hex_prism, plane, sphere, torus, tri_prism,
    };

    #[test]
    fn test_sphere_distance() {
        let s = sphere(1.0);
        assert_relative_eq!(s.distance(Vec3::ZERO), -1.0);
        assert_relative_eq!(s.distance(Vec3::new(2.0, 0.0, 0.0)), 1.0);
        assert_relative_eq!(s.distance(Vec3::new(0.0, 1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_box_uses_full_extents() {
        let b = box3(2.0, 4.0, 6.0);
        assert_relative_eq!(b.distance(Vec3::new(1.0, 0.0, 0.0)), 0.0);
        assert_relative_eq!(b.distance(Vec3::new(0.0, 3.0, 0.0)), 1.0);
        assert_relative_eq!(b.distance(Vec3::ZERO), -1.0);
    }

    #[test]
    fn test_plane_distance() {
        let p = plane().placed(&Placement::at(Vec3::new(0.0, -1.0, 0.0)));
        assert_relative_eq!(p.distance(Vec3::ZERO), 1.0);
        assert_relative_eq!(p.distance(Vec3::new(5.0, -3.0, 2.0)), -2.0);
    }

    #[test]
    fn test_cylinder_and_capsule() {
        let c = cylinder(2.0, 0.5);
        assert_relative_eq!(c.distance(Vec3::new(1.0, 0.0, 0.0)), 0.5);
        assert_relative_eq!(c.distance(Vec3::new(0.0, 2.0, 0.0)), 1.0);

        let cap = capsule(2.0, 0.5);
        // Caps are hemispheres centered at the segment ends
        assert_relative_eq!(cap.distance(Vec3::new(0.0, 2.0, 0.0)), 0.5);
        assert_relative_eq!(cap.distance(Vec3::new(1.0, 0.5, 0.0)), 0.5);
    }

    #[test]
    fn test_torus_distance() {
        let t = torus(1.0, 0.25);
        assert_relative_eq!(t.distance(Vec3::new(1.0, 0.0, 0.0)), -0.25);
        assert_relative_eq!(t.distance(Vec3::ZERO), 0.75);
    }

    #[test]
    fn test_ellipsoid_surface_and_center() {
        let e = ellipsoid(2.0, 1.0, 1.0);
        assert_relative_eq!(e.distance(Vec3::new(1.0, 0.0, 0.0)), 0.0, epsilon = 1e-5);
        assert!(e.distance(Vec3::new(0.0, 2.0, 0.0)) > 0.0);
        // Degenerate gradient at the center is handled
        assert_relative_eq!(e.distance(Vec3::ZERO), -0.5);
    }

    #[test]
    fn test_prisms_contain_origin() {
        assert!(tri_prism(1.0, 1.0).distance(Vec3::new(0.0, 0.1, 0.0)) < 0.0);
        assert!(tri_prism(1.0, 1.0).distance(Vec3::new(0.0, 0.0, 2.0)) > 0.0);

        let hex = hex_prism(0.5, 1.0);
        assert!(hex.distance(Vec3::ZERO) < 0.0);
        assert_relative_eq!(hex.distance(Vec3::new(0.0, 0.0, 1.0)), 0.5, epsilon = 1e-5);
        assert_relative_eq!(hex.distance(Vec3::new(0.0, 1.0, 0.0)), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_scale_multiplies_distance() {
        let s = sphere(1.0).placed(&Placement::default().with_uniform_scale(2.0));
        assert_relative_eq!(s.distance(Vec3::new(3.0, 0.0, 0.0)), 1.0);
        assert_relative_eq!(s.distance(Vec3::ZERO), -2.0);
    }

    #[test]
    fn test_zero_scale_is_clamped() {
        let mut s = sphere(1.0);
        s.scale = 0.0;
        assert!(s.distance(Vec3::X).is_finite());
    }

    #[test]
    fn test_rotation_moves_shape() {
        let b = box3(4.0, 1.0, 1.0).placed(
            &Placement::at(Vec3::ZERO)
                .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        );
        // Long axis now points along Y
        assert!(b.distance(Vec3::new(0.0, 1.5, 0.0)) < 0.0);
        assert!(b.distance(Vec3::new(1.5, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_union_picks_nearest_material() {
        let red = sphere(0.5)
            .with_color([1.0, 0.0, 0.0, 1.0])
            .placed(&Placement::at(Vec3::new(-2.0, 0.0, 0.0)));
        let blue = sphere(0.5)
            .with_color([0.0, 0.0, 1.0, 1.0])
            .placed(&Placement::at(Vec3::new(2.0, 0.0, 0.0)));
        let list = [red, blue];

        let sample = evaluate_union(&list, Vec3::new(1.8, 0.0, 0.0)).unwrap();
        assert_eq!(sample.index, 1);
        assert_eq!(sample.material.color, [0.0, 0.0, 1.0, 1.0]);
        assert_relative_eq!(sample.distance, -0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_union_ties_go_to_first() {
        let a = sphere(1.0).with_color([1.0, 0.0, 0.0, 1.0]);
        let b = sphere(1.0).with_color([0.0, 1.0, 0.0, 1.0]);
        let sample = evaluate_union(&[a, b], Vec3::new(0.0, 3.0, 0.0)).unwrap();
        assert_eq!(sample.index, 0);
        assert_eq!(sample.material.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_empty_union_misses() {
        assert!(evaluate_union(&[], Vec3::ZERO).is_none());
        assert_eq!(union_distance(&[], Vec3::ZERO), FAR_AWAY);
        assert!(scene_bounds(&[]).is_none());
    }

    #[test]
    fn test_bounds_follow_placement() {
        let s = sphere(1.0).placed(&Placement::at(Vec3::new(3.0, 0.0, 0.0)).with_uniform_scale(2.0));
        let bounds = s.bounds();
        assert_relative_eq!(bounds.min.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(bounds.max.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(bounds.center().y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_tri_prism_bounds_reach_the_apex() {
        let prism = tri_prism(1.0, 1.0);
        let apex = Vec3::new(0.0, 0.99, 0.0);
        assert!(prism.distance(apex) < 0.0);

        let bounds = prism.bounds();
        assert_relative_eq!(bounds.max.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(bounds.min.y, -0.5, epsilon = 1e-5);
        assert_relative_eq!(bounds.max.x, 0.866, epsilon = 1e-3);
    }

    #[test]
    fn test_bounds_contain_every_inside_point() {
        let placement = Placement::at(Vec3::new(0.3, -0.2, 0.1))
            .with_rotation(Quat::from_rotation_z(0.7))
            .with_uniform_scale(1.3);
        let shapes = [
            box3(1.0, 0.6, 1.4),
            sphere(0.8),
            ellipsoid(1.6, 0.8, 1.2),
            cylinder(1.2, 0.5),
            capsule(1.0, 0.4),
            torus(0.8, 0.25),
            tri_prism(1.0, 0.8),
            hex_prism(0.6, 1.0),
        ];

        for shape in shapes.iter().flat_map(|s| [*s, s.placed(&placement)]) {
            let bounds = shape.bounds();
            let (lo, hi) = (bounds.min - 1e-4, bounds.max + 1e-4);
            let steps = 48;
            for i in 0..=steps {
                for j in 0..=steps {
                    for k in 0..=steps {
                        let t = Vec3::new(i as f32, j as f32, k as f32) / steps as f32;
                        let p = Vec3::splat(-3.0) + t * 6.0;
                        if shape.distance(p) < 0.0 {
                            assert!(
                                p.cmpge(lo).all() && p.cmple(hi).all(),
                                "{:?}: {p} inside the shape but outside {bounds:?}",
                                shape.kind
                            );
                        }
                    }
                }
            }
        }
    }
}
