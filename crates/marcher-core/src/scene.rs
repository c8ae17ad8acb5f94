//! JSON scene files
//!
//! A scene file holds a camera, render settings and an ordered list of
//! primitives. Every field is optional and falls back to its default, so a
//! file containing `{}` is a valid, empty scene.
//!
//! ```json
//! {
//!   "camera": { "position": [4, 3, 6], "target": [0, 0, 0], "fov_degrees": 60 },
//!   "settings": { "shadows": "soft_improved", "ao_intensity": 0.5 },
//!   "primitives": [
//!     { "kind": "plane" },
//!     { "kind": "sphere", "position": [0, 1, 0], "parameters": [0.75],
//!       "material": { "color": [0.9, 0.2, 0.2, 1.0] } }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use glam::{EulerRot, Quat, Vec3};
use marcher_sdf::{Material, Placement, Primitive, PrimitiveKind, RenderSettings, ShadowMode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::camera::Camera;
use crate::host::Raymarcher;
use crate::registry::{PrimitiveRegistry, RaymarchObject};
use crate::{Error, Result};

/// Camera block of a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view
    pub fov_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = Camera::default();
        Self {
            position: camera.position.to_array(),
            target: camera.target.to_array(),
            fov_degrees: camera.fov.to_degrees(),
        }
    }
}

/// One primitive as written in a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitiveEntry {
    pub kind: PrimitiveKind,
    pub position: [f32; 3],
    /// Quaternion as `[x, y, z, w]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    /// Euler angles in degrees, applied Y then X then Z
    #[serde(skip_serializing_if = "Option::is_none")]
    pub euler_degrees: Option<[f32; 3]>,
    pub scale: f32,
    /// Shape parameters; missing slots keep the kind's defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<f32>>,
    pub material: Material,
}

impl Default for PrimitiveEntry {
    fn default() -> Self {
        Self {
            kind: PrimitiveKind::default(),
            position: [0.0; 3],
            rotation: None,
            euler_degrees: None,
            scale: 1.0,
            parameters: None,
            material: Material::default(),
        }
    }
}

impl PrimitiveEntry {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_parameters(mut self, parameters: &[f32]) -> Self {
        self.parameters = Some(parameters.to_vec());
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.material.color = color;
        self
    }

    pub fn with_euler_degrees(mut self, euler_degrees: [f32; 3]) -> Self {
        self.euler_degrees = Some(euler_degrees);
        self
    }

    /// Rotation from whichever form the entry uses; quaternion wins over Euler
    pub fn rotation(&self) -> Quat {
        if let Some([x, y, z, w]) = self.rotation {
            return Quat::from_xyzw(x, y, z, w).normalize();
        }
        if let Some([x, y, z]) = self.euler_degrees {
            return Quat::from_euler(
                EulerRot::YXZ,
                y.to_radians(),
                x.to_radians(),
                z.to_radians(),
            );
        }
        Quat::IDENTITY
    }

    pub fn placement(&self) -> Placement {
        Placement::at(Vec3::from_array(self.position))
            .with_rotation(self.rotation())
            .with_uniform_scale(self.scale)
    }

    /// Validated descriptor for this entry
    pub fn to_primitive(&self) -> Result<Primitive> {
        let mut parameters = self.kind.default_parameters();
        if let Some(given) = &self.parameters {
            if given.len() > parameters.len() {
                return Err(Error::SceneFile(format!(
                    "{} takes at most {} parameters, got {}",
                    self.kind,
                    parameters.len(),
                    given.len()
                )));
            }
            parameters[..given.len()].copy_from_slice(given);
        }

        let primitive = Primitive::new(self.kind)
            .with_parameters(parameters)
            .with_material(self.material)
            .placed(&self.placement());
        primitive.validate()?;
        Ok(primitive)
    }
}

/// A complete scene: camera, settings and primitives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub camera: CameraConfig,
    pub settings: RenderSettings,
    pub primitives: Vec<PrimitiveEntry>,

    /// Where the scene was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl SceneFile {
    pub fn from_json(json: &str) -> Result<Self> {
        let scene: SceneFile = serde_json::from_str(json)?;
        scene.settings.validate()?;
        Ok(scene)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut scene = Self::from_json(&json)
            .map_err(|e| Error::SceneFile(format!("{}: {e}", path.display())))?;
        scene.source_path = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            primitives = scene.primitives.len(),
            "Loaded scene"
        );
        Ok(scene)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Get the source file name (without path)
    pub fn source_name(&self) -> Option<String> {
        self.source_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }

    /// Camera described by the file, for the given aspect ratio
    pub fn camera(&self, aspect: f32) -> Camera {
        let mut camera = Camera::look_at(
            Vec3::from_array(self.camera.position),
            Vec3::from_array(self.camera.target),
        )
        .with_aspect(aspect);
        camera.fov = self.camera.fov_degrees.to_radians();
        camera
    }

    /// Registry holding every primitive of the file, in order
    pub fn registry(&self) -> Result<PrimitiveRegistry> {
        let mut registry = PrimitiveRegistry::new();
        for entry in &self.primitives {
            let primitive = entry.to_primitive()?;
            registry.push(RaymarchObject::with_placement(primitive, entry.placement()));
        }
        Ok(registry)
    }

    /// Host with this scene's settings and primitives, no backend attached
    pub fn into_raymarcher(self) -> Result<Raymarcher> {
        let registry = self.registry()?;
        Ok(Raymarcher::new(self.settings).with_registry(registry))
    }

    /// Small showcase scene using every shape kind
    pub fn demo() -> Self {
        let palette = [
            [0.90, 0.30, 0.25, 1.0],
            [0.95, 0.65, 0.20, 1.0],
            [0.85, 0.85, 0.30, 1.0],
            [0.40, 0.80, 0.35, 1.0],
            [0.25, 0.70, 0.80, 1.0],
            [0.30, 0.45, 0.90, 1.0],
            [0.60, 0.40, 0.85, 1.0],
            [0.90, 0.45, 0.70, 1.0],
        ];
        let shapes = [
            PrimitiveEntry::new(PrimitiveKind::Box).with_euler_degrees([0.0, 30.0, 0.0]),
            PrimitiveEntry::new(PrimitiveKind::Sphere),
            PrimitiveEntry::new(PrimitiveKind::Ellipsoid).with_parameters(&[1.2, 0.6, 0.8]),
            PrimitiveEntry::new(PrimitiveKind::Cylinder),
            PrimitiveEntry::new(PrimitiveKind::Capsule).with_parameters(&[0.6, 0.25]),
            PrimitiveEntry::new(PrimitiveKind::Torus).with_euler_degrees([60.0, 0.0, 0.0]),
            PrimitiveEntry::new(PrimitiveKind::TriangularPrism).with_parameters(&[0.9, 0.6]),
            PrimitiveEntry::new(PrimitiveKind::HexagonalPrism).with_parameters(&[0.4, 0.6]),
        ];

        let mut primitives = vec![
            PrimitiveEntry::new(PrimitiveKind::Plane)
                .at([0.0, -0.5, 0.0])
                .with_color([0.55, 0.55, 0.58, 1.0]),
        ];
        for (i, (entry, color)) in shapes.into_iter().zip(palette).enumerate() {
            let column = (i % 4) as f32 - 1.5;
            let row = (i / 4) as f32 - 0.5;
            primitives.push(entry.at([column * 1.6, 0.1, row * 1.8]).with_color(color));
        }

        Self {
            camera: CameraConfig {
                position: [4.5, 4.0, 7.0],
                target: [0.0, 0.0, 0.0],
                fov_degrees: 50.0,
            },
            settings: RenderSettings {
                shadows: ShadowMode::SoftImproved,
                shadow_penumbra: 12.0,
                ao_iterations: 3,
                ao_intensity: 0.4,
                ..Default::default()
            },
            primitives,
            source_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_object_is_empty_scene() {
        let scene = SceneFile::from_json("{}").unwrap();
        assert!(scene.primitives.is_empty());
        assert_eq!(scene.settings, RenderSettings::default());
        assert!(scene.registry().unwrap().is_empty());
    }

    #[test]
    fn test_parse_entries() {
        let json = r#"{
            "primitives": [
                { "kind": "torus", "position": [1, 2, 3], "parameters": [2.0] },
                { "kind": "hex_prism", "scale": 2.0 }
            ]
        }"#;
        let scene = SceneFile::from_json(json).unwrap();
        let primitives = scene.registry().unwrap().collect();

        assert_eq!(primitives.len(), 2);
        assert_eq!(primitives[0].kind, PrimitiveKind::Torus);
        // Missing slots keep the defaults
        assert_eq!(primitives[0].parameters, [2.0, 0.1, 0.0]);
        assert!(
            primitives[0]
                .to_object_space(Vec3::new(1.0, 2.0, 3.0))
                .abs_diff_eq(Vec3::ZERO, 1e-6)
        );
        assert_eq!(primitives[1].kind, PrimitiveKind::HexagonalPrism);
        assert_eq!(primitives[1].scale, 2.0);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let too_many = r#"{ "primitives": [ { "kind": "sphere", "parameters": [1, 2, 3, 4] } ] }"#;
        let scene = SceneFile::from_json(too_many).unwrap();
        assert!(matches!(scene.registry(), Err(Error::SceneFile(_))));

        let negative = r#"{ "primitives": [ { "kind": "sphere", "parameters": [-1] } ] }"#;
        let scene = SceneFile::from_json(negative).unwrap();
        assert!(matches!(scene.registry(), Err(Error::Sdf(_))));

        assert!(matches!(
            SceneFile::from_json(r#"{ "primitives": [ { "kind": "cone" } ] }"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            SceneFile::from_json(r#"{ "settings": { "steps": 0 } }"#),
            Err(Error::Sdf(_))
        ));
    }

    #[test]
    fn test_quaternion_wins_over_euler() {
        let entry = PrimitiveEntry {
            rotation: Some([0.0, 0.0, 0.0, 1.0]),
            euler_degrees: Some([90.0, 0.0, 0.0]),
            ..Default::default()
        };
        assert_eq!(entry.rotation(), Quat::IDENTITY);

        let euler = PrimitiveEntry::default().with_euler_degrees([0.0, 90.0, 0.0]);
        let rotated = euler.rotation() * Vec3::X;
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_camera_from_file() {
        let scene = SceneFile::from_json(
            r#"{ "camera": { "position": [0, 1, 5], "fov_degrees": 90 } }"#,
        )
        .unwrap();
        let camera = scene.camera(2.0);

        assert_eq!(camera.position, Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.aspect, 2.0);
        assert_relative_eq!(camera.fov, std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_demo_survives_json() {
        let demo = SceneFile::demo();
        let parsed = SceneFile::from_json(&demo.to_json().unwrap()).unwrap();

        assert_eq!(parsed, demo);
        assert_eq!(parsed.registry().unwrap().live_count(), 9);
    }

    #[test]
    fn test_into_raymarcher_carries_settings() {
        let demo = SceneFile::demo();
        let settings = demo.settings.clone();
        let host = demo.into_raymarcher().unwrap();

        assert_eq!(host.settings, settings);
        assert_eq!(host.registry().live_count(), 9);
        assert!(!host.has_backend());
    }
}
