//! Render settings for the raymarcher
//!
//! Settings split into two groups. Scalar knobs (step budget, distances,
//! shadow and occlusion strengths) are uploaded as uniforms every frame.
//! Feature toggles (normal estimator, shadow mode, on/off switches) are
//! baked into the shader as constants, see [`ShaderFeatures`].

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::SdfError;

/// How surface normals are estimated from the distance field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalMode {
    /// Three extra samples, one-sided differences
    ForwardDifferences,
    /// Six extra samples, symmetric differences
    #[default]
    CentralDifferences,
    /// Four samples on the corners of a tetrahedron
    Tetrahedron,
}

impl NormalMode {
    pub const ALL: [NormalMode; 3] = [
        NormalMode::ForwardDifferences,
        NormalMode::CentralDifferences,
        NormalMode::Tetrahedron,
    ];

    /// Value of the `NORMALS_MODE` shader constant
    pub fn shader_value(self) -> u32 {
        match self {
            NormalMode::ForwardDifferences => 0,
            NormalMode::CentralDifferences => 1,
            NormalMode::Tetrahedron => 2,
        }
    }

    /// The next mode, wrapping around
    pub fn next(self) -> Self {
        match self {
            NormalMode::ForwardDifferences => NormalMode::CentralDifferences,
            NormalMode::CentralDifferences => NormalMode::Tetrahedron,
            NormalMode::Tetrahedron => NormalMode::ForwardDifferences,
        }
    }
}

/// Shadow evaluation toward the directional light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowMode {
    Off,
    Hard,
    #[default]
    Soft,
    /// Soft shadows with penumbra triangulation between steps
    SoftImproved,
}

impl ShadowMode {
    pub const ALL: [ShadowMode; 4] = [
        ShadowMode::Off,
        ShadowMode::Hard,
        ShadowMode::Soft,
        ShadowMode::SoftImproved,
    ];

    /// Value of the `SHADOW_MODE` shader constant
    pub fn shader_value(self) -> u32 {
        match self {
            ShadowMode::Off => 0,
            ShadowMode::Hard => 1,
            ShadowMode::Soft => 2,
            ShadowMode::SoftImproved => 3,
        }
    }

    pub fn next(self) -> Self {
        match self {
            ShadowMode::Off => ShadowMode::Hard,
            ShadowMode::Hard => ShadowMode::Soft,
            ShadowMode::Soft => ShadowMode::SoftImproved,
            ShadowMode::SoftImproved => ShadowMode::Off,
        }
    }
}

/// Where the ambient term takes its color from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientSource {
    /// [`RenderSettings::ambient_color`]
    #[default]
    Fixed,
    /// [`RenderSettings::sky_color`]
    Sky,
}

/// The single directional light used for diffuse, specular and shadows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    /// Direction pointing toward the light (will be normalized)
    pub direction: [f32; 3],
    /// Light color (RGB, 0-1)
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        // Warm sun from upper right
        Self {
            direction: [0.8, 0.4, 0.6],
            color: [1.0, 0.95, 0.85],
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// Unit vector toward the light, straight up when the direction is degenerate
    pub fn normalized_direction(&self) -> Vec3 {
        Vec3::from_array(self.direction)
            .try_normalize()
            .unwrap_or(Vec3::Y)
    }

    /// Color premultiplied by intensity
    pub fn radiance(&self) -> Vec3 {
        Vec3::from_array(self.color) * self.intensity
    }
}

/// Everything that controls how a frame is raymarched and lit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // Raymarching
    /// Maximum march iterations per ray (also bounds shadow marches)
    pub steps: u32,
    /// Distance below which a sample counts as a surface hit
    pub min_distance: f32,
    /// Ray length after which a ray counts as a miss
    pub max_distance: f32,
    /// Sample offset used by the normal estimators
    pub normal_offset: f32,
    /// Output the step count as grey instead of shading
    pub debug_steps: bool,

    // Lighting
    pub normals: NormalMode,
    pub ambient: bool,
    pub ambient_source: AmbientSource,
    /// Fixed ambient color (RGBA, 0-1)
    pub ambient_color: [f32; 4],
    /// Sky ambient color (RGBA, 0-1)
    pub sky_color: [f32; 4],
    pub specular: bool,
    pub light: DirectionalLight,

    // Shadows
    pub shadows: ShadowMode,
    /// Start and end of the shadow ray
    pub shadow_distance: [f32; 2],
    /// Exponent applied to the shadow factor, 0-4
    pub shadow_intensity: f32,
    /// Penumbra sharpness for soft shadows, 1-128
    pub shadow_penumbra: f32,

    // Ambient occlusion
    pub ambient_occlusion: bool,
    /// Distance between occlusion samples, 0.01-10
    pub ao_step_size: f32,
    /// Number of occlusion samples, 1-5
    pub ao_iterations: u32,
    /// Occlusion strength, 0-1
    pub ao_intensity: f32,

    /// Fill color for frames rendered without a source image (RGBA, 0-1)
    pub background: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            steps: 64,
            min_distance: 0.01,
            max_distance: 1000.0,
            normal_offset: 0.01,
            debug_steps: false,

            normals: NormalMode::CentralDifferences,
            ambient: true,
            ambient_source: AmbientSource::Fixed,
            ambient_color: [0.212, 0.227, 0.259, 1.0],
            sky_color: [0.3, 0.5, 0.8, 1.0],
            specular: true,
            light: DirectionalLight::default(),

            shadows: ShadowMode::Soft,
            shadow_distance: [0.1, 100.0],
            shadow_intensity: 1.0,
            shadow_penumbra: 1.0,

            ambient_occlusion: true,
            ao_step_size: 0.1,
            ao_iterations: 1,
            ao_intensity: 0.0,

            background: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

const SHADOW_INTENSITY_RANGE: (f32, f32) = (0.0, 4.0);
const SHADOW_PENUMBRA_RANGE: (f32, f32) = (1.0, 128.0);
const AO_STEP_SIZE_RANGE: (f32, f32) = (0.01, 10.0);
const AO_ITERATIONS_RANGE: (u32, u32) = (1, 5);
const AO_INTENSITY_RANGE: (f32, f32) = (0.0, 1.0);

fn check_range(name: &str, value: f32, (lo, hi): (f32, f32)) -> Result<(), SdfError> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(SdfError::InvalidSettings(format!(
            "{} must be within {}..={}, got {}",
            name, lo, hi, value
        )))
    }
}

fn check_positive(name: &str, value: f32) -> Result<(), SdfError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SdfError::InvalidSettings(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

impl RenderSettings {
    /// The compile-time branches these settings select
    pub fn features(&self) -> ShaderFeatures {
        ShaderFeatures {
            debug_steps: self.debug_steps,
            normals: self.normals,
            ambient: self.ambient,
            specular: self.specular,
            shadows: self.shadows,
            ambient_occlusion: self.ambient_occlusion,
        }
    }

    /// Ambient color after resolving [`AmbientSource`]
    pub fn resolved_ambient_color(&self) -> [f32; 4] {
        match self.ambient_source {
            AmbientSource::Fixed => self.ambient_color,
            AmbientSource::Sky => self.sky_color,
        }
    }

    pub fn validate(&self) -> Result<(), SdfError> {
        if self.steps == 0 {
            return Err(SdfError::InvalidSettings(
                "steps must be at least 1".to_string(),
            ));
        }
        check_positive("min_distance", self.min_distance)?;
        check_positive("max_distance", self.max_distance)?;
        if self.max_distance <= self.min_distance {
            return Err(SdfError::InvalidSettings(format!(
                "max_distance ({}) must exceed min_distance ({})",
                self.max_distance, self.min_distance
            )));
        }
        check_positive("normal_offset", self.normal_offset)?;

        let [shadow_start, shadow_end] = self.shadow_distance;
        if !(shadow_start.is_finite() && shadow_end.is_finite())
            || shadow_start < 0.0
            || shadow_end <= shadow_start
        {
            return Err(SdfError::InvalidSettings(format!(
                "shadow_distance must satisfy 0 <= start < end, got {:?}",
                self.shadow_distance
            )));
        }
        check_range(
            "shadow_intensity",
            self.shadow_intensity,
            SHADOW_INTENSITY_RANGE,
        )?;
        check_range("shadow_penumbra", self.shadow_penumbra, SHADOW_PENUMBRA_RANGE)?;

        check_range("ao_step_size", self.ao_step_size, AO_STEP_SIZE_RANGE)?;
        if !(AO_ITERATIONS_RANGE.0..=AO_ITERATIONS_RANGE.1).contains(&self.ao_iterations) {
            return Err(SdfError::InvalidSettings(format!(
                "ao_iterations must be within {}..={}, got {}",
                AO_ITERATIONS_RANGE.0, AO_ITERATIONS_RANGE.1, self.ao_iterations
            )));
        }
        check_range("ao_intensity", self.ao_intensity, AO_INTENSITY_RANGE)?;

        if !self.light.intensity.is_finite() || self.light.intensity < 0.0 {
            return Err(SdfError::InvalidSettings(format!(
                "light intensity must be a non-negative number, got {}",
                self.light.intensity
            )));
        }
        Ok(())
    }

    /// Copy with every ranged knob pulled into its valid range
    pub fn clamped(&self) -> Self {
        let mut settings = self.clone();
        settings.steps = settings.steps.max(1);
        settings.shadow_intensity = settings
            .shadow_intensity
            .clamp(SHADOW_INTENSITY_RANGE.0, SHADOW_INTENSITY_RANGE.1);
        settings.shadow_penumbra = settings
            .shadow_penumbra
            .clamp(SHADOW_PENUMBRA_RANGE.0, SHADOW_PENUMBRA_RANGE.1);
        settings.ao_step_size = settings
            .ao_step_size
            .clamp(AO_STEP_SIZE_RANGE.0, AO_STEP_SIZE_RANGE.1);
        settings.ao_iterations = settings
            .ao_iterations
            .clamp(AO_ITERATIONS_RANGE.0, AO_ITERATIONS_RANGE.1);
        settings.ao_intensity = settings
            .ao_intensity
            .clamp(AO_INTENSITY_RANGE.0, AO_INTENSITY_RANGE.1);
        settings
    }
}

/// Feature toggles compiled into the shader
///
/// Every group is a bool or an enum, so at most one member of a group can be
/// active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderFeatures {
    pub debug_steps: bool,
    pub normals: NormalMode,
    pub ambient: bool,
    pub specular: bool,
    pub shadows: ShadowMode,
    pub ambient_occlusion: bool,
}

impl Default for ShaderFeatures {
    fn default() -> Self {
        RenderSettings::default().features()
    }
}

/// GPU-ready settings uniforms
/// This struct must match the WGSL `Settings` struct layout exactly
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SettingsUniforms {
    pub ambient_color: [f32; 4],
    pub background: [f32; 4],

    // Lighting (vec4 aligned)
    pub light_direction: [f32; 3],
    pub light_intensity: f32,
    pub light_color: [f32; 3],
    pub steps: u32,

    // Raymarching
    pub min_distance: f32,
    pub max_distance: f32,
    pub normal_offset: f32,
    pub shadow_intensity: f32,

    // Shadows and occlusion
    pub shadow_distance: [f32; 2],
    pub shadow_penumbra: f32,
    pub ao_step_size: f32,
    pub ao_iterations: u32,
    pub ao_intensity: f32,

    /// Number of live records in the primitive buffer
    pub primitive_count: u32,
    pub _pad: u32,
}

impl SettingsUniforms {
    pub fn new(settings: &RenderSettings, primitive_count: u32) -> Self {
        Self {
            ambient_color: settings.resolved_ambient_color(),
            background: settings.background,
            light_direction: settings.light.normalized_direction().to_array(),
            light_intensity: settings.light.intensity,
            light_color: settings.light.color,
            steps: settings.steps,
            min_distance: settings.min_distance,
            max_distance: settings.max_distance,
            normal_offset: settings.normal_offset,
            shadow_intensity: settings.shadow_intensity,
            shadow_distance: settings.shadow_distance,
            shadow_penumbra: settings.shadow_penumbra,
            ao_step_size: settings.ao_step_size,
            ao_iterations: settings.ao_iterations,
            ao_intensity: settings.ao_intensity,
            primitive_count,
            _pad: 0,
        }
    }
}

impl Default for SettingsUniforms {
    fn default() -> Self {
        SettingsUniforms::new(&RenderSettings::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cases: Vec<Box<dyn Fn(&mut RenderSettings)>> = vec![
            Box::new(|s| s.steps = 0),
            Box::new(|s| s.min_distance = 0.0),
            Box::new(|s| s.max_distance = 0.005),
            Box::new(|s| s.normal_offset = f32::NAN),
            Box::new(|s| s.shadow_distance = [5.0, 1.0]),
            Box::new(|s| s.shadow_intensity = 4.5),
            Box::new(|s| s.shadow_penumbra = 0.5),
            Box::new(|s| s.ao_step_size = 0.0),
            Box::new(|s| s.ao_iterations = 6),
            Box::new(|s| s.ao_intensity = -0.1),
            Box::new(|s| s.light.intensity = -1.0),
        ];

        for (index, mutate) in cases.iter().enumerate() {
            let mut settings = RenderSettings::default();
            mutate(&mut settings);
            assert!(settings.validate().is_err(), "case {} should fail", index);
        }
    }

    #[test]
    fn test_clamped_is_valid() {
        let settings = RenderSettings {
            shadow_intensity: 10.0,
            shadow_penumbra: 0.0,
            ao_step_size: 100.0,
            ao_iterations: 0,
            ao_intensity: 2.0,
            ..Default::default()
        };
        let clamped = settings.clamped();
        assert!(clamped.validate().is_ok());
        assert_relative_eq!(clamped.shadow_intensity, 4.0);
        assert_eq!(clamped.ao_iterations, 1);
    }

    #[test]
    fn test_ambient_source() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.resolved_ambient_color(), settings.ambient_color);
        settings.ambient_source = AmbientSource::Sky;
        assert_eq!(settings.resolved_ambient_color(), settings.sky_color);
    }

    #[test]
    fn test_mode_cycles_visit_every_mode() {
        let mut normals = NormalMode::default();
        for _ in 0..NormalMode::ALL.len() {
            normals = normals.next();
        }
        assert_eq!(normals, NormalMode::default());

        let mut shadows = ShadowMode::Off;
        let mut seen = Vec::new();
        for _ in 0..ShadowMode::ALL.len() {
            seen.push(shadows.shader_value());
            shadows = shadows.next();
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<SettingsUniforms>(), 112);
        assert_eq!(std::mem::offset_of!(SettingsUniforms, light_direction), 32);
        assert_eq!(std::mem::offset_of!(SettingsUniforms, min_distance), 64);
        assert_eq!(std::mem::offset_of!(SettingsUniforms, shadow_distance), 80);
        assert_eq!(std::mem::offset_of!(SettingsUniforms, primitive_count), 104);
    }

    #[test]
    fn test_light_direction_is_normalized() {
        let uniforms = SettingsUniforms::default();
        let dir = Vec3::from_array(uniforms.light_direction);
        assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-6);

        let degenerate = DirectionalLight {
            direction: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        assert_eq!(degenerate.normalized_direction(), Vec3::Y);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "steps": 128, "shadows": "soft_improved" }"#)
                .expect("settings should parse");
        assert_eq!(settings.steps, 128);
        assert_eq!(settings.shadows, ShadowMode::SoftImproved);
        assert_eq!(settings.normals, NormalMode::CentralDifferences);
    }
}
