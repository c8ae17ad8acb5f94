//! WGSL shader generation
//!
//! The raymarch shader is a fixed template; only the feature constants
//! between the `FEATURES` markers change from one build to the next.

// String writing is infallible, so .unwrap() is safe here
#![allow(clippy::unwrap_used)]

use std::fmt::Write;

use crate::ShaderFeatures;

const FEATURES_BEGIN: &str = "// FEATURES BEGIN";
const FEATURES_END: &str = "// FEATURES END";

/// Get the base raymarching shader template
pub fn get_base_shader() -> &'static str {
    include_str!("shaders/raymarch.wgsl")
}

/// Render the feature constants block, markers included
fn features_block(features: &ShaderFeatures) -> String {
    let mut code = String::new();
    writeln!(code, "{FEATURES_BEGIN}").unwrap();
    writeln!(code, "const DEBUG_STEPS: bool = {};", features.debug_steps).unwrap();
    writeln!(
        code,
        "const NORMALS_MODE: u32 = {}u;",
        features.normals.shader_value()
    )
    .unwrap();
    writeln!(code, "const AMBIENT: bool = {};", features.ambient).unwrap();
    writeln!(code, "const SPECULAR: bool = {};", features.specular).unwrap();
    writeln!(
        code,
        "const SHADOW_MODE: u32 = {}u;",
        features.shadows.shader_value()
    )
    .unwrap();
    writeln!(
        code,
        "const AMBIENT_OCCLUSION: bool = {};",
        features.ambient_occlusion
    )
    .unwrap();
    write!(code, "{FEATURES_END}").unwrap();
    code
}

/// Replace the feature constants in `base_shader`
///
/// Shaders without the marker pair get the block prepended.
pub fn inject_features(base_shader: &str, features: &ShaderFeatures) -> String {
    let block = features_block(features);

    let Some(start) = base_shader.find(FEATURES_BEGIN) else {
        return format!("{block}\n{base_shader}");
    };
    let Some(end) = base_shader[start..].find(FEATURES_END) else {
        return format!("{block}\n{base_shader}");
    };
    let end = start + end + FEATURES_END.len();

    let mut shader = String::with_capacity(base_shader.len() + block.len());
    shader.push_str(&base_shader[..start]);
    shader.push_str(&block);
    shader.push_str(&base_shader[end..]);
    shader
}

/// Build the complete shader for a feature set
pub fn build_shader(features: &ShaderFeatures) -> String {
    inject_features(get_base_shader(), features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NormalMode, ShadowMode};

    #[test]
    fn test_default_features_match_template() {
        // The template ships with the default feature set baked in
        let shader = build_shader(&ShaderFeatures::default());
        assert_eq!(shader, get_base_shader());
    }

    #[test]
    fn test_features_are_injected() {
        let features = ShaderFeatures {
            debug_steps: true,
            normals: NormalMode::Tetrahedron,
            ambient: false,
            specular: false,
            shadows: ShadowMode::Hard,
            ambient_occlusion: false,
        };
        let shader = build_shader(&features);

        assert!(shader.contains("const DEBUG_STEPS: bool = true;"));
        assert!(shader.contains("const NORMALS_MODE: u32 = 2u;"));
        assert!(shader.contains("const AMBIENT: bool = false;"));
        assert!(shader.contains("const SPECULAR: bool = false;"));
        assert!(shader.contains("const SHADOW_MODE: u32 = 1u;"));
        assert!(shader.contains("const AMBIENT_OCCLUSION: bool = false;"));
        assert_eq!(shader.matches("const DEBUG_STEPS").count(), 1);
    }

    #[test]
    fn test_injection_is_repeatable() {
        let features = ShaderFeatures {
            shadows: ShadowMode::Off,
            ..ShaderFeatures::default()
        };
        let once = build_shader(&features);
        let twice = inject_features(&once, &features);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_markers_prepend_block() {
        let shader = inject_features("fn main() {}", &ShaderFeatures::default());
        assert!(shader.starts_with(FEATURES_BEGIN));
        assert!(shader.ends_with("fn main() {}"));
    }
}
