//! CPU raymarch kernel
//!
//! A straight port of the fragment shader in the WGSL template: same march
//! loop, normal estimators, shadow modes, occlusion and lighting. Each pixel
//! is independent, so rows are split across the rayon pool.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use image::{Rgba, RgbaImage};
use marcher_sdf::{FAR_AWAY, NormalMode, Primitive, RenderSettings, ShadowMode};
use rayon::prelude::*;

use crate::camera::{Camera, ray_through};
use crate::sdf::{SurfaceSample, evaluate_union, union_distance};

/// Guards divisions by the distance travelled along shadow rays
const MIN_TRAVEL: f32 = 1.0e-4;

/// Outcome of marching one ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    pub hit: bool,
    /// Distance along the ray where the march stopped
    pub travelled: f32,
    /// Number of distance evaluations spent
    pub iterations: u32,
}

/// Raymarching state shared by every pixel of a frame
#[derive(Debug, Clone, Copy)]
pub struct Kernel<'a> {
    primitives: &'a [Primitive],
    settings: &'a RenderSettings,
    light_direction: Vec3,
    radiance: Vec3,
    ambient_color: Vec3,
}

impl<'a> Kernel<'a> {
    pub fn new(primitives: &'a [Primitive], settings: &'a RenderSettings) -> Self {
        Self {
            primitives,
            settings,
            light_direction: settings.light.normalized_direction(),
            radiance: settings.light.radiance(),
            ambient_color: Vec4::from_array(settings.resolved_ambient_color()).xyz(),
        }
    }

    /// Union distance at `p`
    pub fn distance(&self, p: Vec3) -> f32 {
        union_distance(self.primitives, p)
    }

    /// Step along the ray by the scene distance until it hits or runs out
    pub fn march(&self, origin: Vec3, direction: Vec3) -> MarchResult {
        let mut t = 0.0;
        let mut iterations = 0;
        for i in 0..self.settings.steps {
            iterations = i + 1;
            let d = self.distance(origin + direction * t);
            if d < self.settings.min_distance {
                return MarchResult {
                    hit: true,
                    travelled: t,
                    iterations,
                };
            }
            t += d;
            if t > self.settings.max_distance {
                break;
            }
        }
        MarchResult {
            hit: false,
            travelled: t,
            iterations,
        }
    }

    /// Surface normal using the configured finite-difference estimator
    pub fn estimate_normal(&self, p: Vec3) -> Vec3 {
        let h = self.settings.normal_offset;
        let f = |q: Vec3| self.distance(q);

        let gradient = match self.settings.normals {
            NormalMode::ForwardDifferences => {
                let d = f(p);
                Vec3::new(
                    f(p + Vec3::X * h) - d,
                    f(p + Vec3::Y * h) - d,
                    f(p + Vec3::Z * h) - d,
                )
            }
            NormalMode::CentralDifferences => Vec3::new(
                f(p + Vec3::X * h) - f(p - Vec3::X * h),
                f(p + Vec3::Y * h) - f(p - Vec3::Y * h),
                f(p + Vec3::Z * h) - f(p - Vec3::Z * h),
            ),
            NormalMode::Tetrahedron => {
                let k0 = Vec3::new(1.0, -1.0, -1.0);
                let k1 = Vec3::new(-1.0, -1.0, 1.0);
                let k2 = Vec3::new(-1.0, 1.0, -1.0);
                let k3 = Vec3::ONE;
                k0 * f(p + k0 * h) + k1 * f(p + k1 * h) + k2 * f(p + k2 * h) + k3 * f(p + k3 * h)
            }
        };
        gradient.normalize_or(Vec3::Y)
    }

    fn hard_shadow(&self, origin: Vec3, direction: Vec3) -> f32 {
        let [start, end] = self.settings.shadow_distance;
        let mut t = start;
        for _ in 0..self.settings.steps {
            if t >= end {
                break;
            }
            let h = self.distance(origin + direction * t);
            if h < self.settings.min_distance {
                return 0.0;
            }
            t += h;
        }
        1.0
    }

    fn soft_shadow(&self, origin: Vec3, direction: Vec3) -> f32 {
        let [start, end] = self.settings.shadow_distance;
        let k = self.settings.shadow_penumbra;
        let mut res: f32 = 1.0;
        let mut t = start;
        for _ in 0..self.settings.steps {
            if t >= end {
                break;
            }
            let h = self.distance(origin + direction * t);
            if h < self.settings.min_distance {
                return 0.0;
            }
            res = res.min(k * h / t.max(MIN_TRAVEL));
            t += h;
        }
        res.clamp(0.0, 1.0)
    }

    /// Soft shadow that triangulates the closest approach between steps
    fn soft_shadow_improved(&self, origin: Vec3, direction: Vec3) -> f32 {
        let [start, end] = self.settings.shadow_distance;
        let k = self.settings.shadow_penumbra;
        let mut res: f32 = 1.0;
        let mut previous = FAR_AWAY;
        let mut t = start;
        for _ in 0..self.settings.steps {
            if t >= end {
                break;
            }
            let h = self.distance(origin + direction * t);
            if h < self.settings.min_distance {
                return 0.0;
            }
            let y = h * h / (2.0 * previous);
            let d = (h * h - y * y).max(0.0).sqrt();
            res = res.min(k * d / (t - y).max(MIN_TRAVEL));
            previous = h;
            t += h;
        }
        res.clamp(0.0, 1.0)
    }

    /// Light visibility in `0..=1`; `1` when shadows are off
    pub fn shadow(&self, origin: Vec3, direction: Vec3) -> f32 {
        let res = match self.settings.shadows {
            ShadowMode::Off => return 1.0,
            ShadowMode::Hard => self.hard_shadow(origin, direction),
            ShadowMode::Soft => self.soft_shadow(origin, direction),
            ShadowMode::SoftImproved => self.soft_shadow_improved(origin, direction),
        };
        if self.settings.shadow_intensity <= 0.0 || res >= 1.0 {
            return 1.0;
        }
        if res <= 0.0 {
            return 0.0;
        }
        res.powf(self.settings.shadow_intensity)
    }

    /// Occlusion factor in `0..=1`, `1` meaning fully open
    pub fn ambient_occlusion(&self, p: Vec3, n: Vec3) -> f32 {
        let step = self.settings.ao_step_size;
        let mut occlusion = 0.0;
        for i in 1..=self.settings.ao_iterations {
            let offset = step * i as f32;
            occlusion += ((offset - self.distance(p + n * offset)) / offset).max(0.0);
        }
        (1.0 - occlusion * self.settings.ao_intensity).clamp(0.0, 1.0)
    }

    /// Lit color of a surface sample
    pub fn shade(&self, p: Vec3, n: Vec3, view_dir: Vec3, surface: &SurfaceSample) -> Vec3 {
        let settings = self.settings;
        let l = self.light_direction;
        let albedo = Vec4::from_array(surface.material.color).xyz();

        let mut color = albedo * self.radiance * n.dot(l).max(0.0);
        if settings.specular {
            let half_dir = (l + view_dir).normalize_or(Vec3::Y);
            let facing = n.dot(half_dir).max(0.0);
            if facing > 0.0 {
                let specular = Vec4::from_array(surface.material.specular_color).xyz();
                color += specular * self.radiance * facing.powf(surface.material.shininess);
            }
        }

        if settings.shadows != ShadowMode::Off {
            color *= self.shadow(p + n * settings.min_distance * 2.0, l);
        }
        if settings.ambient {
            color += self.ambient_color * albedo;
        }
        if settings.ambient_occlusion {
            color *= self.ambient_occlusion(p, n);
        }
        color
    }

    /// Color for one ray, `None` when it misses and the source shows through
    pub fn trace(&self, origin: Vec3, direction: Vec3) -> Option<Vec4> {
        let result = self.march(origin, direction);

        if self.settings.debug_steps {
            let grey = result.iterations as f32 / self.settings.steps.max(1) as f32;
            return Some(Vec4::new(grey, grey, grey, 1.0));
        }
        if !result.hit {
            return None;
        }

        let p = origin + direction * result.travelled;
        let surface = evaluate_union(self.primitives, p)?;
        let n = self.estimate_normal(p);
        Some(self.shade(p, n, -direction, &surface).extend(1.0))
    }
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

/// Raymarch a full frame over `source`, which supplies every missed pixel
///
/// The output has the source's dimensions.
pub fn render_cpu(
    primitives: &[Primitive],
    settings: &RenderSettings,
    camera: &Camera,
    source: &RgbaImage,
) -> RgbaImage {
    let (width, height) = source.dimensions();
    let mut output = source.clone();
    if width == 0 || height == 0 {
        return output;
    }

    let kernel = Kernel::new(primitives, settings);
    let corners = camera.world_frustum_corners();
    let origin = camera.position;
    let resolution = Vec2::new(width as f32, height as f32);
    let row_len = width as usize * 4;

    output
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / resolution;
                let ray = ray_through(origin, corners, uv.x, 1.0 - uv.y);
                if let Some(color) = kernel.trace(ray.origin, ray.direction) {
                    pixel.copy_from_slice(&to_rgba8(color).0);
                }
            }
        });

    output
}
