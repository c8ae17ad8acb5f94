//! GPU record layout for the primitive buffer
//!
//! This struct must match the WGSL `Primitive` struct layout exactly
//! (std430, 16-byte aligned, 128 bytes per record).

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::{Material, Primitive, PrimitiveKind, SdfError};

/// Size in bytes of one [`GpuPrimitive`] record
pub const GPU_PRIMITIVE_SIZE: usize = 128;

/// GPU-ready primitive record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPrimitive {
    /// Inverse placement, column major
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub specular_color: [f32; 4],
    pub parameters: [f32; 3],
    pub scale: f32,
    pub kind: u32,
    pub shininess: f32,
    pub _pad: [u32; 2],
}

const _: () = assert!(std::mem::size_of::<GpuPrimitive>() == GPU_PRIMITIVE_SIZE);

impl From<&Primitive> for GpuPrimitive {
    fn from(primitive: &Primitive) -> Self {
        Self {
            transform: primitive.transform.to_cols_array_2d(),
            color: primitive.material.color,
            specular_color: primitive.material.specular_color,
            parameters: primitive.parameters,
            scale: primitive.scale,
            kind: primitive.kind.tag(),
            shininess: primitive.material.shininess,
            _pad: [0; 2],
        }
    }
}

impl TryFrom<&GpuPrimitive> for Primitive {
    type Error = SdfError;

    fn try_from(record: &GpuPrimitive) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: PrimitiveKind::try_from(record.kind)?,
            transform: Mat4::from_cols_array_2d(&record.transform),
            scale: record.scale,
            parameters: record.parameters,
            material: Material {
                color: record.color,
                shininess: record.shininess,
                specular_color: record.specular_color,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Placement, torus};
    use glam::Vec3;

    #[test]
    fn test_field_offsets() {
        assert_eq!(std::mem::offset_of!(GpuPrimitive, color), 64);
        assert_eq!(std::mem::offset_of!(GpuPrimitive, specular_color), 80);
        assert_eq!(std::mem::offset_of!(GpuPrimitive, parameters), 96);
        assert_eq!(std::mem::offset_of!(GpuPrimitive, scale), 108);
        assert_eq!(std::mem::offset_of!(GpuPrimitive, kind), 112);
        assert_eq!(std::mem::offset_of!(GpuPrimitive, shininess), 116);
    }

    #[test]
    fn test_record_carries_descriptor() {
        let primitive = torus(1.0, 0.2)
            .with_color([0.1, 0.2, 0.3, 1.0])
            .placed(&Placement::at(Vec3::new(0.0, 1.0, 0.0)).with_uniform_scale(2.0));
        let record = GpuPrimitive::from(&primitive);

        assert_eq!(record.kind, 6);
        assert_eq!(record.scale, 2.0);
        assert_eq!(record.parameters, [1.0, 0.2, 0.0]);
        // Column 3 holds the inverse translation
        assert_eq!(record.transform[3][1], -1.0);

        let decoded = Primitive::try_from(&record);
        assert_eq!(decoded, Ok(primitive));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let record = GpuPrimitive {
            kind: 42,
            ..GpuPrimitive::zeroed()
        };
        assert_eq!(
            Primitive::try_from(&record),
            Err(SdfError::UnknownKind(42))
        );
    }
}
