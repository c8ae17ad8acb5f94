//! Flat primitive buffer mirrored from the registry
//!
//! The buffer is rebuilt wholesale whenever the registry revision differs
//! from the one it was last built from. There are no partial updates.

use marcher_sdf::{GPU_PRIMITIVE_SIZE, GpuPrimitive, Primitive};
use tracing::debug;

use crate::registry::PrimitiveRegistry;

/// Ordered primitive descriptors plus their packed GPU records
#[derive(Debug, Clone, Default)]
pub struct PrimitiveBuffer {
    primitives: Vec<Primitive>,
    records: Vec<GpuPrimitive>,
    revision: u64,
}

impl PrimitiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the registry if it changed since the last sync
    ///
    /// Returns `true` when the contents were replaced.
    pub fn sync(&mut self, registry: &PrimitiveRegistry) -> bool {
        if registry.revision() == self.revision {
            return false;
        }

        self.primitives = registry.collect();
        self.records = self.primitives.iter().map(GpuPrimitive::from).collect();
        self.revision = registry.revision();

        debug!(
            count = self.records.len(),
            bytes = self.size_bytes(),
            revision = self.revision,
            "Rebuilt primitive buffer"
        );
        true
    }

    /// Registry revision the contents were built from
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the packed records; zero for an empty list
    pub fn size_bytes(&self) -> usize {
        self.records.len() * GPU_PRIMITIVE_SIZE
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn records(&self) -> &[GpuPrimitive] {
        &self.records
    }

    /// Packed records ready for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PrimitiveHandle;
    use glam::Vec3;
    use marcher_sdf::Placement;
    use marcher_sdf::primitive::{box3, sphere};

    #[test]
    fn test_sync_only_on_change() {
        let mut registry = PrimitiveRegistry::new();
        registry.push(sphere(1.0));
        let mut buffer = PrimitiveBuffer::new();

        assert!(buffer.sync(&registry));
        assert!(!buffer.sync(&registry));

        registry.set_placement(PrimitiveHandle(0), Placement::at(Vec3::Y));
        assert!(buffer.sync(&registry));
        assert_eq!(buffer.revision(), registry.revision());
    }

    #[test]
    fn test_fresh_empty_registry_still_syncs() {
        let registry = PrimitiveRegistry::new();
        let mut buffer = PrimitiveBuffer::new();

        assert!(buffer.sync(&registry));
        assert!(buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 0);
        assert!(buffer.as_bytes().is_empty());
    }

    #[test]
    fn test_records_are_fixed_size() {
        let mut registry = PrimitiveRegistry::new();
        registry.push(sphere(1.0));
        registry.push_empty();
        registry.push(box3(1.0, 2.0, 3.0));

        let mut buffer = PrimitiveBuffer::new();
        buffer.sync(&registry);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size_bytes(), 2 * GPU_PRIMITIVE_SIZE);
        assert_eq!(buffer.as_bytes().len(), buffer.size_bytes());
        assert_eq!(buffer.records()[1].parameters, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_removal_shrinks_buffer() {
        let mut registry = PrimitiveRegistry::new();
        let first = registry.push(sphere(1.0));
        registry.push(sphere(2.0));
        let mut buffer = PrimitiveBuffer::new();
        buffer.sync(&registry);

        registry.remove(first);
        assert!(buffer.sync(&registry));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.primitives()[0].parameters[0], 2.0);
    }
}
