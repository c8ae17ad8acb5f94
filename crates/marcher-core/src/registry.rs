//! Ordered registry of raymarched objects
//!
//! Slots may be empty: removing an object leaves a hole so that the handles
//! of the remaining objects stay valid. Empty slots are skipped whenever the
//! descriptors are collected for rendering. Every mutation gives the
//! registry a new revision which the primitive buffer compares against to
//! decide whether a re-upload is due.

use std::sync::atomic::{AtomicU64, Ordering};

use marcher_sdf::{Material, Placement, Primitive, PrimitiveKind};

/// Source of revisions, shared by every registry in the process
///
/// Starts at 1 so that a buffer which never synced (revision 0) never
/// matches. Two registries therefore never report the same revision unless
/// one is a clone of the other.
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Index of a slot in a [`PrimitiveRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveHandle(pub usize);

/// A primitive together with the world placement it was derived from
///
/// The descriptor's inverse transform and scale are refreshed whenever the
/// placement changes, so they can never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct RaymarchObject {
    placement: Placement,
    primitive: Primitive,
}

impl RaymarchObject {
    pub fn new(primitive: Primitive) -> Self {
        Self::with_placement(primitive, Placement::default())
    }

    pub fn with_placement(mut primitive: Primitive, placement: Placement) -> Self {
        primitive.apply_placement(&placement);
        Self {
            placement,
            primitive,
        }
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
        self.primitive.apply_placement(&placement);
    }

    /// Change the shape kind, resetting the parameters to that kind's defaults
    pub fn set_kind(&mut self, kind: PrimitiveKind) {
        if self.primitive.kind != kind {
            self.primitive.kind = kind;
            self.primitive.parameters = kind.default_parameters();
        }
    }

    pub fn set_parameters(&mut self, parameters: [f32; 3]) {
        self.primitive.parameters = parameters;
    }

    pub fn set_material(&mut self, material: Material) {
        self.primitive.material = material;
    }
}

impl From<Primitive> for RaymarchObject {
    fn from(primitive: Primitive) -> Self {
        Self::new(primitive)
    }
}

/// Ordered, hole-tolerant list of raymarched objects
#[derive(Debug, Clone)]
pub struct PrimitiveRegistry {
    slots: Vec<Option<RaymarchObject>>,
    revision: u64,
}

impl Default for PrimitiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            revision: next_revision(),
        }
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }

    /// Process-unique stamp of the current contents, renewed by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Append an object, returning its handle
    pub fn push(&mut self, object: impl Into<RaymarchObject>) -> PrimitiveHandle {
        self.slots.push(Some(object.into()));
        self.touch();
        PrimitiveHandle(self.slots.len() - 1)
    }

    /// Append an empty slot
    pub fn push_empty(&mut self) -> PrimitiveHandle {
        self.slots.push(None);
        self.touch();
        PrimitiveHandle(self.slots.len() - 1)
    }

    /// Insert an object at `index`, shifting later slots back by one
    ///
    /// Indices past the end append. Handles to shifted slots now refer to
    /// their predecessors.
    pub fn insert(&mut self, index: usize, object: impl Into<RaymarchObject>) -> PrimitiveHandle {
        let index = index.min(self.slots.len());
        self.slots.insert(index, Some(object.into()));
        self.touch();
        PrimitiveHandle(index)
    }

    /// Take an object out, leaving its slot empty
    pub fn remove(&mut self, handle: PrimitiveHandle) -> Option<RaymarchObject> {
        let removed = self.slots.get_mut(handle.0)?.take();
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Drop every empty slot. Invalidates handles past the first hole.
    pub fn compact(&mut self) {
        let before = self.slots.len();
        self.slots.retain(Option::is_some);
        if self.slots.len() != before {
            self.touch();
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.touch();
    }

    pub fn get(&self, handle: PrimitiveHandle) -> Option<&RaymarchObject> {
        self.slots.get(handle.0)?.as_ref()
    }

    /// Mutable access; counts as a change whether or not anything is written
    pub fn get_mut(&mut self, handle: PrimitiveHandle) -> Option<&mut RaymarchObject> {
        if self.get(handle).is_some() {
            self.touch();
        }
        self.slots.get_mut(handle.0)?.as_mut()
    }

    /// Move an object. Returns `false` for empty or unknown handles.
    pub fn set_placement(&mut self, handle: PrimitiveHandle, placement: Placement) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.set_placement(placement);
                true
            }
            None => false,
        }
    }

    /// Number of slots, empty ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Occupied slots in order
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveHandle, &RaymarchObject)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|object| (PrimitiveHandle(index), object)))
    }

    /// Descriptors of every occupied slot, in slot order
    pub fn collect(&self) -> Vec<Primitive> {
        self.iter().map(|(_, object)| *object.primitive()).collect()
    }
}

impl<T: Into<RaymarchObject>> FromIterator<T> for PrimitiveRegistry {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().map(|object| Some(object.into())).collect(),
            revision: next_revision(),
        }
    }
}
