//! # Registry
//!
//! The owned object store every kernel, validator and cortex function takes
//! as an explicit parameter. There is no global registry.
//!
//! All data structures use `BTreeMap` for deterministic ordering. Derived
//! views (parent map, snapshot sets) are recomputed on demand; nothing is
//! indexed incrementally.
//!
//! ## Change capture
//!
//! While a capture is open, the first mutable access to an object records
//! its pre-image (or `None` if the object did not exist yet). The session
//! turns those pre-images into forward/inverse operation pairs, or restores
//! them to roll back a rejected edit.

use crate::{GraphObject, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pre-images recorded during a capture: `None` means "did not exist".
pub type PreImages = BTreeMap<ObjectId, Option<GraphObject>>;

/// The id → object arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Object storage: ObjectId -> GraphObject
    objects: BTreeMap<ObjectId, GraphObject>,

    /// Next counter value for allocated ids
    next_id: u64,

    /// Open change capture, if any
    #[serde(skip)]
    capture: Option<PreImages>,
}

impl PartialEq for Registry {
    /// Structural equality: compares objects only, not allocator or capture state.
    fn eq(&self, other: &Self) -> bool {
        self.objects == other.objects
    }
}

impl Registry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from existing objects, keeping their ids.
    #[must_use]
    pub fn from_objects(objects: impl IntoIterator<Item = GraphObject>) -> Self {
        let mut registry = Self::new();
        for object in objects {
            registry.import(object);
        }
        registry
    }

    /// Insert an object without capture, preserving its id.
    pub fn import(&mut self, object: GraphObject) {
        self.objects.insert(object.id.clone(), object);
    }

    /// Allocate an id of the form `{prefix}-{n}` that is not in use.
    pub fn allocate_id(&mut self, prefix: &str) -> ObjectId {
        loop {
            self.next_id = self.next_id.saturating_add(1);
            let id = ObjectId(format!("{}-{}", prefix, self.next_id));
            if !self.objects.contains_key(&id) {
                return id;
            }
        }
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&GraphObject> {
        self.objects.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &GraphObject> {
        self.objects.values()
    }

    /// All ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    // =========================================================================
    // WRITE ACCESS (captured)
    // =========================================================================

    /// Mutable access; records the pre-image when a capture is open.
    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut GraphObject> {
        self.record(id);
        self.objects.get_mut(id)
    }

    /// Insert or replace an object.
    pub fn insert(&mut self, object: GraphObject) {
        self.record(&object.id);
        self.objects.insert(object.id.clone(), object);
    }

    /// Remove an object, returning it.
    pub fn remove(&mut self, id: &ObjectId) -> Option<GraphObject> {
        self.record(id);
        self.objects.remove(id)
    }

    fn record(&mut self, id: &ObjectId) {
        if let Some(capture) = self.capture.as_mut()
            && !capture.contains_key(id)
        {
            capture.insert(id.clone(), self.objects.get(id).cloned());
        }
    }

    // =========================================================================
    // CAPTURE
    // =========================================================================

    /// Open a change capture, discarding any capture already open.
    pub fn begin_capture(&mut self) {
        self.capture = Some(PreImages::new());
    }

    /// Close the capture and return the recorded pre-images.
    pub fn end_capture(&mut self) -> PreImages {
        self.capture.take().unwrap_or_default()
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Put every recorded object back to its pre-image (no capture).
    pub fn restore(&mut self, pre_images: PreImages) {
        for (id, before) in pre_images {
            match before {
                Some(object) => {
                    self.objects.insert(id, object);
                }
                None => {
                    self.objects.remove(&id);
                }
            }
        }
    }

    // =========================================================================
    // DERIVED VIEWS
    // =========================================================================

    /// Every container listing `child`, in id order.
    #[must_use]
    pub fn parents_of(&self, child: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.children().contains(child))
            .map(|o| o.id.clone())
            .collect()
    }

    /// Snapshots whose `parent_identity_id` is `base`, in id order.
    #[must_use]
    pub fn snapshots_of(&self, base: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| {
                &o.id != base
                    && o.is_snapshot()
                    && o.time_state
                        .as_ref()
                        .and_then(|ts| ts.parent_identity_id.as_ref())
                        == Some(base)
            })
            .map(|o| o.id.clone())
            .collect()
    }

    /// Binary links (plain or reified) running from `source` to `target`.
    #[must_use]
    pub fn links_between(&self, source: &ObjectId, target: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| {
                o.link()
                    .is_some_and(|l| &l.source_id == source && &l.target_id == target)
            })
            .map(|o| o.id.clone())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Body, Category, NoteTraits, ObjectKind};
    use chrono::Utc;

    fn note(id: &str) -> GraphObject {
        GraphObject::new(
            ObjectId::from(id),
            ObjectKind::SimpleNote,
            Body::Note {
                note: NoteTraits::new(id, Category::Concept),
            },
            Utc::now(),
        )
    }

    #[test]
    fn allocate_id_skips_taken_ids() {
        let mut registry = Registry::new();
        registry.import(note("note-1"));
        let id = registry.allocate_id("note");
        assert_eq!(id, ObjectId::from("note-2"));
    }

    #[test]
    fn capture_records_first_pre_image_only() {
        let mut registry = Registry::new();
        registry.import(note("a"));
        let original = registry.get(&ObjectId::from("a")).cloned();

        registry.begin_capture();
        if let Some(obj) = registry.get_mut(&ObjectId::from("a")) {
            obj.internal_weight = 5.0;
        }
        if let Some(obj) = registry.get_mut(&ObjectId::from("a")) {
            obj.internal_weight = 7.0;
        }
        registry.insert(note("b"));
        let pre = registry.end_capture();

        assert_eq!(pre.len(), 2);
        assert_eq!(pre.get(&ObjectId::from("a")).cloned().flatten(), original);
        assert_eq!(pre.get(&ObjectId::from("b")).cloned().flatten(), None);
        assert!(!registry.is_capturing());
    }

    #[test]
    fn restore_reverts_captured_changes() {
        let mut registry = Registry::new();
        registry.import(note("a"));
        let before = registry.clone();

        registry.begin_capture();
        registry.remove(&ObjectId::from("a"));
        registry.insert(note("b"));
        let pre = registry.end_capture();
        assert_ne!(registry, before);

        registry.restore(pre);
        assert_eq!(registry, before);
    }

    #[test]
    fn mutation_outside_capture_records_nothing() {
        let mut registry = Registry::new();
        registry.insert(note("a"));
        assert!(registry.end_capture().is_empty());
    }
}
