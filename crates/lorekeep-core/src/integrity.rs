//! # Integrity
//!
//! The cycle check consulted before every reparent, and a per-link status
//! map used to annotate conflicting links. The map is advisory: nothing in
//! the kernel enforces it.

use crate::validator::is_descendant;
use crate::{ObjectId, Registry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Annotation for one binary link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Approved,
    /// Repeats the source, target and verb of an earlier link.
    Redundant,
    /// A hierarchical link already expressed by containment.
    Implied,
}

/// Structural integrity checks the session consults.
pub trait IntegrityService {
    /// True if placing `source` under `target` would create a containment cycle.
    fn detect_cycle(&self, registry: &Registry, target: &ObjectId, source: &ObjectId) -> bool;

    /// Status of every binary link (plain or reified), keyed by link id.
    fn integrity_map(&self, registry: &Registry) -> BTreeMap<ObjectId, LinkStatus>;
}

/// Integrity computed from containment and link structure alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralIntegrity;

impl IntegrityService for StructuralIntegrity {
    fn detect_cycle(&self, registry: &Registry, target: &ObjectId, source: &ObjectId) -> bool {
        target == source || is_descendant(registry, source, target)
    }

    fn integrity_map(&self, registry: &Registry) -> BTreeMap<ObjectId, LinkStatus> {
        let mut seen: BTreeSet<(&ObjectId, &ObjectId, &str)> = BTreeSet::new();
        let mut map = BTreeMap::new();

        for object in registry.objects() {
            let Some(link) = object.link() else { continue };
            let status = if !seen.insert((&link.source_id, &link.target_id, link.verb.as_str())) {
                LinkStatus::Redundant
            } else if link.hierarchy_type.is_some()
                && is_descendant(registry, &link.source_id, &link.target_id)
            {
                LinkStatus::Implied
            } else {
                LinkStatus::Approved
            };
            map.insert(object.id.clone(), status);
        }
        map
    }
}

// =============================================================================
// TESTS
// =============================================================================
