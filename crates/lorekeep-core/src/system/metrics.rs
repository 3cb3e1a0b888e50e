//! Registry metrics: variant counts and audit totals.

use crate::validator::validate_registry;
use crate::{Body, Registry};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counts over a registry, computed in one pass plus an audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryMetrics {
    /// Total number of objects.
    pub objects: usize,
    /// Notes without container traits.
    pub notes: usize,
    /// Container and story notes.
    pub containers: usize,
    /// Plain binary links, hierarchical ones included.
    pub links: usize,
    pub hierarchical_links: usize,
    /// Links that are also nodes.
    pub reified_links: usize,
    pub hubs: usize,
    pub snapshots: usize,
    /// Longest containment chain below a root; a lone note has depth 0.
    pub max_depth: usize,
    /// Invariant violations found by the audit.
    pub violations: usize,
}

impl RegistryMetrics {
    /// Compute metrics from a registry.
    #[must_use]
    pub fn from_registry(registry: &Registry) -> Self {
        let mut metrics = Self {
            objects: registry.len(),
            max_depth: max_containment_depth(registry),
            violations: validate_registry(registry).len(),
            ..Self::default()
        };

        for object in registry.objects() {
            match object.body {
                Body::Note { .. } => metrics.notes += 1,
                Body::Container { .. } => metrics.containers += 1,
                Body::Link { .. } => metrics.links += 1,
                Body::ReifiedLink { .. } => metrics.reified_links += 1,
                Body::Hub { .. } => metrics.hubs += 1,
            }
            if object.is_hierarchical_link() && object.is_plain_link() {
                metrics.hierarchical_links += 1;
            }
            if object.is_snapshot() {
                metrics.snapshots += 1;
            }
        }
        metrics
    }

    /// True when the audit found nothing.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations == 0
    }
}

/// Walk up from every object through its container, cycle-safe.
fn max_containment_depth(registry: &Registry) -> usize {
    let parent: BTreeMap<_, _> = registry
        .objects()
        .flat_map(|o| o.children().iter().map(move |c| (c, &o.id)))
        .collect();

    let mut deepest = 0;
    for id in registry.ids() {
        let mut seen = BTreeSet::from([id]);
        let mut current = id;
        let mut depth = 0usize;
        while let Some(up) = parent.get(current) {
            if !seen.insert(*up) {
                break;
            }
            depth = depth.saturating_add(1);
            current = *up;
        }
        deepest = deepest.max(depth);
    }
    deepest
}
