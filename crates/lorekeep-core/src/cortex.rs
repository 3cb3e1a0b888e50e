//! # Cortex
//!
//! Read-only composite searches built from the [`Traversal`] primitives.
//!
//! The Cortex never mutates the registry and never interprets text: it
//! returns ids and role-typed edges, and leaves presentation to callers.

use crate::primitives::{ACTIVE_ROLES, PASSIVE_ROLES};
use crate::query::FilterCriteria;
use crate::traversal::Traversal;
use crate::{GraphObject, ObjectId, Registry};
use serde::Serialize;
use std::collections::BTreeSet;

/// One agent exerting influence on a target through a hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Influence {
    pub agent_id: ObjectId,
    pub hub_id: ObjectId,
    /// Role the agent holds in the hub.
    pub role: String,
    /// The hub's `internal_weight`.
    pub weight: f64,
}

/// The Cortex namespace.
pub struct Cortex;

impl Cortex {
    /// One-hop context of `node`: children, temporal children, binary
    /// neighbours and owning hubs, deduplicated in that order, without `node`.
    #[must_use]
    pub fn expand_context(registry: &Registry, node: &ObjectId) -> Vec<ObjectId> {
        let Some(object) = registry.get(node) else {
            return Vec::new();
        };

        let temporal = object
            .time_state
            .as_ref()
            .map(|ts| ts.time_children.as_slice())
            .unwrap_or_default();
        let candidates = object
            .children()
            .iter()
            .chain(temporal)
            .cloned()
            .chain(Traversal::traverse_binary(registry, node, None))
            .chain(Traversal::expand_hubs(registry, node).into_iter().map(|h| h.id.clone()));

        let mut seen = BTreeSet::new();
        candidates
            .filter(|id| id != node && seen.insert(id.clone()))
            .collect()
    }

    /// Agents acting on `target` through hubs, heaviest hub first.
    ///
    /// Only hubs where `target` holds a passive role count, and only
    /// co-participants holding an active role are reported.
    #[must_use]
    pub fn trace_influence(registry: &Registry, target: &ObjectId) -> Vec<Influence> {
        let mut found = Vec::new();
        for hub in Traversal::expand_hubs(registry, target) {
            let participants = Traversal::hub_context(registry, &hub.id);
            let passive = participants
                .iter()
                .any(|p| &p.node_id == target && PASSIVE_ROLES.contains(&p.role_id.as_str()));
            if !passive {
                continue;
            }
            found.extend(
                participants
                    .iter()
                    .filter(|p| &p.node_id != target && ACTIVE_ROLES.contains(&p.role_id.as_str()))
                    .map(|p| Influence {
                        agent_id: p.node_id.clone(),
                        hub_id: hub.id.clone(),
                        role: p.role_id.clone(),
                        weight: hub.internal_weight,
                    }),
            );
        }
        found.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        found
    }

    /// Ids of addressable nodes passing every criterion, in id order.
    #[must_use]
    pub fn filter_graph(registry: &Registry, criteria: &FilterCriteria) -> Vec<ObjectId> {
        let proximity: Option<BTreeSet<ObjectId>> = (!criteria.near.is_empty()).then(|| {
            criteria
                .near
                .iter()
                .flat_map(|n| {
                    std::iter::once(n.clone()).chain(Self::expand_context(registry, n))
                })
                .collect()
        });

        registry
            .objects()
            .filter(|o| o.note().is_some())
            .filter(|o| criteria.min_mass.is_none_or(|m| o.total_subtree_mass >= m))
            .filter(|o| {
                criteria.time_range.as_ref().is_none_or(|(start, end)| {
                    o.time_state.as_ref().is_none_or(|ts| ts.overlaps(start, end))
                })
            })
            .filter(|o| {
                criteria
                    .required_verb
                    .as_deref()
                    .is_none_or(|verb| has_verb(registry, o, verb))
            })
            .filter(|o| proximity.as_ref().is_none_or(|p| p.contains(&o.id)))
            .map(|o| o.id.clone())
            .collect()
    }

    /// A meeting point of `a` and `b`.
    ///
    /// Tries, in order: the first shared one-hop context entry, a shared
    /// direct parent, then either one's parent appearing in the other's
    /// context.
    #[must_use]
    pub fn find_intersection(registry: &Registry, a: &ObjectId, b: &ObjectId) -> Option<ObjectId> {
        let context_a = Self::expand_context(registry, a);
        let context_b = Self::expand_context(registry, b);

        if let Some(shared) = context_a.iter().find(|id| context_b.contains(id)) {
            return Some(shared.clone());
        }

        let parent_a = Traversal::ascend(registry, a);
        let parent_b = Traversal::ascend(registry, b);
        if parent_a.is_some() && parent_a == parent_b {
            return parent_a;
        }

        parent_a
            .filter(|p| context_b.contains(p))
            .or_else(|| parent_b.filter(|p| context_a.contains(p)))
    }
}

/// True if a binary link or hub touching `object` carries `verb`.
fn has_verb(registry: &Registry, object: &GraphObject, verb: &str) -> bool {
    object
        .link_ids
        .iter()
        .filter_map(|l| registry.get(l))
        .any(|l| {
            l.link().is_some_and(|t| t.verb == verb) || l.hub().is_some_and(|h| h.global_verb == verb)
        })
}

// =============================================================================
// TESTS
// =============================================================================
