//! # Mutation Engine
//!
//! Create/delete/link/update primitives over a [`Registry`].
//!
//! Guard failures (missing endpoint, wrong variant, a rule the validator
//! rejects) are no-ops that return `None` or `false`; nothing here returns an
//! error or panics. Every structural change refreshes `last_modified` on each
//! object it touches.
//!
//! Containment is kept single-parent: `enforce_hierarchy` refuses a child
//! that already sits under a different container. Moving a child is
//! `detach_child` followed by `enforce_hierarchy`.

use crate::primitives::{
    LINK_PREFIX, MIN_HUB_PARTICIPANTS, NOTE_PREFIX, ROLE_SOURCE, ROLE_TARGET, VERB_ORIGINATES,
    VERB_TARGETS,
};
use crate::validator::{validate_category_change, validate_containment, validate_link_endpoints};
use crate::{
    Body, Category, ContainerTraits, GraphObject, HierarchyType, LinkTraits, NarrativeTraits,
    NoteTraits, ObjectId, ObjectKind, Participant, ParticipantSet, Registry, Scalar, TemporalDate,
    TimeState,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Field-merge update for the note trait. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub gist: Option<String>,
    pub prose_content: Option<String>,
    pub category: Option<Category>,
    pub aliases: Option<BTreeSet<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub is_ghost: Option<bool>,
    pub internal_weight: Option<f64>,
}

/// Field-merge update for the link trait.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkPatch {
    pub verb: Option<String>,
    pub verb_inverse: Option<String>,
    pub internal_weight: Option<f64>,
}

/// The MutationEngine holds every registry mutation primitive.
pub struct MutationEngine;

impl MutationEngine {
    // =========================================================================
    // NODES
    // =========================================================================

    /// Create a note with a fresh id, zero mass and no children or links.
    ///
    /// Returns `None` for a non-note `kind` or for `Category::State`, which is
    /// reserved for snapshots.
    pub fn create_node(
        registry: &mut Registry,
        kind: ObjectKind,
        title: &str,
        category: Category,
        gist: &str,
        aliases: &[&str],
    ) -> Option<ObjectId> {
        if !kind.is_note_kind() || category == Category::State {
            debug!(?kind, %category, "create_node refused");
            return None;
        }

        let mut note = NoteTraits::new(title, category);
        note.gist = gist.to_string();
        note.aliases = aliases.iter().map(|a| (*a).to_string()).collect();

        let body = match kind {
            ObjectKind::ContainerNote => Body::Container {
                note,
                container: ContainerTraits::default(),
                narrative: None,
            },
            ObjectKind::StoryNote => Body::Container {
                note,
                container: ContainerTraits::default(),
                narrative: Some(NarrativeTraits::default()),
            },
            _ => Body::Note { note },
        };

        let id = registry.allocate_id(NOTE_PREFIX);
        registry.insert(GraphObject::new(id.clone(), kind, body, Utc::now()));
        Some(id)
    }

    /// Cascade-delete an object and repair every inbound reference.
    ///
    /// Removes the object, every binary link that has it (or another deleted
    /// link) as an endpoint, and strips all of them from children lists,
    /// `link_ids`, hub participant lists and temporal children in one sweep.
    /// Dangling references met on the way are skipped. Returns `false` if
    /// `id` was absent.
    pub fn delete_node(registry: &mut Registry, id: &ObjectId) -> bool {
        if !registry.contains(id) {
            return false;
        }

        let mut doomed = BTreeSet::from([id.clone()]);
        loop {
            let more: Vec<ObjectId> = registry
                .objects()
                .filter(|o| !doomed.contains(&o.id))
                .filter(|o| {
                    o.link().is_some_and(|l| {
                        doomed.contains(&l.source_id) || doomed.contains(&l.target_id)
                    })
                })
                .map(|o| o.id.clone())
                .collect();
            if more.is_empty() {
                break;
            }
            doomed.extend(more);
        }

        let holders: Vec<ObjectId> = registry
            .objects()
            .filter(|o| !doomed.contains(&o.id) && references_any(o, &doomed))
            .map(|o| o.id.clone())
            .collect();

        let now = Utc::now();
        for holder in &holders {
            if let Some(object) = registry.get_mut(holder) {
                object.link_ids.retain(|l| !doomed.contains(l));
                if let Some(container) = object.container_mut() {
                    container.children_ids.retain(|c| !doomed.contains(c));
                }
                if let Some(hub) = object.hub_mut() {
                    hub.participants.retain(|p| !doomed.contains(&p.node_id));
                }
                if let Some(ts) = object.time_state.as_mut() {
                    ts.time_children.retain(|c| !doomed.contains(c));
                    if ts.parent_identity_id.as_ref().is_some_and(|p| doomed.contains(p)) {
                        ts.parent_identity_id = None;
                    }
                }
                object.touch(now);
            }
        }

        for gone in &doomed {
            registry.remove(gone);
        }
        debug!(%id, removed = doomed.len(), repaired = holders.len(), "cascade delete");
        true
    }

    // =========================================================================
    // BINARY LINKS
    // =========================================================================

    /// Create a binary link and register it on both endpoints.
    ///
    /// Returns `None` if either endpoint is missing or they are the same object.
    pub fn create_binary_link(
        registry: &mut Registry,
        source: &ObjectId,
        target: &ObjectId,
        verb: &str,
        verb_inverse: &str,
    ) -> Option<ObjectId> {
        Self::insert_link(registry, source, target, verb, verb_inverse, None)
    }

    /// Same contract as `create_binary_link`, stamping `hierarchy_type`.
    pub fn create_hierarchical_link(
        registry: &mut Registry,
        source: &ObjectId,
        target: &ObjectId,
        hierarchy_type: HierarchyType,
        verb: &str,
        verb_inverse: &str,
    ) -> Option<ObjectId> {
        Self::insert_link(
            registry,
            source,
            target,
            verb,
            verb_inverse,
            Some(hierarchy_type),
        )
    }

    fn insert_link(
        registry: &mut Registry,
        source: &ObjectId,
        target: &ObjectId,
        verb: &str,
        verb_inverse: &str,
        hierarchy_type: Option<HierarchyType>,
    ) -> Option<ObjectId> {
        if !registry.contains(source) || !registry.contains(target) {
            debug!(%source, %target, "link refused: missing endpoint");
            return None;
        }
        if validate_link_endpoints(source, target).is_err() {
            debug!(%source, "link refused: self link");
            return None;
        }

        let kind = match (hierarchy_type, verb.is_empty()) {
            (Some(_), _) => ObjectKind::HierarchicalLink,
            (None, true) => ObjectKind::SimpleLink,
            (None, false) => ObjectKind::SemanticLink,
        };
        let link = LinkTraits {
            source_id: source.clone(),
            target_id: target.clone(),
            verb: verb.to_string(),
            verb_inverse: verb_inverse.to_string(),
            qualifiers: BTreeMap::new(),
            hierarchy_type,
        };

        let now = Utc::now();
        let id = registry.allocate_id(LINK_PREFIX);
        registry.insert(GraphObject::new(id.clone(), kind, Body::Link { link }, now));
        for endpoint in [source, target] {
            if let Some(object) = registry.get_mut(endpoint) {
                object.add_link_id(&id);
                object.touch(now);
            }
        }
        Some(id)
    }

    // =========================================================================
    // HUBS
    // =========================================================================

    /// Replace a plain binary link, in place, with a two-participant hub.
    ///
    /// The former source becomes `{SOURCE, originates}` and the former target
    /// `{TARGET, targets}`. Returns `None` if `link_id` is not currently a
    /// plain binary link, so a second promotion is a no-op.
    pub fn promote_to_hub(registry: &mut Registry, link_id: &ObjectId) -> Option<ObjectId> {
        let link = match registry.get(link_id) {
            Some(object) if object.is_plain_link() => object.link()?.clone(),
            _ => {
                debug!(%link_id, "promote_to_hub refused: not a plain binary link");
                return None;
            }
        };

        let title = format!(
            "{} → {}",
            title_of(registry, &link.source_id),
            title_of(registry, &link.target_id)
        );
        let mut note = NoteTraits::new(title, Category::Meta);
        note.gist = format!("Hub: {}", link.verb);

        let hub = ParticipantSet {
            participants: vec![
                Participant::new(link.source_id.clone(), ROLE_SOURCE, VERB_ORIGINATES),
                Participant::new(link.target_id.clone(), ROLE_TARGET, VERB_TARGETS),
            ],
            global_verb: link.verb.clone(),
        };

        let object = registry.get_mut(link_id)?;
        object.kind = ObjectKind::AggregatedSimpleLink;
        object.body = Body::Hub { hub, note };
        object.touch(Utc::now());
        Some(link_id.clone())
    }

    /// Ensure `node` takes part in `hub`; keeps `node.link_ids` in sync.
    ///
    /// Returns whether `node` is a participant after the call.
    pub fn add_participant(
        registry: &mut Registry,
        hub: &ObjectId,
        node: &ObjectId,
        role: &str,
        verb: &str,
    ) -> bool {
        if hub == node || !registry.contains(node) {
            return false;
        }
        let now = Utc::now();
        let Some(set) = registry.get_mut(hub).and_then(|o| o.hub_mut()) else {
            return false;
        };
        if set.add(Participant::new(node.clone(), role, verb)) {
            if let Some(object) = registry.get_mut(hub) {
                object.touch(now);
            }
            if let Some(object) = registry.get_mut(node) {
                object.add_link_id(hub);
                object.touch(now);
            }
        }
        true
    }

    /// Ensure `node` does not take part in `hub`; keeps `node.link_ids` in sync.
    ///
    /// Refuses (returns `false`) when removal would leave fewer than two
    /// participants. Returns whether `node` is absent after the call.
    pub fn remove_participant(registry: &mut Registry, hub: &ObjectId, node: &ObjectId) -> bool {
        let Some(set) = registry.get(hub).and_then(|o| o.hub()) else {
            return false;
        };
        if !set.contains(node) {
            return true;
        }
        if set.participants.len() <= MIN_HUB_PARTICIPANTS {
            debug!(%hub, %node, "remove_participant refused: hub would drop below minimum");
            return false;
        }

        let now = Utc::now();
        if let Some(object) = registry.get_mut(hub) {
            if let Some(set) = object.hub_mut() {
                set.remove(node);
            }
            object.touch(now);
        }
        if let Some(object) = registry.get_mut(node) {
            object.remove_link_id(hub);
            object.touch(now);
        }
        true
    }

    // =========================================================================
    // MASS
    // =========================================================================

    /// Recompute `total_subtree_mass` of this node only.
    ///
    /// `internal_weight + Σ child.total_subtree_mass`, using whatever the
    /// children currently hold. Ancestors are not updated.
    #[allow(clippy::float_arithmetic)]
    pub fn update_mass(registry: &mut Registry, id: &ObjectId) -> Option<f64> {
        let object = registry.get(id)?;
        let children_mass: f64 = object
            .children()
            .iter()
            .filter_map(|c| registry.get(c))
            .map(|c| c.total_subtree_mass)
            .sum();
        let total = object.internal_weight + children_mass;

        let object = registry.get_mut(id)?;
        object.total_subtree_mass = total;
        Some(total)
    }

    /// Call `update_mass` bottom-up over the containment tree under `root`.
    pub fn recompute_mass_tree(registry: &mut Registry, root: &ObjectId) -> Option<f64> {
        if !registry.contains(root) {
            return None;
        }

        // Post-order: children are pushed after their parent, so the reversed
        // visit order has every child before its parent.
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![root.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(object) = registry.get(&current) {
                stack.extend(object.children().iter().cloned());
            }
            order.push(current);
        }

        let mut total = None;
        for id in order.iter().rev() {
            total = Self::update_mass(registry, id);
        }
        total
    }

    // =========================================================================
    // CONTAINMENT
    // =========================================================================

    /// Ensure `child ∈ parent.children_ids`.
    ///
    /// Refuses when `parent` is not a container, `child` is missing, the
    /// placement would create a cycle, or `child` already has another parent.
    /// Returns whether the child is in place after the call.
    pub fn enforce_hierarchy(registry: &mut Registry, parent: &ObjectId, child: &ObjectId) -> bool {
        let Some(parent_obj) = registry.get(parent) else {
            return false;
        };
        if parent_obj.container().is_none() || !registry.contains(child) {
            return false;
        }
        if parent_obj.children().contains(child) {
            return true;
        }
        if let Err(violation) = validate_containment(registry, parent, child) {
            debug!(%parent, %child, %violation, "enforce_hierarchy refused");
            return false;
        }
        if registry.parents_of(child).iter().any(|p| p != parent) {
            debug!(%parent, %child, "enforce_hierarchy refused: child already parented");
            return false;
        }

        let Some(object) = registry.get_mut(parent) else {
            return false;
        };
        if let Some(container) = object.container_mut() {
            container.children_ids.push(child.clone());
        }
        object.touch(Utc::now());
        true
    }

    /// Remove `child` from `parent.children_ids`. Returns whether it was there.
    pub fn detach_child(registry: &mut Registry, parent: &ObjectId, child: &ObjectId) -> bool {
        let listed = registry
            .get(parent)
            .is_some_and(|o| o.children().contains(child));
        if !listed {
            return false;
        }
        if let Some(object) = registry.get_mut(parent) {
            if let Some(container) = object.container_mut() {
                container.children_ids.retain(|c| c != child);
            }
            object.touch(Utc::now());
        }
        true
    }

    // =========================================================================
    // FIELD UPDATES
    // =========================================================================

    /// Merge `patch` into the note trait of `id`.
    ///
    /// Refuses objects without note traits and category changes the validator
    /// rejects.
    pub fn update_node(registry: &mut Registry, id: &ObjectId, patch: &NotePatch) -> bool {
        let Some(object) = registry.get(id) else {
            return false;
        };
        if object.note().is_none() {
            return false;
        }
        if let Some(category) = patch.category
            && validate_category_change(object, category).is_err()
        {
            return false;
        }

        let Some(object) = registry.get_mut(id) else {
            return false;
        };
        if let Some(weight) = patch.internal_weight {
            object.internal_weight = weight;
        }
        if let Some(note) = object.note_mut() {
            if let Some(title) = &patch.title {
                note.title.clone_from(title);
            }
            if let Some(gist) = &patch.gist {
                note.gist.clone_from(gist);
            }
            if let Some(prose) = &patch.prose_content {
                note.prose_content.clone_from(prose);
            }
            if let Some(category) = patch.category {
                note.category = category;
            }
            if let Some(aliases) = &patch.aliases {
                note.aliases.clone_from(aliases);
            }
            if let Some(tags) = &patch.tags {
                note.tags.clone_from(tags);
            }
            if let Some(ghost) = patch.is_ghost {
                note.is_ghost = ghost;
            }
        }
        object.touch(Utc::now());
        true
    }

    /// Merge `patch` into the link trait of `id`.
    pub fn update_link(registry: &mut Registry, id: &ObjectId, patch: &LinkPatch) -> bool {
        let Some(object) = registry.get_mut(id) else {
            return false;
        };
        if object.link().is_none() {
            return false;
        }
        if let Some(weight) = patch.internal_weight {
            object.internal_weight = weight;
        }
        if let Some(link) = object.link_mut() {
            if let Some(verb) = &patch.verb {
                link.verb.clone_from(verb);
            }
            if let Some(inverse) = &patch.verb_inverse {
                link.verb_inverse.clone_from(inverse);
            }
        }
        object.touch(Utc::now());
        true
    }

    /// Bound a non-snapshot object (typically a hierarchical link) in time.
    ///
    /// Existing temporal children are kept.
    pub fn set_time_range(
        registry: &mut Registry,
        id: &ObjectId,
        start: Option<TemporalDate>,
        end: Option<TemporalDate>,
    ) -> bool {
        let Some(object) = registry.get_mut(id) else {
            return false;
        };
        if object.is_snapshot() {
            return false;
        }
        let children = object
            .time_state
            .take()
            .map(|ts| ts.time_children)
            .unwrap_or_default();
        let mut ts = TimeState::bounded(start, end);
        ts.time_children = children;
        object.time_state = Some(ts);
        object.touch(Utc::now());
        true
    }

    /// Set one qualifier on a binary link.
    pub fn set_qualifier(registry: &mut Registry, link: &ObjectId, key: &str, value: Scalar) -> bool {
        let Some(object) = registry.get_mut(link) else {
            return false;
        };
        let Some(traits) = object.link_mut() else {
            return false;
        };
        traits.qualifiers.insert(key.to_string(), value);
        object.touch(Utc::now());
        true
    }

    /// Remove one qualifier from a binary link. Returns whether it existed.
    pub fn remove_qualifier(registry: &mut Registry, link: &ObjectId, key: &str) -> bool {
        let present = registry
            .get(link)
            .and_then(|o| o.link())
            .is_some_and(|l| l.qualifiers.contains_key(key));
        if !present {
            return false;
        }
        if let Some(object) = registry.get_mut(link) {
            if let Some(traits) = object.link_mut() {
                traits.qualifiers.remove(key);
            }
            object.touch(Utc::now());
        }
        true
    }
}

/// True if `object` holds any reference into `ids`.
fn references_any(object: &GraphObject, ids: &BTreeSet<ObjectId>) -> bool {
    object.link_ids.iter().any(|l| ids.contains(l))
        || object.children().iter().any(|c| ids.contains(c))
        || object
            .hub()
            .is_some_and(|h| h.participants.iter().any(|p| ids.contains(&p.node_id)))
        || object.time_state.as_ref().is_some_and(|ts| {
            ts.time_children.iter().any(|c| ids.contains(c))
                || ts.parent_identity_id.as_ref().is_some_and(|p| ids.contains(p))
        })
}

/// Display title of `id`, or the id itself when missing.
pub(crate) fn title_of(registry: &Registry, id: &ObjectId) -> String {
    registry
        .get(id)
        .map_or_else(|| id.to_string(), |o| o.title().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
