//! # Reification
//!
//! In-place conversions between relationships and nodes. Ids never change.
//!
//! - link → node: a plain binary link gains note and container traits.
//! - node → hub: a node bridging exactly one incoming and one outgoing link
//!   becomes a two-participant hub and the bridge links are deleted.
//!
//! Binary link → hub is [`MutationEngine::promote_to_hub`]. None of these
//! has an inverse; only undo reverses them.

use crate::mutation::{MutationEngine, title_of};
use crate::primitives::{ROLE_SOURCE, ROLE_TARGET, VERB_GOVERNS, VERB_ORIGINATES, VERB_TARGETS};
use crate::validator::is_data_locked;
use crate::{
    Body, Category, ContainerTraits, NoteTraits, ObjectId, ObjectKind, Participant,
    ParticipantSet, Registry,
};
use chrono::Utc;
use tracing::debug;

/// Turn a plain binary link into an addressable, nestable node.
///
/// Returns `None` unless `link_id` is currently a plain binary link.
pub fn reify_link(registry: &mut Registry, link_id: &ObjectId) -> Option<ObjectId> {
    let link = match registry.get(link_id) {
        Some(object) if object.is_plain_link() => object.link()?.clone(),
        _ => {
            debug!(%link_id, "reify_link refused: not a plain binary link");
            return None;
        }
    };

    let title = format!(
        "{} → {}",
        title_of(registry, &link.source_id),
        title_of(registry, &link.target_id)
    );
    let mut note = NoteTraits::new(title, Category::Meta);
    note.gist = format!("Logic: {}", link.verb);

    let kind = if link.hierarchy_type.is_some() {
        ObjectKind::AggregatedHierarchicalLink
    } else {
        ObjectKind::AggregatedSemanticLink
    };

    let object = registry.get_mut(link_id)?;
    object.kind = kind;
    object.body = Body::ReifiedLink {
        link,
        note,
        container: ContainerTraits::default(),
    };
    object.touch(Utc::now());
    Some(link_id.clone())
}

/// The single incoming and single outgoing plain link of a bridging node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub incoming: ObjectId,
    pub predecessor: ObjectId,
    pub outgoing: ObjectId,
    pub successor: ObjectId,
}

/// Find the bridge through `node`, if it is one.
///
/// A bridge has exactly one incoming and one outgoing plain binary link,
/// no other links or hub memberships, and distinct neighbours.
#[must_use]
pub fn find_bridge(registry: &Registry, node: &ObjectId) -> Option<Bridge> {
    let object = registry.get(node)?;
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();
    for link in registry.objects().filter(|o| o.is_plain_link()) {
        let Some(traits) = link.link() else { continue };
        if &traits.target_id == node {
            incoming.push((link.id.clone(), traits.source_id.clone()));
        } else if &traits.source_id == node {
            outgoing.push((link.id.clone(), traits.target_id.clone()));
        }
    }

    let ([(incoming, predecessor)], [(outgoing, successor)]) =
        (incoming.as_slice(), outgoing.as_slice())
    else {
        return None;
    };
    if predecessor == successor {
        return None;
    }
    if object.link_ids.iter().any(|l| l != incoming && l != outgoing) {
        return None;
    }
    Some(Bridge {
        incoming: incoming.clone(),
        predecessor: predecessor.clone(),
        outgoing: outgoing.clone(),
        successor: successor.clone(),
    })
}

/// Collapse a bridging node into a hub governing its two neighbours.
///
/// Refuses links, hubs, snapshots and containers with children.
pub fn reify_node(registry: &mut Registry, node: &ObjectId) -> Option<ObjectId> {
    let note = {
        let object = registry.get(node)?;
        let eligible = matches!(object.body, Body::Note { .. } | Body::Container { .. })
            && object.children().is_empty()
            && !is_data_locked(object);
        if !eligible {
            debug!(%node, "reify_node refused: not a plain leaf note");
            return None;
        }
        object.note()?.clone()
    };
    let Some(bridge) = find_bridge(registry, node) else {
        debug!(%node, "reify_node refused: not a bridge");
        return None;
    };

    MutationEngine::delete_node(registry, &bridge.incoming);
    MutationEngine::delete_node(registry, &bridge.outgoing);

    let now = Utc::now();
    let object = registry.get_mut(node)?;
    object.kind = ObjectKind::AggregatedSimpleLink;
    object.body = Body::Hub {
        hub: ParticipantSet {
            participants: vec![
                Participant::new(bridge.predecessor.clone(), ROLE_SOURCE, VERB_ORIGINATES),
                Participant::new(bridge.successor.clone(), ROLE_TARGET, VERB_TARGETS),
            ],
            global_verb: VERB_GOVERNS.to_string(),
        },
        note,
    };
    object.touch(now);

    for neighbour in [&bridge.predecessor, &bridge.successor] {
        if let Some(object) = registry.get_mut(neighbour) {
            object.add_link_id(node);
            object.touch(now);
        }
    }
    Some(node.clone())
}

// =============================================================================
// TESTS
// =============================================================================
