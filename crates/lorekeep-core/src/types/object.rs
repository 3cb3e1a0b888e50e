//! The registry object model.
//!
//! Every object shares the base fields of [`GraphObject`]; its capabilities
//! come from the [`Body`] variant, which is a closed union over the trait
//! combinations that actually occur. Capability checks are exhaustive matches
//! on `Body`, never probes for optional fields.

use super::{Category, ContainmentType, HierarchyType, Layout, ObjectId, Scalar, TimeState, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// TRAITS
// =============================================================================

/// Note trait: the descriptive metadata of an addressable node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTraits {
    pub title: String,
    pub aliases: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub gist: String,
    pub prose_content: String,
    pub category: Category,
    pub is_ghost: bool,
}

impl NoteTraits {
    /// A note with a title and category; every other field empty.
    #[must_use]
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            aliases: BTreeSet::new(),
            tags: BTreeSet::new(),
            gist: String::new(),
            prose_content: String::new(),
            category,
            is_ghost: false,
        }
    }
}

/// Container trait. `children_ids` is ordered; the kernel keeps it tree-shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerTraits {
    pub containment_type: ContainmentType,
    pub is_collapsed: bool,
    pub default_layout: Layout,
    pub children_ids: Vec<ObjectId>,
}

impl Default for ContainerTraits {
    fn default() -> Self {
        Self {
            containment_type: ContainmentType::Folder,
            is_collapsed: false,
            default_layout: Layout::Grid,
            children_ids: Vec::new(),
        }
    }
}

/// Narrative fields carried by story notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeTraits {
    pub synopsis: String,
    pub beats: Vec<String>,
}

/// Link trait of a binary relationship. Hierarchical links set `hierarchy_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTraits {
    pub source_id: ObjectId,
    pub target_id: ObjectId,
    pub verb: String,
    pub verb_inverse: String,
    pub qualifiers: BTreeMap<String, Scalar>,
    pub hierarchy_type: Option<HierarchyType>,
}

impl LinkTraits {
    /// The endpoint opposite `node`, if `node` is an endpoint at all.
    #[must_use]
    pub fn other_end(&self, node: &ObjectId) -> Option<&ObjectId> {
        if &self.source_id == node {
            Some(&self.target_id)
        } else if &self.target_id == node {
            Some(&self.source_id)
        } else {
            None
        }
    }

    /// True if `node` is the source or the target.
    #[must_use]
    pub fn touches(&self, node: &ObjectId) -> bool {
        &self.source_id == node || &self.target_id == node
    }
}

/// One typed member of a hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub node_id: ObjectId,
    pub role_id: String,
    pub verb: String,
}

impl Participant {
    #[must_use]
    pub fn new(node_id: ObjectId, role_id: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            node_id,
            role_id: role_id.into(),
            verb: verb.into(),
        }
    }
}

/// Participant-set trait of a many-to-many hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSet {
    pub participants: Vec<Participant>,
    pub global_verb: String,
}

impl ParticipantSet {
    /// True if `node` takes part in this hub under any role.
    #[must_use]
    pub fn contains(&self, node: &ObjectId) -> bool {
        self.participants.iter().any(|p| &p.node_id == node)
    }

    /// Add a participant unless the node is already present.
    pub fn add(&mut self, participant: Participant) -> bool {
        if self.contains(&participant.node_id) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    /// Remove every entry for `node`. Returns true if anything was removed.
    pub fn remove(&mut self, node: &ObjectId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| &p.node_id != node);
        self.participants.len() != before
    }
}

// =============================================================================
// VARIANTS
// =============================================================================

/// Concrete variant name of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    SimpleNote,
    ContainerNote,
    StoryNote,
    SimpleLink,
    SemanticLink,
    HierarchicalLink,
    AggregatedSemanticLink,
    AggregatedHierarchicalLink,
    AggregatedSimpleLink,
}

impl ObjectKind {
    /// Kinds a node factory may produce.
    #[must_use]
    pub fn is_note_kind(&self) -> bool {
        matches!(
            self,
            ObjectKind::SimpleNote | ObjectKind::ContainerNote | ObjectKind::StoryNote
        )
    }

    /// True if `body` is the shape this kind requires.
    #[must_use]
    pub fn matches(&self, body: &Body) -> bool {
        match (self, body) {
            (ObjectKind::SimpleNote, Body::Note { .. }) => true,
            (ObjectKind::ContainerNote, Body::Container { narrative, .. }) => narrative.is_none(),
            (ObjectKind::StoryNote, Body::Container { narrative, .. }) => narrative.is_some(),
            (ObjectKind::SimpleLink | ObjectKind::SemanticLink, Body::Link { link }) => {
                link.hierarchy_type.is_none()
            }
            (ObjectKind::HierarchicalLink, Body::Link { link }) => link.hierarchy_type.is_some(),
            (ObjectKind::AggregatedSemanticLink, Body::ReifiedLink { link, .. }) => {
                link.hierarchy_type.is_none()
            }
            (ObjectKind::AggregatedHierarchicalLink, Body::ReifiedLink { link, .. }) => {
                link.hierarchy_type.is_some()
            }
            (ObjectKind::AggregatedSimpleLink, Body::Hub { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The trait combination an object carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// Note only.
    Note { note: NoteTraits },
    /// Note + container, optionally with narrative fields.
    Container {
        note: NoteTraits,
        container: ContainerTraits,
        narrative: Option<NarrativeTraits>,
    },
    /// A plain binary link (simple, semantic or hierarchical).
    Link { link: LinkTraits },
    /// A reified link: still a binary link, also an addressable, nestable node.
    ReifiedLink {
        link: LinkTraits,
        note: NoteTraits,
        container: ContainerTraits,
    },
    /// A many-to-many hub with display metadata.
    Hub { hub: ParticipantSet, note: NoteTraits },
}

// =============================================================================
// GRAPH OBJECT
// =============================================================================

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub internal_weight: f64,
    /// Derived by `MutationEngine::update_mass`; may be stale for ancestors.
    pub total_subtree_mass: f64,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
    /// Links and hubs touching this object, in insertion order, no duplicates.
    pub link_ids: Vec<ObjectId>,
    pub time_state: Option<TimeState>,
    pub body: Body,
}

impl GraphObject {
    /// Build an object with default weight and empty backrefs.
    #[must_use]
    pub fn new(id: ObjectId, kind: ObjectKind, body: Body, now: Timestamp) -> Self {
        Self {
            id,
            kind,
            internal_weight: crate::primitives::DEFAULT_INTERNAL_WEIGHT,
            total_subtree_mass: 0.0,
            created_at: now,
            last_modified: now,
            link_ids: Vec::new(),
            time_state: None,
            body,
        }
    }

    /// Refresh `last_modified`.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_modified = now;
    }

    // -------------------------------------------------------------------------
    // Capabilities
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn note(&self) -> Option<&NoteTraits> {
        match &self.body {
            Body::Note { note }
            | Body::Container { note, .. }
            | Body::ReifiedLink { note, .. }
            | Body::Hub { note, .. } => Some(note),
            Body::Link { .. } => None,
        }
    }

    pub fn note_mut(&mut self) -> Option<&mut NoteTraits> {
        match &mut self.body {
            Body::Note { note }
            | Body::Container { note, .. }
            | Body::ReifiedLink { note, .. }
            | Body::Hub { note, .. } => Some(note),
            Body::Link { .. } => None,
        }
    }

    #[must_use]
    pub fn container(&self) -> Option<&ContainerTraits> {
        match &self.body {
            Body::Container { container, .. } | Body::ReifiedLink { container, .. } => {
                Some(container)
            }
            Body::Note { .. } | Body::Link { .. } | Body::Hub { .. } => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut ContainerTraits> {
        match &mut self.body {
            Body::Container { container, .. } | Body::ReifiedLink { container, .. } => {
                Some(container)
            }
            Body::Note { .. } | Body::Link { .. } | Body::Hub { .. } => None,
        }
    }

    /// Link trait of a binary link (plain or reified). Hubs have none.
    #[must_use]
    pub fn link(&self) -> Option<&LinkTraits> {
        match &self.body {
            Body::Link { link } | Body::ReifiedLink { link, .. } => Some(link),
            Body::Note { .. } | Body::Container { .. } | Body::Hub { .. } => None,
        }
    }

    pub fn link_mut(&mut self) -> Option<&mut LinkTraits> {
        match &mut self.body {
            Body::Link { link } | Body::ReifiedLink { link, .. } => Some(link),
            Body::Note { .. } | Body::Container { .. } | Body::Hub { .. } => None,
        }
    }

    #[must_use]
    pub fn hub(&self) -> Option<&ParticipantSet> {
        match &self.body {
            Body::Hub { hub, .. } => Some(hub),
            _ => None,
        }
    }

    pub fn hub_mut(&mut self) -> Option<&mut ParticipantSet> {
        match &mut self.body {
            Body::Hub { hub, .. } => Some(hub),
            _ => None,
        }
    }

    /// Children of a container; empty for everything else.
    #[must_use]
    pub fn children(&self) -> &[ObjectId] {
        match self.container() {
            Some(c) => &c.children_ids,
            None => &[],
        }
    }

    /// True for a binary link that has not been reified or promoted.
    #[must_use]
    pub fn is_plain_link(&self) -> bool {
        matches!(self.body, Body::Link { .. })
    }

    #[must_use]
    pub fn is_reified(&self) -> bool {
        matches!(self.body, Body::ReifiedLink { .. })
    }

    #[must_use]
    pub fn is_hub(&self) -> bool {
        matches!(self.body, Body::Hub { .. })
    }

    #[must_use]
    pub fn is_hierarchical_link(&self) -> bool {
        self.link().is_some_and(|l| l.hierarchy_type.is_some())
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.time_state
            .as_ref()
            .is_some_and(|ts| ts.is_historical_snapshot)
    }

    /// Display title; links fall back to their verb.
    #[must_use]
    pub fn title(&self) -> &str {
        match (self.note(), self.link()) {
            (Some(note), _) => &note.title,
            (None, Some(link)) => &link.verb,
            (None, None) => self.id.as_str(),
        }
    }

    // -------------------------------------------------------------------------
    // Backrefs
    // -------------------------------------------------------------------------

    /// Append to `link_ids` unless already present.
    pub fn add_link_id(&mut self, link: &ObjectId) -> bool {
        if self.link_ids.contains(link) {
            return false;
        }
        self.link_ids.push(link.clone());
        true
    }

    pub fn remove_link_id(&mut self, link: &ObjectId) -> bool {
        let before = self.link_ids.len();
        self.link_ids.retain(|l| l != link);
        self.link_ids.len() != before
    }
}

// =============================================================================
// TESTS
// =============================================================================
