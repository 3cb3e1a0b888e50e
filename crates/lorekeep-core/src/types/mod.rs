//! # Core Type Definitions
//!
//! This module contains all core types for the Lorekeep registry:
//! - Object identifiers (`ObjectId`)
//! - Vocabulary enums (`Category`, `ContainmentType`, `Layout`, `HierarchyType`)
//! - Qualifier scalars (`Scalar`)
//! - The object model (`object` submodule) and temporal model (`temporal` submodule)
//! - Error types (`LoreError`)
//!
//! ## Ordering Guarantees
//!
//! Identifiers and vocabulary enums implement `Ord` so that every derived
//! collection in the kernel can be a `BTreeMap`/`BTreeSet` with stable order.

mod object;
mod temporal;

pub use object::{
    Body, ContainerTraits, GraphObject, LinkTraits, NarrativeTraits, NoteTraits, ObjectKind,
    Participant, ParticipantSet,
};
pub use temporal::{TemporalDate, TimeState};

use crate::validator::Violation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wall-clock timestamp carried by every object.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque, unique identifier of a registry object.
///
/// Ids are never reused by the allocator and never change across
/// reification: a link promoted to a hub keeps its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create an id from any string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// VOCABULARY
// =============================================================================

/// Semantic classification of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Concept,
    Character,
    Location,
    Item,
    Event,
    Organization,
    Species,
    Culture,
    Story,
    World,
    /// Reserved for historical snapshots.
    State,
    Meta,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 12] = [
        Category::Concept,
        Category::Character,
        Category::Location,
        Category::Item,
        Category::Event,
        Category::Organization,
        Category::Species,
        Category::Culture,
        Category::Story,
        Category::World,
        Category::State,
        Category::Meta,
    ];

    /// Wire name of the category.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Category::Concept => "CONCEPT",
            Category::Character => "CHARACTER",
            Category::Location => "LOCATION",
            Category::Item => "ITEM",
            Category::Event => "EVENT",
            Category::Organization => "ORGANIZATION",
            Category::Species => "SPECIES",
            Category::Culture => "CULTURE",
            Category::Story => "STORY",
            Category::World => "WORLD",
            Category::State => "STATE",
            Category::Meta => "META",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Category::ALL
            .into_iter()
            .find(|c| c.name() == upper)
            .ok_or_else(|| LoreError::Rejected(format!("Unknown category: {}", s)))
    }
}

/// How a container groups its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainmentType {
    Folder,
    Manuscript,
    Chapter,
    Timeline,
}

/// Default arrangement used when a container is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layout {
    Grid,
    List,
    Timeline,
    Canvas,
}

/// Kind of structural relationship a hierarchical link expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyType {
    ParentOf,
    PartOf,
    LocatedIn,
    MemberOf,
}

impl FromStr for HierarchyType {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PARENT_OF" => Ok(HierarchyType::ParentOf),
            "PART_OF" => Ok(HierarchyType::PartOf),
            "LOCATED_IN" => Ok(HierarchyType::LocatedIn),
            "MEMBER_OF" => Ok(HierarchyType::MemberOf),
            _ => Err(LoreError::Rejected(format!("Unknown hierarchy type: {}", s))),
        }
    }
}

/// A single qualifier value attached to a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Flag(b) => write!(f, "{}", b),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Lorekeep kernel.
///
/// Validators never produce these directly; they return `Validation` values
/// that the session lifts into `LoreError::Invalid` when it blocks an edit.
#[derive(Debug, Error)]
pub enum LoreError {
    /// The requested object is not in the registry.
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    /// A structural or temporal rule rejected the edit.
    #[error("Validation failed: {0}")]
    Invalid(#[from] Violation),

    /// The object is a historical snapshot and cannot be restructured.
    #[error("Object is locked: {0}")]
    Locked(ObjectId),

    /// The object is not the variant the operation needs.
    #[error("Object {id} is not a {expected}")]
    WrongVariant { id: ObjectId, expected: &'static str },

    /// A kernel guard refused the operation.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The remote operation sink could not accept a batch.
    #[error("Sync error: {0}")]
    Sync(String),
}

// =============================================================================
// TESTS
// =============================================================================
