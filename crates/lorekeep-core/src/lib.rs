//! # lorekeep-core
//!
//! The graph mutation kernel for Lorekeep.
//!
//! A [`Registry`] holds typed notes, binary and hierarchical links, reified
//! links and many-to-many hubs, with optional range-based temporal
//! snapshots. Every function here takes the registry as an explicit
//! parameter; there is no global state.
//!
//! ## Layers
//!
//! - `validator`: pure rules, returning [`Validation`] values
//! - `traversal`: read primitives
//! - `mutation`, `reify`, `chronology`: the kernel; guard failures are no-ops
//! - `cortex`: read-only composite searches
//! - `session`: reversible transactions, undo/redo and the remote sink
//!
//! ## Architectural Constraints
//!
//! - Deterministic: `BTreeMap`/`BTreeSet` only, no randomness
//! - Synchronous and single actor: no async, no locking; callers serialize edits
//! - No network: remote sync is reached only through [`OperationSink`]

// =============================================================================
// MODULES
// =============================================================================

pub mod chronology;
pub mod cortex;
pub mod formats;
pub mod integrity;
pub mod mutation;
pub mod oplog;
pub mod primitives;
pub mod query;
pub mod registry;
pub mod reify;
pub mod session;
pub mod system;
pub mod traversal;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Body, Category, ContainerTraits, ContainmentType, GraphObject, HierarchyType, Layout,
    LinkTraits, LoreError, NarrativeTraits, NoteTraits, ObjectId, ObjectKind, Participant,
    ParticipantSet, Scalar, TemporalDate, TimeState, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Kernel
// =============================================================================

pub use chronology::Chronology;
pub use cortex::{Cortex, Influence};
pub use integrity::{IntegrityService, LinkStatus, StructuralIntegrity};
pub use mutation::{LinkPatch, MutationEngine, NotePatch};
pub use oplog::{NullSink, Operation, OperationSink, Transaction};
pub use query::FilterCriteria;
pub use registry::{PreImages, Registry};
pub use reify::{Bridge, find_bridge, reify_link, reify_node};
pub use session::{Session, SessionState};
pub use traversal::Traversal;
pub use validator::{Validation, Violation, validate_registry};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

#[cfg(feature = "crypto-hash")]
pub use formats::registry_hash;
pub use formats::{
    PersistenceHeader, payload_checksum, registry_checksum, state_from_bytes, state_to_bytes,
};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::RegistryMetrics;
