//! # Innate Primitives
//!
//! Hardcoded constants for the Lorekeep kernel.
//!
//! The role vocabularies below are a closed list compiled into the binary;
//! influence tracing does not read roles from data.

/// Default `internal_weight` of a freshly created object.
pub const DEFAULT_INTERNAL_WEIGHT: f64 = 1.0;

/// Year used for an open-ended (`valid_until = None`) range when measuring spans.
pub const OPEN_END_YEAR: i32 = 9999;

/// Minimum participant count of a well-formed hub.
pub const MIN_HUB_PARTICIPANTS: usize = 2;

// =============================================================================
// ROLE VOCABULARY
// =============================================================================

/// Roles that receive an influence.
pub const PASSIVE_ROLES: [&str; 4] = ["VICTIM", "TARGET", "RECEIVER", "MEMBER"];

/// Roles that exert an influence.
pub const ACTIVE_ROLES: [&str; 4] = ["AGGRESSOR", "SOURCE", "LEADER", "CAUSE"];

/// Role of the former source endpoint after hub promotion.
pub const ROLE_SOURCE: &str = "SOURCE";

/// Role of the former target endpoint after hub promotion.
pub const ROLE_TARGET: &str = "TARGET";

/// Participant verb of the `SOURCE` role.
pub const VERB_ORIGINATES: &str = "originates";

/// Participant verb of the `TARGET` role.
pub const VERB_TARGETS: &str = "targets";

/// Global verb of a hub produced by collapsing a bridging node.
pub const VERB_GOVERNS: &str = "governs";

/// Verb stamped on links created by containment edits.
pub const VERB_CONTAINS: &str = "contains";

/// Inverse verb stamped on links created by containment edits.
pub const VERB_CONTAINED_IN: &str = "contained in";

// =============================================================================
// ID ALLOCATION
// =============================================================================

/// Id prefix for notes.
pub const NOTE_PREFIX: &str = "note";

/// Id prefix for binary links.
pub const LINK_PREFIX: &str = "link";

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Magic bytes for the Lorekeep binary format header.
pub const MAGIC_BYTES: &[u8; 4] = b"LORE";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// HISTORY
// =============================================================================

/// Default number of transactions kept on the undo stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;
