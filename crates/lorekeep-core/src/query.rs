//! # Query Module
//!
//! Structured filter criteria for [`Cortex::filter_graph`](crate::Cortex::filter_graph).
//!
//! Every criterion is optional; the sieve is a pure intersection, so the
//! order in which criteria are applied never changes the result.

use crate::{ObjectId, TemporalDate};

/// AND-combined filter over the addressable nodes of a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Keep nodes whose `total_subtree_mass` is at least this.
    pub min_mass: Option<f64>,
    /// Keep nodes whose temporal range overlaps `[start, end]`.
    ///
    /// Nodes without a time state are timeless and always pass.
    pub time_range: Option<(TemporalDate, TemporalDate)>,
    /// Keep nodes adjacent to a binary link or hub with this verb.
    pub required_verb: Option<String>,
    /// Keep only these nodes and their one-hop context. Empty disables.
    pub near: Vec<ObjectId>,
}

impl FilterCriteria {
    /// Criteria that keep everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_min_mass(mut self, min_mass: f64) -> Self {
        self.min_mass = Some(min_mass);
        self
    }

    #[must_use]
    pub fn with_time_range(mut self, start: TemporalDate, end: TemporalDate) -> Self {
        self.time_range = Some((start, end));
        self
    }

    #[must_use]
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.required_verb = Some(verb.into());
        self
    }

    /// Restrict to `entities` plus their one-hop context.
    #[must_use]
    pub fn near(mut self, entities: impl IntoIterator<Item = ObjectId>) -> Self {
        self.near.extend(entities);
        self
    }

    /// True if no criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_mass.is_none()
            && self.time_range.is_none()
            && self.required_verb.is_none()
            && self.near.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
