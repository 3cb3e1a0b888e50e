//! # Operation Log
//!
//! Every session edit is recorded as a [`Transaction`]: a forward list of
//! typed operations that replays the edit, and an inverse list that reverts
//! it. Both lists are whole-object operations computed from the registry's
//! change capture, so replaying them is exact.
//!
//! The same operations feed the remote [`OperationSink`]. The sink is
//! best-effort: the session logs and discards its errors.

use crate::registry::PreImages;
use crate::{GraphObject, LoreError, ObjectId, Registry};
use serde::{Deserialize, Serialize};

/// One typed registry operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Insert `entity` under its own id.
    Create { entity: GraphObject },
    /// Replace the object at `target_id` with `data`.
    Update { target_id: ObjectId, data: GraphObject },
    /// Remove the object at `target_id`.
    Remove { target_id: ObjectId },
}

impl Operation {
    /// Lowercase operation name, as used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Remove { .. } => "remove",
        }
    }

    /// The id this operation acts on.
    #[must_use]
    pub fn target(&self) -> &ObjectId {
        match self {
            Operation::Create { entity } => &entity.id,
            Operation::Update { target_id, .. } | Operation::Remove { target_id } => target_id,
        }
    }

    /// Apply to `registry`. Removing an absent object is a no-op.
    pub fn apply(&self, registry: &mut Registry) {
        match self {
            Operation::Create { entity } => registry.insert(entity.clone()),
            Operation::Update { data, .. } => registry.insert(data.clone()),
            Operation::Remove { target_id } => {
                registry.remove(target_id);
            }
        }
    }
}

/// A labelled, reversible edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub label: String,
    pub forward: Vec<Operation>,
    pub inverse: Vec<Operation>,
}

impl Transaction {
    /// Diff the captured pre-images against the current registry.
    ///
    /// Objects created and removed within the same capture, or left
    /// unchanged, produce no operations.
    #[must_use]
    pub fn from_pre_images(label: impl Into<String>, registry: &Registry, pre_images: PreImages) -> Self {
        let mut forward = Vec::new();
        let mut inverse = Vec::new();

        for (id, before) in pre_images {
            let after = registry.get(&id);
            match (before, after) {
                (None, None) => {}
                (None, Some(after)) => {
                    forward.push(Operation::Create {
                        entity: after.clone(),
                    });
                    inverse.push(Operation::Remove { target_id: id });
                }
                (Some(before), None) => {
                    forward.push(Operation::Remove {
                        target_id: id.clone(),
                    });
                    inverse.push(Operation::Create { entity: before });
                }
                (Some(before), Some(after)) => {
                    if &before == after {
                        continue;
                    }
                    forward.push(Operation::Update {
                        target_id: id.clone(),
                        data: after.clone(),
                    });
                    inverse.push(Operation::Update {
                        target_id: id,
                        data: before,
                    });
                }
            }
        }
        inverse.reverse();

        Self {
            label: label.into(),
            forward,
            inverse,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Ids touched by this transaction, in forward order.
    pub fn targets(&self) -> impl Iterator<Item = &ObjectId> {
        self.forward.iter().map(Operation::target)
    }

    pub fn apply_forward(&self, registry: &mut Registry) {
        for op in &self.forward {
            op.apply(registry);
        }
    }

    pub fn apply_inverse(&self, registry: &mut Registry) {
        for op in &self.inverse {
            op.apply(registry);
        }
    }
}

// =============================================================================
// REMOTE SINK
// =============================================================================

/// Receiver of operation batches, one batch per logical edit.
///
/// Implementations must not block the caller for long; acknowledgment is
/// not required and errors are never retried by the session.
pub trait OperationSink: Send + Sync {
    fn dispatch(&self, label: &str, operations: &[Operation]) -> Result<(), LoreError>;
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OperationSink for NullSink {
    fn dispatch(&self, _label: &str, _operations: &[Operation]) -> Result<(), LoreError> {
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
