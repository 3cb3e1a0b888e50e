//! # Session Module
//!
//! The transaction layer over a [`Registry`].
//!
//! Every edit runs inside a change capture. If the edit fails, the captured
//! pre-images are restored and the registry is left exactly as it was. If it
//! succeeds, the capture becomes a [`Transaction`] that is pushed onto the
//! undo stack and handed to the [`OperationSink`].
//!
//! Undo and redo replay the recorded inverse and forward operations; they
//! never swap whole registries. A new edit clears the redo stack.
//!
//! ## Errors
//!
//! Validators and kernel guards never fail loudly. The session is the layer
//! that turns a refused edit into a `LoreError` for the caller. Sink errors
//! are logged at debug level and discarded; local state is authoritative.

use crate::chronology::Chronology;
use crate::integrity::{IntegrityService, LinkStatus, StructuralIntegrity};
use crate::mutation::{LinkPatch, MutationEngine, NotePatch};
use crate::oplog::{NullSink, Operation, OperationSink, Transaction};
use crate::primitives::{DEFAULT_HISTORY_LIMIT, VERB_CONTAINED_IN, VERB_CONTAINS};
use crate::reify::{find_bridge, reify_link, reify_node};
use crate::traversal::Traversal;
use crate::validator::{
    Violation, is_data_locked, validate_category_change, validate_link_endpoints,
    validate_range_continuity,
};
use crate::{
    Category, HierarchyType, LoreError, ObjectId, ObjectKind, Registry, Scalar, TemporalDate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry plus edit history, the unit that gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub registry: Registry,
    pub undo: Vec<Transaction>,
    pub redo: Vec<Transaction>,
}

/// A single-actor editing session.
pub struct Session {
    registry: Registry,
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
    /// Maximum undo depth; 0 keeps everything.
    history_limit: usize,
    sink: Arc<dyn OperationSink>,
    integrity: Box<dyn IntegrityService + Send + Sync>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("objects", &self.registry.len())
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new session over an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Create a session over an existing registry with empty history.
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            sink: Arc::new(NullSink),
            integrity: Box::new(StructuralIntegrity),
        }
    }

    /// Resume a persisted session.
    #[must_use]
    pub fn from_state(state: SessionState) -> Self {
        let mut session = Self::with_registry(state.registry);
        session.undo_stack = state.undo;
        session.redo_stack = state.redo;
        session
    }

    /// Snapshot the registry and history for persistence.
    #[must_use]
    pub fn to_state(&self) -> SessionState {
        SessionState {
            registry: self.registry.clone(),
            undo: self.undo_stack.clone(),
            redo: self.redo_stack.clone(),
        }
    }

    /// Cap the undo stack; 0 means unbounded. Trims immediately.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self.trim_history();
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OperationSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_integrity(mut self, integrity: impl IntegrityService + Send + Sync + 'static) -> Self {
        self.integrity = Box::new(integrity);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Labels on the undo stack, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.undo_stack.iter().map(|t| t.label.as_str())
    }

    /// Link status annotations from the integrity service.
    #[must_use]
    pub fn integrity_map(&self) -> BTreeMap<ObjectId, LinkStatus> {
        self.integrity.integrity_map(&self.registry)
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Run `edit` as one reversible transaction labelled `label`.
    ///
    /// On error every captured change is rolled back before returning.
    fn transact<T>(
        &mut self,
        label: &str,
        edit: impl FnOnce(&mut Registry) -> Result<T, LoreError>,
    ) -> Result<T, LoreError> {
        self.registry.begin_capture();
        let result = edit(&mut self.registry);
        let pre_images = self.registry.end_capture();

        match result {
            Err(e) => {
                debug!(label, error = %e, rolled_back = pre_images.len(), "edit rejected");
                self.registry.restore(pre_images);
                Err(e)
            }
            Ok(value) => {
                let txn = Transaction::from_pre_images(label, &self.registry, pre_images);
                if !txn.is_empty() {
                    self.dispatch(&txn.label, &txn.forward);
                    self.redo_stack.clear();
                    self.undo_stack.push(txn);
                    self.trim_history();
                }
                Ok(value)
            }
        }
    }

    fn trim_history(&mut self) {
        if self.history_limit > 0 && self.undo_stack.len() > self.history_limit {
            let excess = self.undo_stack.len().saturating_sub(self.history_limit);
            self.undo_stack.drain(..excess);
        }
    }

    /// Fire-and-forget delivery to the sink.
    fn dispatch(&self, label: &str, operations: &[Operation]) {
        if let Err(e) = self.sink.dispatch(label, operations) {
            debug!(label, error = %e, "operation sink failed; discarded");
        }
    }

    /// Revert the most recent transaction. Returns its label.
    pub fn undo(&mut self) -> Option<String> {
        let txn = self.undo_stack.pop()?;
        txn.apply_inverse(&mut self.registry);
        self.dispatch(&format!("undo {}", txn.label), &txn.inverse);
        info!(label = %txn.label, "undo");
        let label = txn.label.clone();
        self.redo_stack.push(txn);
        Some(label)
    }

    /// Re-apply the most recently undone transaction. Returns its label.
    pub fn redo(&mut self) -> Option<String> {
        let txn = self.redo_stack.pop()?;
        txn.apply_forward(&mut self.registry);
        self.dispatch(&format!("redo {}", txn.label), &txn.forward);
        info!(label = %txn.label, "redo");
        let label = txn.label.clone();
        self.undo_stack.push(txn);
        Some(label)
    }

    // =========================================================================
    // NODES AND CONTAINMENT
    // =========================================================================

    /// Create a free-standing note.
    pub fn create_note(
        &mut self,
        kind: ObjectKind,
        title: &str,
        category: Category,
        gist: &str,
        aliases: &[&str],
    ) -> Result<ObjectId, LoreError> {
        if !kind.is_note_kind() {
            return Err(LoreError::Rejected(format!("{} is not a note kind", kind)));
        }
        if category == Category::State {
            return Err(LoreError::Rejected(
                "STATE is reserved for historical snapshots".to_string(),
            ));
        }
        self.transact("create note", |registry| {
            MutationEngine::create_node(registry, kind, title, category, gist, aliases)
                .ok_or_else(|| LoreError::Rejected("note creation refused".to_string()))
        })
    }

    /// Create a note inside `parent` and shadow the containment with a
    /// `PARENT_OF` hierarchical link.
    pub fn add_child(
        &mut self,
        parent: &ObjectId,
        kind: ObjectKind,
        title: &str,
        category: Category,
    ) -> Result<ObjectId, LoreError> {
        self.require_container(parent)?;
        self.require_unlocked(parent)?;
        self.transact("add child", |registry| {
            let child = MutationEngine::create_node(registry, kind, title, category, "", &[])
                .ok_or_else(|| LoreError::Rejected(format!("cannot create {} as {}", kind, category)))?;
            attach(registry, parent, &child)?;
            Ok(child)
        })
    }

    /// Move `child` under `new_parent`.
    ///
    /// `old_parent` defaults to the child's current container. The old
    /// parent's shadow links to the child are removed and a new shadow link
    /// from `new_parent` is created.
    pub fn reparent(
        &mut self,
        child: &ObjectId,
        new_parent: &ObjectId,
        old_parent: Option<&ObjectId>,
    ) -> Result<(), LoreError> {
        self.require(child)?;
        self.require_container(new_parent)?;
        self.require_unlocked(child)?;
        self.require_unlocked(new_parent)?;
        if self.integrity.detect_cycle(&self.registry, new_parent, child) {
            return Err(Violation::ContainmentCycle {
                parent: new_parent.clone(),
                child: child.clone(),
            }
            .into());
        }
        let old_parent = old_parent
            .cloned()
            .or_else(|| Traversal::ascend(&self.registry, child));
        if old_parent.as_ref() == Some(new_parent) {
            return Ok(());
        }

        self.transact("reparent", |registry| {
            if let Some(old) = &old_parent {
                MutationEngine::detach_child(registry, old, child);
                let shadows: Vec<ObjectId> = registry
                    .links_between(old, child)
                    .into_iter()
                    .filter(|l| registry.get(l).is_some_and(|o| o.is_hierarchical_link()))
                    .collect();
                for shadow in &shadows {
                    MutationEngine::delete_node(registry, shadow);
                }
            }
            attach(registry, new_parent, child)
        })
    }

    /// Cascade-delete an object.
    pub fn delete(&mut self, id: &ObjectId) -> Result<(), LoreError> {
        self.require(id)?;
        self.transact("delete", |registry| {
            MutationEngine::delete_node(registry, id);
            Ok(())
        })
    }

    /// Recompute subtree mass bottom-up under `root`.
    pub fn recompute_mass(&mut self, root: &ObjectId) -> Result<f64, LoreError> {
        self.require(root)?;
        self.transact("recompute mass", |registry| {
            MutationEngine::recompute_mass_tree(registry, root)
                .ok_or_else(|| LoreError::NotFound(root.clone()))
        })
    }

    // =========================================================================
    // LINKS AND HUBS
    // =========================================================================

    /// Create a binary link.
    pub fn link(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
        verb: &str,
        verb_inverse: &str,
    ) -> Result<ObjectId, LoreError> {
        self.require(source)?;
        self.require(target)?;
        validate_link_endpoints(source, target)?;
        self.transact("link", |registry| {
            MutationEngine::create_binary_link(registry, source, target, verb, verb_inverse)
                .ok_or_else(|| LoreError::Rejected("link refused".to_string()))
        })
    }

    /// Create a hierarchical link.
    pub fn link_hierarchical(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
        hierarchy_type: HierarchyType,
        verb: &str,
        verb_inverse: &str,
    ) -> Result<ObjectId, LoreError> {
        self.require(source)?;
        self.require(target)?;
        validate_link_endpoints(source, target)?;
        self.transact("link hierarchical", |registry| {
            MutationEngine::create_hierarchical_link(
                registry,
                source,
                target,
                hierarchy_type,
                verb,
                verb_inverse,
            )
            .ok_or_else(|| LoreError::Rejected("link refused".to_string()))
        })
    }

    /// Bound a link (or other non-snapshot object) in time.
    pub fn set_time_range(
        &mut self,
        id: &ObjectId,
        start: Option<TemporalDate>,
        end: Option<TemporalDate>,
    ) -> Result<(), LoreError> {
        self.require_unlocked(id)?;
        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            return Err(Violation::InvertedRange.into());
        }
        self.transact("set time range", |registry| {
            MutationEngine::set_time_range(registry, id, start, end)
                .then_some(())
                .ok_or_else(|| LoreError::NotFound(id.clone()))
        })
    }

    /// Replace a plain binary link with a two-participant hub.
    pub fn promote_to_hub(&mut self, link: &ObjectId) -> Result<ObjectId, LoreError> {
        if !self.require(link)?.is_plain_link() {
            return Err(wrong_variant(link, "plain binary link"));
        }
        self.transact("promote to hub", |registry| {
            MutationEngine::promote_to_hub(registry, link)
                .ok_or_else(|| wrong_variant(link, "plain binary link"))
        })
    }

    pub fn add_participant(
        &mut self,
        hub: &ObjectId,
        node: &ObjectId,
        role: &str,
        verb: &str,
    ) -> Result<(), LoreError> {
        self.require_hub(hub)?;
        self.require(node)?;
        if hub == node {
            return Err(LoreError::Rejected("a hub cannot take part in itself".to_string()));
        }
        self.transact("add participant", |registry| {
            MutationEngine::add_participant(registry, hub, node, role, verb)
                .then_some(())
                .ok_or_else(|| LoreError::Rejected("participant refused".to_string()))
        })
    }

    pub fn remove_participant(&mut self, hub: &ObjectId, node: &ObjectId) -> Result<(), LoreError> {
        self.require_hub(hub)?;
        self.transact("remove participant", |registry| {
            MutationEngine::remove_participant(registry, hub, node)
                .then_some(())
                .ok_or_else(|| Violation::UnderpopulatedHub(hub.clone()).into())
        })
    }

    // =========================================================================
    // REIFICATION
    // =========================================================================

    /// Turn a plain binary link into an addressable node.
    pub fn reify_link(&mut self, link: &ObjectId) -> Result<ObjectId, LoreError> {
        if !self.require(link)?.is_plain_link() {
            return Err(wrong_variant(link, "plain binary link"));
        }
        self.transact("reify link", |registry| {
            reify_link(registry, link).ok_or_else(|| wrong_variant(link, "plain binary link"))
        })
    }

    /// Collapse a bridging node into a hub governing its neighbours.
    pub fn reify_node(&mut self, node: &ObjectId) -> Result<ObjectId, LoreError> {
        self.require_unlocked(node)?;
        if find_bridge(&self.registry, node).is_none() {
            return Err(LoreError::Rejected(format!(
                "{} does not bridge exactly one incoming and one outgoing link",
                node
            )));
        }
        self.transact("reify node", |registry| {
            reify_node(registry, node).ok_or_else(|| wrong_variant(node, "leaf note"))
        })
    }

    // =========================================================================
    // FIELD UPDATES
    // =========================================================================

    /// Patch a note's fields. Snapshot data is read-only.
    pub fn update_note(&mut self, id: &ObjectId, patch: &NotePatch) -> Result<(), LoreError> {
        let object = self.require(id)?;
        if object.note().is_none() {
            return Err(wrong_variant(id, "note"));
        }
        if let Some(category) = patch.category {
            validate_category_change(object, category)?;
        }
        self.require_unlocked(id)?;
        self.transact("update note", |registry| {
            MutationEngine::update_node(registry, id, patch)
                .then_some(())
                .ok_or_else(|| LoreError::Rejected("update refused".to_string()))
        })
    }

    pub fn update_link(&mut self, id: &ObjectId, patch: &LinkPatch) -> Result<(), LoreError> {
        if self.require(id)?.link().is_none() {
            return Err(wrong_variant(id, "binary link"));
        }
        self.require_unlocked(id)?;
        self.transact("update link", |registry| {
            MutationEngine::update_link(registry, id, patch)
                .then_some(())
                .ok_or_else(|| wrong_variant(id, "binary link"))
        })
    }

    pub fn set_qualifier(&mut self, link: &ObjectId, key: &str, value: Scalar) -> Result<(), LoreError> {
        if self.require(link)?.link().is_none() {
            return Err(wrong_variant(link, "binary link"));
        }
        self.require_unlocked(link)?;
        self.transact("set qualifier", |registry| {
            MutationEngine::set_qualifier(registry, link, key, value)
                .then_some(())
                .ok_or_else(|| wrong_variant(link, "binary link"))
        })
    }

    /// Remove a qualifier. Returns whether it existed.
    pub fn remove_qualifier(&mut self, link: &ObjectId, key: &str) -> Result<bool, LoreError> {
        if self.require(link)?.link().is_none() {
            return Err(wrong_variant(link, "binary link"));
        }
        self.require_unlocked(link)?;
        self.transact("remove qualifier", |registry| {
            Ok(MutationEngine::remove_qualifier(registry, link, key))
        })
    }

    // =========================================================================
    // TIME
    // =========================================================================

    /// Create a snapshot of `base` over `[start, end]` and re-infer the era tree.
    pub fn create_snapshot(
        &mut self,
        base: &ObjectId,
        title: &str,
        start: TemporalDate,
        end: Option<TemporalDate>,
    ) -> Result<ObjectId, LoreError> {
        let object = self.require(base)?;
        if object.note().is_none() {
            return Err(wrong_variant(base, "note"));
        }
        if is_data_locked(object) {
            return Err(LoreError::Locked(base.clone()));
        }
        let unallocated = ObjectId::new("");
        validate_range_continuity(&self.registry, &unallocated, base, &start, end.as_ref())?;
        self.transact("create snapshot", |registry| {
            let snapshot = Chronology::create_snapshot(registry, base, title, start, end)
                .ok_or_else(|| LoreError::Rejected("snapshot refused".to_string()))?;
            Chronology::infer_temporal_hierarchy(registry, base);
            Ok(snapshot)
        })
    }

    /// Convert a flat year-indexed stack into snapshots of `base`.
    pub fn import_flat_stack(
        &mut self,
        base: &ObjectId,
        entries: &[(i32, String)],
    ) -> Result<Vec<ObjectId>, LoreError> {
        self.require_unlocked(base)?;
        self.transact("import flat stack", |registry| {
            Chronology::import_flat_stack(registry, base, entries)
                .ok_or_else(|| LoreError::Rejected("flat stack has colliding years".to_string()))
        })
    }

    /// Rebuild the era tree of `base`. Returns the number of snapshots placed.
    pub fn infer_temporal_hierarchy(&mut self, base: &ObjectId) -> Result<usize, LoreError> {
        self.require(base)?;
        self.transact("infer temporal hierarchy", |registry| {
            Chronology::infer_temporal_hierarchy(registry, base)
                .ok_or_else(|| LoreError::NotFound(base.clone()))
        })
    }

    // =========================================================================
    // GUARDS
    // =========================================================================

    fn require(&self, id: &ObjectId) -> Result<&crate::GraphObject, LoreError> {
        self.registry
            .get(id)
            .ok_or_else(|| LoreError::NotFound(id.clone()))
    }

    fn require_unlocked(&self, id: &ObjectId) -> Result<(), LoreError> {
        if is_data_locked(self.require(id)?) {
            return Err(LoreError::Locked(id.clone()));
        }
        Ok(())
    }

    fn require_container(&self, id: &ObjectId) -> Result<(), LoreError> {
        if self.require(id)?.container().is_none() {
            return Err(wrong_variant(id, "container"));
        }
        Ok(())
    }

    fn require_hub(&self, id: &ObjectId) -> Result<(), LoreError> {
        if !self.require(id)?.is_hub() {
            return Err(wrong_variant(id, "hub"));
        }
        Ok(())
    }
}

/// Place `child` under `parent` and add the shadow hierarchical link.
fn attach(registry: &mut Registry, parent: &ObjectId, child: &ObjectId) -> Result<(), LoreError> {
    if !MutationEngine::enforce_hierarchy(registry, parent, child) {
        return Err(LoreError::Rejected(format!(
            "{} cannot be placed under {}",
            child, parent
        )));
    }
    MutationEngine::create_hierarchical_link(
        registry,
        parent,
        child,
        HierarchyType::ParentOf,
        VERB_CONTAINS,
        VERB_CONTAINED_IN,
    )
    .map(|_| ())
    .ok_or_else(|| LoreError::Rejected("shadow link refused".to_string()))
}

fn wrong_variant(id: &ObjectId, expected: &'static str) -> LoreError {
    LoreError::WrongVariant {
        id: id.clone(),
        expected,
    }
}

// =============================================================================
// TESTS
// =============================================================================
