//! # Property-Based Tests
//!
//! Randomised edit sequences checked against the registry invariants:
//! backref symmetry, cascade completeness, acyclic containment, the
//! temporal forest and exact undo.

use lorekeep_core::{
    Category, Chronology, LoreError, MutationEngine, ObjectId, ObjectKind, Registry, Session,
    TemporalDate, Traversal, validate_registry,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// EDIT SCRIPTS
// =============================================================================

/// One randomised session edit; indices are taken modulo the live node count.
#[derive(Debug, Clone)]
enum Edit {
    Note,
    Child(usize),
    Link(usize, usize),
    Promote(usize),
    Reparent(usize, usize),
    Delete(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        2 => Just(Edit::Note),
        3 => any::<usize>().prop_map(Edit::Child),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Link(a, b)),
        1 => any::<usize>().prop_map(Edit::Promote),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Reparent(a, b)),
        1 => any::<usize>().prop_map(Edit::Delete),
    ]
}

fn pick<'a>(ids: &'a [ObjectId], index: usize) -> Option<&'a ObjectId> {
    ids.get(index.checked_rem(ids.len())?)
}

/// Apply an edit, ignoring refusals; the session must stay consistent either way.
fn apply(session: &mut Session, edit: &Edit) -> Result<(), LoreError> {
    let notes: Vec<ObjectId> = session
        .registry()
        .objects()
        .filter(|o| o.note().is_some() && !o.is_hub())
        .map(|o| o.id.clone())
        .collect();
    let containers: Vec<ObjectId> = session
        .registry()
        .objects()
        .filter(|o| o.container().is_some() && !o.is_snapshot())
        .map(|o| o.id.clone())
        .collect();
    let links: Vec<ObjectId> = session
        .registry()
        .objects()
        .filter(|o| o.is_plain_link())
        .map(|o| o.id.clone())
        .collect();

    match edit {
        Edit::Note => session
            .create_note(ObjectKind::ContainerNote, "Folder", Category::Location, "", &[])
            .map(|_| ()),
        Edit::Child(p) => match pick(&containers, *p) {
            Some(parent) => {
                let parent = parent.clone();
                session
                    .add_child(&parent, ObjectKind::ContainerNote, "Child", Category::Location)
                    .map(|_| ())
            }
            None => Ok(()),
        },
        Edit::Link(a, b) => match (pick(&notes, *a), pick(&notes, *b)) {
            (Some(a), Some(b)) => {
                let (a, b) = (a.clone(), b.clone());
                session.link(&a, &b, "knows", "known by").map(|_| ())
            }
            _ => Ok(()),
        },
        Edit::Promote(l) => match pick(&links, *l) {
            Some(link) => {
                let link = link.clone();
                session.promote_to_hub(&link).map(|_| ())
            }
            None => Ok(()),
        },
        Edit::Reparent(c, p) => match (pick(&notes, *c), pick(&containers, *p)) {
            (Some(child), Some(parent)) => {
                let (child, parent) = (child.clone(), parent.clone());
                session.reparent(&child, &parent, None)
            }
            _ => Ok(()),
        },
        Edit::Delete(n) => match pick(&notes, *n) {
            Some(node) => {
                let node = node.clone();
                session.delete(&node)
            }
            None => Ok(()),
        },
    }
}

/// No container is reachable from its own children.
fn containment_is_acyclic(registry: &Registry) -> bool {
    registry
        .objects()
        .all(|o| !lorekeep_core::validator::is_descendant(registry, &o.id, &o.id))
}

/// Every object has at most one container.
fn containment_is_single_parent(registry: &Registry) -> bool {
    registry.ids().all(|id| registry.parents_of(id).len() <= 1)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Whatever the edit script, backrefs stay symmetric and nothing dangles.
    #[test]
    fn random_edits_keep_registry_consistent(edits in vec(edit(), 1..40)) {
        let mut session = Session::new();
        for e in &edits {
            let _ = apply(&mut session, e);
        }
        let registry = session.registry();
        let violations: Vec<_> = validate_registry(registry)
            .into_iter()
            .filter(|(_, v)| !matches!(v, lorekeep_core::Violation::UnderpopulatedHub(_)))
            .collect();
        prop_assert!(violations.is_empty(), "{:?}", violations);
        prop_assert!(containment_is_acyclic(registry));
        prop_assert!(containment_is_single_parent(registry));
    }

    /// A refused edit leaves the registry untouched.
    #[test]
    fn refused_edits_are_invisible(edits in vec(edit(), 1..30)) {
        let mut session = Session::new();
        for e in &edits {
            let before = session.registry().clone();
            let depth = session.history().count();
            if apply(&mut session, e).is_err() {
                prop_assert_eq!(session.registry(), &before);
                prop_assert_eq!(session.history().count(), depth);
            }
        }
    }

    /// N edits followed by N undos restore the starting registry exactly.
    #[test]
    fn undo_is_exact(edits in vec(edit(), 1..30)) {
        let mut session = Session::new().with_history_limit(0);
        for e in &edits {
            let _ = apply(&mut session, e);
        }
        let after = session.registry().clone();
        let depth = session.history().count();

        for _ in 0..depth {
            prop_assert!(session.undo().is_some());
        }
        prop_assert!(session.registry().is_empty());

        for _ in 0..depth {
            prop_assert!(session.redo().is_some());
        }
        prop_assert_eq!(session.registry(), &after);
    }

    /// Deleting a node removes every link and hub that touched it.
    #[test]
    fn delete_cascade_is_complete(
        pairs in vec((0usize..8, 0usize..8), 1..20),
        victim in 0usize..8,
    ) {
        let mut registry = Registry::new();
        let nodes: Vec<ObjectId> = (0..8)
            .map(|i| {
                MutationEngine::create_node(
                    &mut registry,
                    ObjectKind::SimpleNote,
                    &format!("N{}", i),
                    Category::Character,
                    "",
                    &[],
                )
                .expect("create")
            })
            .collect();
        for (a, b) in &pairs {
            if a != b {
                MutationEngine::create_binary_link(&mut registry, &nodes[*a], &nodes[*b], "knows", "")
                    .expect("link");
            }
        }

        let doomed = &nodes[victim];
        prop_assert!(MutationEngine::delete_node(&mut registry, doomed));
        prop_assert!(!registry.contains(doomed));
        for object in registry.objects() {
            prop_assert!(!object.link_ids.contains(doomed));
            if let Some(link) = object.link() {
                prop_assert!(!link.touches(doomed));
            }
        }
        prop_assert!(validate_registry(&registry).is_empty());
    }

    /// Inference builds a forest: every snapshot has exactly one temporal parent.
    #[test]
    fn inferred_eras_form_a_forest(
        ranges in vec((1000i32..1500, 0i32..300), 1..12)
    ) {
        let mut registry = Registry::new();
        let base = MutationEngine::create_node(
            &mut registry,
            ObjectKind::SimpleNote,
            "Base",
            Category::Location,
            "",
            &[],
        )
        .expect("base");
        for (start, len) in &ranges {
            let _ = Chronology::create_snapshot(
                &mut registry,
                &base,
                "Era",
                TemporalDate::year(*start),
                Some(TemporalDate::year(start.saturating_add(*len))),
            );
        }

        let placed = Chronology::infer_temporal_hierarchy(&mut registry, &base).expect("infer");
        let snapshots: BTreeSet<ObjectId> = registry.snapshots_of(&base).into_iter().collect();
        prop_assert_eq!(placed, snapshots.len());

        let mut seen = BTreeSet::new();
        let mut stack = vec![base.clone()];
        while let Some(current) = stack.pop() {
            let children = registry
                .get(&current)
                .and_then(|o| o.time_state.as_ref())
                .map(|ts| ts.time_children.clone())
                .unwrap_or_default();
            for child in children {
                prop_assert!(seen.insert(child.clone()), "{} placed twice", child);
                stack.push(child);
            }
        }
        prop_assert_eq!(seen, snapshots);
    }

    /// A hub keeps every participant the binary link had, and the link is gone.
    #[test]
    fn promotion_preserves_endpoints(verb in "[a-z]{1,8}") {
        let mut registry = Registry::new();
        let a = MutationEngine::create_node(&mut registry, ObjectKind::SimpleNote, "A", Category::Organization, "", &[])
            .expect("a");
        let b = MutationEngine::create_node(&mut registry, ObjectKind::SimpleNote, "B", Category::Organization, "", &[])
            .expect("b");
        let link = MutationEngine::create_binary_link(&mut registry, &a, &b, &verb, "").expect("link");

        let hub = MutationEngine::promote_to_hub(&mut registry, &link).expect("hub");
        prop_assert_eq!(&hub, &link);
        let participants = Traversal::hub_context(&registry, &hub);
        prop_assert_eq!(participants.len(), 2);
        prop_assert!(participants.iter().any(|p| p.node_id == a));
        prop_assert!(participants.iter().any(|p| p.node_id == b));
        prop_assert!(Traversal::traverse_binary(&registry, &a, None).is_empty());
        prop_assert!(validate_registry(&registry).is_empty());
    }
}
