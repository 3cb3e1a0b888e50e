//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the kernel is INVALID.
//!
//! ## Tiers
//! - T0: Object Integrity
//! - T1: Deterministic Mutation
//! - T2: Traversal and Search
//! - T3: Time and History

use lorekeep_core::{
    Category, Chronology, Cortex, FilterCriteria, LoreError, MutationEngine, ObjectId, ObjectKind,
    Registry, Session, TemporalDate, Traversal, Violation, validate_registry,
};

fn note(registry: &mut Registry, kind: ObjectKind, title: &str) -> ObjectId {
    MutationEngine::create_node(registry, kind, title, Category::Character, "", &[])
        .expect("create")
}

// =============================================================================
// TIER T0: OBJECT INTEGRITY
// =============================================================================

mod t0_object_integrity {
    use super::*;

    /// T0.1: Only note kinds come out of the node factory.
    #[test]
    fn node_factory_rejects_link_kinds() {
        let mut registry = Registry::new();
        let created = MutationEngine::create_node(
            &mut registry,
            ObjectKind::SemanticLink,
            "Not a note",
            Category::Concept,
            "",
            &[],
        );
        assert!(created.is_none());
        assert!(registry.is_empty());
    }

    /// T0.2: STATE is reserved for snapshots.
    #[test]
    fn state_category_reserved() {
        let mut registry = Registry::new();
        let created = MutationEngine::create_node(
            &mut registry,
            ObjectKind::SimpleNote,
            "Era",
            Category::State,
            "",
            &[],
        );
        assert!(created.is_none());
    }

    /// T0.3: Every id is unique and the audit of a fresh build is clean.
    #[test]
    fn fresh_registry_audits_clean() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::ContainerNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let c = note(&mut registry, ObjectKind::StoryNote, "C");
        assert_ne!(a, b);
        assert_ne!(b, c);
        MutationEngine::create_binary_link(&mut registry, &a, &b, "guards", "guarded by")
            .expect("link");
        assert!(validate_registry(&registry).is_empty());
    }

    /// T0.4: Self links are refused.
    #[test]
    fn self_link_rejected() {
        let mut session = Session::new();
        let a = session
            .create_note(ObjectKind::SimpleNote, "A", Category::Item, "", &[])
            .expect("a");
        let err = session.link(&a, &a, "mirrors", "").expect_err("self link");
        assert!(matches!(err, LoreError::Invalid(Violation::SelfLink(_))));
    }
}

// =============================================================================
// TIER T1: DETERMINISTIC MUTATION
// =============================================================================

mod t1_deterministic_mutation {
    use super::*;

    fn build() -> Registry {
        let mut registry = Registry::new();
        let realm = note(&mut registry, ObjectKind::ContainerNote, "Realm");
        let king = note(&mut registry, ObjectKind::SimpleNote, "King");
        let rebel = note(&mut registry, ObjectKind::SimpleNote, "Rebel");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &realm, &king));
        let feud =
            MutationEngine::create_binary_link(&mut registry, &king, &rebel, "hunts", "hunted by")
                .expect("link");
        MutationEngine::promote_to_hub(&mut registry, &feud).expect("hub");
        registry
    }

    /// T1.1: Same edits produce the same ids and objects (timestamps aside).
    #[test]
    fn same_edits_same_ids() {
        let a = build();
        let b = build();
        let ids_a: Vec<&ObjectId> = a.ids().collect();
        let ids_b: Vec<&ObjectId> = b.ids().collect();
        assert_eq!(ids_a, ids_b);
        for (x, y) in a.objects().zip(b.objects()) {
            assert_eq!(x.kind, y.kind);
            assert_eq!(x.body, y.body);
            assert_eq!(x.link_ids, y.link_ids);
        }
    }

    /// T1.2: Deleting a node cascades through links and hubs.
    #[test]
    fn delete_cascades() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::SimpleNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let c = note(&mut registry, ObjectKind::SimpleNote, "C");
        let ab = MutationEngine::create_binary_link(&mut registry, &a, &b, "knows", "").expect("ab");
        let bc = MutationEngine::create_binary_link(&mut registry, &b, &c, "knows", "").expect("bc");

        assert!(MutationEngine::delete_node(&mut registry, &b));
        assert!(!registry.contains(&ab));
        assert!(!registry.contains(&bc));
        assert!(registry.get(&a).expect("a").link_ids.is_empty());
        assert!(registry.get(&c).expect("c").link_ids.is_empty());
        assert!(validate_registry(&registry).is_empty());
    }

    /// T1.3: Containment stays a single-parent tree.
    #[test]
    fn single_parent_containment() {
        let mut registry = Registry::new();
        let left = note(&mut registry, ObjectKind::ContainerNote, "Left");
        let right = note(&mut registry, ObjectKind::ContainerNote, "Right");
        let item = note(&mut registry, ObjectKind::SimpleNote, "Item");

        assert!(MutationEngine::enforce_hierarchy(&mut registry, &left, &item));
        assert!(!MutationEngine::enforce_hierarchy(&mut registry, &right, &item));
        assert!(!MutationEngine::enforce_hierarchy(&mut registry, &left, &left));
        assert_eq!(registry.parents_of(&item), vec![left]);
    }

    /// T1.4: Subtree mass sums internal weights bottom-up.
    #[test]
    fn mass_recomputes_bottom_up() {
        let mut registry = Registry::new();
        let root = note(&mut registry, ObjectKind::ContainerNote, "Root");
        let mid = note(&mut registry, ObjectKind::ContainerNote, "Mid");
        let leaf = note(&mut registry, ObjectKind::SimpleNote, "Leaf");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &root, &mid));
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &mid, &leaf));

        let total = MutationEngine::recompute_mass_tree(&mut registry, &root).expect("mass");
        assert!((total - 3.0).abs() < f64::EPSILON);
        let mid_mass = registry.get(&mid).expect("mid").total_subtree_mass;
        assert!((mid_mass - 2.0).abs() < f64::EPSILON);
    }
}

// =============================================================================
// TIER T2: TRAVERSAL AND SEARCH
// =============================================================================

mod t2_traversal {
    use super::*;

    /// T2.1: Binary traversal ignores direction and filters by verb.
    #[test]
    fn binary_neighbours_by_verb() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::SimpleNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let c = note(&mut registry, ObjectKind::SimpleNote, "C");
        MutationEngine::create_binary_link(&mut registry, &a, &b, "trades", "").expect("ab");
        MutationEngine::create_binary_link(&mut registry, &c, &a, "fears", "").expect("ca");

        assert_eq!(Traversal::traverse_binary(&registry, &a, None), vec![b.clone(), c.clone()]);
        assert_eq!(Traversal::traverse_binary(&registry, &a, Some("fears")), vec![c]);
        assert_eq!(Traversal::traverse_binary(&registry, &b, Some("fears")), Vec::<ObjectId>::new());
    }

    /// T2.2: Passive roles are traced back to the active agents.
    #[test]
    fn influence_names_the_agent() {
        let mut registry = Registry::new();
        let duke = note(&mut registry, ObjectKind::SimpleNote, "Duke");
        let spy = note(&mut registry, ObjectKind::SimpleNote, "Spy");
        let link = MutationEngine::create_binary_link(&mut registry, &duke, &spy, "betrays", "")
            .expect("link");
        let hub = MutationEngine::promote_to_hub(&mut registry, &link).expect("hub");

        let influences = Cortex::trace_influence(&registry, &spy);
        assert_eq!(influences.len(), 1);
        assert_eq!(influences[0].agent_id, duke);
        assert_eq!(influences[0].hub_id, hub);
        assert!(Cortex::trace_influence(&registry, &duke).is_empty());
    }

    /// T2.3: The filter sieves compose.
    #[test]
    fn filter_by_mass_and_verb() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::SimpleNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let c = note(&mut registry, ObjectKind::SimpleNote, "C");
        MutationEngine::create_binary_link(&mut registry, &a, &b, "rules", "").expect("link");
        for id in [&a, &b, &c] {
            MutationEngine::update_mass(&mut registry, id);
        }

        let ruled = Cortex::filter_graph(&registry, &FilterCriteria::new().with_verb("rules"));
        assert_eq!(ruled, vec![a.clone(), b.clone()]);

        let heavy = Cortex::filter_graph(&registry, &FilterCriteria::new().with_min_mass(5.0));
        assert!(heavy.is_empty());
    }

    /// T2.4: Siblings meet in their shared container.
    #[test]
    fn siblings_intersect_in_parent() {
        let mut registry = Registry::new();
        let hall = note(&mut registry, ObjectKind::ContainerNote, "Hall");
        let x = note(&mut registry, ObjectKind::SimpleNote, "X");
        let y = note(&mut registry, ObjectKind::SimpleNote, "Y");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &hall, &x));
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &hall, &y));
        assert_eq!(Cortex::find_intersection(&registry, &x, &y), Some(hall));
    }
}

// =============================================================================
// TIER T3: TIME AND HISTORY
// =============================================================================

mod t3_time_and_history {
    use super::*;

    /// T3.1: A flat stack becomes consecutive, seekable snapshots.
    #[test]
    fn flat_stack_is_seekable() {
        let mut registry = Registry::new();
        let city = note(&mut registry, ObjectKind::ContainerNote, "City");
        let entries = vec![
            (1900, "Boom".to_string()),
            (1800, "Founding".to_string()),
            (1950, "Decline".to_string()),
        ];
        let created = Chronology::import_flat_stack(&mut registry, &city, &entries).expect("import");
        assert_eq!(created.len(), 3);

        let founding = Traversal::seek_snapshot(&registry, &city, &TemporalDate::year(1850));
        assert_eq!(founding, Some(created[0].clone()));
        let decline = Traversal::seek_snapshot(&registry, &city, &TemporalDate::year(2020));
        assert_eq!(decline, Some(created[2].clone()));
        assert!(Traversal::seek_snapshot(&registry, &city, &TemporalDate::year(1700)).is_none());
        assert!(validate_registry(&registry).is_empty());
    }

    /// T3.2: Overlapping siblings are refused, adjacent ones accepted.
    #[test]
    fn overlap_refused_adjacency_accepted() {
        let mut registry = Registry::new();
        let base = note(&mut registry, ObjectKind::SimpleNote, "Base");
        Chronology::create_snapshot(&mut registry, &base, "A", TemporalDate::year(10), Some(TemporalDate::year(20)))
            .expect("a");
        assert!(
            Chronology::create_snapshot(&mut registry, &base, "B", TemporalDate::year(15), Some(TemporalDate::year(25)))
                .is_none()
        );
        Chronology::create_snapshot(&mut registry, &base, "C", TemporalDate::year(21), Some(TemporalDate::year(30)))
            .expect("c");
    }

    /// T3.3: Undo walks back through every edit exactly.
    #[test]
    fn undo_restores_every_intermediate_state() {
        let mut session = Session::new();
        let mut states = vec![session.registry().clone()];

        let world = session
            .create_note(ObjectKind::ContainerNote, "World", Category::World, "", &[])
            .expect("world");
        states.push(session.registry().clone());
        let hero = session
            .add_child(&world, ObjectKind::SimpleNote, "Hero", Category::Character)
            .expect("hero");
        states.push(session.registry().clone());
        session
            .create_snapshot(&hero, "Young", TemporalDate::year(1), Some(TemporalDate::year(18)))
            .expect("snapshot");
        states.push(session.registry().clone());
        session.delete(&world).expect("delete");

        while let Some(expected) = states.pop() {
            assert!(session.undo().is_some());
            assert_eq!(session.registry(), &expected);
        }
        assert!(!session.can_undo());
    }
}
