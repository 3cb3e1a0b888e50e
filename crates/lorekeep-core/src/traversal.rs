//! # Read Primitives
//!
//! Single-step traversals over a [`Registry`]. Every function is pure and
//! tolerates dangling ids by skipping them.

use crate::{GraphObject, ObjectId, Participant, Registry, TemporalDate};

/// Namespace for the read primitives.
pub struct Traversal;

impl Traversal {
    /// First container (in id order) whose children include `node`.
    ///
    /// The kernel keeps containment single-parent, so "first" is "only" for
    /// registries built through it.
    #[must_use]
    pub fn ascend(registry: &Registry, node: &ObjectId) -> Option<ObjectId> {
        registry
            .objects()
            .find(|o| o.children().contains(node))
            .map(|o| o.id.clone())
    }

    /// Hierarchical parent of `node`, preferring temporal hierarchy links.
    ///
    /// Looks at incoming hierarchical links first. With `at` given, a link
    /// whose range covers `at` wins over a timeless link; without `at`, only
    /// timeless links qualify. Falls back to [`Traversal::ascend`].
    #[must_use]
    pub fn hierarchy_root(
        registry: &Registry,
        node: &ObjectId,
        at: Option<&TemporalDate>,
    ) -> Option<ObjectId> {
        let incoming: Vec<&GraphObject> = registry
            .get(node)
            .map(|o| {
                o.link_ids
                    .iter()
                    .filter_map(|l| registry.get(l))
                    .filter(|l| l.is_hierarchical_link())
                    .filter(|l| l.link().is_some_and(|t| &t.target_id == node))
                    .collect()
            })
            .unwrap_or_default();

        let timed = at.and_then(|at| {
            incoming
                .iter()
                .find(|l| l.time_state.as_ref().is_some_and(|ts| !is_timeless(ts) && ts.covers(at)))
        });
        let timeless = || {
            incoming
                .iter()
                .find(|l| l.time_state.as_ref().is_none_or(is_timeless))
        };

        timed
            .or_else(timeless)
            .and_then(|l| l.link())
            .map(|t| t.source_id.clone())
            .or_else(|| Self::ascend(registry, node))
    }

    /// Direct children of a container.
    #[must_use]
    pub fn descend(registry: &Registry, node: &ObjectId) -> Vec<ObjectId> {
        registry
            .get(node)
            .map(|o| o.children().to_vec())
            .unwrap_or_default()
    }

    /// Other endpoints of the binary links in `node.link_ids`, in link order.
    ///
    /// Direction is ignored. `verb` keeps only links with that exact verb.
    #[must_use]
    pub fn traverse_binary(registry: &Registry, node: &ObjectId, verb: Option<&str>) -> Vec<ObjectId> {
        let Some(object) = registry.get(node) else {
            return Vec::new();
        };

        let mut neighbors: Vec<ObjectId> = Vec::new();
        for link in object.link_ids.iter().filter_map(|l| registry.get(l)) {
            let Some(traits) = link.link() else { continue };
            if verb.is_some_and(|v| traits.verb != v) {
                continue;
            }
            if let Some(other) = traits.other_end(node)
                && !neighbors.contains(other)
            {
                neighbors.push(other.clone());
            }
        }
        neighbors
    }

    /// Hubs `node` takes part in, in `link_ids` order.
    #[must_use]
    pub fn expand_hubs<'a>(registry: &'a Registry, node: &ObjectId) -> Vec<&'a GraphObject> {
        registry
            .get(node)
            .map(|o| {
                o.link_ids
                    .iter()
                    .filter_map(|l| registry.get(l))
                    .filter(|h| h.hub().is_some_and(|set| set.contains(node)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Participants of a hub; empty for anything else.
    #[must_use]
    pub fn hub_context<'a>(registry: &'a Registry, hub: &ObjectId) -> &'a [Participant] {
        registry
            .get(hub)
            .and_then(|o| o.hub())
            .map(|set| set.participants.as_slice())
            .unwrap_or_default()
    }

    /// First temporal child of `node` whose range covers `at`.
    #[must_use]
    pub fn seek_snapshot(registry: &Registry, node: &ObjectId, at: &TemporalDate) -> Option<ObjectId> {
        time_children(registry, node)
            .find(|s| s.time_state.as_ref().is_some_and(|ts| ts.covers(at)))
            .map(|s| s.id.clone())
    }

    /// Temporal children of `node` whose range overlaps `[start, end]`.
    #[must_use]
    pub fn scan_range(
        registry: &Registry,
        node: &ObjectId,
        start: &TemporalDate,
        end: &TemporalDate,
    ) -> Vec<ObjectId> {
        time_children(registry, node)
            .filter(|s| s.time_state.as_ref().is_some_and(|ts| ts.overlaps(start, end)))
            .map(|s| s.id.clone())
            .collect()
    }
}

fn is_timeless(ts: &crate::TimeState) -> bool {
    ts.effective_date.is_none() && ts.valid_until.is_none()
}

fn time_children<'a>(registry: &'a Registry, node: &ObjectId) -> impl Iterator<Item = &'a GraphObject> {
    registry
        .get(node)
        .and_then(|o| o.time_state.as_ref())
        .map(|ts| ts.time_children.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|c| registry.get(c))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, HierarchyType, MutationEngine, ObjectKind, TimeState};

    fn note(registry: &mut Registry, kind: ObjectKind, title: &str) -> ObjectId {
        MutationEngine::create_node(registry, kind, title, Category::Location, "", &[])
            .expect("create")
    }

    #[test]
    fn ascend_and_descend_mirror_each_other() {
        let mut registry = Registry::new();
        let city = note(&mut registry, ObjectKind::ContainerNote, "City");
        let street = note(&mut registry, ObjectKind::SimpleNote, "Street");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &city, &street));

        assert_eq!(Traversal::ascend(&registry, &street), Some(city.clone()));
        assert_eq!(Traversal::descend(&registry, &city), vec![street]);
        assert_eq!(Traversal::ascend(&registry, &city), None);
    }

    #[test]
    fn traverse_binary_ignores_direction_and_filters_verb() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::SimpleNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let c = note(&mut registry, ObjectKind::SimpleNote, "C");
        MutationEngine::create_binary_link(&mut registry, &a, &b, "borders", "").expect("link");
        MutationEngine::create_binary_link(&mut registry, &c, &a, "trades with", "").expect("link");

        assert_eq!(Traversal::traverse_binary(&registry, &a, None), vec![b.clone(), c.clone()]);
        assert_eq!(Traversal::traverse_binary(&registry, &a, Some("trades with")), vec![c]);
        assert!(Traversal::traverse_binary(&registry, &a, Some("nothing")).is_empty());
    }

    #[test]
    fn hubs_are_found_from_participants() {
        let mut registry = Registry::new();
        let a = note(&mut registry, ObjectKind::SimpleNote, "A");
        let b = note(&mut registry, ObjectKind::SimpleNote, "B");
        let link = MutationEngine::create_binary_link(&mut registry, &a, &b, "war", "").expect("link");
        let hub = MutationEngine::promote_to_hub(&mut registry, &link).expect("hub");

        let hubs = Traversal::expand_hubs(&registry, &b);
        assert_eq!(hubs.len(), 1);
        assert_eq!(hubs[0].id, hub);
        assert_eq!(Traversal::hub_context(&registry, &hub).len(), 2);
        assert!(Traversal::hub_context(&registry, &a).is_empty());
        // A hub is not a binary link.
        assert!(Traversal::traverse_binary(&registry, &a, None).is_empty());
    }

    #[test]
    fn hierarchy_root_prefers_covering_temporal_link() {
        let mut registry = Registry::new();
        let empire = note(&mut registry, ObjectKind::ContainerNote, "Empire");
        let republic = note(&mut registry, ObjectKind::ContainerNote, "Republic");
        let folder = note(&mut registry, ObjectKind::ContainerNote, "Atlas");
        let city = note(&mut registry, ObjectKind::SimpleNote, "City");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &folder, &city));

        let ruled = MutationEngine::create_hierarchical_link(
            &mut registry,
            &empire,
            &city,
            HierarchyType::PartOf,
            "rules",
            "",
        )
        .expect("link");
        assert!(MutationEngine::set_time_range(
            &mut registry,
            &ruled,
            Some(TemporalDate::year(1700)),
            Some(TemporalDate::year(1800)),
        ));
        MutationEngine::create_hierarchical_link(
            &mut registry,
            &republic,
            &city,
            HierarchyType::PartOf,
            "governs",
            "",
        )
        .expect("link");

        let in_1750 = TemporalDate::year(1750);
        let in_1900 = TemporalDate::year(1900);
        assert_eq!(Traversal::hierarchy_root(&registry, &city, Some(&in_1750)), Some(empire));
        assert_eq!(Traversal::hierarchy_root(&registry, &city, Some(&in_1900)), Some(republic.clone()));
        assert_eq!(Traversal::hierarchy_root(&registry, &city, None), Some(republic));
    }

    #[test]
    fn hierarchy_root_falls_back_to_ascend() {
        let mut registry = Registry::new();
        let folder = note(&mut registry, ObjectKind::ContainerNote, "Atlas");
        let city = note(&mut registry, ObjectKind::SimpleNote, "City");
        assert!(MutationEngine::enforce_hierarchy(&mut registry, &folder, &city));
        assert_eq!(Traversal::hierarchy_root(&registry, &city, None), Some(folder));
    }

    #[test]
    fn seek_and_scan_use_time_children() {
        let mut registry = Registry::new();
        let base = note(&mut registry, ObjectKind::SimpleNote, "Rome");
        let early = note(&mut registry, ObjectKind::SimpleNote, "Kingdom");
        let late = note(&mut registry, ObjectKind::SimpleNote, "Republic");
        for (id, start, end) in [(&early, 753, Some(509)), (&late, 509, None)] {
            let obj = registry.get_mut(id).expect("snapshot");
            obj.time_state = Some(TimeState::snapshot(
                base.clone(),
                TemporalDate::year(-start),
                end.map(|e: i32| TemporalDate::year(-e)),
            ));
        }
        registry.get_mut(&base).expect("base").time_state = Some(TimeState {
            time_children: vec![early.clone(), late.clone()],
            ..TimeState::anchor()
        });

        assert_eq!(
            Traversal::seek_snapshot(&registry, &base, &TemporalDate::year(-600)),
            Some(early.clone())
        );
        assert_eq!(
            Traversal::seek_snapshot(&registry, &base, &TemporalDate::year(100)),
            Some(late.clone())
        );
        assert_eq!(
            Traversal::scan_range(&registry, &base, &TemporalDate::year(-520), &TemporalDate::year(-400)),
            vec![early, late]
        );
        assert!(Traversal::scan_range(&registry, &base, &TemporalDate::year(-900), &TemporalDate::year(-800))
            .is_empty());
    }
}
