//! # Validator
//!
//! Structural and temporal rules, as pure functions over a registry.
//!
//! Every predicate returns a [`Validation`] value and never panics; the
//! caller decides whether a violation blocks the edit. The mutation kernel
//! calls these before committing, and [`validate_registry`] audits a whole
//! registry against every invariant at once.

use crate::primitives::{MIN_HUB_PARTICIPANTS, OPEN_END_YEAR};
use crate::{Category, GraphObject, ObjectId, Registry, TemporalDate, TimeState};
use std::collections::BTreeSet;
use thiserror::Error;

/// Outcome of a validation rule.
pub type Validation = Result<(), Violation>;

/// A broken structural or temporal rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A historical snapshot may only be classified as STATE.
    #[error("{0} is a historical snapshot; its category is fixed to STATE")]
    SnapshotCategoryLocked(ObjectId),

    /// STATE is reserved for historical snapshots.
    #[error("{0} is not a historical snapshot and cannot be classified as STATE")]
    StateReserved(ObjectId),

    #[error("{0} cannot contain itself")]
    SelfContainment(ObjectId),

    /// `child` already contains `parent`, directly or indirectly.
    #[error("placing {child} under {parent} would create a containment cycle")]
    ContainmentCycle { parent: ObjectId, child: ObjectId },

    #[error("link endpoints must differ (both are {0})")]
    SelfLink(ObjectId),

    #[error("range overlaps sibling snapshot {sibling}")]
    RangeOverlap { sibling: ObjectId },

    #[error("range ends before it starts")]
    InvertedRange,

    #[error("{0} does not exist")]
    MissingObject(ObjectId),

    #[error("{holder} references missing object {missing}")]
    DanglingReference { holder: ObjectId, missing: ObjectId },

    /// `link` and `endpoint` disagree about their relationship.
    #[error("backref between {link} and {endpoint} is not symmetric")]
    AsymmetricBackref { link: ObjectId, endpoint: ObjectId },

    #[error("hub {0} has fewer than two participants")]
    UnderpopulatedHub(ObjectId),

    #[error("{0} is not a hub")]
    NotAHub(ObjectId),
}

// =============================================================================
// RULES
// =============================================================================

/// Guard a category change on `object`.
pub fn validate_category_change(object: &GraphObject, new_category: Category) -> Validation {
    let is_snapshot = object.is_snapshot();
    if is_snapshot && new_category != Category::State {
        return Err(Violation::SnapshotCategoryLocked(object.id.clone()));
    }
    if !is_snapshot && new_category == Category::State {
        return Err(Violation::StateReserved(object.id.clone()));
    }
    Ok(())
}

/// Guard placing `child` inside `parent`.
pub fn validate_containment(registry: &Registry, parent: &ObjectId, child: &ObjectId) -> Validation {
    if parent == child {
        return Err(Violation::SelfContainment(parent.clone()));
    }
    if !registry.contains(parent) {
        return Err(Violation::MissingObject(parent.clone()));
    }
    if is_descendant(registry, child, parent) {
        return Err(Violation::ContainmentCycle {
            parent: parent.clone(),
            child: child.clone(),
        });
    }
    Ok(())
}

/// Guard the endpoints of a new binary link.
pub fn validate_link_endpoints(source: &ObjectId, target: &ObjectId) -> Validation {
    if source == target {
        return Err(Violation::SelfLink(source.clone()));
    }
    Ok(())
}

/// Guard a new range for `object` among the snapshots of `base`.
///
/// Uses the half-open test `new_start < existing_end && new_end > existing_start`;
/// a missing bound counts as unbounded in its direction. `object` itself is
/// ignored so an existing snapshot can be re-ranged. A range strictly nested
/// inside a sibling (or enclosing one) is an era, not a collision, and is
/// accepted; temporal inference later places it under the enclosing range.
pub fn validate_range_continuity(
    registry: &Registry,
    object: &ObjectId,
    base: &ObjectId,
    new_start: &TemporalDate,
    new_end: Option<&TemporalDate>,
) -> Validation {
    if new_end.is_some_and(|end| end < new_start) {
        return Err(Violation::InvertedRange);
    }

    for sibling in registry.snapshots_of(base) {
        if &sibling == object {
            continue;
        }
        let Some(ts) = registry.get(&sibling).and_then(|o| o.time_state.as_ref()) else {
            continue;
        };
        if nests(ts, new_start, new_end) {
            continue;
        }
        let starts_before_end = ts.valid_until.is_none_or(|end| *new_start < end);
        let ends_after_start = match (new_end, ts.effective_date) {
            (Some(end), Some(start)) => *end > start,
            _ => true,
        };
        if starts_before_end && ends_after_start {
            return Err(Violation::RangeOverlap { sibling });
        }
    }
    Ok(())
}

/// True if one range contains the other (inclusive) and is strictly wider in
/// whole years, so inference can place the narrower one under it.
fn nests(existing: &TimeState, start: &TemporalDate, end: Option<&TemporalDate>) -> bool {
    let Some(existing_span) = existing.span_years() else {
        return false;
    };
    let new_span = i64::from(end.map_or(OPEN_END_YEAR, |e| e.year)) - i64::from(start.year);
    let (es, ee) = (existing.effective_date, existing.valid_until);
    let new_inside = new_span < existing_span
        && es.is_some_and(|s| s <= *start)
        && ee.is_none_or(|e| end.is_some_and(|n| *n <= e));
    let old_inside = existing_span < new_span
        && es.is_some_and(|s| *start <= s)
        && end.is_none_or(|n| ee.is_some_and(|e| e <= *n));
    new_inside || old_inside
}

/// Historical snapshots are locked against further structural edits.
#[must_use]
pub fn is_data_locked(object: &GraphObject) -> bool {
    object.is_snapshot()
}

/// Check that `hub` is a hub with at least two existing participants.
pub fn validate_hub(registry: &Registry, hub: &ObjectId) -> Validation {
    let object = registry
        .get(hub)
        .ok_or_else(|| Violation::MissingObject(hub.clone()))?;
    let set = object.hub().ok_or_else(|| Violation::NotAHub(hub.clone()))?;
    if set.participants.len() < MIN_HUB_PARTICIPANTS {
        return Err(Violation::UnderpopulatedHub(hub.clone()));
    }
    if let Some(missing) = set.participants.iter().find(|p| !registry.contains(&p.node_id)) {
        return Err(Violation::DanglingReference {
            holder: hub.clone(),
            missing: missing.node_id.clone(),
        });
    }
    Ok(())
}

/// True if `target` is reachable from `root` through `children_ids`.
///
/// Depth-first, tolerant of existing cycles.
#[must_use]
pub fn is_descendant(registry: &Registry, root: &ObjectId, target: &ObjectId) -> bool {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&ObjectId> = registry
        .get(root)
        .map(|o| o.children().iter().collect())
        .unwrap_or_default();

    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(object) = registry.get(current) {
            stack.extend(object.children().iter());
        }
    }
    false
}

// =============================================================================
// AUDIT
// =============================================================================

/// Check every invariant over the whole registry.
///
/// Returns `(offending object, violation)` pairs in id order; empty means clean.
#[must_use]
pub fn validate_registry(registry: &Registry) -> Vec<(ObjectId, Violation)> {
    let mut found = Vec::new();

    for object in registry.objects() {
        let id = &object.id;

        if let Some(link) = object.link() {
            if let Err(v) = validate_link_endpoints(&link.source_id, &link.target_id) {
                found.push((id.clone(), v));
            }
            for endpoint in [&link.source_id, &link.target_id] {
                match registry.get(endpoint) {
                    None => found.push((
                        id.clone(),
                        Violation::DanglingReference {
                            holder: id.clone(),
                            missing: endpoint.clone(),
                        },
                    )),
                    Some(end) if !end.link_ids.contains(id) => found.push((
                        id.clone(),
                        Violation::AsymmetricBackref {
                            link: id.clone(),
                            endpoint: endpoint.clone(),
                        },
                    )),
                    Some(_) => {}
                }
            }
        }

        if object.is_hub() {
            if let Err(v) = validate_hub(registry, id) {
                found.push((id.clone(), v));
            }
            for p in object.hub().map(|h| h.participants.as_slice()).unwrap_or_default() {
                if registry
                    .get(&p.node_id)
                    .is_some_and(|n| !n.link_ids.contains(id))
                {
                    found.push((
                        id.clone(),
                        Violation::AsymmetricBackref {
                            link: id.clone(),
                            endpoint: p.node_id.clone(),
                        },
                    ));
                }
            }
        }

        for link_id in &object.link_ids {
            match registry.get(link_id) {
                None => found.push((
                    id.clone(),
                    Violation::DanglingReference {
                        holder: id.clone(),
                        missing: link_id.clone(),
                    },
                )),
                Some(link) => {
                    let points_back = link.link().is_some_and(|l| l.touches(id))
                        || link.hub().is_some_and(|h| h.contains(id));
                    if !points_back {
                        found.push((
                            id.clone(),
                            Violation::AsymmetricBackref {
                                link: link_id.clone(),
                                endpoint: id.clone(),
                            },
                        ));
                    }
                }
            }
        }

        for child in object.children() {
            if !registry.contains(child) {
                found.push((
                    id.clone(),
                    Violation::DanglingReference {
                        holder: id.clone(),
                        missing: child.clone(),
                    },
                ));
            }
        }
        if !object.children().is_empty() && is_descendant(registry, id, id) {
            found.push((
                id.clone(),
                Violation::ContainmentCycle {
                    parent: id.clone(),
                    child: id.clone(),
                },
            ));
        }

        if let Some(note) = object.note()
            && let Err(v) = validate_category_change(object, note.category)
        {
            found.push((id.clone(), v));
        }

        if let Some(ts) = &object.time_state {
            for child in &ts.time_children {
                if !registry.contains(child) {
                    found.push((
                        id.clone(),
                        Violation::DanglingReference {
                            holder: id.clone(),
                            missing: child.clone(),
                        },
                    ));
                }
            }
            if ts.is_historical_snapshot
                && let (Some(base), Some(start)) = (&ts.parent_identity_id, ts.effective_date)
                && let Err(v) =
                    validate_range_continuity(registry, id, base, &start, ts.valid_until.as_ref())
            {
                found.push((id.clone(), v));
            }
        }
    }

    found
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Body, ContainerTraits, NoteTraits, ObjectKind, TimeState};
    use chrono::Utc;

    fn container(id: &str, children: &[&str]) -> GraphObject {
        GraphObject::new(
            ObjectId::from(id),
            ObjectKind::ContainerNote,
            Body::Container {
                note: NoteTraits::new(id, Category::Location),
                container: ContainerTraits {
                    children_ids: children.iter().map(|c| ObjectId::from(*c)).collect(),
                    ..ContainerTraits::default()
                },
                narrative: None,
            },
            Utc::now(),
        )
    }

    fn snapshot(id: &str, base: &str, start: i32, end: Option<i32>) -> GraphObject {
        let mut obj = GraphObject::new(
            ObjectId::from(id),
            ObjectKind::SimpleNote,
            Body::Note {
                note: NoteTraits::new(id, Category::State),
            },
            Utc::now(),
        );
        obj.time_state = Some(TimeState::snapshot(
            ObjectId::from(base),
            TemporalDate::year(start),
            end.map(TemporalDate::year),
        ));
        obj
    }

    #[test]
    fn snapshot_cannot_leave_state() {
        let snap = snapshot("s", "base", 1900, None);
        assert!(validate_category_change(&snap, Category::State).is_ok());
        assert_eq!(
            validate_category_change(&snap, Category::Character),
            Err(Violation::SnapshotCategoryLocked(ObjectId::from("s")))
        );
    }

    #[test]
    fn non_snapshot_cannot_become_state() {
        let plain = container("c", &[]);
        assert_eq!(
            validate_category_change(&plain, Category::State),
            Err(Violation::StateReserved(ObjectId::from("c")))
        );
        assert!(validate_category_change(&plain, Category::World).is_ok());
    }

    #[test]
    fn containment_rejects_self_and_ancestors() {
        let registry = Registry::from_objects([
            container("a", &["b"]),
            container("b", &["c"]),
            container("c", &[]),
            container("d", &[]),
        ]);
        let id = |s: &str| ObjectId::from(s);

        assert!(matches!(
            validate_containment(&registry, &id("a"), &id("a")),
            Err(Violation::SelfContainment(_))
        ));
        assert!(matches!(
            validate_containment(&registry, &id("c"), &id("a")),
            Err(Violation::ContainmentCycle { .. })
        ));
        assert!(validate_containment(&registry, &id("a"), &id("d")).is_ok());
        assert!(validate_containment(&registry, &id("d"), &id("a")).is_ok());
    }

    #[test]
    fn self_link_rejected() {
        assert!(validate_link_endpoints(&ObjectId::from("a"), &ObjectId::from("a")).is_err());
        assert!(validate_link_endpoints(&ObjectId::from("a"), &ObjectId::from("b")).is_ok());
    }

    #[test]
    fn overlapping_sibling_range_rejected() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, Some(1950)),
        ]);
        let result = validate_range_continuity(
            &registry,
            &ObjectId::from("new"),
            &ObjectId::from("base"),
            &TemporalDate::year(1940),
            Some(&TemporalDate::year(1960)),
        );
        assert_eq!(
            result,
            Err(Violation::RangeOverlap {
                sibling: ObjectId::from("y1")
            })
        );
    }

    #[test]
    fn adjacent_sibling_range_accepted() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, Some(1950)),
        ]);
        let result = validate_range_continuity(
            &registry,
            &ObjectId::from("new"),
            &ObjectId::from("base"),
            &TemporalDate::year(1951),
            Some(&TemporalDate::year(2000)),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn open_ended_sibling_blocks_straddling_ranges() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, None),
        ]);
        let result = validate_range_continuity(
            &registry,
            &ObjectId::from("new"),
            &ObjectId::from("base"),
            &TemporalDate::year(1850),
            Some(&TemporalDate::year(1950)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn nested_era_accepted_identical_range_rejected() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1800, Some(1850)),
        ]);
        let base = ObjectId::from("base");
        let new = ObjectId::from("new");
        let y = TemporalDate::year;

        assert!(validate_range_continuity(&registry, &new, &base, &y(1810), Some(&y(1820))).is_ok());
        assert!(validate_range_continuity(&registry, &new, &base, &y(1700), None).is_ok());
        assert!(
            validate_range_continuity(&registry, &new, &base, &y(1800), Some(&y(1850))).is_err()
        );
    }

    #[test]
    fn contained_range_of_equal_span_rejected() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, Some(1950)),
        ]);
        let base = ObjectId::from("base");
        let new = ObjectId::from("new");
        let y = TemporalDate::year;

        assert_eq!(
            validate_range_continuity(&registry, &new, &base, &TemporalDate::ymd(1900, 6, 1), Some(&y(1950))),
            Err(Violation::RangeOverlap {
                sibling: ObjectId::from("y1")
            })
        );
        assert!(
            validate_range_continuity(&registry, &new, &base, &y(1900), Some(&TemporalDate::ymd(1950, 12, 31)))
                .is_err()
        );
        assert!(validate_range_continuity(&registry, &new, &base, &y(1901), Some(&y(1950))).is_ok());
    }

    #[test]
    fn audit_reports_equal_span_siblings() {
        let mut late = snapshot("y2", "base", 1900, Some(1950));
        if let Some(ts) = late.time_state.as_mut() {
            ts.effective_date = Some(TemporalDate::ymd(1900, 6, 1));
        }
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, Some(1950)),
            late,
        ]);

        let found = validate_registry(&registry);
        assert!(
            found
                .iter()
                .any(|(id, v)| id.as_str() == "y2" && matches!(v, Violation::RangeOverlap { .. }))
        );
    }

    #[test]
    fn re_ranging_ignores_the_object_itself() {
        let registry = Registry::from_objects([
            container("base", &[]),
            snapshot("y1", "base", 1900, Some(1950)),
        ]);
        let result = validate_range_continuity(
            &registry,
            &ObjectId::from("y1"),
            &ObjectId::from("base"),
            &TemporalDate::year(1905),
            Some(&TemporalDate::year(1945)),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn inverted_range_rejected() {
        let registry = Registry::new();
        let result = validate_range_continuity(
            &registry,
            &ObjectId::from("x"),
            &ObjectId::from("base"),
            &TemporalDate::year(1950),
            Some(&TemporalDate::year(1900)),
        );
        assert_eq!(result, Err(Violation::InvertedRange));
    }

    #[test]
    fn snapshots_are_locked() {
        assert!(is_data_locked(&snapshot("s", "b", 1, None)));
        assert!(!is_data_locked(&container("c", &[])));
    }

    #[test]
    fn audit_reports_dangling_child() {
        let registry = Registry::from_objects([container("a", &["ghost"])]);
        let found = validate_registry(&registry);
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0].1, Violation::DanglingReference { .. }));
    }

    #[test]
    fn audit_reports_cycle() {
        let registry = Registry::from_objects([container("a", &["b"]), container("b", &["a"])]);
        let found = validate_registry(&registry);
        assert!(
            found
                .iter()
                .any(|(_, v)| matches!(v, Violation::ContainmentCycle { .. }))
        );
    }
}
