//! # Chronology
//!
//! Snapshots of a base identity and the nested-era tree over them.
//!
//! A snapshot is a time-bounded variant of a base identity (its "soul").
//! `infer_temporal_hierarchy` rebuilds every `time_children` list among the
//! base and its snapshots from their date ranges alone; nothing is patched
//! incrementally.
//!
//! Older registries kept a flat, year-indexed stack of variants per identity.
//! `import_flat_stack` turns such a stack into consecutive ranges.

use crate::primitives::NOTE_PREFIX;
use crate::validator::validate_range_continuity;
use crate::{
    Body, Category, GraphObject, ObjectId, ObjectKind, Registry, TemporalDate, TimeState,
};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

/// Namespace for the temporal operations.
pub struct Chronology;

impl Chronology {
    /// Create a snapshot of `base` covering `[start, end]`.
    ///
    /// The snapshot copies the base's note traits under a new title, with
    /// category `STATE`. Returns `None` if the base is missing or has no note
    /// traits, or if the range is inverted or collides with a sibling.
    pub fn create_snapshot(
        registry: &mut Registry,
        base: &ObjectId,
        title: &str,
        start: TemporalDate,
        end: Option<TemporalDate>,
    ) -> Option<ObjectId> {
        let mut note = registry.get(base).and_then(|o| o.note())?.clone();
        note.title = title.to_string();
        note.category = Category::State;

        let unallocated = ObjectId::new("");
        if let Err(violation) =
            validate_range_continuity(registry, &unallocated, base, &start, end.as_ref())
        {
            debug!(%base, %violation, "create_snapshot refused");
            return None;
        }
        let id = registry.allocate_id(NOTE_PREFIX);

        let mut snapshot = GraphObject::new(id.clone(), ObjectKind::SimpleNote, Body::Note { note }, Utc::now());
        snapshot.time_state = Some(TimeState::snapshot(base.clone(), start, end));
        registry.insert(snapshot);
        Some(id)
    }

    /// Rebuild the era tree of `base`. Returns the number of snapshots placed.
    ///
    /// Each snapshot `A` goes under the snapshot `B` with the smallest span
    /// that is strictly wider than `A`'s and contains `A`'s start or end;
    /// without such a `B` it goes directly under the base. Ties on span go
    /// to the lower id. Every child list is sorted by start date, then id.
    pub fn infer_temporal_hierarchy(registry: &mut Registry, base: &ObjectId) -> Option<usize> {
        if !registry.contains(base) {
            return None;
        }

        let snapshots: Vec<(ObjectId, TimeState)> = registry
            .snapshots_of(base)
            .into_iter()
            .filter_map(|id| {
                let ts = registry.get(&id)?.time_state.clone()?;
                Some((id, ts))
            })
            .collect();

        let mut placement: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        for (id, ts) in &snapshots {
            let parent = tightest_enclosing(&snapshots, id, ts).unwrap_or(base);
            placement.entry(parent.clone()).or_default().push(id.clone());
        }

        let start_of = |id: &ObjectId| {
            snapshots
                .iter()
                .find(|(s, _)| s == id)
                .and_then(|(_, ts)| ts.effective_date)
        };
        for children in placement.values_mut() {
            children.sort_by(|a, b| start_of(a).cmp(&start_of(b)).then_with(|| a.cmp(b)));
        }

        let now = Utc::now();
        let members = std::iter::once(base.clone()).chain(snapshots.iter().map(|(id, _)| id.clone()));
        for member in members {
            let children = placement.remove(&member).unwrap_or_default();
            let Some(object) = registry.get_mut(&member) else {
                continue;
            };
            let ts = object.time_state.get_or_insert_with(TimeState::anchor);
            if ts.time_children != children {
                ts.time_children = children;
                object.touch(now);
            }
        }

        debug!(%base, snapshots = snapshots.len(), "temporal hierarchy rebuilt");
        Some(snapshots.len())
    }

    /// Convert a flat `(year, title)` stack into consecutive snapshots.
    ///
    /// Entry `i` covers `[year_i, year_{i+1} - 1]`; the last one is open-ended.
    /// Entries are sorted by year first. Nothing is created unless every
    /// range is admissible. Returns the new ids in year order.
    pub fn import_flat_stack(
        registry: &mut Registry,
        base: &ObjectId,
        entries: &[(i32, String)],
    ) -> Option<Vec<ObjectId>> {
        if registry.get(base).and_then(|o| o.note()).is_none() {
            return None;
        }

        let mut sorted: Vec<&(i32, String)> = entries.iter().collect();
        sorted.sort_by_key(|(year, _)| *year);

        let ranges: Vec<(TemporalDate, Option<TemporalDate>, &str)> = sorted
            .iter()
            .enumerate()
            .map(|(i, (year, title))| {
                let end = sorted
                    .get(i.saturating_add(1))
                    .map(|(next, _)| TemporalDate::year(next.saturating_sub(1)));
                (TemporalDate::year(*year), end, title.as_str())
            })
            .collect();

        let unallocated = ObjectId::new("");
        for (start, end, _) in &ranges {
            if let Err(violation) = validate_range_continuity(registry, &unallocated, base, start, end.as_ref()) {
                debug!(%base, %violation, "flat stack import refused");
                return None;
            }
        }

        let mut created = Vec::with_capacity(ranges.len());
        for (start, end, title) in ranges {
            created.push(Self::create_snapshot(registry, base, title, start, end)?);
        }
        Self::infer_temporal_hierarchy(registry, base);
        Some(created)
    }
}

/// The tightest snapshot strictly wider than `ts` that contains its start or end.
fn tightest_enclosing<'a>(
    snapshots: &'a [(ObjectId, TimeState)],
    id: &ObjectId,
    ts: &TimeState,
) -> Option<&'a ObjectId> {
    let span = ts.span_years()?;
    let touches = |outer: &TimeState| {
        ts.effective_date.is_some_and(|s| outer.covers(&s))
            || ts.valid_until.is_some_and(|e| outer.covers(&e))
    };

    let mut best: Option<(&ObjectId, i64)> = None;
    for (candidate, outer) in snapshots {
        if candidate == id {
            continue;
        }
        let Some(outer_span) = outer.span_years() else {
            continue;
        };
        if outer_span <= span || !touches(outer) {
            continue;
        }
        if best.is_none_or(|(_, b)| outer_span < b) {
            best = Some((candidate, outer_span));
        }
    }
    best.map(|(candidate, _)| candidate)
}

// =============================================================================
// TESTS
// =============================================================================
