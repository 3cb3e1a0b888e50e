//! # Registry Benchmarks
//!
//! Performance benchmarks for lorekeep-core kernel operations.
//!
//! Run with: `cargo bench -p lorekeep-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lorekeep_core::{
    Category, Chronology, Cortex, FilterCriteria, MutationEngine, ObjectId, ObjectKind, Registry,
    SessionState, state_to_bytes,
};
use std::hint::black_box;

/// A chain of N notes, each linked to the next.
fn create_chain(size: usize) -> (Registry, Vec<ObjectId>) {
    let mut registry = Registry::new();
    let mut ids = Vec::with_capacity(size);
    for i in 0..size {
        let id = MutationEngine::create_node(
            &mut registry,
            ObjectKind::SimpleNote,
            &format!("Note {}", i),
            Category::Character,
            "",
            &[],
        )
        .expect("create");
        if let Some(prev) = ids.last() {
            MutationEngine::create_binary_link(&mut registry, prev, &id, "knows", "known by")
                .expect("link");
        }
        ids.push(id);
    }
    (registry, ids)
}

/// A container tree with `size` leaves under ten folders.
fn create_tree(size: usize) -> (Registry, ObjectId) {
    let mut registry = Registry::new();
    let root = MutationEngine::create_node(&mut registry, ObjectKind::ContainerNote, "Root", Category::World, "", &[])
        .expect("root");
    let folders: Vec<ObjectId> = (0..10)
        .map(|i| {
            let folder = MutationEngine::create_node(
                &mut registry,
                ObjectKind::ContainerNote,
                &format!("Folder {}", i),
                Category::Location,
                "",
                &[],
            )
            .expect("folder");
            MutationEngine::enforce_hierarchy(&mut registry, &root, &folder);
            folder
        })
        .collect();
    for i in 0..size {
        let leaf = MutationEngine::create_node(
            &mut registry,
            ObjectKind::SimpleNote,
            &format!("Leaf {}", i),
            Category::Item,
            "",
            &[],
        )
        .expect("leaf");
        MutationEngine::enforce_hierarchy(&mut registry, &folders[i % folders.len()], &leaf);
    }
    (registry, root)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_link_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_creation");

    for size in [100, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_chain(size)));
        });
    }

    group.finish();
}

fn bench_delete_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_cascade");

    for size in [100, 1000].iter() {
        let (registry, ids) = create_chain(*size);
        let middle = ids[ids.len() / 2].clone();

        group.bench_with_input(BenchmarkId::from_parameter(size), &middle, |b, middle| {
            b.iter(|| {
                let mut registry = registry.clone();
                black_box(MutationEngine::delete_node(&mut registry, middle))
            });
        });
    }

    group.finish();
}

fn bench_mass_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass_recompute");

    for size in [100, 1000, 10000].iter() {
        let (registry, root) = create_tree(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &root, |b, root| {
            b.iter(|| {
                let mut registry = registry.clone();
                black_box(MutationEngine::recompute_mass_tree(&mut registry, root))
            });
        });
    }

    group.finish();
}

fn bench_filter_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_graph");

    for size in [100, 1000].iter() {
        let (registry, ids) = create_chain(*size);
        let criteria = FilterCriteria::new().with_verb("knows").near(ids.iter().take(3).cloned());

        group.bench_with_input(BenchmarkId::from_parameter(size), &criteria, |b, criteria| {
            b.iter(|| black_box(Cortex::filter_graph(&registry, criteria)));
        });
    }

    group.finish();
}

fn bench_temporal_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal_inference");

    for size in [10, 100].iter() {
        let mut registry = Registry::new();
        let base = MutationEngine::create_node(&mut registry, ObjectKind::SimpleNote, "City", Category::Location, "", &[])
            .expect("base");
        let entries: Vec<(i32, String)> = (0..*size)
            .map(|i| (1000 + i as i32 * 10, format!("Era {}", i)))
            .collect();
        Chronology::import_flat_stack(&mut registry, &base, &entries).expect("import");

        group.bench_with_input(BenchmarkId::from_parameter(size), &base, |b, base| {
            b.iter(|| {
                let mut registry = registry.clone();
                black_box(Chronology::infer_temporal_hierarchy(&mut registry, base))
            });
        });
    }

    group.finish();
}

fn bench_persist(c: &mut Criterion) {
    let mut group = c.benchmark_group("persist");

    for size in [100, 1000].iter() {
        let (registry, _) = create_chain(*size);
        let state = SessionState {
            registry,
            ..SessionState::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), &state, |b, state| {
            b.iter(|| black_box(state_to_bytes(state)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_link_creation,
    bench_delete_cascade,
    bench_mass_recompute,
    bench_filter_graph,
    bench_temporal_inference,
    bench_persist
);
criterion_main!(benches);
