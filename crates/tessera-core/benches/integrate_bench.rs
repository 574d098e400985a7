//! # Integration Benchmarks
//!
//! Performance benchmarks for tessera-core integration.
//!
//! Run with: `cargo bench -p tessera-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tessera_core::{
    Cardinality, DataKind, MemoryStorage, NodeModel, Session, TypeSchema, UpdateModel,
};

/// Session with `person` (identity by email) and `address` (value type).
fn session() -> Session<MemoryStorage> {
    let mut session = Session::in_memory();
    for uri in ["name", "email", "phone", "street", "city"] {
        session
            .install_type(TypeSchema::new(uri, DataKind::Text))
            .expect("simple");
    }
    session
        .install_type(
            TypeSchema::new("address", DataKind::Value)
                .with_child("street", Cardinality::One)
                .and_then(|t| t.with_child("city", Cardinality::One))
                .expect("address"),
        )
        .expect("address");
    session
        .install_type(
            TypeSchema::new("person", DataKind::Identity)
                .with_child("name", Cardinality::One)
                .and_then(|t| t.with_child("email", Cardinality::One))
                .and_then(|t| t.with_child("phone", Cardinality::Many))
                .and_then(|t| t.with_child("address", Cardinality::One))
                .expect("person")
                .with_identity(&["email"]),
        )
        .expect("person");
    session
}

fn person(i: usize) -> UpdateModel {
    NodeModel::new("person")
        .with_child("name", NodeModel::untyped(format!("Person {i}")))
        .with_child("email", NodeModel::untyped(format!("p{i}@example.org")))
        .with_children(
            "phone",
            [
                NodeModel::untyped(format!("555-{i}")),
                NodeModel::untyped("555-0000"),
            ],
        )
        .with_child(
            "address",
            NodeModel::new("address")
                .with_child("street", NodeModel::untyped(format!("Street {}", i % 10)))
                .with_child("city", NodeModel::untyped("Springfield")),
        )
        .into()
}

/// A session holding `size` persons.
fn populated(size: usize) -> Session<MemoryStorage> {
    let mut session = session();
    for i in 0..size {
        session.integrate(&mut person(i), None).expect("integrate");
    }
    session
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_new");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(populated(size)));
        });
    }

    group.finish();
}

fn bench_unify_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_existing");

    for size in [100, 1000].iter() {
        let mut session = populated(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut model = person(size / 2);
                black_box(session.integrate(&mut model, None).expect("integrate"))
            });
        });
    }

    group.finish();
}

fn bench_fetch_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_tree");

    for size in [100, 1000].iter() {
        let mut session = populated(*size);
        let id = session
            .integrate(&mut person(0), None)
            .expect("integrate")
            .value
            .node
            .expect("node")
            .id;

        group.bench_with_input(BenchmarkId::new("depth_2", size), &id, |b, &id| {
            b.iter(|| black_box(session.fetch_tree(id, 2)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_unify_existing, bench_fetch_tree);
criterion_main!(benches);
