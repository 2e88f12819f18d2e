use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use omnitide::{builtin, catalog::pascal_case, dispatch, UnitDescriptor, UnitKind, UnitRegistry};

fn bench_pascal_case(c: &mut Criterion) {
    c.bench_function("pascal_case", |b| {
        b.iter(|| pascal_case(black_box("hyper_ultra_deep_quantum_core")))
    });
}

fn bench_candidates(c: &mut Criterion) {
    let catalog = builtin::catalog();
    c.bench_function("catalog candidates", |b| {
        b.iter(|| catalog.candidates(UnitKind::Module, black_box("fractal_analysis")).len())
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let registry = UnitRegistry::new(UnitKind::Agent);
    for i in 0..256 {
        let name = format!("agent_{i}");
        registry
            .register(UnitDescriptor::new(
                &name,
                UnitKind::Agent,
                "SherlockHolmes",
                Arc::new(builtin::Persona::sherlock_holmes()),
            ))
            .unwrap();
    }

    c.bench_function("dispatch hit", |b| {
        b.iter(|| runtime.block_on(dispatch(&registry, black_box("agent_128"), "find the leak")))
    });
    c.bench_function("dispatch miss", |b| {
        b.iter(|| runtime.block_on(dispatch(&registry, black_box("Nonexistent"), "x")))
    });
}

criterion_group!(benches, bench_pascal_case, bench_candidates, bench_dispatch);
criterion_main!(benches);
