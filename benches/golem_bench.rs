use criterion::{Criterion, criterion_group, criterion_main};
use golem_object_module::golem_members;
use golem_object_module::schema::{stack, RawObjectSpec};
use golem_object_module::{compile, DiagnosticLog, GolemModel, GolemRuntime, SlotValue};
use std::hint::black_box;

// ─── Fixtures ───────────────────────────────────────────────────────────────

fn probe_spec() -> RawObjectSpec {
    RawObjectSpec::record(
        "Probe",
        golem_members! {
            "mutable y" => "Int",
            "public immutable x" => "Double",
            "mutable active" => "Bool",
            "mutable score" => "Double",
            "mutable version" => "UInt",
            "mutable pending" => stack("Int", 8),
        },
    )
}

fn compile_probe() -> GolemModel {
    let mut log = DiagnosticLog::new();
    compile(&probe_spec(), &mut log).unwrap()
}

fn probe_initials() -> Vec<(&'static str, SlotValue)> {
    vec![
        ("y", SlotValue::I64(5)),
        ("x", SlotValue::F64(4.3)),
        ("active", SlotValue::Bool(true)),
        ("score", SlotValue::F64(99.5)),
        ("version", SlotValue::U64(42)),
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: Compiling a schema
// ═══════════════════════════════════════════════════════════════════════════

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let spec = probe_spec();
    group.bench_function("compile (6 members)", |b| {
        b.iter(|| {
            let mut log = DiagnosticLog::new();
            compile(black_box(&spec), &mut log).unwrap()
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    let mut rt = GolemRuntime::default();
    let model = rt.register(compile_probe()).unwrap();
    let initials = probe_initials();

    group.bench_function("allocate + deallocate", |b| {
        b.iter(|| {
            let h = rt.allocate(&model, black_box(&initials)).unwrap();
            // SAFETY: h owns the fresh allocation above.
            unsafe { rt.deallocate(&model, h) };
        })
    });

    group.bench_function("allocate_uninitialized + deallocate", |b| {
        b.iter(|| {
            let h = rt.allocate_uninitialized(&model);
            // SAFETY: as above.
            unsafe { rt.deallocate(&model, h) };
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Member access
// ═══════════════════════════════════════════════════════════════════════════

fn bench_member_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("member_access");

    let mut rt = GolemRuntime::default();
    let model = rt.register(compile_probe()).unwrap();
    let h = rt.allocate(&model, &probe_initials()).unwrap();

    group.bench_function("get", |b| {
        b.iter(|| rt.get(&model, black_box(h), "score").unwrap())
    });

    group.bench_function("set", |b| {
        b.iter(|| {
            rt.set(&model, black_box(h), "y", SlotValue::I64(100))
                .unwrap()
        })
    });

    group.bench_function("identity", |b| b.iter(|| rt.identity(black_box(h))));

    // SAFETY: h owns the allocation from the setup above.
    unsafe { rt.deallocate(&model, h) };
    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 4: Stack operations
// ═══════════════════════════════════════════════════════════════════════════

fn bench_stack_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_ops");

    let mut rt = GolemRuntime::default();
    let model = rt.register(compile_probe()).unwrap();
    let h = rt.allocate(&model, &probe_initials()).unwrap();

    group.bench_function("push + pop", |b| {
        b.iter(|| {
            rt.stack_push(&model, black_box(h), "pending", SlotValue::I64(7))
                .unwrap();
            rt.stack_pop(&model, black_box(h), "pending").unwrap()
        })
    });

    group.bench_function("peek", |b| {
        rt.stack_push(&model, h, "pending", SlotValue::I64(7)).unwrap();
        b.iter(|| rt.stack_peek(&model, black_box(h), "pending").unwrap())
    });

    // SAFETY: h owns the allocation from the setup above.
    unsafe { rt.deallocate(&model, h) };
    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_lifecycle,
    bench_member_access,
    bench_stack_ops
);
criterion_main!(benches);
