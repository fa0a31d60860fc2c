use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use latch_ecs::ecs::{
    ComponentRegistry, DeferredCommandBuffer, EntityBuilder, EntityManager, QueryBuilder,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Position([f32; 3]);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Velocity([f32; 3]);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Lifetime(u32);

const ENTITIES: u32 = 100_000;

fn populate() -> EntityManager {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>().unwrap();
    registry.register::<Velocity>().unwrap();
    registry.register::<Lifetime>().unwrap();
    let registry = Arc::new(registry);

    let mut manager = EntityManager::new(Arc::clone(&registry));
    for i in 0..ENTITIES {
        let mut builder = EntityBuilder::new(&registry)
            .with(Position([i as f32, 0.0, 0.0]))
            .with(Velocity([1.0, 0.5, 0.0]));
        if i % 2 == 0 {
            builder = builder.with(Lifetime(i % 100));
        }
        manager.spawn(&builder.build().unwrap()).unwrap();
    }
    manager
}

fn bench_iterate(c: &mut Criterion) {
    let mut manager = populate();
    let registry = Arc::clone(manager.registry());
    let movement = QueryBuilder::new(&registry)
        .write::<Position>()
        .read::<Velocity>()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("iterate");

    group.bench_function("movement_sequential_100k", |b| {
        let mut commands = DeferredCommandBuffer::new();
        b.iter(|| {
            movement.for_each_chunk(&mut manager, &mut commands, |ctx| {
                let velocities = ctx.fragment::<Velocity>();
                for (p, v) in ctx.fragment_mut::<Position>().iter_mut().zip(velocities) {
                    for axis in 0..3 {
                        p.0[axis] += v.0[axis] * 0.016;
                    }
                }
            });
        });
    });

    group.bench_function("movement_parallel_100k", |b| {
        b.iter(|| {
            let commands = movement.par_for_each_chunk(&mut manager, |ctx| {
                let velocities = ctx.fragment::<Velocity>();
                for (p, v) in ctx.fragment_mut::<Position>().iter_mut().zip(velocities) {
                    for axis in 0..3 {
                        p.0[axis] += v.0[axis] * 0.016;
                    }
                }
            });
            black_box(commands);
        });
    });

    group.bench_function("count_matching_100k", |b| {
        let lifetimes = QueryBuilder::new(&registry).read::<Lifetime>().build().unwrap();
        b.iter(|| black_box(lifetimes.matching_entity_count(&manager)));
    });

    group.finish();
}

fn bench_structural(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural");

    group.bench_function("deferred_add_remove_10k", |b| {
        b.iter_batched(
            populate,
            |mut manager| {
                let lifetime = manager.registry().id_of::<Lifetime>().unwrap();
                let targets: Vec<_> = manager.locations().iter().map(|(e, _)| e).take(10_000).collect();
                let mut commands = DeferredCommandBuffer::new();
                for entity in targets {
                    if manager.has_component(entity, lifetime).unwrap() {
                        commands.remove_fragment(entity, lifetime);
                    } else {
                        commands.add_fragment(entity, lifetime);
                    }
                }
                let report = manager.flush_deferred(commands).unwrap();
                black_box(report);
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_iterate, bench_structural);
criterion_main!(benches);
