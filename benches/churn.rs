use criterion::*;
use std::hint::black_box;

use archetype_ecs::prelude::*;

#[derive(Clone, Copy, Default)]
struct Base(u64);

#[derive(Clone, Copy, Default)]
struct Extra(u64);

const ENTITIES: usize = 10_000;

fn populated_world() -> WorldId {
    let world = create_world("bench-churn");
    with_world(world, |w| {
        for i in 0..ENTITIES {
            let entity = w.create_entity();
            w.set(entity, Base(i as u64));
        }
    })
    .unwrap();
    world
}

fn churn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    group.bench_function("add_remove_component_10k", |b| {
        b.iter_batched(
            populated_world,
            |world| {
                with_world(world, |w| {
                    let entities: Vec<Entity> = w
                        .archetypes()
                        .flat_map(|a| a.entities().to_vec())
                        .collect();
                    for &entity in &entities {
                        w.set(entity, Extra(1));
                    }
                    for &entity in &entities {
                        w.remove::<Extra>(entity);
                    }
                    black_box(w.entity_count());
                })
                .unwrap();
                destroy_world(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("deferred_drain_10k", |b| {
        b.iter_batched(
            populated_world,
            |world| {
                with_world(world, |w| {
                    let entities: Vec<Entity> = w
                        .archetypes()
                        .flat_map(|a| a.entities().to_vec())
                        .collect();
                    w.begin_deferred();
                    for &entity in &entities {
                        w.set(entity, Extra(1));
                    }
                    w.end_deferred();
                    black_box(w.entity_count());
                })
                .unwrap();
                destroy_world(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, churn_benchmark);
criterion_main!(benches);
