#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weave_ecs::{Component, World};

#[derive(Debug, Clone, Copy, Default)]
struct Position(f32, f32, f32);
impl Component for Position {}

#[derive(Debug, Clone, Copy, Default)]
struct Velocity(f32, f32, f32);
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, Default)]
struct Health(u32);
impl Component for Health {}

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_bench");

    group.bench_function("spawn_2_components", |b| {
        let mut world = World::new(0);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(world.entities_mut().create_with((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0))).unwrap());
            }
        });
    });

    group.bench_function("spawn_3_components", |b| {
        let mut world = World::new(0);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(
                    world
                        .entities_mut()
                        .create_with((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0), Health(100)))
                        .unwrap(),
                );
            }
        });
    });

    group.bench_function("spawn_via_builder", |b| {
        let mut world = World::new(0);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(
                    world
                        .entities_mut()
                        .begin()
                        .unwrap()
                        .assign(Position(1.0, 2.0, 3.0))
                        .unwrap()
                        .assign(Velocity(1.0, 0.0, 0.0))
                        .unwrap()
                        .end()
                        .unwrap(),
                );
            }
        });
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
