use criterion::{criterion_group, criterion_main, Criterion};
use weave_ecs::{Component, Job, JobBuilder, JobContext, RunMode, World};

#[derive(Debug, Clone, Copy, Default)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, Default)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

fn build_world(count: usize) -> World {
    let mut world = World::new(0);
    for i in 0..count {
        world
            .entities_mut()
            .begin()
            .unwrap()
            .assign(Position { x: i as f32, y: 0.0, z: 0.0 })
            .unwrap()
            .assign(Velocity { x: 1.0, y: 0.5, z: 0.0 })
            .unwrap()
            .end()
            .unwrap();
    }
    world
}

fn integrate_job() -> Job<impl Fn(&JobContext) + Sync> {
    Job::new(JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(), |ctx: &JobContext| {
        let v = *ctx.get::<Velocity>().unwrap();
        let p = ctx.get_mut::<Position>().unwrap();
        p.x += v.x;
        p.y += v.y;
        p.z += v.z;
    })
}

fn bench_parallel_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_execution");
    const COUNT: usize = 50_000;

    group.bench_function("current_thread", |b| {
        let mut world = build_world(COUNT);
        b.iter(|| {
            integrate_job().run(&mut world, RunMode::CurrentThread).unwrap();
        });
    });

    group.bench_function("parallel_4_tasks", |b| {
        let mut world = build_world(COUNT);
        b.iter(|| {
            integrate_job().run(&mut world, RunMode::Parallel { task_count: 4 }).unwrap();
        });
    });

    group.bench_function("parallel_16_tasks", |b| {
        let mut world = build_world(COUNT);
        b.iter(|| {
            integrate_job().run(&mut world, RunMode::Parallel { task_count: 16 }).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parallel_execution);
criterion_main!(benches);
