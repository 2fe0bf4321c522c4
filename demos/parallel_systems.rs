//! Dispatching a job across a rayon pool and comparing it against a
//! single-threaded run over the same world.

use weave_ecs::{Component, Job, JobBuilder, JobContext, RunMode, World};

#[derive(Debug, Clone, Copy, Default)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, Default)]
struct Velocity {
    x: f32,
    y: f32,
}
impl Component for Velocity {}

fn main() {
    let mut world = World::new_unique();
    for i in 0..20_000 {
        world
            .entities_mut()
            .begin()
            .unwrap()
            .assign(Position { x: i as f32, y: 0.0 })
            .unwrap()
            .assign(Velocity { x: 1.0, y: 0.25 })
            .unwrap()
            .end()
            .unwrap();
    }

    let movement = Job::new(
        JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(),
        |ctx: &JobContext| {
            let v = *ctx.get::<Velocity>().unwrap();
            let p = ctx.get_mut::<Position>().unwrap();
            p.x += v.x;
            p.y += v.y;
        },
    );

    println!("Dispatching movement job across 8 tasks...");
    movement.run(&mut world, RunMode::Parallel { task_count: 8 }).expect("job dispatch");
    world.update();

    println!("Dispatching a second, sequential pass...");
    let movement_again = Job::new(
        JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(),
        |ctx: &JobContext| {
            let v = *ctx.get::<Velocity>().unwrap();
            let p = ctx.get_mut::<Position>().unwrap();
            p.x += v.x;
            p.y += v.y;
        },
    );
    movement_again.run(&mut world, RunMode::CurrentThread).expect("job dispatch");

    println!("World version after both passes: {}", world.version());
}
