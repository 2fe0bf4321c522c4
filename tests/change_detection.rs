use std::sync::atomic::{AtomicUsize, Ordering};

use weave_ecs::{Component, Job, JobBuilder, JobContext, RunMode, World};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Position {
    x: f32,
}
impl Component for Position {}

#[test]
fn second_run_with_nothing_touched_since_visits_zero_chunks() {
    let mut world = World::new(0);
    for i in 0..200 {
        world.entities_mut().begin().unwrap().assign(Position { x: i as f32 }).unwrap().end().unwrap();
    }
    world.update();

    let visits = AtomicUsize::new(0);
    let first_run = Job::new(
        JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap(),
        |_ctx: &JobContext| {
            visits.fetch_add(1, Ordering::Relaxed);
        },
    );
    first_run.run(&mut world, RunMode::CurrentThread).unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 200);

    // Nothing writes Position between the two runs, so a job filtering
    // on "touched since this tick" should find nothing.
    world.update();
    let second_run = Job::new(
        JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap().since(world.version()),
        |_ctx: &JobContext| {
            visits.fetch_add(1, Ordering::Relaxed);
        },
    );
    second_run.run(&mut world, RunMode::CurrentThread).unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 200);
}

#[test]
fn a_later_job_run_is_picked_up_by_a_check_baselined_before_it() {
    let mut world = World::new(0);
    for i in 0..32 {
        world.entities_mut().begin().unwrap().assign(Position { x: i as f32 }).unwrap().end().unwrap();
    }
    world.update();

    let visits = AtomicUsize::new(0);
    let baseline = world.version();
    let write_job = Job::new(
        JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap(),
        |_ctx: &JobContext| {
            visits.fetch_add(1, Ordering::Relaxed);
        },
    );
    write_job.run(&mut world, RunMode::CurrentThread).unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 32);

    // A later job baselined at the tick before the write above still
    // sees every chunk it touched.
    world.update();
    let replay = Job::new(
        JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap().since(baseline),
        |_ctx: &JobContext| {
            visits.fetch_add(1, Ordering::Relaxed);
        },
    );
    replay.run(&mut world, RunMode::CurrentThread).unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 64);
}
