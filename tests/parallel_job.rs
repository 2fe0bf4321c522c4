use weave_ecs::{Component, Entity, Job, JobBuilder, JobContext, RunMode, World};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}
impl Component for Velocity {}

#[test]
fn parallel_job_integrates_velocity_into_position_for_every_entity() {
    const COUNT: usize = 10_000;
    let mut world = World::new(0);
    let mut entities: Vec<Entity> = Vec::with_capacity(COUNT);

    for i in 0..COUNT {
        let e = world
            .entities_mut()
            .begin()
            .unwrap()
            .assign(Position { x: i as f32, y: 0.0 })
            .unwrap()
            .assign(Velocity { x: 1.0, y: 2.0 })
            .unwrap()
            .end()
            .unwrap();
        entities.push(e);
    }

    let dt = 0.5_f32;
    let job = Job::new(
        JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(),
        move |ctx: &JobContext| {
            let v = *ctx.get::<Velocity>().unwrap();
            let p = ctx.get_mut::<Position>().unwrap();
            p.x += v.x * dt;
            p.y += v.y * dt;
        },
    );
    job.run(&mut world, RunMode::Parallel { task_count: 8 }).unwrap();

    for (i, &entity) in entities.iter().enumerate() {
        let pos = world.entities().get::<Position>(entity).unwrap();
        assert_eq!(pos.x, i as f32 + 0.5);
        assert_eq!(pos.y, 1.0);
    }
}

#[test]
fn current_thread_mode_agrees_with_parallel_mode() {
    const COUNT: usize = 256;
    let mut sequential_world = World::new(0);
    let mut parallel_world = World::new(1);
    let mut sequential_entities = Vec::with_capacity(COUNT);
    let mut parallel_entities = Vec::with_capacity(COUNT);

    for i in 0..COUNT {
        let pos = Position { x: i as f32, y: 0.0 };
        let vel = Velocity { x: 2.0, y: 0.0 };
        sequential_entities.push(
            sequential_world.entities_mut().begin().unwrap().assign(pos).unwrap().assign(vel).unwrap().end().unwrap(),
        );
        parallel_entities.push(
            parallel_world.entities_mut().begin().unwrap().assign(pos).unwrap().assign(vel).unwrap().end().unwrap(),
        );
    }

    let make_job = || {
        Job::new(JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(), |ctx: &JobContext| {
            let v = ctx.get::<Velocity>().unwrap().x;
            ctx.get_mut::<Position>().unwrap().x += v;
        })
    };

    make_job().run(&mut sequential_world, RunMode::CurrentThread).unwrap();
    make_job().run(&mut parallel_world, RunMode::Parallel { task_count: 6 }).unwrap();

    for i in 0..COUNT {
        let seq = sequential_world.entities().get::<Position>(sequential_entities[i]).unwrap();
        let par = parallel_world.entities().get::<Position>(parallel_entities[i]).unwrap();
        assert_eq!(seq.x, par.x);
    }
}
