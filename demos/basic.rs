//! Basic usage: creating entities, assigning components, structural
//! transitions, and destruction.

use weave_ecs::{Component, World};

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

#[derive(Debug, Clone, Copy, Default)]
struct Health(u32);
impl Component for Health {}

fn main() {
    let mut world = World::new_unique();

    println!("Creating entities...");

    let entity1 = world
        .entities_mut()
        .create_with((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.5 }))
        .expect("create entity1");
    println!("Created entity {:?}", entity1);

    let entity2 = world
        .entities_mut()
        .create_with((Position { x: 10.0, y: 20.0 }, Velocity { x: -1.0, y: 2.0 }, Health(100)))
        .expect("create entity2");
    println!("Created entity {:?}", entity2);

    let entity3 = world
        .entities_mut()
        .begin()
        .unwrap()
        .assign(Position { x: 5.0, y: 5.0 })
        .unwrap()
        .end()
        .expect("build entity3");
    println!("Created entity {:?}", entity3);

    println!("entity1 has Health? {}", world.entities().has_component::<Health>(entity1));
    world.entities_mut().assign(entity1, Health(50)).unwrap();
    println!("entity1 has Health now? {}", world.entities().has_component::<Health>(entity1));

    world.entities_mut().destroy(entity2).expect("destroy entity2");
    println!("Destroyed entity {:?}", entity2);
    println!("entity2 still alive? {}", world.entities().is_alive(entity2));
}
