//! Spawn a batch of entities under a file-backed tracing subscriber,
//! so `job.rs`/`entity_manager.rs`'s `profiling`-gated spans land
//! somewhere inspectable. Requires `--features profiling`.

#[cfg(feature = "profiling")]
use std::fs::File;

use weave_ecs::{Component, World};

#[derive(Debug, Clone, Copy, Default)]
struct Position(f32, f32, f32);
impl Component for Position {}

#[derive(Debug, Clone, Copy, Default)]
struct Velocity(f32, f32, f32);
impl Component for Velocity {}

#[cfg(feature = "profiling")]
fn spawn_batch(world: &mut World, count: usize) {
    let _span = tracing::info_span!("spawn_batch", count).entered();
    for i in 0..count {
        world
            .entities_mut()
            .create_with((Position(i as f32, 0.0, 0.0), Velocity(1.0, 0.0, 0.0)))
            .unwrap();
    }
}

#[cfg(feature = "profiling")]
fn main() {
    let file = File::create("trace.json").expect("create trace.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .json()
        .init();

    let mut world = World::new_unique();
    spawn_batch(&mut world, 10_000);
    println!("Spawned 10k entities; spans written to trace.json");
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_spawn requires --features profiling");
}
