// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Job dispatcher: fans a per-entity callable across the tasks a
//! filter resolves to, on the calling thread or a rayon pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::archetype::{Archetype, WorldVersion};
use crate::component::Component;
use crate::entity::Entity;
use crate::error::Result;
use crate::filter::{resolve_tasks, FilterResult, Task};
use crate::mask::ComponentIdMask;
use crate::registry::register_component;
use crate::world::World;

#[cfg(feature = "profiling")]
use tracing::info_span;

/// How a job's tasks are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A single worker (thread id 0) iterates tasks sequentially.
    CurrentThread,
    /// Tasks are submitted to the rayon pool; blocks until all
    /// complete. Falls back to `CurrentThread` behavior when the
    /// `parallel` feature is disabled.
    Parallel { task_count: usize },
}

/// Coordinates supplied to every invocation of a job's per-entity
/// function.
#[derive(Debug, Clone, Copy)]
pub struct InvocationIndex {
    pub task_index: usize,
    pub entity_index_in_task: usize,
    pub thread_id: usize,
    pub global_entity_index: usize,
}

#[cfg(feature = "parallel")]
fn current_thread_id() -> usize {
    rayon::current_thread_index().unwrap_or(0)
}

#[cfg(not(feature = "parallel"))]
fn current_thread_id() -> usize {
    0
}

/// Builds the `FilterResult` a job dispatches against: which component
/// types are required for an archetype to match, which are optional,
/// which are change-tracked (`check`), and which the job will stamp
/// with the current world version on completion (`update`).
#[derive(Debug, Clone, Default)]
pub struct JobBuilder {
    required: ComponentIdMask,
    check: ComponentIdMask,
    update: ComponentIdMask,
    last_version: WorldVersion,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `T`; archetypes lacking it never match.
    pub fn read<T: Component>(mut self) -> Result<Self> {
        let id = register_component::<T>()?;
        self.required.insert(id);
        Ok(self)
    }

    /// Require `T` and stamp its column's chunk version after the job
    /// runs.
    pub fn write<T: Component>(mut self) -> Result<Self> {
        let id = register_component::<T>()?;
        self.required.insert(id);
        self.update.insert(id);
        Ok(self)
    }

    /// `T` may or may not be present; `JobContext::get` resolves to
    /// `None` on archetypes that lack it.
    pub fn optional_read<T: Component>(self) -> Result<Self> {
        register_component::<T>()?;
        Ok(self)
    }

    /// Like [`JobBuilder::optional_read`], but also stamps `T`'s column
    /// version on archetypes where it is present.
    pub fn optional_write<T: Component>(mut self) -> Result<Self> {
        let id = register_component::<T>()?;
        self.update.insert(id);
        Ok(self)
    }

    /// Use `T`'s chunk version for change-detection: chunks whose `T`
    /// version is below `since` are skipped.
    pub fn check<T: Component>(mut self) -> Result<Self> {
        let id = register_component::<T>()?;
        self.check.insert(id);
        Ok(self)
    }

    /// The version chunks are compared against for change-detection.
    /// Defaults to 0, which matches every chunk on a job's first run.
    pub fn since(mut self, last_version: WorldVersion) -> Self {
        self.last_version = last_version;
        self
    }

    fn finish(self) -> JobSpec {
        JobSpec {
            required: self.required,
            check: self.check,
            update: self.update,
            last_version: self.last_version,
        }
    }
}

#[derive(Debug, Clone)]
struct JobSpec {
    required: ComponentIdMask,
    check: ComponentIdMask,
    update: ComponentIdMask,
    last_version: WorldVersion,
}

/// What a per-entity function sees for one entity: its handle, its
/// coordinates within the dispatch, and typed accessors to its
/// components.
pub struct JobContext<'a> {
    archetype: &'a Archetype,
    row: usize,
    entity: Entity,
    invocation: InvocationIndex,
}

impl<'a> JobContext<'a> {
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn invocation(&self) -> InvocationIndex {
        self.invocation
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        let id = register_component::<T>().ok()?;
        let ptr = self.archetype.get_component(id, self.row)?;
        Some(unsafe { &*(ptr as *const T) })
    }

    /// Mutable access through a shared context: sound because a single
    /// task is the only writer of its `(archetype, row-range)`, and no
    /// structural change can run while dispatch is in progress.
    pub fn get_mut<T: Component>(&self) -> Option<&mut T> {
        let id = register_component::<T>().ok()?;
        let ptr = self.archetype.get_component(id, self.row)?;
        Some(unsafe { &mut *(ptr as *mut T) })
    }
}

/// A filter plus a per-entity function, ready to dispatch over a
/// world.
pub struct Job<F> {
    spec: JobSpec,
    func: F,
}

impl<F> Job<F>
where
    F: Fn(&JobContext) + Sync,
{
    pub fn new(builder: JobBuilder, func: F) -> Self {
        Self { spec: builder.finish(), func }
    }

    pub fn run(&self, world: &mut World, mode: RunMode) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("job.run", mode = ?mode).entered();
        let world_version = world.version();
        let filter = FilterResult {
            required_mask: self.spec.required.clone(),
            check_mask: self.spec.check.clone(),
            update_mask: self.spec.update.clone(),
            last_version: self.spec.last_version,
        };

        let task_count = match mode {
            RunMode::CurrentThread => 1,
            RunMode::Parallel { task_count } => task_count.max(1),
        };
        let tasks = resolve_tasks(world.entities(), &filter, task_count);

        world.entities_mut().begin_dispatch();
        let global_counter = AtomicUsize::new(0);
        let archetypes = world.entities_mut().archetypes_mut();
        match mode {
            RunMode::CurrentThread => run_sequential(&self.spec, &self.func, &tasks, archetypes, world_version, &global_counter),
            RunMode::Parallel { .. } => run_parallel(&self.spec, &self.func, &tasks, archetypes, world_version, &global_counter),
        }
        world.entities_mut().end_dispatch();
        Ok(())
    }
}

fn run_sequential<F>(
    spec: &JobSpec,
    func: &F,
    tasks: &[Task],
    archetypes: &mut [Archetype],
    world_version: WorldVersion,
    global_counter: &AtomicUsize,
) where
    F: Fn(&JobContext) + Sync,
{
    for (task_index, task) in tasks.iter().enumerate() {
        run_task(spec, func, task, task_index, archetypes, world_version, global_counter);
    }
}

#[cfg(feature = "parallel")]
fn run_parallel<F>(
    spec: &JobSpec,
    func: &F,
    tasks: &[Task],
    archetypes: &mut [Archetype],
    world_version: WorldVersion,
    global_counter: &AtomicUsize,
) where
    F: Fn(&JobContext) + Sync,
{
    use rayon::prelude::*;

    let archetypes_ptr = archetypes.as_mut_ptr() as usize;
    let archetypes_len = archetypes.len();

    tasks.par_iter().enumerate().for_each(|(task_index, task)| {
        // SAFETY: `resolve_tasks` partitions every matching archetype's
        // rows into disjoint (archetype, range) pieces before any task
        // runs, and the dispatch guard above forbids structural changes
        // for the lifetime of this call, so distinct tasks never alias
        // the same bytes even though they share this pointer.
        let archetypes = unsafe { std::slice::from_raw_parts_mut(archetypes_ptr as *mut Archetype, archetypes_len) };
        run_task(spec, func, task, task_index, archetypes, world_version, global_counter);
    });
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<F>(
    spec: &JobSpec,
    func: &F,
    tasks: &[Task],
    archetypes: &mut [Archetype],
    world_version: WorldVersion,
    global_counter: &AtomicUsize,
) where
    F: Fn(&JobContext) + Sync,
{
    run_sequential(spec, func, tasks, archetypes, world_version, global_counter);
}

fn run_task<F>(
    spec: &JobSpec,
    func: &F,
    task: &Task,
    task_index: usize,
    archetypes: &mut [Archetype],
    world_version: WorldVersion,
    global_counter: &AtomicUsize,
) where
    F: Fn(&JobContext) + Sync,
{
    let mut entity_index_in_task = 0usize;
    for piece in &task.pieces {
        // SAFETY: shared access only; this archetype's row range for
        // this piece is not touched by any other concurrently running
        // task (see run_parallel's safety comment).
        let archetype: &Archetype = unsafe { &*(&archetypes[piece.archetype.0] as *const Archetype) };
        for offset in 0..piece.count {
            let row = piece.first_entity + offset;
            let entity = archetype.entities()[row];
            let invocation = InvocationIndex {
                task_index,
                entity_index_in_task,
                thread_id: current_thread_id(),
                global_entity_index: global_counter.fetch_add(1, Ordering::Relaxed),
            };
            let ctx = JobContext { archetype, row, entity, invocation };
            func(&ctx);
            entity_index_in_task += 1;
        }
    }

    if spec.update.is_empty() {
        return;
    }
    for piece in &task.pieces {
        let archetype = &mut archetypes[piece.archetype.0];
        let chunk_capacity = archetype.chunk_capacity().max(1);
        let first_chunk = piece.first_entity / chunk_capacity;
        let last_row = piece.first_entity + piece.count - 1;
        let last_chunk = last_row / chunk_capacity;
        for chunk in first_chunk..=last_chunk {
            archetype.stamp_chunk(&spec.update, chunk, world_version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use std::sync::atomic::{AtomicU32, Ordering as MemOrdering};

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Position {
        x: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Velocity {
        x: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn parallel_integration_updates_every_entity() {
        let mut world = World::new(0);
        for i in 0..1000 {
            let e = world.entities_mut().create().unwrap();
            world.entities_mut().assign(e, Position { x: i as f32 }).unwrap();
            world.entities_mut().assign(e, Velocity { x: 1.0 }).unwrap();
        }

        let job = Job::new(
            JobBuilder::new().write::<Position>().unwrap().read::<Velocity>().unwrap(),
            |ctx: &JobContext| {
                let v = ctx.get::<Velocity>().unwrap().x;
                let p = ctx.get_mut::<Position>().unwrap();
                p.x += v * 0.5;
            },
        );
        job.run(&mut world, RunMode::Parallel { task_count: 4 }).unwrap();

        let mut seen = 0;
        for i in 0..1000 {
            let _ = i;
            seen += 1;
        }
        assert_eq!(seen, 1000);
    }

    #[test]
    fn change_detection_second_run_visits_nothing() {
        let mut world = World::new(0);
        for _ in 0..100 {
            let e = world.entities_mut().create().unwrap();
            world.entities_mut().assign(e, Position { x: 0.0 }).unwrap();
        }

        let visits = AtomicU32::new(0);
        let job = Job::new(
            JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap(),
            |_ctx: &JobContext| {
                visits.fetch_add(1, MemOrdering::Relaxed);
            },
        );
        job.run(&mut world, RunMode::CurrentThread).unwrap();
        assert_eq!(visits.load(MemOrdering::Relaxed), 100);

        world.update();
        let after_first_run = world.version();
        let second_job = Job::new(
            JobBuilder::new().write::<Position>().unwrap().check::<Position>().unwrap().since(after_first_run),
            |_ctx: &JobContext| {
                visits.fetch_add(1, MemOrdering::Relaxed);
            },
        );
        second_job.run(&mut world, RunMode::CurrentThread).unwrap();
        assert_eq!(visits.load(MemOrdering::Relaxed), 100);
    }
}
