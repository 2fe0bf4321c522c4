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

//! World: a named entity manager plus the version clock jobs stamp
//! chunks against.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::archetype::WorldVersion;
use crate::entity::WorldId;
use crate::entity_manager::EntityManager;

/// Process-wide counter backing [`World::new_unique`].
fn next_world_id() -> WorldId {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Top-level handle to one ECS instance. Owns the entity/archetype
/// storage and a monotonic version counter that advances once per
/// `update()`; jobs compare a chunk's last-touched version against a
/// caller-supplied baseline to skip unchanged chunks.
pub struct World {
    id: WorldId,
    version: WorldVersion,
    paused: bool,
    entities: EntityManager,
}

impl World {
    pub fn new(id: WorldId) -> Self {
        Self { id, version: 0, paused: false, entities: EntityManager::new(id) }
    }

    /// Like [`World::new`], but derives `id` from a process-wide
    /// counter instead of taking one explicitly.
    pub fn new_unique() -> Self {
        Self::new(next_world_id())
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    pub fn version(&self) -> WorldVersion {
        self.version
    }

    /// Advances the version clock by one tick, unless paused. Call
    /// once per frame/step before dispatching jobs that write
    /// components, so their post-task stamps use a fresh value.
    pub fn update(&mut self) {
        if !self.paused {
            self.version += 1;
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_version_unless_paused() {
        let mut world = World::new(0);
        assert_eq!(world.version(), 0);
        world.update();
        assert_eq!(world.version(), 1);

        world.pause();
        world.update();
        assert_eq!(world.version(), 1);

        world.resume();
        world.update();
        assert_eq!(world.version(), 2);
    }

    #[test]
    fn new_unique_worlds_never_share_an_id() {
        let a = World::new_unique();
        let b = World::new_unique();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn entities_are_reachable_through_the_world() {
        let mut world = World::new(7);
        let entity = world.entities_mut().create().unwrap();
        assert!(world.entities().is_alive(entity));
        assert_eq!(entity.world_id(), 7);
    }
}
