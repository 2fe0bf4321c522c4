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

//! Entity handles.
//!
//! An entity is the stable `(id, version, world_id)` triple described
//! in the data model. `id`/`version` are carried by a [`slotmap`] key,
//! which already bumps its generation on every slot recycling — the
//! dangling-handle detection the arena pattern calls for.

use slotmap::{new_key_type, Key};

new_key_type! {
    /// The slot half of an entity handle: a dense index plus a
    /// generation counter that increments every time the slot is
    /// recycled.
    pub struct Slot;
}

/// Identifies a `World`. Distinct worlds never interact, so two
/// entities from different worlds are never equal even if their slots
/// coincide.
pub type WorldId = u32;

/// A stable handle to a logical object living in one `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    slot: Slot,
    world_id: WorldId,
}

impl Entity {
    pub(crate) fn new(slot: Slot, world_id: WorldId) -> Self {
        Self { slot, world_id }
    }

    pub(crate) fn slot(&self) -> Slot {
        self.slot
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// The slot's dense index, stable for the lifetime of the slot.
    pub fn id(&self) -> u32 {
        self.slot.data().as_ffi() as u32
    }

    /// The slot's generation; increments every time the slot is freed
    /// and reused.
    pub fn version(&self) -> u32 {
        (self.slot.data().as_ffi() >> 32) as u32
    }

    /// Compact 64-bit form combining id and version, used as the
    /// entity-half of a `LifecycleContext`.
    pub fn raw_id(&self) -> u64 {
        self.slot.data().as_ffi()
    }
}

/// Where an entity currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype: crate::archetype::ArchetypeIndex,
    pub row: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn recycled_slot_has_different_version() {
        let mut slots: SlotMap<Slot, ()> = SlotMap::with_key();
        let a = slots.insert(());
        slots.remove(a);
        let b = slots.insert(());

        let ea = Entity::new(a, 0);
        let eb = Entity::new(b, 0);
        assert_ne!(ea, eb);
    }

    #[test]
    fn different_worlds_never_equal() {
        let mut slots: SlotMap<Slot, ()> = SlotMap::with_key();
        let s = slots.insert(());
        let e1 = Entity::new(s, 0);
        let e2 = Entity::new(s, 1);
        assert_ne!(e1, e2);
    }
}
