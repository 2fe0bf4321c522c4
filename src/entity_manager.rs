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

//! Entity manager: allocation, migration and destruction of entities,
//! and the archetype table they live in.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeIndex};
use crate::component::{Bundle, Component, MAX_BUNDLE_COMPONENTS};
use crate::entity::{Entity, EntityLocation, Slot, WorldId};
use crate::error::{EcsError, Result};
use crate::mask::ComponentIdMask;
use crate::registry::{self, register_component, ComponentId, LifecycleContext};

/// Run `id`'s registered destructor over the live value at `ptr`, if
/// one is registered. Callers overwriting an already-occupied column
/// (re-`assign`ing a component the entity already carries) must call
/// this before writing the new value, or the old value's destructor
/// never runs.
fn destroy_in_place(id: ComponentId, ptr: *mut u8, ctx: LifecycleContext) {
    registry::with_component_info(id, |info| {
        if let Some(f) = info.destroy {
            unsafe { f(ptr, ctx) };
        }
    });
}

pub struct EntityManager {
    world_id: WorldId,
    slots: SlotMap<Slot, EntityLocation>,
    archetypes: Vec<Archetype>,
    archetype_lookup: FxHashMap<ComponentIdMask, ArchetypeIndex>,
    empty_archetype: ArchetypeIndex,
    /// Incremented while a job dispatch is in progress over this
    /// manager's world; structural operations refuse to run while this
    /// is nonzero.
    dispatch_depth: u32,
}

impl EntityManager {
    pub fn new(world_id: WorldId) -> Self {
        let empty_archetype = ArchetypeIndex(0);
        let mut archetype_lookup = FxHashMap::default();
        archetype_lookup.insert(ComponentIdMask::new(), empty_archetype);
        Self {
            world_id,
            slots: SlotMap::with_key(),
            archetypes: vec![Archetype::new(empty_archetype, ComponentIdMask::new())],
            archetype_lookup,
            empty_archetype,
            dispatch_depth: 0,
        }
    }

    fn ctx_for(&self, entity: Entity) -> LifecycleContext {
        LifecycleContext {
            world_id: self.world_id,
            entity_id: entity.raw_id(),
        }
    }

    fn check_not_dispatching(&self) -> Result<()> {
        if self.dispatch_depth > 0 {
            Err(EcsError::StructuralChangeDuringIteration)
        } else {
            Ok(())
        }
    }

    /// Raise the dispatch guard. Called by the job dispatcher before it
    /// starts handing out pointers into archetype storage.
    pub(crate) fn begin_dispatch(&mut self) {
        self.dispatch_depth += 1;
    }

    /// Lower the dispatch guard. Called by the job dispatcher once every
    /// task has finished.
    pub(crate) fn end_dispatch(&mut self) {
        self.dispatch_depth = self.dispatch_depth.saturating_sub(1);
    }

    pub(crate) fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    fn try_location(&self, entity: Entity) -> Option<EntityLocation> {
        if entity.world_id() != self.world_id {
            return None;
        }
        self.slots.get(entity.slot()).copied()
    }

    fn validate(&self, entity: Entity) -> Result<EntityLocation> {
        self.try_location(entity).ok_or(EcsError::InvalidEntity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.try_location(entity).is_some()
    }

    fn get_or_create_archetype(&mut self, mask: ComponentIdMask) -> Result<ArchetypeIndex> {
        if let Some(&idx) = self.archetype_lookup.get(&mask) {
            return Ok(idx);
        }
        let idx = ArchetypeIndex(self.archetypes.len());
        self.archetypes.push(Archetype::new(idx, mask.clone()));
        self.archetype_lookup.insert(mask, idx);
        Ok(idx)
    }

    /// Part of the external interface: pre-create the archetype for
    /// `mask` without populating it.
    pub fn register_archetype(&mut self, mask: ComponentIdMask) -> Result<ArchetypeIndex> {
        self.get_or_create_archetype(mask)
    }

    fn apply_displacement(&mut self, loc: EntityLocation, displaced: Option<Entity>) {
        if let Some(e) = displaced {
            if let Some(l) = self.slots.get_mut(e.slot()) {
                l.row = loc.row;
            }
        }
    }

    /// Move `entity` (currently at `loc`) into archetype `target`.
    /// `target` must differ from `loc.archetype`.
    fn move_entity(
        &mut self,
        entity: Entity,
        loc: EntityLocation,
        target: ArchetypeIndex,
        skip_ctor_mask: &ComponentIdMask,
    ) -> Result<(usize, Option<Entity>)> {
        debug_assert_ne!(loc.archetype, target);
        let ctx = self.ctx_for(entity);
        let (target_ref, prev_ref) = if loc.archetype.0 < target.0 {
            let (left, right) = self.archetypes.split_at_mut(target.0);
            (&mut right[0], &mut left[loc.archetype.0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(loc.archetype.0);
            (&mut left[target.0], &mut right[0])
        };
        target_ref.external_move(entity, prev_ref, loc.row, skip_ctor_mask, ctx)
    }

    /// Create a brand-new entity in the empty archetype.
    pub fn create(&mut self) -> Result<Entity> {
        self.check_not_dispatching()?;
        let slot = self.slots.insert(EntityLocation {
            archetype: self.empty_archetype,
            row: 0,
        });
        let entity = Entity::new(slot, self.world_id);
        let ctx = self.ctx_for(entity);
        let row = self.archetypes[self.empty_archetype.0].insert(entity, &ComponentIdMask::new(), ctx)?;
        self.slots[slot].row = row;
        Ok(entity)
    }

    /// Create an entity with every field of `bundle` already assigned,
    /// landing directly in its final archetype in one structural
    /// transition.
    pub fn create_with<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        self.check_not_dispatching()?;
        #[cfg(feature = "profiling")]
        let _span = info_span!("entity_manager.create_with", archetype_count = self.archetypes.len()).entered();
        let ids = B::component_ids()?;
        let mut mask = ComponentIdMask::new();
        for &id in &ids {
            mask.insert(id);
        }
        let target = self.get_or_create_archetype(mask.clone())?;

        let slot = self.slots.insert(EntityLocation { archetype: target, row: 0 });
        let entity = Entity::new(slot, self.world_id);
        let ctx = self.ctx_for(entity);

        // skip_ctor_mask = the whole bundle mask: every field is about
        // to be overwritten directly, so default-construction would be
        // wasted work.
        let row = self.archetypes[target.0].insert(entity, &mask, ctx)?;
        let ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> = ids
            .iter()
            .map(|&id| {
                self.archetypes[target.0]
                    .get_component(id, row)
                    .expect("component id is part of this archetype's mask")
            })
            .collect();
        unsafe { bundle.write_components(&ptrs) };
        for &id in &ids {
            self.archetypes[target.0].run_after_assign(id, row, ctx);
        }
        self.slots[slot].row = row;
        Ok(entity)
    }

    pub fn destroy(&mut self, entity: Entity) -> Result<()> {
        self.check_not_dispatching()?;
        let loc = self.validate(entity)?;
        let ctx = self.ctx_for(entity);
        let displaced = self.archetypes[loc.archetype.0].remove(entity, loc.row, ctx)?;
        self.apply_displacement(loc, displaced);
        self.slots.remove(entity.slot());
        Ok(())
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = register_component::<T>().ok()?;
        let loc = self.try_location(entity)?;
        let ptr = self.archetypes[loc.archetype.0].get_component(id, loc.row)?;
        Some(unsafe { &*(ptr as *const T) })
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = register_component::<T>().ok()?;
        let loc = self.try_location(entity)?;
        let ptr = self.archetypes[loc.archetype.0].get_component(id, loc.row)?;
        Some(unsafe { &mut *(ptr as *mut T) })
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Ok(id) = register_component::<T>() else {
            return false;
        };
        self.try_location(entity)
            .map(|loc| self.archetypes[loc.archetype.0].has_component(id))
            .unwrap_or(false)
    }

    /// Assign `value` to `entity`, moving it to a new archetype if `T`
    /// was not already present.
    pub fn assign<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        self.check_not_dispatching()?;
        #[cfg(feature = "profiling")]
        let _span = info_span!("entity_manager.assign", component = std::any::type_name::<T>()).entered();
        let id = register_component::<T>()?;
        let loc = self.validate(entity)?;
        let ctx = self.ctx_for(entity);
        let old_mask = self.archetypes[loc.archetype.0].mask().clone();

        if old_mask.contains(id) {
            let ptr = self.archetypes[loc.archetype.0]
                .get_component(id, loc.row)
                .expect("mask says this column exists") as *mut T;
            destroy_in_place(id, ptr as *mut u8, ctx);
            unsafe { ptr.write(value) };
            self.archetypes[loc.archetype.0].run_after_assign(id, loc.row, ctx);
            return Ok(());
        }

        let mut new_mask = old_mask;
        new_mask.insert(id);
        let target = self.get_or_create_archetype(new_mask)?;
        let mut skip = ComponentIdMask::new();
        skip.insert(id);
        let (new_row, displaced) = self.move_entity(entity, loc, target, &skip)?;
        self.apply_displacement(loc, displaced);

        let ptr = self.archetypes[target.0]
            .get_component(id, new_row)
            .expect("just moved into this archetype") as *mut T;
        unsafe { ptr.write(value) };
        self.archetypes[target.0].run_after_assign(id, new_row, ctx);
        self.slots[entity.slot()] = EntityLocation { archetype: target, row: new_row };
        Ok(())
    }

    /// Remove `T` from `entity`, moving it to the archetype for the
    /// reduced mask. No-op if `T` was not present.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<()> {
        self.check_not_dispatching()?;
        let id = register_component::<T>()?;
        let loc = self.validate(entity)?;
        let old_mask = self.archetypes[loc.archetype.0].mask().clone();
        if !old_mask.contains(id) {
            return Ok(());
        }

        let mut new_mask = old_mask;
        new_mask.remove(id);
        let target = self.get_or_create_archetype(new_mask)?;
        let (new_row, displaced) = self.move_entity(entity, loc, target, &ComponentIdMask::new())?;
        self.apply_displacement(loc, displaced);
        self.slots[entity.slot()] = EntityLocation { archetype: target, row: new_row };
        Ok(())
    }

    /// Begin a fluent multi-assign on a brand-new entity: the entity's
    /// very first archetype visit is its final one, so no transient
    /// constructor/destructor pairs run for components assigned before
    /// `.end()`.
    pub fn begin(&mut self) -> Result<EntityBuilder<'_>> {
        self.check_not_dispatching()?;
        let entity = self.create()?;
        let loc = self.try_location(entity).expect("entity was just created");
        Ok(EntityBuilder {
            manager: self,
            entity,
            base_archetype: loc.archetype,
            base_row: loc.row,
            base_mask: ComponentIdMask::new(),
            mask: ComponentIdMask::new(),
            writers: Vec::new(),
        })
    }

    /// Begin a fluent multi-assign on an existing entity, coalescing
    /// every `.assign()` into a single archetype transition.
    pub fn build(&mut self, entity: Entity) -> Result<EntityBuilder<'_>> {
        self.check_not_dispatching()?;
        let loc = self.validate(entity)?;
        let mask = self.archetypes[loc.archetype.0].mask().clone();
        Ok(EntityBuilder {
            manager: self,
            entity,
            base_archetype: loc.archetype,
            base_row: loc.row,
            base_mask: mask.clone(),
            mask,
            writers: Vec::new(),
        })
    }
}

/// Coalesces a sequence of `.assign()` calls into one archetype
/// transition, performed on `.end()`.
pub struct EntityBuilder<'a> {
    manager: &'a mut EntityManager,
    entity: Entity,
    base_archetype: ArchetypeIndex,
    base_row: usize,
    /// The entity's component set before this builder ran any
    /// `.assign()` calls. An id in here already holds a live value by
    /// the time `.end()` writes to it, whether or not a move happened
    /// in between (a move transfers the live value via `invoke_move`
    /// rather than leaving it uninitialized).
    base_mask: ComponentIdMask,
    mask: ComponentIdMask,
    writers: Vec<(ComponentId, Box<dyn FnOnce(*mut u8)>)>,
}

impl<'a> EntityBuilder<'a> {
    pub fn assign<T: Component>(mut self, value: T) -> Result<Self> {
        let id = register_component::<T>()?;
        self.mask.insert(id);
        self.writers.retain(|(existing, _)| *existing != id);
        self.writers.push((
            id,
            Box::new(move |ptr: *mut u8| unsafe { (ptr as *mut T).write(value) }),
        ));
        Ok(self)
    }

    pub fn end(self) -> Result<Entity> {
        let EntityBuilder {
            manager,
            entity,
            base_archetype,
            base_row,
            base_mask,
            mask,
            writers,
        } = self;
        let target = manager.get_or_create_archetype(mask.clone())?;
        let ctx = manager.ctx_for(entity);

        let row = if target == base_archetype {
            base_row
        } else {
            let loc = EntityLocation { archetype: base_archetype, row: base_row };
            let (new_row, displaced) = manager.move_entity(entity, loc, target, &mask)?;
            manager.apply_displacement(loc, displaced);
            manager.slots[entity.slot()] = EntityLocation { archetype: target, row: new_row };
            new_row
        };

        for (id, writer) in writers {
            let ptr = manager.archetypes[target.0]
                .get_component(id, row)
                .expect("id was registered as part of this builder's mask");
            if base_mask.contains(id) {
                destroy_in_place(id, ptr, ctx);
            }
            writer(ptr);
            manager.archetypes[target.0].run_after_assign(id, row, ctx);
        }
        Ok(entity)
    }
}
