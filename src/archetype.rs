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

//! Archetype: SoA storage for every live entity sharing one exact
//! component set, with chunked columns and per-chunk version stamps.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::MAX_BUNDLE_COMPONENTS;
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::mask::ComponentIdMask;
use crate::registry::{self, ComponentId, LifecycleContext};
use crate::storage::{choose_chunk_capacity, ColumnLayout, RawChunkColumn};

/// A world-unique index identifying one archetype within the entity
/// manager's archetype table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeIndex(pub usize);

/// A monotonically increasing tick stamped on chunks to drive
/// change-detection.
pub type WorldVersion = u32;

fn invoke_create(id: ComponentId, ptr: *mut u8, ctx: LifecycleContext) {
    registry::with_component_info(id, |info| {
        if let Some(f) = info.create {
            unsafe { f(ptr, ctx) };
        }
    })
    .expect("component id must be registered");
}

fn invoke_destroy(id: ComponentId, ptr: *mut u8, ctx: LifecycleContext) {
    registry::with_component_info(id, |info| {
        if let Some(f) = info.destroy {
            unsafe { f(ptr, ctx) };
        }
    })
    .expect("component id must be registered");
}

fn invoke_after_assign(id: ComponentId, ptr: *mut u8, ctx: LifecycleContext) {
    registry::with_component_info(id, |info| {
        if let Some(f) = info.after_assign {
            unsafe { f(ptr, ctx) };
        }
    })
    .expect("component id must be registered");
}

fn invoke_move(id: ComponentId, dst: *mut u8, src: *mut u8) -> Result<()> {
    registry::with_component_info(id, |info| match info.move_fn {
        Some(f) => {
            unsafe { f(dst, src) };
            Ok(())
        }
        None => Err(EcsError::MissingLifecycleFn),
    })
    .expect("component id must be registered")
}

fn column_layout(id: ComponentId) -> ColumnLayout {
    registry::with_component_info(id, |info| ColumnLayout {
        size: info.size,
        align: info.align,
    })
    .expect("component id must be registered")
}

/// SoA storage for every entity whose live component set equals
/// `mask`.
pub struct Archetype {
    index: ArchetypeIndex,
    mask: ComponentIdMask,
    component_ids: SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>,
    component_index_of: FxHashMap<ComponentId, usize>,
    entities: Vec<Entity>,
    columns: Vec<RawChunkColumn>,
    chunk_capacity: usize,
    /// `versions[column][chunk]`.
    versions: Vec<Vec<WorldVersion>>,
}

impl Archetype {
    pub fn new(index: ArchetypeIndex, mask: ComponentIdMask) -> Self {
        // Ascending ComponentId order, which doubles as the
        // destructor-fairness order §4.3 requires.
        let component_ids: SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]> = mask.to_small_vec();
        let mut component_index_of = FxHashMap::default();
        let mut sum_sizes = 0usize;
        let layouts: Vec<ColumnLayout> = component_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                component_index_of.insert(id, i);
                let layout = column_layout(id);
                sum_sizes += layout.size;
                layout
            })
            .collect();
        let chunk_capacity = choose_chunk_capacity(sum_sizes);
        let columns = layouts
            .into_iter()
            .map(|layout| RawChunkColumn::new(layout, chunk_capacity))
            .collect();
        let versions = vec![Vec::new(); component_ids.len()];

        Self {
            index,
            mask,
            component_ids,
            component_index_of,
            entities: Vec::new(),
            columns,
            chunk_capacity,
            versions,
        }
    }

    pub fn index(&self) -> ArchetypeIndex {
        self.index
    }

    pub fn mask(&self) -> &ComponentIdMask {
        &self.mask
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn chunk_count(&self) -> usize {
        if self.entities.is_empty() {
            0
        } else {
            (self.entities.len() - 1) / self.chunk_capacity.max(1) + 1
        }
    }

    /// True iff `required ⊆ self.mask` — queries select archetypes that
    /// are a superset of the required mask.
    pub fn is_match(&self, required: &ComponentIdMask) -> bool {
        required.is_subset_of(&self.mask)
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.component_index_of.contains_key(&id)
    }

    fn column_index(&self, id: ComponentId) -> Option<usize> {
        self.component_index_of.get(&id).copied()
    }

    fn ensure_row_capacity(&mut self, row: usize) -> Result<()> {
        for column in &mut self.columns {
            column.ensure_capacity(row).map_err(|_| EcsError::ArchetypeAllocationFailed)?;
        }
        let needed_chunk = row / self.chunk_capacity.max(1) + 1;
        for versions in &mut self.versions {
            if versions.len() < needed_chunk {
                versions.resize(needed_chunk, 0);
            }
        }
        Ok(())
    }

    fn destroy_row(&mut self, row: usize, ctx: LifecycleContext) {
        for (col_idx, &id) in self.component_ids.clone().iter().enumerate() {
            let ptr = unsafe { self.columns[col_idx].get_unchecked(row) };
            invoke_destroy(id, ptr, ctx);
        }
    }

    /// Append a new entity, running `create`+`after_assign` for every
    /// component in `mask \ skip_ctor_mask`. Returns the new row.
    pub fn insert(
        &mut self,
        entity: Entity,
        skip_ctor_mask: &ComponentIdMask,
        ctx: LifecycleContext,
    ) -> Result<usize> {
        let row = self.entities.len();
        self.entities.push(entity);
        self.ensure_row_capacity(row)?;

        let ids = self.component_ids.clone();
        for (col_idx, id) in ids.iter().enumerate() {
            if skip_ctor_mask.contains(*id) {
                continue;
            }
            let ptr = unsafe { self.columns[col_idx].get_unchecked(row) };
            invoke_create(*id, ptr, ctx);
            invoke_after_assign(*id, ptr, ctx);
        }
        Ok(row)
    }

    /// Move `entity` (currently at `prev_index` in `prev`) into this
    /// archetype. Components present in both archetypes are
    /// `move`-transferred; components newly present are `create`d
    /// (unless listed in `skip_ctor_mask`); components only in `prev`
    /// are `destroy`ed. Returns `(new_row, displaced)` where
    /// `displaced` is the entity (if any) that was swapped into
    /// `prev_index` after the swap-remove from `prev`.
    pub fn external_move(
        &mut self,
        entity: Entity,
        prev: &mut Archetype,
        prev_index: usize,
        skip_ctor_mask: &ComponentIdMask,
        ctx: LifecycleContext,
    ) -> Result<(usize, Option<Entity>)> {
        let row = self.entities.len();
        self.entities.push(entity);
        self.ensure_row_capacity(row)?;

        let ids = self.component_ids.clone();
        for (col_idx, id) in ids.iter().enumerate() {
            let dst = unsafe { self.columns[col_idx].get_unchecked(row) };
            if let Some(prev_col) = prev.column_index(*id) {
                let src = unsafe { prev.columns[prev_col].get_unchecked(prev_index) };
                invoke_move(*id, dst, src)?;
            } else if !skip_ctor_mask.contains(*id) {
                invoke_create(*id, dst, ctx);
                invoke_after_assign(*id, dst, ctx);
            }
        }

        // Components only in prev: destroy before the swap-remove reuses
        // their bytes.
        let prev_ids = prev.component_ids.clone();
        for (col_idx, id) in prev_ids.iter().enumerate() {
            if self.column_index(*id).is_none() {
                let ptr = unsafe { prev.columns[col_idx].get_unchecked(prev_index) };
                invoke_destroy(*id, ptr, ctx);
            }
        }

        let displaced = prev.swap_remove_row(prev_index)?;
        Ok((row, displaced))
    }

    /// Destroy the entity at `index` and swap-remove its row.
    /// Precondition: `self.entities[index] == entity`. Returns the
    /// entity (if any) that was swapped into `index`.
    pub fn remove(&mut self, entity: Entity, index: usize, ctx: LifecycleContext) -> Result<Option<Entity>> {
        if self.entities.get(index) != Some(&entity) {
            return Err(EcsError::InvalidEntity);
        }
        self.destroy_row(index, ctx);
        self.swap_remove_row(index)
    }

    /// Low-level swap-with-last used by both `remove` and
    /// `external_move`. Does **not** run any destructor — callers must
    /// have already destroyed or moved out of `index` before calling
    /// this. The survivor's row is relocated through each component's
    /// registered `move` function, never a bitwise copy, so this fails
    /// with `MissingLifecycleFn` if a component has none registered.
    /// Returns the entity that now occupies `index`, if the removed row
    /// was not already the last one.
    fn swap_remove_row(&mut self, index: usize) -> Result<Option<Entity>> {
        let last = self.entities.len() - 1;
        if index != last {
            for col_idx in 0..self.columns.len() {
                let id = self.component_ids[col_idx];
                let src = unsafe { self.columns[col_idx].get_unchecked(last) };
                let dst = unsafe { self.columns[col_idx].get_unchecked(index) };
                invoke_move(id, dst, src)?;
            }
            self.entities[index] = self.entities[last];
        }
        self.entities.pop();
        if index != last {
            Ok(Some(self.entities[index]))
        } else {
            Ok(None)
        }
    }

    /// Raw pointer to `id`'s value for the entity at `row`, without
    /// touching the chunk's version stamp. `None` if `id` is not part
    /// of this archetype or `row` is out of range.
    pub fn get_component(&self, id: ComponentId, row: usize) -> Option<*mut u8> {
        let col_idx = self.column_index(id)?;
        self.columns[col_idx].get(row)
    }

    /// Like [`Archetype::get_component`] but stamps the chunk covering
    /// `row` with `world_version` on the `id` column — the path jobs
    /// use for components in their `update_mask`.
    pub fn get_component_versioned(
        &mut self,
        id: ComponentId,
        row: usize,
        world_version: WorldVersion,
    ) -> Option<*mut u8> {
        let col_idx = self.column_index(id)?;
        let ptr = self.columns[col_idx].get(row)?;
        let chunk = row / self.chunk_capacity.max(1);
        if let Some(slot) = self.versions[col_idx].get_mut(chunk) {
            *slot = world_version;
        }
        Some(ptr)
    }

    /// Version last stamped on the chunk covering `row` for column
    /// `id`, or `0` if the column is absent or the chunk has never
    /// been stamped.
    pub fn chunk_version(&self, id: ComponentId, row: usize) -> WorldVersion {
        let Some(col_idx) = self.column_index(id) else {
            return 0;
        };
        let chunk = row / self.chunk_capacity.max(1);
        self.versions[col_idx].get(chunk).copied().unwrap_or(0)
    }

    /// Stamp every column in `update_mask` for the chunk at
    /// `chunk_index` with `world_version`, used by the dispatcher after
    /// a task finishes.
    pub fn stamp_chunk(&mut self, update_mask: &ComponentIdMask, chunk_index: usize, world_version: WorldVersion) {
        for id in update_mask.iter() {
            if let Some(col_idx) = self.column_index(id) {
                if let Some(slot) = self.versions[col_idx].get_mut(chunk_index) {
                    *slot = world_version;
                }
            }
        }
    }

    pub fn chunk_capacity_for_range(&self) -> usize {
        self.chunk_capacity
    }

    /// Invoke `id`'s `after_assign` callback for the value at `row`, if
    /// the registry has one. Used by callers (entity manager, builder)
    /// that write payload bytes directly under a `skip_ctor_mask` and
    /// are therefore responsible for this step themselves.
    pub fn run_after_assign(&self, id: ComponentId, row: usize, ctx: LifecycleContext) {
        if let Some(ptr) = self.get_component(id, row) {
            invoke_after_assign(id, ptr, ctx);
        }
    }

    /// A non-owning, non-version-bumping cursor over one row, used for
    /// sequential scans outside the job dispatcher.
    pub fn element_view(&self, row: usize) -> Option<ElementView<'_>> {
        if row >= self.entities.len() {
            return None;
        }
        Some(ElementView { archetype: self, row })
    }
}

/// A read-only, non-version-bumping view over a single archetype row.
/// Must never outlive a structural change to its archetype.
pub struct ElementView<'a> {
    archetype: &'a Archetype,
    row: usize,
}

impl<'a> ElementView<'a> {
    pub fn entity(&self) -> Entity {
        self.archetype.entities[self.row]
    }

    pub fn component(&self, id: ComponentId) -> Option<*const u8> {
        self.archetype.get_component(id, self.row).map(|p| p as *const u8)
    }
}
