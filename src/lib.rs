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

//! Archetype-based ECS runtime core.
//!
//! Entities are handles into a `World`; components live in SoA chunked
//! storage grouped by archetype (the exact set of component types an
//! entity carries). Structural changes (`assign`, `remove`, create,
//! destroy) move an entity's row between archetypes. Jobs read this
//! storage through a `Filter` that resolves to a list of independent
//! tasks, dispatched sequentially or across a rayon pool.

pub mod archetype;
mod bitset;
pub mod component;
pub mod entity;
pub mod entity_manager;
pub mod error;
pub mod filter;
pub mod job;
pub mod mask;
pub mod registry;
pub mod storage;
pub mod world;

pub use archetype::{Archetype, ArchetypeIndex, WorldVersion};
pub use component::{Bundle, Component};
pub use entity::{Entity, EntityLocation, Slot, WorldId};
pub use entity_manager::{EntityBuilder, EntityManager};
pub use error::{EcsError, Result};
pub use filter::{resolve_tasks, FilterResult, Task, TaskPiece};
pub use job::{InvocationIndex, Job, JobBuilder, JobContext, RunMode};
pub use mask::ComponentIdMask;
pub use registry::{
    component_info, register_component, register_component_cloneable, register_component_with_after_assign,
    shared_register, AfterAssign, ComponentId, LifecycleContext, SharedComponentId,
};
pub use world::World;
