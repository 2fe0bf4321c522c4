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

//! Process-wide component registries.
//!
//! Two disjoint dense-id namespaces live here: one for ordinary
//! components, one for shared components. Both are keyed by the
//! registered type's stable name so that repeated registration of the
//! same type is idempotent, mirroring `ComponentIdStorage` in the
//! mustache ECS this crate's registry contract is grounded on.

use std::any::type_name;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::component::Component;
use crate::error::{EcsError, Result};

/// Context handed to component lifecycle callbacks in place of a live
/// `&World` reference, which would alias the `&mut World` already held
/// by whichever structural operation is running the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleContext {
    pub world_id: u32,
    pub entity_id: u64,
}

/// Dense id assigned to a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense id assigned to a registered shared-component type. Distinct
/// namespace from [`ComponentId`]; the same numeric value in each
/// namespace refers to unrelated types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SharedComponentId(pub(crate) u32);

impl SharedComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

type CreateFn = unsafe fn(*mut u8, LifecycleContext);
type DestroyFn = unsafe fn(*mut u8, LifecycleContext);
type AfterAssignFn = unsafe fn(*mut u8, LifecycleContext);
type CopyFn = unsafe fn(*mut u8, *const u8);
type MoveFn = unsafe fn(*mut u8, *mut u8);
type CompareFn = unsafe fn(*const u8, *const u8) -> bool;

/// Byte-level descriptor for a registered component type.
///
/// Any of `create`/`destroy`/`copy`/`move_fn`/`after_assign` may be
/// absent. Absence means the corresponding step is a no-op for
/// `create`/`destroy`/`after_assign`, and a [`EcsError::MissingLifecycleFn`]
/// failure if `copy`/`move_fn` is ever invoked without one.
pub struct ComponentInfo {
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub default_value: Vec<u8>,
    pub create: Option<CreateFn>,
    pub destroy: Option<DestroyFn>,
    pub after_assign: Option<AfterAssignFn>,
    pub copy: Option<CopyFn>,
    pub move_fn: Option<MoveFn>,
    pub compare: Option<CompareFn>,
}

impl ComponentInfo {
    fn validate(&self) -> Result<()> {
        if !self.default_value.is_empty() && self.default_value.len() != self.size {
            return Err(EcsError::InvalidDefault);
        }
        Ok(())
    }
}

/// Generic dense registry shared by the component and shared-component
/// namespaces. `register` is idempotent per type-name: a second
/// registration of the same name returns the same id and replaces the
/// stored descriptor, matching §4.1's dynamic-reload allowance.
struct Registry<Id> {
    by_name: FxHashMap<&'static str, u32>,
    infos: Vec<ComponentInfo>,
    _marker: std::marker::PhantomData<Id>,
}

impl<Id> Registry<Id>
where
    Id: From<u32> + Copy,
{
    fn new() -> Self {
        Self {
            by_name: FxHashMap::default(),
            infos: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    fn register(&mut self, info: ComponentInfo) -> Result<Id> {
        info.validate()?;
        if let Some(&existing) = self.by_name.get(info.name) {
            self.infos[existing as usize] = info;
            return Ok(Id::from(existing));
        }
        let id = self.infos.len() as u32;
        self.by_name.insert(info.name, id);
        self.infos.push(info);
        Ok(Id::from(id))
    }

    fn info_of(&self, index: usize) -> Option<&ComponentInfo> {
        self.infos.get(index)
    }
}

impl From<u32> for ComponentId {
    fn from(value: u32) -> Self {
        ComponentId(value)
    }
}

impl From<u32> for SharedComponentId {
    fn from(value: u32) -> Self {
        SharedComponentId(value)
    }
}

static COMPONENT_REGISTRY: OnceLock<RwLock<Registry<ComponentId>>> = OnceLock::new();
static SHARED_REGISTRY: OnceLock<RwLock<Registry<SharedComponentId>>> = OnceLock::new();

fn component_registry() -> &'static RwLock<Registry<ComponentId>> {
    COMPONENT_REGISTRY.get_or_init(|| RwLock::new(Registry::new()))
}

fn shared_registry() -> &'static RwLock<Registry<SharedComponentId>> {
    SHARED_REGISTRY.get_or_init(|| RwLock::new(Registry::new()))
}

unsafe fn create_trampoline<T: Component>(ptr: *mut u8, _ctx: LifecycleContext) {
    (ptr as *mut T).write(T::default());
}

unsafe fn destroy_trampoline<T: Component>(ptr: *mut u8, _ctx: LifecycleContext) {
    std::ptr::drop_in_place(ptr as *mut T);
}

unsafe fn move_trampoline<T: Component>(dst: *mut u8, src: *mut u8) {
    std::ptr::copy_nonoverlapping(src as *const T, dst as *mut T, 1);
}

unsafe fn copy_trampoline<T: Component + Clone>(dst: *mut u8, src: *const u8) {
    let value = (*(src as *const T)).clone();
    (dst as *mut T).write(value);
}

/// Components that need a hook run after every `create` and every
/// direct `assign`/builder write, mirroring how `Clone`/`PartialEq`
/// opt a type into `copy`/`compare`.
pub trait AfterAssign: Component {
    fn after_assign(&mut self, ctx: LifecycleContext);
}

unsafe fn after_assign_trampoline<T: AfterAssign>(ptr: *mut u8, ctx: LifecycleContext) {
    (*(ptr as *mut T)).after_assign(ctx);
}

fn default_value_bytes<T: Component>() -> Vec<u8> {
    let value = T::default();
    let size = std::mem::size_of::<T>();
    let mut bytes = vec![0u8; size];
    unsafe {
        std::ptr::copy_nonoverlapping(&value as *const T as *const u8, bytes.as_mut_ptr(), size);
    }
    std::mem::forget(value);
    bytes
}

/// Register (or re-register) `T` as a component type, returning its
/// process-wide dense id. Generates per-type lifecycle trampolines via
/// monomorphization; repeated calls for the same `T` are cheap after the
/// first thanks to a per-monomorphization cache.
pub fn register_component<T: Component>() -> Result<ComponentId> {
    static CACHE: OnceLock<RwLock<FxHashMap<&'static str, ComponentId>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(FxHashMap::default()));
    let name = type_name::<T>();
    if let Some(&id) = cache.read().get(name) {
        return Ok(id);
    }

    let info = ComponentInfo {
        name,
        size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        default_value: default_value_bytes::<T>(),
        create: Some(create_trampoline::<T>),
        destroy: Some(destroy_trampoline::<T>),
        after_assign: None,
        copy: None,
        move_fn: Some(move_trampoline::<T>),
        compare: None,
    };
    let id = component_registry().write().register(info)?;
    cache.write().insert(name, id);
    Ok(id)
}

/// Like [`register_component`] but also records a `copy` lifecycle
/// function for types that support being duplicated onto another
/// entity's column.
pub fn register_component_cloneable<T: Component + Clone>() -> Result<ComponentId> {
    static CACHE: OnceLock<RwLock<FxHashMap<&'static str, ComponentId>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(FxHashMap::default()));
    let name = type_name::<T>();
    if let Some(&id) = cache.read().get(name) {
        return Ok(id);
    }

    let info = ComponentInfo {
        name,
        size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        default_value: default_value_bytes::<T>(),
        create: Some(create_trampoline::<T>),
        destroy: Some(destroy_trampoline::<T>),
        after_assign: None,
        copy: Some(copy_trampoline::<T>),
        move_fn: Some(move_trampoline::<T>),
        compare: None,
    };
    let id = component_registry().write().register(info)?;
    cache.write().insert(name, id);
    Ok(id)
}

/// Like [`register_component`] but also wires up `T`'s [`AfterAssign`]
/// hook, run once after `create` and once after every direct `assign`
/// or builder write to an entity carrying `T`.
pub fn register_component_with_after_assign<T: AfterAssign>() -> Result<ComponentId> {
    static CACHE: OnceLock<RwLock<FxHashMap<&'static str, ComponentId>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(FxHashMap::default()));
    let name = type_name::<T>();
    if let Some(&id) = cache.read().get(name) {
        return Ok(id);
    }

    let info = ComponentInfo {
        name,
        size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        default_value: default_value_bytes::<T>(),
        create: Some(create_trampoline::<T>),
        destroy: Some(destroy_trampoline::<T>),
        after_assign: Some(after_assign_trampoline::<T>),
        copy: None,
        move_fn: Some(move_trampoline::<T>),
        compare: None,
    };
    let id = component_registry().write().register(info)?;
    cache.write().insert(name, id);
    Ok(id)
}

/// Register `T` in the shared-component namespace, including an
/// equality `compare` callback (shared components are deduplicated by
/// value).
pub fn shared_register<T: Component + PartialEq>() -> Result<SharedComponentId> {
    static CACHE: OnceLock<RwLock<FxHashMap<&'static str, SharedComponentId>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(FxHashMap::default()));
    let name = type_name::<T>();
    if let Some(&id) = cache.read().get(name) {
        return Ok(id);
    }

    unsafe fn compare_trampoline<T: PartialEq>(a: *const u8, b: *const u8) -> bool {
        (*(a as *const T)) == (*(b as *const T))
    }

    let info = ComponentInfo {
        name,
        size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        default_value: default_value_bytes::<T>(),
        create: Some(create_trampoline::<T>),
        destroy: Some(destroy_trampoline::<T>),
        after_assign: None,
        copy: None,
        move_fn: Some(move_trampoline::<T>),
        compare: Some(compare_trampoline::<T>),
    };
    let id = shared_registry().write().register(info)?;
    cache.write().insert(name, id);
    Ok(id)
}

/// Fetch the descriptor for a previously registered component id.
pub fn component_info(id: ComponentId) -> Option<ComponentInfoHandle> {
    let guard = component_registry().read();
    guard.info_of(id.index())?;
    Some(ComponentInfoHandle { id })
}

/// A handle that re-borrows the global registry lock on each access.
/// Cheap, and avoids returning a reference tied to a transient read
/// guard.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfoHandle {
    id: ComponentId,
}

impl ComponentInfoHandle {
    pub fn with<R>(&self, f: impl FnOnce(&ComponentInfo) -> R) -> R {
        let guard = component_registry().read();
        let info = guard.info_of(self.id.index()).expect("component id was validated at handle creation");
        f(info)
    }
}

pub(crate) fn with_component_info<R>(id: ComponentId, f: impl FnOnce(&ComponentInfo) -> R) -> Option<R> {
    let guard = component_registry().read();
    guard.info_of(id.index()).map(f)
}

pub(crate) fn with_shared_info<R>(id: SharedComponentId, f: impl FnOnce(&ComponentInfo) -> R) -> Option<R> {
    let guard = shared_registry().read();
    guard.info_of(id.index()).map(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }
    impl Component for Position {}

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Velocity {
        x: f32,
        y: f32,
        z: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn registration_is_idempotent_and_dense() {
        let a = register_component::<Position>().unwrap();
        let b = register_component::<Position>().unwrap();
        assert_eq!(a, b);

        let c = register_component::<Velocity>().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn mismatched_default_value_is_rejected() {
        let info = ComponentInfo {
            name: "weave_ecs::registry::tests::Bogus",
            size: 12,
            align: 4,
            default_value: vec![0u8; 4], // wrong length for `size`
            create: None,
            destroy: None,
            after_assign: None,
            copy: None,
            move_fn: None,
            compare: None,
        };
        let err = component_registry().write().register(info).unwrap_err();
        assert_eq!(err, EcsError::InvalidDefault);
    }

    #[test]
    fn after_assign_hook_runs_through_its_trampoline() {
        use std::sync::atomic::{AtomicU32, Ordering};
        static CALLS: AtomicU32 = AtomicU32::new(0);

        #[derive(Default)]
        struct Tagged(u32);
        impl Component for Tagged {}
        impl AfterAssign for Tagged {
            fn after_assign(&mut self, _ctx: LifecycleContext) {
                self.0 += 1;
                CALLS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let id = register_component_with_after_assign::<Tagged>().unwrap();
        let mut value = Tagged::default();
        let ctx = LifecycleContext { world_id: 0, entity_id: 0 };
        with_component_info(id, |info| {
            let f = info.after_assign.expect("registered with an after_assign hook");
            unsafe { f(&mut value as *mut Tagged as *mut u8, ctx) };
        });
        assert_eq!(value.0, 1);
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn info_round_trips_size_and_align() {
        let id = register_component::<Position>().unwrap();
        let handle = component_info(id).unwrap();
        handle.with(|info| {
            assert_eq!(info.size, std::mem::size_of::<Position>());
            assert_eq!(info.align, std::mem::align_of::<Position>());
        });
    }
}
