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

//! Component and Bundle traits.
//!
//! Components are plain data attached to entities. Bundles group
//! several component values together so an entity can be created (or a
//! builder driven) with one structural transition instead of one per
//! component.

use smallvec::{smallvec, SmallVec};

use crate::error::Result;
use crate::registry::{register_component, ComponentId};

/// Maximum number of components supported by `Bundle` implementations.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for component payload types.
///
/// Components must be `'static` (no borrowed data) and `Default` —
/// the registry needs a default value to back both `ComponentInfo`'s
/// stored default bytes and the `create` lifecycle callback.
pub trait Component: 'static + Send + Sync + Default {}

/// A group of component values that can be written into an archetype
/// in a single pass. Tuple types up to arity
/// [`MAX_BUNDLE_COMPONENTS`] implement this automatically.
pub trait Bundle: Send + Sync + 'static {
    /// Component ids of every field, registering each type on first use.
    fn component_ids() -> Result<SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>>
    where
        Self: Sized;

    /// Write each field's bytes to the corresponding pointer in `ptrs`,
    /// which must be ordered the same way as [`Bundle::component_ids`].
    ///
    /// # Safety
    /// Every pointer in `ptrs` must be valid, writable, and aligned for
    /// the component type at that position.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn component_ids() -> Result<SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>> {
                Ok(smallvec![$(register_component::<$T>()?),*])
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
                let _ = i;
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Default)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, Default)]
    struct Velocity {
        x: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn single_component_bundle() {
        let ids = <(Position,)>::component_ids().unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn multi_component_bundle_has_distinct_ids() {
        let ids = <(Position, Velocity)>::component_ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }
}
