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

//! `ComponentIdMask`: an unordered set of [`ComponentId`]s identifying
//! an archetype or a query predicate.

use smallvec::SmallVec;

use crate::bitset::BitSet;
use crate::registry::ComponentId;

/// An unordered, equatable set of component ids. Two masks with the
/// same members are equal regardless of insertion order or backing
/// capacity, which makes `ComponentIdMask` usable as the key of the
/// entity manager's archetype lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentIdMask {
    bits: BitSet,
}

impl ComponentIdMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ComponentId) {
        self.bits.set(id.index());
    }

    pub fn remove(&mut self, id: ComponentId) {
        self.bits.clear(id.index());
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.bits.contains(id.index())
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    /// True iff every id in `self` is also in `other` — i.e. `self ⊆ other`.
    pub fn is_subset_of(&self, other: &ComponentIdMask) -> bool {
        self.bits.is_subset(&other.bits)
    }

    pub fn union(&self, other: &ComponentIdMask) -> ComponentIdMask {
        let mut result = self.clone();
        result.bits.union_with(&other.bits);
        result
    }

    pub fn intersection(&self, other: &ComponentIdMask) -> ComponentIdMask {
        let mut result = self.clone();
        result.bits.intersect_with(&other.bits);
        result
    }

    pub fn difference(&self, other: &ComponentIdMask) -> ComponentIdMask {
        let mut result = self.clone();
        result.bits.difference_with(&other.bits);
        result
    }

    pub fn intersects(&self, other: &ComponentIdMask) -> bool {
        self.bits.intersects(&other.bits)
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.bits.ones().map(|idx| ComponentId::from(idx as u32))
    }

    pub fn to_small_vec(&self) -> SmallVec<[ComponentId; 8]> {
        self.iter().collect()
    }
}

impl FromIterator<ComponentId> for ComponentIdMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        let mut mask = ComponentIdMask::new();
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ComponentId {
        ComponentId::from(n)
    }

    #[test]
    fn subset_union_intersection_difference() {
        let mut a = ComponentIdMask::new();
        a.insert(id(1));
        a.insert(id(2));

        let mut b = ComponentIdMask::new();
        b.insert(id(2));
        b.insert(id(3));

        assert!(!a.is_subset_of(&b));
        let mut ab = ComponentIdMask::new();
        ab.insert(id(2));
        assert_eq!(a.intersection(&b), ab);

        let mut union = ComponentIdMask::new();
        union.insert(id(1));
        union.insert(id(2));
        union.insert(id(3));
        assert_eq!(a.union(&b), union);

        let mut diff = ComponentIdMask::new();
        diff.insert(id(1));
        assert_eq!(a.difference(&b), diff);
    }

    #[test]
    fn equal_masks_from_different_orders_hash_equal() {
        use std::collections::HashMap;

        let mut a = ComponentIdMask::new();
        a.insert(id(5));
        a.insert(id(1));

        let mut b = ComponentIdMask::new();
        b.insert(id(1));
        b.insert(id(5));

        assert_eq!(a, b);

        let mut map: HashMap<ComponentIdMask, &'static str> = HashMap::new();
        map.insert(a, "archetype");
        assert_eq!(map.get(&b), Some(&"archetype"));
    }
}
