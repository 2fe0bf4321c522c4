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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// An `Entity` handle does not refer to a live entity: unknown slot,
    /// or a stale generation from a destroyed/recycled slot.
    InvalidEntity,

    /// A component was registered with a default value whose size or
    /// alignment does not match the type it claims to describe.
    InvalidDefault,

    /// A lifecycle operation (create, destroy, copy, move, after_assign)
    /// was required but the registry has no function pointer recorded
    /// for it.
    MissingLifecycleFn,

    /// A chunked column allocation failed: size overflow, or the
    /// allocator returned null.
    ArchetypeAllocationFailed,

    /// An entity was spawned, despawned, or had a component assigned or
    /// removed while a job dispatch was in progress over the same world.
    StructuralChangeDuringIteration,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidEntity => write!(f, "entity handle does not refer to a live entity"),
            EcsError::InvalidDefault => {
                write!(f, "component default value size or alignment mismatch")
            }
            EcsError::MissingLifecycleFn => write!(
                f,
                "component registry has no lifecycle function for this operation"
            ),
            EcsError::ArchetypeAllocationFailed => {
                write!(f, "archetype chunk column allocation failed")
            }
            EcsError::StructuralChangeDuringIteration => write!(
                f,
                "structural change attempted while a job dispatch is in progress"
            ),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_non_empty_for_every_variant() {
        let variants = [
            EcsError::InvalidEntity,
            EcsError::InvalidDefault,
            EcsError::MissingLifecycleFn,
            EcsError::ArchetypeAllocationFailed,
            EcsError::StructuralChangeDuringIteration,
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
