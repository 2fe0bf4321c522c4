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

//! World-filter / query resolution: turns a mask+version predicate
//! into a list of `(archetype, entity-range)` tasks for the dispatcher.

use smallvec::SmallVec;

use crate::archetype::{ArchetypeIndex, WorldVersion};
use crate::entity_manager::EntityManager;
use crate::mask::ComponentIdMask;

/// A resolved query predicate: which archetypes to visit
/// (`required_mask`), which chunks within them to skip
/// (`check_mask`/`last_version`), and which columns the job will stamp
/// with the current world version (`update_mask`).
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    pub required_mask: ComponentIdMask,
    pub check_mask: ComponentIdMask,
    pub update_mask: ComponentIdMask,
    pub last_version: WorldVersion,
}

/// One contiguous sub-range of one archetype.
#[derive(Debug, Clone, Copy)]
pub struct TaskPiece {
    pub archetype: ArchetypeIndex,
    pub first_entity: usize,
    pub count: usize,
}

/// The dispatcher's unit of work: a list of pieces whose total entity
/// count is roughly `total_matching / task_count`. A task almost always
/// holds one piece; it holds more only when a raw qualifying range had
/// to be split to keep tasks balanced.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub pieces: SmallVec<[TaskPiece; 4]>,
}

impl Task {
    pub fn entity_count(&self) -> usize {
        self.pieces.iter().map(|p| p.count).sum()
    }
}

/// Resolve `filter` against `entities`' archetype table into a list of
/// tasks partitioned as evenly as possible into `task_count` groups.
pub fn resolve_tasks(entities: &EntityManager, filter: &FilterResult, task_count: usize) -> Vec<Task> {
    let ranges = qualifying_ranges(entities, filter);
    partition_into_tasks(ranges, task_count)
}

fn qualifying_ranges(entities: &EntityManager, filter: &FilterResult) -> Vec<TaskPiece> {
    let mut ranges = Vec::new();
    for archetype in entities.archetypes() {
        if archetype.is_empty() || !archetype.is_match(&filter.required_mask) {
            continue;
        }

        if filter.check_mask.is_empty() {
            ranges.push(TaskPiece {
                archetype: archetype.index(),
                first_entity: 0,
                count: archetype.len(),
            });
            continue;
        }

        let chunk_capacity = archetype.chunk_capacity();
        let chunk_count = archetype.chunk_count();
        let mut run_start: Option<usize> = None;

        for chunk in 0..chunk_count {
            let first_row = chunk * chunk_capacity;
            let qualifies = filter
                .check_mask
                .iter()
                .any(|id| archetype.chunk_version(id, first_row) >= filter.last_version);

            if qualifies {
                run_start.get_or_insert(first_row);
            } else if let Some(start) = run_start.take() {
                ranges.push(TaskPiece {
                    archetype: archetype.index(),
                    first_entity: start,
                    count: first_row - start,
                });
            }
        }
        if let Some(start) = run_start {
            ranges.push(TaskPiece {
                archetype: archetype.index(),
                first_entity: start,
                count: archetype.len() - start,
            });
        }
    }
    ranges
}

fn partition_into_tasks(ranges: Vec<TaskPiece>, task_count: usize) -> Vec<Task> {
    let total_entities: usize = ranges.iter().map(|r| r.count).sum();
    if total_entities == 0 {
        return Vec::new();
    }
    let task_count = task_count.max(1);
    let target_per_task = total_entities.div_ceil(task_count);

    let mut tasks = Vec::new();
    let mut current = Task::default();
    let mut current_count = 0usize;

    for range in ranges {
        let mut remaining = range.count;
        let mut offset = range.first_entity;
        while remaining > 0 {
            let space = (target_per_task - current_count).max(1);
            let take = remaining.min(space);
            current.pieces.push(TaskPiece {
                archetype: range.archetype,
                first_entity: offset,
                count: take,
            });
            current_count += take;
            offset += take;
            remaining -= take;
            if current_count >= target_per_task {
                tasks.push(std::mem::take(&mut current));
                current_count = 0;
            }
        }
    }
    if !current.pieces.is_empty() {
        tasks.push(current);
    }
    tasks
}
