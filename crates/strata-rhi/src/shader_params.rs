// Copyright 2025 eraflo
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

//! Packed uniform staging.
//!
//! Loose shader parameters are written into per-type scratch arrays. Writes
//! widen a dirty range counted in 16-byte vectors; at draw time each array the
//! bound shader declares is uploaded if dirty. Uniform buffers that the shader
//! compiler lowered to packed arrays are spliced in from their constant data.

use crate::resource_table::StageResourceBindings;
use crate::stage::ShaderStageBinder;
use strata_core::renderer::{PackedTypeIndex, ShaderBindings, MAX_UNIFORM_BUFFERS_PER_STAGE};

const VECTOR_BYTES: usize = 16;
const FLOAT_BYTES: usize = 4;

/// A half-open range of 16-byte vectors. `(0, 0)` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyRange {
    /// First dirty vector.
    pub low: u32,
    /// One past the last dirty vector.
    pub high: u32,
}

impl DirtyRange {
    /// The empty range.
    pub const EMPTY: Self = Self { low: 0, high: 0 };

    /// `true` if nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }

    fn include(&mut self, low: u32, high: u32) {
        if self.is_empty() {
            *self = Self { low, high };
        } else {
            self.low = self.low.min(low);
            self.high = self.high.max(high);
        }
    }
}

/// Packed uniform scratch arrays of one shader stage.
#[derive(Debug)]
pub struct ShaderParameterCache {
    scratch: [Vec<u8>; PackedTypeIndex::COUNT],
    dirty: [DirtyRange; PackedTypeIndex::COUNT],
    uniform_buffer_ids: [u64; MAX_UNIFORM_BUFFERS_PER_STAGE],
    emulated_scratch: Vec<u8>,
}

impl ShaderParameterCache {
    /// Creates a cache with `scratch_bytes` of storage per type.
    pub fn new(scratch_bytes: usize) -> Self {
        Self {
            scratch: std::array::from_fn(|_| vec![0; scratch_bytes]),
            dirty: [DirtyRange::EMPTY; PackedTypeIndex::COUNT],
            uniform_buffer_ids: [0; MAX_UNIFORM_BUFFERS_PER_STAGE],
            emulated_scratch: Vec::new(),
        }
    }

    /// Writes `data` at `byte_offset` of the `type_index` array.
    ///
    /// # Panics
    ///
    /// Panics if the write runs past the scratch array.
    pub fn set(&mut self, type_index: PackedTypeIndex, byte_offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let i = type_index.index();
        let end = byte_offset + data.len();
        assert!(
            end <= self.scratch[i].len(),
            "{type_index:?} parameter write [{byte_offset}, {end}) runs past the {} byte scratch array",
            self.scratch[i].len()
        );
        self.scratch[i][byte_offset..end].copy_from_slice(data);
        self.dirty[i].include(
            (byte_offset / VECTOR_BYTES) as u32,
            end.div_ceil(VECTOR_BYTES) as u32,
        );
    }

    /// The dirty range of `type_index`.
    pub fn dirty_range(&self, type_index: PackedTypeIndex) -> DirtyRange {
        self.dirty[type_index.index()]
    }

    /// The scratch bytes of `type_index`.
    pub fn scratch(&self, type_index: PackedTypeIndex) -> &[u8] {
        &self.scratch[type_index.index()]
    }

    /// Marks every array fully dirty and forgets which uniform buffers were
    /// spliced in, forcing a full re-upload on the next commit.
    pub fn mark_all_dirty(&mut self) {
        for (dirty, scratch) in self.dirty.iter_mut().zip(&self.scratch) {
            *dirty = DirtyRange {
                low: 0,
                high: (scratch.len() / VECTOR_BYTES) as u32,
            };
        }
        self.uniform_buffer_ids = [0; MAX_UNIFORM_BUFFERS_PER_STAGE];
    }

    /// Uploads every dirty array `bindings` declares, in full, and clears its
    /// dirty range.
    pub fn commit_packed_globals(&mut self, binder: &mut dyn ShaderStageBinder, bindings: &ShaderBindings) {
        for array in &bindings.packed_global_arrays {
            let i = array.type_index.index();
            if self.dirty[i].is_empty() {
                continue;
            }
            let size = array.size_bytes as usize;
            assert!(
                size <= self.scratch[i].len(),
                "packed {:?} array of {size} bytes does not fit the scratch array",
                array.type_index
            );
            binder.set_constants(array.buffer_slot, &self.scratch[i][..size]);
            self.dirty[i] = DirtyRange::EMPTY;
        }
    }

    /// Splices bound uniform buffers into packed arrays.
    ///
    /// Flattened shaders copy each changed buffer into the packed globals,
    /// which are uploaded by [`Self::commit_packed_globals`]. Otherwise each
    /// changed buffer is expanded into its own packed arrays and uploaded right
    /// away. A buffer counts as changed when a different uniform buffer (by
    /// unique id) is bound at its index than at the previous commit.
    pub fn commit_packed_uniform_buffers(
        &mut self,
        binder: &mut dyn ShaderStageBinder,
        bindings: &ShaderBindings,
        uniform_buffers: &StageResourceBindings,
    ) {
        if bindings.flatten_uniform_buffers {
            let mut previous_source = None;
            let mut source_changed = false;
            for copy in &bindings.uniform_buffer_copy_info {
                let source = copy.source_ub_index as usize;
                let Some(buffer) = uniform_buffers.get(source) else {
                    continue;
                };
                if previous_source != Some(source) {
                    previous_source = Some(source);
                    source_changed = self.uniform_buffer_ids[source] != buffer.unique_id();
                    self.uniform_buffer_ids[source] = buffer.unique_id();
                }
                if !source_changed {
                    continue;
                }
                let src = copy.source_offset_floats as usize * FLOAT_BYTES;
                let len = copy.size_floats as usize * FLOAT_BYTES;
                let data = &buffer.contents()[src..src + len];
                self.set(copy.dest_type_index, copy.dest_offset_floats as usize * FLOAT_BYTES, data);
            }
            return;
        }

        for (index, arrays) in bindings.packed_uniform_buffers.iter().enumerate() {
            let Some(buffer) = uniform_buffers.get(index) else {
                continue;
            };
            if self.uniform_buffer_ids[index] == buffer.unique_id() {
                continue;
            }
            self.uniform_buffer_ids[index] = buffer.unique_id();

            for array in arrays {
                self.emulated_scratch.clear();
                self.emulated_scratch.resize(array.size_bytes as usize, 0);
                for copy in bindings.uniform_buffer_copy_info.iter().filter(|c| {
                    c.source_ub_index as usize == index && c.dest_type_index == array.type_index
                }) {
                    let src = copy.source_offset_floats as usize * FLOAT_BYTES;
                    let dst = copy.dest_offset_floats as usize * FLOAT_BYTES;
                    let len = copy.size_floats as usize * FLOAT_BYTES;
                    self.emulated_scratch[dst..dst + len]
                        .copy_from_slice(&buffer.contents()[src..src + len]);
                }
                binder.set_constants(array.buffer_slot, &self.emulated_scratch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingBinder;
    use crate::resource_table::{UniformBuffer, UniformBufferLayout};
    use std::sync::Arc;
    use strata_core::renderer::{PackedArrayInfo, UniformBufferCopyInfo};

    fn globals(size_bytes: u32) -> ShaderBindings {
        ShaderBindings {
            packed_global_arrays: vec![PackedArrayInfo {
                type_index: PackedTypeIndex::Highp,
                size_bytes,
                buffer_slot: 0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_dirty_range_is_the_union_of_writes() {
        let mut cache = ShaderParameterCache::new(1024);
        cache.set(PackedTypeIndex::Highp, 64, &[1; 16]);
        assert_eq!(cache.dirty_range(PackedTypeIndex::Highp), DirtyRange { low: 4, high: 5 });
        cache.set(PackedTypeIndex::Highp, 8, &[2; 4]);
        assert_eq!(cache.dirty_range(PackedTypeIndex::Highp), DirtyRange { low: 0, high: 5 });
        cache.set(PackedTypeIndex::Highp, 100, &[3; 30]);
        assert_eq!(cache.dirty_range(PackedTypeIndex::Highp), DirtyRange { low: 0, high: 9 });
        assert!(cache.dirty_range(PackedTypeIndex::Int).is_empty());
    }

    #[test]
    fn test_commit_uploads_declared_size_and_clears() {
        let mut cache = ShaderParameterCache::new(1024);
        cache.set(PackedTypeIndex::Highp, 16, &[7; 16]);
        let mut binder = RecordingBinder::default();
        cache.commit_packed_globals(&mut binder, &globals(48));

        assert_eq!(binder.constants.len(), 1);
        let (slot, data) = &binder.constants[0];
        assert_eq!(*slot, 0);
        assert_eq!(data.len(), 48);
        assert_eq!(&data[16..32], &[7; 16]);
        assert_eq!(cache.dirty_range(PackedTypeIndex::Highp), DirtyRange::EMPTY);

        let mut idle = RecordingBinder::default();
        cache.commit_packed_globals(&mut idle, &globals(48));
        assert!(idle.constants.is_empty());
    }

    #[test]
    fn test_mark_all_dirty_forces_upload() {
        let mut cache = ShaderParameterCache::new(256);
        cache.mark_all_dirty();
        assert_eq!(cache.dirty_range(PackedTypeIndex::Uint), DirtyRange { low: 0, high: 16 });
        let mut binder = RecordingBinder::default();
        cache.commit_packed_globals(&mut binder, &globals(32));
        assert_eq!(binder.constants.len(), 1);
    }

    #[test]
    #[should_panic(expected = "runs past")]
    fn test_out_of_bounds_write_is_fatal() {
        ShaderParameterCache::new(64).set(PackedTypeIndex::Lowp, 60, &[0; 8]);
    }

    fn view_buffer(value: f32) -> Arc<UniformBuffer> {
        let layout = Arc::new(UniformBufferLayout::new("View", 32, vec![]));
        let mut contents = [0f32; 8];
        contents[4] = value;
        Arc::new(UniformBuffer::cpu_only(layout, bytemuck::cast_slice(&contents), vec![]))
    }

    fn float_at(data: &[u8], index: usize) -> f32 {
        let start = index * FLOAT_BYTES;
        f32::from_le_bytes(data[start..start + FLOAT_BYTES].try_into().unwrap())
    }

    fn copy_second_vector() -> UniformBufferCopyInfo {
        UniformBufferCopyInfo {
            source_ub_index: 0,
            source_offset_floats: 4,
            dest_type_index: PackedTypeIndex::Highp,
            dest_offset_floats: 8,
            size_floats: 4,
        }
    }

    #[test]
    fn test_flattened_buffers_are_copied_into_globals() {
        let mut cache = ShaderParameterCache::new(256);
        let bindings = ShaderBindings {
            flatten_uniform_buffers: true,
            uniform_buffer_copy_info: vec![copy_second_vector()],
            ..globals(64)
        };
        let mut uniform_buffers = StageResourceBindings::default();
        uniform_buffers.set(0, view_buffer(2.5));

        let mut binder = RecordingBinder::default();
        cache.commit_packed_uniform_buffers(&mut binder, &bindings, &uniform_buffers);
        assert!(binder.constants.is_empty());
        assert_eq!(cache.dirty_range(PackedTypeIndex::Highp), DirtyRange { low: 2, high: 3 });

        cache.commit_packed_globals(&mut binder, &bindings);
        assert_eq!(float_at(&binder.constants[0].1, 8), 2.5);

        // Same buffer again: no copy, nothing dirty.
        cache.commit_packed_uniform_buffers(&mut binder, &bindings, &uniform_buffers);
        assert!(cache.dirty_range(PackedTypeIndex::Highp).is_empty());
    }

    #[test]
    fn test_emulated_buffers_upload_on_change_only() {
        let mut cache = ShaderParameterCache::new(256);
        let bindings = ShaderBindings {
            packed_uniform_buffers: vec![vec![PackedArrayInfo {
                type_index: PackedTypeIndex::Highp,
                size_bytes: 48,
                buffer_slot: 6,
            }]],
            num_uniform_buffers: 1,
            uniform_buffer_copy_info: vec![copy_second_vector()],
            ..Default::default()
        };
        let mut uniform_buffers = StageResourceBindings::default();
        uniform_buffers.set(0, view_buffer(1.0));

        let mut binder = RecordingBinder::default();
        cache.commit_packed_uniform_buffers(&mut binder, &bindings, &uniform_buffers);
        cache.commit_packed_uniform_buffers(&mut binder, &bindings, &uniform_buffers);
        assert_eq!(binder.constants.len(), 1);
        let (slot, data) = &binder.constants[0];
        assert_eq!(*slot, 6);
        assert_eq!(data.len(), 48);
        assert_eq!(float_at(data, 8), 1.0);

        uniform_buffers.set(0, view_buffer(3.0));
        cache.commit_packed_uniform_buffers(&mut binder, &bindings, &uniform_buffers);
        assert_eq!(binder.constants.len(), 2);
    }
}
