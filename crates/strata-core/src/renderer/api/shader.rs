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

//! Shader functions and the reflection metadata shipped next to their bytecode.
//!
//! The offline shader compiler emits, for every stage, a header describing the
//! packed uniform arrays, the uniform buffers the stage reads and the resource
//! table that maps uniform-buffer-embedded resources to hardware slots. The
//! command-submission layer consumes it as-is: only layout hashes are checked.

use crate::renderer::api::util::ShaderStage;
use crate::renderer::error::ShaderError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The maximum number of uniform buffers a single stage can reference.
pub const MAX_UNIFORM_BUFFERS_PER_STAGE: usize = 32;

/// An opaque handle to a compiled shader function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderFunctionId(pub usize);

/// A descriptor used to create a [`ShaderFunctionId`].
#[derive(Debug, Clone)]
pub struct ShaderFunctionDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The stage the function runs in.
    pub stage: ShaderStage,
    /// The compiled bytecode (or source, for backends compiling at load time).
    pub bytecode: Cow<'a, [u8]>,
    /// The entry point name.
    pub entry_point: Cow<'a, str>,
}

/// The precision/type buckets packed uniforms are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackedTypeIndex {
    /// High precision floats.
    Highp,
    /// Medium precision floats.
    Mediump,
    /// Low precision floats.
    Lowp,
    /// Signed integers.
    Int,
    /// Unsigned integers.
    Uint,
}

impl PackedTypeIndex {
    /// The number of packed type buckets.
    pub const COUNT: usize = 5;

    /// Every bucket, in index order.
    pub const ALL: [PackedTypeIndex; Self::COUNT] = [
        PackedTypeIndex::Highp,
        PackedTypeIndex::Mediump,
        PackedTypeIndex::Lowp,
        PackedTypeIndex::Int,
        PackedTypeIndex::Uint,
    ];

    /// Returns the dense index of the bucket.
    pub const fn index(&self) -> usize {
        match self {
            PackedTypeIndex::Highp => 0,
            PackedTypeIndex::Mediump => 1,
            PackedTypeIndex::Lowp => 2,
            PackedTypeIndex::Int => 3,
            PackedTypeIndex::Uint => 4,
        }
    }

    /// Maps the single-character type name used by the shader compiler
    /// (`h`, `m`, `l`, `i`, `u`) to a bucket.
    pub const fn from_type_name(name: u8) -> Option<Self> {
        match name {
            b'h' => Some(PackedTypeIndex::Highp),
            b'm' => Some(PackedTypeIndex::Mediump),
            b'l' => Some(PackedTypeIndex::Lowp),
            b'i' => Some(PackedTypeIndex::Int),
            b'u' => Some(PackedTypeIndex::Uint),
            _ => None,
        }
    }
}

/// One packed uniform array declared by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackedArrayInfo {
    /// The bucket the array is filled from.
    pub type_index: PackedTypeIndex,
    /// The declared size of the array in bytes.
    pub size_bytes: u32,
    /// The stage buffer slot the array is bound to.
    pub buffer_slot: u32,
}

/// Splices a slice of a uniform buffer into a packed scratch array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniformBufferCopyInfo {
    /// The uniform buffer index the data is read from.
    pub source_ub_index: u16,
    /// Offset of the data in the uniform buffer, in floats.
    pub source_offset_floats: u16,
    /// The packed bucket the data is written to.
    pub dest_type_index: PackedTypeIndex,
    /// Offset in the packed bucket, in floats.
    pub dest_offset_floats: u16,
    /// Number of floats copied.
    pub size_floats: u16,
}

/// A single entry of a resource map: which resource of which uniform buffer
/// lands on which hardware slot.
///
/// Packed as `[ub index: 6 | resource index: 15 | bind index: 11]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceTableEntry(u32);

impl ResourceTableEntry {
    const UB_INDEX_SHIFT: u32 = 26;
    const UB_INDEX_MASK: u32 = 0x3f;
    const RESOURCE_INDEX_SHIFT: u32 = 11;
    const RESOURCE_INDEX_MASK: u32 = 0x7fff;
    const BIND_INDEX_MASK: u32 = 0x7ff;

    /// Terminates a run of entries in a [`ResourceMap`].
    pub const END_OF_STREAM: Self = Self(u32::MAX);

    /// Packs an entry.
    ///
    /// # Panics
    ///
    /// Panics if any field exceeds its bit budget.
    pub fn new(uniform_buffer_index: u32, resource_index: u32, bind_index: u32) -> Self {
        assert!(
            (uniform_buffer_index as usize) < MAX_UNIFORM_BUFFERS_PER_STAGE,
            "uniform buffer index {uniform_buffer_index} out of range"
        );
        assert!(resource_index <= Self::RESOURCE_INDEX_MASK);
        assert!(bind_index <= Self::BIND_INDEX_MASK);
        Self(
            (uniform_buffer_index << Self::UB_INDEX_SHIFT)
                | (resource_index << Self::RESOURCE_INDEX_SHIFT)
                | bind_index,
        )
    }

    /// Reinterprets a raw packed value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw packed value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// The uniform buffer the resource is declared in.
    pub const fn uniform_buffer_index(&self) -> u32 {
        (self.0 >> Self::UB_INDEX_SHIFT) & Self::UB_INDEX_MASK
    }

    /// The index of the resource inside the uniform buffer's resource list.
    pub const fn resource_index(&self) -> u32 {
        (self.0 >> Self::RESOURCE_INDEX_SHIFT) & Self::RESOURCE_INDEX_MASK
    }

    /// The hardware slot the resource is bound to.
    pub const fn bind_index(&self) -> u32 {
        self.0 & Self::BIND_INDEX_MASK
    }
}

/// A resource-table layout blob for one resource kind (textures or samplers).
///
/// The blob starts with one header word per uniform buffer giving the offset of
/// that buffer's run of entries (0 when the buffer has none). Each run is
/// terminated by the first entry belonging to another buffer, or by
/// [`ResourceTableEntry::END_OF_STREAM`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceMap {
    words: Vec<u32>,
}

impl ResourceMap {
    /// Wraps an existing blob.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Builds a blob for `num_buffers` uniform buffers from a list of entries.
    pub fn build(num_buffers: usize, entries: &[ResourceTableEntry]) -> Self {
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|entry| (entry.uniform_buffer_index(), entry.bind_index()));

        let mut words = vec![0u32; num_buffers];
        for buffer_index in 0..num_buffers {
            let mut run = sorted
                .iter()
                .filter(|entry| entry.uniform_buffer_index() as usize == buffer_index)
                .peekable();
            if run.peek().is_some() {
                words[buffer_index] = words.len() as u32;
                words.extend(run.map(ResourceTableEntry::raw));
            }
        }
        words.push(ResourceTableEntry::END_OF_STREAM.raw());
        Self { words }
    }

    /// Returns the raw blob.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Iterates over the entries of one uniform buffer.
    pub fn entries_for(&self, buffer_index: usize) -> ResourceMapEntries<'_> {
        let start = self.words.get(buffer_index).copied().unwrap_or(0) as usize;
        ResourceMapEntries {
            words: &self.words,
            cursor: if start == 0 { self.words.len() } else { start },
            buffer_index: buffer_index as u32,
        }
    }
}

/// Iterator over one uniform buffer's run in a [`ResourceMap`].
#[derive(Debug)]
pub struct ResourceMapEntries<'a> {
    words: &'a [u32],
    cursor: usize,
    buffer_index: u32,
}

impl Iterator for ResourceMapEntries<'_> {
    type Item = ResourceTableEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = ResourceTableEntry::from_raw(*self.words.get(self.cursor)?);
        if entry == ResourceTableEntry::END_OF_STREAM
            || entry.uniform_buffer_index() != self.buffer_index
        {
            self.cursor = self.words.len();
            return None;
        }
        self.cursor += 1;
        Some(entry)
    }
}

/// The per-stage resource table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderResourceTable {
    /// Bit `n` is set when the stage reads resources from uniform buffer `n`.
    pub resource_table_bits: u32,
    /// The expected layout hash of every uniform buffer slot.
    pub layout_hashes: Vec<u32>,
    /// Texture bindings.
    pub texture_map: ResourceMap,
    /// Sampler bindings.
    pub sampler_map: ResourceMap,
    /// Buffer bindings.
    #[serde(default)]
    pub buffer_map: ResourceMap,
}

/// Threads per thread group of a compute kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadGroupSize {
    /// Threads along X.
    pub x: u32,
    /// Threads along Y.
    pub y: u32,
    /// Threads along Z.
    pub z: u32,
}

impl Default for ThreadGroupSize {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

/// The current version of the reflection header layout.
pub const SHADER_BINDINGS_VERSION: u32 = 1;

/// The reflection header of one shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderBindings {
    /// Header layout version, see [`SHADER_BINDINGS_VERSION`].
    pub version: u32,
    /// Packed global arrays, one per bucket the stage uses.
    #[serde(default)]
    pub packed_global_arrays: Vec<PackedArrayInfo>,
    /// Packed arrays of each emulated uniform buffer, indexed by buffer.
    #[serde(default)]
    pub packed_uniform_buffers: Vec<Vec<PackedArrayInfo>>,
    /// Number of uniform buffers the stage reads.
    #[serde(default)]
    pub num_uniform_buffers: u32,
    /// Uniform buffers are flattened into the packed globals.
    #[serde(default)]
    pub flatten_uniform_buffers: bool,
    /// Uniform buffers are bound directly at their index.
    #[serde(default)]
    pub has_regular_uniform_buffers: bool,
    /// Copy descriptors for the emulated uniform buffer path, sorted by source buffer.
    #[serde(default)]
    pub uniform_buffer_copy_info: Vec<UniformBufferCopyInfo>,
    /// The resource table.
    #[serde(default)]
    pub resource_table: ShaderResourceTable,
    /// Threads per group, compute only.
    #[serde(default)]
    pub thread_group_size: ThreadGroupSize,
}

impl Default for ShaderBindings {
    fn default() -> Self {
        Self {
            version: SHADER_BINDINGS_VERSION,
            packed_global_arrays: Vec::new(),
            packed_uniform_buffers: Vec::new(),
            num_uniform_buffers: 0,
            flatten_uniform_buffers: false,
            has_regular_uniform_buffers: false,
            uniform_buffer_copy_info: Vec::new(),
            resource_table: ShaderResourceTable::default(),
            thread_group_size: ThreadGroupSize::default(),
        }
    }
}

impl ShaderBindings {
    /// Parses a reflection header emitted by the shader compiler in RON form.
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self, ShaderError> {
        let bindings: Self = ron::from_str(text).map_err(|e| ShaderError::ReflectionError {
            label: label.to_string(),
            details: e.to_string(),
        })?;
        if bindings.version != SHADER_BINDINGS_VERSION {
            return Err(ShaderError::ReflectionError {
                label: label.to_string(),
                details: format!(
                    "unsupported reflection version {} (expected {})",
                    bindings.version, SHADER_BINDINGS_VERSION
                ),
            });
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_table_entry_packing() {
        let entry = ResourceTableEntry::new(5, 1234, 17);
        assert_eq!(entry.uniform_buffer_index(), 5);
        assert_eq!(entry.resource_index(), 1234);
        assert_eq!(entry.bind_index(), 17);
        assert_ne!(entry, ResourceTableEntry::END_OF_STREAM);
    }

    #[test]
    fn test_resource_map_runs_per_buffer() {
        let map = ResourceMap::build(
            3,
            &[
                ResourceTableEntry::new(2, 0, 4),
                ResourceTableEntry::new(0, 1, 1),
                ResourceTableEntry::new(0, 0, 0),
            ],
        );
        let buffer0: Vec<_> = map.entries_for(0).map(|e| e.bind_index()).collect();
        assert_eq!(buffer0, vec![0, 1]);
        assert_eq!(map.entries_for(1).count(), 0);
        let buffer2: Vec<_> = map.entries_for(2).map(|e| e.resource_index()).collect();
        assert_eq!(buffer2, vec![0]);
        assert_eq!(map.entries_for(7).count(), 0);
    }

    #[test]
    fn test_bindings_from_ron() {
        let text = r#"(
            version: 1,
            packed_global_arrays: [(type_index: Highp, size_bytes: 64, buffer_slot: 30)],
            num_uniform_buffers: 1,
            resource_table: (
                resource_table_bits: 1,
                layout_hashes: [0xdead],
                texture_map: [],
                sampler_map: [],
            ),
        )"#;
        let bindings = ShaderBindings::from_ron_str("test", text).unwrap();
        assert_eq!(bindings.packed_global_arrays[0].size_bytes, 64);
        assert_eq!(bindings.resource_table.layout_hashes, vec![0xdead]);
        assert_eq!(bindings.thread_group_size, ThreadGroupSize::default());
    }

    #[test]
    fn test_bindings_rejects_unknown_version() {
        let err = ShaderBindings::from_ron_str("old", "(version: 0)").unwrap_err();
        assert!(format!("{err}").contains("unsupported reflection version"));
    }
}
