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

//! Defines data structures related to GPU buffer resources.

use crate::renderer::api::util::IndexFormat;
use crate::strata_bitflags;
use std::borrow::Cow;

strata_bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    ///
    /// The backend uses them to pick a memory placement and to validate
    /// bindings at encode time.
    pub struct BufferUsage: u32 {
        /// The buffer can be read back on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be written from the CPU.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be bound as a vertex stream.
        const VERTEX = 1 << 2;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// The buffer can be bound as a constant/uniform buffer.
        const UNIFORM = 1 << 4;
        /// The buffer can be bound as a read/write storage buffer.
        const STORAGE = 1 << 5;
        /// The buffer can source indirect draw or dispatch arguments.
        const INDIRECT = 1 << 6;
        /// The buffer can receive visibility (occlusion) results.
        const VISIBILITY_RESULT = 1 << 7;
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
}

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`GraphicsDevice::create_buffer`] and is used to reference
/// the buffer in all subsequent operations.
///
/// [`GraphicsDevice::create_buffer`]: crate::renderer::GraphicsDevice::create_buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// An index buffer together with the width of its indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferView {
    /// The buffer holding the indices.
    pub buffer: BufferId,
    /// The type of each index.
    pub format: IndexFormat,
}
