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

//! Descriptors and types for command buffers and render passes.

use crate::renderer::api::buffer::BufferId;
use crate::renderer::api::texture::TextureId;
use crate::renderer::api::util::LinearRgba;

/// An opaque handle identifying a command buffer for its whole lifetime,
/// including after it was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandBufferId(pub u64);

/// Describes the operation to perform on an attachment at the start of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// The existing contents of the attachment will be loaded into the pass.
    Load,
    /// The attachment will be cleared to the specified value before the pass begins.
    Clear(V),
    /// The previous contents are irrelevant and may be left undefined.
    DontCare,
}

impl<V> LoadOp<V> {
    /// Returns `true` for [`LoadOp::Clear`].
    pub fn is_clear(&self) -> bool {
        matches!(self, LoadOp::Clear(_))
    }
}

/// Describes the operation to perform on an attachment at the end of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// The results of the render pass will be stored to the attachment's memory.
    Store,
    /// The results of the render pass will be discarded, leaving the attachment's memory undefined.
    Discard,
    /// The multisampled results are resolved into the resolve target.
    MultisampleResolve,
}

/// Defines the load and store operations for a single render pass attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// The operation to perform at the beginning of the pass.
    pub load: LoadOp<V>,
    /// The operation to perform at the end of the pass.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Loads the previous contents and stores the results.
    pub const fn load_store() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }

    /// Clears to `value` and stores the results.
    pub const fn clear_store(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }
}

/// A single color attachment of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The texture rendered to. For multisampled targets, the multisampled texture.
    pub texture: TextureId,
    /// The texture receiving the resolved output of a multisampled target.
    pub resolve_target: Option<TextureId>,
    /// The mip level rendered to.
    pub mip_level: u32,
    /// The array slice rendered to.
    pub array_slice: u32,
    /// The load and store operations for this color attachment.
    pub ops: Operations<LinearRgba>,
}

/// The depth/stencil attachment of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// The depth/stencil texture.
    pub texture: TextureId,
    /// The load and store operations for the depth aspect, if the format has one.
    pub depth_ops: Option<Operations<f32>>,
    /// The load and store operations for the stencil aspect, if the format has one.
    pub stencil_ops: Option<Operations<u32>>,
}

/// A descriptor for a render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDescriptor {
    /// An optional debug label for the render pass.
    pub label: Option<String>,
    /// The color attachments, in slot order.
    pub color_attachments: Vec<RenderPassColorAttachment>,
    /// An optional depth/stencil attachment for this pass.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
    /// The buffer receiving visibility (occlusion) counters written during the pass.
    pub visibility_result_buffer: Option<BufferId>,
}

/// Controls whether the samples passing the depth test are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityResultMode {
    /// No counting.
    Disabled,
    /// Passing samples are added to the 64-bit counter at this byte offset of
    /// the pass's visibility result buffer.
    Counting(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_clear_is_clear() {
        assert!(LoadOp::Clear(LinearRgba::BLACK).is_clear());
        assert!(!LoadOp::<LinearRgba>::Load.is_clear());
        assert!(!LoadOp::<f32>::DontCare.is_clear());
        assert_eq!(Operations::<f32>::load_store().store, StoreOp::Store);
    }
}
