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

//! Stage-agnostic binding of shader resources.
//!
//! Resource tables and packed constants are resolved the same way for every
//! stage; only the final encoder call differs. [`ShaderStageBinder`] is that
//! seam. [`StageBinder`] implements it on top of a live encoder and uploads
//! constant data through the transient ring buffer.

use crate::ring_buffer::RingBuffer;
use crate::surface::Surface;
use ahash::AHashMap;
use std::sync::Arc;
use strata_core::renderer::{
    BufferId, ComputeEncoder, GraphicsDevice, RenderEncoder, SamplerId, ShaderStage, TextureId,
};

/// Buffer slots available per stage. Vertex streams are bound from the top.
pub const MAX_BUFFER_SLOTS: u32 = 31;

/// The vertex stage buffer slot vertex stream `stream_index` is bound to.
pub const fn vertex_stream_slot(stream_index: u32) -> u32 {
    MAX_BUFFER_SLOTS - 1 - stream_index
}

/// Binds resources to one shader stage of the active encoder.
pub trait ShaderStageBinder {
    /// The stage being bound.
    fn stage(&self) -> ShaderStage;
    /// Binds a texture (or nothing) at `slot`.
    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>);
    /// Binds a sampler (or nothing) at `slot`.
    fn bind_sampler(&mut self, slot: u32, sampler: Option<SamplerId>);
    /// Binds a buffer range at `slot`.
    fn bind_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);
    /// Uploads `data` as the constant array read at `slot`.
    fn set_constants(&mut self, slot: u32, data: &[u8]);
}

/// The encoder a [`StageBinder`] forwards to.
pub enum StageTarget<'a> {
    /// The vertex stage of a render encoder.
    Vertex(&'a mut dyn RenderEncoder),
    /// The pixel stage of a render encoder.
    Pixel(&'a mut dyn RenderEncoder),
    /// A compute encoder.
    Compute(&'a mut dyn ComputeEncoder),
}

/// A [`ShaderStageBinder`] writing to a live encoder.
pub struct StageBinder<'a> {
    target: StageTarget<'a>,
    ring: &'a mut RingBuffer,
    device: &'a dyn GraphicsDevice,
}

impl<'a> StageBinder<'a> {
    /// Creates a binder for `target` uploading constants through `ring`.
    pub fn new(target: StageTarget<'a>, ring: &'a mut RingBuffer, device: &'a dyn GraphicsDevice) -> Self {
        Self {
            target,
            ring,
            device,
        }
    }
}

impl ShaderStageBinder for StageBinder<'_> {
    fn stage(&self) -> ShaderStage {
        match self.target {
            StageTarget::Vertex(_) => ShaderStage::Vertex,
            StageTarget::Pixel(_) => ShaderStage::Pixel,
            StageTarget::Compute(_) => ShaderStage::Compute,
        }
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        match &mut self.target {
            StageTarget::Vertex(encoder) => encoder.set_vertex_texture(slot, texture),
            StageTarget::Pixel(encoder) => encoder.set_fragment_texture(slot, texture),
            StageTarget::Compute(encoder) => encoder.set_texture(slot, texture),
        }
    }

    fn bind_sampler(&mut self, slot: u32, sampler: Option<SamplerId>) {
        match &mut self.target {
            StageTarget::Vertex(encoder) => encoder.set_vertex_sampler(slot, sampler),
            StageTarget::Pixel(encoder) => encoder.set_fragment_sampler(slot, sampler),
            StageTarget::Compute(encoder) => encoder.set_sampler(slot, sampler),
        }
    }

    fn bind_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        match &mut self.target {
            StageTarget::Vertex(encoder) => encoder.set_vertex_buffer(slot, buffer, offset),
            StageTarget::Pixel(encoder) => encoder.set_fragment_buffer(slot, buffer, offset),
            StageTarget::Compute(encoder) => encoder.set_buffer(slot, buffer, offset),
        }
    }

    fn set_constants(&mut self, slot: u32, data: &[u8]) {
        match self.ring.upload(self.device, data, 0) {
            Ok(offset) => {
                let buffer = self.ring.buffer();
                self.bind_buffer(slot, buffer, offset);
            }
            Err(e) => log::error!(
                "Failed to upload {} bytes of {:?} constants for slot {slot}: {e}",
                data.len(),
                self.stage()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKind {
    Texture,
    Sampler,
    Buffer,
}

/// A resource bound straight to a stage slot, outside of any uniform buffer.
#[derive(Debug, Clone)]
pub enum DirectBinding {
    /// A texture, resolved when applied so back-buffer swaps are picked up.
    Texture(Option<Arc<Surface>>),
    /// A sampler.
    Sampler(Option<SamplerId>),
    /// A buffer range.
    Buffer(BufferId, u64),
}

impl DirectBinding {
    fn kind(&self) -> SlotKind {
        match self {
            DirectBinding::Texture(_) => SlotKind::Texture,
            DirectBinding::Sampler(_) => SlotKind::Sampler,
            DirectBinding::Buffer(..) => SlotKind::Buffer,
        }
    }

    fn apply(&self, slot: u32, binder: &mut dyn ShaderStageBinder) {
        match self {
            DirectBinding::Texture(surface) => {
                binder.bind_texture(slot, surface.as_ref().and_then(|s| s.texture()))
            }
            DirectBinding::Sampler(sampler) => binder.bind_sampler(slot, *sampler),
            DirectBinding::Buffer(buffer, offset) => binder.bind_buffer(slot, *buffer, *offset),
        }
    }
}

/// Shadow of the direct bindings of one stage.
///
/// Encoders forget their bindings when they end, so everything set here is
/// replayed onto each new encoder.
#[derive(Debug, Default)]
pub struct DirectBindings {
    bound: AHashMap<(SlotKind, u32), DirectBinding>,
    pending: Vec<(SlotKind, u32)>,
}

impl DirectBindings {
    /// Records `binding` at `slot`; it is applied by the next [`Self::flush`].
    pub fn set(&mut self, slot: u32, binding: DirectBinding) {
        let key = (binding.kind(), slot);
        self.bound.insert(key, binding);
        if !self.pending.contains(&key) {
            self.pending.push(key);
        }
    }

    /// Schedules every recorded binding for replay.
    pub fn mark_all_dirty(&mut self) {
        self.pending.clear();
        self.pending.extend(self.bound.keys().copied());
    }

    /// Applies pending bindings.
    pub fn flush(&mut self, binder: &mut dyn ShaderStageBinder) {
        for key in self.pending.drain(..) {
            if let Some(binding) = self.bound.get(&key) {
                binding.apply(key.1, binder);
            }
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.bound.clear();
        self.pending.clear();
    }

    /// `true` if some bindings were not applied yet.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
