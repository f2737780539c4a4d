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

//! Deferred destruction of GPU objects.
//!
//! A GPU object can still be referenced by command buffers in flight when its
//! last CPU owner lets go. Owners send it to the [`DeferredReleaseQueue`]
//! instead of destroying it; the queue tags everything released during a frame
//! with that frame's generation and destroys a generation only once the GPU has
//! completed it.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use strata_core::renderer::{
    BufferId, ComputePipelineId, GraphicsDevice, RenderPipelineId, ResourceError, SamplerId,
    ShaderFunctionId, TextureId,
};

/// A device object awaiting destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// A buffer.
    Buffer(BufferId),
    /// A texture.
    Texture(TextureId),
    /// A sampler.
    Sampler(SamplerId),
    /// A shader function.
    ShaderFunction(ShaderFunctionId),
    /// A render pipeline.
    RenderPipeline(RenderPipelineId),
    /// A compute pipeline.
    ComputePipeline(ComputePipelineId),
}

impl GpuObject {
    /// Destroys the object on `device`.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        match self {
            GpuObject::Buffer(id) => device.destroy_buffer(id),
            GpuObject::Texture(id) => device.destroy_texture(id),
            GpuObject::Sampler(id) => device.destroy_sampler(id),
            GpuObject::ShaderFunction(id) => device.destroy_shader_function(id),
            GpuObject::RenderPipeline(id) => device.destroy_render_pipeline(id),
            GpuObject::ComputePipeline(id) => device.destroy_compute_pipeline(id),
        }
    }
}

/// The sending half of a [`DeferredReleaseQueue`], held by resource wrappers.
#[derive(Debug, Clone)]
pub struct ReleaseSender(Sender<GpuObject>);

impl ReleaseSender {
    /// Hands `object` over for deferred destruction.
    pub fn release(&self, object: GpuObject) {
        if self.0.send(object).is_err() {
            log::trace!("ReleaseSender: queue already shut down, leaking {object:?}");
        }
    }
}

/// Holds released objects until the GPU frames that may use them retire.
#[derive(Debug)]
pub struct DeferredReleaseQueue {
    sender: Sender<GpuObject>,
    receiver: Receiver<GpuObject>,
    generations: VecDeque<(u64, Vec<GpuObject>)>,
}

impl Default for DeferredReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredReleaseQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            generations: VecDeque::new(),
        }
    }

    /// A sender resource wrappers can keep.
    pub fn sender(&self) -> ReleaseSender {
        ReleaseSender(self.sender.clone())
    }

    /// Tags every object released since the previous call with `generation`.
    pub fn seal_generation(&mut self, generation: u64) {
        let objects: Vec<GpuObject> = self.receiver.try_iter().collect();
        if objects.is_empty() {
            return;
        }
        log::trace!(
            "DeferredReleaseQueue: {} objects waiting on generation {generation}",
            objects.len()
        );
        match self.generations.back_mut() {
            Some((last, pending)) if *last == generation => pending.extend(objects),
            _ => self.generations.push_back((generation, objects)),
        }
    }

    /// Destroys every generation up to and including `completed_generation`.
    /// Returns the number of objects destroyed.
    pub fn reclaim(&mut self, device: &dyn GraphicsDevice, completed_generation: u64) -> usize {
        let mut reclaimed = 0;
        while self
            .generations
            .front()
            .is_some_and(|(generation, _)| *generation <= completed_generation)
        {
            if let Some((_, objects)) = self.generations.pop_front() {
                reclaimed += destroy_all(device, objects);
            }
        }
        reclaimed
    }

    /// Destroys everything, sealed or not. Only valid once the GPU is idle.
    pub fn flush(&mut self, device: &dyn GraphicsDevice) -> usize {
        self.seal_generation(u64::MAX);
        self.reclaim(device, u64::MAX)
    }

    /// Objects sealed but not destroyed yet.
    pub fn pending_objects(&self) -> usize {
        self.generations.iter().map(|(_, objects)| objects.len()).sum()
    }
}

fn destroy_all(device: &dyn GraphicsDevice, objects: Vec<GpuObject>) -> usize {
    let count = objects.len();
    for object in objects {
        if let Err(e) = object.destroy(device) {
            log::warn!("DeferredReleaseQueue: Failed to destroy {object:?}: {e}");
        }
    }
    count
}
