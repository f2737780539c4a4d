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

use crate::renderer::api::*;

/// A callback invoked once the GPU has finished executing a command buffer.
pub type CompletionHandler = Box<dyn FnOnce(CommandBufferId) + Send + 'static>;

/// A unit of GPU work.
///
/// A command buffer has at most one encoder open at a time: the previous
/// encoder must be ended before another one begins.
pub trait CommandBuffer: Send {
    /// The identifier of the command buffer.
    fn id(&self) -> CommandBufferId;

    /// Opens a graphics encoder rendering into the attachments of `descriptor`.
    fn begin_render_encoding(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Box<dyn RenderEncoder>;

    /// Opens a compute encoder.
    fn begin_compute_encoding(&mut self) -> Box<dyn ComputeEncoder>;

    /// Registers a callback run after the GPU completed this buffer.
    ///
    /// Handlers of one buffer run in registration order. Handlers of different
    /// buffers run in commit order.
    fn add_completed_handler(&mut self, handler: CompletionHandler);

    /// Schedules `drawable` for presentation once the buffer completes.
    fn present_drawable(&mut self, drawable: Drawable);

    /// Submits the buffer to the GPU queue. No command can be added afterwards.
    fn commit(self: Box<Self>);
}

/// A recording context for draw calls.
pub trait RenderEncoder: Send {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);

    /// Binds a buffer to a vertex stage slot.
    fn set_vertex_buffer(&mut self, index: u32, buffer: BufferId, offset: u64);
    /// Binds a buffer to a pixel stage slot.
    fn set_fragment_buffer(&mut self, index: u32, buffer: BufferId, offset: u64);
    /// Binds (or unbinds) a texture at a vertex stage slot.
    fn set_vertex_texture(&mut self, index: u32, texture: Option<TextureId>);
    /// Binds (or unbinds) a texture at a pixel stage slot.
    fn set_fragment_texture(&mut self, index: u32, texture: Option<TextureId>);
    /// Binds (or unbinds) a sampler at a vertex stage slot.
    fn set_vertex_sampler(&mut self, index: u32, sampler: Option<SamplerId>);
    /// Binds (or unbinds) a sampler at a pixel stage slot.
    fn set_fragment_sampler(&mut self, index: u32, sampler: Option<SamplerId>);

    /// Sets the faces discarded by the rasterizer.
    fn set_cull_mode(&mut self, mode: CullMode);
    /// Sets the winding of front faces.
    fn set_front_facing_winding(&mut self, winding: Winding);
    /// Sets the depth bias.
    fn set_depth_bias(&mut self, depth_bias: f32, slope_scale: f32, clamp: f32);
    /// Sets the triangle fill mode.
    fn set_triangle_fill_mode(&mut self, mode: FillMode);
    /// Sets the depth/stencil test state.
    fn set_depth_stencil_state(&mut self, state: &DepthStencilState);
    /// Sets the stencil reference value.
    fn set_stencil_reference(&mut self, reference: u32);
    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);
    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: ScissorRect);
    /// Enables or disables occlusion counting.
    fn set_visibility_result_mode(&mut self, mode: VisibilityResultMode);

    /// Records a non-indexed draw call.
    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    );

    /// Records an indexed draw call.
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitives(
        &mut self,
        primitive: PrimitiveType,
        index_count: u32,
        index_format: IndexFormat,
        index_buffer: BufferId,
        index_buffer_offset: u64,
        instance_count: u32,
        base_vertex: i32,
        base_instance: u32,
    );

    /// Records a draw call whose arguments are read from a GPU buffer.
    fn draw_primitives_indirect(
        &mut self,
        primitive: PrimitiveType,
        indirect_buffer: BufferId,
        indirect_offset: u64,
    );

    /// Records an indexed draw call whose arguments are read from a GPU buffer.
    fn draw_indexed_primitives_indirect(
        &mut self,
        primitive: PrimitiveType,
        index_format: IndexFormat,
        index_buffer: BufferId,
        index_buffer_offset: u64,
        indirect_buffer: BufferId,
        indirect_offset: u64,
    );

    /// Opens a named debug group.
    fn push_debug_group(&mut self, label: &str);
    /// Closes the innermost debug group.
    fn pop_debug_group(&mut self);

    /// Finishes recording. The command buffer can open another encoder afterwards.
    fn end_encoding(self: Box<Self>);
}

/// A recording context for compute dispatches.
pub trait ComputeEncoder: Send {
    /// Sets the active compute pipeline.
    fn set_pipeline(&mut self, pipeline: ComputePipelineId);
    /// Binds a buffer at a kernel slot.
    fn set_buffer(&mut self, index: u32, buffer: BufferId, offset: u64);
    /// Binds (or unbinds) a texture at a kernel slot.
    fn set_texture(&mut self, index: u32, texture: Option<TextureId>);
    /// Binds (or unbinds) a sampler at a kernel slot.
    fn set_sampler(&mut self, index: u32, sampler: Option<SamplerId>);

    /// Dispatches `groups` thread groups of `threads_per_group` threads each.
    fn dispatch_threadgroups(&mut self, groups: [u32; 3], threads_per_group: [u32; 3]);

    /// Dispatches thread groups whose counts are read from a GPU buffer.
    fn dispatch_threadgroups_indirect(
        &mut self,
        indirect_buffer: BufferId,
        indirect_offset: u64,
        threads_per_group: [u32; 3],
    );

    /// Opens a named debug group.
    fn push_debug_group(&mut self, label: &str);
    /// Closes the innermost debug group.
    fn pop_debug_group(&mut self);

    /// Finishes recording.
    fn end_encoding(self: Box<Self>);
}
