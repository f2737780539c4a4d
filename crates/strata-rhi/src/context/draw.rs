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

//! Draws and dispatches, and the state flush that precedes them.

use super::{not_supported, RhiContext};
use crate::resource_table::{bind_uniform_buffers, set_resources_from_tables, StageResourceBindings};
use crate::shader::Shader;
use crate::shader_params::ShaderParameterCache;
use crate::stage::{vertex_stream_slot, DirectBindings, ShaderStageBinder, StageBinder, StageTarget};
use std::sync::Arc;
use strata_core::renderer::{
    BufferId, DeviceFeature, IndexBufferView, IndexFormat, PrimitiveType, ShaderBindings,
    ShaderStage,
};

/// Flushes the bindings of one stage in the order the shader expects them.
fn commit_stage(
    binder: &mut dyn ShaderStageBinder,
    bindings: &ShaderBindings,
    direct: &mut DirectBindings,
    uniform_buffers: &mut StageResourceBindings,
    params: &mut ShaderParameterCache,
    epoch: Option<u32>,
) {
    direct.flush(binder);
    if bindings.has_regular_uniform_buffers {
        bind_uniform_buffers(binder, uniform_buffers, bindings.num_uniform_buffers);
    }
    set_resources_from_tables(binder, uniform_buffers, &bindings.resource_table, epoch);
    params.commit_packed_uniform_buffers(binder, bindings, uniform_buffers);
    params.commit_packed_globals(binder, bindings);
}

fn check_primitive_type(primitive: PrimitiveType) {
    if primitive == PrimitiveType::QuadList {
        not_supported("QuadList primitives");
    }
}

impl RhiContext {
    /// Draws `num_primitives` primitives from the bound vertex streams.
    pub fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        check_primitive_type(primitive);
        let instances = num_instances.max(1);
        if !self.prepare_graphics_draw() {
            return;
        }
        if let Some(encoder) = self.encoder.graphics() {
            encoder.draw_primitives(
                primitive,
                base_vertex,
                primitive.vertex_count(num_primitives),
                instances,
            );
        }
        self.count_draw(num_primitives, instances);
    }

    /// Draws indexed primitives. `start_index` is in indices, not bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitive(
        &mut self,
        index_buffer: &IndexBufferView,
        primitive: PrimitiveType,
        base_vertex_index: i32,
        first_instance: u32,
        start_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        check_primitive_type(primitive);
        let instances = num_instances.max(1);
        if !self.prepare_graphics_draw() {
            return;
        }
        let offset = u64::from(start_index) * u64::from(index_buffer.format.stride());
        if let Some(encoder) = self.encoder.graphics() {
            encoder.draw_indexed_primitives(
                primitive,
                primitive.vertex_count(num_primitives),
                index_buffer.format,
                index_buffer.buffer,
                offset,
                instances,
                base_vertex_index,
                first_instance,
            );
        }
        self.count_draw(num_primitives, instances);
    }

    /// Draws with arguments read from `argument_buffer`.
    pub fn draw_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        argument_buffer: BufferId,
        argument_offset: u64,
    ) {
        check_primitive_type(primitive);
        self.require_indirect_buffers();
        if !self.prepare_graphics_draw() {
            return;
        }
        if let Some(encoder) = self.encoder.graphics() {
            encoder.draw_primitives_indirect(primitive, argument_buffer, argument_offset);
        }
        self.frame_stats.draw_calls += 1;
    }

    /// Draws indexed primitives with arguments read from `argument_buffer`.
    pub fn draw_indexed_indirect(
        &mut self,
        index_buffer: &IndexBufferView,
        primitive: PrimitiveType,
        argument_buffer: BufferId,
        argument_offset: u64,
    ) {
        check_primitive_type(primitive);
        self.require_indirect_buffers();
        if !self.prepare_graphics_draw() {
            return;
        }
        if let Some(encoder) = self.encoder.graphics() {
            encoder.draw_indexed_primitives_indirect(
                primitive,
                index_buffer.format,
                index_buffer.buffer,
                0,
                argument_buffer,
                argument_offset,
            );
        }
        self.frame_stats.draw_calls += 1;
    }

    /// Draws vertices written by `fill_vertices` into transient memory. The
    /// data is bound as vertex stream 0, which must be bound again before the
    /// next regular draw.
    pub fn draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_stride: u32,
        fill_vertices: impl FnOnce(&mut [u8]),
    ) {
        check_primitive_type(primitive);
        let vertex_count = primitive.vertex_count(num_primitives);
        let size = vertex_count as usize * vertex_stride as usize;
        let Some(vertex_offset) = self.upload_transient(size, fill_vertices) else {
            return;
        };
        if !self.prepare_graphics_draw() {
            return;
        }
        let ring = self.ring.buffer();
        if let Some(encoder) = self.encoder.graphics() {
            encoder.set_vertex_buffer(vertex_stream_slot(0), ring, vertex_offset);
            encoder.draw_primitives(primitive, 0, vertex_count, 1);
        }
        self.streams_dirty |= 1;
        self.count_draw(num_primitives, 1);
    }

    /// Draws indexed vertices, both written into transient memory.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_vertices: u32,
        vertex_stride: u32,
        fill_vertices: impl FnOnce(&mut [u8]),
        num_primitives: u32,
        index_format: IndexFormat,
        fill_indices: impl FnOnce(&mut [u8]),
    ) {
        check_primitive_type(primitive);
        let index_count = primitive.vertex_count(num_primitives);
        let vertex_size = num_vertices as usize * vertex_stride as usize;
        let index_size = index_count as usize * index_format.stride() as usize;
        let Some(vertex_offset) = self.upload_transient(vertex_size, fill_vertices) else {
            return;
        };
        let Some(index_offset) = self.upload_transient(index_size, fill_indices) else {
            return;
        };
        if !self.prepare_graphics_draw() {
            return;
        }
        let ring = self.ring.buffer();
        if let Some(encoder) = self.encoder.graphics() {
            encoder.set_vertex_buffer(vertex_stream_slot(0), ring, vertex_offset);
            encoder.draw_indexed_primitives(
                primitive,
                index_count,
                index_format,
                ring,
                index_offset,
                1,
                0,
                0,
            );
        }
        self.streams_dirty |= 1;
        self.count_draw(num_primitives, 1);
    }

    /// Binds a compute shader for the following dispatches.
    ///
    /// # Panics
    ///
    /// Panics if `shader` is not a compute shader.
    pub fn set_compute_shader(&mut self, shader: &Arc<Shader>) {
        assert_eq!(
            shader.stage(),
            ShaderStage::Compute,
            "'{}' is not a compute shader",
            shader.label()
        );
        self.conditional_switch_to_compute();
        if self
            .compute_shader
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, shader))
        {
            return;
        }
        let compute = ShaderStage::Compute.index();
        self.uniform_buffers[compute].mark_all_dirty();
        self.params[compute].mark_all_dirty();
        self.compute_shader = Some(shader.clone());
        self.bind_compute_pipeline();
    }

    /// Dispatches the bound compute shader. Group counts of 0 are raised to 1.
    pub fn dispatch_compute_shader(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        let Some(shader) = self.prepare_dispatch() else {
            return;
        };
        let size = shader.bindings().thread_group_size;
        if let Some(encoder) = self.encoder.compute() {
            encoder.dispatch_threadgroups(
                [groups_x.max(1), groups_y.max(1), groups_z.max(1)],
                [size.x, size.y, size.z],
            );
        }
        self.frame_stats.dispatches += 1;
    }

    /// Dispatches the bound compute shader with group counts read from a buffer.
    pub fn dispatch_indirect_compute_shader(&mut self, argument_buffer: BufferId, argument_offset: u64) {
        self.require_indirect_buffers();
        let Some(shader) = self.prepare_dispatch() else {
            return;
        };
        let size = shader.bindings().thread_group_size;
        if let Some(encoder) = self.encoder.compute() {
            encoder.dispatch_threadgroups_indirect(
                argument_buffer,
                argument_offset,
                [size.x, size.y, size.z],
            );
        }
        self.frame_stats.dispatches += 1;
    }

    fn require_indirect_buffers(&self) {
        if !self.device.supports_feature(DeviceFeature::IndirectBuffers) {
            not_supported("indirect arguments");
        }
    }

    fn count_draw(&mut self, num_primitives: u32, instances: u32) {
        self.frame_stats.draw_calls += 1;
        self.frame_stats.primitives += u64::from(num_primitives) * u64::from(instances);
    }

    fn upload_transient(&mut self, size: usize, fill: impl FnOnce(&mut [u8])) -> Option<u64> {
        let data = self.scratch.stage(size, fill);
        match self.ring.upload(self.device.as_ref(), data, 0) {
            Ok(offset) => Some(offset),
            Err(e) => {
                log::error!("RhiContext: Failed to upload {size} bytes of draw data: {e}");
                self.frame_stats.dropped_draws += 1;
                None
            }
        }
    }

    fn bind_compute_pipeline(&mut self) {
        let pipeline = self
            .compute_shader
            .as_ref()
            .and_then(|shader| shader.compute_pipeline());
        if let (Some(pipeline), Some(encoder)) = (pipeline, self.encoder.compute()) {
            if self.current_compute_pipeline != Some(pipeline) {
                encoder.set_pipeline(pipeline);
                self.current_compute_pipeline = Some(pipeline);
            }
        }
    }

    /// Opens compute encoding if needed and flushes the compute bindings.
    fn prepare_dispatch(&mut self) -> Option<Arc<Shader>> {
        let Some(shader) = self.compute_shader.clone() else {
            log::error!("RhiContext: Dispatch issued without a compute shader");
            return None;
        };
        self.conditional_switch_to_compute();
        self.bind_compute_pipeline();

        let compute = ShaderStage::Compute.index();
        let encoder = self.encoder.compute()?;
        let mut binder = StageBinder::new(
            StageTarget::Compute(encoder),
            &mut self.ring,
            self.device.as_ref(),
        );
        commit_stage(
            &mut binder,
            shader.bindings(),
            &mut self.direct[compute],
            &mut self.uniform_buffers[compute],
            &mut self.params[compute],
            self.resource_table_epoch,
        );
        Some(shader)
    }

    /// Applies all pending encoder state and resolves the pipeline. Returns
    /// `false` if the draw must be skipped.
    fn prepare_graphics_draw(&mut self) -> bool {
        self.conditional_switch_to_graphics();
        let Some(bss) = self.bound_shader_state.clone() else {
            log::error!("RhiContext: Draw issued without a bound shader state");
            self.frame_stats.dropped_draws += 1;
            return false;
        };
        let scissor = self.effective_scissor();
        let Some(encoder) = self.encoder.graphics() else {
            log::warn!("RhiContext: Draw issued without render targets, skipping");
            self.frame_stats.dropped_draws += 1;
            return false;
        };

        self.rasterizer.apply(encoder);
        if self.depth_stencil_dirty {
            encoder.set_depth_stencil_state(&self.depth_stencil);
            encoder.set_stencil_reference(self.stencil_reference);
            self.depth_stencil_dirty = false;
        }
        if self.viewport_dirty {
            encoder.set_viewport(self.viewport);
            self.viewport_dirty = false;
        }
        if self.scissor_dirty {
            encoder.set_scissor_rect(scissor);
            self.scissor_dirty = false;
        }
        let mut streams = self.streams_dirty;
        while streams != 0 {
            let stream = streams.trailing_zeros();
            streams &= streams - 1;
            if let Some((buffer, offset)) = self.streams[stream as usize] {
                encoder.set_vertex_buffer(vertex_stream_slot(stream), buffer, offset);
            }
        }
        self.streams_dirty = 0;

        if !self.pipeline_cache.prepare_for_draw(
            self.device.as_ref(),
            &self.shadow,
            &bss,
            self.frame_number,
            encoder,
            &mut self.current_pipeline,
            &mut self.frame_stats,
        ) {
            self.frame_stats.dropped_draws += 1;
            return false;
        }

        let stages = [
            (ShaderStage::Vertex, Some(bss.vertex_shader())),
            (ShaderStage::Pixel, bss.pixel_shader()),
        ];
        for (stage, shader) in stages {
            let Some(shader) = shader else {
                continue;
            };
            let target = match stage {
                ShaderStage::Vertex => StageTarget::Vertex(&mut *encoder),
                _ => StageTarget::Pixel(&mut *encoder),
            };
            let mut binder = StageBinder::new(target, &mut self.ring, self.device.as_ref());
            commit_stage(
                &mut binder,
                shader.bindings(),
                &mut self.direct[stage.index()],
                &mut self.uniform_buffers[stage.index()],
                &mut self.params[stage.index()],
                self.resource_table_epoch,
            );
        }
        true
    }
}
