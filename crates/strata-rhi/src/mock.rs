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

//! Test doubles shared by the unit tests of this crate.

use crate::stage::ShaderStageBinder;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strata_core::renderer::*;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

/// A device that hands out fresh ids and records what it is asked to do.
/// Command buffers complete synchronously on commit.
#[derive(Debug, Default)]
pub(crate) struct MockGraphicsDevice {
    next_id: AtomicUsize,
    pub calls: CallLog,
    pub render_pipelines_created: AtomicUsize,
    pub fail_render_pipelines: AtomicBool,
    pub destroyed: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<(BufferId, u64, Vec<u8>)>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    fn record_destroy(&self, what: String) -> Result<(), ResourceError> {
        self.destroyed.lock().unwrap().push(what);
        Ok(())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn name(&self) -> &str {
        "mock"
    }
    fn supports_feature(&self, _feature: DeviceFeature) -> bool {
        true
    }
    fn create_buffer(&self, _descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        Ok(BufferId(self.next()))
    }
    fn create_buffer_with_data(
        &self,
        _descriptor: &BufferDescriptor,
        _data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        Ok(BufferId(self.next()))
    }
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.record_destroy(format!("buffer {}", id.0))
    }
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.writes.lock().unwrap().push((id, offset, data.to_vec()));
        Ok(())
    }
    fn read_buffer(&self, _id: BufferId, _offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        out.fill(0);
        Ok(())
    }
    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        Ok(TextureId(self.next()))
    }
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.record_destroy(format!("texture {}", id.0))
    }
    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.next()))
    }
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.record_destroy(format!("sampler {}", id.0))
    }
    fn create_shader_function(
        &self,
        _descriptor: &ShaderFunctionDescriptor,
    ) -> Result<ShaderFunctionId, ResourceError> {
        Ok(ShaderFunctionId(self.next()))
    }
    fn destroy_shader_function(&self, id: ShaderFunctionId) -> Result<(), ResourceError> {
        self.record_destroy(format!("shader {}", id.0))
    }
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        if self.fail_render_pipelines.load(Ordering::Relaxed) {
            return Err(PipelineError::CompilationFailed {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                details: "rejected by mock".to_string(),
            }
            .into());
        }
        self.render_pipelines_created.fetch_add(1, Ordering::Relaxed);
        Ok(RenderPipelineId(self.next()))
    }
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.record_destroy(format!("render pipeline {}", id.0))
    }
    fn create_compute_pipeline(
        &self,
        _descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        Ok(ComputePipelineId(self.next()))
    }
    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.record_destroy(format!("compute pipeline {}", id.0))
    }
    fn create_command_buffer(&self, _label: Option<&str>) -> Box<dyn CommandBuffer> {
        Box::new(MockCommandBuffer {
            id: CommandBufferId(self.next() as u64),
            calls: self.calls.clone(),
            handlers: Vec::new(),
        })
    }
    fn next_drawable(&self) -> Result<Drawable, RenderError> {
        Ok(Drawable {
            id: DrawableId(self.next()),
            texture: TextureId(self.next()),
            size: self.surface_extent(),
        })
    }
    fn surface_format(&self) -> PixelFormat {
        PixelFormat::Bgra8Unorm
    }
    fn surface_extent(&self) -> Extent2D {
        Extent2D {
            width: 640,
            height: 480,
        }
    }
    fn resize_surface(&self, _width: u32, _height: u32) {}
}

struct MockCommandBuffer {
    id: CommandBufferId,
    calls: CallLog,
    handlers: Vec<CompletionHandler>,
}

impl CommandBuffer for MockCommandBuffer {
    fn id(&self) -> CommandBufferId {
        self.id
    }
    fn begin_render_encoding(&mut self, _descriptor: &RenderPassDescriptor) -> Box<dyn RenderEncoder> {
        self.calls.lock().unwrap().push("begin_render_encoding".to_string());
        Box::new(MockEncoder {
            calls: self.calls.clone(),
        })
    }
    fn begin_compute_encoding(&mut self) -> Box<dyn ComputeEncoder> {
        self.calls.lock().unwrap().push("begin_compute_encoding".to_string());
        Box::new(MockEncoder {
            calls: self.calls.clone(),
        })
    }
    fn add_completed_handler(&mut self, handler: CompletionHandler) {
        self.handlers.push(handler);
    }
    fn present_drawable(&mut self, drawable: Drawable) {
        self.calls.lock().unwrap().push(format!("present {}", drawable.id.0));
    }
    fn commit(self: Box<Self>) {
        self.calls.lock().unwrap().push("commit".to_string());
        for handler in self.handlers {
            handler(self.id);
        }
    }
}

/// Records every encoder call as a short string.
pub(crate) struct MockEncoder {
    pub calls: CallLog,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
        }
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl RenderEncoder for MockEncoder {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.push(format!("set_pipeline {}", pipeline.0));
    }
    fn set_vertex_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.push(format!("vertex_buffer {index} {} {offset}", buffer.0));
    }
    fn set_fragment_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.push(format!("fragment_buffer {index} {} {offset}", buffer.0));
    }
    fn set_vertex_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.push(format!("vertex_texture {index} {:?}", texture.map(|t| t.0)));
    }
    fn set_fragment_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.push(format!("fragment_texture {index} {:?}", texture.map(|t| t.0)));
    }
    fn set_vertex_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.push(format!("vertex_sampler {index} {:?}", sampler.map(|s| s.0)));
    }
    fn set_fragment_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.push(format!("fragment_sampler {index} {:?}", sampler.map(|s| s.0)));
    }
    fn set_cull_mode(&mut self, mode: CullMode) {
        self.push(format!("cull {mode:?}"));
    }
    fn set_front_facing_winding(&mut self, winding: Winding) {
        self.push(format!("winding {winding:?}"));
    }
    fn set_depth_bias(&mut self, depth_bias: f32, slope_scale: f32, clamp: f32) {
        self.push(format!("depth_bias {depth_bias} {slope_scale} {clamp}"));
    }
    fn set_triangle_fill_mode(&mut self, mode: FillMode) {
        self.push(format!("fill {mode:?}"));
    }
    fn set_depth_stencil_state(&mut self, _state: &DepthStencilState) {
        self.push("depth_stencil".to_string());
    }
    fn set_stencil_reference(&mut self, reference: u32) {
        self.push(format!("stencil_ref {reference}"));
    }
    fn set_viewport(&mut self, _viewport: Viewport) {
        self.push("viewport".to_string());
    }
    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.push(format!("scissor {} {} {} {}", rect.x, rect.y, rect.width, rect.height));
    }
    fn set_visibility_result_mode(&mut self, mode: VisibilityResultMode) {
        self.push(format!("visibility {mode:?}"));
    }
    fn draw_primitives(
        &mut self,
        _primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    ) {
        self.push(format!("draw {vertex_start} {vertex_count} {instance_count}"));
    }
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitives(
        &mut self,
        _primitive: PrimitiveType,
        index_count: u32,
        _index_format: IndexFormat,
        _index_buffer: BufferId,
        index_buffer_offset: u64,
        instance_count: u32,
        _base_vertex: i32,
        _base_instance: u32,
    ) {
        self.push(format!("draw_indexed {index_count} {index_buffer_offset} {instance_count}"));
    }
    fn draw_primitives_indirect(&mut self, _primitive: PrimitiveType, _buffer: BufferId, offset: u64) {
        self.push(format!("draw_indirect {offset}"));
    }
    fn draw_indexed_primitives_indirect(
        &mut self,
        _primitive: PrimitiveType,
        _index_format: IndexFormat,
        _index_buffer: BufferId,
        _index_buffer_offset: u64,
        _indirect_buffer: BufferId,
        indirect_offset: u64,
    ) {
        self.push(format!("draw_indexed_indirect {indirect_offset}"));
    }
    fn push_debug_group(&mut self, label: &str) {
        self.push(format!("push {label}"));
    }
    fn pop_debug_group(&mut self) {
        self.push("pop".to_string());
    }
    fn end_encoding(self: Box<Self>) {
        self.push("end_encoding".to_string());
    }
}

impl ComputeEncoder for MockEncoder {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.push(format!("set_compute_pipeline {}", pipeline.0));
    }
    fn set_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.push(format!("compute_buffer {index} {} {offset}", buffer.0));
    }
    fn set_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.push(format!("compute_texture {index} {:?}", texture.map(|t| t.0)));
    }
    fn set_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.push(format!("compute_sampler {index} {:?}", sampler.map(|s| s.0)));
    }
    fn dispatch_threadgroups(&mut self, groups: [u32; 3], _threads_per_group: [u32; 3]) {
        self.push(format!("dispatch {groups:?}"));
    }
    fn dispatch_threadgroups_indirect(
        &mut self,
        _buffer: BufferId,
        offset: u64,
        _threads_per_group: [u32; 3],
    ) {
        self.push(format!("dispatch_indirect {offset}"));
    }
    fn push_debug_group(&mut self, label: &str) {
        self.push(format!("push {label}"));
    }
    fn pop_debug_group(&mut self) {
        self.push("pop".to_string());
    }
    fn end_encoding(self: Box<Self>) {
        self.push("end_encoding".to_string());
    }
}

/// A stage binder that records bindings and constant uploads.
#[derive(Debug, Default)]
pub(crate) struct RecordingBinder {
    pub textures: Vec<(u32, Option<TextureId>)>,
    pub samplers: Vec<(u32, Option<SamplerId>)>,
    pub buffers: Vec<(u32, BufferId, u64)>,
    pub constants: Vec<(u32, Vec<u8>)>,
}

impl ShaderStageBinder for RecordingBinder {
    fn stage(&self) -> ShaderStage {
        ShaderStage::Pixel
    }
    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        self.textures.push((slot, texture));
    }
    fn bind_sampler(&mut self, slot: u32, sampler: Option<SamplerId>) {
        self.samplers.push((slot, sampler));
    }
    fn bind_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.buffers.push((slot, buffer, offset));
    }
    fn set_constants(&mut self, slot: u32, data: &[u8]) {
        self.constants.push((slot, data.to_vec()));
    }
}
