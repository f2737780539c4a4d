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

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use strata_core::renderer::traits::{
    CommandBuffer, CompletionHandler, ComputeEncoder, RenderEncoder,
};
use strata_core::renderer::{
    BufferId, BufferUsage, CommandBufferId, ComputePipelineId, CullMode, DepthStencilState,
    Drawable, FillMode, IndexFormat, PrimitiveType, RenderPassDescriptor, RenderPipelineId,
    SamplerId, ScissorRect, ShaderStage, TextureId, Viewport, VisibilityResultMode, Winding,
    MAX_RENDER_TARGETS,
};

use super::device::HeadlessDevice;
use super::queue::SubmittedWork;

/// A command as recorded by the headless encoders.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A graphics encoder was opened.
    BeginRenderPass(RenderPassDescriptor),
    /// A compute encoder was opened.
    BeginComputePass,
    /// The open encoder was ended.
    EndEncoding,
    /// `set_pipeline` on a graphics encoder.
    SetRenderPipeline(RenderPipelineId),
    /// `set_pipeline` on a compute encoder.
    SetComputePipeline(ComputePipelineId),
    /// A buffer bound to a stage slot.
    SetBuffer {
        /// The stage.
        stage: ShaderStage,
        /// The slot.
        index: u32,
        /// The buffer.
        buffer: BufferId,
        /// Byte offset into the buffer.
        offset: u64,
    },
    /// A texture bound to a stage slot.
    SetTexture {
        /// The stage.
        stage: ShaderStage,
        /// The slot.
        index: u32,
        /// The texture, `None` to unbind.
        texture: Option<TextureId>,
    },
    /// A sampler bound to a stage slot.
    SetSampler {
        /// The stage.
        stage: ShaderStage,
        /// The slot.
        index: u32,
        /// The sampler, `None` to unbind.
        sampler: Option<SamplerId>,
    },
    /// Cull mode change.
    SetCullMode(CullMode),
    /// Front-face winding change.
    SetFrontFacingWinding(Winding),
    /// Depth bias change.
    SetDepthBias {
        /// Constant bias.
        depth_bias: f32,
        /// Slope-scaled bias.
        slope_scale: f32,
        /// Bias clamp.
        clamp: f32,
    },
    /// Fill mode change.
    SetTriangleFillMode(FillMode),
    /// Depth/stencil state change.
    SetDepthStencilState(DepthStencilState),
    /// Stencil reference change.
    SetStencilReference(u32),
    /// Viewport change.
    SetViewport(Viewport),
    /// Scissor change.
    SetScissorRect(ScissorRect),
    /// Occlusion counting change.
    SetVisibilityResultMode(VisibilityResultMode),
    /// Non-indexed draw.
    Draw {
        /// Topology.
        primitive: PrimitiveType,
        /// First vertex.
        vertex_start: u32,
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Topology.
        primitive: PrimitiveType,
        /// Number of indices.
        index_count: u32,
        /// Index width.
        index_format: IndexFormat,
        /// Index buffer.
        index_buffer: BufferId,
        /// Byte offset of the first index.
        index_buffer_offset: u64,
        /// Number of instances.
        instance_count: u32,
        /// Added to every index.
        base_vertex: i32,
        /// First instance.
        base_instance: u32,
    },
    /// Indirect non-indexed draw.
    DrawIndirect {
        /// Topology.
        primitive: PrimitiveType,
        /// Argument buffer.
        indirect_buffer: BufferId,
        /// Byte offset of the arguments.
        indirect_offset: u64,
    },
    /// Indirect indexed draw.
    DrawIndexedIndirect {
        /// Topology.
        primitive: PrimitiveType,
        /// Index width.
        index_format: IndexFormat,
        /// Index buffer.
        index_buffer: BufferId,
        /// Byte offset of the first index.
        index_buffer_offset: u64,
        /// Argument buffer.
        indirect_buffer: BufferId,
        /// Byte offset of the arguments.
        indirect_offset: u64,
    },
    /// Compute dispatch.
    Dispatch {
        /// Thread groups per dimension.
        groups: [u32; 3],
        /// Threads per group.
        threads_per_group: [u32; 3],
    },
    /// Indirect compute dispatch.
    DispatchIndirect {
        /// Argument buffer.
        indirect_buffer: BufferId,
        /// Byte offset of the arguments.
        indirect_offset: u64,
        /// Threads per group.
        threads_per_group: [u32; 3],
    },
    /// Debug group opened.
    PushDebugGroup(String),
    /// Debug group closed.
    PopDebugGroup,
}

#[derive(Debug, Default)]
struct Recording {
    commands: Vec<RecordedCommand>,
    encoder_open: bool,
}

type SharedRecording = Arc<Mutex<Recording>>;

pub(crate) struct HeadlessCommandBuffer {
    id: CommandBufferId,
    label: Option<String>,
    device: HeadlessDevice,
    recording: SharedRecording,
    handlers: Vec<CompletionHandler>,
    drawables: Vec<Drawable>,
}

impl HeadlessCommandBuffer {
    pub(crate) fn new(id: CommandBufferId, label: Option<String>, device: HeadlessDevice) -> Self {
        Self {
            id,
            label,
            device,
            recording: Arc::new(Mutex::new(Recording::default())),
            handlers: Vec::new(),
            drawables: Vec::new(),
        }
    }

    fn open_encoder(&self, first_command: RecordedCommand) {
        let mut recording = self.recording.lock().unwrap();
        if recording.encoder_open {
            self.device.internal().shared.validation_error(format_args!(
                "command buffer {:?} opened an encoder while another one is open",
                self.id
            ));
        }
        recording.encoder_open = true;
        recording.commands.push(first_command);
    }
}

impl CommandBuffer for HeadlessCommandBuffer {
    fn id(&self) -> CommandBufferId {
        self.id
    }

    fn begin_render_encoding(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Box<dyn RenderEncoder> {
        let shared = &self.device.internal().shared;
        if descriptor.color_attachments.len() > MAX_RENDER_TARGETS {
            shared.validation_error(format_args!(
                "render pass has {} color attachments",
                descriptor.color_attachments.len()
            ));
        }
        let textures = descriptor
            .color_attachments
            .iter()
            .flat_map(|attachment| std::iter::once(attachment.texture).chain(attachment.resolve_target))
            .chain(
                descriptor
                    .depth_stencil_attachment
                    .as_ref()
                    .map(|attachment| attachment.texture),
            );
        for texture in textures {
            if !shared.texture_exists(texture) {
                shared.validation_error(format_args!(
                    "render pass attachment {texture:?} does not exist"
                ));
            }
        }
        if let Some(buffer) = descriptor.visibility_result_buffer {
            let usable = shared
                .buffers
                .lock()
                .unwrap()
                .get(&buffer)
                .is_some_and(|entry| entry.usage.contains(BufferUsage::VISIBILITY_RESULT));
            if !usable {
                shared.validation_error(format_args!(
                    "{buffer:?} cannot receive visibility results"
                ));
            }
        }

        shared
            .counters
            .render_encoders_begun
            .fetch_add(1, Ordering::Relaxed);
        self.open_encoder(RecordedCommand::BeginRenderPass(descriptor.clone()));
        Box::new(HeadlessRenderEncoder {
            recording: Arc::clone(&self.recording),
            device: self.device.clone(),
            has_pipeline: false,
            has_visibility_buffer: descriptor.visibility_result_buffer.is_some(),
            debug_depth: 0,
        })
    }

    fn begin_compute_encoding(&mut self) -> Box<dyn ComputeEncoder> {
        self.device
            .internal()
            .shared
            .counters
            .compute_encoders_begun
            .fetch_add(1, Ordering::Relaxed);
        self.open_encoder(RecordedCommand::BeginComputePass);
        Box::new(HeadlessComputeEncoder {
            recording: Arc::clone(&self.recording),
            device: self.device.clone(),
            has_pipeline: false,
            debug_depth: 0,
        })
    }

    fn add_completed_handler(&mut self, handler: CompletionHandler) {
        self.handlers.push(handler);
    }

    fn present_drawable(&mut self, drawable: Drawable) {
        self.drawables.push(drawable);
    }

    fn commit(self: Box<Self>) {
        let this = *self;
        let commands = {
            let mut recording = this.recording.lock().unwrap();
            if recording.encoder_open {
                this.device.internal().shared.validation_error(format_args!(
                    "command buffer {:?} committed with an open encoder",
                    this.id
                ));
            }
            std::mem::take(&mut recording.commands)
        };
        log::trace!(
            "HeadlessDevice: Committing command buffer '{}' ({:?}, {} commands)",
            this.label.as_deref().unwrap_or("Unnamed"),
            this.id,
            commands.len()
        );
        this.device.internal().queue.submit(SubmittedWork {
            id: this.id,
            commands,
            handlers: this.handlers,
            drawables: this.drawables,
        });
    }
}

struct HeadlessRenderEncoder {
    recording: SharedRecording,
    device: HeadlessDevice,
    has_pipeline: bool,
    has_visibility_buffer: bool,
    debug_depth: u32,
}

impl HeadlessRenderEncoder {
    fn record(&self, command: RecordedCommand) {
        self.recording.lock().unwrap().commands.push(command);
    }

    fn record_draw(&self, command: RecordedCommand) {
        if !self.has_pipeline {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("draw recorded without a pipeline"));
        }
        self.record(command);
    }
}

impl RenderEncoder for HeadlessRenderEncoder {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        if !self.device.internal().shared.render_pipeline_exists(pipeline) {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("{pipeline:?} does not exist"));
        }
        self.has_pipeline = true;
        self.record(RecordedCommand::SetRenderPipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.record(RecordedCommand::SetBuffer {
            stage: ShaderStage::Vertex,
            index,
            buffer,
            offset,
        });
    }

    fn set_fragment_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.record(RecordedCommand::SetBuffer {
            stage: ShaderStage::Pixel,
            index,
            buffer,
            offset,
        });
    }

    fn set_vertex_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.record(RecordedCommand::SetTexture {
            stage: ShaderStage::Vertex,
            index,
            texture,
        });
    }

    fn set_fragment_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.record(RecordedCommand::SetTexture {
            stage: ShaderStage::Pixel,
            index,
            texture,
        });
    }

    fn set_vertex_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.record(RecordedCommand::SetSampler {
            stage: ShaderStage::Vertex,
            index,
            sampler,
        });
    }

    fn set_fragment_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.record(RecordedCommand::SetSampler {
            stage: ShaderStage::Pixel,
            index,
            sampler,
        });
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.record(RecordedCommand::SetCullMode(mode));
    }

    fn set_front_facing_winding(&mut self, winding: Winding) {
        self.record(RecordedCommand::SetFrontFacingWinding(winding));
    }

    fn set_depth_bias(&mut self, depth_bias: f32, slope_scale: f32, clamp: f32) {
        self.record(RecordedCommand::SetDepthBias {
            depth_bias,
            slope_scale,
            clamp,
        });
    }

    fn set_triangle_fill_mode(&mut self, mode: FillMode) {
        self.record(RecordedCommand::SetTriangleFillMode(mode));
    }

    fn set_depth_stencil_state(&mut self, state: &DepthStencilState) {
        self.record(RecordedCommand::SetDepthStencilState(*state));
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        self.record(RecordedCommand::SetStencilReference(reference));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(RecordedCommand::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.record(RecordedCommand::SetScissorRect(rect));
    }

    fn set_visibility_result_mode(&mut self, mode: VisibilityResultMode) {
        if matches!(mode, VisibilityResultMode::Counting(_)) && !self.has_visibility_buffer {
            self.device.internal().shared.validation_error(format_args!(
                "visibility counting enabled on a pass without a visibility buffer"
            ));
        }
        self.record(RecordedCommand::SetVisibilityResultMode(mode));
    }

    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    ) {
        self.record_draw(RecordedCommand::Draw {
            primitive,
            vertex_start,
            vertex_count,
            instance_count,
        });
    }

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
    ) {
        if index_buffer_offset % index_format.stride() as u64 != 0 {
            self.device.internal().shared.validation_error(format_args!(
                "index buffer offset {index_buffer_offset} is not aligned to {index_format:?}"
            ));
        }
        self.record_draw(RecordedCommand::DrawIndexed {
            primitive,
            index_count,
            index_format,
            index_buffer,
            index_buffer_offset,
            instance_count,
            base_vertex,
            base_instance,
        });
    }

    fn draw_primitives_indirect(
        &mut self,
        primitive: PrimitiveType,
        indirect_buffer: BufferId,
        indirect_offset: u64,
    ) {
        self.record_draw(RecordedCommand::DrawIndirect {
            primitive,
            indirect_buffer,
            indirect_offset,
        });
    }

    fn draw_indexed_primitives_indirect(
        &mut self,
        primitive: PrimitiveType,
        index_format: IndexFormat,
        index_buffer: BufferId,
        index_buffer_offset: u64,
        indirect_buffer: BufferId,
        indirect_offset: u64,
    ) {
        self.record_draw(RecordedCommand::DrawIndexedIndirect {
            primitive,
            index_format,
            index_buffer,
            index_buffer_offset,
            indirect_buffer,
            indirect_offset,
        });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_depth += 1;
        self.record(RecordedCommand::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        if self.debug_depth == 0 {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("debug group popped without a push"));
        } else {
            self.debug_depth -= 1;
        }
        self.record(RecordedCommand::PopDebugGroup);
    }

    fn end_encoding(self: Box<Self>) {
        if self.debug_depth != 0 {
            self.device.internal().shared.validation_error(format_args!(
                "render encoder ended with {} open debug groups",
                self.debug_depth
            ));
        }
        let mut recording = self.recording.lock().unwrap();
        recording.commands.push(RecordedCommand::EndEncoding);
        recording.encoder_open = false;
    }
}

struct HeadlessComputeEncoder {
    recording: SharedRecording,
    device: HeadlessDevice,
    has_pipeline: bool,
    debug_depth: u32,
}

impl HeadlessComputeEncoder {
    fn record(&self, command: RecordedCommand) {
        self.recording.lock().unwrap().commands.push(command);
    }

    fn check_dispatch(&self) {
        if !self.has_pipeline {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("dispatch recorded without a pipeline"));
        }
    }
}

impl ComputeEncoder for HeadlessComputeEncoder {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        if !self.device.internal().shared.compute_pipeline_exists(pipeline) {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("{pipeline:?} does not exist"));
        }
        self.has_pipeline = true;
        self.record(RecordedCommand::SetComputePipeline(pipeline));
    }

    fn set_buffer(&mut self, index: u32, buffer: BufferId, offset: u64) {
        self.record(RecordedCommand::SetBuffer {
            stage: ShaderStage::Compute,
            index,
            buffer,
            offset,
        });
    }

    fn set_texture(&mut self, index: u32, texture: Option<TextureId>) {
        self.record(RecordedCommand::SetTexture {
            stage: ShaderStage::Compute,
            index,
            texture,
        });
    }

    fn set_sampler(&mut self, index: u32, sampler: Option<SamplerId>) {
        self.record(RecordedCommand::SetSampler {
            stage: ShaderStage::Compute,
            index,
            sampler,
        });
    }

    fn dispatch_threadgroups(&mut self, groups: [u32; 3], threads_per_group: [u32; 3]) {
        self.check_dispatch();
        if groups.contains(&0) || threads_per_group.contains(&0) {
            self.device.internal().shared.validation_error(format_args!(
                "empty dispatch {groups:?} x {threads_per_group:?}"
            ));
        }
        self.record(RecordedCommand::Dispatch {
            groups,
            threads_per_group,
        });
    }

    fn dispatch_threadgroups_indirect(
        &mut self,
        indirect_buffer: BufferId,
        indirect_offset: u64,
        threads_per_group: [u32; 3],
    ) {
        self.check_dispatch();
        self.record(RecordedCommand::DispatchIndirect {
            indirect_buffer,
            indirect_offset,
            threads_per_group,
        });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_depth += 1;
        self.record(RecordedCommand::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        if self.debug_depth == 0 {
            self.device
                .internal()
                .shared
                .validation_error(format_args!("debug group popped without a push"));
        } else {
            self.debug_depth -= 1;
        }
        self.record(RecordedCommand::PopDebugGroup);
    }

    fn end_encoding(self: Box<Self>) {
        let mut recording = self.recording.lock().unwrap();
        recording.commands.push(RecordedCommand::EndEncoding);
        recording.encoder_open = false;
    }
}
