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

//! The command-submission context.
//!
//! [`RhiContext`] owns the current command buffer and its single active
//! encoder, and turns the immediate-mode state setters and draws of a renderer
//! into encoder calls on top of the explicit [`GraphicsDevice`] contract:
//!
//! - state that lives in pipeline objects (shaders, blending, attachment
//!   formats) is shadowed and resolved through the pipeline cache at draw time;
//! - state that lives on encoders (rasterizer, depth/stencil, viewport, vertex
//!   streams, bindings) is shadowed and replayed whenever a new encoder opens;
//! - transient data is carved out of a ring buffer;
//! - the frame lifecycle bounds CPU run-ahead with a counting semaphore and
//!   defers object destruction until the GPU retired the frames using them.
//!
//! Misuse that indicates a programming error (unsupported primitive types,
//! layout mismatches, scratch overruns) panics. Device failures are logged and
//! the affected draw is skipped.

mod draw;
mod frame;
mod targets;

use crate::encoder::{ActiveEncoder, EncoderKind};
use crate::frame::event::{CompletionTicket, EventRing};
use crate::frame::pacer::FramePacer;
use crate::frame::release::{DeferredReleaseQueue, GpuObject};
use crate::frame::scratch::ScratchPool;
use crate::frame::semaphore::FrameSemaphore;
use crate::pipeline_cache::{BlendStateObject, BoundShaderState, PipelineCache, PipelineShadow};
use crate::pipeline_key::{PipelineKey, PipelineKeyRegistry};
use crate::rasterizer::RasterizerShadow;
use crate::render_targets::RenderTargetsInfo;
use crate::resource_table::{
    SamplerState, StageResourceBindings, UniformBuffer, UniformBufferLayout, UniformResource,
};
use crate::ring_buffer::RingBuffer;
use crate::shader::Shader;
use crate::shader_params::ShaderParameterCache;
use crate::stage::{DirectBinding, DirectBindings};
use crate::surface::Surface;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use strata_core::renderer::{
    BlendState, BufferId, BufferUsage, CommandBuffer, ComputePipelineId, DepthStencilState,
    DeviceFeature, Drawable, Extent2D, FillMode, FrameStats, GraphicsDevice, PackedTypeIndex,
    RasterizerState, RenderError, RenderPipelineId, ResourceError, RhiSettings, SamplerDescriptor,
    ScissorRect, ShaderBindings, ShaderFunctionDescriptor, ShaderStage, TextureDescriptor,
    VertexLayout, Viewport, MAX_VERTEX_STREAMS,
};

/// Where the context is in the frame protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No command buffer exists (only observable while shutting down).
    Idle,
    /// A command buffer exists, no encoder is open.
    CommandBufferOpen,
    /// A render encoder is open.
    EncodingGraphics,
    /// A compute encoder is open.
    EncodingCompute,
}

/// Logs and aborts on a feature this layer deliberately does not implement.
#[track_caller]
pub(crate) fn not_supported(what: &str) -> ! {
    log::error!("Not supported: {what}");
    panic!("not supported: {what}")
}

/// The command-submission context. See the [module docs](self).
pub struct RhiContext {
    device: Arc<dyn GraphicsDevice>,
    settings: RhiSettings,

    command_buffer: Option<Box<dyn CommandBuffer>>,
    current_ticket: Option<CompletionTicket>,
    encoder: ActiveEncoder,
    debug_groups: Vec<String>,

    semaphore: FrameSemaphore,
    events: EventRing,
    release_queue: DeferredReleaseQueue,
    completed_generation: Arc<AtomicU64>,
    frame_number: u64,
    frame_started: Instant,
    pacer: Option<Box<dyn FramePacer>>,
    scratch: ScratchPool,

    ring: RingBuffer,
    query_ring: RingBuffer,
    active_query: Option<u64>,

    key_registry: PipelineKeyRegistry,
    pipeline_cache: PipelineCache,
    shadow: PipelineShadow,
    bound_shader_state: Option<Arc<BoundShaderState>>,
    current_pipeline: Option<RenderPipelineId>,
    compute_shader: Option<Arc<Shader>>,
    current_compute_pipeline: Option<ComputePipelineId>,

    rasterizer: RasterizerShadow,
    depth_stencil: DepthStencilState,
    stencil_reference: u32,
    depth_stencil_dirty: bool,
    viewport: Viewport,
    viewport_dirty: bool,
    scissor: Option<ScissorRect>,
    scissor_dirty: bool,
    streams: [Option<(BufferId, u64)>; MAX_VERTEX_STREAMS],
    streams_dirty: u32,

    params: [ShaderParameterCache; ShaderStage::COUNT],
    uniform_buffers: [StageResourceBindings; ShaderStage::COUNT],
    direct: [DirectBindings; ShaderStage::COUNT],

    previous_render_targets: Option<RenderTargetsInfo>,
    render_target_extent: Extent2D,
    back_buffer: Arc<Surface>,
    drawable: Option<Drawable>,

    scene_counter: u32,
    resource_table_epoch: Option<u32>,

    frame_stats: FrameStats,
    last_frame_stats: FrameStats,
    lifetime_stats: FrameStats,
    ring_wraps_at_frame_start: u64,
    ring_bytes_at_frame_start: u64,
}

impl std::fmt::Debug for RhiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhiContext")
            .field("device", &self.device.name())
            .field("frame_number", &self.frame_number)
            .field("phase", &self.frame_phase())
            .finish_non_exhaustive()
    }
}

impl RhiContext {
    /// Creates a context on `device` and opens the first frame's command buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InitializationFailed`] for invalid settings and a
    /// resource error if the ring buffers cannot be allocated.
    pub fn new(device: Arc<dyn GraphicsDevice>, settings: RhiSettings) -> Result<Self, RenderError> {
        settings
            .validate()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        let depth = settings.pipelining_depth();

        let ring = RingBuffer::new(
            device.as_ref(),
            settings.ring_buffer_size,
            settings.ring_buffer_alignment,
            BufferUsage::UNIFORM | BufferUsage::VERTEX | BufferUsage::INDEX,
            "transient ring",
        )?;
        let query_ring = match RingBuffer::new(
            device.as_ref(),
            settings.query_buffer_size,
            8,
            BufferUsage::VISIBILITY_RESULT | BufferUsage::MAP_READ,
            "occlusion queries",
        ) {
            Ok(ring) => ring,
            Err(e) => {
                ring.destroy(device.as_ref());
                return Err(e.into());
            }
        };

        let mut key_registry = PipelineKeyRegistry::new();
        let shadow = PipelineShadow::new(&mut key_registry);
        let back_buffer = Arc::new(Surface::back_buffer(device.surface_format(), device.surface_extent()));
        let scratch_bytes = settings.max_uniform_scratch_bytes;

        log::info!(
            "RhiContext: Created on '{}' ({depth} frames in flight, {} byte ring)",
            device.name(),
            settings.ring_buffer_size
        );

        let mut context = Self {
            semaphore: FrameSemaphore::new(depth),
            events: EventRing::new(depth),
            pipeline_cache: PipelineCache::new(settings.pipeline_warmup_frames),
            device,
            settings,
            command_buffer: None,
            current_ticket: None,
            encoder: ActiveEncoder::None,
            debug_groups: Vec::new(),
            release_queue: DeferredReleaseQueue::new(),
            completed_generation: Arc::new(AtomicU64::new(0)),
            frame_number: 0,
            frame_started: Instant::now(),
            pacer: None,
            scratch: ScratchPool::new(),
            ring,
            query_ring,
            active_query: None,
            key_registry,
            shadow,
            bound_shader_state: None,
            current_pipeline: None,
            compute_shader: None,
            current_compute_pipeline: None,
            rasterizer: RasterizerShadow::default(),
            depth_stencil: DepthStencilState::default(),
            stencil_reference: 0,
            depth_stencil_dirty: true,
            viewport: Viewport::default(),
            viewport_dirty: true,
            scissor: None,
            scissor_dirty: true,
            streams: [None; MAX_VERTEX_STREAMS],
            streams_dirty: 0,
            params: std::array::from_fn(|_| ShaderParameterCache::new(scratch_bytes)),
            uniform_buffers: Default::default(),
            direct: Default::default(),
            previous_render_targets: None,
            render_target_extent: Extent2D::default(),
            back_buffer,
            drawable: None,
            scene_counter: 0,
            resource_table_epoch: None,
            frame_stats: FrameStats::default(),
            last_frame_stats: FrameStats::default(),
            lifetime_stats: FrameStats::default(),
            ring_wraps_at_frame_start: 0,
            ring_bytes_at_frame_start: 0,
        };
        context.init_frame();
        Ok(context)
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The settings the context was created with.
    pub fn settings(&self) -> &RhiSettings {
        &self.settings
    }

    /// Installs a pacer consulted before every end-of-frame commit.
    pub fn set_frame_pacer(&mut self, pacer: Box<dyn FramePacer>) {
        self.pacer = Some(pacer);
    }

    /// The number of the frame being recorded.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Where the context is in the frame protocol.
    pub fn frame_phase(&self) -> FramePhase {
        match (self.command_buffer.is_some(), self.encoder.kind()) {
            (false, _) => FramePhase::Idle,
            (true, EncoderKind::Neither) => FramePhase::CommandBufferOpen,
            (true, EncoderKind::Graphics) => FramePhase::EncodingGraphics,
            (true, EncoderKind::Compute) => FramePhase::EncodingCompute,
        }
    }

    /// The kind of the open encoder.
    pub fn encoder_kind(&self) -> EncoderKind {
        self.encoder.kind()
    }

    /// Counters of the frame being recorded.
    pub fn frame_stats(&self) -> &FrameStats {
        &self.frame_stats
    }

    /// Counters of the last ended frame.
    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_frame_stats
    }

    /// Counters accumulated over every ended frame.
    pub fn lifetime_stats(&self) -> &FrameStats {
        &self.lifetime_stats
    }

    /// The current pipeline key.
    pub fn pipeline_key(&self) -> PipelineKey {
        self.shadow.key()
    }

    /// The back-buffer surface.
    pub fn back_buffer(&self) -> &Arc<Surface> {
        &self.back_buffer
    }

    /// Objects waiting for the GPU before being destroyed.
    pub fn pending_releases(&self) -> usize {
        self.release_queue.pending_objects()
    }

    /// The transient ring buffer.
    pub fn ring_buffer(&self) -> &RingBuffer {
        &self.ring
    }

    // --- Resource creation ---

    /// Creates a shader from bytecode and its reflection header.
    pub fn create_shader(
        &self,
        descriptor: &ShaderFunctionDescriptor,
        bindings: ShaderBindings,
    ) -> Result<Arc<Shader>, ResourceError> {
        Shader::new(self.device.as_ref(), descriptor, bindings, self.release_queue.sender()).map(Arc::new)
    }

    /// Returns the bound shader state for a vertex layout and shader pair.
    pub fn create_bound_shader_state(
        &mut self,
        vertex_layout: &VertexLayout,
        vertex_shader: &Arc<Shader>,
        pixel_shader: Option<&Arc<Shader>>,
    ) -> Arc<BoundShaderState> {
        self.pipeline_cache.bound_shader_state(
            vertex_layout,
            vertex_shader,
            pixel_shader,
            self.release_queue.sender(),
        )
    }

    /// Registers a blend state with the pipeline key registry.
    pub fn create_blend_state(&mut self, state: BlendState) -> BlendStateObject {
        BlendStateObject::new(state, &mut self.key_registry)
    }

    /// Creates a render-target surface.
    pub fn create_surface(&self, descriptor: &TextureDescriptor) -> Result<Arc<Surface>, ResourceError> {
        Surface::new(self.device.as_ref(), descriptor, self.release_queue.sender()).map(Arc::new)
    }

    /// Creates a sampler.
    pub fn create_sampler_state(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<Arc<SamplerState>, ResourceError> {
        SamplerState::new(self.device.as_ref(), descriptor, self.release_queue.sender()).map(Arc::new)
    }

    /// Creates a uniform buffer.
    pub fn create_uniform_buffer(
        &self,
        layout: Arc<UniformBufferLayout>,
        contents: &[u8],
        resources: Vec<UniformResource>,
    ) -> Result<Arc<UniformBuffer>, ResourceError> {
        UniformBuffer::new(
            self.device.as_ref(),
            layout,
            contents,
            resources,
            self.release_queue.sender(),
        )
        .map(Arc::new)
    }

    /// Destroys `object` once the GPU finished the frames recorded so far.
    pub fn release_object(&self, object: GpuObject) {
        self.release_queue.sender().release(object);
    }

    // --- Pipeline state ---

    /// Binds the shaders of subsequent draws.
    pub fn set_bound_shader_state(&mut self, state: &Arc<BoundShaderState>) {
        if self
            .bound_shader_state
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, state))
        {
            return;
        }
        self.bound_shader_state = Some(state.clone());
        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            self.uniform_buffers[stage.index()].mark_all_dirty();
            self.params[stage.index()].mark_all_dirty();
        }
    }

    /// Sets the blend state of subsequent draws.
    pub fn set_blend_state(&mut self, state: &BlendStateObject) {
        self.shadow.set_blend_state(state);
    }

    /// Sets the rasterizer state of subsequent draws.
    pub fn set_rasterizer_state(&mut self, mut state: RasterizerState) {
        if state.fill_mode == FillMode::Wireframe
            && !self.device.supports_feature(DeviceFeature::WireframeFill)
        {
            log::warn!("Wireframe fill is not supported by '{}', drawing solid", self.device.name());
            state.fill_mode = FillMode::Solid;
        }
        self.rasterizer.set(state);
    }

    /// Sets the depth/stencil state and stencil reference of subsequent draws.
    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState, stencil_reference: u32) {
        if self.depth_stencil != state || self.stencil_reference != stencil_reference {
            self.depth_stencil = state;
            self.stencil_reference = stencil_reference;
            self.depth_stencil_dirty = true;
        }
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.viewport_dirty = true;
        self.scissor_dirty = true;
    }

    /// Enables the scissor test on `rect`, or disables it. A disabled or empty
    /// scissor clips to the viewport.
    pub fn set_scissor_rect(&mut self, enabled: bool, rect: ScissorRect) {
        self.scissor = enabled.then_some(rect);
        self.scissor_dirty = true;
    }

    /// Binds a vertex stream.
    ///
    /// # Panics
    ///
    /// Panics if `stream` is out of range.
    pub fn set_stream_source(&mut self, stream: u32, buffer: BufferId, offset: u64) {
        assert!(
            (stream as usize) < MAX_VERTEX_STREAMS,
            "vertex stream {stream} out of range"
        );
        self.streams[stream as usize] = Some((buffer, offset));
        self.streams_dirty |= 1 << stream;
    }

    /// Stream output is not available.
    pub fn set_stream_out_targets(&mut self, _targets: &[(BufferId, u64)]) {
        not_supported("stream output");
    }

    // --- Shader parameters ---

    /// Binds a surface (or nothing) at a texture slot of `stage`.
    pub fn set_shader_texture(&mut self, stage: ShaderStage, slot: u32, surface: Option<&Arc<Surface>>) {
        self.direct[stage.index()].set(slot, DirectBinding::Texture(surface.cloned()));
    }

    /// Binds a sampler (or nothing) at a sampler slot of `stage`.
    pub fn set_shader_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&Arc<SamplerState>>) {
        self.direct[stage.index()].set(slot, DirectBinding::Sampler(sampler.map(|s| s.id())));
    }

    /// Binds a buffer range at a buffer slot of `stage`.
    pub fn set_shader_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferId, offset: u64) {
        self.direct[stage.index()].set(slot, DirectBinding::Buffer(buffer, offset));
    }

    /// Binds a uniform buffer at `index` of `stage`.
    pub fn set_shader_uniform_buffer(&mut self, stage: ShaderStage, index: usize, buffer: &Arc<UniformBuffer>) {
        self.uniform_buffers[stage.index()].set(index, buffer.clone());
    }

    /// Writes loose parameter data into the packed `type_index` array of `stage`.
    pub fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        type_index: PackedTypeIndex,
        byte_offset: usize,
        data: &[u8],
    ) {
        self.params[stage.index()].set(type_index, byte_offset, data);
    }
}

impl Drop for RhiContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
