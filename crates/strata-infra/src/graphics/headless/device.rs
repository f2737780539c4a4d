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

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use strata_core::renderer::traits::CommandBuffer;
use strata_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, CommandBufferId, ComputePipelineDescriptor,
    ComputePipelineId, DeviceFeature, Drawable, DrawableId, Extent2D, GraphicsDevice,
    PipelineError, PixelFormat, RenderError, RenderPipelineDescriptor, RenderPipelineId,
    ResourceError, SampleCount, SamplerDescriptor, SamplerId, ShaderError,
    ShaderFunctionDescriptor, ShaderFunctionId, ShaderStage, TextureDescriptor, TextureId,
    TextureUsage,
};

use super::command::{HeadlessCommandBuffer, RecordedCommand};
use super::queue::GpuQueue;
use super::{HeadlessConfig, HeadlessStats};

#[derive(Debug)]
pub(crate) struct HeadlessBufferEntry {
    pub(crate) label: Option<String>,
    pub(crate) usage: BufferUsage,
    pub(crate) data: Vec<u8>,
}

#[allow(dead_code)]
#[derive(Debug)]
pub(crate) struct HeadlessTextureEntry {
    pub(crate) label: Option<String>,
    pub(crate) format: PixelFormat,
    pub(crate) size: Extent2D,
    pub(crate) sample_count: SampleCount,
    pub(crate) usage: TextureUsage,
}

#[derive(Debug)]
struct HeadlessShaderFunctionEntry {
    label: Option<String>,
    stage: ShaderStage,
}

#[allow(dead_code)]
#[derive(Debug)]
struct HeadlessPipelineEntry {
    label: Option<String>,
}

/// Counters updated from both the recording threads and the queue worker.
#[derive(Debug, Default)]
pub(crate) struct DeviceCounters {
    pub(crate) render_pipelines_created: AtomicU64,
    pub(crate) compute_pipelines_created: AtomicU64,
    pub(crate) command_buffers_created: AtomicU64,
    pub(crate) command_buffers_committed: AtomicU64,
    pub(crate) render_encoders_begun: AtomicU64,
    pub(crate) compute_encoders_begun: AtomicU64,
    pub(crate) draws_executed: AtomicU64,
    pub(crate) dispatches_executed: AtomicU64,
    pub(crate) drawables_acquired: AtomicU64,
    pub(crate) drawables_presented: AtomicU64,
    pub(crate) validation_errors: AtomicU64,
}

/// The part of the device state the queue worker needs to execute commands.
#[derive(Debug)]
pub(crate) struct DeviceShared {
    pub(crate) buffers: Mutex<HashMap<BufferId, HeadlessBufferEntry>>,
    pub(crate) textures: Mutex<HashMap<TextureId, HeadlessTextureEntry>>,
    render_pipelines: Mutex<HashMap<RenderPipelineId, HeadlessPipelineEntry>>,
    compute_pipelines: Mutex<HashMap<ComputePipelineId, HeadlessPipelineEntry>>,
    pub(crate) counters: DeviceCounters,
    pub(crate) command_log: Option<Mutex<Vec<(CommandBufferId, RecordedCommand)>>>,
    completed: Mutex<u64>,
    completed_cv: Condvar,
}

impl DeviceShared {
    fn new(record_commands: bool) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            render_pipelines: Mutex::new(HashMap::new()),
            compute_pipelines: Mutex::new(HashMap::new()),
            counters: DeviceCounters::default(),
            command_log: record_commands.then(|| Mutex::new(Vec::new())),
            completed: Mutex::new(0),
            completed_cv: Condvar::new(),
        }
    }

    /// Reports a misuse a real driver would reject.
    pub(crate) fn validation_error(&self, message: fmt::Arguments<'_>) {
        self.counters
            .validation_errors
            .fetch_add(1, Ordering::Relaxed);
        log::warn!("HeadlessDevice validation: {message}");
    }

    pub(crate) fn texture_exists(&self, id: TextureId) -> bool {
        self.textures.lock().unwrap().contains_key(&id)
    }

    pub(crate) fn render_pipeline_exists(&self, id: RenderPipelineId) -> bool {
        self.render_pipelines.lock().unwrap().contains_key(&id)
    }

    pub(crate) fn compute_pipeline_exists(&self, id: ComputePipelineId) -> bool {
        self.compute_pipelines.lock().unwrap().contains_key(&id)
    }

    /// Adds `samples` to the 64-bit visibility counter at `offset` of `buffer`.
    pub(crate) fn add_visibility_samples(&self, buffer: BufferId, offset: u64, samples: u64) {
        let mut buffers = self.buffers.lock().unwrap();
        let Some(entry) = buffers.get_mut(&buffer) else {
            drop(buffers);
            self.validation_error(format_args!("visibility buffer {buffer:?} does not exist"));
            return;
        };
        let start = offset as usize;
        let Some(slot) = entry.data.get_mut(start..start + 8) else {
            drop(buffers);
            self.validation_error(format_args!(
                "visibility offset {offset} is outside of buffer {buffer:?}"
            ));
            return;
        };
        let value: u64 = bytemuck::pod_read_unaligned(slot);
        slot.copy_from_slice(bytemuck::bytes_of(&value.wrapping_add(samples)));
    }

    /// Reads `N` consecutive `u32` arguments of an indirect command.
    pub(crate) fn read_indirect_arguments<const N: usize>(
        &self,
        buffer: BufferId,
        offset: u64,
    ) -> Option<[u32; N]> {
        let buffers = self.buffers.lock().unwrap();
        let entry = buffers.get(&buffer)?;
        let start = offset as usize;
        let bytes = entry.data.get(start..start + N * 4)?;
        let mut arguments = [0u32; N];
        for (argument, chunk) in arguments.iter_mut().zip(bytes.chunks_exact(4)) {
            *argument = bytemuck::pod_read_unaligned(chunk);
        }
        Some(arguments)
    }

    pub(crate) fn signal_completed(&self) {
        let mut completed = self.completed.lock().unwrap();
        *completed += 1;
        self.completed_cv.notify_all();
    }

    pub(crate) fn completed(&self) -> u64 {
        *self.completed.lock().unwrap()
    }

    /// Blocks until at least `target` command buffers completed.
    pub(crate) fn wait_completed(&self, target: u64) {
        let mut completed = self.completed.lock().unwrap();
        while *completed < target {
            completed = self.completed_cv.wait(completed).unwrap();
        }
    }
}

#[derive(Debug)]
struct SurfaceState {
    extent: Extent2D,
    drawables: Vec<TextureId>,
    next_slot: usize,
}

/// The internal, non-clonable state of the [`HeadlessDevice`].
#[derive(Debug)]
pub(crate) struct HeadlessDeviceInternal {
    config: HeadlessConfig,
    pub(crate) shared: Arc<DeviceShared>,
    pub(crate) queue: GpuQueue,
    samplers: Mutex<HashMap<SamplerId, Option<String>>>,
    shader_functions: Mutex<HashMap<ShaderFunctionId, HeadlessShaderFunctionEntry>>,
    surface: Mutex<SurfaceState>,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_sampler_id: AtomicUsize,
    next_shader_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,
    next_compute_pipeline_id: AtomicUsize,
    pub(crate) next_command_buffer_id: AtomicU64,
}

/// A clonable, thread-safe handle to the headless device.
#[derive(Clone, Debug)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

fn label_of(label: &Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    label.as_ref().map(|label| label.to_string())
}

impl HeadlessDevice {
    /// Creates a device and its display surface.
    pub fn new(config: HeadlessConfig) -> Result<Self, RenderError> {
        if config.drawable_count == 0 {
            return Err(RenderError::InitializationFailed(
                "the surface needs at least one drawable".to_string(),
            ));
        }
        let shared = Arc::new(DeviceShared::new(config.record_commands));
        let queue = GpuQueue::new(config.timeline, Arc::clone(&shared), config.simulated_gpu_time)
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        let device = Self {
            internal: Arc::new(HeadlessDeviceInternal {
                surface: Mutex::new(SurfaceState {
                    extent: config.surface_extent,
                    drawables: Vec::new(),
                    next_slot: 0,
                }),
                config,
                shared,
                queue,
                samplers: Mutex::new(HashMap::new()),
                shader_functions: Mutex::new(HashMap::new()),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_sampler_id: AtomicUsize::new(0),
                next_shader_id: AtomicUsize::new(0),
                next_pipeline_id: AtomicUsize::new(0),
                next_compute_pipeline_id: AtomicUsize::new(0),
                next_command_buffer_id: AtomicU64::new(0),
            }),
        };
        let extent = device.internal.config.surface_extent;
        device
            .recreate_drawables(extent)
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        log::info!(
            "HeadlessDevice: Initialized with a {}x{} {:?} surface ({:?} timeline)",
            extent.width,
            extent.height,
            device.internal.config.surface_format,
            device.internal.config.timeline
        );
        Ok(device)
    }

    fn recreate_drawables(&self, extent: Extent2D) -> Result<(), ResourceError> {
        let old = std::mem::take(&mut self.internal.surface.lock().unwrap().drawables);
        for texture in old {
            self.destroy_texture(texture)?;
        }
        let mut drawables = Vec::with_capacity(self.internal.config.drawable_count);
        if extent.width > 0 && extent.height > 0 {
            for index in 0..self.internal.config.drawable_count {
                let label = format!("Drawable {index}");
                drawables.push(self.create_texture(&TextureDescriptor {
                    label: Some(label.into()),
                    size: extent,
                    array_layer_count: 1,
                    mip_level_count: 1,
                    sample_count: SampleCount::X1,
                    format: self.internal.config.surface_format,
                    usage: TextureUsage::RENDER_TARGET | TextureUsage::PRESENTABLE,
                })?);
            }
        }
        let mut surface = self.internal.surface.lock().unwrap();
        surface.extent = extent;
        surface.drawables = drawables;
        surface.next_slot = 0;
        Ok(())
    }

    /// Returns a snapshot of the device counters.
    pub fn stats(&self) -> HeadlessStats {
        let counters = &self.internal.shared.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        HeadlessStats {
            buffers_alive: self.internal.shared.buffers.lock().unwrap().len() as u64,
            textures_alive: self.internal.shared.textures.lock().unwrap().len() as u64,
            render_pipelines_created: load(&counters.render_pipelines_created),
            render_pipelines_alive: self.internal.shared.render_pipelines.lock().unwrap().len()
                as u64,
            compute_pipelines_created: load(&counters.compute_pipelines_created),
            command_buffers_created: load(&counters.command_buffers_created),
            command_buffers_committed: load(&counters.command_buffers_committed),
            command_buffers_completed: self.internal.shared.completed(),
            render_encoders_begun: load(&counters.render_encoders_begun),
            compute_encoders_begun: load(&counters.compute_encoders_begun),
            draws_executed: load(&counters.draws_executed),
            dispatches_executed: load(&counters.dispatches_executed),
            drawables_acquired: load(&counters.drawables_acquired),
            drawables_presented: load(&counters.drawables_presented),
            validation_errors: load(&counters.validation_errors),
        }
    }

    /// Returns every executed command, if the device records them.
    pub fn command_log(&self) -> Vec<(CommandBufferId, RecordedCommand)> {
        self.internal
            .shared
            .command_log
            .as_ref()
            .map(|log| log.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// Forgets the recorded commands.
    pub fn clear_command_log(&self) {
        if let Some(log) = &self.internal.shared.command_log {
            log.lock().unwrap().clear();
        }
    }

    /// Returns a copy of a buffer's contents.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        let buffers = self.internal.shared.buffers.lock().unwrap();
        buffers.get(&id).map(|entry| entry.data.clone())
    }

    /// Number of committed command buffers not executed yet.
    pub fn pending_command_buffers(&self) -> usize {
        let committed = self
            .internal
            .shared
            .counters
            .command_buffers_committed
            .load(Ordering::Acquire);
        committed.saturating_sub(self.internal.shared.completed()) as usize
    }

    /// Executes the oldest pending command buffer. Returns `false` when none is pending.
    ///
    /// Only meaningful on a [`TimelineMode::Manual`](super::TimelineMode::Manual) device.
    pub fn complete_next(&self) -> bool {
        self.internal.queue.complete_next()
    }

    /// Executes every pending command buffer and returns how many ran.
    pub fn complete_all(&self) -> usize {
        self.internal.queue.complete_all()
    }

    /// Blocks until every committed command buffer has completed.
    pub fn wait_idle(&self) {
        self.internal.queue.wait_idle();
    }

    pub(crate) fn internal(&self) -> &Arc<HeadlessDeviceInternal> {
        &self.internal
    }

    fn generate_id(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "Strata Headless Device"
    }

    fn supports_feature(&self, feature: DeviceFeature) -> bool {
        self.internal.config.features.contains(&feature)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::BackendError(format!(
                "buffer '{}' has a size of zero",
                descriptor.label.as_deref().unwrap_or("Unnamed")
            )));
        }
        let id = BufferId(Self::generate_id(&self.internal.next_buffer_id));
        self.internal.shared.buffers.lock().unwrap().insert(
            id,
            HeadlessBufferEntry {
                label: label_of(&descriptor.label),
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        log::trace!(
            "HeadlessDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or("Unnamed"),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds {
                offset: 0,
                len: data.len() as u64,
                size: descriptor.size,
            });
        }
        let id = self.create_buffer(descriptor)?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.internal.shared.buffers.lock().unwrap().remove(&id) {
            Some(entry) => {
                log::trace!(
                    "HeadlessDevice: Destroyed buffer '{}' ({:?})",
                    entry.label.as_deref().unwrap_or("Unnamed"),
                    id
                );
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.internal.shared.buffers.lock().unwrap();
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let size = entry.data.len() as u64;
        let start = offset as usize;
        let target = entry
            .data
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds {
                offset,
                len: data.len() as u64,
                size,
            })?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let buffers = self.internal.shared.buffers.lock().unwrap();
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let source = entry
            .data
            .get(start..start + out.len())
            .ok_or(ResourceError::OutOfBounds {
                offset,
                len: out.len() as u64,
                size: entry.data.len() as u64,
            })?;
        out.copy_from_slice(source);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let name = descriptor.label.as_deref().unwrap_or("Unnamed");
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(ResourceError::BackendError(format!(
                "texture '{name}' has a zero extent"
            )));
        }
        if descriptor.mip_level_count == 0 || descriptor.array_layer_count == 0 {
            return Err(ResourceError::BackendError(format!(
                "texture '{name}' needs at least one mip level and one layer"
            )));
        }
        if descriptor.sample_count.is_multisampled() && descriptor.mip_level_count > 1 {
            return Err(ResourceError::BackendError(format!(
                "multisampled texture '{name}' cannot have mip levels"
            )));
        }
        let id = TextureId(Self::generate_id(&self.internal.next_texture_id));
        self.internal.shared.textures.lock().unwrap().insert(
            id,
            HeadlessTextureEntry {
                label: label_of(&descriptor.label),
                format: descriptor.format,
                size: descriptor.size,
                sample_count: descriptor.sample_count,
                usage: descriptor.usage,
            },
        );
        log::trace!(
            "HeadlessDevice: Created texture '{}' with ID: {:?} ({}x{} {:?})",
            name,
            id,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.internal
            .shared
            .textures
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        if descriptor.max_anisotropy == 0 {
            return Err(ResourceError::BackendError(
                "max_anisotropy must be at least 1".to_string(),
            ));
        }
        let id = SamplerId(Self::generate_id(&self.internal.next_sampler_id));
        self.internal
            .samplers
            .lock()
            .unwrap()
            .insert(id, label_of(&descriptor.label));
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.internal
            .samplers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_shader_function(
        &self,
        descriptor: &ShaderFunctionDescriptor,
    ) -> Result<ShaderFunctionId, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or("Unnamed").to_string();
        if descriptor.bytecode.is_empty() {
            return Err(ShaderError::CompilationError {
                label,
                details: "empty bytecode".to_string(),
            }
            .into());
        }
        if descriptor.entry_point.is_empty() {
            return Err(ShaderError::InvalidEntryPoint {
                label,
                entry_point: descriptor.entry_point.to_string(),
            }
            .into());
        }
        let id = ShaderFunctionId(Self::generate_id(&self.internal.next_shader_id));
        self.internal.shader_functions.lock().unwrap().insert(
            id,
            HeadlessShaderFunctionEntry {
                label: label_of(&descriptor.label),
                stage: descriptor.stage,
            },
        );
        log::debug!(
            "HeadlessDevice: Created {:?} function '{}' ({}) with ID: {:?}",
            descriptor.stage,
            label,
            descriptor.entry_point,
            id
        );
        Ok(id)
    }

    fn destroy_shader_function(&self, id: ShaderFunctionId) -> Result<(), ResourceError> {
        let entry = self
            .internal
            .shader_functions
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(ShaderError::NotFound { id })?;
        log::debug!(
            "HeadlessDevice: Destroyed {:?} function '{}' ({:?})",
            entry.stage,
            entry.label.as_deref().unwrap_or("Unnamed"),
            id
        );
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let pipeline_label = label_of(&descriptor.label);
        {
            let functions = self.internal.shader_functions.lock().unwrap();
            let check = |id: ShaderFunctionId, stage: ShaderStage| match functions.get(&id) {
                Some(entry) if entry.stage == stage => Ok(()),
                _ => Err(PipelineError::InvalidShaderFunction {
                    id,
                    pipeline_label: pipeline_label.clone(),
                }),
            };
            check(descriptor.vertex_function, ShaderStage::Vertex)?;
            if let Some(pixel) = descriptor.pixel_function {
                check(pixel, ShaderStage::Pixel)?;
            }
        }
        for (slot, target) in descriptor.color_targets.iter().enumerate() {
            if let Some(target) = target {
                if target.format.is_depth_stencil() {
                    return Err(PipelineError::IncompatibleColorTarget(format!(
                        "{:?} cannot be used as color target {slot}",
                        target.format
                    ))
                    .into());
                }
            }
        }
        if let Some(format) = descriptor.depth_format {
            if !format.has_depth() {
                return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                    "{format:?} has no depth aspect"
                ))
                .into());
            }
        }
        if let Some(format) = descriptor.stencil_format {
            if !format.has_stencil() {
                return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                    "{format:?} has no stencil aspect"
                ))
                .into());
            }
        }

        let id = RenderPipelineId(Self::generate_id(&self.internal.next_pipeline_id));
        self.internal
            .shared
            .render_pipelines
            .lock()
            .unwrap()
            .insert(
                id,
                HeadlessPipelineEntry {
                    label: pipeline_label.clone(),
                },
            );
        self.internal
            .shared
            .counters
            .render_pipelines_created
            .fetch_add(1, Ordering::Relaxed);
        log::info!(
            "HeadlessDevice: Created render pipeline '{}' with ID: {:?}",
            pipeline_label.as_deref().unwrap_or("Unnamed"),
            id
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.internal
            .shared
            .render_pipelines
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::InvalidRenderPipeline { id }.into())
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let pipeline_label = label_of(&descriptor.label);
        let valid = matches!(
            self.internal
                .shader_functions
                .lock()
                .unwrap()
                .get(&descriptor.function),
            Some(entry) if entry.stage == ShaderStage::Compute
        );
        if !valid {
            return Err(PipelineError::InvalidShaderFunction {
                id: descriptor.function,
                pipeline_label,
            }
            .into());
        }
        let id = ComputePipelineId(Self::generate_id(&self.internal.next_compute_pipeline_id));
        self.internal
            .shared
            .compute_pipelines
            .lock()
            .unwrap()
            .insert(
                id,
                HeadlessPipelineEntry {
                    label: pipeline_label.clone(),
                },
            );
        self.internal
            .shared
            .counters
            .compute_pipelines_created
            .fetch_add(1, Ordering::Relaxed);
        log::info!(
            "HeadlessDevice: Created compute pipeline '{}' with ID: {:?}",
            pipeline_label.as_deref().unwrap_or("Unnamed"),
            id
        );
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.internal
            .shared
            .compute_pipelines
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_buffer(&self, label: Option<&str>) -> Box<dyn CommandBuffer> {
        let id = CommandBufferId(
            self.internal
                .next_command_buffer_id
                .fetch_add(1, Ordering::Relaxed),
        );
        self.internal
            .shared
            .counters
            .command_buffers_created
            .fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "HeadlessDevice: Created command buffer '{}' ({:?})",
            label.unwrap_or("Unnamed"),
            id
        );
        Box::new(HeadlessCommandBuffer::new(
            id,
            label.map(str::to_string),
            self.clone(),
        ))
    }

    fn next_drawable(&self) -> Result<Drawable, RenderError> {
        let mut surface = self.internal.surface.lock().unwrap();
        if surface.drawables.is_empty() {
            return Err(RenderError::SurfaceAcquisitionFailed(
                "the surface has a zero extent".to_string(),
            ));
        }
        let slot = surface.next_slot % surface.drawables.len();
        surface.next_slot = surface.next_slot.wrapping_add(1);
        let id = self
            .internal
            .shared
            .counters
            .drawables_acquired
            .fetch_add(1, Ordering::Relaxed);
        Ok(Drawable {
            id: DrawableId(id as usize),
            texture: surface.drawables[slot],
            size: surface.extent,
        })
    }

    fn surface_format(&self) -> PixelFormat {
        self.internal.config.surface_format
    }

    fn surface_extent(&self) -> Extent2D {
        self.internal.surface.lock().unwrap().extent
    }

    fn resize_surface(&self, width: u32, height: u32) {
        log::info!("HeadlessDevice: Resizing surface to {width}x{height}");
        if let Err(e) = self.recreate_drawables(Extent2D { width, height }) {
            log::error!("HeadlessDevice: Failed to recreate drawables: {e}");
        }
    }
}
