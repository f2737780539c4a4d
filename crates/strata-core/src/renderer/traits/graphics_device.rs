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
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::CommandBuffer;
use std::fmt::Debug;

/// The main interface of a graphics backend.
///
/// All creation and destruction calls are thread-safe. Command recording goes
/// through the [`CommandBuffer`] objects the device hands out.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns a short human-readable name of the device.
    fn name(&self) -> &str;

    /// Checks whether an optional feature is available.
    fn supports_feature(&self, feature: DeviceFeature) -> bool;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - A reference to a `BufferDescriptor` containing the buffer configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    /// ## Arguments
    /// * `descriptor` - A reference to a `BufferDescriptor` containing the buffer configuration.
    /// * `data` - The initial contents. Must not be larger than the buffer.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - A slice of bytes containing the data to be written.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write does not fit in the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads data back from a CPU-visible GPU buffer.
    ///
    /// The caller is responsible for making sure the GPU is done writing the range.
    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError>;

    /// Creates a new GPU texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a sampler state object.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler state object.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a shader function from compiled bytecode.
    /// ## Errors
    /// * `ResourceError::Shader` - If the bytecode is rejected or the entry point is missing.
    fn create_shader_function(
        &self,
        descriptor: &ShaderFunctionDescriptor,
    ) -> Result<ShaderFunctionId, ResourceError>;

    /// Destroys a shader function.
    fn destroy_shader_function(&self, id: ShaderFunctionId) -> Result<(), ResourceError>;

    /// Compiles a render pipeline object.
    ///
    /// This is the expensive call the pipeline state cache exists to avoid.
    /// ## Arguments
    /// * `descriptor` - The shaders, vertex layout and fixed-function state to bake.
    /// ## Returns
    /// A `Result` containing the ID of the created render pipeline or an error if the creation fails.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the descriptor is invalid or incompatible with the device.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys a render pipeline object.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Compiles a compute pipeline object.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Destroys a compute pipeline object.
    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError>;

    /// Creates a new command buffer on the device's queue.
    ///
    /// Command buffers execute in the order they are committed.
    fn create_command_buffer(&self, label: Option<&str>) -> Box<dyn CommandBuffer>;

    /// Acquires the next presentable drawable of the display surface.
    /// ## Errors
    /// * `RenderError::SurfaceAcquisitionFailed` - If no drawable is available.
    fn next_drawable(&self) -> Result<Drawable, RenderError>;

    /// The pixel format of the display surface's drawables.
    fn surface_format(&self) -> PixelFormat;

    /// The current size of the display surface.
    fn surface_extent(&self) -> Extent2D;

    /// Resizes the display surface. Drawables acquired before the call keep their size.
    fn resize_surface(&self, width: u32, height: u32);
}
