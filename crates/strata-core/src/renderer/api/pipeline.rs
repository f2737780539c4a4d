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

//! Defines the descriptors of render and compute pipeline objects.

use crate::renderer::api::shader::ShaderFunctionId;
use crate::renderer::api::state::RenderTargetBlendState;
use crate::renderer::api::util::{PixelFormat, SampleCount};
use std::borrow::Cow;

/// The maximum number of simultaneous color render targets.
pub const MAX_RENDER_TARGETS: usize = 6;

/// The maximum number of vertex streams that can be bound at once.
pub const MAX_VERTEX_STREAMS: usize = 16;

/// An opaque handle to a compiled render pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a compiled compute pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineId(pub usize);

/// The data type of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Four 8-bit normalized unsigned bytes.
    Unorm8x4,
    /// Four 32-bit unsigned integers.
    Uint32x4,
}

impl VertexFormat {
    /// Returns the size of the attribute in bytes.
    pub const fn size(&self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

/// How a vertex stream advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// One element per vertex.
    #[default]
    Vertex,
    /// One element per instance.
    Instance,
}

/// A single attribute of a vertex declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// The vertex stream the attribute is read from.
    pub stream_index: u32,
    /// Byte offset of the attribute within one element of the stream.
    pub offset: u32,
    /// The attribute data type.
    pub format: VertexFormat,
    /// The shader input location.
    pub attribute_index: u32,
    /// Byte stride of the stream.
    pub stride: u32,
    /// How the stream advances.
    pub step_mode: VertexStepMode,
}

/// The vertex input layout of a bound shader state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    /// All attributes, in declaration order.
    pub elements: Vec<VertexElement>,
}

impl VertexLayout {
    /// Creates a layout from its elements.
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }
}

/// The format and blend configuration of one color target of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetDescriptor {
    /// The attachment format.
    pub format: PixelFormat,
    /// The blend configuration.
    pub blend: RenderTargetBlendState,
}

/// A complete description of a render pipeline object.
///
/// This is everything the driver needs to compile the pipeline: shader
/// functions, vertex layout and the fixed-function state baked into it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label for the pipeline.
    pub label: Option<Cow<'a, str>>,
    /// The vertex function.
    pub vertex_function: ShaderFunctionId,
    /// The pixel function, if any.
    pub pixel_function: Option<ShaderFunctionId>,
    /// The vertex input layout.
    pub vertex_layout: VertexLayout,
    /// One entry per color slot. `None` marks an unused slot.
    pub color_targets: [Option<ColorTargetDescriptor>; MAX_RENDER_TARGETS],
    /// The depth attachment format, if any.
    pub depth_format: Option<PixelFormat>,
    /// The stencil attachment format, if any.
    pub stencil_format: Option<PixelFormat>,
    /// The rasterization sample count.
    pub sample_count: SampleCount,
}

/// A complete description of a compute pipeline object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineDescriptor<'a> {
    /// An optional debug label for the pipeline.
    pub label: Option<Cow<'a, str>>,
    /// The kernel function.
    pub function: ShaderFunctionId,
}
