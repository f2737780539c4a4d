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

//! Generic rendering enums.

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Returns the size of one index in bytes.
    pub const fn stride(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }

    /// Maps an index stride in bytes to a format. Anything but 2 is treated as 32-bit.
    pub const fn from_stride(stride: u32) -> Self {
        if stride == 2 {
            IndexFormat::Uint16
        } else {
            IndexFormat::Uint32
        }
    }
}

/// A programmable stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The pixel (fragment) shader stage.
    Pixel,
    /// The compute shader stage.
    Compute,
}

impl ShaderStage {
    /// The number of shader stages.
    pub const COUNT: usize = 3;

    /// All stages, in index order.
    pub const ALL: [ShaderStage; Self::COUNT] =
        [ShaderStage::Vertex, ShaderStage::Pixel, ShaderStage::Compute];

    /// Returns a dense index for per-stage tables.
    pub const fn index(&self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Pixel => 1,
            ShaderStage::Compute => 2,
        }
    }
}

/// The topology used to assemble vertices into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Every three vertices form a triangle.
    TriangleList,
    /// Each vertex after the first two forms a triangle with the previous two.
    TriangleStrip,
    /// Every two vertices form a line.
    LineList,
    /// Every vertex is a point.
    PointList,
    /// Every four vertices form a quad. Not every backend can draw these.
    QuadList,
}

impl PrimitiveType {
    /// Returns the number of vertices needed to draw `num_primitives` primitives,
    /// saturating at `u32::MAX`.
    pub const fn vertex_count(&self, num_primitives: u32) -> u32 {
        match self {
            PrimitiveType::TriangleList => num_primitives.saturating_mul(3),
            PrimitiveType::TriangleStrip => num_primitives.saturating_add(2),
            PrimitiveType::LineList => num_primitives.saturating_mul(2),
            PrimitiveType::PointList => num_primitives,
            PrimitiveType::QuadList => num_primitives.saturating_mul(4),
        }
    }
}

/// The pixel format of a texture or render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit per channel BGRA, normalized. The usual presentable format.
    Bgra8Unorm,
    /// 8-bit per channel RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit per channel RGBA, normalized, sRGB encoded.
    Rgba8UnormSrgb,
    /// 10-bit RGB with 2-bit alpha, normalized.
    Rgb10a2Unorm,
    /// 16-bit float per channel RGBA.
    Rgba16Float,
    /// 32-bit float per channel RGBA.
    Rgba32Float,
    /// 16-bit float red and green channels.
    Rg16Float,
    /// A single 32-bit float channel.
    R32Float,
    /// A single 8-bit normalized channel.
    R8Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with an 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit float depth with an 8-bit stencil.
    Depth32FloatStencil8,
    /// 8-bit stencil only.
    Stencil8,
}

impl PixelFormat {
    /// Returns `true` if the format carries a depth aspect.
    pub const fn has_depth(&self) -> bool {
        matches!(
            self,
            PixelFormat::Depth32Float
                | PixelFormat::Depth24PlusStencil8
                | PixelFormat::Depth32FloatStencil8
        )
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub const fn has_stencil(&self) -> bool {
        matches!(
            self,
            PixelFormat::Depth24PlusStencil8
                | PixelFormat::Depth32FloatStencil8
                | PixelFormat::Stencil8
        )
    }

    /// Returns `true` for depth and/or stencil formats.
    pub const fn is_depth_stencil(&self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    /// Returns the size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::R8Unorm | PixelFormat::Stencil8 => 1,
            PixelFormat::Bgra8Unorm
            | PixelFormat::Rgba8Unorm
            | PixelFormat::Rgba8UnormSrgb
            | PixelFormat::Rgb10a2Unorm
            | PixelFormat::Rg16Float
            | PixelFormat::R32Float
            | PixelFormat::Depth32Float
            | PixelFormat::Depth24PlusStencil8 => 4,
            PixelFormat::Depth32FloatStencil8 | PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
        }
    }
}

/// The number of samples per pixel for Multisample Anti-Aliasing (MSAA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    /// 1 sample per pixel (MSAA disabled).
    #[default]
    X1,
    /// 2 samples per pixel.
    X2,
    /// 4 samples per pixel.
    X4,
    /// 8 samples per pixel.
    X8,
    /// 16 samples per pixel.
    X16,
}

impl SampleCount {
    /// Returns the number of samples as an integer.
    pub const fn count(&self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
        }
    }

    /// Maps an integer sample count to the enum, if it is a supported value.
    pub const fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(SampleCount::X1),
            2 => Some(SampleCount::X2),
            4 => Some(SampleCount::X4),
            8 => Some(SampleCount::X8),
            16 => Some(SampleCount::X16),
            _ => None,
        }
    }

    /// Returns `true` if more than one sample is taken per pixel.
    pub const fn is_multisampled(&self) -> bool {
        !matches!(self, SampleCount::X1)
    }
}

/// Optional capabilities a device may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFeature {
    /// Draw and dispatch arguments can be sourced from a GPU buffer.
    IndirectBuffers,
    /// Occlusion counting through a visibility result buffer.
    OcclusionQueries,
    /// Triangles can be rasterized as lines.
    WireframeFill,
}

/// The physical type of a graphics device (GPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererDeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized or software-based GPU.
    VirtualGpu,
    /// A software renderer running on the CPU.
    Cpu,
    /// An unknown or unsupported device type.
    #[default]
    Unknown,
}
