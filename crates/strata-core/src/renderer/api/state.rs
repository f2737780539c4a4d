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

//! Fixed-function state initializers: blending, rasterization, depth/stencil,
//! viewport and scissor.
//!
//! These are declarative value types. The command-submission layer shadows them
//! and only forwards the fields that changed to the active encoder.

use crate::renderer::api::pipeline::MAX_RENDER_TARGETS;
use crate::strata_bitflags;

/// A multiplier applied to a blend source or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    /// `0.0`
    Zero,
    /// `1.0`
    #[default]
    One,
    /// The source color.
    SrcColor,
    /// `1 - source color`
    OneMinusSrcColor,
    /// The source alpha.
    SrcAlpha,
    /// `1 - source alpha`
    OneMinusSrcAlpha,
    /// The destination color.
    DstColor,
    /// `1 - destination color`
    OneMinusDstColor,
    /// The destination alpha.
    DstAlpha,
    /// `1 - destination alpha`
    OneMinusDstAlpha,
    /// The constant blend color.
    BlendColor,
    /// `1 - constant blend color`
    OneMinusBlendColor,
}

/// The operation combining the weighted source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    /// `src + dst`
    #[default]
    Add,
    /// `src - dst`
    Subtract,
    /// `dst - src`
    ReverseSubtract,
    /// `min(src, dst)`
    Min,
    /// `max(src, dst)`
    Max,
}

strata_bitflags! {
    /// The color channels a render target writes.
    pub struct ColorWrites: u8 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
    }
}

/// The blend equation of one channel group (color or alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Factor applied to the source.
    pub src_factor: BlendFactor,
    /// Factor applied to the destination.
    pub dst_factor: BlendFactor,
    /// Operation combining both terms.
    pub operation: BlendOperation,
}

impl BlendComponent {
    /// `src * 1 + dst * 0`, i.e. blending disabled.
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };

    /// Classic alpha blending, `src * a + dst * (1 - a)`.
    pub const ALPHA_BLENDING: Self = Self {
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self::REPLACE
    }
}

/// The blend configuration of a single render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlendState {
    /// Whether blending is performed at all.
    pub blend_enabled: bool,
    /// The color channel equation.
    pub color: BlendComponent,
    /// The alpha channel equation.
    pub alpha: BlendComponent,
    /// Channels written to the target.
    pub write_mask: ColorWrites,
}

impl RenderTargetBlendState {
    /// Blending off, every channel written.
    pub const OPAQUE: Self = Self {
        blend_enabled: false,
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
        write_mask: ColorWrites::all(),
    };

    /// Alpha blending on color and alpha.
    pub const ALPHA_BLEND: Self = Self {
        blend_enabled: true,
        color: BlendComponent::ALPHA_BLENDING,
        alpha: BlendComponent::ALPHA_BLENDING,
        write_mask: ColorWrites::all(),
    };
}

impl Default for RenderTargetBlendState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// The blend configuration of every render target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendState {
    /// Per-slot blend configuration.
    pub render_targets: [RenderTargetBlendState; MAX_RENDER_TARGETS],
}

impl BlendState {
    /// Uses the same configuration for every slot.
    pub fn uniform(state: RenderTargetBlendState) -> Self {
        Self {
            render_targets: [state; MAX_RENDER_TARGETS],
        }
    }
}

/// Which faces are discarded by the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    #[default]
    None,
    /// Front faces are culled.
    Front,
    /// Back faces are culled.
    Back,
}

/// How triangles are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Triangles are filled.
    #[default]
    Solid,
    /// Only triangle edges are drawn.
    Wireframe,
}

/// The vertex winding that identifies a front face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    /// Clockwise triangles face forward.
    Clockwise,
    /// Counter-clockwise triangles face forward.
    CounterClockwise,
}

/// A declarative description of the rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerState {
    /// Fill mode.
    pub fill_mode: FillMode,
    /// Cull mode.
    pub cull_mode: CullMode,
    /// Constant depth bias.
    pub depth_bias: f32,
    /// Depth bias scaled by the polygon slope.
    pub slope_scale_depth_bias: f32,
}

/// A comparison used by depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less or equal.
    LessEqual,
    /// Passes if the new value is greater.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the new value is greater or equal.
    GreaterEqual,
    /// Always passes.
    #[default]
    Always,
}

/// What happens to a stencil value after a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Replace with the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    IncrementClamp,
    /// Decrement, clamping at zero.
    DecrementClamp,
    /// Bitwise invert.
    Invert,
    /// Increment, wrapping to zero.
    IncrementWrap,
    /// Decrement, wrapping to the maximum.
    DecrementWrap,
}

/// Stencil test configuration of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilFaceState {
    /// Comparison against the reference value.
    pub compare: CompareFunction,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes but the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
}

/// A declarative description of the depth/stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Whether depth values are written.
    pub depth_write_enabled: bool,
    /// The depth test.
    pub depth_compare: CompareFunction,
    /// Whether the stencil test runs.
    pub stencil_enabled: bool,
    /// Stencil state of front faces.
    pub front: StencilFaceState,
    /// Stencil state of back faces.
    pub back: StencilFaceState,
    /// Mask applied when reading stencil values.
    pub read_mask: u8,
    /// Mask applied when writing stencil values.
    pub write_mask: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            stencil_enabled: false,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
            read_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

/// The viewport transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}
