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

//! Defines data structures related to textures, samplers and drawables.

use crate::renderer::api::state::CompareFunction;
use crate::renderer::api::util::{PixelFormat, SampleCount};
use crate::strata_bitflags;
use std::borrow::Cow;

strata_bitflags! {
    /// A set of flags describing how a texture will be used.
    pub struct TextureUsage: u32 {
        /// The texture can be sampled from shaders.
        const SHADER_READ = 1 << 0;
        /// The texture can be written from shaders.
        const SHADER_WRITE = 1 << 1;
        /// The texture can be used as a color or depth/stencil attachment.
        const RENDER_TARGET = 1 << 2;
        /// The texture can be handed to the display.
        const PRESENTABLE = 1 << 3;
    }
}

/// A two-dimensional size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label for the texture.
    pub label: Option<Cow<'a, str>>,
    /// The size of mip level 0.
    pub size: Extent2D,
    /// The number of array layers (6 for a cube map).
    pub array_layer_count: u32,
    /// The number of mip levels.
    pub mip_level_count: u32,
    /// The number of samples per texel.
    pub sample_count: SampleCount,
    /// The texel format.
    pub format: PixelFormat,
    /// How the texture will be used.
    pub usage: TextureUsage,
}

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// An opaque handle to a sampler state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

/// An opaque handle to a presentable drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawableId(pub usize);

/// A drawable handed out by the display surface for one frame.
///
/// The texture is only valid until the drawable is presented or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawable {
    /// The drawable handle, used to schedule its presentation.
    pub id: DrawableId,
    /// The texture backing the drawable.
    pub texture: TextureId,
    /// The drawable size.
    pub size: Extent2D,
}

/// Texel filtering used when sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Linear interpolation between texels.
    Linear,
}

/// Addressing used for texture coordinates outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
    /// Repeat the texture, mirroring every other tile.
    MirrorRepeat,
}

/// A declarative description of a sampler state object.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing along U.
    pub address_mode_u: AddressMode,
    /// Addressing along V.
    pub address_mode_v: AddressMode,
    /// Addressing along W.
    pub address_mode_w: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mip levels.
    pub mip_filter: FilterMode,
    /// Minimum level of detail.
    pub lod_min_clamp: f32,
    /// Maximum level of detail.
    pub lod_max_clamp: f32,
    /// Maximum anisotropy, 1 disables anisotropic filtering.
    pub max_anisotropy: u16,
    /// Optional comparison for shadow samplers.
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::default(),
            address_mode_v: AddressMode::default(),
            address_mode_w: AddressMode::default(),
            mag_filter: FilterMode::default(),
            min_filter: FilterMode::default(),
            mip_filter: FilterMode::default(),
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            max_anisotropy: 1,
            compare: None,
        }
    }
}
