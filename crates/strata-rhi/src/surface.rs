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

//! Render-target surfaces.

use crate::frame::release::{GpuObject, ReleaseSender};
use std::borrow::Cow;
use std::sync::Mutex;
use strata_core::renderer::{
    Extent2D, GraphicsDevice, PixelFormat, ResourceError, SampleCount, TextureDescriptor, TextureId,
    TextureUsage,
};

/// Where the texture of a [`Surface`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// A texture owned by the surface.
    Texture,
    /// The back buffer: its texture is the drawable acquired for the current
    /// frame and changes every frame.
    BackBuffer,
}

/// A texture usable as a render target and as a shader resource.
///
/// Multisampled surfaces own two textures: the multisampled one rendered to and
/// a single-sampled one receiving the resolve, which is also what shaders
/// sample.
#[derive(Debug)]
pub struct Surface {
    label: String,
    kind: SurfaceKind,
    format: PixelFormat,
    size: Extent2D,
    sample_count: SampleCount,
    mip_level_count: u32,
    array_layer_count: u32,
    texture: Mutex<Option<TextureId>>,
    msaa_texture: Option<TextureId>,
    release: Option<ReleaseSender>,
}

impl Surface {
    /// Creates the textures of a render-target surface.
    pub fn new(
        device: &dyn GraphicsDevice,
        descriptor: &TextureDescriptor,
        release: ReleaseSender,
    ) -> Result<Self, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or("surface").to_string();
        let usage = descriptor.usage | TextureUsage::RENDER_TARGET;
        let texture = device.create_texture(&TextureDescriptor {
            sample_count: SampleCount::X1,
            usage: usage | TextureUsage::SHADER_READ,
            ..descriptor.clone()
        })?;

        let msaa_texture = if descriptor.sample_count.is_multisampled() {
            let msaa_label = format!("{label} (msaa)");
            match device.create_texture(&TextureDescriptor {
                label: Some(Cow::Owned(msaa_label)),
                usage,
                mip_level_count: 1,
                ..descriptor.clone()
            }) {
                Ok(id) => Some(id),
                Err(e) => {
                    release.release(GpuObject::Texture(texture));
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!(
            "Surface: Created '{label}' {}x{} {:?} x{}",
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format,
            descriptor.sample_count.count()
        );

        Ok(Self {
            label,
            kind: SurfaceKind::Texture,
            format: descriptor.format,
            size: descriptor.size,
            sample_count: descriptor.sample_count,
            mip_level_count: descriptor.mip_level_count.max(1),
            array_layer_count: descriptor.array_layer_count.max(1),
            texture: Mutex::new(Some(texture)),
            msaa_texture,
            release: Some(release),
        })
    }

    /// Creates the back-buffer surface. It has no texture until a drawable is
    /// acquired.
    pub fn back_buffer(format: PixelFormat, size: Extent2D) -> Self {
        Self {
            label: "back buffer".to_string(),
            kind: SurfaceKind::BackBuffer,
            format,
            size,
            sample_count: SampleCount::X1,
            mip_level_count: 1,
            array_layer_count: 1,
            texture: Mutex::new(None),
            msaa_texture: None,
            release: None,
        }
    }

    /// The single-sampled texture, if one is attached.
    pub fn texture(&self) -> Option<TextureId> {
        *self.texture.lock().unwrap()
    }

    pub(crate) fn set_texture(&self, texture: Option<TextureId>) {
        debug_assert_eq!(self.kind, SurfaceKind::BackBuffer);
        *self.texture.lock().unwrap() = texture;
    }

    /// The multisampled texture rendered to, if the surface is multisampled.
    pub fn msaa_texture(&self) -> Option<TextureId> {
        self.msaa_texture
    }

    /// `true` for the back buffer.
    pub fn is_back_buffer(&self) -> bool {
        self.kind == SurfaceKind::BackBuffer
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The size of mip 0.
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// The size of `mip_level`, clamped to one pixel.
    pub fn mip_size(&self, mip_level: u32) -> Extent2D {
        Extent2D {
            width: (self.size.width >> mip_level).max(1),
            height: (self.size.height >> mip_level).max(1),
        }
    }

    /// Samples per pixel of the render target.
    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    /// The number of mip levels.
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    /// The number of array layers.
    pub fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        let Some(release) = &self.release else {
            return;
        };
        if let Some(texture) = self.texture.get_mut().ok().and_then(|t| t.take()) {
            release.release(GpuObject::Texture(texture));
        }
        if let Some(texture) = self.msaa_texture.take() {
            release.release(GpuObject::Texture(texture));
        }
    }
}
