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

//! Render-target sets and the decision to reopen the graphics encoder.

use crate::surface::Surface;
use std::sync::Arc;
use strata_core::renderer::{
    BufferId, Extent2D, LinearRgba, Operations, PixelFormat, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, SampleCount, StoreOp, MAX_RENDER_TARGETS,
};

/// One color attachment of a render-target set.
#[derive(Debug, Clone)]
pub struct RenderTargetView {
    /// The surface rendered to.
    pub surface: Arc<Surface>,
    /// The mip level rendered to.
    pub mip_level: u32,
    /// The array slice rendered to.
    pub array_slice: u32,
    /// Load and store actions.
    pub ops: Operations<LinearRgba>,
}

impl RenderTargetView {
    /// Renders to mip 0, slice 0, loading existing contents.
    pub fn new(surface: Arc<Surface>) -> Self {
        Self {
            surface,
            mip_level: 0,
            array_slice: 0,
            ops: Operations::load_store(),
        }
    }

    /// Renders to mip 0, slice 0, clearing to `color` first.
    pub fn cleared(surface: Arc<Surface>, color: LinearRgba) -> Self {
        Self {
            ops: Operations::clear_store(color),
            ..Self::new(surface)
        }
    }
}

/// The depth/stencil attachment of a render-target set.
#[derive(Debug, Clone)]
pub struct DepthStencilTargetView {
    /// The surface rendered to.
    pub surface: Arc<Surface>,
    /// Depth load and store actions.
    pub depth_ops: Operations<f32>,
    /// Stencil load and store actions.
    pub stencil_ops: Operations<u32>,
}

impl DepthStencilTargetView {
    /// Clears depth to 1 and stencil to 0.
    pub fn cleared(surface: Arc<Surface>) -> Self {
        Self {
            surface,
            depth_ops: Operations::clear_store(1.0),
            stencil_ops: Operations::clear_store(0),
        }
    }
}

/// A full set of render targets.
///
/// The empty set is a sentinel meaning "nothing to render to", typically
/// issued at the end of a frame, and never causes an encoder change.
#[derive(Debug, Clone, Default)]
pub struct RenderTargetsInfo {
    /// Color attachments, in slot order.
    pub color_targets: Vec<RenderTargetView>,
    /// The depth/stencil attachment.
    pub depth_stencil: Option<DepthStencilTargetView>,
}

impl RenderTargetsInfo {
    /// A single color target.
    pub fn single(target: RenderTargetView) -> Self {
        Self {
            color_targets: vec![target],
            depth_stencil: None,
        }
    }

    /// `true` for the empty sentinel.
    pub fn is_unbind(&self) -> bool {
        self.color_targets.is_empty() && self.depth_stencil.is_none()
    }
}

/// Decides whether `new` requires ending the current graphics encoder and
/// opening one on the new attachments.
///
/// No new encoder is needed when the color target count matches, the depth
/// surface is the same (or `new` has none), and every color slot points at the
/// same surface, mip and slice without asking for a clear. Store actions are
/// not compared. With no previous set, a new encoder is always needed, except
/// for the empty sentinel.
pub fn needs_new_encoder(previous: Option<&RenderTargetsInfo>, new: &RenderTargetsInfo) -> bool {
    if new.is_unbind() {
        return false;
    }
    let Some(previous) = previous else {
        return true;
    };
    if previous.color_targets.len() != new.color_targets.len() {
        return true;
    }
    let depth_unchanged = match (&previous.depth_stencil, &new.depth_stencil) {
        (_, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(&a.surface, &b.surface),
        (None, Some(_)) => false,
    };
    if !depth_unchanged {
        return true;
    }
    previous
        .color_targets
        .iter()
        .zip(&new.color_targets)
        .any(|(old, new)| {
            !Arc::ptr_eq(&old.surface, &new.surface)
                || old.mip_level != new.mip_level
                || old.array_slice != new.array_slice
                || new.ops.load.is_clear()
        })
}

/// The pipeline-relevant formats of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassFormats {
    /// Color formats per slot.
    pub color: [Option<PixelFormat>; MAX_RENDER_TARGETS],
    /// The depth format, if the attachment has depth.
    pub depth: Option<PixelFormat>,
    /// The stencil format, if the attachment has stencil.
    pub stencil: Option<PixelFormat>,
    /// Samples per pixel.
    pub sample_count: SampleCount,
}

/// A render pass ready to be opened.
#[derive(Debug, Clone)]
pub struct RenderPass {
    /// The pass descriptor.
    pub descriptor: RenderPassDescriptor,
    /// Formats for the pipeline key.
    pub formats: PassFormats,
    /// The size of the first attachment at its mip level.
    pub extent: Extent2D,
}

/// Builds the render pass of `info`.
///
/// Returns `None` if a color surface has no texture attached (a back buffer
/// without a drawable). Multisampled surfaces render into their multisampled
/// texture and resolve into the single-sampled one.
///
/// # Panics
///
/// Panics if a multisampled surface is used with more than one color target, or
/// more than `MAX_RENDER_TARGETS` color targets are given.
pub fn build_render_pass(info: &RenderTargetsInfo, visibility_buffer: Option<BufferId>) -> Option<RenderPass> {
    assert!(
        info.color_targets.len() <= MAX_RENDER_TARGETS,
        "{} color targets exceed the maximum of {MAX_RENDER_TARGETS}",
        info.color_targets.len()
    );

    let mut formats = PassFormats::default();
    let mut color_attachments = Vec::with_capacity(info.color_targets.len());
    let mut extent = None;
    let mut sample_count = None;

    for (slot, target) in info.color_targets.iter().enumerate() {
        let surface = &target.surface;
        let texture = surface.texture()?;
        let attachment = match surface.msaa_texture() {
            Some(msaa) => {
                assert!(
                    info.color_targets.len() == 1,
                    "multisampled rendering supports a single color target"
                );
                RenderPassColorAttachment {
                    texture: msaa,
                    resolve_target: Some(texture),
                    mip_level: 0,
                    array_slice: target.array_slice,
                    ops: Operations {
                        load: target.ops.load,
                        store: StoreOp::MultisampleResolve,
                    },
                }
            }
            None => RenderPassColorAttachment {
                texture,
                resolve_target: None,
                mip_level: target.mip_level,
                array_slice: target.array_slice,
                ops: target.ops,
            },
        };
        color_attachments.push(attachment);
        formats.color[slot] = Some(surface.format());
        extent.get_or_insert_with(|| surface.mip_size(target.mip_level));
        sample_count.get_or_insert(surface.sample_count());
    }

    let depth_stencil_attachment = match &info.depth_stencil {
        Some(view) => {
            let surface = &view.surface;
            let texture = surface.msaa_texture().or(surface.texture())?;
            let format = surface.format();
            formats.depth = format.has_depth().then_some(format);
            formats.stencil = format.has_stencil().then_some(format);
            extent.get_or_insert_with(|| surface.size());
            sample_count.get_or_insert(surface.sample_count());
            Some(RenderPassDepthStencilAttachment {
                texture,
                depth_ops: format.has_depth().then_some(view.depth_ops),
                stencil_ops: format.has_stencil().then_some(view.stencil_ops),
            })
        }
        None => None,
    };

    formats.sample_count = sample_count.unwrap_or_default();
    let label = info
        .color_targets
        .first()
        .map(|t| t.surface.label().to_string())
        .or_else(|| info.depth_stencil.as_ref().map(|d| d.surface.label().to_string()));

    Some(RenderPass {
        descriptor: RenderPassDescriptor {
            label,
            color_attachments,
            depth_stencil_attachment,
            visibility_result_buffer: visibility_buffer,
        },
        formats,
        extent: extent.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::release::DeferredReleaseQueue;
    use crate::mock::MockGraphicsDevice;
    use std::borrow::Cow;
    use strata_core::renderer::{LoadOp, TextureDescriptor, TextureUsage};

    struct Fixture {
        device: MockGraphicsDevice,
        queue: DeferredReleaseQueue,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                device: MockGraphicsDevice::new(),
                queue: DeferredReleaseQueue::new(),
            }
        }

        fn surface(&self, format: PixelFormat, samples: SampleCount) -> Arc<Surface> {
            Arc::new(
                Surface::new(
                    &self.device,
                    &TextureDescriptor {
                        label: Some(Cow::Borrowed("target")),
                        size: Extent2D {
                            width: 320,
                            height: 200,
                        },
                        array_layer_count: 1,
                        mip_level_count: 2,
                        sample_count: samples,
                        format,
                        usage: TextureUsage::SHADER_READ,
                    },
                    self.queue.sender(),
                )
                .unwrap(),
            )
        }
    }

    #[test]
    fn test_identical_load_targets_keep_the_encoder() {
        let f = Fixture::new();
        let color = f.surface(PixelFormat::Rgba8Unorm, SampleCount::X1);
        let info = RenderTargetsInfo::single(RenderTargetView::new(color));
        assert!(needs_new_encoder(None, &info));
        assert!(!needs_new_encoder(Some(&info), &info));
    }

    #[test]
    fn test_clear_mip_and_surface_changes_need_a_new_encoder() {
        let f = Fixture::new();
        let color = f.surface(PixelFormat::Rgba8Unorm, SampleCount::X1);
        let other = f.surface(PixelFormat::Rgba8Unorm, SampleCount::X1);
        let base = RenderTargetsInfo::single(RenderTargetView::new(color.clone()));

        let cleared = RenderTargetsInfo::single(RenderTargetView::cleared(color.clone(), LinearRgba::BLACK));
        assert!(needs_new_encoder(Some(&base), &cleared));

        let mut mip = RenderTargetView::new(color.clone());
        mip.mip_level = 1;
        assert!(needs_new_encoder(Some(&base), &RenderTargetsInfo::single(mip)));

        assert!(needs_new_encoder(Some(&base), &RenderTargetsInfo::single(RenderTargetView::new(other))));
    }

    #[test]
    fn test_store_action_is_not_compared() {
        let f = Fixture::new();
        let color = f.surface(PixelFormat::Rgba8Unorm, SampleCount::X1);
        let base = RenderTargetsInfo::single(RenderTargetView::new(color.clone()));
        let mut discard = RenderTargetView::new(color);
        discard.ops.store = StoreOp::Discard;
        assert!(!needs_new_encoder(Some(&base), &RenderTargetsInfo::single(discard)));
    }

    #[test]
    fn test_dropping_the_depth_target_keeps_the_encoder() {
        let f = Fixture::new();
        let color = f.surface(PixelFormat::Rgba8Unorm, SampleCount::X1);
        let depth = f.surface(PixelFormat::Depth32Float, SampleCount::X1);
        let with_depth = RenderTargetsInfo {
            color_targets: vec![RenderTargetView::new(color.clone())],
            depth_stencil: Some(DepthStencilTargetView::cleared(depth)),
        };
        let without = RenderTargetsInfo::single(RenderTargetView::new(color));
        assert!(!needs_new_encoder(Some(&with_depth), &without));
        assert!(needs_new_encoder(Some(&without), &with_depth));
    }

    #[test]
    fn test_unbind_sentinel_is_a_no_op() {
        assert!(!needs_new_encoder(None, &RenderTargetsInfo::default()));
    }

    #[test]
    fn test_msaa_pass_resolves_into_the_surface_texture() {
        let f = Fixture::new();
        let color = f.surface(PixelFormat::Rgba16Float, SampleCount::X4);
        let pass = build_render_pass(
            &RenderTargetsInfo::single(RenderTargetView::cleared(color.clone(), LinearRgba::BLACK)),
            None,
        )
        .unwrap();
        let attachment = &pass.descriptor.color_attachments[0];
        assert_eq!(Some(attachment.texture), color.msaa_texture());
        assert_eq!(attachment.resolve_target, color.texture());
        assert_eq!(attachment.ops.store, StoreOp::MultisampleResolve);
        assert!(matches!(attachment.ops.load, LoadOp::Clear(_)));
        assert_eq!(pass.formats.sample_count, SampleCount::X4);
    }

    #[test]
    fn test_depth_only_pass_takes_samples_and_formats_from_depth() {
        let f = Fixture::new();
        let depth = f.surface(PixelFormat::Depth24PlusStencil8, SampleCount::X1);
        let pass = build_render_pass(
            &RenderTargetsInfo {
                color_targets: Vec::new(),
                depth_stencil: Some(DepthStencilTargetView::cleared(depth)),
            },
            Some(BufferId(77)),
        )
        .unwrap();
        assert_eq!(pass.formats.depth, Some(PixelFormat::Depth24PlusStencil8));
        assert_eq!(pass.formats.stencil, Some(PixelFormat::Depth24PlusStencil8));
        assert_eq!(pass.descriptor.visibility_result_buffer, Some(BufferId(77)));
        let attachment = pass.descriptor.depth_stencil_attachment.unwrap();
        assert!(attachment.depth_ops.is_some() && attachment.stencil_ops.is_some());
        assert_eq!(pass.extent.width, 320);
    }

    #[test]
    fn test_back_buffer_without_drawable_builds_nothing() {
        let back_buffer = Arc::new(Surface::back_buffer(PixelFormat::Bgra8Unorm, Extent2D::default()));
        let info = RenderTargetsInfo::single(RenderTargetView::new(back_buffer));
        assert!(build_render_pass(&info, None).is_none());
    }
}
