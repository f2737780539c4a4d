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

//! Render targets and switching between graphics and compute encoding.

use super::RhiContext;
use crate::encoder::{ActiveEncoder, EncoderKind};
use crate::render_targets::{build_render_pass, needs_new_encoder, RenderPass, RenderTargetsInfo};
use crate::surface::Surface;
use std::sync::Arc;
use strata_core::renderer::{ScissorRect, ShaderStage, Viewport, VisibilityResultMode};

impl RhiContext {
    /// Binds a new set of render targets.
    ///
    /// Re-binding the targets already in use without clearing anything keeps
    /// the open encoder. Otherwise the current encoder is ended and committed
    /// and a new render encoder opens on a fresh command buffer. An unbind
    /// (no targets at all) is ignored.
    pub fn set_render_targets_info(&mut self, info: &RenderTargetsInfo) {
        self.conditional_switch_to_graphics();

        if info.is_unbind() {
            return;
        }
        if !needs_new_encoder(self.previous_render_targets.as_ref(), info) {
            return;
        }

        let had_encoder = self.encoder.kind() == EncoderKind::Graphics;
        if had_encoder && self.previous_targets_back_buffer() && self.drawable.is_some() {
            // The back buffer is being replaced; its drawable goes back unpresented.
            log::debug!("RhiContext: Releasing drawable of the replaced back buffer");
            self.drawable = None;
            self.back_buffer.set_texture(None);
        }
        self.previous_render_targets = Some(info.clone());

        if info
            .color_targets
            .iter()
            .any(|target| target.surface.is_back_buffer())
        {
            self.acquire_back_buffer_texture();
        }

        let Some(pass) = build_render_pass(info, Some(self.query_ring.buffer())) else {
            log::error!("RhiContext: Render targets have no texture attached, keeping the current encoder");
            return;
        };
        self.shadow
            .set_render_target_formats(&pass.formats, &mut self.key_registry);

        if had_encoder {
            self.end_encoder();
            self.commit_command_buffer();
            self.create_current_command_buffer(false);
        }
        self.open_graphics_encoder(&pass);
    }

    /// Resizes the presentation surface. The back buffer gets a new identity;
    /// render targets must be bound again.
    pub fn resize_back_buffer(&mut self, width: u32, height: u32) {
        self.device.resize_surface(width, height);
        let extent = self.device.surface_extent();
        self.back_buffer = Arc::new(Surface::back_buffer(self.device.surface_format(), extent));
        self.previous_render_targets = None;
        self.drawable = None;
        log::info!("RhiContext: Back buffer resized to {}x{}", extent.width, extent.height);
    }

    pub(crate) fn conditional_switch_to_graphics(&mut self) {
        if self.encoder.kind() == EncoderKind::Compute {
            self.end_encoder();
        }
    }

    pub(crate) fn conditional_switch_to_compute(&mut self) {
        match self.encoder.kind() {
            EncoderKind::Compute => return,
            EncoderKind::Graphics => {
                self.end_encoder();
                // Graphics work resumes on a new encoder after the dispatches.
                self.previous_render_targets = None;
            }
            EncoderKind::Neither => {}
        }
        self.open_compute_encoder();
    }

    pub(crate) fn end_encoder(&mut self) -> EncoderKind {
        let open_groups = if self.settings.debug_markers {
            self.debug_groups.len()
        } else {
            0
        };
        self.encoder.end(open_groups)
    }

    fn previous_targets_back_buffer(&self) -> bool {
        self.previous_render_targets.as_ref().is_some_and(|info| {
            info.color_targets.len() == 1 && info.color_targets[0].surface.is_back_buffer()
        })
    }

    fn acquire_back_buffer_texture(&mut self) {
        if self.drawable.is_some() {
            return;
        }
        match self.device.next_drawable() {
            Ok(drawable) => {
                self.back_buffer.set_texture(Some(drawable.texture));
                self.drawable = Some(drawable);
            }
            Err(e) => log::error!("RhiContext: Failed to acquire a drawable: {e}"),
        }
    }

    fn open_graphics_encoder(&mut self, pass: &RenderPass) {
        let Some(command_buffer) = self.command_buffer.as_mut() else {
            log::error!("RhiContext: No command buffer to encode render commands into");
            return;
        };
        let mut encoder = command_buffer.begin_render_encoding(&pass.descriptor);
        if self.settings.debug_markers {
            for label in &self.debug_groups {
                encoder.push_debug_group(label);
            }
        }
        if let Some(offset) = self.active_query {
            encoder.set_visibility_result_mode(VisibilityResultMode::Counting(offset));
        }
        self.encoder = ActiveEncoder::Graphics(encoder);
        self.frame_stats.encoder_recreations += 1;

        // Nothing set on the previous encoder survives.
        self.render_target_extent = pass.extent;
        self.viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: pass.extent.width as f32,
            height: pass.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.rasterizer.invalidate();
        self.depth_stencil_dirty = true;
        self.viewport_dirty = true;
        self.scissor_dirty = true;
        self.streams_dirty = self
            .streams
            .iter()
            .enumerate()
            .filter(|(_, stream)| stream.is_some())
            .fold(0, |mask, (i, _)| mask | 1 << i);
        self.current_pipeline = None;
        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            self.uniform_buffers[stage.index()].mark_all_dirty();
            self.params[stage.index()].mark_all_dirty();
            self.direct[stage.index()].mark_all_dirty();
        }
    }

    fn open_compute_encoder(&mut self) {
        let Some(command_buffer) = self.command_buffer.as_mut() else {
            log::error!("RhiContext: No command buffer to encode compute commands into");
            return;
        };
        let mut encoder = command_buffer.begin_compute_encoding();
        if self.settings.debug_markers {
            for label in &self.debug_groups {
                encoder.push_debug_group(label);
            }
        }
        self.encoder = ActiveEncoder::Compute(encoder);
        self.current_compute_pipeline = None;
        let compute = ShaderStage::Compute.index();
        self.uniform_buffers[compute].mark_all_dirty();
        self.params[compute].mark_all_dirty();
        self.direct[compute].mark_all_dirty();
    }

    /// The scissor rectangle applied to the encoder: the requested one, or the
    /// viewport when scissoring is off, clamped to the render target.
    pub(crate) fn effective_scissor(&self) -> ScissorRect {
        let extent = self.render_target_extent;
        let rect = match self.scissor {
            Some(rect) if rect.width > 0 && rect.height > 0 => rect,
            _ => ScissorRect {
                x: self.viewport.x.max(0.0) as u32,
                y: self.viewport.y.max(0.0) as u32,
                width: self.viewport.width.max(0.0) as u32,
                height: self.viewport.height.max(0.0) as u32,
            },
        };
        let x = rect.x.min(extent.width);
        let y = rect.y.min(extent.height);
        ScissorRect {
            x,
            y,
            width: rect.width.min(extent.width - x),
            height: rect.height.min(extent.height - y),
        }
    }
}
