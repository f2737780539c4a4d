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

//! Shared setup for the integration tests: a headless device and the objects
//! most tests draw with.

#![allow(dead_code)]

use std::borrow::Cow;
use std::sync::Arc;
use strata_core::renderer::{
    Extent2D, LinearRgba, Operations, PixelFormat, RhiSettings, SampleCount, ShaderBindings,
    ShaderFunctionDescriptor, ShaderStage, TextureDescriptor, TextureUsage, VertexLayout,
};
use strata_infra::graphics::headless::RecordedCommand;
use strata_infra::{HeadlessConfig, HeadlessDevice, TimelineMode};
use strata_rhi::{BoundShaderState, DepthStencilTargetView, RenderTargetView, RenderTargetsInfo, RhiContext, Shader, Surface};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn device(timeline: TimelineMode) -> HeadlessDevice {
    init_logging();
    HeadlessDevice::new(HeadlessConfig {
        timeline,
        record_commands: true,
        ..Default::default()
    })
    .expect("headless device")
}

/// Settings with small rings and a short GPU wait, so that contexts on a
/// manual timeline shut down quickly.
pub fn settings() -> RhiSettings {
    RhiSettings {
        ring_buffer_size: 64 * 1024,
        query_timeout_ms: 50,
        pipeline_warmup_frames: 0,
        max_uniform_scratch_bytes: 4096,
        ..Default::default()
    }
}

pub fn context(device: &HeadlessDevice, settings: RhiSettings) -> RhiContext {
    RhiContext::new(Arc::new(device.clone()), settings).expect("rhi context")
}

pub fn shader(context: &RhiContext, stage: ShaderStage, bindings: ShaderBindings) -> Arc<Shader> {
    context
        .create_shader(
            &ShaderFunctionDescriptor {
                label: Some(Cow::Owned(format!("{stage:?} test shader"))),
                stage,
                bytecode: Cow::Borrowed(&[0x03, 0x02, 0x23, 0x07]),
                entry_point: Cow::Borrowed("main"),
            },
            bindings,
        )
        .expect("shader")
}

/// A vertex and pixel shader without any bindings.
pub fn bound_shader_state(context: &mut RhiContext) -> Arc<BoundShaderState> {
    let vertex = shader(context, ShaderStage::Vertex, ShaderBindings::default());
    let pixel = shader(context, ShaderStage::Pixel, ShaderBindings::default());
    context.create_bound_shader_state(&VertexLayout::default(), &vertex, Some(&pixel))
}

pub fn color_surface(context: &RhiContext, width: u32, height: u32) -> Arc<Surface> {
    surface(context, width, height, PixelFormat::Rgba8Unorm)
}

pub fn surface(context: &RhiContext, width: u32, height: u32, format: PixelFormat) -> Arc<Surface> {
    multisampled_surface(context, width, height, format, SampleCount::X1)
}

pub fn multisampled_surface(
    context: &RhiContext,
    width: u32,
    height: u32,
    format: PixelFormat,
    sample_count: SampleCount,
) -> Arc<Surface> {
    context
        .create_surface(&TextureDescriptor {
            label: Some(Cow::Borrowed("test target")),
            size: Extent2D { width, height },
            array_layer_count: 1,
            mip_level_count: 1,
            sample_count,
            format,
            usage: TextureUsage::RENDER_TARGET,
        })
        .expect("surface")
}

pub fn cleared(surface: &Arc<Surface>) -> RenderTargetsInfo {
    RenderTargetsInfo::single(RenderTargetView::cleared(surface.clone(), LinearRgba::BLACK))
}

pub fn loaded(surface: &Arc<Surface>) -> RenderTargetsInfo {
    RenderTargetsInfo::single(RenderTargetView::new(surface.clone()))
}

/// `color` and `depth`, both cleared.
pub fn cleared_with_depth(color: &Arc<Surface>, depth: &Arc<Surface>) -> RenderTargetsInfo {
    RenderTargetsInfo {
        depth_stencil: Some(DepthStencilTargetView::cleared(depth.clone())),
        ..cleared(color)
    }
}

/// `color` loaded, with `depth` attached but not cleared.
pub fn loaded_with_depth(color: &Arc<Surface>, depth: &Arc<Surface>) -> RenderTargetsInfo {
    RenderTargetsInfo {
        depth_stencil: Some(DepthStencilTargetView {
            surface: depth.clone(),
            depth_ops: Operations::load_store(),
            stencil_ops: Operations::load_store(),
        }),
        ..loaded(color)
    }
}

/// Executed commands, without the command buffer they came from.
pub fn commands(device: &HeadlessDevice) -> Vec<RecordedCommand> {
    device
        .command_log()
        .into_iter()
        .map(|(_, command)| command)
        .collect()
}
