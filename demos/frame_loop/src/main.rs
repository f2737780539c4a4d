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

// Frame loop demo
// Renders an offscreen pass and a back-buffer pass per frame on the headless
// device. Pass a RON settings file as the first argument to override defaults.

use std::borrow::Cow;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use strata_core::renderer::{
    BufferDescriptor, BufferUsage, Extent2D, GraphicsDevice, LinearRgba, PixelFormat,
    PrimitiveType, RhiSettings, SampleCount, ShaderBindings, ShaderFunctionDescriptor,
    ShaderStage, TextureDescriptor, TextureUsage, VertexElement, VertexFormat, VertexLayout,
    VertexStepMode,
};
use strata_infra::{HeadlessConfig, HeadlessDevice};
use strata_rhi::{IntervalPacer, OcclusionQuery, RenderTargetView, RenderTargetsInfo, RhiContext, Shader};

const FRAMES: u64 = 12;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    fn layout() -> VertexLayout {
        let stride = mem::size_of::<Vertex>() as u32;
        VertexLayout::new(vec![
            VertexElement {
                stream_index: 0,
                offset: 0,
                format: VertexFormat::Float32x3,
                attribute_index: 0,
                stride,
                step_mode: VertexStepMode::Vertex,
            },
            VertexElement {
                stream_index: 0,
                offset: mem::size_of::<[f32; 3]>() as u32,
                format: VertexFormat::Float32x3,
                attribute_index: 1,
                stride,
                step_mode: VertexStepMode::Vertex,
            },
        ])
    }
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

fn load_settings() -> Result<RhiSettings> {
    let settings = match std::env::args().nth(1) {
        Some(path) => RhiSettings::load(&path).with_context(|| format!("reading settings from {path}"))?,
        None => RhiSettings::default(),
    };
    Ok(settings.with_env_overrides())
}

fn shader(context: &RhiContext, stage: ShaderStage, entry_point: &'static str) -> Result<Arc<Shader>> {
    let shader = context.create_shader(
        &ShaderFunctionDescriptor {
            label: Some(Cow::Borrowed(entry_point)),
            stage,
            bytecode: Cow::Borrowed(entry_point.as_bytes()),
            entry_point: Cow::Borrowed(entry_point),
        },
        ShaderBindings::default(),
    )?;
    Ok(shader)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let device = HeadlessDevice::new(HeadlessConfig {
        simulated_gpu_time: Duration::from_millis(2),
        ..Default::default()
    })?;
    let mut context = RhiContext::new(Arc::new(device.clone()), settings)?;
    context.set_frame_pacer(Box::new(IntervalPacer::new(Duration::from_millis(4))));

    let vertex_bytes: &[u8] = bytemuck::cast_slice(VERTICES);
    let vertex_buffer = device.create_buffer_with_data(
        &BufferDescriptor {
            label: Some(Cow::Borrowed("triangle vertices")),
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::VERTEX,
        },
        vertex_bytes,
    )?;

    let offscreen = context.create_surface(&TextureDescriptor {
        label: Some(Cow::Borrowed("offscreen color")),
        size: Extent2D {
            width: 256,
            height: 256,
        },
        array_layer_count: 1,
        mip_level_count: 1,
        sample_count: SampleCount::X1,
        format: PixelFormat::Rgba8Unorm,
        usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_READ,
    })?;

    let vs_main = shader(&context, ShaderStage::Vertex, "vs_main")?;
    let fs_main = shader(&context, ShaderStage::Pixel, "fs_main")?;
    let fs_blit = shader(&context, ShaderStage::Pixel, "fs_blit")?;
    let triangle = context.create_bound_shader_state(&Vertex::layout(), &vs_main, Some(&fs_main));
    let blit = context.create_bound_shader_state(&Vertex::layout(), &vs_main, Some(&fs_blit));

    let mut query = OcclusionQuery::new();
    for _ in 0..FRAMES {
        context.begin_frame();

        context.push_event("offscreen");
        context.set_render_targets_info(&RenderTargetsInfo::single(RenderTargetView::cleared(
            offscreen.clone(),
            LinearRgba::BLACK,
        )));
        context.set_bound_shader_state(&triangle);
        context.set_stream_source(0, vertex_buffer, 0);
        context.begin_occlusion_query(&mut query);
        context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
        context.end_occlusion_query(&mut query);
        context.pop_event();

        context.push_event("present");
        let back_buffer = context.back_buffer().clone();
        context.set_render_targets_info(&RenderTargetsInfo::single(RenderTargetView::cleared(
            back_buffer,
            LinearRgba::BLACK,
        )));
        context.set_bound_shader_state(&blit);
        context.set_shader_texture(ShaderStage::Pixel, 0, Some(&offscreen));
        context.draw_primitive_up(PrimitiveType::TriangleList, 1, mem::size_of::<Vertex>() as u32, |bytes| {
            bytes.copy_from_slice(vertex_bytes)
        });
        context.pop_event();

        context.end_frame(true);
    }

    match context.get_query_result(&mut query, true) {
        Some(samples) => log::info!("Last occlusion query: {samples} samples passed"),
        None => log::warn!("Last occlusion query did not resolve"),
    }

    let stats = context.lifetime_stats();
    log::info!(
        "Rendered {} frames: {} draws, {} primitives, {} pipeline misses, {} command buffers",
        context.frame_number(),
        stats.draw_calls,
        stats.primitives,
        stats.pipeline_cache_misses,
        stats.command_buffers_committed
    );

    Ok(())
}
