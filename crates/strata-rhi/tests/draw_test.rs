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

mod common;

use common::commands;
use std::sync::Arc;
use strata_core::renderer::{
    BufferDescriptor, BufferUsage, CullMode, GraphicsDevice, IndexBufferView, IndexFormat,
    PackedArrayInfo, PackedTypeIndex, PrimitiveType, RasterizerState, ResourceMap,
    ResourceTableEntry, ScissorRect, ShaderBindings, ShaderResourceTable, ShaderStage,
    ThreadGroupSize, Viewport, VertexLayout, Winding,
};
use strata_infra::graphics::headless::RecordedCommand;
use strata_infra::{HeadlessConfig, HeadlessDevice, TimelineMode};
use strata_rhi::stage::vertex_stream_slot;
use strata_rhi::{
    BoundShaderState, RhiContext, UniformBufferLayout, UniformResource, UniformResourceType,
};

/// A context with a 64x64 target bound and shaders without bindings.
fn drawing_context(device: &HeadlessDevice) -> RhiContext {
    let mut context = common::context(device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);
    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context
}

fn finish(device: &HeadlessDevice, context: &mut RhiContext) -> Vec<RecordedCommand> {
    context.end_frame(false);
    device.wait_idle();
    assert_eq!(device.stats().validation_errors, 0);
    commands(device)
}

#[test]
#[should_panic(expected = "not supported: QuadList primitives")]
fn test_quad_lists_are_rejected() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    context.draw_primitive(PrimitiveType::QuadList, 0, 1, 1);
}

#[test]
#[should_panic(expected = "not supported: stream output")]
fn test_stream_output_is_rejected() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    context.set_stream_out_targets(&[]);
}

#[test]
#[should_panic(expected = "not supported: indirect arguments")]
fn test_indirect_draws_need_device_support() {
    common::init_logging();
    let device = HeadlessDevice::new(HeadlessConfig {
        features: vec![],
        ..Default::default()
    })
    .unwrap();
    let mut context = drawing_context(&device);
    let arguments = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::INDIRECT,
        })
        .unwrap();
    context.draw_primitive_indirect(PrimitiveType::TriangleList, arguments, 0);
}

#[test]
fn test_instance_count_is_at_least_one() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);

    context.draw_primitive(PrimitiveType::TriangleList, 3, 2, 0);

    let log = finish(&device, &mut context);
    assert!(log.contains(&RecordedCommand::Draw {
        primitive: PrimitiveType::TriangleList,
        vertex_start: 3,
        vertex_count: 6,
        instance_count: 1,
    }));
}

#[test]
fn test_indexed_draws_offset_by_index_stride() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    let indices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 64,
                usage: BufferUsage::INDEX,
            },
            &[0; 64],
        )
        .unwrap();
    let view = IndexBufferView {
        buffer: indices,
        format: IndexFormat::Uint16,
    };

    context.draw_indexed_primitive(&view, PrimitiveType::TriangleList, -4, 2, 6, 2, 3);

    let log = finish(&device, &mut context);
    assert!(log.contains(&RecordedCommand::DrawIndexed {
        primitive: PrimitiveType::TriangleList,
        index_count: 6,
        index_format: IndexFormat::Uint16,
        index_buffer: indices,
        index_buffer_offset: 12,
        instance_count: 3,
        base_vertex: -4,
        base_instance: 2,
    }));
    assert_eq!(context.last_frame_stats().primitives, 6);
}

#[test]
fn test_user_pointer_draws_use_the_ring_as_stream_zero() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    let ring = context.ring_buffer().buffer();
    let vertices: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    context.draw_primitive_up(PrimitiveType::TriangleList, 1, 12, |bytes| {
        bytes.copy_from_slice(bytemuck::cast_slice(&vertices))
    });

    let log = finish(&device, &mut context);
    let offset = log
        .iter()
        .find_map(|command| match command {
            RecordedCommand::SetBuffer {
                stage: ShaderStage::Vertex,
                index,
                buffer,
                offset,
            } if *index == vertex_stream_slot(0) && *buffer == ring => Some(*offset),
            _ => None,
        })
        .expect("stream 0 bound to the ring");
    let contents = device.buffer_contents(ring).unwrap();
    let start = offset as usize;
    assert_eq!(&contents[start..start + 36], bytemuck::cast_slice::<f32, u8>(&vertices));
}

#[test]
fn test_indexed_user_pointer_draws_upload_both_arrays() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    let ring = context.ring_buffer().buffer();

    context.draw_indexed_primitive_up(
        PrimitiveType::TriangleList,
        4,
        16,
        |bytes| bytes.fill(1),
        2,
        IndexFormat::Uint32,
        |bytes| bytes.copy_from_slice(bytemuck::cast_slice(&[0u32, 1, 2, 2, 1, 3])),
    );

    let log = finish(&device, &mut context);
    assert!(log.iter().any(|command| matches!(
        command,
        RecordedCommand::DrawIndexed {
            index_count: 6,
            index_format: IndexFormat::Uint32,
            index_buffer,
            ..
        } if *index_buffer == ring
    )));
}

#[test]
fn test_fresh_encoders_get_full_rasterizer_state_once() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    context.set_rasterizer_state(RasterizerState {
        cull_mode: CullMode::Back,
        ..Default::default()
    });

    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);

    let log = finish(&device, &mut context);
    let count = |wanted: &RecordedCommand| log.iter().filter(|command| *command == wanted).count();
    assert_eq!(count(&RecordedCommand::SetFrontFacingWinding(Winding::CounterClockwise)), 1);
    assert_eq!(count(&RecordedCommand::SetCullMode(CullMode::Back)), 1);
}

#[test]
fn test_disabled_scissor_follows_the_clamped_viewport() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    context.set_viewport(Viewport {
        x: 32.0,
        y: 0.0,
        width: 100.0,
        height: 64.0,
        min_depth: 0.0,
        max_depth: 1.0,
    });
    context.set_scissor_rect(false, ScissorRect::default());

    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);

    let log = finish(&device, &mut context);
    assert!(log.contains(&RecordedCommand::SetScissorRect(ScissorRect {
        x: 32,
        y: 0,
        width: 32,
        height: 64,
    })));
}

#[test]
fn test_draws_without_targets_or_shaders_are_dropped() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let shaders = common::bound_shader_state(&mut context);

    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.set_bound_shader_state(&shaders);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);

    assert_eq!(context.frame_stats().dropped_draws, 2);
    assert_eq!(context.frame_stats().draw_calls, 0);
}

#[test]
fn test_loose_parameters_are_uploaded_as_packed_globals() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let vertex = common::shader(
        &context,
        ShaderStage::Vertex,
        ShaderBindings {
            packed_global_arrays: vec![PackedArrayInfo {
                type_index: PackedTypeIndex::Highp,
                size_bytes: 32,
                buffer_slot: 0,
            }],
            ..Default::default()
        },
    );
    let shaders = context.create_bound_shader_state(&VertexLayout::default(), &vertex, None);
    let ring = context.ring_buffer().buffer();

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.set_shader_parameter(ShaderStage::Vertex, PackedTypeIndex::Highp, 16, &[0xab; 16]);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);

    let log = finish(&device, &mut context);
    let offset = log
        .iter()
        .find_map(|command| match command {
            RecordedCommand::SetBuffer {
                stage: ShaderStage::Vertex,
                index: 0,
                buffer,
                offset,
            } if *buffer == ring => Some(*offset as usize),
            _ => None,
        })
        .expect("globals bound at slot 0");
    let contents = device.buffer_contents(ring).unwrap();
    assert_eq!(&contents[offset + 16..offset + 32], &[0xab; 16]);
}

/// Shaders whose pixel stage reads one texture from the uniform buffer at
/// index 0 and binds it at slot 3.
fn material_shaders(context: &mut RhiContext, layout: &UniformBufferLayout) -> Arc<BoundShaderState> {
    let pixel_bindings = ShaderBindings {
        num_uniform_buffers: 1,
        resource_table: ShaderResourceTable {
            resource_table_bits: 1,
            layout_hashes: vec![layout.hash()],
            texture_map: ResourceMap::build(1, &[ResourceTableEntry::new(0, 0, 3)]),
            ..Default::default()
        },
        ..Default::default()
    };
    let vertex = common::shader(context, ShaderStage::Vertex, ShaderBindings::default());
    let pixel = common::shader(context, ShaderStage::Pixel, pixel_bindings);
    context.create_bound_shader_state(&VertexLayout::default(), &vertex, Some(&pixel))
}

#[test]
fn test_resource_tables_bind_uniform_buffer_textures() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let albedo = common::color_surface(&context, 16, 16);
    let layout = Arc::new(UniformBufferLayout::new(
        "Material",
        0,
        vec![UniformResourceType::Texture],
    ));
    let shaders = material_shaders(&mut context, &layout);
    let material = context
        .create_uniform_buffer(layout, &[], vec![UniformResource::Texture(albedo.clone())])
        .unwrap();

    context.begin_scene();
    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.set_shader_uniform_buffer(ShaderStage::Pixel, 0, &material);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.end_scene();

    let log = finish(&device, &mut context);
    assert!(log.contains(&RecordedCommand::SetTexture {
        stage: ShaderStage::Pixel,
        index: 3,
        texture: albedo.texture(),
    }));
}

#[test]
#[should_panic(expected = "has layout hash")]
fn test_mismatched_uniform_buffer_layouts_are_fatal() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let material = UniformBufferLayout::new("Material", 0, vec![UniformResourceType::Texture]);
    let shaders = material_shaders(&mut context, &material);
    let other = context
        .create_uniform_buffer(
            Arc::new(UniformBufferLayout::new("Lighting", 16, vec![])),
            &[0; 16],
            vec![],
        )
        .unwrap();

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.set_shader_uniform_buffer(ShaderStage::Pixel, 0, &other);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
}

#[test]
fn test_direct_bindings_are_replayed_on_new_encoders() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = drawing_context(&device);
    let texture = common::color_surface(&context, 16, 16);
    let target = common::color_surface(&context, 32, 32);

    context.set_shader_texture(ShaderStage::Pixel, 2, Some(&texture));
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.set_render_targets_info(&common::cleared(&target));
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);

    let log = finish(&device, &mut context);
    let bound = RecordedCommand::SetTexture {
        stage: ShaderStage::Pixel,
        index: 2,
        texture: texture.texture(),
    };
    assert_eq!(log.iter().filter(|command| **command == bound).count(), 2);
}

#[test]
fn test_dispatch_raises_empty_group_counts() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let kernel = common::shader(
        &context,
        ShaderStage::Compute,
        ShaderBindings {
            thread_group_size: ThreadGroupSize { x: 8, y: 8, z: 1 },
            ..Default::default()
        },
    );

    context.set_compute_shader(&kernel);
    context.dispatch_compute_shader(0, 0, 4);

    let log = finish(&device, &mut context);
    assert!(log.contains(&RecordedCommand::Dispatch {
        groups: [1, 1, 4],
        threads_per_group: [8, 8, 1],
    }));
    assert!(log.contains(&RecordedCommand::SetComputePipeline(
        kernel.compute_pipeline().unwrap()
    )));
}
