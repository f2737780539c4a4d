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

use strata_core::renderer::PrimitiveType;
use strata_infra::TimelineMode;
use strata_rhi::OcclusionQuery;

#[test]
fn test_waiting_on_a_query_submits_and_reads_samples() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);
    let mut query = OcclusionQuery::new();

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.begin_occlusion_query(&mut query);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 2, 1);
    context.end_occlusion_query(&mut query);
    // Not counted.
    context.draw_primitive(PrimitiveType::TriangleList, 0, 5, 1);

    assert!(query.is_pending());
    assert_eq!(context.get_query_result(&mut query, true), Some(6));
    assert!(!query.is_pending());
    assert_eq!(query.cached_result(), Some(6));
    assert_eq!(device.stats().validation_errors, 0);
}

#[test]
fn test_query_is_not_ready_until_the_gpu_ran_it() {
    let device = common::device(TimelineMode::Manual);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);
    let mut query = OcclusionQuery::new();

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.begin_occlusion_query(&mut query);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 2);
    context.end_occlusion_query(&mut query);
    context.end_frame(false);

    assert_eq!(context.get_query_result(&mut query, false), None);
    device.complete_all();
    assert_eq!(context.get_query_result(&mut query, false), Some(6));
}

#[test]
fn test_query_keeps_counting_across_encoders() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);
    let mut query = OcclusionQuery::new();

    context.begin_occlusion_query(&mut query);
    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.set_render_targets_info(&common::cleared(&target));
    context.draw_primitive(PrimitiveType::LineList, 0, 2, 1);
    context.end_occlusion_query(&mut query);
    context.end_frame(false);
    device.wait_idle();

    assert_eq!(context.get_query_result(&mut query, true), Some(7));
}

#[test]
fn test_unissued_query_has_no_result() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let mut query = OcclusionQuery::new();

    assert_eq!(context.get_query_result(&mut query, true), None);
}
