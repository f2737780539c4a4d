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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_core::renderer::{PrimitiveType, RhiSettings};
use strata_infra::graphics::headless::RecordedCommand;
use strata_infra::TimelineMode;
use strata_rhi::frame::FramePacer;
use strata_rhi::FramePhase;

#[test]
fn test_cpu_stalls_when_all_frames_are_in_flight() {
    let device = common::device(TimelineMode::Manual);
    let settings = RhiSettings {
        frames_in_flight: 2,
        ..common::settings()
    };
    let mut context = common::context(&device, settings);
    context.end_frame(false);
    assert_eq!(device.pending_command_buffers(), 1);

    // The third frame needs a slot the GPU has not handed back yet.
    let worker = std::thread::spawn(move || {
        context.end_frame(false);
        context
    });
    std::thread::sleep(Duration::from_millis(100));

    assert!(!worker.is_finished(), "end_frame must wait for the GPU");
    assert_eq!(device.complete_all(), 2);
    let context = worker.join().expect("frame thread");
    assert_eq!(context.frame_number(), 2);
    assert_eq!(context.frame_phase(), FramePhase::CommandBufferOpen);
}

#[test]
fn test_lockstep_keeps_a_single_frame_in_flight() {
    let device = common::device(TimelineMode::Manual);
    let settings = RhiSettings {
        gpu_lockstep: true,
        ..common::settings()
    };
    let mut context = common::context(&device, settings);

    let worker = std::thread::spawn(move || {
        context.end_frame(false);
        context
    });
    std::thread::sleep(Duration::from_millis(100));
    assert!(!worker.is_finished());
    device.complete_all();
    let context = worker.join().expect("frame thread");
    assert_eq!(context.frame_number(), 1);
}

#[test]
fn test_released_objects_outlive_their_frame() {
    let device = common::device(TimelineMode::Manual);
    let mut context = common::context(&device, common::settings());
    let textures_before = device.stats().textures_alive;
    let target = common::color_surface(&context, 32, 32);
    assert_eq!(device.stats().textures_alive, textures_before + 1);

    context.set_render_targets_info(&common::cleared(&target));
    drop(target);
    context.end_frame(false);
    device.complete_all();

    // Frame 0 retired, but the bound targets only let go of the surface when
    // frame 1 began, so it waits for frame 1.
    context.end_frame(false);
    assert_eq!(device.stats().textures_alive, textures_before + 1);
    assert_eq!(context.pending_releases(), 1);

    device.complete_all();
    context.end_frame(false);
    assert_eq!(device.stats().textures_alive, textures_before);
    assert_eq!(context.pending_releases(), 0);
    assert_eq!(context.last_frame_stats().objects_reclaimed, 1);
    device.complete_all();
}

#[test]
fn test_submit_and_wait_drains_the_gpu() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    context.submit_commands_and_wait();

    assert_eq!(device.stats().draws_executed, 1);
    assert_eq!(context.frame_phase(), FramePhase::CommandBufferOpen);
    // Targets are forgotten, so binding them again opens a new encoder.
    context.set_render_targets_info(&common::loaded(&target));
    assert_eq!(context.frame_stats().encoder_recreations, 2);
}

#[test]
fn test_many_frames_run_without_stalling() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);

    for _ in 0..32 {
        context.begin_frame();
        context.set_render_targets_info(&common::cleared(&target));
        context.set_bound_shader_state(&shaders);
        context.draw_primitive(PrimitiveType::TriangleStrip, 0, 2, 1);
        context.end_frame(false);
    }

    device.wait_idle();
    assert_eq!(context.frame_number(), 32);
    assert_eq!(context.lifetime_stats().frame_number, 32);
    assert_eq!(device.stats().draws_executed, 32);
    assert_eq!(device.stats().validation_errors, 0);
}

#[test]
fn test_scene_epoch_follows_scene_scope() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    assert_eq!(context.resource_table_epoch(), None);

    context.begin_scene();
    assert_eq!(context.resource_table_epoch(), Some(1));
    context.end_scene();
    assert_eq!(context.resource_table_epoch(), None);
    context.begin_scene();
    assert_eq!(context.resource_table_epoch(), Some(2));

    let uncached = RhiSettings {
        resource_table_caching: false,
        ..common::settings()
    };
    let mut context = common::context(&device, uncached);
    context.begin_scene();
    assert_eq!(context.resource_table_epoch(), None);
}

#[test]
fn test_debug_groups_are_replayed_on_new_encoders() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);

    context.push_event("Shadows");
    context.set_render_targets_info(&common::cleared(&target));
    context.set_render_targets_info(&common::cleared(&target));
    context.pop_event();
    context.end_frame(false);

    device.wait_idle();
    let log = commands(&device);
    let pushes = log
        .iter()
        .filter(|command| matches!(command, RecordedCommand::PushDebugGroup(label) if label == "Shadows"))
        .count();
    let pops = log
        .iter()
        .filter(|command| matches!(command, RecordedCommand::PopDebugGroup))
        .count();
    assert_eq!(pushes, 2);
    assert_eq!(pops, 2);
    assert_eq!(device.stats().validation_errors, 0);
}

#[test]
fn test_debug_markers_can_be_disabled() {
    let device = common::device(TimelineMode::Threaded);
    let settings = RhiSettings {
        debug_markers: false,
        ..common::settings()
    };
    let mut context = common::context(&device, settings);
    let target = common::color_surface(&context, 64, 64);

    context.set_render_targets_info(&common::cleared(&target));
    context.push_event("Ignored");
    context.pop_event();
    context.end_frame(false);

    device.wait_idle();
    assert!(!commands(&device)
        .iter()
        .any(|command| matches!(command, RecordedCommand::PushDebugGroup(_))));
}

struct CountingPacer(Arc<AtomicUsize>);

impl FramePacer for CountingPacer {
    fn wait_for_next_frame(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_pacer_runs_once_per_frame() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let calls = Arc::new(AtomicUsize::new(0));
    context.set_frame_pacer(Box::new(CountingPacer(calls.clone())));

    for _ in 0..4 {
        context.end_frame(false);
    }

    assert_eq!(calls.load(Ordering::Relaxed), 4);
}

#[test]
fn test_frame_stats_roll_over_at_frame_end() {
    let device = common::device(TimelineMode::Threaded);
    let mut context = common::context(&device, common::settings());
    let target = common::color_surface(&context, 64, 64);
    let shaders = common::bound_shader_state(&mut context);

    context.set_render_targets_info(&common::cleared(&target));
    context.set_bound_shader_state(&shaders);
    context.draw_primitive_up(PrimitiveType::TriangleList, 1, 12, |bytes| bytes.fill(0));
    assert_eq!(context.frame_stats().draw_calls, 1);
    context.end_frame(false);

    let last = context.last_frame_stats();
    assert_eq!(last.frame_number, 0);
    assert_eq!(last.draw_calls, 1);
    assert!(last.ring_bytes_allocated >= 36);
    assert_eq!(context.frame_stats().draw_calls, 0);
    assert_eq!(context.frame_stats().frame_number, 1);
}
