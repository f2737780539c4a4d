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

//! A software implementation of [`GraphicsDevice`](strata_core::GraphicsDevice).
//!
//! Resources live in CPU memory. Command buffers are validated and recorded on
//! the calling thread, then handed to a queue that executes them in commit
//! order: visibility counters are accumulated into their result buffers,
//! drawables are presented and completion handlers run.

mod command;
mod device;
mod queue;

pub use self::command::RecordedCommand;
pub use self::device::HeadlessDevice;

use strata_core::renderer::{DeviceFeature, Extent2D, PixelFormat};
use std::time::Duration;

/// How the headless GPU timeline advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineMode {
    /// A worker thread executes committed command buffers as soon as they arrive.
    #[default]
    Threaded,
    /// Committed command buffers wait until the owner calls
    /// [`HeadlessDevice::complete_next`] or [`HeadlessDevice::complete_all`].
    Manual,
}

/// Configuration of a [`HeadlessDevice`].
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Initial size of the display surface.
    pub surface_extent: Extent2D,
    /// Pixel format of the drawables.
    pub surface_format: PixelFormat,
    /// Number of drawables the surface rotates through.
    pub drawable_count: usize,
    /// Optional features the device reports.
    pub features: Vec<DeviceFeature>,
    /// How the timeline advances.
    pub timeline: TimelineMode,
    /// Time the worker spends on each command buffer, to make pipelining observable.
    pub simulated_gpu_time: Duration,
    /// Keep every executed command for inspection through [`HeadlessDevice::command_log`].
    pub record_commands: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            surface_extent: Extent2D {
                width: 1280,
                height: 720,
            },
            surface_format: PixelFormat::Bgra8Unorm,
            drawable_count: 3,
            features: vec![
                DeviceFeature::IndirectBuffers,
                DeviceFeature::OcclusionQueries,
                DeviceFeature::WireframeFill,
            ],
            timeline: TimelineMode::Threaded,
            simulated_gpu_time: Duration::ZERO,
            record_commands: false,
        }
    }
}

/// A snapshot of the device counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Buffers currently alive.
    pub buffers_alive: u64,
    /// Textures currently alive, drawables included.
    pub textures_alive: u64,
    /// Render pipeline objects ever compiled.
    pub render_pipelines_created: u64,
    /// Render pipeline objects currently alive.
    pub render_pipelines_alive: u64,
    /// Compute pipeline objects ever compiled.
    pub compute_pipelines_created: u64,
    /// Command buffers ever created.
    pub command_buffers_created: u64,
    /// Command buffers committed to the queue.
    pub command_buffers_committed: u64,
    /// Command buffers the queue finished executing.
    pub command_buffers_completed: u64,
    /// Graphics encoders opened.
    pub render_encoders_begun: u64,
    /// Compute encoders opened.
    pub compute_encoders_begun: u64,
    /// Draw calls executed.
    pub draws_executed: u64,
    /// Compute dispatches executed.
    pub dispatches_executed: u64,
    /// Drawables handed out by the surface.
    pub drawables_acquired: u64,
    /// Drawables presented.
    pub drawables_presented: u64,
    /// Misuses of the recording API that a real driver would reject.
    pub validation_errors: u64,
}
