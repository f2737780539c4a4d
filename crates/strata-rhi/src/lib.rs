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

//! # Strata RHI
//!
//! GPU command submission and pipeline-state management on top of the device
//! contract of `strata-core`.
//!
//! A renderer drives a single [`RhiContext`] with immediate-mode calls: bind
//! render targets, set blend/rasterizer/depth state, bind shaders and uniform
//! buffers, draw, end the frame. The context maps these onto an explicit API
//! where pipeline state is baked into immutable objects and commands are
//! recorded into short-lived encoders:
//!
//! - [`pipeline_cache`] builds pipeline objects lazily, keyed by a packed
//!   [`pipeline_key::PipelineKey`];
//! - [`resource_table`] and [`shader_params`] translate uniform buffers and
//!   loose parameters into the slots a compiled shader reads;
//! - [`render_targets`] decides when a new render encoder is unavoidable;
//! - [`ring_buffer`] hands out transient GPU memory;
//! - [`frame`] paces the CPU against the GPU and retires objects safely.

#![warn(missing_docs)]

pub mod context;
pub mod encoder;
pub mod frame;
pub mod pipeline_cache;
pub mod pipeline_key;
pub mod rasterizer;
pub mod render_targets;
pub mod resource_table;
pub mod ring_buffer;
pub mod shader;
pub mod shader_params;
pub mod stage;
pub mod surface;

#[cfg(test)]
mod mock;

pub use context::{FramePhase, RhiContext};
pub use encoder::EncoderKind;
pub use frame::{GpuObject, IntervalPacer, OcclusionQuery};
pub use pipeline_cache::{BlendStateObject, BoundShaderState};
pub use render_targets::{DepthStencilTargetView, RenderTargetView, RenderTargetsInfo};
pub use resource_table::{SamplerState, UniformBuffer, UniformBufferLayout, UniformResource, UniformResourceType};
pub use shader::Shader;
pub use surface::Surface;
