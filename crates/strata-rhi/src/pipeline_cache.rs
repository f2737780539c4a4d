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

//! Pipeline objects, cached per bound shader state and pipeline key.
//!
//! A [`BoundShaderState`] pairs a vertex layout with a vertex and pixel shader.
//! The remaining pipeline-relevant state (blending, attachment formats, sample
//! count) is shadowed by [`PipelineShadow`] and digested into a
//! [`PipelineKey`]. Each bound shader state owns the pipelines built for it,
//! keyed by that digest, and releases them when it is dropped.

use crate::frame::release::{GpuObject, ReleaseSender};
use crate::pipeline_key::{BlendKey, PipelineKey, PipelineKeyRegistry};
use crate::render_targets::PassFormats;
use crate::shader::Shader;
use ahash::{AHashMap, AHashSet};
use std::borrow::Cow;
use std::sync::{Arc, Mutex, Weak};
use strata_core::renderer::{
    BlendState, ColorTargetDescriptor, FrameStats, GraphicsDevice, PixelFormat, RenderEncoder,
    RenderPipelineDescriptor, RenderPipelineId, SampleCount, ShaderFunctionId, ShaderStage,
    VertexLayout, MAX_RENDER_TARGETS,
};

/// A blend state with its per-target keys resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendStateObject {
    state: BlendState,
    keys: [BlendKey; MAX_RENDER_TARGETS],
}

impl BlendStateObject {
    /// Registers every render target blend state of `state`.
    pub fn new(state: BlendState, registry: &mut PipelineKeyRegistry) -> Self {
        Self {
            keys: std::array::from_fn(|i| registry.blend_key(&state.render_targets[i])),
            state,
        }
    }

    /// The blend state.
    pub fn state(&self) -> &BlendState {
        &self.state
    }
}

/// The pipeline-relevant state outside of the shaders.
#[derive(Debug, Clone, Default)]
pub struct PipelineShadow {
    blend: BlendState,
    formats: PassFormats,
    key: PipelineKey,
}

impl PipelineShadow {
    /// Creates a shadow with the default blend state registered.
    pub fn new(registry: &mut PipelineKeyRegistry) -> Self {
        let mut shadow = Self::default();
        shadow.set_blend_state(&BlendStateObject::new(BlendState::default(), registry));
        shadow.key.set_sample_count(SampleCount::X1);
        shadow
    }

    /// The current digest.
    pub fn key(&self) -> PipelineKey {
        self.key
    }

    /// Applies a blend state.
    pub fn set_blend_state(&mut self, blend: &BlendStateObject) {
        self.blend = blend.state;
        for (slot, key) in blend.keys.iter().enumerate() {
            self.key.set_blend_key(slot, *key);
        }
    }

    /// Applies the attachment formats of a new render pass.
    pub fn set_render_target_formats(&mut self, formats: &PassFormats, registry: &mut PipelineKeyRegistry) {
        self.formats = *formats;
        for (slot, format) in formats.color.iter().enumerate() {
            self.key.set_format_key(slot, registry.format_key(*format));
        }
        self.key.set_depth_enabled(formats.depth.is_some());
        self.key.set_stencil_enabled(formats.stencil.is_some());
        self.key.set_sample_count(formats.sample_count);
    }

    /// The color formats of the current pass.
    pub fn color_formats(&self) -> &[Option<PixelFormat>; MAX_RENDER_TARGETS] {
        &self.formats.color
    }

    /// Builds the descriptor of the pipeline matching this shadow and `bss`.
    pub fn descriptor<'a>(&self, bss: &'a BoundShaderState) -> RenderPipelineDescriptor<'a> {
        let color_targets = std::array::from_fn(|slot| {
            self.formats.color[slot].map(|format| ColorTargetDescriptor {
                format,
                blend: self.blend.render_targets[slot],
            })
        });
        RenderPipelineDescriptor {
            label: Some(Cow::Borrowed(bss.label())),
            vertex_function: bss.vertex_shader.function(),
            pixel_function: bss.pixel_shader.as_ref().map(|s| s.function()),
            vertex_layout: bss.vertex_layout.clone(),
            color_targets,
            depth_format: self.formats.depth,
            stencil_format: self.formats.stencil,
            sample_count: self.formats.sample_count,
        }
    }
}

/// A vertex layout, a vertex shader and an optional pixel shader, plus every
/// pipeline built for them.
#[derive(Debug)]
pub struct BoundShaderState {
    label: String,
    vertex_layout: VertexLayout,
    vertex_shader: Arc<Shader>,
    pixel_shader: Option<Arc<Shader>>,
    pipelines: Mutex<AHashMap<PipelineKey, RenderPipelineId>>,
    failed: Mutex<AHashSet<PipelineKey>>,
    release: ReleaseSender,
}

impl BoundShaderState {
    fn new(
        vertex_layout: VertexLayout,
        vertex_shader: Arc<Shader>,
        pixel_shader: Option<Arc<Shader>>,
        release: ReleaseSender,
    ) -> Self {
        let label = match &pixel_shader {
            Some(pixel) => format!("{} + {}", vertex_shader.label(), pixel.label()),
            None => vertex_shader.label().to_string(),
        };
        Self {
            label,
            vertex_layout,
            vertex_shader,
            pixel_shader,
            pipelines: Mutex::new(AHashMap::new()),
            failed: Mutex::new(AHashSet::new()),
            release,
        }
    }

    /// A label naming both shaders.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The vertex shader.
    pub fn vertex_shader(&self) -> &Arc<Shader> {
        &self.vertex_shader
    }

    /// The pixel shader, if any.
    pub fn pixel_shader(&self) -> Option<&Arc<Shader>> {
        self.pixel_shader.as_ref()
    }

    /// The vertex layout.
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// Number of pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }
}

impl Drop for BoundShaderState {
    fn drop(&mut self) {
        let pipelines = self.pipelines.get_mut().map(std::mem::take).unwrap_or_default();
        for pipeline in pipelines.into_values() {
            self.release.release(GpuObject::RenderPipeline(pipeline));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BoundShaderStateKey {
    vertex_layout: VertexLayout,
    vertex: ShaderFunctionId,
    pixel: Option<ShaderFunctionId>,
}

/// Deduplicates bound shader states and resolves pipelines before draws.
#[derive(Debug)]
pub struct PipelineCache {
    bound_shader_states: AHashMap<BoundShaderStateKey, Weak<BoundShaderState>>,
    warmup_frames: u64,
}

impl PipelineCache {
    /// Misses in the first `warmup_frames` frames are not reported as hitches.
    pub fn new(warmup_frames: u64) -> Self {
        Self {
            bound_shader_states: AHashMap::new(),
            warmup_frames,
        }
    }

    /// Returns the live bound shader state for these shaders, or creates it.
    ///
    /// # Panics
    ///
    /// Panics if the shaders are not a vertex and a pixel shader.
    pub fn bound_shader_state(
        &mut self,
        vertex_layout: &VertexLayout,
        vertex_shader: &Arc<Shader>,
        pixel_shader: Option<&Arc<Shader>>,
        release: ReleaseSender,
    ) -> Arc<BoundShaderState> {
        assert_eq!(vertex_shader.stage(), ShaderStage::Vertex, "'{}' is not a vertex shader", vertex_shader.label());
        if let Some(pixel) = pixel_shader {
            assert_eq!(pixel.stage(), ShaderStage::Pixel, "'{}' is not a pixel shader", pixel.label());
        }

        let key = BoundShaderStateKey {
            vertex_layout: vertex_layout.clone(),
            vertex: vertex_shader.function(),
            pixel: pixel_shader.map(|s| s.function()),
        };
        if let Some(existing) = self.bound_shader_states.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        self.bound_shader_states.retain(|_, state| state.strong_count() > 0);

        let state = Arc::new(BoundShaderState::new(
            vertex_layout.clone(),
            vertex_shader.clone(),
            pixel_shader.cloned(),
            release,
        ));
        log::debug!("PipelineCache: New bound shader state '{}'", state.label());
        self.bound_shader_states.insert(key, Arc::downgrade(&state));
        state
    }

    /// Number of live bound shader states.
    pub fn live_bound_shader_states(&self) -> usize {
        self.bound_shader_states
            .values()
            .filter(|state| state.strong_count() > 0)
            .count()
    }

    /// Makes sure `encoder` uses the pipeline for `shadow` and `bss`,
    /// building it on a miss. `current` is the pipeline the encoder already
    /// has, if known.
    ///
    /// Returns `false` if no pipeline could be built; the draw must then be
    /// skipped. Keys that failed once are not retried.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare_for_draw(
        &self,
        device: &dyn GraphicsDevice,
        shadow: &PipelineShadow,
        bss: &BoundShaderState,
        frame_index: u64,
        encoder: &mut dyn RenderEncoder,
        current: &mut Option<RenderPipelineId>,
        stats: &mut FrameStats,
    ) -> bool {
        let key = shadow.key();
        let cached = bss.pipelines.lock().unwrap().get(&key).copied();
        let pipeline = match cached {
            Some(pipeline) => {
                stats.pipeline_cache_hits += 1;
                pipeline
            }
            None => {
                if bss.failed.lock().unwrap().contains(&key) {
                    return false;
                }
                stats.pipeline_cache_misses += 1;
                if frame_index >= self.warmup_frames {
                    stats.pipeline_hitches += 1;
                    log::warn!(
                        "PipelineCache: Hitch building pipeline {:#018x} for '{}' on frame {frame_index}",
                        key.bits(),
                        bss.label()
                    );
                }
                let descriptor = shadow.descriptor(bss);
                match device.create_render_pipeline(&descriptor) {
                    Ok(pipeline) => {
                        bss.pipelines.lock().unwrap().insert(key, pipeline);
                        pipeline
                    }
                    Err(e) => {
                        stats.pipeline_failures += 1;
                        log::error!(
                            "Failed to create render pipeline {:#018x} for vertex shader '{}' ({:#018x}) and pixel shader {:?}: {e}\n{descriptor:#?}",
                            key.bits(),
                            bss.vertex_shader.label(),
                            bss.vertex_shader.bytecode_hash(),
                            bss.pixel_shader.as_ref().map(|s| (s.label(), s.bytecode_hash())),
                        );
                        bss.failed.lock().unwrap().insert(key);
                        return false;
                    }
                }
            }
        };
        if *current != Some(pipeline) {
            encoder.set_pipeline(pipeline);
            *current = Some(pipeline);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::release::DeferredReleaseQueue;
    use crate::mock::{MockEncoder, MockGraphicsDevice};
    use std::sync::atomic::Ordering;
    use strata_core::renderer::{RenderTargetBlendState, ShaderBindings, ShaderFunctionDescriptor};

    struct Fixture {
        device: MockGraphicsDevice,
        queue: DeferredReleaseQueue,
        registry: PipelineKeyRegistry,
        cache: PipelineCache,
        encoder: MockEncoder,
        stats: FrameStats,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                device: MockGraphicsDevice::new(),
                queue: DeferredReleaseQueue::new(),
                registry: PipelineKeyRegistry::new(),
                cache: PipelineCache::new(2),
                encoder: MockEncoder::new(),
                stats: FrameStats::default(),
            }
        }

        fn shader(&self, stage: ShaderStage, label: &'static str) -> Arc<Shader> {
            Arc::new(
                Shader::new(
                    &self.device,
                    &ShaderFunctionDescriptor {
                        label: Some(Cow::Borrowed(label)),
                        stage,
                        bytecode: Cow::Borrowed(label.as_bytes()),
                        entry_point: Cow::Borrowed("main"),
                    },
                    ShaderBindings::default(),
                    self.queue.sender(),
                )
                .unwrap(),
            )
        }

        fn bss(&mut self) -> Arc<BoundShaderState> {
            let vs = self.shader(ShaderStage::Vertex, "vs");
            let ps = self.shader(ShaderStage::Pixel, "ps");
            self.cache
                .bound_shader_state(&VertexLayout::default(), &vs, Some(&ps), self.queue.sender())
        }

        fn prepare(&mut self, shadow: &PipelineShadow, bss: &BoundShaderState, frame: u64, current: &mut Option<RenderPipelineId>) -> bool {
            self.cache
                .prepare_for_draw(&self.device, shadow, bss, frame, &mut self.encoder, current, &mut self.stats)
        }
    }

    fn rgba_pass() -> PassFormats {
        PassFormats {
            color: [Some(PixelFormat::Rgba8Unorm), None, None, None, None, None],
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_is_built_once_per_key() {
        let mut f = Fixture::new();
        let bss = f.bss();
        let mut shadow = PipelineShadow::new(&mut f.registry);
        shadow.set_render_target_formats(&rgba_pass(), &mut f.registry);

        let mut current = None;
        assert!(f.prepare(&shadow, &bss, 0, &mut current));
        assert!(f.prepare(&shadow, &bss, 0, &mut current));
        assert_eq!(f.device.render_pipelines_created.load(Ordering::Relaxed), 1);
        assert_eq!(f.stats.pipeline_cache_misses, 1);
        assert_eq!(f.stats.pipeline_cache_hits, 1);
        // Bound once: the second draw already had it.
        assert_eq!(f.encoder.take_calls().len(), 1);

        shadow.set_blend_state(&BlendStateObject::new(
            BlendState::uniform(RenderTargetBlendState::ALPHA_BLEND),
            &mut f.registry,
        ));
        assert!(f.prepare(&shadow, &bss, 5, &mut current));
        assert_eq!(f.device.render_pipelines_created.load(Ordering::Relaxed), 2);
        assert_eq!(bss.pipeline_count(), 2);
        assert_eq!(f.stats.pipeline_hitches, 1);
    }

    #[test]
    fn test_failed_keys_drop_draws_without_retrying() {
        let mut f = Fixture::new();
        let bss = f.bss();
        let shadow = PipelineShadow::new(&mut f.registry);
        f.device.fail_render_pipelines.store(true, Ordering::Relaxed);

        let mut current = None;
        assert!(!f.prepare(&shadow, &bss, 0, &mut current));
        assert!(!f.prepare(&shadow, &bss, 0, &mut current));
        assert_eq!(f.stats.pipeline_failures, 1);
        assert!(f.encoder.take_calls().is_empty());
        assert_eq!(current, None);
    }

    #[test]
    fn test_bound_shader_states_are_shared_while_alive() {
        let mut f = Fixture::new();
        let vs = f.shader(ShaderStage::Vertex, "vs");
        let ps = f.shader(ShaderStage::Pixel, "ps");
        let layout = VertexLayout::default();
        let a = f.cache.bound_shader_state(&layout, &vs, Some(&ps), f.queue.sender());
        let b = f.cache.bound_shader_state(&layout, &vs, Some(&ps), f.queue.sender());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.cache.live_bound_shader_states(), 1);

        drop(a);
        drop(b);
        assert_eq!(f.cache.live_bound_shader_states(), 0);
        let c = f.cache.bound_shader_state(&layout, &vs, None, f.queue.sender());
        assert!(c.pixel_shader().is_none());
    }

    #[test]
    fn test_dropping_a_bound_shader_state_releases_its_pipelines() {
        let mut f = Fixture::new();
        let bss = f.bss();
        let shadow = PipelineShadow::new(&mut f.registry);
        let mut current = None;
        f.prepare(&shadow, &bss, 0, &mut current);

        drop(bss);
        // The pipeline plus both shader functions.
        assert_eq!(f.queue.flush(&f.device), 3);
        assert!(f.device.destroyed().iter().any(|d| d.starts_with("render pipeline")));
    }

    #[test]
    #[should_panic(expected = "is not a vertex shader")]
    fn test_stage_mismatch_is_fatal() {
        let mut f = Fixture::new();
        let ps = f.shader(ShaderStage::Pixel, "ps");
        f.cache.bound_shader_state(&VertexLayout::default(), &ps, None, f.queue.sender());
    }
}
