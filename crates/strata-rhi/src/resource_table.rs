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

//! Uniform buffers and the per-stage resource binding table.
//!
//! A uniform buffer carries constant data plus an ordered list of resources
//! (textures, samplers, buffers). A shader's [`ShaderResourceTable`] says which
//! of those resources land on which hardware slots. Before a draw, every bound
//! uniform buffer that the shader reads and that changed since the last draw is
//! walked once and its resources are bound.

use crate::frame::release::{GpuObject, ReleaseSender};
use crate::stage::ShaderStageBinder;
use crate::surface::Surface;
use std::borrow::Cow;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use strata_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError, SamplerDescriptor,
    SamplerId, ShaderResourceTable, TextureId, MAX_UNIFORM_BUFFERS_PER_STAGE,
};

static NEXT_UNIFORM_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// The kind of a resource slot in a uniform buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformResourceType {
    /// A texture.
    Texture,
    /// A sampler.
    Sampler,
    /// A buffer range.
    Buffer,
}

/// The shape of a uniform buffer: constant data size and resource slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBufferLayout {
    name: String,
    constant_size: u32,
    resources: Vec<UniformResourceType>,
    hash: u32,
}

impl UniformBufferLayout {
    /// Creates a layout and computes its hash.
    ///
    /// The hash only depends on the constant size and the resource types, so
    /// the shader compiler can compute the same value offline.
    pub fn new(name: impl Into<String>, constant_size: u32, resources: Vec<UniformResourceType>) -> Self {
        Self {
            hash: layout_hash(constant_size, &resources),
            name: name.into(),
            constant_size,
            resources,
        }
    }

    /// The debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the constant data in bytes.
    pub fn constant_size(&self) -> u32 {
        self.constant_size
    }

    /// The resource slots, in order.
    pub fn resources(&self) -> &[UniformResourceType] {
        &self.resources
    }

    /// The layout hash checked against shader resource tables.
    pub fn hash(&self) -> u32 {
        self.hash
    }
}

/// Computes the layout hash of a uniform buffer layout.
pub fn layout_hash(constant_size: u32, resources: &[UniformResourceType]) -> u32 {
    let mut hasher = ahash::RandomState::with_seeds(
        0x5f3a_91c2_d7e4_0b68,
        0x0c1d_2e3f_4a5b_6c7d,
        0x8e9f_a0b1_c2d3_e4f5,
        0x1357_9bdf_2468_ace0,
    )
    .build_hasher();
    constant_size.hash(&mut hasher);
    resources.hash(&mut hasher);
    let full = hasher.finish();
    (full ^ (full >> 32)) as u32
}

/// A sampler object whose device sampler is released when the last owner drops it.
#[derive(Debug)]
pub struct SamplerState {
    id: SamplerId,
    release: ReleaseSender,
}

impl SamplerState {
    /// Creates the device sampler.
    pub fn new(
        device: &dyn GraphicsDevice,
        descriptor: &SamplerDescriptor,
        release: ReleaseSender,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            id: device.create_sampler(descriptor)?,
            release,
        })
    }

    /// The device sampler.
    pub fn id(&self) -> SamplerId {
        self.id
    }
}

impl Drop for SamplerState {
    fn drop(&mut self) {
        self.release.release(GpuObject::Sampler(self.id));
    }
}

/// A resource referenced by a uniform buffer.
#[derive(Debug, Clone)]
pub enum UniformResource {
    /// A surface, sampled through its single-sampled texture.
    Texture(Arc<Surface>),
    /// A sampler.
    Sampler(Arc<SamplerState>),
    /// A buffer range.
    Buffer(BufferId, u64),
}

impl UniformResource {
    fn resource_type(&self) -> UniformResourceType {
        match self {
            UniformResource::Texture(_) => UniformResourceType::Texture,
            UniformResource::Sampler(_) => UniformResourceType::Sampler,
            UniformResource::Buffer(..) => UniformResourceType::Buffer,
        }
    }

    fn resolve(&self) -> ResolvedResource {
        match self {
            UniformResource::Texture(surface) => ResolvedResource::Texture(surface.texture()),
            UniformResource::Sampler(sampler) => ResolvedResource::Sampler(sampler.id()),
            UniformResource::Buffer(buffer, offset) => ResolvedResource::Buffer(*buffer, *offset),
        }
    }
}

/// A uniform buffer resource reduced to device handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedResource {
    /// A texture, or nothing if the surface has none attached.
    Texture(Option<TextureId>),
    /// A sampler.
    Sampler(SamplerId),
    /// A buffer range.
    Buffer(BufferId, u64),
}

/// Immutable constant data plus resources, shared between draws.
#[derive(Debug)]
pub struct UniformBuffer {
    unique_id: u64,
    layout: Arc<UniformBufferLayout>,
    contents: Vec<u8>,
    resources: Vec<UniformResource>,
    gpu_buffer: Option<BufferId>,
    resolved: Mutex<Option<(u32, Arc<[ResolvedResource]>)>>,
    release: Option<ReleaseSender>,
}

impl UniformBuffer {
    /// Creates a uniform buffer and uploads its constants to a device buffer.
    ///
    /// # Panics
    ///
    /// Panics if `contents` or `resources` do not match `layout`.
    pub fn new(
        device: &dyn GraphicsDevice,
        layout: Arc<UniformBufferLayout>,
        contents: &[u8],
        resources: Vec<UniformResource>,
        release: ReleaseSender,
    ) -> Result<Self, ResourceError> {
        let mut buffer = Self::cpu_only(layout, contents, resources);
        if !contents.is_empty() {
            let id = device.create_buffer_with_data(
                &BufferDescriptor {
                    label: Some(Cow::Borrowed(buffer.layout.name())),
                    size: contents.len() as u64,
                    usage: BufferUsage::UNIFORM | BufferUsage::MAP_WRITE,
                },
                contents,
            )?;
            buffer.gpu_buffer = Some(id);
        }
        buffer.release = Some(release);
        Ok(buffer)
    }

    /// Creates a uniform buffer without device backing. It can feed emulated
    /// (packed) uniform buffers and resource tables, but not regular bindings.
    ///
    /// # Panics
    ///
    /// Panics if `contents` or `resources` do not match `layout`.
    pub fn cpu_only(
        layout: Arc<UniformBufferLayout>,
        contents: &[u8],
        resources: Vec<UniformResource>,
    ) -> Self {
        assert_eq!(
            contents.len(),
            layout.constant_size() as usize,
            "constant data does not match the size of layout '{}'",
            layout.name()
        );
        assert!(
            resources.len() == layout.resources().len()
                && resources
                    .iter()
                    .zip(layout.resources())
                    .all(|(resource, expected)| resource.resource_type() == *expected),
            "resources do not match layout '{}'",
            layout.name()
        );
        Self {
            unique_id: NEXT_UNIFORM_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            layout,
            contents: contents.to_vec(),
            resources,
            gpu_buffer: None,
            resolved: Mutex::new(None),
            release: None,
        }
    }

    /// An id unique among all uniform buffers created by this process.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    /// The layout.
    pub fn layout(&self) -> &UniformBufferLayout {
        &self.layout
    }

    /// The constant data.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// The device copy of the constant data, if any.
    pub fn gpu_buffer(&self) -> Option<BufferId> {
        self.gpu_buffer
    }

    /// Resolves the resources to device handles.
    ///
    /// With an `epoch`, the resolution is cached and reused until a
    /// different epoch is asked for.
    pub fn resolve_resources(&self, epoch: Option<u32>) -> Arc<[ResolvedResource]> {
        let Some(epoch) = epoch else {
            return self.resolve_now();
        };
        let mut cached = self.resolved.lock().unwrap();
        if let Some((cached_epoch, resolved)) = cached.as_ref() {
            if *cached_epoch == epoch {
                return resolved.clone();
            }
        }
        let resolved = self.resolve_now();
        *cached = Some((epoch, resolved.clone()));
        resolved
    }

    fn resolve_now(&self) -> Arc<[ResolvedResource]> {
        self.resources.iter().map(UniformResource::resolve).collect()
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        if let (Some(release), Some(buffer)) = (&self.release, self.gpu_buffer) {
            release.release(GpuObject::Buffer(buffer));
        }
    }
}

/// The uniform buffers bound to one shader stage, with their dirty mask.
#[derive(Debug)]
pub struct StageResourceBindings {
    buffers: [Option<Arc<UniformBuffer>>; MAX_UNIFORM_BUFFERS_PER_STAGE],
    dirty: u32,
}

impl Default for StageResourceBindings {
    fn default() -> Self {
        Self {
            buffers: std::array::from_fn(|_| None),
            dirty: 0,
        }
    }
}

impl StageResourceBindings {
    /// Binds `buffer` at `index` and marks the slot dirty.
    pub fn set(&mut self, index: usize, buffer: Arc<UniformBuffer>) {
        assert!(
            index < MAX_UNIFORM_BUFFERS_PER_STAGE,
            "uniform buffer index {index} out of range"
        );
        self.buffers[index] = Some(buffer);
        self.dirty |= 1 << index;
    }

    /// The buffer bound at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<UniformBuffer>> {
        self.buffers.get(index).and_then(Option::as_ref)
    }

    /// Marks every bound slot dirty.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = self
            .buffers
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .fold(0, |mask, (i, _)| mask | (1 << i));
    }

    /// The dirty mask, bit `n` for slot `n`.
    pub fn dirty_mask(&self) -> u32 {
        self.dirty
    }

    /// Unbinds everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Binds the device buffers of dirty uniform buffers at their own index.
///
/// Used by shaders reading uniform buffers natively. Must run before
/// [`set_resources_from_tables`], which clears the dirty mask.
pub fn bind_uniform_buffers(
    binder: &mut dyn ShaderStageBinder,
    bindings: &StageResourceBindings,
    num_uniform_buffers: u32,
) {
    let used = if num_uniform_buffers >= 32 {
        u32::MAX
    } else {
        (1u32 << num_uniform_buffers) - 1
    };
    let mut dirty = bindings.dirty & used;
    while dirty != 0 {
        let index = dirty.trailing_zeros();
        dirty &= dirty - 1;
        match bindings.get(index as usize).and_then(|b| b.gpu_buffer()) {
            Some(buffer) => binder.bind_buffer(index, buffer, 0),
            None => log::warn!(
                "Uniform buffer {index} of the {:?} stage has no device copy",
                binder.stage()
            ),
        }
    }
}

/// Binds the resources of every dirty uniform buffer the table reads, then
/// clears the dirty mask.
///
/// Buffers are visited lowest index first; for each one textures are bound,
/// then samplers, then buffers. Returns the number of uniform buffers visited.
///
/// # Panics
///
/// Panics if a bound uniform buffer's layout hash differs from the one the
/// table expects, or if a map entry points at a resource of the wrong kind.
pub fn set_resources_from_tables(
    binder: &mut dyn ShaderStageBinder,
    bindings: &mut StageResourceBindings,
    table: &ShaderResourceTable,
    epoch: Option<u32>,
) -> u32 {
    let mut dirty = table.resource_table_bits & bindings.dirty;
    let mut visited = 0;
    while dirty != 0 {
        let index = dirty.trailing_zeros() as usize;
        dirty &= dirty - 1;

        let Some(buffer) = bindings.get(index) else {
            continue;
        };
        match table.layout_hashes.get(index) {
            Some(&expected) if expected == buffer.layout().hash() => {}
            expected => panic!(
                "uniform buffer '{}' bound at {index} of the {:?} stage has layout hash {:#010x}, the shader expects {:?}",
                buffer.layout().name(),
                binder.stage(),
                buffer.layout().hash(),
                expected
            ),
        }

        let resolved = buffer.resolve_resources(epoch);
        for entry in table.texture_map.entries_for(index) {
            match resolved.get(entry.resource_index() as usize) {
                Some(ResolvedResource::Texture(texture)) => {
                    binder.bind_texture(entry.bind_index(), *texture)
                }
                other => panic!(
                    "resource {} of '{}' is not a texture: {other:?}",
                    entry.resource_index(),
                    buffer.layout().name()
                ),
            }
        }
        for entry in table.sampler_map.entries_for(index) {
            match resolved.get(entry.resource_index() as usize) {
                Some(ResolvedResource::Sampler(sampler)) => {
                    binder.bind_sampler(entry.bind_index(), Some(*sampler))
                }
                other => panic!(
                    "resource {} of '{}' is not a sampler: {other:?}",
                    entry.resource_index(),
                    buffer.layout().name()
                ),
            }
        }
        for entry in table.buffer_map.entries_for(index) {
            match resolved.get(entry.resource_index() as usize) {
                Some(ResolvedResource::Buffer(id, offset)) => {
                    binder.bind_buffer(entry.bind_index(), *id, *offset)
                }
                other => panic!(
                    "resource {} of '{}' is not a buffer: {other:?}",
                    entry.resource_index(),
                    buffer.layout().name()
                ),
            }
        }
        visited += 1;
    }
    bindings.dirty = 0;
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::release::DeferredReleaseQueue;
    use crate::mock::{MockGraphicsDevice, RecordingBinder};
    use strata_core::renderer::{
        Extent2D, PixelFormat, ResourceMap, ResourceTableEntry, SampleCount, TextureDescriptor,
        TextureUsage,
    };

    fn material_layout() -> Arc<UniformBufferLayout> {
        Arc::new(UniformBufferLayout::new(
            "Material",
            16,
            vec![UniformResourceType::Texture, UniformResourceType::Sampler],
        ))
    }

    fn surface(device: &MockGraphicsDevice, queue: &DeferredReleaseQueue) -> Arc<Surface> {
        Arc::new(
            Surface::new(
                device,
                &TextureDescriptor {
                    label: None,
                    size: Extent2D {
                        width: 4,
                        height: 4,
                    },
                    array_layer_count: 1,
                    mip_level_count: 1,
                    sample_count: SampleCount::X1,
                    format: PixelFormat::Rgba8Unorm,
                    usage: TextureUsage::SHADER_READ,
                },
                queue.sender(),
            )
            .unwrap(),
        )
    }

    fn table_for(layout: &UniformBufferLayout, slot: usize) -> ShaderResourceTable {
        let mut layout_hashes = vec![0; slot + 1];
        layout_hashes[slot] = layout.hash();
        ShaderResourceTable {
            resource_table_bits: 1 << slot,
            layout_hashes,
            texture_map: ResourceMap::build(slot + 1, &[ResourceTableEntry::new(slot as u32, 0, 3)]),
            sampler_map: ResourceMap::build(slot + 1, &[ResourceTableEntry::new(slot as u32, 1, 3)]),
            buffer_map: ResourceMap::default(),
        }
    }

    #[test]
    fn test_layout_hash_is_stable_and_discriminating() {
        let a = layout_hash(16, &[UniformResourceType::Texture]);
        assert_eq!(a, layout_hash(16, &[UniformResourceType::Texture]));
        assert_ne!(a, layout_hash(32, &[UniformResourceType::Texture]));
        assert_ne!(a, layout_hash(16, &[UniformResourceType::Sampler]));
    }

    #[test]
    fn test_dirty_buffers_bind_textures_then_samplers() {
        let device = MockGraphicsDevice::new();
        let queue = DeferredReleaseQueue::new();
        let layout = material_layout();
        let albedo = surface(&device, &queue);
        let sampler = Arc::new(
            SamplerState::new(&device, &SamplerDescriptor::default(), queue.sender()).unwrap(),
        );
        let buffer = Arc::new(UniformBuffer::cpu_only(
            layout.clone(),
            &[0; 16],
            vec![
                UniformResource::Texture(albedo.clone()),
                UniformResource::Sampler(sampler.clone()),
            ],
        ));

        let mut bindings = StageResourceBindings::default();
        bindings.set(2, buffer);
        let table = table_for(&layout, 2);

        let mut binder = RecordingBinder::default();
        assert_eq!(set_resources_from_tables(&mut binder, &mut bindings, &table, None), 1);
        assert_eq!(binder.textures, vec![(3, albedo.texture())]);
        assert_eq!(binder.samplers, vec![(3, Some(sampler.id()))]);
        assert_eq!(bindings.dirty_mask(), 0);

        // Nothing dirty: nothing rebound.
        let mut idle = RecordingBinder::default();
        assert_eq!(set_resources_from_tables(&mut idle, &mut bindings, &table, None), 0);
        assert!(idle.textures.is_empty());
    }

    #[test]
    fn test_buffers_outside_the_table_are_skipped_but_cleaned() {
        let layout = Arc::new(UniformBufferLayout::new("View", 0, vec![]));
        let mut bindings = StageResourceBindings::default();
        bindings.set(0, Arc::new(UniformBuffer::cpu_only(layout.clone(), &[], vec![])));
        let table = ShaderResourceTable::default();

        let mut binder = RecordingBinder::default();
        assert_eq!(set_resources_from_tables(&mut binder, &mut bindings, &table, None), 0);
        assert_eq!(bindings.dirty_mask(), 0);
    }

    #[test]
    #[should_panic(expected = "layout hash")]
    fn test_layout_mismatch_is_fatal() {
        let layout = material_layout();
        let other = Arc::new(UniformBufferLayout::new("Other", 0, vec![]));
        let mut bindings = StageResourceBindings::default();
        bindings.set(0, Arc::new(UniformBuffer::cpu_only(other, &[], vec![])));
        let table = table_for(&layout, 0);
        set_resources_from_tables(&mut RecordingBinder::default(), &mut bindings, &table, None);
    }

    #[test]
    fn test_epoch_caches_resolution() {
        let layout = Arc::new(UniformBufferLayout::new(
            "Post",
            0,
            vec![UniformResourceType::Texture],
        ));
        let back_buffer = Arc::new(Surface::back_buffer(PixelFormat::Bgra8Unorm, Extent2D::default()));
        back_buffer.set_texture(Some(TextureId(100)));
        let buffer = UniformBuffer::cpu_only(layout, &[], vec![UniformResource::Texture(back_buffer.clone())]);

        let first = buffer.resolve_resources(Some(7));
        back_buffer.set_texture(Some(TextureId(200)));
        assert_eq!(buffer.resolve_resources(Some(7)), first);
        assert_eq!(
            &*buffer.resolve_resources(Some(8)),
            &[ResolvedResource::Texture(Some(TextureId(200)))]
        );
        assert_eq!(
            &*buffer.resolve_resources(None),
            &[ResolvedResource::Texture(Some(TextureId(200)))]
        );
    }

    #[test]
    fn test_regular_uniform_buffers_bind_at_their_index() {
        let device = MockGraphicsDevice::new();
        let queue = DeferredReleaseQueue::new();
        let layout = Arc::new(UniformBufferLayout::new("View", 64, vec![]));
        let view = Arc::new(UniformBuffer::new(&device, layout, &[1; 64], vec![], queue.sender()).unwrap());
        let mut bindings = StageResourceBindings::default();
        bindings.set(1, view.clone());
        bindings.set(5, view.clone());

        let mut binder = RecordingBinder::default();
        bind_uniform_buffers(&mut binder, &bindings, 4);
        let buffer = view.gpu_buffer().unwrap();
        assert_eq!(binder.buffers, vec![(1, buffer, 0)]);
    }

    #[test]
    fn test_mark_all_dirty_only_covers_bound_slots() {
        let layout = Arc::new(UniformBufferLayout::new("View", 0, vec![]));
        let mut bindings = StageResourceBindings::default();
        bindings.set(4, Arc::new(UniformBuffer::cpu_only(layout, &[], vec![])));
        set_resources_from_tables(
            &mut RecordingBinder::default(),
            &mut bindings,
            &ShaderResourceTable::default(),
            None,
        );
        bindings.mark_all_dirty();
        assert_eq!(bindings.dirty_mask(), 1 << 4);
    }
}
