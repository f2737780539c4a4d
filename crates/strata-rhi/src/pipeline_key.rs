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

//! Compact hashing of the pipeline-relevant render state.
//!
//! Every piece of state that requires a distinct pipeline object is squeezed
//! into a single `u64`, laid out as:
//!
//! | bits    | field                                   |
//! |---------|-----------------------------------------|
//! | 0..30   | blend key of render targets 0..6 (5 each) |
//! | 30..54  | format key of render targets 0..6 (4 each) |
//! | 54      | depth attachment present                |
//! | 55      | stencil attachment present              |
//! | 56..59  | sample count, as `log2(samples) + 1`    |
//!
//! Only the presence of depth and stencil attachments is recorded, not their
//! formats: passes whose depth attachments differ only in format share one
//! pipeline, built for whichever format was bound first. Renderers keep a
//! single depth format per color configuration.
//!
//! Blend states and pixel formats are mapped to small dense keys by a
//! [`PipelineKeyRegistry`]. Exceeding the key space is a fatal configuration
//! error rather than a silent collision.

use ahash::AHashMap;
use strata_core::renderer::{PixelFormat, RenderTargetBlendState, SampleCount, MAX_RENDER_TARGETS};

/// Bits used by one blend key.
pub const BLEND_KEY_BITS: u32 = 5;
/// Number of distinct blend keys.
pub const MAX_BLEND_KEYS: usize = 1 << BLEND_KEY_BITS;
/// Bits used by one format key.
pub const FORMAT_KEY_BITS: u32 = 4;
/// Number of distinct format keys, including key 0 which means "no target".
pub const MAX_FORMAT_KEYS: usize = 1 << FORMAT_KEY_BITS;

const BLEND_SHIFT: u32 = 0;
const FORMAT_SHIFT: u32 = BLEND_SHIFT + BLEND_KEY_BITS * MAX_RENDER_TARGETS as u32;
const DEPTH_SHIFT: u32 = FORMAT_SHIFT + FORMAT_KEY_BITS * MAX_RENDER_TARGETS as u32;
const STENCIL_SHIFT: u32 = DEPTH_SHIFT + 1;
const SAMPLE_SHIFT: u32 = STENCIL_SHIFT + 1;
const SAMPLE_BITS: u32 = 3;

/// The dense key of a blend state.
pub type BlendKey = u8;
/// The dense key of a render target format. 0 means no target is bound.
pub type FormatKey = u8;

/// A 64-bit digest of the state that selects a pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PipelineKey(u64);

impl PipelineKey {
    /// Returns the raw bits.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Sets the blend key of render target `slot`.
    pub fn set_blend_key(&mut self, slot: usize, key: BlendKey) {
        debug_assert!((key as usize) < MAX_BLEND_KEYS);
        self.set_field(BLEND_SHIFT + slot as u32 * BLEND_KEY_BITS, BLEND_KEY_BITS, key as u64);
    }

    /// The blend key of render target `slot`.
    pub fn blend_key(&self, slot: usize) -> BlendKey {
        self.field(BLEND_SHIFT + slot as u32 * BLEND_KEY_BITS, BLEND_KEY_BITS) as BlendKey
    }

    /// Sets the format key of render target `slot`.
    pub fn set_format_key(&mut self, slot: usize, key: FormatKey) {
        debug_assert!((key as usize) < MAX_FORMAT_KEYS);
        self.set_field(FORMAT_SHIFT + slot as u32 * FORMAT_KEY_BITS, FORMAT_KEY_BITS, key as u64);
    }

    /// The format key of render target `slot`.
    pub fn format_key(&self, slot: usize) -> FormatKey {
        self.field(FORMAT_SHIFT + slot as u32 * FORMAT_KEY_BITS, FORMAT_KEY_BITS) as FormatKey
    }

    /// Records whether a depth attachment is bound. The depth format itself
    /// is not part of the key.
    pub fn set_depth_enabled(&mut self, enabled: bool) {
        self.set_field(DEPTH_SHIFT, 1, enabled as u64);
    }

    /// Records whether a stencil attachment is bound.
    pub fn set_stencil_enabled(&mut self, enabled: bool) {
        self.set_field(STENCIL_SHIFT, 1, enabled as u64);
    }

    /// Records the sample count of the bound attachments.
    pub fn set_sample_count(&mut self, samples: SampleCount) {
        let encoded = samples.count().trailing_zeros() as u64 + 1;
        self.set_field(SAMPLE_SHIFT, SAMPLE_BITS, encoded);
    }

    /// The recorded sample count, or `None` if it was never set.
    pub fn sample_count(&self) -> Option<SampleCount> {
        match self.field(SAMPLE_SHIFT, SAMPLE_BITS) {
            0 => None,
            encoded => SampleCount::from_count(1 << (encoded - 1)),
        }
    }

    fn set_field(&mut self, shift: u32, bits: u32, value: u64) {
        let mask = ((1u64 << bits) - 1) << shift;
        self.0 = (self.0 & !mask) | ((value << shift) & mask);
    }

    fn field(&self, shift: u32, bits: u32) -> u64 {
        (self.0 >> shift) & ((1u64 << bits) - 1)
    }
}

/// Assigns dense keys to blend states and render target formats.
///
/// Keys are handed out in first-seen order and never recycled.
#[derive(Debug, Default)]
pub struct PipelineKeyRegistry {
    blend_keys: AHashMap<RenderTargetBlendState, BlendKey>,
    format_keys: AHashMap<PixelFormat, FormatKey>,
}

impl PipelineKeyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key of `state`, assigning the next free one if needed.
    ///
    /// # Panics
    ///
    /// Panics when more than [`MAX_BLEND_KEYS`] distinct blend states are
    /// registered.
    pub fn blend_key(&mut self, state: &RenderTargetBlendState) -> BlendKey {
        if let Some(key) = self.blend_keys.get(state) {
            return *key;
        }
        let key = self.blend_keys.len();
        assert!(
            key < MAX_BLEND_KEYS,
            "too many unique blend states to fit in the pipeline key ({MAX_BLEND_KEYS} max)"
        );
        log::trace!("PipelineKeyRegistry: blend key {key} assigned to {state:?}");
        self.blend_keys.insert(*state, key as BlendKey);
        key as BlendKey
    }

    /// Returns the key of `format`, assigning the next free one if needed.
    /// `None` maps to key 0.
    ///
    /// # Panics
    ///
    /// Panics when more than `MAX_FORMAT_KEYS - 1` distinct formats are
    /// registered.
    pub fn format_key(&mut self, format: Option<PixelFormat>) -> FormatKey {
        let Some(format) = format else {
            return 0;
        };
        if let Some(key) = self.format_keys.get(&format) {
            return *key;
        }
        let key = self.format_keys.len() + 1;
        assert!(
            key < MAX_FORMAT_KEYS,
            "too many unique render target formats to fit in the pipeline key ({} max)",
            MAX_FORMAT_KEYS - 1
        );
        log::trace!("PipelineKeyRegistry: format key {key} assigned to {format:?}");
        self.format_keys.insert(format, key as FormatKey);
        key as FormatKey
    }

    /// Number of blend keys handed out.
    pub fn blend_key_count(&self) -> usize {
        self.blend_keys.len()
    }
}
