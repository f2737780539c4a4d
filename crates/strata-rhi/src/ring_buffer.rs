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

//! Bump-pointer transient memory with wraparound.
//!
//! Per-draw data that does not outlive a frame (packed constants, user-pointer
//! geometry, occlusion counters) is carved out of one large buffer. There is no
//! free: when an allocation does not fit in the remaining space the cursor wraps
//! to the start. Reuse is only safe because at most `frames_in_flight` frames of
//! data are alive at once; the ring must be sized accordingly.

use strata_core::renderer::{BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError};
use std::borrow::Cow;

/// The allocation cursor of a ring, independent of any GPU buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingCursor {
    capacity: u64,
    default_alignment: u64,
    offset: u64,
    wraps: u64,
    bytes_allocated: u64,
}

impl RingCursor {
    /// Creates a cursor over `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `default_alignment` is not a power of two.
    pub fn new(capacity: u64, default_alignment: u64) -> Self {
        assert!(
            default_alignment.is_power_of_two(),
            "ring alignment {default_alignment} is not a power of two"
        );
        Self {
            capacity,
            default_alignment,
            offset: 0,
            wraps: 0,
            bytes_allocated: 0,
        }
    }

    /// Reserves `size` bytes and returns their offset.
    ///
    /// The cursor is first aligned up to `alignment` (the default alignment when
    /// 0). If the aligned region does not fit, the cursor wraps to 0 and the
    /// allocation starts there, possibly aliasing data the GPU has not consumed
    /// yet.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the ring capacity.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> u64 {
        let alignment = if alignment == 0 {
            self.default_alignment
        } else {
            alignment
        };
        assert!(
            size <= self.capacity,
            "ring allocation of {size} bytes exceeds the capacity of {} bytes",
            self.capacity
        );

        let mut offset = self.offset.next_multiple_of(alignment);
        if offset + size > self.capacity {
            log::trace!(
                "RingBuffer: wrapping at offset {offset} ({size} bytes requested, capacity {})",
                self.capacity
            );
            offset = 0;
            self.wraps += 1;
        }
        self.offset = offset + size;
        self.bytes_allocated += size;
        offset
    }

    /// The total size of the ring in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The alignment used when an allocation asks for 0.
    pub fn default_alignment(&self) -> u64 {
        self.default_alignment
    }

    /// The current write cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// How many times the cursor wrapped to the start.
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Total bytes handed out since creation.
    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }
}

/// A [`RingCursor`] backed by a GPU buffer.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: BufferId,
    cursor: RingCursor,
    label: &'static str,
}

impl RingBuffer {
    /// Allocates the backing buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if the buffer cannot be created.
    pub fn new(
        device: &dyn GraphicsDevice,
        capacity: u64,
        default_alignment: u64,
        usage: BufferUsage,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size: capacity,
            usage: usage | BufferUsage::MAP_WRITE,
        })?;
        log::debug!("RingBuffer({label}): {capacity} bytes, aligned to {default_alignment}");
        Ok(Self {
            buffer,
            cursor: RingCursor::new(capacity, default_alignment),
            label,
        })
    }

    /// See [`RingCursor::allocate`].
    pub fn allocate(&mut self, size: u64, alignment: u64) -> u64 {
        self.cursor.allocate(size, alignment)
    }

    /// Allocates room for `data`, copies it in and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if the device rejects the write.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
        alignment: u64,
    ) -> Result<u64, ResourceError> {
        let offset = self.cursor.allocate(data.len() as u64, alignment);
        device.write_buffer(self.buffer, offset, data)?;
        Ok(offset)
    }

    /// The backing buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// The allocation cursor.
    pub fn cursor(&self) -> &RingCursor {
        &self.cursor
    }

    /// Releases the backing buffer. The ring must not be used afterwards.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.buffer) {
            log::warn!("RingBuffer({}): Failed to destroy buffer: {:?}", self.label, e);
        }
    }
}
