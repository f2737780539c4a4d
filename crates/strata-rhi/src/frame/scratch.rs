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

//! Per-thread scratch memory for staging uploads.

use std::thread::{self, ThreadId};

/// A reusable byte arena owned by the submission thread.
///
/// User-pointer draws are filled through it before being copied into the ring
/// buffer. The arena is reset at the end of every frame and dropped entirely
/// when the owning thread gives up ownership.
#[derive(Debug, Default)]
pub struct ScratchPool {
    bytes: Vec<u8>,
    owner: Option<ThreadId>,
    high_water: usize,
}

impl ScratchPool {
    /// Creates an empty, unowned pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the pool to the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if another thread still owns the pool.
    pub fn acquire(&mut self) {
        let current = thread::current().id();
        match self.owner {
            Some(owner) if owner != current => {
                panic!("scratch pool is owned by {owner:?}, cannot hand it to {current:?}")
            }
            _ => self.owner = Some(current),
        }
    }

    /// Unbinds the pool and frees its memory.
    pub fn release(&mut self) {
        self.owner = None;
        self.bytes = Vec::new();
    }

    /// The owning thread, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Hands out `len` zeroed bytes, lets `fill` write them and returns them.
    pub fn stage(&mut self, len: usize, fill: impl FnOnce(&mut [u8])) -> &[u8] {
        self.bytes.clear();
        self.bytes.resize(len, 0);
        self.high_water = self.high_water.max(len);
        fill(&mut self.bytes);
        &self.bytes
    }

    /// Forgets staged data, keeping the allocation.
    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    /// The largest staging request seen so far.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}
