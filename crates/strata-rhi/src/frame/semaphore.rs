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

//! Counting semaphore bounding CPU run-ahead.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// A counting semaphore with `depth` tokens, built on a bounded channel.
///
/// The submission thread takes a token before it starts recording a frame; a
/// [`SemaphoreSignal`] moved into the frame's completion handler gives it back
/// once the GPU is done.
#[derive(Debug)]
pub struct FrameSemaphore {
    tokens: Receiver<()>,
    returner: Sender<()>,
    depth: u32,
}

impl FrameSemaphore {
    /// Creates a semaphore holding `depth` tokens.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is 0.
    pub fn new(depth: u32) -> Self {
        assert!(depth > 0, "a frame semaphore needs at least one token");
        let (returner, tokens) = bounded(depth as usize);
        for _ in 0..depth {
            // The channel has exactly `depth` slots.
            let _ = returner.try_send(());
        }
        Self {
            tokens,
            returner,
            depth,
        }
    }

    /// Takes a token, blocking until one is returned if none is available.
    pub fn acquire(&self) {
        match self.tokens.try_recv() {
            Ok(()) => {}
            Err(TryRecvError::Empty) => {
                log::trace!("FrameSemaphore: {} frames in flight, waiting for the GPU", self.depth);
                // We hold a sender ourselves, so the channel can never disconnect.
                let _ = self.tokens.recv();
            }
            Err(TryRecvError::Disconnected) => unreachable!("the semaphore owns a sender"),
        }
    }

    /// Takes a token if one is available.
    pub fn try_acquire(&self) -> bool {
        self.tokens.try_recv().is_ok()
    }

    /// A handle that returns one token when signalled.
    pub fn signaller(&self) -> SemaphoreSignal {
        SemaphoreSignal(self.returner.clone())
    }

    /// Tokens currently available.
    pub fn available(&self) -> u32 {
        self.tokens.len() as u32
    }

    /// The total number of tokens.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Returns a token to a [`FrameSemaphore`]. Cheap to clone, `Send`.
#[derive(Debug, Clone)]
pub struct SemaphoreSignal(Sender<()>);

impl SemaphoreSignal {
    /// Returns one token.
    pub fn signal(&self) {
        if self.0.try_send(()).is_err() {
            log::warn!("FrameSemaphore: signalled more often than acquired");
        }
    }
}
