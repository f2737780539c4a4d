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

//! Occlusion query bookkeeping.

use crate::frame::event::CompletionTicket;

/// A visibility counter living in the query ring buffer.
///
/// Beginning the query carves a fresh 8-byte counter out of the ring and zeroes
/// it. Ending it remembers which command buffer recorded the counted draws; the
/// result can only be read once that command buffer completed.
#[derive(Debug, Default)]
pub struct OcclusionQuery {
    offset: Option<u64>,
    ticket: Option<CompletionTicket>,
    result: Option<u64>,
}

impl OcclusionQuery {
    /// Creates a query that has never been issued.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&mut self, offset: u64) {
        self.offset = Some(offset);
        self.ticket = None;
        self.result = None;
    }

    pub(crate) fn end(&mut self, ticket: Option<CompletionTicket>) {
        self.ticket = ticket;
    }

    pub(crate) fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub(crate) fn ticket(&self) -> Option<&CompletionTicket> {
        self.ticket.as_ref()
    }

    pub(crate) fn store_result(&mut self, samples: u64) {
        self.result = Some(samples);
    }

    /// The last result read back, if any.
    pub fn cached_result(&self) -> Option<u64> {
        self.result
    }

    /// `true` between a begin and the matching result readback.
    pub fn is_pending(&self) -> bool {
        self.offset.is_some() && self.result.is_none()
    }
}
