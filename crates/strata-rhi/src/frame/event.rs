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

//! Reusable completion events.
//!
//! An event is armed once per command buffer it tracks. Arming hands out a
//! monotonically increasing serial; the completion handler signals that serial.
//! A [`CompletionTicket`] is complete once the event has been signalled with a
//! serial at least as large as its own, which makes events safe to reuse
//! without resetting them.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use strata_core::renderer::CommandBufferId;

#[derive(Debug, Default)]
struct EventState {
    armed: u64,
    signalled: u64,
}

/// A CPU-visible event the GPU timeline signals.
#[derive(Debug, Default)]
pub struct CompletionEvent {
    state: Mutex<EventState>,
    condvar: Condvar,
}

impl CompletionEvent {
    /// Creates an event that has never been armed.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Arms the event for a new command buffer.
    pub fn arm(self: &Arc<Self>, command_buffer: CommandBufferId) -> CompletionTicket {
        let mut state = self.state.lock().unwrap();
        state.armed += 1;
        CompletionTicket {
            event: self.clone(),
            serial: state.armed,
            command_buffer,
        }
    }

    fn signal(&self, serial: u64) {
        let mut state = self.state.lock().unwrap();
        state.signalled = state.signalled.max(serial);
        self.condvar.notify_all();
    }

    fn is_signalled(&self, serial: u64) -> bool {
        self.state.lock().unwrap().signalled >= serial
    }

    fn wait(&self, serial: u64, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        while state.signalled < serial {
            match deadline {
                None => state = self.condvar.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    state = self.condvar.wait_timeout(state, deadline - now).unwrap().0;
                }
            }
        }
        true
    }
}

/// One armed use of a [`CompletionEvent`].
#[derive(Debug, Clone)]
pub struct CompletionTicket {
    event: Arc<CompletionEvent>,
    serial: u64,
    command_buffer: CommandBufferId,
}

impl CompletionTicket {
    /// Marks the tracked command buffer as complete. Called from the GPU timeline.
    pub fn signal(&self) {
        self.event.signal(self.serial);
    }

    /// `true` once the tracked command buffer has completed.
    pub fn is_complete(&self) -> bool {
        self.event.is_signalled(self.serial)
    }

    /// Blocks until completion or until `timeout` elapses. Returns whether the
    /// command buffer completed.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.event.wait(self.serial, Some(timeout))
    }

    /// Blocks until completion.
    pub fn wait_forever(&self) {
        self.event.wait(self.serial, None);
    }

    /// The command buffer this ticket tracks.
    pub fn command_buffer(&self) -> CommandBufferId {
        self.command_buffer
    }
}

/// Per-frame pools of completion events.
///
/// Slot `frame % depth` is used by frame `frame`; within a frame, each new
/// command buffer takes the next event of the slot. By the time a slot comes
/// around again the frame semaphore guarantees its previous users retired.
#[derive(Debug)]
pub struct EventRing {
    slots: Vec<Vec<Arc<CompletionEvent>>>,
    current_slot: usize,
    next_index: usize,
}

impl EventRing {
    /// Creates `depth` empty slots.
    pub fn new(depth: u32) -> Self {
        Self {
            slots: (0..depth.max(1)).map(|_| Vec::new()).collect(),
            current_slot: 0,
            next_index: 0,
        }
    }

    /// Switches to the slot of `frame` and resets the per-frame event index.
    pub fn begin_frame(&mut self, frame: u64) {
        self.current_slot = (frame % self.slots.len() as u64) as usize;
        self.next_index = 0;
    }

    /// Arms the next event of the current slot.
    pub fn next_ticket(&mut self, command_buffer: CommandBufferId) -> CompletionTicket {
        let slot = &mut self.slots[self.current_slot];
        if self.next_index == slot.len() {
            slot.push(CompletionEvent::new());
        }
        let ticket = slot[self.next_index].arm(command_buffer);
        self.next_index += 1;
        ticket
    }

    /// Events allocated across all slots.
    pub fn allocated_events(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reused_event_tracks_serials() {
        let event = CompletionEvent::new();
        let first = event.arm(CommandBufferId(1));
        let second = event.arm(CommandBufferId(2));
        assert!(!first.is_complete());

        first.signal();
        assert!(first.is_complete());
        assert!(!second.is_complete());

        second.signal();
        assert!(second.is_complete());
    }

    #[test]
    fn test_wait_times_out() {
        let ticket = CompletionEvent::new().arm(CommandBufferId(7));
        assert!(!ticket.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_returns_when_signalled_from_another_thread() {
        let ticket = CompletionEvent::new().arm(CommandBufferId(3));
        let remote = ticket.clone();
        let handle = thread::spawn(move || remote.signal());
        assert!(ticket.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_ring_reuses_events_per_slot() {
        let mut ring = EventRing::new(2);
        ring.begin_frame(0);
        ring.next_ticket(CommandBufferId(0));
        ring.next_ticket(CommandBufferId(1));
        ring.begin_frame(1);
        ring.next_ticket(CommandBufferId(2));
        ring.begin_frame(2);
        ring.next_ticket(CommandBufferId(3));
        ring.next_ticket(CommandBufferId(4));
        assert_eq!(ring.allocated_events(), 3);
    }
}
