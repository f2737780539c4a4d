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

//! Frame pacing hooks.

use std::time::{Duration, Instant};

/// Decides when a frame may be handed to the GPU.
///
/// The context calls [`FramePacer::wait_for_next_frame`] right before the
/// frame's command buffer is committed.
pub trait FramePacer: Send {
    /// Blocks until the next frame is due.
    fn wait_for_next_frame(&mut self);
}

/// Paces frames to a fixed interval.
#[derive(Debug)]
pub struct IntervalPacer {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl IntervalPacer {
    /// Paces to one frame every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: None,
        }
    }

    /// Paces to `hz` frames per second.
    pub fn from_refresh_rate(hz: u32) -> Self {
        Self::new(Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1))))
    }

    /// The pacing interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FramePacer for IntervalPacer {
    fn wait_for_next_frame(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.next_deadline {
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
        // Late frames restart the cadence instead of bursting to catch up.
        let base = self.next_deadline.map_or(now, |d| d.max(now));
        self.next_deadline = Some(base + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_is_respected() {
        let mut pacer = IntervalPacer::new(Duration::from_millis(15));
        let start = Instant::now();
        pacer.wait_for_next_frame();
        pacer.wait_for_next_frame();
        pacer.wait_for_next_frame();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_refresh_rate_conversion() {
        let pacer = IntervalPacer::from_refresh_rate(50);
        assert_eq!(pacer.interval(), Duration::from_millis(20));
    }
}
