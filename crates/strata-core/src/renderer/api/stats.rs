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

//! Counters describing the work recorded by the command-submission layer.

/// A collection of counters for a single frame, or accumulated over a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// A sequential counter for frames; for lifetime totals, the number of frames ended.
    pub frame_number: u64,
    /// The number of draw calls issued.
    pub draw_calls: u32,
    /// The number of compute dispatches issued.
    pub dispatches: u32,
    /// The number of primitives submitted.
    pub primitives: u64,
    /// Draws that found their pipeline object in the cache.
    pub pipeline_cache_hits: u32,
    /// Draws that had to build a pipeline object.
    pub pipeline_cache_misses: u32,
    /// Misses that happened after the warm-up window.
    pub pipeline_hitches: u32,
    /// Pipeline objects the device refused to build.
    pub pipeline_failures: u32,
    /// Draws dropped because no valid pipeline was available.
    pub dropped_draws: u32,
    /// Graphics encoders opened for a new set of render targets.
    pub encoder_recreations: u32,
    /// Command buffers handed to the GPU.
    pub command_buffers_committed: u32,
    /// Times the transient ring buffer wrapped to its start.
    pub ring_buffer_wraps: u32,
    /// Bytes handed out by the transient ring buffer.
    pub ring_bytes_allocated: u64,
    /// Deferred objects actually destroyed.
    pub objects_reclaimed: u32,
    /// CPU time between the frame start and its commit, in milliseconds.
    pub cpu_frame_time_ms: f32,
}

impl FrameStats {
    /// Adds the counters of `frame` to `self`.
    pub fn accumulate(&mut self, frame: &FrameStats) {
        self.frame_number += 1;
        self.draw_calls += frame.draw_calls;
        self.dispatches += frame.dispatches;
        self.primitives += frame.primitives;
        self.pipeline_cache_hits += frame.pipeline_cache_hits;
        self.pipeline_cache_misses += frame.pipeline_cache_misses;
        self.pipeline_hitches += frame.pipeline_hitches;
        self.pipeline_failures += frame.pipeline_failures;
        self.dropped_draws += frame.dropped_draws;
        self.encoder_recreations += frame.encoder_recreations;
        self.command_buffers_committed += frame.command_buffers_committed;
        self.ring_buffer_wraps += frame.ring_buffer_wraps;
        self.ring_bytes_allocated += frame.ring_bytes_allocated;
        self.objects_reclaimed += frame.objects_reclaimed;
        self.cpu_frame_time_ms += frame.cpu_frame_time_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_counts_frames() {
        let mut lifetime = FrameStats::default();
        let frame = FrameStats {
            frame_number: 41,
            draw_calls: 3,
            pipeline_cache_misses: 1,
            ..Default::default()
        };
        lifetime.accumulate(&frame);
        lifetime.accumulate(&frame);
        assert_eq!(lifetime.frame_number, 2);
        assert_eq!(lifetime.draw_calls, 6);
        assert_eq!(lifetime.pipeline_cache_misses, 2);
    }
}
