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

//! Frame lifecycle, GPU synchronization, occlusion queries and debug markers.

use super::{not_supported, RhiContext};
use crate::frame::query::OcclusionQuery;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::renderer::{DeviceFeature, VisibilityResultMode};

impl RhiContext {
    /// Marks the start of CPU work for a frame.
    pub fn begin_frame(&mut self) {
        self.frame_started = Instant::now();
        log::trace!("RhiContext: Begin frame {}", self.frame_number);
    }

    /// Ends the frame: commits its command buffer, presents the back buffer
    /// if `present` is set, retires objects whose frames the GPU finished and
    /// opens the next frame's command buffer.
    ///
    /// Opening the next frame blocks while the configured number of frames
    /// is already in flight.
    pub fn end_frame(&mut self, present: bool) {
        self.end_encoder();

        let generation = self.frame_number + 1;
        if let Some(command_buffer) = self.command_buffer.as_mut() {
            let signal = self.semaphore.signaller();
            let completed = Arc::clone(&self.completed_generation);
            command_buffer.add_completed_handler(Box::new(move |_| {
                completed.fetch_max(generation, Ordering::AcqRel);
                signal.signal();
            }));
        }

        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait_for_next_frame();
        }

        if let Some(drawable) = self.drawable.take() {
            if present {
                if let Some(command_buffer) = self.command_buffer.as_mut() {
                    command_buffer.present_drawable(drawable);
                }
            }
        }
        self.back_buffer.set_texture(None);
        self.commit_command_buffer();

        self.release_queue.seal_generation(generation);
        let completed = self.completed_generation.load(Ordering::Acquire);
        let reclaimed = self.release_queue.reclaim(self.device.as_ref(), completed);
        self.scratch.reset();
        self.finish_frame_stats(reclaimed);

        self.frame_number += 1;
        self.init_frame();
    }

    /// Commits everything recorded so far and blocks until the GPU executed it.
    /// Render targets must be bound again afterwards.
    pub fn submit_commands_and_wait(&mut self) {
        self.end_encoder();
        let ticket = self.current_ticket.clone();
        if let Some(command_buffer) = self.command_buffer.as_mut() {
            let signal = self.semaphore.signaller();
            command_buffer.add_completed_handler(Box::new(move |_| signal.signal()));
        }
        self.commit_command_buffer();
        if let Some(ticket) = ticket {
            ticket.wait_forever();
        }
        self.create_current_command_buffer(true);
        self.previous_render_targets = None;
    }

    pub(crate) fn init_frame(&mut self) {
        self.events.begin_frame(self.frame_number);
        self.create_current_command_buffer(true);
        self.back_buffer.set_texture(None);
        self.drawable = None;
        self.previous_render_targets = None;
        self.frame_stats.frame_number = self.frame_number;
    }

    /// Opens a new command buffer. With `wait`, a frame slot is taken first,
    /// blocking until the GPU retires a frame if all slots are in flight.
    pub(crate) fn create_current_command_buffer(&mut self, wait: bool) {
        if wait {
            self.semaphore.acquire();
        }
        let label = format!("frame {}", self.frame_number);
        let mut command_buffer = self.device.create_command_buffer(Some(&label));
        let ticket = self.events.next_ticket(command_buffer.id());
        let signal = ticket.clone();
        command_buffer.add_completed_handler(Box::new(move |_| signal.signal()));
        self.current_ticket = Some(ticket);
        self.command_buffer = Some(command_buffer);
    }

    pub(crate) fn commit_command_buffer(&mut self) {
        if let Some(command_buffer) = self.command_buffer.take() {
            command_buffer.commit();
            self.frame_stats.command_buffers_committed += 1;
        }
    }

    fn finish_frame_stats(&mut self, reclaimed: usize) {
        let mut stats = std::mem::take(&mut self.frame_stats);
        stats.frame_number = self.frame_number;

        let cursor = self.ring.cursor();
        stats.ring_buffer_wraps = (cursor.wraps() - self.ring_wraps_at_frame_start) as u32;
        stats.ring_bytes_allocated = cursor.bytes_allocated() - self.ring_bytes_at_frame_start;
        self.ring_wraps_at_frame_start = cursor.wraps();
        self.ring_bytes_at_frame_start = cursor.bytes_allocated();

        stats.objects_reclaimed = reclaimed as u32;
        stats.cpu_frame_time_ms = self.frame_started.elapsed().as_secs_f32() * 1000.0;

        log::debug!(
            "RhiContext: Frame {} ended ({} draws, {} dispatches, {} pipeline misses, {} encoders, {:.2} ms)",
            stats.frame_number,
            stats.draw_calls,
            stats.dispatches,
            stats.pipeline_cache_misses,
            stats.encoder_recreations,
            stats.cpu_frame_time_ms
        );
        self.lifetime_stats.accumulate(&stats);
        self.last_frame_stats = stats;
    }

    // --- Scenes ---

    /// Starts a scene. With resource-table caching on, uniform buffers resolve
    /// their resource tables at most once per scene.
    pub fn begin_scene(&mut self) {
        self.scene_counter = self.scene_counter.wrapping_add(1);
        if self.scene_counter == u32::MAX {
            self.scene_counter = 0;
        }
        self.resource_table_epoch = self
            .settings
            .resource_table_caching
            .then_some(self.scene_counter);
    }

    /// Ends the scene.
    pub fn end_scene(&mut self) {
        self.resource_table_epoch = None;
    }

    /// The epoch resource tables are cached under, if a cached scene is running.
    pub fn resource_table_epoch(&self) -> Option<u32> {
        self.resource_table_epoch
    }

    // --- Occlusion queries ---

    /// Starts counting samples that pass the depth test into `query`.
    pub fn begin_occlusion_query(&mut self, query: &mut OcclusionQuery) {
        if !self.device.supports_feature(DeviceFeature::OcclusionQueries) {
            not_supported("occlusion queries");
        }
        let offset = self.query_ring.allocate(8, 8);
        if let Err(e) = self
            .device
            .write_buffer(self.query_ring.buffer(), offset, &[0u8; 8])
        {
            log::error!("RhiContext: Failed to reset occlusion query at {offset}: {e}");
        }
        query.begin(offset);
        self.active_query = Some(offset);
        if let Some(encoder) = self.encoder.graphics() {
            encoder.set_visibility_result_mode(VisibilityResultMode::Counting(offset));
        }
    }

    /// Stops counting into `query`.
    pub fn end_occlusion_query(&mut self, query: &mut OcclusionQuery) {
        if let Some(encoder) = self.encoder.graphics() {
            encoder.set_visibility_result_mode(VisibilityResultMode::Disabled);
        }
        self.active_query = None;
        query.end(self.current_ticket.clone());
    }

    /// Reads the sample count of `query`.
    ///
    /// Returns `None` if the GPU has not finished the query's commands and
    /// `wait` is off, or if waiting timed out. Waiting on a query recorded
    /// into the open command buffer submits it first.
    pub fn get_query_result(&mut self, query: &mut OcclusionQuery, wait: bool) -> Option<u64> {
        if let Some(samples) = query.cached_result() {
            return Some(samples);
        }
        let offset = query.offset()?;
        let ticket = query.ticket()?.clone();

        if !ticket.is_complete() {
            if !wait {
                return None;
            }
            let uncommitted = self
                .command_buffer
                .as_ref()
                .is_some_and(|command_buffer| command_buffer.id() == ticket.command_buffer());
            if uncommitted {
                self.submit_commands_and_wait();
            }
            if !ticket.wait(Duration::from_millis(self.settings.query_timeout_ms)) {
                log::warn!(
                    "RhiContext: Occlusion query timed out after {} ms",
                    self.settings.query_timeout_ms
                );
                return None;
            }
        }

        let mut bytes = [0u8; 8];
        match self
            .device
            .read_buffer(self.query_ring.buffer(), offset, &mut bytes)
        {
            Ok(()) => {
                let samples = u64::from_le_bytes(bytes);
                query.store_result(samples);
                Some(samples)
            }
            Err(e) => {
                log::error!("RhiContext: Failed to read occlusion query at {offset}: {e}");
                None
            }
        }
    }

    // --- Debug markers ---

    /// Opens a named debug group. Groups survive encoder changes.
    pub fn push_event(&mut self, label: &str) {
        if !self.settings.debug_markers {
            return;
        }
        self.encoder.push_debug_group(label);
        self.debug_groups.push(label.to_owned());
    }

    /// Closes the innermost debug group.
    pub fn pop_event(&mut self) {
        if !self.settings.debug_markers {
            return;
        }
        if self.debug_groups.pop().is_some() {
            self.encoder.pop_debug_group();
        }
    }

    // --- Threading ---

    /// Claims the calling thread as the one recording commands.
    pub fn acquire_thread_ownership(&mut self) {
        self.scratch.acquire();
        log::trace!("RhiContext: Thread {:?} took ownership", std::thread::current().id());
    }

    /// Gives up ownership taken with [`Self::acquire_thread_ownership`].
    pub fn release_thread_ownership(&mut self) {
        self.scratch.release();
    }

    pub(crate) fn shutdown(&mut self) {
        self.end_encoder();
        let ticket = self.current_ticket.take();
        self.commit_command_buffer();
        let timeout = Duration::from_millis(self.settings.query_timeout_ms);
        let idle = ticket.map_or(true, |ticket| ticket.wait(timeout));
        if !idle {
            log::warn!(
                "RhiContext: GPU still busy after {} ms, leaking {} pending objects",
                self.settings.query_timeout_ms,
                self.release_queue.pending_objects()
            );
            return;
        }

        self.bound_shader_state = None;
        self.compute_shader = None;
        self.previous_render_targets = None;
        self.drawable = None;
        for stage in 0..self.direct.len() {
            self.direct[stage].clear();
            self.uniform_buffers[stage].clear();
        }
        let destroyed = self.release_queue.flush(self.device.as_ref());
        self.ring.destroy(self.device.as_ref());
        self.query_ring.destroy(self.device.as_ref());
        log::info!(
            "RhiContext: Shut down after {} frames, destroyed {destroyed} deferred objects",
            self.frame_number
        );
    }
}
