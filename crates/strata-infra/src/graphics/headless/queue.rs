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

//! The simulated GPU queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use strata_core::renderer::traits::CompletionHandler;
use strata_core::renderer::{BufferId, CommandBufferId, Drawable, VisibilityResultMode};

use super::command::RecordedCommand;
use super::device::DeviceShared;
use super::TimelineMode;

/// A committed command buffer waiting for execution.
pub(crate) struct SubmittedWork {
    pub(crate) id: CommandBufferId,
    pub(crate) commands: Vec<RecordedCommand>,
    pub(crate) handlers: Vec<CompletionHandler>,
    pub(crate) drawables: Vec<Drawable>,
}

/// Executes committed command buffers strictly in commit order.
pub(crate) struct GpuQueue {
    mode: TimelineMode,
    shared: Arc<DeviceShared>,
    sender: Option<Sender<SubmittedWork>>,
    worker: Option<thread::JoinHandle<()>>,
    pending: Mutex<VecDeque<SubmittedWork>>,
}

impl fmt::Debug for GpuQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuQueue")
            .field("mode", &self.mode)
            .field("pending", &self.pending.lock().unwrap().len())
            .finish()
    }
}

impl GpuQueue {
    pub(crate) fn new(
        mode: TimelineMode,
        shared: Arc<DeviceShared>,
        gpu_time: Duration,
    ) -> std::io::Result<Self> {
        let (sender, worker) = match mode {
            TimelineMode::Threaded => {
                let (tx, rx) = crossbeam_channel::unbounded::<SubmittedWork>();
                let worker_shared = Arc::clone(&shared);
                let handle = thread::Builder::new()
                    .name("strata-headless-gpu".to_string())
                    .spawn(move || {
                        log::debug!("HeadlessDevice: GPU timeline thread started.");
                        for work in rx.iter() {
                            if !gpu_time.is_zero() {
                                thread::sleep(gpu_time);
                            }
                            execute(&worker_shared, work);
                        }
                        log::debug!("HeadlessDevice: GPU timeline thread stopped.");
                    })?;
                (Some(tx), Some(handle))
            }
            TimelineMode::Manual => (None, None),
        };
        Ok(Self {
            mode,
            shared,
            sender,
            worker,
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub(crate) fn submit(&self, work: SubmittedWork) {
        self.shared
            .counters
            .command_buffers_committed
            .fetch_add(1, Ordering::AcqRel);
        match &self.sender {
            Some(sender) => {
                if sender.send(work).is_err() {
                    log::error!("HeadlessDevice: GPU timeline thread is gone, work dropped.");
                }
            }
            None => self.pending.lock().unwrap().push_back(work),
        }
    }

    pub(crate) fn complete_next(&self) -> bool {
        let next = self.pending.lock().unwrap().pop_front();
        match next {
            Some(work) => {
                execute(&self.shared, work);
                true
            }
            None => false,
        }
    }

    pub(crate) fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    pub(crate) fn wait_idle(&self) {
        match self.mode {
            TimelineMode::Threaded => {
                let target = self
                    .shared
                    .counters
                    .command_buffers_committed
                    .load(Ordering::Acquire);
                self.shared.wait_completed(target);
            }
            TimelineMode::Manual => {
                self.complete_all();
            }
        }
    }
}

impl Drop for GpuQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the backlog is drained.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                log::error!("HeadlessDevice: GPU timeline thread panicked.");
            }
        }
    }
}

fn execute(shared: &DeviceShared, work: SubmittedWork) {
    let SubmittedWork {
        id,
        commands,
        handlers,
        drawables,
    } = work;

    let mut visibility_buffer = None;
    let mut visibility_mode = VisibilityResultMode::Disabled;
    let count_draw = |samples: u64, buffer: Option<BufferId>, mode: VisibilityResultMode| {
        shared.counters.draws_executed.fetch_add(1, Ordering::Relaxed);
        if let (Some(buffer), VisibilityResultMode::Counting(offset)) = (buffer, mode) {
            shared.add_visibility_samples(buffer, offset, samples);
        }
    };

    for command in &commands {
        match command {
            RecordedCommand::BeginRenderPass(descriptor) => {
                visibility_buffer = descriptor.visibility_result_buffer;
                visibility_mode = VisibilityResultMode::Disabled;
            }
            RecordedCommand::SetVisibilityResultMode(mode) => visibility_mode = *mode,
            RecordedCommand::Draw {
                vertex_count,
                instance_count,
                ..
            } => count_draw(
                *vertex_count as u64 * *instance_count as u64,
                visibility_buffer,
                visibility_mode,
            ),
            RecordedCommand::DrawIndexed {
                index_count,
                instance_count,
                ..
            } => count_draw(
                *index_count as u64 * *instance_count as u64,
                visibility_buffer,
                visibility_mode,
            ),
            RecordedCommand::DrawIndirect {
                indirect_buffer,
                indirect_offset,
                ..
            } => {
                // { vertex_count, instance_count, vertex_start, base_instance }
                let samples = match shared
                    .read_indirect_arguments::<4>(*indirect_buffer, *indirect_offset)
                {
                    Some([vertices, instances, _, _]) => vertices as u64 * instances as u64,
                    None => {
                        shared.validation_error(format_args!(
                            "indirect arguments of {indirect_buffer:?} at {indirect_offset} are unreadable"
                        ));
                        0
                    }
                };
                count_draw(samples, visibility_buffer, visibility_mode);
            }
            RecordedCommand::DrawIndexedIndirect {
                indirect_buffer,
                indirect_offset,
                ..
            } => {
                // { index_count, instance_count, index_start, base_vertex, base_instance }
                let samples = match shared
                    .read_indirect_arguments::<5>(*indirect_buffer, *indirect_offset)
                {
                    Some([indices, instances, ..]) => indices as u64 * instances as u64,
                    None => {
                        shared.validation_error(format_args!(
                            "indirect arguments of {indirect_buffer:?} at {indirect_offset} are unreadable"
                        ));
                        0
                    }
                };
                count_draw(samples, visibility_buffer, visibility_mode);
            }
            RecordedCommand::Dispatch { .. } | RecordedCommand::DispatchIndirect { .. } => {
                shared
                    .counters
                    .dispatches_executed
                    .fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    log::trace!(
        "HeadlessDevice: Executed command buffer {:?} ({} commands)",
        id,
        commands.len()
    );
    if let Some(command_log) = &shared.command_log {
        command_log
            .lock()
            .unwrap()
            .extend(commands.into_iter().map(|command| (id, command)));
    }

    for drawable in drawables {
        shared
            .counters
            .drawables_presented
            .fetch_add(1, Ordering::Relaxed);
        log::trace!("HeadlessDevice: Presented drawable {:?}", drawable.id);
    }

    for handler in handlers {
        handler(id);
    }
    shared.signal_completed();
}
