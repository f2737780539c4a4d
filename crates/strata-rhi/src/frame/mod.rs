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

//! Frame lifecycle building blocks.
//!
//! These types carry no rendering state of their own. The [`RhiContext`]
//! composes them into the begin/end frame protocol: a counting semaphore bounds
//! the number of frames in flight, completion events let the CPU observe
//! individual command buffers, and a generational release queue keeps
//! GPU objects alive until the frames that reference them have retired.
//!
//! [`RhiContext`]: crate::context::RhiContext

pub mod event;
pub mod pacer;
pub mod query;
pub mod release;
pub mod scratch;
pub mod semaphore;

pub use event::{CompletionEvent, CompletionTicket, EventRing};
pub use pacer::{FramePacer, IntervalPacer};
pub use query::OcclusionQuery;
pub use release::{DeferredReleaseQueue, GpuObject, ReleaseSender};
pub use scratch::ScratchPool;
pub use semaphore::{FrameSemaphore, SemaphoreSignal};
