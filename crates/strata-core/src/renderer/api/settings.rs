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

//! Tunables of the command-submission layer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The environment variable forcing a pipelining depth of one.
pub const GPU_LOCKSTEP_ENV: &str = "STRATA_GPU_LOCKSTEP";

/// An error raised while loading [`RhiSettings`].
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings text is not valid RON for [`RhiSettings`].
    #[error("invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A value is out of its allowed range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings of the command-submission layer.
///
/// Every field has a default, so a settings file only needs to list what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhiSettings {
    /// Capacity of the general-purpose transient ring buffer, in bytes.
    pub ring_buffer_size: u64,
    /// Default alignment of ring buffer allocations, in bytes.
    pub ring_buffer_alignment: u64,
    /// Capacity of the occlusion query ring buffer, in bytes.
    pub query_buffer_size: u64,
    /// Maximum number of command buffers in flight.
    pub frames_in_flight: u32,
    /// Collapses the pipelining depth to one, for debugging CPU/GPU races.
    pub gpu_lockstep: bool,
    /// How long a waiting query readback blocks before reporting "not ready".
    pub query_timeout_ms: u64,
    /// Pipeline cache misses are only reported as hitches after this many frames.
    pub pipeline_warmup_frames: u64,
    /// Uniform buffers cache their resolved resources per scene.
    pub resource_table_caching: bool,
    /// Size of each per-stage packed uniform scratch array, in bytes.
    pub max_uniform_scratch_bytes: usize,
    /// Debug event scopes are forwarded to encoders.
    pub debug_markers: bool,
}

impl Default for RhiSettings {
    fn default() -> Self {
        Self {
            ring_buffer_size: 8 * 1024 * 1024,
            ring_buffer_alignment: 256,
            query_buffer_size: 64 * 1024,
            frames_in_flight: 3,
            gpu_lockstep: false,
            query_timeout_ms: 500,
            pipeline_warmup_frames: 8,
            resource_table_caching: true,
            max_uniform_scratch_bytes: 1024 * 1024,
            debug_markers: true,
        }
    }
}

impl RhiSettings {
    /// Parses settings from RON text and validates them.
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = ron::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_ron_str(&text)?;
        log::info!("Loaded RHI settings from '{}'", path.display());
        Ok(settings)
    }

    /// Applies overrides read from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(GPU_LOCKSTEP_ENV) {
            self.gpu_lockstep = matches!(value.trim(), "1" | "true" | "on");
        }
        self
    }

    /// The effective pipelining depth.
    pub fn pipelining_depth(&self) -> u32 {
        if self.gpu_lockstep {
            1
        } else {
            self.frames_in_flight
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.frames_in_flight == 0 {
            return Err(SettingsError::InvalidValue {
                field: "frames_in_flight",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.ring_buffer_alignment.is_power_of_two() {
            return Err(SettingsError::InvalidValue {
                field: "ring_buffer_alignment",
                reason: format!("{} is not a power of two", self.ring_buffer_alignment),
            });
        }
        if self.ring_buffer_size < self.ring_buffer_alignment {
            return Err(SettingsError::InvalidValue {
                field: "ring_buffer_size",
                reason: "smaller than one aligned allocation".to_string(),
            });
        }
        if self.query_buffer_size < 8 {
            return Err(SettingsError::InvalidValue {
                field: "query_buffer_size",
                reason: "must hold at least one query".to_string(),
            });
        }
        if self.max_uniform_scratch_bytes % 16 != 0 {
            return Err(SettingsError::InvalidValue {
                field: "max_uniform_scratch_bytes",
                reason: "must be a multiple of 16".to_string(),
            });
        }
        Ok(())
    }
}
