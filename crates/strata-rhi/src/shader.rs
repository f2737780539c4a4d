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

//! Compiled shaders with their reflection metadata.

use crate::frame::release::{GpuObject, ReleaseSender};
use std::borrow::Cow;
use std::hash::{BuildHasher, Hasher};
use strata_core::renderer::{
    ComputePipelineDescriptor, ComputePipelineId, GraphicsDevice, ResourceError, ShaderBindings,
    ShaderFunctionDescriptor, ShaderFunctionId, ShaderStage,
};

/// A shader function of one stage plus the bindings header the compiler
/// emitted for it. Compute shaders also own their pipeline.
#[derive(Debug)]
pub struct Shader {
    label: String,
    stage: ShaderStage,
    function: ShaderFunctionId,
    bytecode_hash: u64,
    bindings: ShaderBindings,
    compute_pipeline: Option<ComputePipelineId>,
    release: ReleaseSender,
}

impl Shader {
    /// Creates the device function and, for compute shaders, the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if the device rejects the function or the
    /// compute pipeline. Nothing is leaked on failure.
    pub fn new(
        device: &dyn GraphicsDevice,
        descriptor: &ShaderFunctionDescriptor,
        bindings: ShaderBindings,
        release: ReleaseSender,
    ) -> Result<Self, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or("unnamed shader").to_string();
        let bytecode_hash = bytecode_hash(&descriptor.bytecode);
        let function = device.create_shader_function(descriptor).map_err(|e| {
            log::error!(
                "Failed to create {:?} shader '{label}' (entry '{}', bytecode {bytecode_hash:#018x}): {e}",
                descriptor.stage,
                descriptor.entry_point
            );
            e
        })?;

        let compute_pipeline = if descriptor.stage == ShaderStage::Compute {
            let created = device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(Cow::Borrowed(label.as_str())),
                function,
            });
            match created {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    log::error!("Failed to create compute pipeline for '{label}': {e}");
                    release.release(GpuObject::ShaderFunction(function));
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!("Shader: Created {:?} shader '{label}'", descriptor.stage);
        Ok(Self {
            label,
            stage: descriptor.stage,
            function,
            bytecode_hash,
            bindings,
            compute_pipeline,
            release,
        })
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The stage the shader runs in.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The device function.
    pub fn function(&self) -> ShaderFunctionId {
        self.function
    }

    /// A stable digest of the bytecode, used to identify the shader in logs.
    pub fn bytecode_hash(&self) -> u64 {
        self.bytecode_hash
    }

    /// The reflection header.
    pub fn bindings(&self) -> &ShaderBindings {
        &self.bindings
    }

    /// The compute pipeline, for compute shaders.
    pub fn compute_pipeline(&self) -> Option<ComputePipelineId> {
        self.compute_pipeline
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(pipeline) = self.compute_pipeline {
            self.release.release(GpuObject::ComputePipeline(pipeline));
        }
        self.release.release(GpuObject::ShaderFunction(self.function));
    }
}

fn bytecode_hash(bytecode: &[u8]) -> u64 {
    let mut hasher = ahash::RandomState::with_seeds(1, 2, 3, 4).build_hasher();
    hasher.write(bytecode);
    hasher.finish()
}
