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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::pipeline::RenderPipelineId;
use crate::renderer::api::shader::ShaderFunctionId;
use std::fmt;

/// An error related to the creation of a shader function or the parsing of its
/// reflection header.
#[derive(Debug)]
pub enum ShaderError {
    /// The bytecode failed to compile into a backend-specific function.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The reflection header shipped with the bytecode could not be read.
    ReflectionError {
        /// A descriptive label for the shader.
        label: String,
        /// What went wrong.
        details: String,
    },
    /// The requested shader function could not be found.
    NotFound {
        /// The ID of the shader function that was not found.
        id: ShaderFunctionId,
    },
    /// The entry point does not exist in the bytecode.
    InvalidEntryPoint {
        /// A descriptive label for the shader.
        label: String,
        /// The entry point name that was not found.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::ReflectionError { label, details } => {
                write!(f, "Invalid reflection data for shader '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader function not found for ID: {id:?}")
            }
            ShaderError::InvalidEntryPoint { label, entry_point } => {
                write!(f, "Invalid entry point '{entry_point}' for shader '{label}'")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a pipeline object.
#[derive(Debug)]
pub enum PipelineError {
    /// The backend failed to compile the full pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// A shader function referenced by the pipeline is unknown to the device.
    InvalidShaderFunction {
        /// The ID of the invalid shader function.
        id: ShaderFunctionId,
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
    },
    /// The specified render pipeline ID is not valid.
    InvalidRenderPipeline {
        /// The ID of the invalid render pipeline.
        id: RenderPipelineId,
    },
    /// The color target format is not compatible with the pipeline or device.
    IncompatibleColorTarget(String),
    /// The depth/stencil format is not compatible with the pipeline or device.
    IncompatibleDepthStencilFormat(String),
    /// A required graphics feature is not supported by the device.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::InvalidShaderFunction { id, pipeline_label } => {
                write!(
                    f,
                    "Invalid shader function {:?} for pipeline '{}'",
                    id,
                    pipeline_label.as_deref().unwrap_or("Unknown")
                )
            }
            PipelineError::InvalidRenderPipeline { id } => {
                write!(f, "Invalid render pipeline ID: {id:?}")
            }
            PipelineError::IncompatibleColorTarget(msg) => {
                write!(f, "Incompatible color target format: {msg}")
            }
            PipelineError::IncompatibleDepthStencilFormat(msg) => {
                write!(f, "Incompatible depth/stencil format: {msg}")
            }
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error raised by the device when creating, accessing or destroying a
/// resource.
#[derive(Debug)]
pub enum ResourceError {
    /// Shader function creation failed.
    Shader(ShaderError),
    /// Pipeline object creation failed.
    Pipeline(PipelineError),
    /// No live resource has the given id.
    NotFound,
    /// A byte range does not fit in a buffer.
    OutOfBounds {
        /// First byte of the range.
        offset: u64,
        /// Length of the range.
        len: u64,
        /// Size of the buffer.
        size: u64,
    },
    /// The device rejected the request for a reason of its own.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "No live resource with this ID."),
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Range of {len} bytes at offset {offset} exceeds the {size} byte buffer."
            ),
            ResourceError::BackendError(msg) => write!(f, "Device error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// An error of the command-submission layer as a whole.
#[derive(Debug)]
pub enum RenderError {
    /// The context or device could not be set up, including invalid settings.
    InitializationFailed(String),
    /// No drawable could be taken from the display surface.
    SurfaceAcquisitionFailed(String),
    /// A resource the layer depends on could not be created.
    ResourceError(ResourceError),
    /// The device stopped executing work.
    DeviceLost,
    /// An invariant of the device implementation was broken.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => write!(f, "Initialization failed: {msg}"),
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire a drawable: {msg}")
            }
            RenderError::ResourceError(err) => write!(f, "Resource operation failed: {err}"),
            RenderError::DeviceLost => write!(f, "The graphics device was lost."),
            RenderError::Internal(msg) => write!(f, "Internal device error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}
