//! Error types shared by every resource in the engine.
//!
//! Device calls fail with [`GpuError`]; everything above the device reports
//! [`EngineError`], which wraps device failures through `From`.

use std::io;

use thiserror::Error;

use crate::gpu::{GpuError, ShaderStage};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A file could not be read from the asset source.
    #[error("failed to load resource [{path}]: {source}")]
    ResourceLoad {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The bytes were read but could not be understood (image, OBJ, MTL, font).
    #[error("failed to decode {0}")]
    Decode(String),

    #[error("failed to compile {stage} shader [{name}]:\n{log}")]
    Compile {
        stage: ShaderStage,
        name: String,
        log: String,
    },

    #[error("failed to link shader program:\n{log}")]
    Link { log: String },

    #[error("framebuffer error: {0}")]
    Framebuffer(String),

    /// An operation was called on an object that is not in the right state,
    /// e.g. binding a shader that was never linked.
    #[error("invalid state: {0}")]
    State(String),

    #[error(transparent)]
    Device(#[from] GpuError),
}

impl EngineError {
    pub fn decode(what: impl Into<String>) -> Self {
        EngineError::Decode(what.into())
    }

    pub fn state(what: impl Into<String>) -> Self {
        EngineError::State(what.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        EngineError::ResourceLoad {
            source: io::Error::new(io::ErrorKind::NotFound, format!("no such asset: {path}")),
            path,
        }
    }
}
