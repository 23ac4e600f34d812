//! telcom-ngin
//!
//! A small real-time 3D engine core: OBJ models with MTL materials,
//! reference-counted textures, GLSL programs and a 2D UI overlay composited
//! over the scene through an offscreen framebuffer. All GPU work goes
//! through the [`gpu::Gpu`] trait, so the same code runs on OpenGL (feature
//! `gl`) or on the software [`gpu::HeadlessGpu`].
//!
//! High-level modules
//! - `assets`: asset sources (filesystem, in-memory) and image decoding
//! - `context`: engine context owning the device, caches and configuration
//! - `framebuffer`: offscreen render targets
//! - `gpu`: handle types, the device trait and its backends
//! - `obj`: Wavefront OBJ / MTL reader
//! - `resources`: textures, shaders, meshes, materials and models
//! - `render`: per-draw render context and frame composition
//! - `text`: glyph rasterisation for UI text
//! - `ui`: overlay and UI components (image, text, 9-slice window)
//!

pub mod assets;
pub mod config;
pub mod context;
pub mod error;
pub mod framebuffer;
pub mod gpu;
pub mod logging;
pub mod obj;
pub mod render;
pub mod resources;
pub mod text;
pub mod ui;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use config::EngineConfig;
pub use context::{Context, Resources};
pub use error::{EngineError, Result};
pub use gpu::{Gpu, HeadlessGpu};
pub use render::{Render, RenderContext, draw_frame};
