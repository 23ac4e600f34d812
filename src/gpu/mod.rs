//! The device layer.
//!
//! Everything the engine asks of the graphics API goes through the [`Gpu`]
//! trait. The trait follows the OpenGL object model (textures, buffers,
//! vertex arrays, programs, framebuffers, texture units and uniform
//! locations) so resources can be written once and driven either by the
//! [`HeadlessGpu`] software device or, with the `gl` feature, by a real
//! OpenGL 4.1 core context.
//!
//! Handles are non-zero newtypes. "No object" is expressed with `Option`,
//! never with a zero id.

use std::{fmt, num::NonZeroU32, ops::BitOr};

use thiserror::Error;

#[cfg(feature = "gl")]
pub mod gl;
pub mod headless;

pub use headless::{Command, Fault, HeadlessGpu};

/// Location returned for a uniform name the program does not declare.
pub const NO_UNIFORM: i32 = -1;

macro_rules! gpu_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(NonZeroU32);

            impl $name {
                pub fn from_raw(raw: u32) -> Option<Self> {
                    NonZeroU32::new(raw).map(Self)
                }

                pub fn raw(self) -> u32 {
                    self.0.get()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )*
    };
}

gpu_handle!(
    TextureId,
    BufferId,
    VertexArrayId,
    /// A compiled but not yet linked shader stage.
    StageId,
    ProgramId,
    RenderbufferId,
    FramebufferId,
);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GpuError {
    #[error("out of device memory while allocating {0}")]
    Allocation(&'static str),
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Link(String),
    #[error("unknown {0}")]
    UnknownHandle(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Sampling state applied when a texture is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap: WrapMode,
    pub mipmaps: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            wrap: WrapMode::Repeat,
            mipmaps: true,
        }
    }
}

impl TextureParams {
    /// Parameters for render-target colour attachments: no mipmaps, clamped.
    pub fn render_target() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            wrap: WrapMode::ClampToEdge,
            mipmaps: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub params: TextureParams,
}

impl TextureDesc {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Derives the stage from a `*.vs.glsl` / `*.fs.glsl` file name.
    pub fn from_path(path: &str) -> Option<Self> {
        if path.ends_with(".vs.glsl") {
            Some(ShaderStage::Vertex)
        } else if path.ends_with(".fs.glsl") {
            Some(ShaderStage::Fragment)
        } else {
            None
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// One float attribute inside an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat4([f32; 16]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub location: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    IncompleteDimensions,
    Unsupported,
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FramebufferStatus::Complete => "complete",
            FramebufferStatus::IncompleteAttachment => "incomplete attachment",
            FramebufferStatus::MissingAttachment => "missing attachment",
            FramebufferStatus::IncompleteDrawBuffer => "incomplete draw buffer",
            FramebufferStatus::IncompleteDimensions => "attachment dimensions differ",
            FramebufferStatus::Unsupported => "unsupported",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: ClearMask = ClearMask { color: true, depth: false };
    pub const DEPTH: ClearMask = ClearMask { color: false, depth: true };
    pub const ALL: ClearMask = ClearMask { color: true, depth: true };
}

impl BitOr for ClearMask {
    type Output = ClearMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        ClearMask {
            color: self.color || rhs.color,
            depth: self.depth || rhs.depth,
        }
    }
}

/// A graphics device following the OpenGL object model.
///
/// Creation calls return owned handles; the matching `delete_*` call must be
/// made exactly once per handle. State calls (`bind_*`, `use_program`,
/// `set_uniform`) affect the current context state the way their GL
/// counterparts do: uniforms are written to the program in use, textures are
/// bound to numbered units, draws and clears target the bound framebuffer.
pub trait Gpu {
    /// The raw `GL_SHADING_LANGUAGE_VERSION` string, e.g. `"4.10 NVIDIA"`.
    fn shading_language_version(&self) -> String;

    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    /// The current viewport as `(x, y, width, height)`.
    fn viewport(&self) -> (i32, i32, u32, u32);
    fn clear(&mut self, mask: ClearMask, color: [f32; 4]);

    /// Allocates a 2D texture. `pixels`, when given, must hold exactly
    /// `desc.byte_len()` tightly packed bytes, top row first.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GpuError>;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError>;
    /// Overwrites part of an existing buffer without reallocating it.
    fn write_vertex_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError>;
    fn delete_buffer(&mut self, buffer: BufferId);

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, GpuError>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    /// Draws non-indexed triangles from the bound vertex array.
    fn draw_triangles(&mut self, first: u32, count: u32);

    /// Compiles one stage. On failure the error carries the compiler log.
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, GpuError>;
    fn delete_stage(&mut self, stage: StageId);
    /// Links the stages into a program. On failure the error carries the link log.
    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, GpuError>;
    fn delete_program(&mut self, program: ProgramId);
    fn active_uniforms(&mut self, program: ProgramId) -> Vec<ActiveUniform>;
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Writes to the program in use. Location [`NO_UNIFORM`] is ignored.
    fn set_uniform(&mut self, location: i32, value: UniformValue);

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> Result<RenderbufferId, GpuError>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);
    fn create_framebuffer(&mut self) -> Result<FramebufferId, GpuError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    /// `None` selects the default (window) target.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn attach_color_texture(&mut self, framebuffer: FramebufferId, texture: TextureId);
    fn attach_depth_renderbuffer(&mut self, framebuffer: FramebufferId, renderbuffer: RenderbufferId);
    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus;
}
