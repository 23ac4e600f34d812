//! OpenGL 4.1 core device on top of `glow`.
//!
//! The embedder creates the window and the GL context (winit + glutin, SDL,
//! a browser canvas, ...) and hands the loaded `glow::Context` over. Engine
//! handles are mapped to native objects through per-kind tables, so the
//! engine never sees a native id.

use std::{collections::HashMap, num::NonZeroU32};

use glow::HasContext;

use super::{
    ActiveUniform, BufferId, Capability, ClearMask, FilterMode, FramebufferId, FramebufferStatus,
    Gpu, GpuError, NO_UNIFORM, PixelFormat, ProgramId, RenderbufferId, ShaderStage, StageId,
    TextureDesc, TextureId, UniformValue, VertexArrayId, VertexLayout, WrapMode,
};

/// Usage hint for vertex data. UI quads are patched in place with
/// `buffer_sub_data`.
const VERTEX_BUFFER_USAGE: u32 = glow::STATIC_DRAW;

struct ProgramObject {
    native: glow::Program,
    /// Indexed by the engine-side location handed out by `active_uniforms`.
    locations: Vec<(String, glow::UniformLocation)>,
}

pub struct GlDevice {
    gl: glow::Context,
    next_id: NonZeroU32,
    textures: HashMap<TextureId, glow::Texture>,
    buffers: HashMap<BufferId, glow::Buffer>,
    vertex_arrays: HashMap<VertexArrayId, glow::VertexArray>,
    stages: HashMap<StageId, glow::Shader>,
    programs: HashMap<ProgramId, ProgramObject>,
    renderbuffers: HashMap<RenderbufferId, glow::Renderbuffer>,
    framebuffers: HashMap<FramebufferId, glow::Framebuffer>,
    current_program: Option<ProgramId>,
}

impl GlDevice {
    /// # Safety
    ///
    /// `gl` must be current on the calling thread for as long as the device
    /// lives, and every call on the device must happen on that thread.
    pub unsafe fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            next_id: NonZeroU32::MIN,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            stages: HashMap::new(),
            programs: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            current_program: None,
        }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn allocate_id(&mut self) -> NonZeroU32 {
        let id = self.next_id;
        self.next_id = id.saturating_add(1);
        id
    }
}

fn filter(mode: FilterMode, mipmaps: bool) -> i32 {
    (match (mode, mipmaps) {
        (FilterMode::Nearest, false) => glow::NEAREST,
        (FilterMode::Linear, false) => glow::LINEAR,
        (FilterMode::Nearest, true) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, true) => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn wrap(mode: WrapMode) -> i32 {
    (match mode {
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
    }) as i32
}

fn capability(capability: Capability) -> u32 {
    match capability {
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::Blend => glow::BLEND,
    }
}

impl Gpu for GlDevice {
    fn shading_language_version(&self) -> String {
        unsafe { self.gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION) }
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability(cap));
                if cap == Capability::Blend {
                    self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
                }
            } else {
                self.gl.disable(capability(cap));
            }
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { self.gl.viewport(x, y, width as i32, height as i32) }
    }

    fn viewport(&self) -> (i32, i32, u32, u32) {
        let mut out = [0; 4];
        unsafe { self.gl.get_parameter_i32_slice(glow::VIEWPORT, &mut out) };
        (out[0], out[1], out[2].max(0) as u32, out[3].max(0) as u32)
    }

    fn clear(&mut self, mask: ClearMask, color: [f32; 4]) {
        let mut bits = 0;
        if mask.color {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.depth {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(bits);
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GpuError> {
        if let Some(pixels) = pixels {
            if pixels.len() != desc.byte_len() {
                return Err(GpuError::InvalidArgument(format!(
                    "{} bytes of pixel data for a {}x{} texture",
                    pixels.len(),
                    desc.width,
                    desc.height
                )));
            }
        }
        let (internal, format) = match desc.format {
            PixelFormat::Rgb8 => (glow::RGB8, glow::RGB),
            PixelFormat::Rgba8 => (glow::RGBA8, glow::RGBA),
        };
        let native = unsafe {
            let native = self.gl.create_texture().map_err(|_| GpuError::Allocation("texture"))?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap(desc.params.wrap));
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap(desc.params.wrap));
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                filter(desc.params.min_filter, desc.params.mipmaps),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                filter(desc.params.mag_filter, false),
            );
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                pixels,
            );
            if desc.params.mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            native
        };
        let id = TextureId(self.allocate_id());
        self.textures.insert(id, native);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        match self.textures.remove(&texture) {
            Some(native) => unsafe { self.gl.delete_texture(native) },
            None => log::error!("delete of unknown {texture}"),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        let native = texture.and_then(|id| self.textures.get(&id).copied());
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, native);
        }
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError> {
        let native = unsafe {
            let native = self.gl.create_buffer().map_err(|_| GpuError::Allocation("vertex buffer"))?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data, VERTEX_BUFFER_USAGE);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            native
        };
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, native);
        Ok(id)
    }

    fn write_vertex_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let native = *self
            .buffers
            .get(&buffer)
            .ok_or_else(|| GpuError::UnknownHandle(buffer.to_string()))?;
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            self.gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, offset as i32, data);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        match self.buffers.remove(&buffer) {
            Some(native) => unsafe { self.gl.delete_buffer(native) },
            None => log::error!("delete of unknown {buffer}"),
        }
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, GpuError> {
        let buffer = *self
            .buffers
            .get(&buffer)
            .ok_or_else(|| GpuError::UnknownHandle(buffer.to_string()))?;
        let native = unsafe {
            let native = self
                .gl
                .create_vertex_array()
                .map_err(|_| GpuError::Allocation("vertex array"))?;
            self.gl.bind_vertex_array(Some(native));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            for attribute in &layout.attributes {
                self.gl.enable_vertex_attrib_array(attribute.location);
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components as i32,
                    glow::FLOAT,
                    false,
                    layout.stride as i32,
                    attribute.offset as i32,
                );
            }
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            native
        };
        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(id, native);
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        match self.vertex_arrays.remove(&vertex_array) {
            Some(native) => unsafe { self.gl.delete_vertex_array(native) },
            None => log::error!("delete of unknown {vertex_array}"),
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        let native = vertex_array.and_then(|id| self.vertex_arrays.get(&id).copied());
        unsafe { self.gl.bind_vertex_array(native) }
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLES, first as i32, count as i32) }
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, GpuError> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let native = unsafe {
            let native = self.gl.create_shader(kind).map_err(GpuError::Compile)?;
            self.gl.shader_source(native, source);
            self.gl.compile_shader(native);
            if !self.gl.get_shader_compile_status(native) {
                let log = self.gl.get_shader_info_log(native);
                self.gl.delete_shader(native);
                return Err(GpuError::Compile(log));
            }
            native
        };
        let id = StageId(self.allocate_id());
        self.stages.insert(id, native);
        Ok(id)
    }

    fn delete_stage(&mut self, stage: StageId) {
        match self.stages.remove(&stage) {
            Some(native) => unsafe { self.gl.delete_shader(native) },
            None => log::error!("delete of unknown {stage}"),
        }
    }

    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, GpuError> {
        let natives = stages
            .iter()
            .map(|id| {
                self.stages
                    .get(id)
                    .copied()
                    .ok_or_else(|| GpuError::Link(format!("{id} is not a shader object")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let native = unsafe {
            let native = self.gl.create_program().map_err(GpuError::Link)?;
            for stage in &natives {
                self.gl.attach_shader(native, *stage);
            }
            self.gl.link_program(native);
            for stage in &natives {
                self.gl.detach_shader(native, *stage);
            }
            if !self.gl.get_program_link_status(native) {
                let log = self.gl.get_program_info_log(native);
                self.gl.delete_program(native);
                return Err(GpuError::Link(log));
            }
            native
        };

        let mut locations = Vec::new();
        unsafe {
            for index in 0..self.gl.get_active_uniforms(native) {
                let Some(uniform) = self.gl.get_active_uniform(native, index) else {
                    continue;
                };
                // Arrays report "name[0]"; address them by their base name.
                let name = uniform.name.trim_end_matches("[0]").to_string();
                if let Some(location) = self.gl.get_uniform_location(native, &name) {
                    locations.push((name, location));
                }
            }
        }
        let id = ProgramId(self.allocate_id());
        self.programs.insert(id, ProgramObject { native, locations });
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        match self.programs.remove(&program) {
            Some(object) => unsafe { self.gl.delete_program(object.native) },
            None => log::error!("delete of unknown {program}"),
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn active_uniforms(&mut self, program: ProgramId) -> Vec<ActiveUniform> {
        self.programs
            .get(&program)
            .map(|object| {
                object
                    .locations
                    .iter()
                    .enumerate()
                    .map(|(index, (name, _))| ActiveUniform {
                        name: name.clone(),
                        location: index as i32,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        let native = program.and_then(|id| self.programs.get(&id).map(|object| object.native));
        self.current_program = program;
        unsafe { self.gl.use_program(native) }
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        if location == NO_UNIFORM {
            return;
        }
        let Some(native) = self
            .current_program
            .and_then(|id| self.programs.get(&id))
            .and_then(|object| object.locations.get(location as usize))
            .map(|(_, native)| native.clone())
        else {
            log::error!("uniform write to inactive location {location}");
            return;
        };
        let location = Some(&native);
        unsafe {
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32_slice(location, &v),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32_slice(location, &v),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
    }

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> Result<RenderbufferId, GpuError> {
        let native = unsafe {
            let native = self
                .gl
                .create_renderbuffer()
                .map_err(|_| GpuError::Allocation("renderbuffer"))?;
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(native));
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                glow::DEPTH_COMPONENT24,
                width as i32,
                height as i32,
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            native
        };
        let id = RenderbufferId(self.allocate_id());
        self.renderbuffers.insert(id, native);
        Ok(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        match self.renderbuffers.remove(&renderbuffer) {
            Some(native) => unsafe { self.gl.delete_renderbuffer(native) },
            None => log::error!("delete of unknown {renderbuffer}"),
        }
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, GpuError> {
        let native = unsafe {
            self.gl
                .create_framebuffer()
                .map_err(|_| GpuError::Allocation("framebuffer"))?
        };
        let id = FramebufferId(self.allocate_id());
        self.framebuffers.insert(id, native);
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        match self.framebuffers.remove(&framebuffer) {
            Some(native) => unsafe { self.gl.delete_framebuffer(native) },
            None => log::error!("delete of unknown {framebuffer}"),
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        let native = framebuffer.and_then(|id| self.framebuffers.get(&id).copied());
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, native) }
    }

    fn attach_color_texture(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        let (Some(fb), Some(tex)) = (
            self.framebuffers.get(&framebuffer).copied(),
            self.textures.get(&texture).copied(),
        ) else {
            log::error!("cannot attach {texture} to {framebuffer}");
            return;
        };
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
        }
    }

    fn attach_depth_renderbuffer(&mut self, framebuffer: FramebufferId, renderbuffer: RenderbufferId) {
        let (Some(fb), Some(rb)) = (
            self.framebuffers.get(&framebuffer).copied(),
            self.renderbuffers.get(&renderbuffer).copied(),
        ) else {
            log::error!("cannot attach {renderbuffer} to {framebuffer}");
            return;
        };
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(rb),
            );
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(&framebuffer).copied() else {
            return FramebufferStatus::Unsupported;
        };
        let status = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
            self.gl.check_framebuffer_status(glow::FRAMEBUFFER)
        };
        match status {
            glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
            glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
            glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
            glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
            _ => FramebufferStatus::Unsupported,
        }
    }
}
