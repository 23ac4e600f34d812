//! A software device that keeps every object in host memory.
//!
//! `HeadlessGpu` is what the demo binary runs on and what the tests drive.
//! Besides implementing [`Gpu`] it records enough to audit a run: the number
//! of live objects per kind, every clear/draw/bind in submission order,
//! uniform values per program and any misuse (double deletes, draws without
//! a program, writes to inactive uniform locations).
//!
//! The shader "compiler" understands just enough GLSL to behave like a
//! driver: the first non-empty line must be a `#version` directive, the
//! source needs a `main` entry point, `#error` fails with its message and
//! every `uniform <type> <name>;` declaration becomes an active uniform.
//! Uniform locations are assigned in declaration order when linking.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    num::NonZeroU32,
};

use super::{
    ActiveUniform, BufferId, Capability, ClearMask, FramebufferId, FramebufferStatus, Gpu,
    GpuError, NO_UNIFORM, ProgramId, RenderbufferId, ShaderStage, StageId, TextureDesc,
    TextureId, UniformValue, VertexArrayId, VertexLayout,
};

pub const DEFAULT_SHADING_LANGUAGE_VERSION: &str = "4.10 Headless";

/// A failure the next matching device call will report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    TextureAllocation,
    BufferAllocation,
    RenderbufferAllocation,
    FramebufferAllocation,
    IncompleteFramebuffer,
}

/// A state change or submission, in the order the device received it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear {
        target: Option<FramebufferId>,
        mask: ClearMask,
        color: [f32; 4],
    },
    Draw {
        target: Option<FramebufferId>,
        program: Option<ProgramId>,
        vertex_array: Option<VertexArrayId>,
        first: u32,
        count: u32,
        /// Texture units bound at the time of the draw.
        textures: Vec<(u32, TextureId)>,
    },
    BindFramebuffer(Option<FramebufferId>),
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    UseProgram(Option<ProgramId>),
    SetUniform {
        program: ProgramId,
        location: i32,
        value: UniformValue,
    },
}

/// Number of objects currently alive on the device, per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveCounts {
    pub textures: usize,
    pub buffers: usize,
    pub vertex_arrays: usize,
    pub stages: usize,
    pub programs: usize,
    pub renderbuffers: usize,
    pub framebuffers: usize,
}

impl LiveCounts {
    pub fn total(&self) -> usize {
        self.textures
            + self.buffers
            + self.vertex_arrays
            + self.stages
            + self.programs
            + self.renderbuffers
            + self.framebuffers
    }
}

#[derive(Debug)]
struct TextureRecord {
    desc: TextureDesc,
    pixels: Option<Vec<u8>>,
}

#[derive(Debug)]
struct VertexArrayRecord {
    buffer: BufferId,
    layout: VertexLayout,
}

#[derive(Debug)]
struct StageRecord {
    stage: ShaderStage,
    uniforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FramebufferRecord {
    color: Option<TextureId>,
    depth: Option<RenderbufferId>,
}

#[derive(Debug)]
pub struct HeadlessGpu {
    version: String,
    next_id: NonZeroU32,
    textures: HashMap<TextureId, TextureRecord>,
    buffers: HashMap<BufferId, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayRecord>,
    stages: HashMap<StageId, StageRecord>,
    programs: HashMap<ProgramId, Vec<ActiveUniform>>,
    renderbuffers: HashMap<RenderbufferId, (u32, u32)>,
    framebuffers: HashMap<FramebufferId, FramebufferRecord>,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    framebuffer: Option<FramebufferId>,
    units: BTreeMap<u32, TextureId>,
    capabilities: HashSet<Capability>,
    viewport: (i32, i32, u32, u32),
    uniform_values: HashMap<(ProgramId, i32), UniformValue>,
    commands: Vec<Command>,
    violations: Vec<String>,
    faults: Vec<Fault>,
}

impl Default for HeadlessGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::with_version(DEFAULT_SHADING_LANGUAGE_VERSION)
    }

    /// A device reporting `version` as its shading language version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            next_id: NonZeroU32::MIN,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            stages: HashMap::new(),
            programs: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            program: None,
            vertex_array: None,
            framebuffer: None,
            units: BTreeMap::new(),
            capabilities: HashSet::new(),
            viewport: (0, 0, 0, 0),
            uniform_values: HashMap::new(),
            commands: Vec::new(),
            violations: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Makes the next matching call fail. Faults queue up and are consumed in order.
    pub fn inject(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn live(&self) -> LiveCounts {
        LiveCounts {
            textures: self.textures.len(),
            buffers: self.buffers.len(),
            vertex_arrays: self.vertex_arrays.len(),
            stages: self.stages.len(),
            programs: self.programs.len(),
            renderbuffers: self.renderbuffers.len(),
            framebuffers: self.framebuffers.len(),
        }
    }

    /// Misuse detected so far. An engine that manages its handles correctly leaves this empty.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Only the draw commands, in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Draw { .. }))
    }

    pub fn is_texture(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(&texture).map(|record| record.desc)
    }

    pub fn texture_pixels(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(&texture)?.pixels.as_deref()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn vertex_array_layout(&self, vertex_array: VertexArrayId) -> Option<&VertexLayout> {
        self.vertex_arrays.get(&vertex_array).map(|record| &record.layout)
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.units.get(&unit).copied()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Last value written to the uniform called `name` in `program`.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let location = self
            .programs
            .get(&program)?
            .iter()
            .find(|uniform| uniform.name == name)?
            .location;
        self.uniform_values.get(&(program, location)).copied()
    }

    fn allocate_id(&mut self) -> NonZeroU32 {
        let id = self.next_id;
        self.next_id = id.saturating_add(1);
        id
    }

    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|queued| *queued == fault) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }

    fn violation(&mut self, message: String) {
        log::error!("headless device: {message}");
        self.violations.push(message);
    }

    fn vertex_capacity(&self, vertex_array: VertexArrayId) -> Option<u32> {
        let record = self.vertex_arrays.get(&vertex_array)?;
        let bytes = self.buffers.get(&record.buffer)?.len() as u32;
        if record.layout.stride == 0 {
            return Some(0);
        }
        Some(bytes / record.layout.stride)
    }
}

/// Checks a stage the way a driver front end would and returns the uniform
/// names it declares, in order.
fn check_source(source: &str) -> Result<Vec<String>, String> {
    let first = source.lines().map(str::trim).find(|line| !line.is_empty());
    if !first.is_some_and(|line| line.starts_with("#version")) {
        return Err("0:1: error: #version directive must occur before anything else".to_string());
    }

    let mut uniforms: Vec<String> = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if let Some(message) = line.strip_prefix("#error") {
            return Err(format!("0:{}: error: {}", index + 1, message.trim()));
        }
        if let Some(name) = uniform_name(line) {
            if !uniforms.iter().any(|known| *known == name) {
                uniforms.push(name);
            }
        }
    }

    if !source.contains("void main") {
        return Err("0:0: error: missing entry point 'main'".to_string());
    }
    Ok(uniforms)
}

fn uniform_name(line: &str) -> Option<String> {
    let declaration = line.strip_prefix("uniform ")?;
    let mut tokens = declaration.split_whitespace();
    let _ty = tokens.next()?;
    let name = tokens.next()?.trim_end_matches(';');
    let name = name.split('[').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

impl Gpu for HeadlessGpu {
    fn shading_language_version(&self) -> String {
        self.version.clone()
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.capabilities.insert(capability);
        } else {
            self.capabilities.remove(&capability);
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
    }

    fn viewport(&self) -> (i32, i32, u32, u32) {
        self.viewport
    }

    fn clear(&mut self, mask: ClearMask, color: [f32; 4]) {
        self.commands.push(Command::Clear {
            target: self.framebuffer,
            mask,
            color,
        });
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::InvalidArgument(format!(
                "texture size {}x{}",
                desc.width, desc.height
            )));
        }
        if let Some(pixels) = pixels {
            if pixels.len() != desc.byte_len() {
                return Err(GpuError::InvalidArgument(format!(
                    "{} bytes of pixel data for a {}x{} {:?} texture",
                    pixels.len(),
                    desc.width,
                    desc.height,
                    desc.format
                )));
            }
        }
        if self.take_fault(Fault::TextureAllocation) {
            return Err(GpuError::Allocation("texture"));
        }
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureRecord {
                desc: *desc,
                pixels: pixels.map(<[u8]>::to_vec),
            },
        );
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            self.violation(format!("delete of unknown {texture}"));
            return;
        }
        self.units.retain(|_, bound| *bound != texture);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) if !self.textures.contains_key(&id) => {
                self.violation(format!("bind of unknown {id} to unit {unit}"));
                return;
            }
            Some(id) => {
                self.units.insert(unit, id);
            }
            None => {
                self.units.remove(&unit);
            }
        }
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError> {
        if self.take_fault(Fault::BufferAllocation) {
            return Err(GpuError::Allocation("vertex buffer"));
        }
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, data.to_vec());
        Ok(id)
    }

    fn write_vertex_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let storage = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| GpuError::UnknownHandle(buffer.to_string()))?;
        let end = offset + data.len();
        if end > storage.len() {
            return Err(GpuError::InvalidArgument(format!(
                "write of {} bytes at {offset} past the end of {buffer} ({} bytes)",
                data.len(),
                storage.len()
            )));
        }
        storage[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            self.violation(format!("delete of unknown {buffer}"));
        }
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, GpuError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GpuError::UnknownHandle(buffer.to_string()));
        }
        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(
            id,
            VertexArrayRecord {
                buffer,
                layout: layout.clone(),
            },
        );
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            self.violation(format!("delete of unknown {vertex_array}"));
            return;
        }
        if self.vertex_array == Some(vertex_array) {
            self.vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        if let Some(id) = vertex_array {
            if !self.vertex_arrays.contains_key(&id) {
                self.violation(format!("bind of unknown {id}"));
                return;
            }
        }
        self.vertex_array = vertex_array;
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        match self.vertex_array {
            None => self.violation("draw without a bound vertex array".to_string()),
            Some(id) => {
                let capacity = self.vertex_capacity(id).unwrap_or(0);
                if first + count > capacity {
                    self.violation(format!(
                        "draw of vertices {first}..{} from {id} holding {capacity}",
                        first + count
                    ));
                }
            }
        }
        if self.program.is_none() {
            self.violation("draw without a program in use".to_string());
        }
        self.commands.push(Command::Draw {
            target: self.framebuffer,
            program: self.program,
            vertex_array: self.vertex_array,
            first,
            count,
            textures: self.units.iter().map(|(unit, id)| (*unit, *id)).collect(),
        });
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, GpuError> {
        let uniforms = check_source(source).map_err(GpuError::Compile)?;
        let id = StageId(self.allocate_id());
        self.stages.insert(id, StageRecord { stage, uniforms });
        Ok(id)
    }

    fn delete_stage(&mut self, stage: StageId) {
        if self.stages.remove(&stage).is_none() {
            self.violation(format!("delete of unknown {stage}"));
        }
    }

    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, GpuError> {
        let mut uniforms: Vec<ActiveUniform> = Vec::new();
        let mut has_vertex = false;
        let mut has_fragment = false;
        for id in stages {
            let record = self
                .stages
                .get(id)
                .ok_or_else(|| GpuError::Link(format!("error: {id} is not a shader object")))?;
            match record.stage {
                ShaderStage::Vertex => has_vertex = true,
                ShaderStage::Fragment => has_fragment = true,
            }
            for name in &record.uniforms {
                if !uniforms.iter().any(|known| known.name == *name) {
                    uniforms.push(ActiveUniform {
                        name: name.clone(),
                        location: uniforms.len() as i32,
                    });
                }
            }
        }
        if !has_vertex {
            return Err(GpuError::Link("error: program has no vertex stage".to_string()));
        }
        if !has_fragment {
            return Err(GpuError::Link("error: program has no fragment stage".to_string()));
        }
        let id = ProgramId(self.allocate_id());
        self.programs.insert(id, uniforms);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            self.violation(format!("delete of unknown {program}"));
            return;
        }
        self.uniform_values.retain(|(owner, _), _| *owner != program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn active_uniforms(&mut self, program: ProgramId) -> Vec<ActiveUniform> {
        self.programs.get(&program).cloned().unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if let Some(id) = program {
            if !self.programs.contains_key(&id) {
                self.violation(format!("use of unknown {id}"));
                return;
            }
        }
        self.program = program;
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        if location == NO_UNIFORM {
            return;
        }
        let Some(program) = self.program else {
            self.violation(format!("uniform write to location {location} without a program"));
            return;
        };
        let active = self
            .programs
            .get(&program)
            .is_some_and(|uniforms| uniforms.iter().any(|u| u.location == location));
        if !active {
            self.violation(format!("location {location} is not active in {program}"));
            return;
        }
        self.uniform_values.insert((program, location), value);
        self.commands.push(Command::SetUniform {
            program,
            location,
            value,
        });
    }

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> Result<RenderbufferId, GpuError> {
        if self.take_fault(Fault::RenderbufferAllocation) {
            return Err(GpuError::Allocation("renderbuffer"));
        }
        let id = RenderbufferId(self.allocate_id());
        self.renderbuffers.insert(id, (width, height));
        Ok(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if self.renderbuffers.remove(&renderbuffer).is_none() {
            self.violation(format!("delete of unknown {renderbuffer}"));
        }
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, GpuError> {
        if self.take_fault(Fault::FramebufferAllocation) {
            return Err(GpuError::Allocation("framebuffer"));
        }
        let id = FramebufferId(self.allocate_id());
        self.framebuffers.insert(id, FramebufferRecord::default());
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            self.violation(format!("delete of unknown {framebuffer}"));
            return;
        }
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if let Some(id) = framebuffer {
            if !self.framebuffers.contains_key(&id) {
                self.violation(format!("bind of unknown {id}"));
                return;
            }
        }
        self.framebuffer = framebuffer;
        self.commands.push(Command::BindFramebuffer(framebuffer));
    }

    fn attach_color_texture(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        match self.framebuffers.get_mut(&framebuffer) {
            Some(record) => record.color = Some(texture),
            None => self.violation(format!("attachment to unknown {framebuffer}")),
        }
    }

    fn attach_depth_renderbuffer(&mut self, framebuffer: FramebufferId, renderbuffer: RenderbufferId) {
        match self.framebuffers.get_mut(&framebuffer) {
            Some(record) => record.depth = Some(renderbuffer),
            None => self.violation(format!("attachment to unknown {framebuffer}")),
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(record) = self.framebuffers.get(&framebuffer).copied() else {
            self.violation(format!("status query on unknown {framebuffer}"));
            return FramebufferStatus::Unsupported;
        };
        if self.take_fault(Fault::IncompleteFramebuffer) {
            return FramebufferStatus::IncompleteAttachment;
        }
        let color = match record.color {
            Some(id) => match self.textures.get(&id) {
                Some(texture) => Some((texture.desc.width, texture.desc.height)),
                None => return FramebufferStatus::IncompleteAttachment,
            },
            None => None,
        };
        let depth = match record.depth {
            Some(id) => match self.renderbuffers.get(&id) {
                Some(size) => Some(*size),
                None => return FramebufferStatus::IncompleteAttachment,
            },
            None => None,
        };
        match (color, depth) {
            (None, None) => FramebufferStatus::MissingAttachment,
            // Draw buffer 0 points at the colour attachment by default.
            (None, Some(_)) => FramebufferStatus::IncompleteDrawBuffer,
            (Some(color), Some(depth)) if color != depth => FramebufferStatus::IncompleteDimensions,
            _ => FramebufferStatus::Complete,
        }
    }
}
