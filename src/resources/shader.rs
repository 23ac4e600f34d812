//! Shader programs with a cached uniform table.

use std::collections::HashMap;

use cgmath::{Matrix4, Vector3, Vector4};

use crate::{
    assets::AssetSource,
    error::{EngineError, Result},
    gpu::{Gpu, NO_UNIFORM, ProgramId, ShaderStage, StageId, UniformValue},
};

/// A linked GPU program, or the empty sentinel when nothing is linked.
///
/// Uniform locations are enumerated once after linking; lookups afterwards
/// are plain map reads and unknown names yield [`NO_UNIFORM`].
#[derive(Debug, Default)]
pub struct Shader {
    program: Option<ProgramId>,
    uniforms: HashMap<String, i32>,
}

/// Builds the `#version` line for a driver-reported shading language
/// version such as `"4.10 NVIDIA 535.54"` (gives `#version 410 core`).
pub fn version_directive(reported: &str) -> String {
    let number = reported.split_whitespace().next().unwrap_or_default();
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    let digits = if digits.is_empty() { "330".to_string() } else { digits };
    format!("#version {digits} core\n")
}

/// Strips carriage returns and puts `directive` in front of the source,
/// replacing a `#version` line the source may already start with.
pub fn preprocess(source: &str, directive: &str) -> String {
    let source = source.replace('\r', "");
    let body = match source.trim_start().strip_prefix("#version") {
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => source.as_str(),
    };
    format!("{directive}{body}")
}

impl Shader {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles and links `stages` into a new shader.
    pub fn from_sources(gpu: &mut dyn Gpu, stages: &[(ShaderStage, &str)]) -> Result<Self> {
        let mut shader = Self::empty();
        shader.compile_and_link(gpu, stages)?;
        Ok(shader)
    }

    /// Loads and links shader files; each file's stage comes from its
    /// `.vs.glsl` / `.fs.glsl` suffix.
    pub fn from_files<S: AsRef<str>>(
        gpu: &mut dyn Gpu,
        source: &dyn AssetSource,
        paths: &[S],
    ) -> Result<Self> {
        let mut shader = Self::empty();
        shader.load_files(gpu, source, paths)?;
        Ok(shader)
    }

    pub fn load_files<S: AsRef<str>>(
        &mut self,
        gpu: &mut dyn Gpu,
        source: &dyn AssetSource,
        paths: &[S],
    ) -> Result<()> {
        let mut stages = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            log::info!("load shader [{path}]");
            let stage = ShaderStage::from_path(path).ok_or_else(|| {
                EngineError::decode(format!("shader [{path}]: unknown stage suffix"))
            })?;
            stages.push((stage, path.to_string(), source.load_string(path)?));
        }
        self.link_named(gpu, stages.iter().map(|(stage, name, text)| (*stage, name.as_str(), text.as_str())))
    }

    /// Replaces whatever program this shader held with one built from `stages`.
    ///
    /// On failure every stage and program created along the way is deleted
    /// and the shader is left empty.
    pub fn compile_and_link(
        &mut self,
        gpu: &mut dyn Gpu,
        stages: &[(ShaderStage, &str)],
    ) -> Result<()> {
        let names: Vec<String> = stages
            .iter()
            .enumerate()
            .map(|(index, (stage, _))| format!("{stage} stage {index}"))
            .collect();
        self.link_named(
            gpu,
            stages
                .iter()
                .zip(&names)
                .map(|((stage, text), name)| (*stage, name.as_str(), *text)),
        )
    }

    fn link_named<'a>(
        &mut self,
        gpu: &mut dyn Gpu,
        stages: impl Iterator<Item = (ShaderStage, &'a str, &'a str)>,
    ) -> Result<()> {
        self.destroy(gpu);
        let directive = version_directive(&gpu.shading_language_version());

        let mut compiled: Vec<StageId> = Vec::new();
        for (stage, name, text) in stages {
            match gpu.compile_stage(stage, &preprocess(text, &directive)) {
                Ok(id) => compiled.push(id),
                Err(err) => {
                    for id in compiled {
                        gpu.delete_stage(id);
                    }
                    return Err(match err {
                        crate::gpu::GpuError::Compile(log) => EngineError::Compile {
                            stage,
                            name: name.to_string(),
                            log,
                        },
                        other => other.into(),
                    });
                }
            }
        }

        let linked = gpu.link_program(&compiled);
        for id in compiled {
            gpu.delete_stage(id);
        }
        let program = linked.map_err(|err| match err {
            crate::gpu::GpuError::Link(log) => EngineError::Link { log },
            other => other.into(),
        })?;

        self.uniforms = gpu
            .active_uniforms(program)
            .into_iter()
            .filter(|uniform| uniform.location != NO_UNIFORM)
            .map(|uniform| (uniform.name, uniform.location))
            .collect();
        self.program = Some(program);
        log::debug!("linked {program} with {} uniform(s)", self.uniforms.len());
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.program.is_some()
    }

    pub fn handle(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn bind(&self, gpu: &mut dyn Gpu) -> Result<()> {
        let program = self
            .program
            .ok_or_else(|| EngineError::state("bind of a shader without a linked program"))?;
        gpu.use_program(Some(program));
        Ok(())
    }

    /// Location of `name`, or [`NO_UNIFORM`] if the program has no such uniform.
    pub fn get_uniform_location(&self, name: &str) -> i32 {
        self.uniforms.get(name).copied().unwrap_or(NO_UNIFORM)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, i32)> {
        self.uniforms.iter().map(|(name, location)| (name.as_str(), *location))
    }

    /// Writes a uniform of the bound program. Unknown names are ignored.
    pub fn set(&self, gpu: &mut dyn Gpu, name: &str, value: UniformValue) {
        let location = self.get_uniform_location(name);
        if location != NO_UNIFORM {
            gpu.set_uniform(location, value);
        }
    }

    pub fn set_int(&self, gpu: &mut dyn Gpu, name: &str, value: i32) {
        self.set(gpu, name, UniformValue::Int(value));
    }

    pub fn set_float(&self, gpu: &mut dyn Gpu, name: &str, value: f32) {
        self.set(gpu, name, UniformValue::Float(value));
    }

    pub fn set_vec3(&self, gpu: &mut dyn Gpu, name: &str, value: Vector3<f32>) {
        self.set(gpu, name, UniformValue::Vec3(value.into()));
    }

    pub fn set_vec4(&self, gpu: &mut dyn Gpu, name: &str, value: Vector4<f32>) {
        self.set(gpu, name, UniformValue::Vec4(value.into()));
    }

    pub fn set_mat4(&self, gpu: &mut dyn Gpu, name: &str, value: &Matrix4<f32>) {
        let columns: &[f32; 16] = value.as_ref();
        self.set(gpu, name, UniformValue::Mat4(*columns));
    }

    /// Deletes the program and returns to the empty state. Safe to call twice.
    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        if let Some(program) = self.program.take() {
            gpu.delete_program(program);
        }
        self.uniforms.clear();
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(program) = self.program {
            log::warn!("shader {program} dropped without destroy, GPU program leaked");
        }
    }
}
