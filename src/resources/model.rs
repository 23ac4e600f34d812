use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::Resources,
    error::{EngineError, Result},
    gpu::Gpu,
    obj::{ObjObject, ObjReader},
    render::RenderContext,
    resources::{
        material::{Material, MaterialDesc},
        mesh::{GeometryBuffer, MeshData},
    },
};

/// One drawable part of a model: its own vertex buffer and material.
#[derive(Debug)]
pub struct MeshGroup {
    pub name: String,
    pub material: Material,
    pub geometry: GeometryBuffer,
}

impl MeshGroup {
    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        self.material.destroy(gpu);
        self.geometry.destroy(gpu);
    }
}

/// Mesh groups sharing one model transform.
///
/// The model only holds the transform; animating it is up to the caller.
#[derive(Debug)]
pub struct Model {
    transform: Matrix4<f32>,
    groups: Vec<MeshGroup>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            transform: Matrix4::identity(),
            groups: Vec::new(),
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an OBJ file with its materials.
    pub fn load(gpu: &mut dyn Gpu, res: &mut Resources, path: &str) -> Result<Self> {
        let objects = ObjReader::new(res.source.as_ref()).read(path)?;
        Self::from_objects(gpu, res, &objects, path)
    }

    /// Uploads parsed objects. Objects without vertices are skipped; a file
    /// that leaves nothing to draw is an error. On failure everything
    /// created so far is freed again.
    pub fn from_objects(
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        objects: &[ObjObject],
        label: &str,
    ) -> Result<Self> {
        let mut model = Self::new();
        for object in objects {
            if object.vertices.is_empty() {
                log::warn!("object '{}' in {} has no vertices and was skipped", object.name, label);
                continue;
            }
            match Self::upload_group(gpu, res, object) {
                Ok(group) => model.groups.push(group),
                Err(err) => {
                    model.destroy(gpu);
                    return Err(err);
                }
            }
        }
        if model.groups.is_empty() {
            return Err(EngineError::decode(format!("{label}: no drawable objects")));
        }
        Ok(model)
    }

    fn upload_group(gpu: &mut dyn Gpu, res: &mut Resources, object: &ObjObject) -> Result<MeshGroup> {
        let desc = object.material.as_ref().map(MaterialDesc::from).unwrap_or_default();
        let mut material = Material::load(gpu, res, &desc)?;
        let data = MeshData {
            vertices: object.vertices.clone(),
            normals: object.normals.clone(),
            tex_coords: object.tex_coords.clone(),
        };
        match GeometryBuffer::from_data(gpu, &data) {
            Ok(geometry) => Ok(MeshGroup {
                name: object.name.clone(),
                material,
                geometry,
            }),
            Err(err) => {
                material.destroy(gpu);
                Err(err)
            }
        }
    }

    pub fn push_group(&mut self, group: MeshGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[MeshGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [MeshGroup] {
        &mut self.groups
    }

    pub fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Matrix4<f32> {
        &mut self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    /// Binds the shader once, uploads the matrices, then draws each group
    /// with its material. Material texture units are cleared after every
    /// group so nothing leaks into the next one.
    pub fn draw(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        ctx.apply(gpu, &self.transform)?;
        for group in &self.groups {
            group.material.bind(gpu, ctx.shader)?;
            group.geometry.draw(gpu)?;
            Material::unbind(gpu);
        }
        Ok(())
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        for mut group in self.groups.drain(..) {
            group.destroy(gpu);
        }
    }
}
