//! Wavefront OBJ geometry and MTL material libraries, read through `tobj`.
//!
//! [`ObjReader`] turns an OBJ file into flat, already triangulated objects:
//! every face corner becomes its own vertex. Material map paths are resolved
//! against the directory of the library that names them.

use std::{
    cell::RefCell,
    collections::HashMap,
    io::{BufReader, Cursor},
    path::Path,
};

use cgmath::{Vector2, Vector3, Zero};

use crate::{
    assets::{self, AssetSource},
    error::{EngineError, Result},
};

/// Name given to geometry that appears before any `o` statement.
pub const DEFAULT_OBJECT: &str = "default";

/// One `o` block (or the implicit `default` object) with its face corners.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjObject {
    pub name: String,
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub material: Option<ObjMaterial>,
}

/// A material from an MTL library. Map paths are already resolved against
/// the library's directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjMaterial {
    pub name: String,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub shininess: f32,
    pub dissolve: f32,
    pub ambient_map: Option<String>,
    pub diffuse_map: Option<String>,
    pub specular_map: Option<String>,
    pub specular_highlight_map: Option<String>,
    pub bump_map: Option<String>,
    pub alpha_map: Option<String>,
    pub displacement_map: Option<String>,
    pub reflection_map: Option<String>,
}

impl Default for ObjMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: Vector3::zero(),
            diffuse: Vector3::zero(),
            specular: Vector3::zero(),
            shininess: 0.0,
            dissolve: 1.0,
            ambient_map: None,
            diffuse_map: None,
            specular_map: None,
            specular_highlight_map: None,
            bump_map: None,
            alpha_map: None,
            displacement_map: None,
            reflection_map: None,
        }
    }
}

/// Reads OBJ files, and the MTL libraries they reference, from an asset source.
pub struct ObjReader<'a> {
    source: &'a dyn AssetSource,
}

impl<'a> ObjReader<'a> {
    pub fn new(source: &'a dyn AssetSource) -> Self {
        Self { source }
    }

    pub fn read(&self, path: &str) -> Result<Vec<ObjObject>> {
        let path = assets::normalize_path(path);
        log::info!("load model [{path}]");
        let text = self.source.load_string(&path)?;
        load(&path, &text, Some(self.source))
    }
}

/// Parses OBJ text that does not reference material libraries. `mtllib`
/// lines are skipped with a warning.
pub fn parse_obj(text: &str) -> Result<Vec<ObjObject>> {
    load("<memory>", text, None)
}

/// Parses an MTL library. Map paths are joined onto `dir`.
pub fn parse_mtl(text: &str, dir: &str) -> Result<HashMap<String, ObjMaterial>> {
    let mut reader = BufReader::new(Cursor::new(text.as_bytes()));
    let (materials, _) =
        tobj::load_mtl_buf(&mut reader).map_err(|e| EngineError::decode(format!("material library: {e}")))?;
    Ok(materials
        .into_iter()
        .map(|m| (m.name.clone(), convert_material(m, dir)))
        .collect())
}

fn convert_material(m: tobj::Material, dir: &str) -> ObjMaterial {
    let resolve = |map: Option<&String>| map.map(|path| assets::join(dir, path.trim()));
    ObjMaterial {
        ambient: m.ambient.map_or_else(Vector3::zero, Vector3::from),
        diffuse: m.diffuse.map_or_else(Vector3::zero, Vector3::from),
        specular: m.specular.map_or_else(Vector3::zero, Vector3::from),
        shininess: m.shininess.unwrap_or(0.0),
        dissolve: m.dissolve.unwrap_or(1.0),
        ambient_map: resolve(m.ambient_texture.as_ref()),
        diffuse_map: resolve(m.diffuse_texture.as_ref()),
        specular_map: resolve(m.specular_texture.as_ref()),
        specular_highlight_map: resolve(m.shininess_texture.as_ref()),
        bump_map: resolve(m.normal_texture.as_ref()),
        alpha_map: resolve(m.dissolve_texture.as_ref()),
        displacement_map: resolve(m.unknown_param.get("disp")),
        reflection_map: resolve(m.unknown_param.get("refl")),
        name: m.name,
    }
}

/// Library loads requested by `tobj` while it reads the OBJ.
struct Libraries<'a> {
    obj_path: &'a str,
    dir: String,
    source: Option<&'a dyn AssetSource>,
    /// Directory of the library each material came from.
    dirs: RefCell<HashMap<String, String>>,
    failure: RefCell<Option<EngineError>>,
}

impl Libraries<'_> {
    fn load(&self, library: &Path) -> tobj::MTLLoadResult {
        let library = library.to_string_lossy();
        let Some(source) = self.source else {
            log::warn!("{}: mtllib '{library}' ignored without an asset source", self.obj_path);
            return Err(tobj::LoadError::OpenFileFailed);
        };
        let path = assets::join(&self.dir, &library);
        log::info!("load material library [{path}]");
        let text = match source.load_string(&path) {
            Ok(text) => text,
            Err(err) => {
                self.failure.borrow_mut().get_or_insert(err);
                return Err(tobj::LoadError::OpenFileFailed);
            }
        };
        let loaded = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text.as_bytes())));
        match &loaded {
            Ok((materials, _)) => {
                let dir = assets::parent_dir(&path);
                let mut dirs = self.dirs.borrow_mut();
                for material in materials {
                    dirs.insert(material.name.clone(), dir.clone());
                }
            }
            Err(e) => {
                let err = EngineError::decode(format!("{path}: {e}"));
                self.failure.borrow_mut().get_or_insert(err);
            }
        }
        loaded
    }
}

fn load(path: &str, text: &str, source: Option<&dyn AssetSource>) -> Result<Vec<ObjObject>> {
    let libraries = Libraries {
        obj_path: path,
        dir: assets::parent_dir(path),
        source,
        dirs: RefCell::new(HashMap::new()),
        failure: RefCell::new(None),
    };
    // Indices stay per attribute; `flatten` expands them corner by corner.
    let options = tobj::LoadOptions {
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let mut reader = BufReader::new(Cursor::new(text.as_bytes()));
    let loaded = tobj::load_obj_buf(&mut reader, &options, |library| libraries.load(library));
    if let Some(err) = libraries.failure.take() {
        return Err(err);
    }
    let (models, materials) = loaded.map_err(|e| EngineError::decode(format!("{path}: {e}")))?;

    let dirs = libraries.dirs.into_inner();
    let materials: Vec<ObjMaterial> = materials
        .unwrap_or_default()
        .into_iter()
        .map(|m| {
            let dir = dirs.get(&m.name).map_or(libraries.dir.as_str(), String::as_str);
            convert_material(m, dir)
        })
        .collect();

    models
        .into_iter()
        .map(|model| flatten(path, model, &materials))
        .collect()
}

/// Expands per-corner indices into one vertex per corner.
fn flatten(path: &str, model: tobj::Model, materials: &[ObjMaterial]) -> Result<ObjObject> {
    let mesh = &model.mesh;
    let name = match model.name.as_str() {
        "" | "unnamed_object" => DEFAULT_OBJECT.to_string(),
        name => name.to_string(),
    };
    let out_of_range = |what: &str| EngineError::decode(format!("{path}: object '{name}' has a {what} index out of range"));

    let vertices = gather::<3>(&mesh.positions, &mesh.indices)
        .ok_or_else(|| out_of_range("vertex"))?
        .into_iter()
        .map(Vector3::from)
        .collect::<Vec<_>>();
    let normals = gather::<3>(&mesh.normals, &mesh.normal_indices)
        .ok_or_else(|| out_of_range("normal"))?
        .into_iter()
        .map(Vector3::from)
        .collect::<Vec<_>>();
    let tex_coords = gather::<2>(&mesh.texcoords, &mesh.texcoord_indices)
        .ok_or_else(|| out_of_range("texture coordinate"))?
        .into_iter()
        .map(Vector2::from)
        .collect::<Vec<_>>();

    if !normals.is_empty() && normals.len() != vertices.len() {
        return Err(EngineError::decode(format!(
            "{path}: object '{name}' mixes faces with and without normals"
        )));
    }
    if !tex_coords.is_empty() && tex_coords.len() != vertices.len() {
        return Err(EngineError::decode(format!(
            "{path}: object '{name}' mixes faces with and without texture coordinates"
        )));
    }

    let material = mesh.material_id.and_then(|id| materials.get(id)).cloned();
    Ok(ObjObject {
        name,
        vertices,
        normals,
        tex_coords,
        material,
    })
}

fn gather<const N: usize>(data: &[f32], indices: &[u32]) -> Option<Vec<[f32; N]>> {
    indices
        .iter()
        .map(|&index| {
            let start = index as usize * N;
            data.get(start..start + N)?.try_into().ok()
        })
        .collect()
}
