/**
 * GPU-resident assets: textures, shaders, vertex buffers, materials and the
 * models built from them.
 */
pub mod material;
pub mod mesh;
pub mod model;
pub mod shader;
pub mod texture;

pub use material::{Channel, Material, MaterialDesc};
pub use mesh::{GeometryBuffer, MeshData, Vertex};
pub use model::{MeshGroup, Model};
pub use shader::Shader;
pub use texture::{Texture, TextureCache};
