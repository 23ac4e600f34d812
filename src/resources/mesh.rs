//! Vertex buffers.
//!
//! Every mesh uses the same interleaved layout: position, normal, texture
//! coordinate, 8 floats per vertex. Channels missing from the source data
//! are zero-filled so shaders can always read all three attributes.

use cgmath::{Vector2, Vector3};

use crate::{
    error::{EngineError, Result},
    gpu::{BufferId, Gpu, VertexArrayId, VertexAttribute, VertexLayout},
};

pub const POSITION_LOCATION: u32 = 0;
pub const NORMAL_LOCATION: u32 = 1;
pub const TEX_COORD_LOCATION: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::STRIDE,
            attributes: vec![
                VertexAttribute {
                    location: POSITION_LOCATION,
                    components: 3,
                    offset: 0,
                },
                VertexAttribute {
                    location: NORMAL_LOCATION,
                    components: 3,
                    offset: std::mem::size_of::<[f32; 3]>() as u32,
                },
                VertexAttribute {
                    location: TEX_COORD_LOCATION,
                    components: 2,
                    offset: std::mem::size_of::<[f32; 6]>() as u32,
                },
            ],
        }
    }
}

/// Flat triangle-list geometry: every three vertices form a face.
///
/// `normals` and `tex_coords` are either empty or exactly as long as
/// `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn interleave(&self) -> Result<Vec<Vertex>> {
        let count = self.vertices.len();
        if !self.normals.is_empty() && self.normals.len() != count {
            return Err(EngineError::decode(format!(
                "mesh: {} normals for {count} vertices",
                self.normals.len()
            )));
        }
        if !self.tex_coords.is_empty() && self.tex_coords.len() != count {
            return Err(EngineError::decode(format!(
                "mesh: {} texture coordinates for {count} vertices",
                self.tex_coords.len()
            )));
        }
        Ok(self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex {
                position: (*position).into(),
                normal: self.normals.get(i).map_or([0.0; 3], |n| (*n).into()),
                tex_coords: self.tex_coords.get(i).map_or([0.0; 2], |t| (*t).into()),
            })
            .collect())
    }
}

/// A vertex buffer plus the vertex array describing it.
#[derive(Debug, Default)]
pub struct GeometryBuffer {
    buffer: Option<BufferId>,
    vertex_array: Option<VertexArrayId>,
    vertex_count: u32,
    byte_size: usize,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(gpu: &mut dyn Gpu, data: &MeshData) -> Result<Self> {
        let mut geometry = Self::new();
        geometry.load(gpu, data)?;
        Ok(geometry)
    }

    /// Uploads `data` into a fresh buffer, freeing whatever was loaded before.
    pub fn load(&mut self, gpu: &mut dyn Gpu, data: &MeshData) -> Result<()> {
        let vertices = data.interleave()?;
        self.destroy(gpu);
        self.upload(gpu, &vertices)
    }

    /// Replaces the vertex data. A buffer of the same byte size is written in
    /// place and keeps its handle; any other size reallocates.
    pub fn update_data(&mut self, gpu: &mut dyn Gpu, data: &MeshData) -> Result<()> {
        let vertices = data.interleave()?;
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        match self.buffer {
            Some(buffer) if bytes.len() == self.byte_size => {
                gpu.write_vertex_buffer(buffer, 0, bytes)?;
                self.vertex_count = vertices.len() as u32;
                Ok(())
            }
            _ => {
                self.destroy(gpu);
                self.upload(gpu, &vertices)
            }
        }
    }

    fn upload(&mut self, gpu: &mut dyn Gpu, vertices: &[Vertex]) -> Result<()> {
        if vertices.is_empty() {
            return Err(EngineError::decode("mesh without vertices"));
        }
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let buffer = gpu.create_vertex_buffer(bytes)?;
        self.buffer = Some(buffer);
        match gpu.create_vertex_array(buffer, &Vertex::layout()) {
            Ok(vertex_array) => self.vertex_array = Some(vertex_array),
            Err(err) => {
                self.destroy(gpu);
                return Err(err.into());
            }
        }
        self.vertex_count = vertices.len() as u32;
        self.byte_size = bytes.len();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.vertex_array.is_some()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    /// Draws all vertices as a triangle list.
    pub fn draw(&self, gpu: &mut dyn Gpu) -> Result<()> {
        let vertex_array = self
            .vertex_array
            .ok_or_else(|| EngineError::state("draw of an unloaded geometry buffer"))?;
        gpu.bind_vertex_array(Some(vertex_array));
        gpu.draw_triangles(0, self.vertex_count);
        gpu.bind_vertex_array(None);
        Ok(())
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        if let Some(vertex_array) = self.vertex_array.take() {
            gpu.delete_vertex_array(vertex_array);
        }
        if let Some(buffer) = self.buffer.take() {
            gpu.delete_buffer(buffer);
        }
        self.vertex_count = 0;
        self.byte_size = 0;
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer {
            log::warn!("geometry buffer {buffer} dropped without destroy, GPU memory leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::vec3;

    use super::*;
    use crate::gpu::{Fault, HeadlessGpu};

    fn triangle(offset: f32) -> MeshData {
        MeshData {
            vertices: vec![
                vec3(offset, 0.0, 0.0),
                vec3(1.0 + offset, 0.0, 0.0),
                vec3(offset, 1.0, 0.0),
            ],
            ..Default::default()
        }
    }

    fn floats(gpu: &HeadlessGpu, buffer: BufferId) -> Vec<f32> {
        gpu.buffer_contents(buffer)
            .unwrap()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn layout_is_eight_floats() {
        let layout = Vertex::layout();
        assert_eq!(layout.stride, 32);
        let offsets: Vec<(u32, u32)> = layout.attributes.iter().map(|a| (a.location, a.offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (1, 12), (2, 24)]);
    }

    #[test]
    fn missing_channels_are_zero_filled() {
        let mut gpu = HeadlessGpu::new();
        let mut data = triangle(0.0);
        data.tex_coords = vec![Vector2::new(0.5, 0.25); 3];
        let mut geometry = GeometryBuffer::from_data(&mut gpu, &data).unwrap();

        let contents = floats(&gpu, geometry.buffer().unwrap());
        assert_eq!(contents.len(), 24);
        assert_eq!(&contents[8..16], &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.25]);
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.byte_size(), 96);
        geometry.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn mismatched_channel_lengths_are_rejected() {
        let mut gpu = HeadlessGpu::new();
        let mut data = triangle(0.0);
        data.normals = vec![vec3(0.0, 0.0, 1.0)];
        let err = GeometryBuffer::from_data(&mut gpu, &data).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn same_size_update_keeps_the_handle() {
        let mut gpu = HeadlessGpu::new();
        let mut geometry = GeometryBuffer::from_data(&mut gpu, &triangle(0.0)).unwrap();
        let buffer = geometry.buffer();
        let vertex_array = geometry.vertex_array();

        geometry.update_data(&mut gpu, &triangle(5.0)).unwrap();
        assert_eq!(geometry.buffer(), buffer);
        assert_eq!(geometry.vertex_array(), vertex_array);
        assert_eq!(floats(&gpu, geometry.buffer().unwrap())[0], 5.0);
        geometry.destroy(&mut gpu);
    }

    #[test]
    fn resized_update_reallocates() {
        let mut gpu = HeadlessGpu::new();
        let mut geometry = GeometryBuffer::from_data(&mut gpu, &triangle(0.0)).unwrap();
        let buffer = geometry.buffer();

        let mut quad = triangle(0.0);
        quad.vertices.extend(triangle(1.0).vertices);
        geometry.update_data(&mut gpu, &quad).unwrap();
        assert_ne!(geometry.buffer(), buffer);
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.byte_size(), 6 * 32);
        assert_eq!(gpu.live().buffers, 1);
        assert_eq!(gpu.live().vertex_arrays, 1);
        geometry.destroy(&mut gpu);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn draw_needs_loaded_geometry() {
        let mut gpu = HeadlessGpu::new();
        let geometry = GeometryBuffer::new();
        assert!(matches!(geometry.draw(&mut gpu), Err(EngineError::State(_))));
        assert_eq!(gpu.draws().count(), 0);
    }

    #[test]
    fn failed_upload_leaves_nothing_allocated() {
        let mut gpu = HeadlessGpu::new();
        gpu.inject(Fault::BufferAllocation);
        let err = GeometryBuffer::from_data(&mut gpu, &triangle(0.0)).unwrap_err();
        assert!(matches!(err, EngineError::Device(_)));
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn destroy_twice_is_harmless() {
        let mut gpu = HeadlessGpu::new();
        let mut geometry = GeometryBuffer::from_data(&mut gpu, &triangle(0.0)).unwrap();
        geometry.destroy(&mut gpu);
        geometry.destroy(&mut gpu);
        assert!(gpu.violations().is_empty());
    }
}
