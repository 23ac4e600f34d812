//! 2D user interface drawn into an offscreen overlay.
//!
//! Components are positioned in pixels with the origin in the top-left
//! corner of the overlay and Y pointing down.

use cgmath::{Vector2, vec2, vec3};

use crate::resources::mesh::MeshData;

pub mod component;
pub mod image;
pub mod overlay;
pub mod text;
pub mod window;

pub use component::Component;
pub use image::Image;
pub use overlay::{Overlay, OverlayState};
pub use text::Text;
pub use window::Window;

/// An axis-aligned rectangle given by two opposite corners.
///
/// `min` does not have to be smaller than `max`; a texture-coordinate
/// rectangle with swapped Y values samples the image upside down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl Rect {
    pub fn new(min: Vector2<f32>, max: Vector2<f32>) -> Self {
        Self { min, max }
    }

    /// The whole texture, unflipped.
    pub fn unit() -> Self {
        Self::new(vec2(0.0, 0.0), vec2(1.0, 1.0))
    }

    pub fn from_position_size(position: Vector2<f32>, size: Vector2<f32>) -> Self {
        Self {
            min: position,
            max: position + size,
        }
    }

    pub fn size(&self) -> Vector2<f32> {
        self.max - self.min
    }

    pub fn flipped_y(self) -> Self {
        Self {
            min: vec2(self.min.x, self.max.y),
            max: vec2(self.max.x, self.min.y),
        }
    }
}

/// Two triangles covering `dst`, with `src` mapped onto them corner to corner.
pub fn quad_mesh(dst: Rect, src: Rect) -> MeshData {
    let corners = [
        (dst.max.x, dst.min.y, src.max.x, src.min.y),
        (dst.max.x, dst.max.y, src.max.x, src.max.y),
        (dst.min.x, dst.max.y, src.min.x, src.max.y),
        (dst.max.x, dst.min.y, src.max.x, src.min.y),
        (dst.min.x, dst.max.y, src.min.x, src.max.y),
        (dst.min.x, dst.min.y, src.min.x, src.min.y),
    ];
    MeshData {
        vertices: corners.iter().map(|&(x, y, _, _)| vec3(x, y, 0.0)).collect(),
        normals: Vec::new(),
        tex_coords: corners.iter().map(|&(_, _, s, t)| vec2(s, t)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_maps_corners_onto_corners() {
        let dst = Rect::from_position_size(vec2(10.0, 20.0), vec2(30.0, 40.0));
        let mesh = quad_mesh(dst, Rect::unit());
        assert_eq!(mesh.vertex_count(), 6);
        for (vertex, uv) in mesh.vertices.iter().zip(&mesh.tex_coords) {
            assert_eq!((vertex.x - 10.0) / 30.0, uv.x);
            assert_eq!((vertex.y - 20.0) / 40.0, uv.y);
            assert_eq!(vertex.z, 0.0);
        }
    }

    #[test]
    fn flipped_source_samples_upside_down() {
        let mesh = quad_mesh(Rect::from_position_size(vec2(0.0, 0.0), vec2(4.0, 4.0)), Rect::unit().flipped_y());
        let top_left = mesh
            .vertices
            .iter()
            .position(|v| v.x == 0.0 && v.y == 0.0)
            .unwrap();
        assert_eq!(mesh.tex_coords[top_left], vec2(0.0, 1.0));
    }
}
