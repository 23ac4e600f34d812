use cgmath::{Vector2, vec2};

use crate::{
    context::Resources,
    error::{EngineError, Result},
    gpu::Gpu,
    render::RenderContext,
    resources::{mesh::GeometryBuffer, texture::Texture},
    ui::{Rect, quad_mesh},
};

/// A textured rectangle.
///
/// The image starts at its texture's native size; resizing stretches the
/// texture over the new bounds.
#[derive(Debug)]
pub struct Image {
    position: Vector2<f32>,
    size: Vector2<f32>,
    /// Texture coordinates of the visible part of the texture.
    source: Rect,
    texture: Option<Texture>,
    quad: GeometryBuffer,
}

impl Image {
    pub fn from_file(gpu: &mut dyn Gpu, res: &mut Resources, path: &str) -> Result<Self> {
        let texture = res.acquire_texture(gpu, path)?;
        Self::from_texture(gpu, texture)
    }

    /// Wraps an already acquired texture. The image takes over the lease.
    pub fn from_texture(gpu: &mut dyn Gpu, texture: Texture) -> Result<Self> {
        let size = vec2(texture.width() as f32, texture.height() as f32);
        let source = Rect::unit();
        let dst = Rect::from_position_size(vec2(0.0, 0.0), size);
        match GeometryBuffer::from_data(gpu, &quad_mesh(dst, source)) {
            Ok(quad) => Ok(Self {
                position: vec2(0.0, 0.0),
                size,
                source,
                texture: Some(texture),
                quad,
            }),
            Err(err) => {
                texture.release(gpu);
                Err(err)
            }
        }
    }

    /// Shows only the part of the texture inside `pixels` (texture pixel
    /// coordinates, top-left origin) and resizes the image to match.
    pub fn with_source_rect(mut self, gpu: &mut dyn Gpu, pixels: Rect) -> Result<Self> {
        if let Err(err) = self.set_source_rect(gpu, pixels) {
            self.destroy(gpu);
            return Err(err);
        }
        Ok(self)
    }

    pub fn set_source_rect(&mut self, gpu: &mut dyn Gpu, pixels: Rect) -> Result<()> {
        let (width, height) = self
            .texture
            .as_ref()
            .map(Texture::size)
            .ok_or_else(|| EngineError::state("source rect on an image without texture"))?;
        let scale = |p: Vector2<f32>| vec2(p.x / width as f32, p.y / height as f32);
        self.source = Rect::new(scale(pixels.min), scale(pixels.max));
        let size = pixels.size();
        self.size = vec2(size.x.abs(), size.y.abs());
        self.update_quad(gpu)
    }

    pub fn position(&self) -> Vector2<f32> {
        self.position
    }

    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_position_size(self.position, self.size)
    }

    pub fn source_rect(&self) -> Rect {
        self.source
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    pub fn quad(&self) -> &GeometryBuffer {
        &self.quad
    }

    pub fn set_position(&mut self, gpu: &mut dyn Gpu, position: Vector2<f32>) -> Result<()> {
        self.position = position;
        self.update_quad(gpu)
    }

    pub fn set_size(&mut self, gpu: &mut dyn Gpu, size: Vector2<f32>) -> Result<()> {
        self.size = size;
        self.update_quad(gpu)
    }

    /// Moves and resizes with a single geometry update.
    pub fn set_bounds(
        &mut self,
        gpu: &mut dyn Gpu,
        position: Vector2<f32>,
        size: Vector2<f32>,
    ) -> Result<()> {
        self.position = position;
        self.size = size;
        self.update_quad(gpu)
    }

    /// Swaps the texture, releasing the previous one. Size and source rect
    /// are kept.
    pub fn set_texture(&mut self, gpu: &mut dyn Gpu, texture: Texture) {
        if let Some(old) = self.texture.replace(texture) {
            old.release(gpu);
        }
    }

    fn update_quad(&mut self, gpu: &mut dyn Gpu) -> Result<()> {
        self.quad.update_data(gpu, &quad_mesh(self.bounds(), self.source))
    }

    /// Binds the texture to unit 0 and draws the quad with the shader of `ctx`,
    /// which must already be in use.
    pub fn draw(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| EngineError::state("draw of an image without texture"))?;
        texture.bind(gpu, 0)?;
        ctx.shader.set_int(gpu, "uTexture", 0);
        self.quad.draw(gpu)
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        if let Some(texture) = self.texture.take() {
            texture.release(gpu);
        }
        self.quad.destroy(gpu);
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Matrix4, SquareMatrix};

    use super::*;
    use crate::{
        assets::MemoryAssets,
        gpu::{Command, HeadlessGpu, PixelFormat, ShaderStage, TextureParams},
        resources::shader::Shader,
    };

    const VS: &str = "#version 410 core
uniform mat4 uProjection;
uniform mat4 uView;
uniform mat4 uModel;
void main() {}
";
    const FS: &str = "#version 410 core
uniform sampler2D uTexture;
void main() {}
";

    fn setup() -> (HeadlessGpu, Resources) {
        (
            HeadlessGpu::new(),
            Resources::new(Box::new(MemoryAssets::new()), TextureParams::default()),
        )
    }

    fn image(gpu: &mut HeadlessGpu, res: &mut Resources, width: u32, height: u32) -> Image {
        let pixels = vec![255u8; (width * height * 4) as usize];
        let texture = res
            .textures
            .from_pixels(gpu, &pixels, width, height, PixelFormat::Rgba8)
            .unwrap();
        Image::from_texture(gpu, texture).unwrap()
    }

    #[test]
    fn starts_at_native_size() {
        let (mut gpu, mut res) = setup();
        let mut img = image(&mut gpu, &mut res, 16, 8);
        assert_eq!(img.size(), vec2(16.0, 8.0));
        assert_eq!(img.position(), vec2(0.0, 0.0));
        img.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn moving_updates_the_quad_in_place() {
        let (mut gpu, mut res) = setup();
        let mut img = image(&mut gpu, &mut res, 16, 8);
        let buffer = img.quad().buffer();
        img.set_position(&mut gpu, vec2(5.0, 7.0)).unwrap();
        img.set_size(&mut gpu, vec2(32.0, 32.0)).unwrap();
        assert_eq!(img.quad().buffer(), buffer);
        assert_eq!(img.bounds(), Rect::new(vec2(5.0, 7.0), vec2(37.0, 39.0)));
        img.destroy(&mut gpu);
    }

    #[test]
    fn source_rect_is_normalised_and_resizes() {
        let (mut gpu, mut res) = setup();
        let img = image(&mut gpu, &mut res, 64, 32);
        let mut img = img
            .with_source_rect(&mut gpu, Rect::new(vec2(16.0, 0.0), vec2(48.0, 16.0)))
            .unwrap();
        assert_eq!(img.source_rect(), Rect::new(vec2(0.25, 0.0), vec2(0.75, 0.5)));
        assert_eq!(img.size(), vec2(32.0, 16.0));
        img.destroy(&mut gpu);
    }

    #[test]
    fn replacing_the_texture_releases_the_old_one() {
        let (mut gpu, mut res) = setup();
        let mut img = image(&mut gpu, &mut res, 2, 2);
        let replacement = res
            .textures
            .from_pixels(&mut gpu, &[0u8; 4], 1, 1, PixelFormat::Rgba8)
            .unwrap();
        let handle = replacement.handle();
        img.set_texture(&mut gpu, replacement);
        assert_eq!(gpu.live().textures, 1);
        assert_eq!(img.texture().and_then(Texture::handle), handle);
        img.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn draw_samples_unit_zero() {
        let (mut gpu, mut res) = setup();
        let mut shader =
            Shader::from_sources(&mut gpu, &[(ShaderStage::Vertex, VS), (ShaderStage::Fragment, FS)]).unwrap();
        let mut img = image(&mut gpu, &mut res, 4, 4);
        let ctx = RenderContext::new(Matrix4::identity(), Matrix4::identity(), &shader);
        ctx.apply(&mut gpu, &Matrix4::identity()).unwrap();
        img.draw(&mut gpu, &ctx).unwrap();

        let texture = img.texture().and_then(Texture::handle).unwrap();
        match gpu.draws().last() {
            Some(Command::Draw { textures, count, .. }) => {
                assert_eq!(textures, &vec![(0, texture)]);
                assert_eq!(*count, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
        img.destroy(&mut gpu);
        shader.destroy(&mut gpu);
        assert!(gpu.violations().is_empty());
    }
}
