use std::rc::Rc;

use ::image::Rgba;
use cgmath::{Vector2, vec2};

use crate::{
    context::Resources,
    error::Result,
    gpu::{Gpu, PixelFormat},
    render::RenderContext,
    resources::texture::Texture,
    text::GlyphRasterizer,
    ui::image::Image,
};

/// A string rendered to a texture.
///
/// Changing the string or colour rasterises it again and resizes the
/// component to the new texture.
pub struct Text {
    image: Image,
    text: String,
    font_size: f32,
    color: Rgba<u8>,
    rasterizer: Rc<dyn GlyphRasterizer>,
}

impl std::fmt::Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Text")
            .field("text", &self.text)
            .field("font_size", &self.font_size)
            .field("color", &self.color)
            .field("image", &self.image)
            .finish()
    }
}

impl Text {
    pub fn new(
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        font: &str,
        text: &str,
        font_size: f32,
        color: Rgba<u8>,
    ) -> Result<Self> {
        let rasterizer: Rc<dyn GlyphRasterizer> = res.load_font(font)?;
        Self::with_rasterizer(gpu, res, rasterizer, text, font_size, color)
    }

    pub fn with_rasterizer(
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        rasterizer: Rc<dyn GlyphRasterizer>,
        text: &str,
        font_size: f32,
        color: Rgba<u8>,
    ) -> Result<Self> {
        let texture = render(gpu, res, rasterizer.as_ref(), text, font_size, color)?;
        let image = Image::from_texture(gpu, texture)?;
        Ok(Self {
            image,
            text: text.to_string(),
            font_size,
            color,
            rasterizer,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn set_text(&mut self, gpu: &mut dyn Gpu, res: &mut Resources, text: &str) -> Result<()> {
        if text == self.text {
            return Ok(());
        }
        self.rerender(gpu, res, text, self.color)?;
        self.text = text.to_string();
        Ok(())
    }

    pub fn set_color(&mut self, gpu: &mut dyn Gpu, res: &mut Resources, color: Rgba<u8>) -> Result<()> {
        if color == self.color {
            return Ok(());
        }
        let text = self.text.clone();
        self.rerender(gpu, res, &text, color)?;
        self.color = color;
        Ok(())
    }

    fn rerender(&mut self, gpu: &mut dyn Gpu, res: &mut Resources, text: &str, color: Rgba<u8>) -> Result<()> {
        let texture = render(gpu, res, self.rasterizer.as_ref(), text, self.font_size, color)?;
        let size = vec2(texture.width() as f32, texture.height() as f32);
        self.image.set_texture(gpu, texture);
        self.image.set_size(gpu, size)
    }

    pub fn position(&self) -> Vector2<f32> {
        self.image.position()
    }

    pub fn size(&self) -> Vector2<f32> {
        self.image.size()
    }

    pub fn set_position(&mut self, gpu: &mut dyn Gpu, position: Vector2<f32>) -> Result<()> {
        self.image.set_position(gpu, position)
    }

    pub fn set_size(&mut self, gpu: &mut dyn Gpu, size: Vector2<f32>) -> Result<()> {
        self.image.set_size(gpu, size)
    }

    pub fn draw(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        self.image.draw(gpu, ctx)
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        self.image.destroy(gpu);
    }
}

fn render(
    gpu: &mut dyn Gpu,
    res: &mut Resources,
    rasterizer: &dyn GlyphRasterizer,
    text: &str,
    font_size: f32,
    color: Rgba<u8>,
) -> Result<Texture> {
    let canvas = rasterizer.rasterize(text, font_size, color)?;
    let (width, height) = canvas.dimensions();
    res.textures
        .from_pixels(gpu, canvas.as_raw(), width, height, PixelFormat::Rgba8)
}

#[cfg(test)]
mod tests {
    use ::image::RgbaImage;

    use super::*;
    use crate::{
        assets::MemoryAssets,
        gpu::{Fault, HeadlessGpu, TextureParams},
    };

    /// Eight pixels per character, one line of `size` pixels.
    struct Blocks;

    impl GlyphRasterizer for Blocks {
        fn rasterize(&self, text: &str, size: f32, color: Rgba<u8>) -> Result<RgbaImage> {
            let width = (text.chars().count() as u32 * 8).max(1);
            Ok(RgbaImage::from_pixel(width, size as u32, color))
        }
    }

    fn setup() -> (HeadlessGpu, Resources) {
        (
            HeadlessGpu::new(),
            Resources::new(Box::new(MemoryAssets::new()), TextureParams::default()),
        )
    }

    #[test]
    fn set_text_resizes_to_the_new_texture() {
        let (mut gpu, mut res) = setup();
        let white = Rgba([255, 255, 255, 255]);
        let mut text = Text::with_rasterizer(&mut gpu, &mut res, Rc::new(Blocks), "FPS 00", 18.0, white).unwrap();
        assert_eq!(text.size(), vec2(48.0, 18.0));
        text.set_position(&mut gpu, vec2(964.0, 5.0)).unwrap();

        text.set_text(&mut gpu, &mut res, "FPS 120").unwrap();
        assert_eq!(text.text(), "FPS 120");
        assert_eq!(text.size(), vec2(56.0, 18.0));
        assert_eq!(text.position(), vec2(964.0, 5.0));
        assert_eq!(gpu.live().textures, 1);
        assert_eq!(res.textures.resident(), 1);

        text.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn set_color_uploads_new_pixels() {
        let (mut gpu, mut res) = setup();
        let mut text = Text::with_rasterizer(
            &mut gpu,
            &mut res,
            Rc::new(Blocks),
            "a",
            2.0,
            Rgba([255, 255, 255, 255]),
        )
        .unwrap();
        let red = Rgba([255, 0, 0, 255]);
        text.set_color(&mut gpu, &mut res, red).unwrap();
        let handle = text.image().texture().and_then(Texture::handle).unwrap();
        assert_eq!(&gpu.texture_pixels(handle).unwrap()[..4], &red.0);
        text.destroy(&mut gpu);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn missing_font_is_a_load_error() {
        let (mut gpu, mut res) = setup();
        let err = Text::new(&mut gpu, &mut res, "fonts/none.ttf", "x", 12.0, Rgba([0, 0, 0, 255])).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::ResourceLoad { .. }));
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn failed_rerender_keeps_the_old_state() {
        let (mut gpu, mut res) = setup();
        let white = Rgba([255, 255, 255, 255]);
        let mut text = Text::with_rasterizer(&mut gpu, &mut res, Rc::new(Blocks), "ok", 4.0, white).unwrap();

        gpu.inject(Fault::TextureAllocation);
        assert!(text.set_text(&mut gpu, &mut res, "longer").is_err());
        assert_eq!(text.text(), "ok");
        assert_eq!(text.size(), vec2(16.0, 4.0));

        gpu.inject(Fault::TextureAllocation);
        assert!(text.set_color(&mut gpu, &mut res, Rgba([0, 0, 255, 255])).is_err());
        assert_eq!(text.color(), white);

        text.set_text(&mut gpu, &mut res, "longer").unwrap();
        assert_eq!(text.text(), "longer");
        text.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }
}
