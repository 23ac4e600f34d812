use std::{io::Cursor, rc::Rc};

use image::{ImageFormat, Rgba, RgbaImage};
use telcom_ngin::{
    Context, EngineConfig, Result,
    assets::{FsAssets, MemoryAssets},
    gpu::HeadlessGpu,
    text::GlyphRasterizer,
};

pub const SCENE_VS: &str = include_str!("../../assets/shaders/default.vs.glsl");
pub const SCENE_FS: &str = include_str!("../../assets/shaders/default.fs.glsl");
pub const UI_VS: &str = include_str!("../../assets/shaders/ui.vs.glsl");
pub const UI_FS: &str = include_str!("../../assets/shaders/ui.fs.glsl");

/// In-memory assets holding the bundled shaders under their usual paths.
pub fn shader_assets() -> MemoryAssets {
    MemoryAssets::new()
        .with("shaders/default.vs.glsl", SCENE_VS)
        .with("shaders/default.fs.glsl", SCENE_FS)
        .with("shaders/ui.vs.glsl", UI_VS)
        .with("shaders/ui.fs.glsl", UI_FS)
}

/// A headless context over `assets`, sized 320x200.
pub fn context(assets: MemoryAssets) -> Context {
    Context::new(
        HeadlessGpu::new(),
        Box::new(assets),
        EngineConfig::default().with_size(320, 200),
    )
}

/// A headless context reading the repository's `assets/` directory.
pub fn bundled_context() -> Context {
    let config = EngineConfig::default()
        .with_size(320, 200)
        .with_asset_root(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
    let source = Box::new(FsAssets::new(&config.asset_root));
    Context::new(HeadlessGpu::new(), source, config)
}

pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::from(RgbaImage::from_pixel(width, height, Rgba(color)))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Rasterises every character as an 8 pixel wide block, `size` pixels high.
pub struct BlockGlyphs;

impl GlyphRasterizer for BlockGlyphs {
    fn rasterize(&self, text: &str, size: f32, color: Rgba<u8>) -> Result<RgbaImage> {
        let width = (text.chars().count() as u32 * 8).max(1);
        Ok(RgbaImage::from_pixel(width, (size as u32).max(1), color))
    }
}

pub fn block_glyphs() -> Rc<dyn GlyphRasterizer> {
    Rc::new(BlockGlyphs)
}

pub fn assert_clean(ctx: &mut Context) {
    assert!(
        ctx.gpu.violations().is_empty(),
        "device violations: {:?}",
        ctx.gpu.violations()
    );
    ctx.shutdown();
    assert_eq!(ctx.gpu.live().total(), 0, "objects leaked: {:?}", ctx.gpu.live());
}
