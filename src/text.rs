//! Glyph rasterisation for UI text.
//!
//! Text components only need a string turned into pixels; they talk to a
//! [`GlyphRasterizer`]. [`Font`] implements it with `fontdue`, and fonts
//! are shared per path through the [`FontCache`].

use std::{collections::HashMap, rc::Rc};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use image::{Rgba, RgbaImage};

use crate::{
    assets::{self, AssetSource},
    error::{EngineError, Result},
};

pub trait GlyphRasterizer {
    /// Renders `text` on a transparent canvas just large enough to hold it.
    /// `size` is in pixels (points at 72 DPI).
    fn rasterize(&self, text: &str, size: f32, color: Rgba<u8>) -> Result<RgbaImage>;
}

pub struct Font {
    inner: fontdue::Font,
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font").field("name", &self.inner.name()).finish()
    }
}

impl Font {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| EngineError::decode(format!("font: {e}")))?;
        Ok(Self { inner })
    }
}

impl GlyphRasterizer for Font {
    fn rasterize(&self, text: &str, size: f32, color: Rgba<u8>) -> Result<RgbaImage> {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.inner], &TextStyle::new(text, size, 0));

        let glyphs = layout.glyphs();
        let width = glyphs
            .iter()
            .map(|g| {
                let m = self.inner.metrics_indexed(g.key.glyph_index, size);
                (g.x - m.xmin as f32 + m.advance_width).max(g.x + g.width as f32)
            })
            .fold(0.0f32, f32::max)
            .ceil()
            .max(1.0) as u32;
        let height = layout.height().ceil().max(1.0) as u32;

        let mut canvas = RgbaImage::new(width, height);
        for glyph in glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (metrics, coverage) = self.inner.rasterize_config(glyph.key);
            let (x0, y0) = (glyph.x.round() as i64, glyph.y.round() as i64);
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let alpha = coverage[row * metrics.width + col];
                    let (x, y) = (x0 + col as i64, y0 + row as i64);
                    if alpha == 0 || x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                        continue;
                    }
                    let alpha = (alpha as u16 * color[3] as u16 / 255) as u8;
                    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                    *pixel = Rgba([color[0], color[1], color[2], pixel[3].max(alpha)]);
                }
            }
        }
        Ok(canvas)
    }
}

/// Fonts keyed by asset path.
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: HashMap<String, Rc<Font>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, source: &dyn AssetSource, path: &str) -> Result<Rc<Font>> {
        let key = assets::normalize_path(path);
        if let Some(font) = self.fonts.get(&key) {
            log::info!("load font @[{key}]");
            return Ok(Rc::clone(font));
        }
        log::info!("load font [{key}]");
        let font = Rc::new(Font::from_bytes(&source.load_bytes(&key)?)?);
        self.fonts.insert(key, Rc::clone(&font));
        Ok(font)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }
}
