use crate::gpu::TextureParams;

/// Settings the engine context is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    /// Linear RGBA in `0.0..=1.0`.
    pub clear_color: [f32; 4],
    /// Sampling state for textures loaded through the cache.
    pub texture_params: TextureParams,
    /// Directory every asset path is resolved against.
    pub asset_root: String,
    pub scene_shader: Vec<String>,
    pub ui_shader: Vec<String>,
    pub ui_font: String,
    pub ui_font_size: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            clear_color: [16.0 / 255.0, 163.0 / 255.0, 160.0 / 255.0, 1.0],
            texture_params: TextureParams::default(),
            asset_root: "assets".to_string(),
            scene_shader: vec![
                "shaders/default.vs.glsl".to_string(),
                "shaders/default.fs.glsl".to_string(),
            ],
            ui_shader: vec![
                "shaders/ui.vs.glsl".to_string(),
                "shaders/ui.fs.glsl".to_string(),
            ],
            ui_font: "fonts/DejaVuSans.ttf".to_string(),
            ui_font_size: 18.0,
        }
    }
}

impl EngineConfig {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }
}
