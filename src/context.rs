//! Engine-wide state, passed explicitly instead of living in globals.
//!
//! [`Resources`] bundles the asset source with the caches built on top of
//! it (textures, fonts). [`Context`] adds the device and configuration and
//! is what an application holds for the engine's lifetime. Everything is
//! torn down by [`Context::shutdown`].

use std::rc::Rc;

use crate::{
    assets::{AssetSource, FsAssets},
    config::EngineConfig,
    error::Result,
    gpu::{Capability, Gpu, HeadlessGpu, TextureParams},
    resources::texture::{Texture, TextureCache},
    text::{Font, FontCache},
};

pub struct Resources {
    pub source: Box<dyn AssetSource>,
    pub textures: TextureCache,
    pub fonts: FontCache,
}

impl Resources {
    pub fn new(source: Box<dyn AssetSource>, params: TextureParams) -> Self {
        Self {
            source,
            textures: TextureCache::new(params),
            fonts: FontCache::new(),
        }
    }

    pub fn acquire_texture(&mut self, gpu: &mut dyn Gpu, path: &str) -> Result<Texture> {
        self.textures.acquire(gpu, self.source.as_ref(), path)
    }

    pub fn load_font(&mut self, path: &str) -> Result<Rc<Font>> {
        self.fonts.load(self.source.as_ref(), path)
    }

    /// Frees every texture still owned by the cache and forgets loaded fonts.
    pub fn shutdown(&mut self, gpu: &mut dyn Gpu) {
        self.textures.shutdown(gpu);
        self.fonts.clear();
    }
}

pub struct Context<G: Gpu = HeadlessGpu> {
    pub gpu: G,
    pub resources: Resources,
    pub config: EngineConfig,
}

impl Context<HeadlessGpu> {
    /// A context on the software device, reading assets from `config.asset_root`.
    pub fn headless(config: EngineConfig) -> Self {
        let source = Box::new(FsAssets::new(&config.asset_root));
        Self::new(HeadlessGpu::new(), source, config)
    }
}

impl<G: Gpu> Context<G> {
    /// Sets up the default render state (depth test, alpha blending, full
    /// viewport) on `gpu`.
    pub fn new(mut gpu: G, source: Box<dyn AssetSource>, config: EngineConfig) -> Self {
        gpu.set_capability(Capability::DepthTest, true);
        gpu.set_capability(Capability::Blend, true);
        gpu.set_viewport(0, 0, config.width, config.height);
        log::info!(
            "engine context {}x{} (GLSL {})",
            config.width,
            config.height,
            gpu.shading_language_version()
        );
        let resources = Resources::new(source, config.texture_params);
        Self {
            gpu,
            resources,
            config,
        }
    }

    /// Splits the context so a resource can use the device and the caches at once.
    pub fn parts(&mut self) -> (&mut dyn Gpu, &mut Resources) {
        (&mut self.gpu, &mut self.resources)
    }

    pub fn shutdown(&mut self) {
        self.resources.shutdown(&mut self.gpu);
        log::info!("engine context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;

    #[test]
    fn default_render_state() {
        let ctx = Context::new(
            HeadlessGpu::new(),
            Box::new(MemoryAssets::new()),
            EngineConfig::default().with_size(320, 200),
        );
        assert!(ctx.gpu.is_enabled(Capability::DepthTest));
        assert!(ctx.gpu.is_enabled(Capability::Blend));
        assert_eq!(ctx.gpu.viewport(), (0, 0, 320, 200));
        assert_eq!(ctx.resources.textures.resident(), 0);
    }
}
