//! Offscreen UI compositing.
//!
//! An [`Overlay`] draws its components into its own framebuffer, then
//! blends that framebuffer's colour texture over the default target as one
//! fullscreen quad. Each frame:
//!
//! 1. bind the overlay framebuffer, clear it to transparent
//! 2. draw the components in insertion order, clearing depth in between so
//!    later components always land on top
//! 3. restore the default target and the caller's viewport
//! 4. clear the default depth buffer and draw the fullscreen quad sampling
//!    the overlay texture from unit 0

use cgmath::{Matrix4, SquareMatrix, ortho, vec2};

use crate::{
    context::Resources,
    error::{EngineError, Result},
    framebuffer::{RenderTarget, RenderTargetDesc},
    gpu::{ClearMask, Gpu, TextureId},
    render::RenderContext,
    resources::{mesh::GeometryBuffer, shader::Shader},
    ui::{Rect, component::Component, quad_mesh},
};

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Uninitialized,
    Ready,
    Destroyed,
}

#[derive(Debug)]
pub struct Overlay {
    state: OverlayState,
    size: (u32, u32),
    projection: Matrix4<f32>,
    shader: Shader,
    quad: GeometryBuffer,
    target: RenderTarget,
    components: Vec<Component>,
}

impl Overlay {
    /// An overlay covering `width` x `height` pixels. Nothing is allocated
    /// until [`create`](Self::create).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: OverlayState::Uninitialized,
            size: (width, height),
            projection: ortho(0.0, width as f32, height as f32, 0.0, -1.0, 1.0),
            shader: Shader::empty(),
            quad: GeometryBuffer::new(),
            target: RenderTarget::default(),
            components: Vec::new(),
        }
    }

    /// Compiles the UI shader, builds the fullscreen quad and allocates the
    /// framebuffer. Any failure frees what was created and leaves the
    /// overlay destroyed.
    pub fn create<S: AsRef<str>>(
        &mut self,
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        shader_paths: &[S],
    ) -> Result<()> {
        if self.state != OverlayState::Uninitialized {
            return Err(EngineError::state(format!("create of an overlay in state {:?}", self.state)));
        }
        match self.allocate(gpu, res, shader_paths) {
            Ok(()) => {
                self.state = OverlayState::Ready;
                log::info!("overlay {}x{} ready", self.size.0, self.size.1);
                Ok(())
            }
            Err(err) => {
                log::error!("overlay creation failed: {err}");
                self.destroy(gpu);
                Err(err)
            }
        }
    }

    fn allocate<S: AsRef<str>>(
        &mut self,
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        shader_paths: &[S],
    ) -> Result<()> {
        self.shader.load_files(gpu, res.source.as_ref(), shader_paths)?;

        let (width, height) = self.size;
        let screen = Rect::new(vec2(0.0, 0.0), vec2(width as f32, height as f32));
        self.quad.load(gpu, &quad_mesh(screen, Rect::unit().flipped_y()))?;

        self.target = RenderTarget::create(gpu, RenderTargetDesc::sized(width, height))?;
        Ok(())
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn color_texture(&self) -> Option<TextureId> {
        self.target.color_texture()
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.target
    }

    /// Appends `component`; it is drawn after every component added before.
    /// Returns its index.
    pub fn add_component(&mut self, component: impl Into<Component>) -> usize {
        self.components.push(component.into());
        self.components.len() - 1
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.components.get_mut(index)
    }

    pub fn draw(&self, gpu: &mut dyn Gpu) -> Result<()> {
        if self.state != OverlayState::Ready {
            return Err(EngineError::state(format!("draw of an overlay in state {:?}", self.state)));
        }
        let (width, height) = self.size;
        let identity = Matrix4::identity();
        let ctx = RenderContext::new(self.projection, identity, &self.shader);

        let (x, y, screen_width, screen_height) = gpu.viewport();
        gpu.bind_framebuffer(self.target.framebuffer());
        gpu.set_viewport(0, 0, width, height);
        gpu.clear(ClearMask::ALL, TRANSPARENT);
        let drawn = self.draw_components(gpu, &ctx);
        gpu.bind_framebuffer(None);
        gpu.set_viewport(x, y, screen_width, screen_height);
        drawn?;

        ctx.apply(gpu, &identity)?;
        gpu.bind_texture(0, self.target.color_texture());
        self.shader.set_int(gpu, "uTexture", 0);
        gpu.clear(ClearMask::DEPTH, TRANSPARENT);
        let composited = self.quad.draw(gpu);
        gpu.bind_texture(0, None);
        composited
    }

    fn draw_components(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        ctx.apply(gpu, &Matrix4::identity())?;
        for (index, component) in self.components.iter().enumerate() {
            if index > 0 {
                gpu.clear(ClearMask::DEPTH, TRANSPARENT);
            }
            component.draw(gpu, ctx)?;
        }
        Ok(())
    }

    /// Frees the components and every GPU object of the overlay. Safe to
    /// call more than once.
    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        for mut component in self.components.drain(..) {
            component.destroy(gpu);
        }
        self.target.destroy(gpu);
        self.shader.destroy(gpu);
        self.quad.destroy(gpu);
        self.state = OverlayState::Destroyed;
    }
}
