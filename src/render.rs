//! Per-frame draw state and frame composition.
//!
//! [`RenderContext`] carries the camera matrices and the shader a draw call
//! should use. [`Render`] describes what goes into a frame; [`draw_frame`]
//! sorts it into the scene pass and the overlay pass so overlays are always
//! composited after every 3D draw, whatever order they were listed in.

use cgmath::{Deg, Matrix4, Point3, Vector3, perspective};

use crate::{
    error::Result,
    gpu::{ClearMask, Gpu},
    resources::{model::Model, shader::Shader},
    ui::overlay::Overlay,
};

/// Borrowed for the duration of a draw; never owns the shader.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub projection: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub shader: &'a Shader,
}

impl<'a> RenderContext<'a> {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>, shader: &'a Shader) -> Self {
        Self {
            projection,
            view,
            shader,
        }
    }

    /// Binds the shader and uploads `uProjection`, `uView` and `uModel`.
    pub fn apply(&self, gpu: &mut dyn Gpu, model: &Matrix4<f32>) -> Result<()> {
        self.shader.bind(gpu)?;
        self.shader.set_mat4(gpu, "uProjection", &self.projection);
        self.shader.set_mat4(gpu, "uView", &self.view);
        self.shader.set_mat4(gpu, "uModel", model);
        Ok(())
    }
}

/// 45° perspective for a viewport of the given size.
pub fn scene_projection(width: u32, height: u32) -> Matrix4<f32> {
    let aspect = width as f32 / height.max(1) as f32;
    perspective(Deg(45.0), aspect, 0.1, 100.0)
}

/// A camera at `eye` looking at the origin, Y up.
pub fn look_at_origin(eye: Point3<f32>) -> Matrix4<f32> {
    Matrix4::look_at_rh(eye, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y())
}

/// What to draw in a frame.
///
/// - `None` draws nothing
/// - `Model` / `Models` draw in the scene pass with the frame's render context
/// - `Overlay` composites a UI overlay after the scene pass
/// - `Composed` nests other renders
/// - `Custom` runs a closure in the scene pass
pub enum Render<'a> {
    None,
    Model(&'a Model),
    Models(Vec<&'a Model>),
    Overlay(&'a Overlay),
    Composed(Vec<Render<'a>>),
    Custom(Box<dyn 'a + FnOnce(&mut dyn Gpu, &RenderContext) -> Result<()>>),
}

enum ScenePass<'a> {
    Model(&'a Model),
    Custom(Box<dyn 'a + FnOnce(&mut dyn Gpu, &RenderContext) -> Result<()>>),
}

impl<'a> Render<'a> {
    fn sort(self, scene: &mut Vec<ScenePass<'a>>, overlays: &mut Vec<&'a Overlay>) {
        match self {
            Render::None => (),
            Render::Model(model) => scene.push(ScenePass::Model(model)),
            Render::Models(models) => scene.extend(models.into_iter().map(ScenePass::Model)),
            Render::Overlay(overlay) => overlays.push(overlay),
            Render::Composed(renders) => {
                for render in renders {
                    render.sort(scene, overlays);
                }
            }
            Render::Custom(f) => scene.push(ScenePass::Custom(f)),
        }
    }
}

/// Draws one frame to the default target: clear, scene pass, then every
/// overlay in the order given.
pub fn draw_frame(
    gpu: &mut dyn Gpu,
    clear_color: [f32; 4],
    ctx: &RenderContext,
    render: Render,
) -> Result<()> {
    let mut scene = Vec::new();
    let mut overlays = Vec::new();
    render.sort(&mut scene, &mut overlays);

    gpu.bind_framebuffer(None);
    gpu.clear(ClearMask::ALL, clear_color);
    for pass in scene {
        match pass {
            ScenePass::Model(model) => model.draw(gpu, ctx)?,
            ScenePass::Custom(f) => f(gpu, ctx)?,
        }
    }
    for overlay in overlays {
        overlay.draw(gpu)?;
    }
    Ok(())
}
