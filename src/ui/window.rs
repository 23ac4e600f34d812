use cgmath::{Vector2, vec2};

use crate::{
    context::Resources,
    error::{EngineError, Result},
    gpu::Gpu,
    render::RenderContext,
    ui::image::Image,
};

/// The nine pieces of a window frame.
#[derive(Debug)]
pub struct WindowSlices {
    pub nw: Image,
    pub ne: Image,
    pub sw: Image,
    pub se: Image,
    pub n: Image,
    pub s: Image,
    pub w: Image,
    pub e: Image,
    pub center: Image,
}

impl WindowSlices {
    /// Loads the slices from image files given in the order
    /// nw, ne, sw, se, n, s, w, e, center.
    pub fn load(gpu: &mut dyn Gpu, res: &mut Resources, paths: [&str; 9]) -> Result<Self> {
        let mut loaded = Vec::with_capacity(9);
        for path in paths {
            match Image::from_file(gpu, res, path) {
                Ok(image) => loaded.push(image),
                Err(err) => {
                    for mut image in loaded {
                        image.destroy(gpu);
                    }
                    return Err(err);
                }
            }
        }
        let [nw, ne, sw, se, n, s, w, e, center]: [Image; 9] = loaded
            .try_into()
            .map_err(|_| EngineError::state("window frame needs exactly nine slices"))?;
        Ok(Self {
            nw,
            ne,
            sw,
            se,
            n,
            s,
            w,
            e,
            center,
        })
    }

    /// Corners, then edges, then the center.
    fn in_draw_order(&self) -> [&Image; 9] {
        [
            &self.nw,
            &self.ne,
            &self.sw,
            &self.se,
            &self.n,
            &self.s,
            &self.w,
            &self.e,
            &self.center,
        ]
    }

    fn all_mut(&mut self) -> [&mut Image; 9] {
        [
            &mut self.nw,
            &mut self.ne,
            &mut self.sw,
            &mut self.se,
            &mut self.n,
            &mut self.s,
            &mut self.w,
            &mut self.e,
            &mut self.center,
        ]
    }
}

/// A resizable frame drawn with 9-slice scaling.
///
/// Corners keep their size, edges stretch along the frame, the center fills
/// whatever is left.
#[derive(Debug)]
pub struct Window {
    position: Vector2<f32>,
    size: Vector2<f32>,
    slices: WindowSlices,
}

impl Window {
    /// Lays the slices out over `position`/`size`.
    pub fn new(
        gpu: &mut dyn Gpu,
        slices: WindowSlices,
        position: Vector2<f32>,
        size: Vector2<f32>,
    ) -> Result<Self> {
        let mut window = Self {
            position,
            size,
            slices,
        };
        if let Err(err) = window.layout(gpu) {
            window.destroy(gpu);
            return Err(err);
        }
        Ok(window)
    }

    pub fn position(&self) -> Vector2<f32> {
        self.position
    }

    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    pub fn slices(&self) -> &WindowSlices {
        &self.slices
    }

    pub fn set_position(&mut self, gpu: &mut dyn Gpu, position: Vector2<f32>) -> Result<()> {
        self.position = position;
        self.layout(gpu)
    }

    pub fn set_size(&mut self, gpu: &mut dyn Gpu, size: Vector2<f32>) -> Result<()> {
        self.size = size;
        self.layout(gpu)
    }

    fn layout(&mut self, gpu: &mut dyn Gpu) -> Result<()> {
        let (pos, size) = (self.position, self.size);
        let s = &mut self.slices;
        let (nw, ne, sw, se) = (s.nw.size(), s.ne.size(), s.sw.size(), s.se.size());
        let far = pos + size;
        let span = |from: f32, to: f32| (to - from).max(0.0);

        s.nw.set_position(gpu, pos)?;
        s.ne.set_position(gpu, vec2(far.x - ne.x, pos.y))?;
        s.sw.set_position(gpu, vec2(pos.x, far.y - sw.y))?;
        s.se.set_position(gpu, far - se)?;

        s.n.set_bounds(
            gpu,
            vec2(pos.x + nw.x, pos.y),
            vec2(span(pos.x + nw.x, far.x - ne.x), nw.y),
        )?;
        s.s.set_bounds(
            gpu,
            vec2(pos.x + sw.x, far.y - sw.y),
            vec2(span(pos.x + sw.x, far.x - se.x), sw.y),
        )?;
        s.w.set_bounds(
            gpu,
            vec2(pos.x, pos.y + nw.y),
            vec2(nw.x, span(pos.y + nw.y, far.y - sw.y)),
        )?;
        s.e.set_bounds(
            gpu,
            vec2(far.x - ne.x, pos.y + ne.y),
            vec2(ne.x, span(pos.y + ne.y, far.y - se.y)),
        )?;
        s.center.set_bounds(
            gpu,
            pos + nw,
            vec2(span(pos.x + nw.x, far.x - se.x), span(pos.y + nw.y, far.y - se.y)),
        )
    }

    pub fn draw(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        for image in self.slices.in_draw_order() {
            image.draw(gpu, ctx)?;
        }
        Ok(())
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        for image in self.slices.all_mut() {
            image.destroy(gpu);
        }
    }
}
