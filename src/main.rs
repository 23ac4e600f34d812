//! Headless demo: a spinning crate with a HUD, rendered on the software device.
//!
//! Usage: `telcom-ngin [frames]`. Assets are read from `./assets`.

use anyhow::Context as _;
use cgmath::{Matrix4, Point3, Rad, vec2, vec3};
use image::Rgba;
use instant::Instant;
use telcom_ngin::{
    Context, EngineConfig, Render, RenderContext, Resources, draw_frame,
    gpu::Gpu,
    logging::{LoggingConfig, init_logging},
    render::{look_at_origin, scene_projection},
    resources::{Model, Shader},
    ui::{Component, Overlay, Text},
};

const DEFAULT_FRAMES: u32 = 240;
const FPS_PERIOD: f32 = 1.0;
const MODEL: &str = "models/crate/crate.obj";

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn fps_color(frames: u32) -> Rgba<u8> {
    if frames < 30 {
        Rgba([255, 0, 0, 255])
    } else if frames < 60 {
        Rgba([255, 255, 0, 255])
    } else {
        Rgba([0, 255, 0, 255])
    }
}

struct Demo {
    shader: Shader,
    model: Model,
    hud: Overlay,
    fps: Option<usize>,
}

impl Demo {
    fn load(gpu: &mut dyn Gpu, res: &mut Resources, config: &EngineConfig) -> anyhow::Result<Self> {
        let mut demo = Demo {
            shader: Shader::empty(),
            model: Model::new(),
            hud: Overlay::new(config.width, config.height),
            fps: None,
        };
        if let Err(err) = demo.populate(gpu, res, config) {
            demo.destroy(gpu);
            return Err(err);
        }
        Ok(demo)
    }

    fn populate(&mut self, gpu: &mut dyn Gpu, res: &mut Resources, config: &EngineConfig) -> anyhow::Result<()> {
        self.shader
            .load_files(gpu, res.source.as_ref(), &config.scene_shader)
            .context("scene shader")?;
        self.shader.bind(gpu)?;
        self.shader.set_vec3(gpu, "uCamera", vec3(3.0, 3.0, 3.0));
        self.shader.set_vec3(gpu, "uLight", vec3(3.0, 3.0, 3.0));

        self.model = Model::load(gpu, res, MODEL).with_context(|| format!("model [{MODEL}]"))?;

        self.hud
            .create(gpu, res, &config.ui_shader)
            .context("UI overlay")?;
        self.fps = self.add_text(gpu, res, config, "FPS 00", vec2(config.width as f32 - 60.0, 5.0))?;
        self.add_text(gpu, res, config, "File  Edit  Window", vec2(10.0, 5.0))?;
        Ok(())
    }

    /// Adds a HUD label. A missing font only disables the label.
    fn add_text(
        &mut self,
        gpu: &mut dyn Gpu,
        res: &mut Resources,
        config: &EngineConfig,
        label: &str,
        position: cgmath::Vector2<f32>,
    ) -> anyhow::Result<Option<usize>> {
        let mut text = match Text::new(gpu, res, &config.ui_font, label, config.ui_font_size, WHITE) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("HUD label '{label}' disabled: {err}");
                return Ok(None);
            }
        };
        text.set_position(gpu, position)?;
        Ok(Some(self.hud.add_component(text)))
    }

    fn update_fps(&mut self, gpu: &mut dyn Gpu, res: &mut Resources, frames: u32) -> anyhow::Result<()> {
        let Some(text) = self
            .fps
            .and_then(|index| self.hud.component_mut(index))
            .and_then(Component::as_text_mut)
        else {
            return Ok(());
        };
        text.set_color(gpu, res, fps_color(frames))?;
        text.set_text(gpu, res, &format!("FPS {frames}"))?;
        Ok(())
    }

    fn destroy(&mut self, gpu: &mut dyn Gpu) {
        self.hud.destroy(gpu);
        self.model.destroy(gpu);
        self.shader.destroy(gpu);
    }
}

fn run(ctx: &mut Context, frames: u32) -> anyhow::Result<()> {
    let config = ctx.config.clone();
    let projection = scene_projection(config.width, config.height);
    let view = look_at_origin(Point3::new(2.0, 2.0, 2.0));

    let (gpu, res) = ctx.parts();
    let mut demo = Demo::load(gpu, res, &config)?;

    let start = Instant::now();
    let mut prev = start;
    let mut fps_elapsed = 0.0;
    let mut frame_count = 0;
    let mut result = Ok(());
    for _ in 0..frames {
        let now = Instant::now();
        fps_elapsed += now.duration_since(prev).as_secs_f32();
        prev = now;
        if fps_elapsed >= FPS_PERIOD {
            if let Err(err) = demo.update_fps(gpu, res, frame_count) {
                result = Err(err);
                break;
            }
            fps_elapsed = 0.0;
            frame_count = 0;
        }

        let rotation = now.duration_since(start).as_secs_f32();
        demo.model.set_transform(Matrix4::from_angle_y(Rad(rotation)));

        let render_ctx = RenderContext::new(projection, view, &demo.shader);
        let render = Render::Composed(vec![Render::Model(&demo.model), Render::Overlay(&demo.hud)]);
        if let Err(err) = draw_frame(gpu, config.clear_color, &render_ctx, render) {
            result = Err(err.into());
            break;
        }
        frame_count += 1;
    }

    let elapsed = start.elapsed();
    log::info!("rendered {frames} frame(s) in {elapsed:?}");
    demo.destroy(gpu);
    res.textures.collect_garbage(gpu);
    result
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let frames = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("frame count '{arg}' is not a number"))?,
        None => DEFAULT_FRAMES,
    };

    let mut ctx = Context::headless(EngineConfig::default());
    let result = run(&mut ctx, frames);
    if let Err(err) = &result {
        log::error!("{err:#}");
    }
    let live = ctx.gpu.live();
    ctx.shutdown();
    log::info!(
        "{} draw call(s) issued, {} object(s) still alive before shutdown",
        ctx.gpu.draws().count(),
        live.total()
    );
    result
}
