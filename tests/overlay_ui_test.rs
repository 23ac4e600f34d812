mod common;

use cgmath::vec2;
use image::Rgba;
use telcom_ngin::{
    gpu::{ClearMask, Command},
    ui::{Component, Overlay, OverlayState, Text, Window, window::WindowSlices},
};

use crate::common::test_utils::{assert_clean, block_glyphs, bundled_context, context, png, shader_assets};

const FRAME: [&str; 9] = [
    "ui/frame/nw.png",
    "ui/frame/ne.png",
    "ui/frame/sw.png",
    "ui/frame/se.png",
    "ui/frame/n.png",
    "ui/frame/s.png",
    "ui/frame/w.png",
    "ui/frame/e.png",
    "ui/frame/center.png",
];

fn assets() -> telcom_ngin::assets::MemoryAssets {
    let sizes = [(40, 60), (40, 60), (40, 60), (40, 60), (1, 60), (1, 60), (40, 1), (40, 1), (1, 1)];
    FRAME
        .iter()
        .zip(sizes)
        .fold(shader_assets(), |assets, (path, (w, h))| assets.with(path, png(w, h, [90, 90, 90, 255])))
}

#[test]
fn window_and_text_in_one_overlay() {
    let mut ctx = context(assets());
    let config = ctx.config.clone();
    let (gpu, res) = ctx.parts();

    let mut hud = Overlay::new(config.width, config.height);
    hud.create(gpu, res, &config.ui_shader).unwrap();
    assert_eq!(hud.state(), OverlayState::Ready);

    let slices = WindowSlices::load(gpu, res, FRAME).unwrap();
    let window = Window::new(gpu, slices, vec2(100.0, 100.0), vec2(200.0, 200.0)).unwrap();
    assert_eq!(window.slices().se.position(), vec2(260.0, 240.0));
    hud.add_component(window);

    let label = Text::with_rasterizer(gpu, res, block_glyphs(), "FPS 00", 18.0, Rgba([255, 255, 255, 255])).unwrap();
    let label = hud.add_component(label);

    if let Some(Component::Text(text)) = hud.component_mut(label) {
        text.set_position(gpu, vec2(260.0, 5.0)).unwrap();
        text.set_color(gpu, res, Rgba([0, 255, 0, 255])).unwrap();
        text.set_text(gpu, res, "FPS 60").unwrap();
    }
    assert_eq!(hud.components()[label].position(), vec2(260.0, 5.0));
    assert_eq!(hud.components()[label].size(), vec2(48.0, 18.0));

    hud.draw(gpu).unwrap();
    hud.destroy(gpu);

    let offscreen_draws = ctx
        .gpu
        .draws()
        .filter(|c| matches!(c, Command::Draw { target: Some(_), .. }))
        .count();
    assert_eq!(offscreen_draws, 10);
    // One depth clear between the window and the label, one before compositing.
    let depth_clears = ctx
        .gpu
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Clear { mask, .. } if *mask == ClearMask::DEPTH))
        .count();
    assert_eq!(depth_clears, 2);
    assert_clean(&mut ctx);
}

#[test]
fn components_can_be_moved_through_the_overlay() {
    let mut ctx = context(assets());
    let config = ctx.config.clone();
    let (gpu, res) = ctx.parts();

    let mut hud = Overlay::new(config.width, config.height);
    hud.create(gpu, res, &config.ui_shader).unwrap();
    let slices = WindowSlices::load(gpu, res, FRAME).unwrap();
    let window = Window::new(gpu, slices, vec2(0.0, 0.0), vec2(100.0, 150.0)).unwrap();
    let index = hud.add_component(window);

    let component = hud.component_mut(index).unwrap();
    component.set_position(gpu, vec2(10.0, 10.0)).unwrap();
    component.set_size(gpu, vec2(200.0, 200.0)).unwrap();
    match hud.components()[index] {
        Component::Window(ref window) => {
            assert_eq!(window.slices().center.position(), vec2(50.0, 70.0));
            assert_eq!(window.slices().center.size(), vec2(120.0, 80.0));
        }
        _ => panic!("expected the window"),
    }
    // Each slice holds one lease on the texture of its file.
    assert_eq!(res.textures.use_count("ui/frame/nw.png"), 1);

    hud.destroy(gpu);
    assert_eq!(res.textures.resident(), 0);
    assert_clean(&mut ctx);
}

#[test]
fn bundled_font_renders_a_hud_label() {
    let mut ctx = bundled_context();
    let config = ctx.config.clone();
    let green = Rgba([0, 255, 0, 255]);
    let (gpu, res) = ctx.parts();
    let mut hud = Overlay::new(config.width, config.height);
    hud.create(gpu, res, &config.ui_shader).unwrap();

    let label = Text::new(gpu, res, &config.ui_font, "FPS 60", config.ui_font_size, green).unwrap();
    let texture = label.image().texture().unwrap();
    let (width, height) = (texture.width(), texture.height());
    let handle = texture.handle().unwrap();
    assert_eq!(label.size(), vec2(width as f32, height as f32));
    assert!((30..200).contains(&width), "width {width}");
    assert!((18..40).contains(&height), "height {height}");
    hud.add_component(label);

    let pixels = ctx.gpu.texture_pixels(handle).unwrap();
    assert_eq!(pixels.len(), (width * height * 4) as usize);
    let inked: Vec<&[u8]> = pixels.chunks(4).filter(|p| p[3] > 0).collect();
    assert!(!inked.is_empty());
    assert!(inked.iter().all(|p| p[..3] == [0, 255, 0]));
    assert!(inked.len() < pixels.len() / 4, "glyphs should leave gaps");

    let (gpu, _) = ctx.parts();
    hud.draw(gpu).unwrap();
    hud.destroy(gpu);
    assert_clean(&mut ctx);
}
