use cgmath::Vector2;

use crate::{
    error::Result,
    gpu::Gpu,
    render::RenderContext,
    ui::{image::Image, text::Text, window::Window},
};

/// Anything an [`Overlay`](super::Overlay) can hold.
#[derive(Debug)]
pub enum Component {
    Image(Image),
    Text(Text),
    Window(Box<Window>),
}

impl Component {
    pub fn position(&self) -> Vector2<f32> {
        match self {
            Component::Image(image) => image.position(),
            Component::Text(text) => text.position(),
            Component::Window(window) => window.position(),
        }
    }

    pub fn size(&self) -> Vector2<f32> {
        match self {
            Component::Image(image) => image.size(),
            Component::Text(text) => text.size(),
            Component::Window(window) => window.size(),
        }
    }

    pub fn set_position(&mut self, gpu: &mut dyn Gpu, position: Vector2<f32>) -> Result<()> {
        match self {
            Component::Image(image) => image.set_position(gpu, position),
            Component::Text(text) => text.set_position(gpu, position),
            Component::Window(window) => window.set_position(gpu, position),
        }
    }

    pub fn set_size(&mut self, gpu: &mut dyn Gpu, size: Vector2<f32>) -> Result<()> {
        match self {
            Component::Image(image) => image.set_size(gpu, size),
            Component::Text(text) => text.set_size(gpu, size),
            Component::Window(window) => window.set_size(gpu, size),
        }
    }

    pub fn draw(&self, gpu: &mut dyn Gpu, ctx: &RenderContext) -> Result<()> {
        match self {
            Component::Image(image) => image.draw(gpu, ctx),
            Component::Text(text) => text.draw(gpu, ctx),
            Component::Window(window) => window.draw(gpu, ctx),
        }
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        match self {
            Component::Image(image) => image.destroy(gpu),
            Component::Text(text) => text.destroy(gpu),
            Component::Window(window) => window.destroy(gpu),
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match self {
            Component::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Image> for Component {
    fn from(image: Image) -> Self {
        Component::Image(image)
    }
}

impl From<Text> for Component {
    fn from(text: Text) -> Self {
        Component::Text(text)
    }
}

impl From<Window> for Component {
    fn from(window: Window) -> Self {
        Component::Window(Box::new(window))
    }
}
