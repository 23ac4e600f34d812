//! Offscreen render targets.

use crate::{
    error::{EngineError, Result},
    gpu::{
        FramebufferId, FramebufferStatus, Gpu, PixelFormat, RenderbufferId, TextureDesc, TextureId,
        TextureParams,
    },
};

/// Which attachments to create, by size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub color: Option<(u32, u32)>,
    pub depth: Option<(u32, u32)>,
}

impl RenderTargetDesc {
    /// Colour and depth of the same size.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            color: Some((width, height)),
            depth: Some((width, height)),
        }
    }
}

/// A framebuffer with an RGBA colour texture and a depth renderbuffer.
#[derive(Debug, Default)]
pub struct RenderTarget {
    framebuffer: Option<FramebufferId>,
    color: Option<TextureId>,
    depth: Option<RenderbufferId>,
    size: (u32, u32),
}

impl RenderTarget {
    /// Allocates the attachments, wires them into a framebuffer and checks
    /// completeness. Any failure, an incomplete framebuffer included, frees
    /// everything created so far.
    pub fn create(gpu: &mut dyn Gpu, desc: RenderTargetDesc) -> Result<Self> {
        let mut target = Self {
            size: desc.color.unwrap_or_default(),
            ..Default::default()
        };
        match target.build(gpu, desc) {
            Ok(()) => Ok(target),
            Err(err) => {
                target.destroy(gpu);
                gpu.bind_framebuffer(None);
                Err(err)
            }
        }
    }

    fn build(&mut self, gpu: &mut dyn Gpu, desc: RenderTargetDesc) -> Result<()> {
        // GL 4.1 reports mixed-size attachments as complete.
        if let (Some(color), Some(depth)) = (desc.color, desc.depth) {
            if color != depth {
                return Err(EngineError::Framebuffer(format!(
                    "attachment sizes differ: colour {}x{}, depth {}x{}",
                    color.0, color.1, depth.0, depth.1
                )));
            }
        }
        if let Some((width, height)) = desc.color {
            let texture = TextureDesc {
                width,
                height,
                format: PixelFormat::Rgba8,
                params: TextureParams::render_target(),
            };
            self.color = Some(gpu.create_texture(&texture, None)?);
        }
        if let Some((width, height)) = desc.depth {
            self.depth = Some(gpu.create_renderbuffer(width, height)?);
        }

        let framebuffer = gpu.create_framebuffer()?;
        self.framebuffer = Some(framebuffer);
        gpu.bind_framebuffer(Some(framebuffer));
        if let Some(color) = self.color {
            gpu.attach_color_texture(framebuffer, color);
        }
        if let Some(depth) = self.depth {
            gpu.attach_depth_renderbuffer(framebuffer, depth);
        }
        let status = gpu.framebuffer_status(framebuffer);
        gpu.bind_framebuffer(None);

        if status != FramebufferStatus::Complete {
            return Err(EngineError::Framebuffer(format!("incomplete framebuffer: {status}")));
        }
        if self.depth.is_none() {
            return Err(EngineError::Framebuffer("missing depth attachment".to_string()));
        }
        Ok(())
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    pub fn color_texture(&self) -> Option<TextureId> {
        self.color
    }

    pub fn depth_renderbuffer(&self) -> Option<RenderbufferId> {
        self.depth
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn destroy(&mut self, gpu: &mut dyn Gpu) {
        if let Some(color) = self.color.take() {
            gpu.delete_texture(color);
        }
        if let Some(depth) = self.depth.take() {
            gpu.delete_renderbuffer(depth);
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            gpu.delete_framebuffer(framebuffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{Command, Fault, HeadlessGpu};

    #[test]
    fn matching_attachments_are_complete() {
        let mut gpu = HeadlessGpu::new();
        let mut target = RenderTarget::create(&mut gpu, RenderTargetDesc::sized(64, 32)).unwrap();
        assert_eq!(target.size(), (64, 32));
        assert!(target.framebuffer().is_some());
        assert_eq!(gpu.bound_framebuffer(), None);
        assert_eq!(gpu.live().textures, 1);
        assert_eq!(gpu.live().renderbuffers, 1);
        target.destroy(&mut gpu);
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn incomplete_targets_free_everything() {
        let cases = [
            RenderTargetDesc { color: Some((64, 64)), depth: Some((32, 64)) },
            RenderTargetDesc { color: None, depth: Some((64, 64)) },
            RenderTargetDesc { color: Some((64, 64)), depth: None },
            RenderTargetDesc { color: None, depth: None },
        ];
        for desc in cases {
            let mut gpu = HeadlessGpu::new();
            let err = RenderTarget::create(&mut gpu, desc).unwrap_err();
            assert!(matches!(err, EngineError::Framebuffer(_)), "{desc:?}: {err}");
            assert_eq!(gpu.live().total(), 0, "{desc:?}");
            assert_eq!(gpu.bound_framebuffer(), None);
            assert!(gpu.violations().is_empty());
        }
    }

    #[test]
    fn mismatched_sizes_fail_before_the_device_is_asked() {
        let mut gpu = HeadlessGpu::new();
        let desc = RenderTargetDesc {
            color: Some((800, 600)),
            depth: Some((640, 480)),
        };
        let err = RenderTarget::create(&mut gpu, desc).unwrap_err();
        match err {
            EngineError::Framebuffer(message) => assert!(message.contains("800x600"), "{message}"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(
            !gpu.commands()
                .iter()
                .any(|c| matches!(c, Command::BindFramebuffer(Some(_)))),
            "no framebuffer should have been bound"
        );
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn device_reported_incompleteness_is_an_error() {
        let mut gpu = HeadlessGpu::new();
        gpu.inject(Fault::IncompleteFramebuffer);
        let err = RenderTarget::create(&mut gpu, RenderTargetDesc::sized(8, 8)).unwrap_err();
        assert!(matches!(err, EngineError::Framebuffer(_)));
        assert_eq!(gpu.live().total(), 0);
    }

    #[test]
    fn allocation_failure_midway_frees_earlier_attachments() {
        let mut gpu = HeadlessGpu::new();
        gpu.inject(Fault::RenderbufferAllocation);
        let err = RenderTarget::create(&mut gpu, RenderTargetDesc::sized(8, 8)).unwrap_err();
        assert!(matches!(err, EngineError::Device(_)));
        assert_eq!(gpu.live().total(), 0);
    }
}
