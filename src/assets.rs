//! Asset access.
//!
//! The engine never touches storage directly. Everything it loads goes
//! through an [`AssetSource`], addressed by forward-slash paths relative to
//! the source's root. [`FsAssets`] reads from a directory, [`MemoryAssets`]
//! serves bytes registered in memory (tests, embedded archives).

use std::{collections::HashMap, path::PathBuf};

use crate::{
    error::{EngineError, Result},
    gpu::PixelFormat,
};

pub trait AssetSource {
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>>;

    fn load_string(&self, path: &str) -> Result<String> {
        let bytes = self.load_bytes(path)?;
        String::from_utf8(bytes)
            .map_err(|e| EngineError::decode(format!("[{path}] as UTF-8 text: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl AssetSource for FsAssets {
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(normalize_path(path));
        std::fs::read(&full).map_err(|source| EngineError::ResourceLoad {
            path: path.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path), bytes.into());
    }

    pub fn with(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }
}

impl AssetSource for MemoryAssets {
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| EngineError::not_found(path))
    }
}

/// Lexically cleans an asset path: backslashes become `/`, `.` segments and
/// repeated separators disappear, `..` folds into its parent where it can.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Directory part of `path`, or `""` for a bare file name.
pub fn parent_dir(path: &str) -> String {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => path[..index].to_string(),
        None => String::new(),
    }
}

/// Resolves `relative` against the directory `dir`.
pub fn join(dir: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    if dir.is_empty() || relative.starts_with('/') {
        normalize_path(&relative)
    } else {
        normalize_path(&format!("{dir}/{relative}"))
    }
}

/// Pixels ready for upload, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Decodes any format `image` was built with. Three-channel images stay RGB,
/// everything else (grey, grey+alpha, 16-bit, float) is expanded to RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes).map_err(|e| EngineError::decode(format!("image: {e}")))?;
    let (width, height) = (image.width(), image.height());
    let (pixels, format) = if image.color().channel_count() == 3 {
        (image.into_rgb8().into_raw(), PixelFormat::Rgb8)
    } else {
        (image.into_rgba8().into_raw(), PixelFormat::Rgba8)
    };
    Ok(DecodedImage {
        pixels,
        width,
        height,
        format,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    fn encode_png(image: image::DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn paths_are_cleaned() {
        assert_eq!(normalize_path("models/./crate/../crate/crate.obj"), "models/crate/crate.obj");
        assert_eq!(normalize_path("a\\b//c"), "a/b/c");
        assert_eq!(normalize_path("../x"), "../x");
        assert_eq!(normalize_path("./"), ".");
    }

    #[test]
    fn relative_paths_resolve_against_a_directory() {
        assert_eq!(parent_dir("models/crate/crate.obj"), "models/crate");
        assert_eq!(parent_dir("crate.obj"), "");
        assert_eq!(join("models/crate", "textures/wood.png"), "models/crate/textures/wood.png");
        assert_eq!(join("models/crate", "../shared/wood.png"), "models/shared/wood.png");
        assert_eq!(join("", "wood.png"), "wood.png");
    }

    #[test]
    fn memory_assets_report_missing_files() {
        let assets = MemoryAssets::new().with("a/b.txt", "hello");
        assert_eq!(assets.load_string("a/./b.txt").unwrap(), "hello");
        let err = assets.load_bytes("a/c.txt").unwrap_err();
        assert!(matches!(err, EngineError::ResourceLoad { path, .. } if path == "a/c.txt"));
    }

    #[test]
    fn fs_assets_read_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shaders")).unwrap();
        std::fs::write(dir.path().join("shaders/a.vs.glsl"), "#version 330\n").unwrap();

        let assets = FsAssets::new(dir.path());
        assert_eq!(assets.load_string("shaders/a.vs.glsl").unwrap(), "#version 330\n");
        assert!(matches!(
            assets.load_bytes("shaders/missing.fs.glsl"),
            Err(EngineError::ResourceLoad { .. })
        ));
    }

    #[test]
    fn rgb_images_stay_rgb() {
        let rgb = RgbImage::from_pixel(2, 3, Rgb([1, 2, 3]));
        let decoded = decode_image(&encode_png(rgb.into())).unwrap();
        assert_eq!(decoded.format, PixelFormat::Rgb8);
        assert_eq!((decoded.width, decoded.height), (2, 3));
        assert_eq!(decoded.pixels.len(), 2 * 3 * 3);
    }

    #[test]
    fn other_images_become_rgba() {
        let rgba = RgbaImage::from_pixel(4, 1, Rgba([9, 8, 7, 6]));
        let decoded = decode_image(&encode_png(rgba.into())).unwrap();
        assert_eq!(decoded.format, PixelFormat::Rgba8);
        assert_eq!(&decoded.pixels[..4], &[9, 8, 7, 6]);

        let grey = image::GrayImage::from_pixel(1, 1, image::Luma([200]));
        let decoded = decode_image(&encode_png(grey.into())).unwrap();
        assert_eq!(decoded.format, PixelFormat::Rgba8);
        assert_eq!(decoded.pixels, vec![200, 200, 200, 255]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_image(b"not an image"), Err(EngineError::Decode(_))));
    }
}
