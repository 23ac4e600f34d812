//! Shared GPU textures.
//!
//! [`TextureCache`] owns every texture handle the engine creates and keeps a
//! use-count per handle. Callers hold [`Texture`] leases: cloning a lease
//! counts as another use, [`Texture::release`] gives one use back and frees
//! the GPU handle when the last one is returned.
//!
//! Textures loaded from a path are deduplicated by that path, so at most one
//! handle exists per source file. Textures created from raw pixels are never
//! shared.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    assets::{self, AssetSource},
    error::{EngineError, Result},
    gpu::{Gpu, PixelFormat, TextureDesc, TextureId, TextureParams},
};

#[derive(Debug)]
struct Entry {
    key: Option<String>,
    size: (u32, u32),
    count: usize,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: HashMap<TextureId, Entry>,
    by_key: HashMap<String, TextureId>,
    /// Handles whose last lease was dropped without a device at hand.
    doomed: Vec<TextureId>,
}

impl Ledger {
    fn retain(&mut self, handle: TextureId) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.count += 1;
        }
    }

    /// Gives one use back. Returns true when the handle has no users left
    /// and must be deleted by the caller.
    fn give_back(&mut self, handle: TextureId) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            log::warn!("release of {handle}, which the texture cache does not own");
            return false;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(&handle) {
            if let Some(key) = entry.key {
                self.by_key.remove(&key);
            }
        }
        true
    }
}

/// A counted lease on a cached texture.
///
/// A lease should be handed back with [`release`](Self::release). Dropping it
/// instead still returns the use, but the handle is only freed at the next
/// [`TextureCache::collect_garbage`].
#[derive(Debug)]
pub struct Texture {
    handle: Option<TextureId>,
    size: (u32, u32),
    key: Option<String>,
    ledger: Rc<RefCell<Ledger>>,
}

impl Texture {
    pub fn handle(&self) -> Option<TextureId> {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Path the texture was loaded from, `None` for pixel uploads.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn bind(&self, gpu: &mut dyn Gpu, unit: u32) -> Result<()> {
        let handle = self
            .handle
            .ok_or_else(|| EngineError::state("bind of a released texture"))?;
        gpu.bind_texture(unit, Some(handle));
        Ok(())
    }

    /// Hands the lease back, deleting the GPU texture if this was its last user.
    pub fn release(mut self, gpu: &mut dyn Gpu) {
        if let Some(handle) = self.handle.take() {
            if self.ledger.borrow_mut().give_back(handle) {
                log::debug!("delete texture {handle}");
                gpu.delete_texture(handle);
            }
        }
    }
}

impl Clone for Texture {
    fn clone(&self) -> Self {
        if let Some(handle) = self.handle {
            self.ledger.borrow_mut().retain(handle);
        }
        Self {
            handle: self.handle,
            size: self.size,
            key: self.key.clone(),
            ledger: Rc::clone(&self.ledger),
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let mut ledger = self.ledger.borrow_mut();
            if ledger.give_back(handle) {
                log::warn!("texture {handle} dropped without release, queued for collection");
                ledger.doomed.push(handle);
            }
        }
    }
}

#[derive(Debug)]
pub struct TextureCache {
    ledger: Rc<RefCell<Ledger>>,
    params: TextureParams,
}

impl TextureCache {
    /// Creates an empty cache.
    ///
    /// # Arguments
    ///
    /// * `params` is the sampling state every texture uploaded by the cache is created with
    pub fn new(params: TextureParams) -> Self {
        Self {
            ledger: Rc::new(RefCell::new(Ledger::default())),
            params,
        }
    }

    pub fn params(&self) -> TextureParams {
        self.params
    }

    fn lease(&self, handle: TextureId, size: (u32, u32), key: Option<String>) -> Texture {
        Texture {
            handle: Some(handle),
            size,
            key,
            ledger: Rc::clone(&self.ledger),
        }
    }

    /// Returns a lease on the texture loaded from `path`, decoding and
    /// uploading it only if no live texture was loaded from the same path.
    ///
    /// # Arguments
    ///
    /// * `gpu` receives the upload on a cache miss
    /// * `source` resolves `path` to image file bytes
    /// * `path` is the asset path, compared after normalisation
    pub fn acquire(
        &mut self,
        gpu: &mut dyn Gpu,
        source: &dyn AssetSource,
        path: &str,
    ) -> Result<Texture> {
        let key = assets::normalize_path(path);
        let hit = {
            let mut ledger = self.ledger.borrow_mut();
            let found = ledger.by_key.get(&key).copied();
            found.and_then(|handle| {
                let entry = ledger.entries.get_mut(&handle)?;
                entry.count += 1;
                Some((handle, entry.size))
            })
        };
        if let Some((handle, size)) = hit {
            log::info!("load texture @[{key}]");
            return Ok(self.lease(handle, size, Some(key)));
        }

        log::info!("load texture [{key}]");
        let bytes = source.load_bytes(&key)?;
        let image = assets::decode_image(&bytes)?;
        let desc = TextureDesc {
            width: image.width,
            height: image.height,
            format: image.format,
            params: self.params,
        };
        let handle = gpu.create_texture(&desc, Some(&image.pixels))?;
        let size = (image.width, image.height);

        let mut ledger = self.ledger.borrow_mut();
        ledger.entries.insert(
            handle,
            Entry {
                key: Some(key.clone()),
                size,
                count: 1,
            },
        );
        ledger.by_key.insert(key.clone(), handle);
        drop(ledger);
        Ok(self.lease(handle, size, Some(key)))
    }

    /// Uploads raw pixels as a new, unshared texture.
    ///
    /// `pixels` must hold `width * height` tightly packed pixels of `format`,
    /// top row first.
    pub fn from_pixels(
        &mut self,
        gpu: &mut dyn Gpu,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Texture> {
        let desc = TextureDesc {
            width,
            height,
            format,
            params: self.params,
        };
        if pixels.len() != desc.byte_len() {
            return Err(EngineError::decode(format!(
                "pixel buffer of {} bytes for a {width}x{height} {format:?} texture",
                pixels.len()
            )));
        }
        let handle = gpu.create_texture(&desc, Some(pixels))?;
        self.ledger.borrow_mut().entries.insert(
            handle,
            Entry {
                key: None,
                size: (width, height),
                count: 1,
            },
        );
        Ok(self.lease(handle, (width, height), None))
    }

    /// Hands `texture` back. Same as [`Texture::release`].
    pub fn release(&mut self, gpu: &mut dyn Gpu, texture: Texture) {
        texture.release(gpu);
    }

    /// Live leases on the texture loaded from `path`, 0 if not resident.
    pub fn use_count(&self, path: &str) -> usize {
        let ledger = self.ledger.borrow();
        ledger
            .by_key
            .get(&assets::normalize_path(path))
            .and_then(|handle| ledger.entries.get(handle))
            .map_or(0, |entry| entry.count)
    }

    pub fn is_resident(&self, path: &str) -> bool {
        self.ledger
            .borrow()
            .by_key
            .contains_key(&assets::normalize_path(path))
    }

    /// Number of live textures, shared or not.
    pub fn resident(&self) -> usize {
        self.ledger.borrow().entries.len()
    }

    /// Frees handles whose last lease was dropped instead of released.
    pub fn collect_garbage(&mut self, gpu: &mut dyn Gpu) -> usize {
        let doomed = std::mem::take(&mut self.ledger.borrow_mut().doomed);
        for handle in &doomed {
            log::debug!("delete texture {handle}");
            gpu.delete_texture(*handle);
        }
        doomed.len()
    }

    /// Frees every texture still owned by the cache. Leases that are still
    /// alive afterwards are detached and become no-ops.
    pub fn shutdown(&mut self, gpu: &mut dyn Gpu) {
        self.collect_garbage(gpu);
        let mut ledger = self.ledger.borrow_mut();
        for (handle, entry) in ledger.entries.drain() {
            log::warn!(
                "texture {handle} [{}] still has {} user(s) at shutdown",
                entry.key.as_deref().unwrap_or("<pixels>"),
                entry.count
            );
            gpu.delete_texture(handle);
        }
        ledger.by_key.clear();
    }
}
