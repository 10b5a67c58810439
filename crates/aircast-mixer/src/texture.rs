use crate::gpu::PoolKey;
use aircast_core::{AircastError, AircastResult};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// A surface handed back to the pool by a dropped handle.
pub(crate) struct ReclaimedTexture {
    pub key: PoolKey,
    pub texture: wgpu::Texture,
}

struct TextureInner {
    texture: Option<wgpu::Texture>,
    width: u32,
    height: u32,
    channels: u32,
    format: wgpu::TextureFormat,
    reclaim: mpsc::Sender<ReclaimedTexture>,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            // The device worker drains this at its next allocation; if the
            // device is already gone the surface just drops.
            let _ = self.reclaim.send(ReclaimedTexture {
                key: PoolKey {
                    width: self.width,
                    height: self.height,
                    format: self.format,
                },
                texture,
            });
        }
    }
}

/// Reference-counted handle to a pooled GPU surface.
///
/// Clones are cheap handle copies. When the last clone drops, the surface
/// migrates back to the device worker's pool regardless of which thread the
/// drop happens on.
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub(crate) fn new(
        texture: wgpu::Texture,
        key: PoolKey,
        channels: u32,
        reclaim: mpsc::Sender<ReclaimedTexture>,
    ) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                texture: Some(texture),
                width: key.width,
                height: key.height,
                channels,
                format: key.format,
                reclaim,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn channels(&self) -> u32 {
        self.inner.channels
    }

    pub(crate) fn format(&self) -> wgpu::TextureFormat {
        self.inner.format
    }

    pub(crate) fn raw(&self) -> &wgpu::Texture {
        self.inner
            .texture
            .as_ref()
            .expect("texture handle outlives its surface")
    }

    pub(crate) fn view(&self) -> wgpu::TextureView {
        self.raw().create_view(&wgpu::TextureViewDescriptor::default())
    }
}

enum TextureFutureState {
    Pending(mpsc::Receiver<Texture>),
    Ready(Texture),
    Failed,
}

/// Two-stage handle to an asynchronously uploaded plane.
///
/// Starts out `Pending` on the upload task; the first `get` blocks until the
/// device worker has issued the upload, then every clone observes `Ready`.
/// Uploads are queued before the render task that consumes them, so a `get`
/// at draw time never waits on work behind it in the device queue.
#[derive(Clone)]
pub struct TextureFuture {
    state: Arc<Mutex<TextureFutureState>>,
}

impl TextureFuture {
    pub(crate) fn pending(rx: mpsc::Receiver<Texture>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TextureFutureState::Pending(rx))),
        }
    }

    /// Wrap an already uploaded surface.
    pub fn resolved(texture: Texture) -> Self {
        Self {
            state: Arc::new(Mutex::new(TextureFutureState::Ready(texture))),
        }
    }

    /// Resolve the handle, blocking on the upload if it is still in flight.
    pub fn get(&self) -> AircastResult<Texture> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            TextureFutureState::Ready(texture) => return Ok(texture.clone()),
            TextureFutureState::Failed => {
                return Err(AircastError::render("plane upload failed"))
            }
            TextureFutureState::Pending(_) => {}
        }
        let previous = std::mem::replace(&mut *state, TextureFutureState::Failed);
        let TextureFutureState::Pending(rx) = previous else {
            unreachable!("checked above");
        };
        match rx.recv() {
            Ok(texture) => {
                *state = TextureFutureState::Ready(texture.clone());
                Ok(texture)
            }
            Err(_) => Err(AircastError::device("device worker dropped an upload")),
        }
    }
}
