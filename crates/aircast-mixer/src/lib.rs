//! # aircast-mixer
//!
//! The GPU compositing core of the aircast playout engine. A per-channel
//! [`ImageMixer`] collects transformed frames into layers during a tick and
//! hands the accumulated plan to the [`ImageRenderer`], which decomposes it
//! into kernel draws on the device worker and reads the packed BGRA result
//! back asynchronously.

pub mod device;
pub mod gpu;
mod kernel;
pub mod mixer;
pub mod renderer;
pub mod texture;

pub use device::{DeviceStats, MixDevice, TaskFuture};
pub use gpu::GpuContext;
pub use mixer::ImageMixer;
pub use renderer::{prepare_items, FrameFuture, ImageRenderer, Item, Layer, RenderFailure};
pub use texture::{Texture, TextureFuture};
