//! # aircast-channel
//!
//! The per-channel cooperative executor: a single-threaded loop that samples
//! producers into the image mixer, awaits the composed frame and delivers it
//! to consumers on the format's monotonic cadence.

pub mod consumer;
pub mod executor;
pub mod producer;

pub use consumer::{Consumer, OutputFrame};
pub use executor::{Channel, ConsumerId, ProducerId};
pub use producer::Producer;
