use crate::consumer::{Consumer, OutputFrame};
use crate::producer::Producer;
use aircast_core::{AircastError, AircastResult, ChannelConfig, VideoFormatDesc};
use aircast_mixer::{FrameFuture, ImageMixer, MixDevice, RenderFailure};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Handle identifying a producer registered with a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerId(u64);

/// Handle identifying a consumer registered with a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

enum Control {
    AddProducer(ProducerId, Box<dyn Producer>),
    RemoveProducer(ProducerId),
    ClearProducers,
    AddConsumer(ConsumerId, Box<dyn Consumer>),
    RemoveConsumer(ConsumerId),
    SetFormat(VideoFormatDesc),
    Stop,
}

/// Handle to one playout channel.
///
/// The channel owns a single worker thread that runs one tick per frame
/// interval: sample producers into the mixer, await the composed frame,
/// deliver it to consumers, sleep to the next boundary. All control calls
/// are dispatched onto that thread and take effect at the next tick
/// boundary, never mid-composition.
pub struct Channel {
    control: mpsc::Sender<Control>,
    worker: Option<thread::JoinHandle<()>>,
    next_id: AtomicU64,
}

impl Channel {
    pub fn new(device: Arc<MixDevice>, format_desc: VideoFormatDesc) -> AircastResult<Channel> {
        let (control, control_rx) = mpsc::channel();
        let name = format!("aircast-channel-{}", format_desc.format);
        let worker = thread::Builder::new()
            .name(name)
            .spawn(move || ChannelState::new(device, format_desc).run(control_rx))
            .map_err(|err| AircastError::Channel(format!("failed to spawn channel: {err}")))?;
        Ok(Channel {
            control,
            worker: Some(worker),
            next_id: AtomicU64::new(0),
        })
    }

    /// Build a channel from its configuration section.
    pub fn from_config(device: Arc<MixDevice>, config: &ChannelConfig) -> AircastResult<Channel> {
        let format_desc = VideoFormatDesc::from_name(&config.format)?;
        if let Some(label) = &config.label {
            tracing::info!(label = %label, format = %format_desc, "starting configured channel");
        }
        Channel::new(device, format_desc)
    }

    /// Register a producer; the returned handle removes it again.
    pub fn add_producer(&self, producer: Box<dyn Producer>) -> ProducerId {
        let id = ProducerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.control.send(Control::AddProducer(id, producer));
        id
    }

    /// Drop one producer; takes effect at the next tick boundary.
    pub fn remove_producer(&self, id: ProducerId) {
        let _ = self.control.send(Control::RemoveProducer(id));
    }

    pub fn clear_producers(&self) {
        let _ = self.control.send(Control::ClearProducers);
    }

    /// Register a consumer; the returned handle removes it again.
    pub fn add_consumer(&self, consumer: Box<dyn Consumer>) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.control.send(Control::AddConsumer(id, consumer));
        id
    }

    /// Drop one consumer; takes effect at the next tick boundary.
    pub fn remove_consumer(&self, id: ConsumerId) {
        let _ = self.control.send(Control::RemoveConsumer(id));
    }

    /// Switch the output format; takes effect at the start of the next
    /// tick, never mid-composition.
    pub fn set_video_format_desc(&self, format_desc: VideoFormatDesc) {
        let _ = self.control.send(Control::SetFormat(format_desc));
    }

    /// Stop the tick loop, drain in-flight composition and join the worker.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.control.send(Control::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ChannelState {
    mixer: ImageMixer,
    format_desc: VideoFormatDesc,
    producers: Vec<(ProducerId, Box<dyn Producer>)>,
    consumers: Vec<(ConsumerId, Box<dyn Consumer>)>,
    tick: u64,
    underflows: u64,
    /// Set on a device failure; the channel keeps its cadence but its
    /// output can no longer be trusted.
    degraded: bool,
    last_image: Option<Arc<Vec<u8>>>,
    /// Readbacks that overran their tick; reaped when they finally arrive.
    stale: Vec<FrameFuture>,
}

impl ChannelState {
    fn new(device: Arc<MixDevice>, format_desc: VideoFormatDesc) -> Self {
        tracing::info!(format = %format_desc, "channel starting");
        Self {
            mixer: ImageMixer::new(device),
            format_desc,
            producers: Vec::new(),
            consumers: Vec::new(),
            tick: 0,
            underflows: 0,
            degraded: false,
            last_image: None,
            stale: Vec::new(),
        }
    }

    fn run(mut self, control: mpsc::Receiver<Control>) {
        let mut next_tick = Instant::now();
        loop {
            loop {
                match control.try_recv() {
                    Ok(Control::Stop) | Err(TryRecvError::Disconnected) => {
                        self.shutdown();
                        return;
                    }
                    Ok(message) => self.handle(message),
                    Err(TryRecvError::Empty) => break,
                }
            }

            self.stale.retain_mut(|future| !future.try_reap());
            self.tick();

            next_tick += self.format_desc.interval();
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // Fell behind; restart pacing from here rather than
                // bursting to catch up.
                next_tick = now;
            }
        }
    }

    fn handle(&mut self, message: Control) {
        match message {
            Control::AddProducer(id, producer) => self.producers.push((id, producer)),
            Control::RemoveProducer(id) => self.producers.retain(|(existing, _)| *existing != id),
            Control::ClearProducers => self.producers.clear(),
            Control::AddConsumer(id, consumer) => self.consumers.push((id, consumer)),
            Control::RemoveConsumer(id) => self.consumers.retain(|(existing, _)| *existing != id),
            Control::SetFormat(format_desc) => {
                if format_desc != self.format_desc {
                    tracing::info!(
                        from = %self.format_desc,
                        to = %format_desc,
                        "switching channel format"
                    );
                    // The cached frame has the old geometry.
                    self.last_image = None;
                }
                self.format_desc = format_desc;
            }
            Control::Stop => {}
        }
    }

    fn tick(&mut self) {
        let format_desc = self.format_desc.clone();

        for (_, producer) in &mut self.producers {
            self.mixer.begin_layer(producer.blend_mode());
            producer.sample(&mut self.mixer, &format_desc);
            self.mixer.end_layer();
        }

        let future = self.mixer.render(&format_desc);
        let image = match future.wait_timeout(format_desc.interval() * 2) {
            Ok(Ok(bytes)) => {
                let image = Arc::new(bytes);
                self.last_image = Some(image.clone());
                Some(image)
            }
            Ok(Err(RenderFailure::Draw)) => {
                tracing::warn!(
                    format = %format_desc,
                    tick = self.tick,
                    "draw failed: repeating last good frame"
                );
                // The cached frame stays; a failed tick never replaces it.
                Some(
                    self.last_image
                        .clone()
                        .unwrap_or_else(|| Arc::new(vec![0u8; format_desc.size])),
                )
            }
            Ok(Err(RenderFailure::Device)) => {
                if !self.degraded {
                    self.degraded = true;
                    tracing::error!(
                        format = %format_desc,
                        tick = self.tick,
                        "device failure: channel degraded"
                    );
                }
                Some(Arc::new(vec![0u8; format_desc.size]))
            }
            Err(pending) => {
                self.underflows += 1;
                tracing::warn!(
                    format = %format_desc,
                    tick = self.tick,
                    "underflow: composition exceeded two frame intervals"
                );
                self.stale.push(pending);
                // Repeat the last good frame rather than stalling the
                // cadence.
                self.last_image.clone()
            }
        };

        if let Some(image) = image {
            let samples = format_desc.audio_cadence
                [(self.tick as usize) % format_desc.audio_cadence.len()];
            let audio = self
                .producers
                .iter_mut()
                .find_map(|(_, producer)| producer.sample_audio(samples))
                .unwrap_or_else(|| vec![0; samples * 2]);
            let frame = OutputFrame {
                tick: self.tick,
                format_desc: format_desc.clone(),
                image,
                audio: Arc::new(audio),
            };
            self.consumers.retain_mut(|(id, consumer)| match consumer.send(&frame) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(consumer = id.0, "dropping consumer: {}", err);
                    false
                }
            });
        }

        self.tick += 1;
    }

    fn shutdown(&mut self) {
        // Drain in-flight readbacks; none is forcibly cancelled.
        for stale in self.stale.drain(..) {
            let _ = stale.wait_timeout(self.format_desc.interval() * 2);
        }
        tracing::info!(
            format = %self.format_desc,
            ticks = self.tick,
            underflows = self.underflows,
            degraded = self.degraded,
            "channel stopped"
        );
    }
}
