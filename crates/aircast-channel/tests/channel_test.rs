use aircast_channel::{Channel, Consumer, OutputFrame, Producer};
use aircast_core::{
    AircastError, AircastResult, ChannelConfig, ConstFrame, FieldMode, FrameTransform, PixelFormat,
    PixelFormatDesc, VideoFormat, VideoFormatDesc,
};
use aircast_mixer::{ImageMixer, MixDevice};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

fn test_device() -> Option<Arc<MixDevice>> {
    match MixDevice::new() {
        Ok(device) => Some(device),
        Err(err) => {
            eprintln!("skipping GPU test: {}", err);
            None
        }
    }
}

/// Fills its layer with a solid BGRA color every tick and passes a marker
/// tone through the audio lane.
struct SolidProducer {
    bgra: [u8; 4],
    frame: Option<ConstFrame>,
}

impl SolidProducer {
    fn new(bgra: [u8; 4]) -> Self {
        Self { bgra, frame: None }
    }
}

impl Producer for SolidProducer {
    fn sample(&mut self, mixer: &mut ImageMixer, format_desc: &VideoFormatDesc) {
        let frame = match &self.frame {
            Some(frame)
                if frame.pixel_format_desc().planes[0].width == format_desc.width =>
            {
                frame.clone()
            }
            _ => {
                let desc = PixelFormatDesc::packed(
                    PixelFormat::Bgra,
                    format_desc.width,
                    format_desc.height,
                );
                let mut frame = mixer
                    .create_frame(1, desc, format_desc.fps(), FieldMode::Progressive)
                    .expect("frame allocation");
                for pixel in frame.image_data_mut(0).chunks_exact_mut(4) {
                    pixel.copy_from_slice(&self.bgra);
                }
                let frame = frame.freeze();
                self.frame = Some(frame.clone());
                frame
            }
        };
        mixer.push(&FrameTransform::new());
        mixer.visit(&frame);
        mixer.pop();
    }

    fn sample_audio(&mut self, samples_per_channel: usize) -> Option<Vec<i32>> {
        Some(vec![42; samples_per_channel * 2])
    }
}

/// Forwards every delivered frame into an mpsc channel for inspection.
struct CollectConsumer {
    sink: mpsc::Sender<OutputFrame>,
}

impl Consumer for CollectConsumer {
    fn send(&mut self, frame: &OutputFrame) -> AircastResult<()> {
        self.sink
            .send(frame.clone())
            .map_err(|_| AircastError::Channel("collector hung up".into()))
    }
}

#[test]
fn test_channel_delivers_monotonic_ticks() {
    let Some(device) = test_device() else { return };
    let format_desc = VideoFormatDesc::get(VideoFormat::X576p2500);
    let channel = Channel::new(device, format_desc.clone()).expect("channel start");

    let (sink, frames) = mpsc::channel();
    channel.add_producer(Box::new(SolidProducer::new([0x00, 0x00, 0xFF, 0xFF])));
    channel.add_consumer(Box::new(CollectConsumer { sink }));

    let mut received = Vec::new();
    for _ in 0..3 {
        let frame = frames
            .recv_timeout(Duration::from_secs(10))
            .expect("frame within timeout");
        received.push(frame);
    }
    channel.stop();

    for window in received.windows(2) {
        assert!(window[1].tick > window[0].tick, "ticks must be monotonic");
    }
    for frame in &received {
        assert_eq!(frame.image.len(), format_desc.size);
        assert_eq!(frame.format_desc, format_desc);
        // Solid red producer, BGRA packed.
        assert_eq!(&frame.image[0..4], &[0x00, 0x00, 0xFF, 0xFF]);
        // Audio passes through at the format cadence, stereo interleaved.
        assert_eq!(frame.audio.len(), format_desc.audio_cadence[0] * 2);
        assert_eq!(frame.audio[0], 42);
    }
}

#[test]
fn test_format_switch_applies_at_tick_boundary() {
    let Some(device) = test_device() else { return };
    let initial = VideoFormatDesc::get(VideoFormat::X576p2500);
    let target = VideoFormatDesc::get(VideoFormat::X720p2500);
    let channel = Channel::new(device, initial.clone()).expect("channel start");

    let (sink, frames) = mpsc::channel();
    channel.add_producer(Box::new(SolidProducer::new([0xFF, 0xFF, 0xFF, 0xFF])));
    channel.add_consumer(Box::new(CollectConsumer { sink }));

    // Let at least one tick at the initial format through, then switch.
    let first = frames
        .recv_timeout(Duration::from_secs(10))
        .expect("first frame");
    assert_eq!(first.format_desc, initial);
    assert_eq!(first.image.len(), initial.size);

    channel.set_video_format_desc(target.clone());

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut switched = None;
    while std::time::Instant::now() < deadline {
        match frames.recv_timeout(Duration::from_secs(10)) {
            Ok(frame) if frame.format_desc == target => {
                switched = Some(frame);
                break;
            }
            Ok(frame) => {
                // Pre-switch frames keep the old geometry.
                assert_eq!(frame.image.len(), initial.size);
            }
            Err(_) => break,
        }
    }
    channel.stop();

    let switched = switched.expect("a frame at the new format");
    assert_eq!(switched.image.len(), target.size);
}

#[test]
fn test_channel_without_producers_emits_zero_frames() {
    let Some(device) = test_device() else { return };
    let format_desc = VideoFormatDesc::get(VideoFormat::X576p2500);
    let channel = Channel::new(device, format_desc.clone()).expect("channel start");

    let (sink, frames) = mpsc::channel();
    channel.add_consumer(Box::new(CollectConsumer { sink }));

    let frame = frames
        .recv_timeout(Duration::from_secs(10))
        .expect("frame within timeout");
    channel.stop();

    assert_eq!(frame.image.len(), format_desc.size);
    assert!(frame.image.iter().all(|byte| *byte == 0));
    // Silence on the audio lane.
    assert!(frame.audio.iter().all(|sample| *sample == 0));
}

#[test]
fn test_remove_producer_and_consumer_at_runtime() {
    let Some(device) = test_device() else { return };
    let format_desc = VideoFormatDesc::get(VideoFormat::X576p2500);
    let channel = Channel::new(device, format_desc.clone()).expect("channel start");

    let (sink, frames) = mpsc::channel();
    let producer_id = channel.add_producer(Box::new(SolidProducer::new([0x00, 0x00, 0xFF, 0xFF])));
    let consumer_id = channel.add_consumer(Box::new(CollectConsumer { sink }));

    let first = frames
        .recv_timeout(Duration::from_secs(10))
        .expect("first frame");
    assert_eq!(&first.image[0..4], &[0x00, 0x00, 0xFF, 0xFF]);

    // Removing the producer empties the mix; the channel keeps its cadence
    // and reverts to zero frames.
    channel.remove_producer(producer_id);
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut went_dark = false;
    while std::time::Instant::now() < deadline {
        match frames.recv_timeout(Duration::from_secs(10)) {
            Ok(frame) if frame.image.iter().all(|byte| *byte == 0) => {
                went_dark = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    assert!(went_dark, "expected zero frames after producer removal");

    // Removing the consumer stops delivery entirely once the in-flight
    // frames drain.
    channel.remove_consumer(consumer_id);
    while frames.recv_timeout(Duration::from_millis(500)).is_ok() {}
    assert!(frames.recv_timeout(Duration::from_millis(500)).is_err());
    channel.stop();
}

#[test]
fn test_channel_stop_is_clean_mid_stream() {
    let Some(device) = test_device() else { return };
    let format_desc = VideoFormatDesc::get(VideoFormat::X576p2500);
    let channel = Channel::new(device, format_desc).expect("channel start");
    channel.add_producer(Box::new(SolidProducer::new([1, 2, 3, 255])));
    // Stop immediately; shutdown must drain without panicking or hanging.
    channel.stop();
}

#[test]
fn test_channel_from_config_rejects_unknown_format() {
    let Some(device) = test_device() else { return };
    let config = ChannelConfig {
        format: "1080i2500".into(),
        label: None,
    };
    assert!(Channel::from_config(device, &config).is_err());
}
