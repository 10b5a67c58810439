use crate::error::{AircastError, AircastResult};
use crate::field::FieldMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The recognized broadcast output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    Pal,
    Ntsc,
    X576p2500,
    X720p2500,
    X720p5000,
    X720p5994,
    X720p6000,
    X1080p2397,
    X1080p2400,
    X1080i5000,
    X1080i5994,
    X1080i6000,
    X1080p2500,
    X1080p2997,
    X1080p3000,
    X1080p5000,
}

impl VideoFormat {
    /// Every recognized format, in table order.
    pub fn all() -> [VideoFormat; 16] {
        use VideoFormat::*;
        [
            Pal, Ntsc, X576p2500, X720p2500, X720p5000, X720p5994, X720p6000, X1080p2397,
            X1080p2400, X1080i5000, X1080i5994, X1080i6000, X1080p2500, X1080p2997, X1080p3000,
            X1080p5000,
        ]
    }

    /// The canonical lowercase name of the format.
    pub fn name(self) -> &'static str {
        use VideoFormat::*;
        match self {
            Pal => "pal",
            Ntsc => "ntsc",
            X576p2500 => "576p2500",
            X720p2500 => "720p2500",
            X720p5000 => "720p5000",
            X720p5994 => "720p5994",
            X720p6000 => "720p6000",
            X1080p2397 => "1080p2397",
            X1080p2400 => "1080p2400",
            X1080i5000 => "1080i5000",
            X1080i5994 => "1080i5994",
            X1080i6000 => "1080i6000",
            X1080p2500 => "1080p2500",
            X1080p2997 => "1080p2997",
            X1080p3000 => "1080p3000",
            X1080p5000 => "1080p5000",
        }
    }

    /// Look a format up by its canonical name.
    pub fn from_name(name: &str) -> Option<VideoFormat> {
        VideoFormat::all()
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything fixed about a channel's output: geometry, cadence and byte
/// size. Equality is by format tag only.
#[derive(Debug, Clone)]
pub struct VideoFormatDesc {
    pub format: VideoFormat,
    pub width: usize,
    pub height: usize,
    pub field_mode: FieldMode,
    /// Frame-rate numerator; `fps = time_scale / duration`.
    pub time_scale: u32,
    /// Frame-rate denominator.
    pub duration: u32,
    /// Output frame size in bytes (BGRA, 8 bits per channel).
    pub size: usize,
    /// Repeating frame-to-sample pattern at 48 kHz, per channel.
    pub audio_cadence: Vec<usize>,
}

impl PartialEq for VideoFormatDesc {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
    }
}

impl Eq for VideoFormatDesc {}

impl VideoFormatDesc {
    fn entry(
        format: VideoFormat,
        width: usize,
        height: usize,
        field_mode: FieldMode,
        time_scale: u32,
        duration: u32,
        audio_cadence: Vec<usize>,
    ) -> Self {
        Self {
            format,
            width,
            height,
            field_mode,
            time_scale,
            duration,
            size: width * height * 4,
            audio_cadence,
        }
    }

    /// The table entry for a format tag.
    pub fn get(format: VideoFormat) -> VideoFormatDesc {
        use FieldMode::*;
        use VideoFormat::*;
        match format {
            Pal => Self::entry(format, 720, 576, Upper, 25000, 1000, vec![1920]),
            Ntsc => Self::entry(
                format,
                720,
                486,
                Lower,
                30000,
                1001,
                vec![1602, 1601, 1602, 1601, 1602],
            ),
            X576p2500 => Self::entry(format, 720, 576, Progressive, 25000, 1000, vec![1920]),
            X720p2500 => Self::entry(format, 1280, 720, Progressive, 25000, 1000, vec![1920]),
            X720p5000 => Self::entry(format, 1280, 720, Progressive, 50000, 1000, vec![960]),
            X720p5994 => Self::entry(
                format,
                1280,
                720,
                Progressive,
                60000,
                1001,
                vec![801, 800, 801, 800, 801],
            ),
            X720p6000 => Self::entry(format, 1280, 720, Progressive, 60000, 1000, vec![800]),
            X1080p2397 => Self::entry(format, 1920, 1080, Progressive, 24000, 1001, vec![2002]),
            X1080p2400 => Self::entry(format, 1920, 1080, Progressive, 24000, 1000, vec![2000]),
            X1080i5000 => Self::entry(format, 1920, 1080, Upper, 25000, 1000, vec![1920]),
            X1080i5994 => Self::entry(
                format,
                1920,
                1080,
                Upper,
                30000,
                1001,
                vec![1602, 1601, 1602, 1601, 1602],
            ),
            X1080i6000 => Self::entry(format, 1920, 1080, Upper, 30000, 1000, vec![1600]),
            X1080p2500 => Self::entry(format, 1920, 1080, Progressive, 25000, 1000, vec![1920]),
            X1080p2997 => Self::entry(
                format,
                1920,
                1080,
                Progressive,
                30000,
                1001,
                vec![1602, 1601, 1602, 1601, 1602],
            ),
            X1080p3000 => Self::entry(format, 1920, 1080, Progressive, 30000, 1000, vec![1600]),
            X1080p5000 => Self::entry(format, 1920, 1080, Progressive, 50000, 1000, vec![960]),
        }
    }

    /// Look a descriptor up by format name (as written in configuration).
    pub fn from_name(name: &str) -> AircastResult<VideoFormatDesc> {
        VideoFormat::from_name(name)
            .map(Self::get)
            .ok_or_else(|| AircastError::UnknownFormat(name.to_string()))
    }

    /// Actual frame rate, e.g. 25.0 for both `pal` and `1080i5000`.
    pub fn fps(&self) -> f64 {
        self.time_scale as f64 / self.duration as f64
    }

    /// Time between frames.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.duration as f64 / self.time_scale as f64)
    }
}

impl fmt::Display for VideoFormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_complete() {
        for format in VideoFormat::all() {
            let desc = VideoFormatDesc::get(format);
            assert_eq!(desc.size, desc.width * desc.height * 4);
            assert!(!desc.audio_cadence.is_empty());
            assert!(desc.fps() > 20.0 && desc.fps() < 61.0);
        }
    }

    #[test]
    fn test_format_lookup_by_name() {
        let desc = VideoFormatDesc::from_name("1080i5000").unwrap();
        assert_eq!(desc.format, VideoFormat::X1080i5000);
        assert_eq!(desc.width, 1920);
        assert_eq!(desc.field_mode, FieldMode::Upper);
        assert!(VideoFormatDesc::from_name("1080i2500").is_err());
    }

    #[test]
    fn test_equality_by_tag_only() {
        let mut a = VideoFormatDesc::get(VideoFormat::Pal);
        let b = VideoFormatDesc::get(VideoFormat::Pal);
        a.audio_cadence = vec![1];
        assert_eq!(a, b);
        assert_ne!(a, VideoFormatDesc::get(VideoFormat::Ntsc));
    }

    #[test]
    fn test_interlaced_fps_is_frame_rate() {
        let desc = VideoFormatDesc::get(VideoFormat::X1080i5000);
        assert!((desc.fps() - 25.0).abs() < 0.001);
        assert!((desc.interval().as_secs_f64() - 0.04).abs() < 0.0001);
    }

    #[test]
    fn test_ntsc_cadence_averages_to_frame_rate() {
        let desc = VideoFormatDesc::get(VideoFormat::Ntsc);
        let total: usize = desc.audio_cadence.iter().sum();
        let avg = total as f64 / desc.audio_cadence.len() as f64;
        // 48000 / 29.97 = 1601.6
        assert!((avg - 48000.0 / desc.fps()).abs() < 0.5);
    }
}
