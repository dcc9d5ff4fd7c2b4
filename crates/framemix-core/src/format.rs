//! Output video format and pixel format descriptors.

use std::time::Duration;

/// Field structure of the output signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldMode {
    Progressive,
    /// Interlaced, upper (even-line) field displayed first.
    UpperFieldFirst,
    /// Interlaced, lower (odd-line) field displayed first.
    LowerFieldFirst,
}

impl FieldMode {
    pub fn is_progressive(self) -> bool {
        self == FieldMode::Progressive
    }
}

/// Describes the composited output: dimensions, field mode, tick cadence
/// and audio geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoFormat {
    pub width: usize,
    pub height: usize,
    pub field_mode: FieldMode,
    /// Duration of one output frame.
    pub tick_interval: Duration,
    pub sample_rate: u32,
    pub audio_channels: usize,
}

impl VideoFormat {
    /// A progressive format at `fps` output frames per second with stereo
    /// 48 kHz audio.
    pub fn progressive(width: usize, height: usize, fps: f64) -> Self {
        Self {
            width,
            height,
            field_mode: FieldMode::Progressive,
            tick_interval: Duration::from_secs_f64(1.0 / fps),
            sample_rate: 48_000,
            audio_channels: 2,
        }
    }

    /// An interlaced format at `fps` output frames (2×`fps` fields) per
    /// second.
    pub fn interlaced(width: usize, height: usize, fps: f64, field_mode: FieldMode) -> Self {
        debug_assert!(!field_mode.is_progressive());
        Self {
            field_mode,
            ..Self::progressive(width, height, fps)
        }
    }

    /// Number of interleaved audio samples in exactly one tick.
    pub fn samples_per_tick(&self) -> usize {
        let frames = (f64::from(self.sample_rate) * self.tick_interval.as_secs_f64()).round();
        frames as usize * self.audio_channels
    }

    /// How many tween steps one output tick advances: one per frame for
    /// progressive, one per field for interlaced.
    pub fn tween_steps_per_tick(&self) -> u32 {
        if self.field_mode.is_progressive() {
            1
        } else {
            2
        }
    }
}

impl Default for VideoFormat {
    /// 1080p25, the house default.
    fn default() -> Self {
        Self::progressive(1920, 1080, 25.0)
    }
}

/// Memory layout of a single interleaved 4-channel image plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra,
    Rgba,
}

impl PixelFormat {
    /// Byte indices of (red, green, blue) within a pixel; alpha is always
    /// at index 3.
    pub(crate) fn rgb_indices(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Rgba => (0, 1, 2),
            PixelFormat::Bgra => (2, 1, 0),
        }
    }
}

/// One plane of a writeable frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneDesc {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl PlaneDesc {
    pub fn byte_len(&self) -> usize {
        self.width * self.height * self.channels
    }
}

/// Plane layout for a writeable frame. The compositor consumes plane 0 as
/// an interleaved 4-channel image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelFormatDesc {
    pub format: PixelFormat,
    pub planes: Vec<PlaneDesc>,
}

impl PixelFormatDesc {
    /// Single-plane 4-channel descriptor for the given format.
    pub fn single_plane(format: PixelFormat, width: usize, height: usize) -> Self {
        Self {
            format,
            planes: vec![PlaneDesc {
                width,
                height,
                channels: 4,
            }],
        }
    }
}
