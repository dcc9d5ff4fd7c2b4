//! Audio mixer facade: additive sample mix into one tick of PCM.
//!
//! Each pass accumulates accepted frames sample-wise into a floating-point
//! buffer sized to exactly one tick of the output format, scaling by the
//! frame's audio transform volume and applying stereo routing.
//! [`end_pass`](AudioMixer::end_pass) clamps the accumulator into
//! interleaved 16-bit PCM.

use crate::error::{FramemixError, Result};
use crate::format::VideoFormat;
use crate::frame::{BasicFrame, FrameContent};
use crate::transform::{AudioTransform, ChannelRouting};

/// Mixes per-layer audio into a single interleaved PCM vector per tick.
pub struct AudioMixer {
    format: VideoFormat,
    accumulator: Vec<f64>,
    in_pass: bool,
}

impl AudioMixer {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            format,
            accumulator: Vec::new(),
            in_pass: false,
        }
    }

    /// Opens a pass, resetting the accumulator to one tick of silence.
    pub fn begin_pass(&mut self) {
        self.accumulator = vec![0.0; self.format.samples_per_tick()];
        self.in_pass = true;
    }

    /// Adds a frame's samples into the open pass using its audio
    /// transform. Interlaced children are visited with their transforms
    /// composed onto the parent's.
    pub fn accept(&mut self, frame: &BasicFrame) -> Result<()> {
        if !self.in_pass {
            return Err(FramemixError::MixStageFailed(
                "audio accept outside a pass".to_string(),
            ));
        }
        self.accept_with(frame, AudioTransform::default());
        Ok(())
    }

    fn accept_with(&mut self, frame: &BasicFrame, parent: AudioTransform) {
        let transform = parent * frame.audio_transform;
        match &frame.content {
            FrameContent::Empty | FrameContent::Eof => {}
            FrameContent::Single(data) => self.mix_samples(&data.audio, &transform),
            FrameContent::Interlaced { upper, lower } => {
                self.accept_with(upper, transform);
                self.accept_with(lower, transform);
            }
        }
    }

    fn mix_samples(&mut self, samples: &[i16], transform: &AudioTransform) {
        let volume = transform.volume;
        let len = samples.len().min(self.accumulator.len());

        match (self.format.audio_channels, transform.routing) {
            (2, Some(routing)) => {
                let mut i = 0;
                while i + 1 < len {
                    let left = f64::from(samples[i]);
                    let right = f64::from(samples[i + 1]);
                    let (out_left, out_right) = match routing {
                        ChannelRouting::LeftOnly => (left, left),
                        ChannelRouting::RightOnly => (right, right),
                        ChannelRouting::Swapped => (right, left),
                    };
                    self.accumulator[i] += out_left * volume;
                    self.accumulator[i + 1] += out_right * volume;
                    i += 2;
                }
            }
            _ => {
                for i in 0..len {
                    self.accumulator[i] += f64::from(samples[i]) * volume;
                }
            }
        }
    }

    /// Closes the pass, yielding exactly one tick's worth of interleaved
    /// 16-bit PCM.
    pub fn end_pass(&mut self) -> Result<Vec<i16>> {
        if !self.in_pass {
            return Err(FramemixError::MixStageFailed(
                "audio end_pass without begin_pass".to_string(),
            ));
        }
        self.in_pass = false;
        let accumulator = std::mem::take(&mut self.accumulator);
        Ok(accumulator
            .into_iter()
            .map(|s| s.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16)
            .collect())
    }
}
