//! Frame value types flowing through the mixer.
//!
//! A [`BasicFrame`] is a tagged variant (empty, end-of-stream, a single
//! image+audio bundle, or an interlaced pair) carrying the transform slots
//! the mixer writes just before the frame is sunk into the image and audio
//! mixers. Frames are borrowed for one tick; pixel data is `Arc`-shared so
//! the per-pass child copies are cheap.

use std::sync::Arc;

use crate::format::{PixelFormat, PixelFormatDesc};
use crate::transform::{AudioTransform, ImageTransform};

/// An immutable host-memory image: interleaved 4-channel pixels.
#[derive(Clone, Debug)]
pub struct HostImage {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub data: Arc<Vec<u8>>,
}

impl HostImage {
    /// True when `data` holds exactly `width * height` 4-channel pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width * self.height * 4
    }
}

/// Image and audio payload of a single-field frame.
#[derive(Clone, Debug, Default)]
pub struct FrameData {
    pub image: Option<HostImage>,
    /// Interleaved samples in the output channel layout.
    pub audio: Arc<Vec<i16>>,
}

/// The content variants a frame can carry.
#[derive(Clone, Debug)]
pub enum FrameContent {
    /// No content this tick; filtered out by the mixer.
    Empty,
    /// The producer is exhausted; filtered out by the mixer.
    Eof,
    /// One image (a full frame or a single field) plus audio.
    Single(FrameData),
    /// Two fields composed into one interlaced frame, each child keeping
    /// its own transforms.
    Interlaced {
        upper: Box<BasicFrame>,
        lower: Box<BasicFrame>,
    },
}

/// A frame from one layer, on its way through a mix pass.
#[derive(Clone, Debug)]
pub struct BasicFrame {
    pub content: FrameContent,
    pub image_transform: ImageTransform,
    pub audio_transform: AudioTransform,
    pub layer_index: usize,
}

impl BasicFrame {
    pub fn empty() -> Self {
        Self::from_content(FrameContent::Empty, 0)
    }

    pub fn eof() -> Self {
        Self::from_content(FrameContent::Eof, 0)
    }

    /// A single-field frame for `layer_index`.
    pub fn single(layer_index: usize, data: FrameData) -> Self {
        Self::from_content(FrameContent::Single(data), layer_index)
    }

    fn from_content(content: FrameContent, layer_index: usize) -> Self {
        Self {
            content,
            image_transform: ImageTransform::default(),
            audio_transform: AudioTransform::default(),
            layer_index,
        }
    }

    /// Composes two field frames into one interlaced frame. `first` is
    /// the field displayed first under `upper_field_first`; the wrapper
    /// keeps `first`'s layer index and identity transforms.
    pub fn interlace(first: BasicFrame, second: BasicFrame, upper_field_first: bool) -> Self {
        let layer_index = first.layer_index;
        let (upper, lower) = if upper_field_first {
            (first, second)
        } else {
            (second, first)
        };
        Self::from_content(
            FrameContent::Interlaced {
                upper: Box::new(upper),
                lower: Box::new(lower),
            },
            layer_index,
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, FrameContent::Empty)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.content, FrameContent::Eof)
    }
}

/// A writeable frame under construction by a producer.
///
/// Plane buffers are allocated through the image mixer
/// ([`create_buffers`](crate::image_mixer::ImageMixer::create_buffers));
/// once filled, [`into_frame`](Self::into_frame) freezes the frame for
/// sending.
#[derive(Debug)]
pub struct WriteFrame {
    desc: PixelFormatDesc,
    planes: Vec<Vec<u8>>,
    audio: Vec<i16>,
    layer_index: usize,
}

impl WriteFrame {
    pub fn new(desc: PixelFormatDesc, planes: Vec<Vec<u8>>, layer_index: usize) -> Self {
        debug_assert_eq!(desc.planes.len(), planes.len());
        Self {
            desc,
            planes,
            audio: Vec::new(),
            layer_index,
        }
    }

    pub fn desc(&self) -> &PixelFormatDesc {
        &self.desc
    }

    /// Mutable access to plane `index`'s bytes.
    pub fn plane_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.planes[index]
    }

    /// Mutable access to the frame's interleaved audio samples.
    pub fn audio_mut(&mut self) -> &mut Vec<i16> {
        &mut self.audio
    }

    /// Freezes the frame into an immutable [`BasicFrame`]. Plane 0 becomes
    /// the host image.
    pub fn into_frame(mut self) -> BasicFrame {
        let image = if self.planes.is_empty() {
            None
        } else {
            let plane = self.desc.planes[0];
            Some(HostImage {
                format: self.desc.format,
                width: plane.width,
                height: plane.height,
                data: Arc::new(std::mem::take(&mut self.planes[0])),
            })
        };
        BasicFrame::single(
            self.layer_index,
            FrameData {
                image,
                audio: Arc::new(self.audio),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(layer: usize) -> BasicFrame {
        BasicFrame::single(layer, FrameData::default())
    }

    #[test]
    fn interlace_orders_fields_by_mode() {
        let mut first = field(3);
        first.image_transform.opacity = 0.25;
        let second = field(3);

        let frame = BasicFrame::interlace(first.clone(), second.clone(), true);
        assert_eq!(frame.layer_index, 3);
        match &frame.content {
            FrameContent::Interlaced { upper, .. } => {
                assert_eq!(upper.image_transform.opacity, 0.25);
            }
            other => panic!("expected interlaced content, got {other:?}"),
        }

        let frame = BasicFrame::interlace(first, second, false);
        match &frame.content {
            FrameContent::Interlaced { lower, .. } => {
                assert_eq!(lower.image_transform.opacity, 0.25);
            }
            other => panic!("expected interlaced content, got {other:?}"),
        }
    }

    #[test]
    fn write_frame_freezes_plane_zero() {
        let desc = PixelFormatDesc::single_plane(PixelFormat::Bgra, 2, 2);
        let planes = vec![vec![0u8; desc.planes[0].byte_len()]];
        let mut frame = WriteFrame::new(desc, planes, 5);
        frame.plane_mut(0)[0] = 0xff;
        frame.audio_mut().extend_from_slice(&[1, 2, 3, 4]);

        let frozen = frame.into_frame();
        assert_eq!(frozen.layer_index, 5);
        match frozen.content {
            FrameContent::Single(data) => {
                let image = data.image.expect("plane 0 becomes the image");
                assert!(image.is_well_formed());
                assert_eq!(image.data[0], 0xff);
                assert_eq!(data.audio.as_slice(), &[1, 2, 3, 4]);
            }
            other => panic!("expected single content, got {other:?}"),
        }
    }
}
