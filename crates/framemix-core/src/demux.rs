//! Media source collaborator consumed by the input pump.
//!
//! The core treats the container library as an external collaborator: it
//! opens a path, yields encoded packets tagged with a stream index, and
//! supports seeking back to the start. [`MediaSource`] is the seam; the
//! `ffmpeg` feature provides the production implementation
//! (`FfmpegSource`), tests use synthetic sources.

use crate::error::Result;
use crate::packet_queue::Packet;

/// Codec kind of a container stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// A stream time base as a rational `num/den` of seconds per unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Repairs the common producer bug of a display-rate denominator with
    /// a numerator of 1 (e.g. `1/90000` on a 90 fps stream) by rewriting
    /// the numerator to `10^(floor(log10(den)) - 1)`.
    pub fn repaired(self) -> Self {
        if self.num == 1 && self.den >= 10 {
            let exponent = (f64::from(self.den)).log10().floor() as i32 - 1;
            Self {
                num: 10f64.powi(exponent) as i32,
                den: self.den,
            }
        } else {
            self
        }
    }

    /// Frames per second implied by this time base.
    pub fn fps(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// An opened decoder context for one container stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamContext {
    pub index: usize,
    pub kind: StreamKind,
    pub time_base: TimeBase,
}

/// Demultiplexes a media container into encoded packets.
///
/// Implementations never panic across this boundary: read failures and
/// end-of-stream both surface as `None`, seek failures as `false`.
pub trait MediaSource: Send {
    /// Opens a decoder for the first stream of `kind`.
    ///
    /// `Ok(None)` when the container has no stream of that kind;
    /// [`CodecOpen`](crate::FramemixError::CodecOpen) when the stream
    /// exists but its decoder cannot be opened (the pump skips that side).
    fn open_stream(&mut self, kind: StreamKind) -> Result<Option<StreamContext>>;

    /// Reads the next encoded packet, or `None` at end-of-stream or on a
    /// read error.
    fn read_packet(&mut self) -> Option<Packet>;

    /// Seeks `stream_index` back to the start of the container, reporting
    /// success.
    fn seek_to_start(&mut self, stream_index: usize) -> bool;
}
