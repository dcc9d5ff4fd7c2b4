//! FFmpeg-backed media source (feature `ffmpeg`).
//!
//! Wraps an `ffmpeg-next` format context and implements [`MediaSource`]
//! for the input pump: open, probe, first-stream decoder contexts, packet
//! reads and seek-to-start. FFmpeg must be installed on the system; see
//! the ffmpeg-next build documentation for per-platform packages.

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;

use crate::demux::{MediaSource, StreamContext, StreamKind, TimeBase};
use crate::error::{FramemixError, Result};
use crate::packet_queue::Packet;

/// Decoder context for one opened stream.
enum DecoderHandle {
    Video(ffmpeg::decoder::Video),
    Audio(ffmpeg::decoder::Audio),
}

struct OpenedStream {
    context: StreamContext,
    /// Kept alive for the consumers decoding this stream's packets.
    #[allow(dead_code)]
    decoder: DecoderHandle,
}

/// A demultiplexer over a local file or URL.
pub struct FfmpegSource {
    // Decoder contexts are declared before the format context so they are
    // released first; the format context must be destroyed last.
    video: Option<OpenedStream>,
    audio: Option<OpenedStream>,
    input: ffmpeg::format::context::Input,
    path: String,
}

// SAFETY: FfmpegSource is only driven from the pump's single worker
// thread after construction; exclusive ownership of the underlying
// contexts prevents concurrent access.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    /// Opens `path` and probes its stream info.
    pub fn open(path: &str) -> Result<Self> {
        ffmpeg::init()
            .map_err(|e| FramemixError::FileRead(format!("ffmpeg init failed: {e}")))?;

        let input = ffmpeg::format::input(&path)
            .map_err(|e| FramemixError::FileRead(format!("failed to open {path}: {e}")))?;

        tracing::info!(path, streams = input.streams().count(), "container opened");

        Ok(Self {
            video: None,
            audio: None,
            input,
            path: path.to_string(),
        })
    }

    /// The opened video stream context, if any.
    pub fn video_stream(&self) -> Option<&StreamContext> {
        self.video.as_ref().map(|s| &s.context)
    }

    /// The opened audio stream context, if any.
    pub fn audio_stream(&self) -> Option<&StreamContext> {
        self.audio.as_ref().map(|s| &s.context)
    }

    /// Seeks to `seconds` on `stream_index`, rescaling from the global
    /// time base into the stream's own. Reports success; never panics.
    fn seek_seconds(&mut self, seconds: i64, stream_index: usize) -> bool {
        let stream_tb = match self.input.stream(stream_index) {
            Some(stream) => stream.time_base(),
            None => return false,
        };

        let target = seconds.saturating_mul(i64::from(ffi::AV_TIME_BASE));
        let rescaled = unsafe {
            ffi::av_rescale_q(
                target,
                ffi::AVRational {
                    num: 1,
                    den: ffi::AV_TIME_BASE as i32,
                },
                ffi::AVRational {
                    num: stream_tb.0,
                    den: stream_tb.1,
                },
            )
        };

        let ret = unsafe {
            ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                stream_index as i32,
                rescaled,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if ret < 0 {
            tracing::warn!(path = %self.path, stream_index, ret, "failed to seek");
            false
        } else {
            true
        }
    }
}

impl MediaSource for FfmpegSource {
    fn open_stream(&mut self, kind: StreamKind) -> Result<Option<StreamContext>> {
        let medium = match kind {
            StreamKind::Video => ffmpeg::media::Type::Video,
            StreamKind::Audio => ffmpeg::media::Type::Audio,
        };

        let (index, time_base, parameters) = {
            let Some(stream) = self
                .input
                .streams()
                .find(|s| s.parameters().medium() == medium)
            else {
                return Ok(None);
            };
            (
                stream.index(),
                TimeBase::new(stream.time_base().0, stream.time_base().1),
                stream.parameters(),
            )
        };

        let codec_context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| {
                FramemixError::CodecOpen(format!("{}: stream {index}: {e}", self.path))
            })?;

        let context = StreamContext {
            index,
            kind,
            time_base,
        };
        let decoder = match kind {
            StreamKind::Video => DecoderHandle::Video(
                codec_context.decoder().video().map_err(|e| {
                    FramemixError::CodecOpen(format!("{}: video decoder: {e}", self.path))
                })?,
            ),
            StreamKind::Audio => DecoderHandle::Audio(
                codec_context.decoder().audio().map_err(|e| {
                    FramemixError::CodecOpen(format!("{}: audio decoder: {e}", self.path))
                })?,
            ),
        };

        let opened = OpenedStream {
            context: context.clone(),
            decoder,
        };
        match kind {
            StreamKind::Video => self.video = Some(opened),
            StreamKind::Audio => self.audio = Some(opened),
        }
        Ok(Some(context))
    }

    fn read_packet(&mut self) -> Option<Packet> {
        let mut packets = self.input.packets();
        let (stream, packet) = packets.next()?;
        let data = packet.data().unwrap_or(&[]);
        Some(Packet::new(Bytes::copy_from_slice(data), stream.index()))
    }

    fn seek_to_start(&mut self, stream_index: usize) -> bool {
        self.seek_seconds(0, stream_index)
    }
}
