//! framemix-core: real-time video/audio compositing engine core.
//!
//! This crate is the UI-free foundation of a frame-mixer pipeline: it
//! consumes decoded media frames from multiple layered producers, applies
//! per-layer and root transforms that animate smoothly over time, composes
//! them into a single output frame per video tick, and delivers the result
//! to subscribers. It contains:
//!
//! - Ingestion: [`input`] (demux pump with bounded backpressure and
//!   seamless looping), [`demux`] (media source collaborator seam),
//!   [`packet_queue`]
//! - Mixing: [`mixer`] (per-tick orchestration), [`image_mixer`],
//!   [`audio_mixer`]
//! - Animation: [`tween`], [`easing`], [`transform`], [`registry`]
//! - Infrastructure: [`executor`] (single-worker bounded task queues),
//!   [`diagnostics`], [`format`], [`frame`], [`error`]
//!
//! Container demultiplexing itself is an external collaborator behind the
//! [`demux::MediaSource`] trait; enable the `ffmpeg` feature for the
//! FFmpeg-backed implementation in `ffmpeg_source`.

pub mod audio_mixer;
pub mod demux;
pub mod diagnostics;
pub mod easing;
pub mod error;
pub mod executor;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_source;
pub mod format;
pub mod frame;
pub mod image_mixer;
pub mod input;
pub mod mixer;
pub mod packet_queue;
pub mod registry;
pub mod transform;
pub mod tween;

pub use audio_mixer::AudioMixer;
pub use demux::{MediaSource, StreamContext, StreamKind, TimeBase};
pub use diagnostics::Graph;
pub use easing::Easing;
pub use error::{FramemixError, Result};
pub use executor::{Executor, TaskHandle};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg_source::FfmpegSource;
pub use format::{FieldMode, PixelFormat, PixelFormatDesc, PlaneDesc, VideoFormat};
pub use frame::{BasicFrame, FrameContent, FrameData, HostImage, WriteFrame};
pub use image_mixer::{ImageFuture, ImageMixer};
pub use input::{InputConfig, InputPump, DEFAULT_PACKET_QUEUE_CAPACITY};
pub use mixer::{CompositeFrame, FrameMixer, MixerConnection, Subscriber, MIXER_QUEUE_CAPACITY};
pub use packet_queue::{Packet, PacketQueue};
pub use registry::TweenRegistry;
pub use transform::{AudioTransform, ChannelRouting, ImageTransform};
pub use tween::{Interpolate, Tween, TWEEN_EPSILON};
