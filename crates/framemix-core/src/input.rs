//! Input demux pump: container reads into per-stream packet queues.
//!
//! The pump continuously reads encoded packets from a [`MediaSource`] on
//! its own single-worker executor, routes them into a video and an audio
//! queue, and suspends on a condition variable while both queues are above
//! capacity. Consumers signal that condition on every pop, which is the
//! only synchronization between the decode side and the read loop. With
//! looping enabled, end-of-stream seeks the container back to the start
//! and tags a `seek` diagnostic instead of stopping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::demux::{MediaSource, StreamContext, StreamKind};
use crate::diagnostics::Graph;
use crate::error::{FramemixError, Result};
use crate::executor::Executor;
use crate::packet_queue::{Packet, PacketQueue};

/// Soft capacity of each per-stream packet queue.
pub const DEFAULT_PACKET_QUEUE_CAPACITY: usize = 50;

/// Construction options for an [`InputPump`].
#[derive(Clone, Copy, Debug)]
pub struct InputConfig {
    /// Seek back to the start on end-of-stream instead of stopping.
    pub loop_input: bool,
    /// Soft capacity of the video and audio packet queues.
    pub queue_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            loop_input: false,
            queue_capacity: DEFAULT_PACKET_QUEUE_CAPACITY,
        }
    }
}

/// State shared between the pump worker and the consumer-facing handle.
struct PumpShared {
    source: Mutex<Box<dyn MediaSource>>,
    video_packets: PacketQueue,
    audio_packets: PacketQueue,
    video_index: Option<usize>,
    audio_index: Option<usize>,
    loop_input: bool,
    running: AtomicBool,
    graph: Arc<Graph>,
    /// Guards the backpressure condition; holds no data of its own.
    backpressure_mutex: Mutex<()>,
    backpressure: Condvar,
}

/// Owns a media source and pumps its packets into bounded queues.
pub struct InputPump {
    shared: Arc<PumpShared>,
    executor: Executor,
    video_context: Option<StreamContext>,
    audio_context: Option<StreamContext>,
}

impl InputPump {
    /// Opens the first video and first audio stream of `source` and starts
    /// the read loop.
    ///
    /// A stream whose decoder fails to open is skipped with a warning;
    /// construction fails with
    /// [`NoUsableStream`](FramemixError::NoUsableStream) only when neither
    /// kind opened. Each opened context gets its time base repaired.
    pub fn new<S>(mut source: S, config: InputConfig) -> Result<Self>
    where
        S: MediaSource + 'static,
    {
        let video_context = Self::open_kind(&mut source, StreamKind::Video);
        let audio_context = Self::open_kind(&mut source, StreamKind::Audio);
        if video_context.is_none() && audio_context.is_none() {
            return Err(FramemixError::NoUsableStream);
        }

        let graph = Graph::new("input");
        let shared = Arc::new(PumpShared {
            source: Mutex::new(Box::new(source)),
            video_packets: PacketQueue::new(config.queue_capacity),
            audio_packets: PacketQueue::new(config.queue_capacity),
            video_index: video_context.as_ref().map(|c| c.index),
            audio_index: audio_context.as_ref().map(|c| c.index),
            loop_input: config.loop_input,
            running: AtomicBool::new(true),
            graph,
            backpressure_mutex: Mutex::new(()),
            backpressure: Condvar::new(),
        });

        let executor = Executor::new("input");
        let worker_shared = Arc::clone(&shared);
        executor.begin_invoke(move || pump_loop(&worker_shared));
        tracing::info!(
            video = ?shared.video_index,
            audio = ?shared.audio_index,
            loop_input = config.loop_input,
            "input pump started"
        );

        Ok(Self {
            shared,
            executor,
            video_context,
            audio_context,
        })
    }

    fn open_kind<S: MediaSource>(source: &mut S, kind: StreamKind) -> Option<StreamContext> {
        match source.open_stream(kind) {
            Ok(Some(context)) => Some(StreamContext {
                time_base: context.time_base.repaired(),
                ..context
            }),
            Ok(None) => {
                tracing::warn!(?kind, "container has no stream of this kind");
                None
            }
            Err(e) => {
                tracing::warn!(?kind, error = %e, "skipping stream");
                None
            }
        }
    }

    /// The opened video decoder context, if the container has one.
    pub fn video_context(&self) -> Option<&StreamContext> {
        self.video_context.as_ref()
    }

    /// The opened audio decoder context, if the container has one.
    pub fn audio_context(&self) -> Option<&StreamContext> {
        self.audio_context.as_ref()
    }

    /// True once the pump has stopped and both queues are drained.
    pub fn is_eof(&self) -> bool {
        !self.shared.running.load(Ordering::Acquire)
            && self.shared.video_packets.is_empty()
            && self.shared.audio_packets.is_empty()
    }

    /// Frames per second implied by the repaired video time base.
    pub fn fps(&self) -> Option<f64> {
        self.video_context.as_ref().map(|c| c.time_base.fps())
    }

    /// Pops one video packet and wakes a suspended pump.
    pub fn get_video_packet(&self) -> Option<Packet> {
        self.notify_backpressure();
        self.shared.video_packets.try_pop()
    }

    /// Pops one audio packet and wakes a suspended pump.
    pub fn get_audio_packet(&self) -> Option<Packet> {
        self.notify_backpressure();
        self.shared.audio_packets.try_pop()
    }

    /// Number of video packets currently buffered.
    pub fn buffered_video_packets(&self) -> usize {
        self.shared.video_packets.len()
    }

    /// Number of audio packets currently buffered.
    pub fn buffered_audio_packets(&self) -> usize {
        self.shared.audio_packets.len()
    }

    /// The pump's diagnostic graph (`input-buffer` gauge, `seek` tag).
    pub fn graph(&self) -> &Arc<Graph> {
        &self.shared.graph
    }

    fn notify_backpressure(&self) {
        // Taking the guard orders the notify against the worker's
        // check-then-wait, so a pop can never slip between them unseen.
        let _guard = self.shared.backpressure_mutex.lock();
        self.shared.backpressure.notify_all();
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        {
            let _guard = self.shared.backpressure_mutex.lock();
            self.shared.running.store(false, Ordering::Release);
            self.shared.backpressure.notify_all();
        }
        self.executor.clear();
        self.executor.stop();
        tracing::info!("input pump stopped");
        // The executor field drops next and joins the worker; the source
        // inside `shared` is released only after the worker is gone.
    }
}

/// The read loop, serialized on the pump's executor.
fn pump_loop(shared: &PumpShared) {
    while shared.running.load(Ordering::Acquire) {
        // Bind the read before matching so the source lock is released;
        // the end-of-stream arm takes it again to seek.
        let next = shared.source.lock().read_packet();
        match next {
            Some(packet) => {
                if Some(packet.stream_index) == shared.video_index {
                    shared.video_packets.push(packet);
                } else if Some(packet.stream_index) == shared.audio_index {
                    shared.audio_packets.push(packet);
                } else {
                    // Intentional: packets from unmapped streams are dropped.
                    tracing::trace!(stream = packet.stream_index, "dropping unmapped packet");
                }
            }
            None => {
                // End-of-stream or read error: loop back to the start on
                // the stream with the greater index, or stop the pump.
                let target = shared.video_index.max(shared.audio_index);
                let sought = shared.loop_input
                    && target
                        .map(|index| shared.source.lock().seek_to_start(index))
                        .unwrap_or(false);
                if sought {
                    shared.graph.tag("seek");
                } else {
                    if shared.loop_input {
                        tracing::warn!("loop seek failed, stopping pump");
                    }
                    let _guard = shared.backpressure_mutex.lock();
                    shared.running.store(false, Ordering::Release);
                }
            }
        }

        std::thread::yield_now();

        shared.graph.update_value(
            "input-buffer",
            shared.video_packets.len() as f32 / shared.video_packets.capacity() as f32,
        );

        let mut guard = shared.backpressure_mutex.lock();
        while shared.running.load(Ordering::Acquire)
            && queue_saturated(&shared.video_packets, shared.video_index)
            && queue_saturated(&shared.audio_packets, shared.audio_index)
        {
            shared.backpressure.wait(&mut guard);
        }
    }
    tracing::debug!("pump loop finished");
}

/// A queue counts as saturated when above its soft capacity. A stream the
/// container does not have can never fill its queue, so its side is
/// vacuously saturated; otherwise a single-stream container would never
/// suspend the pump.
fn queue_saturated(queue: &PacketQueue, index: Option<usize>) -> bool {
    index.is_none() || queue.is_above_capacity()
}
