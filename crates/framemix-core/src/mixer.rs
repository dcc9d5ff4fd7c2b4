//! Frame mixer: per-tick composition of layered frames.
//!
//! Every call to [`send`](FrameMixer::send) enqueues one tick on the
//! mixer's capacity-2 executor; with one tick in flight and one pending,
//! further sends block the caller, which is the primary backpressure
//! toward upstream producers. On each tick the mixer evaluates the root
//! and per-layer tweened transforms in step with the output clock (one
//! step per progressive frame, two per interlaced frame), runs the image
//! and audio passes, and publishes the composite to every subscriber.
//!
//! All transform mutations run through the same executor, so a control
//! operation is observed either entirely by a tick or entirely after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::audio_mixer::AudioMixer;
use crate::diagnostics::Graph;
use crate::easing::Easing;
use crate::error::Result;
use crate::executor::Executor;
use crate::format::{FieldMode, PixelFormat, PixelFormatDesc, VideoFormat};
use crate::frame::{BasicFrame, WriteFrame};
use crate::image_mixer::{ImageFuture, ImageMixer};
use crate::registry::TweenRegistry;
use crate::transform::{AudioTransform, ImageTransform};

/// Bound of the mixer's tick queue: one in flight, one pending.
pub const MIXER_QUEUE_CAPACITY: usize = 2;

/// One tick's output: the composed image (resolving asynchronously) and
/// exactly one tick of interleaved 16-bit PCM.
pub struct CompositeFrame {
    pub image: ImageFuture,
    pub audio: Vec<i16>,
}

/// An output sink attached with [`FrameMixer::connect`].
pub type Subscriber = Arc<dyn Fn(Arc<CompositeFrame>) + Send + Sync>;

struct MixerState {
    image_mixer: ImageMixer,
    audio_mixer: AudioMixer,
    image_transforms: TweenRegistry<ImageTransform>,
    audio_transforms: TweenRegistry<AudioTransform>,
    last_tick_started: Option<Instant>,
}

struct MixerInner {
    format: VideoFormat,
    graph: Arc<Graph>,
    state: Mutex<MixerState>,
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_subscriber_id: AtomicU64,
}

/// Orchestrates per-tick mixing and owns the transform registries.
pub struct FrameMixer {
    inner: Arc<MixerInner>,
    executor: Arc<Executor>,
}

impl FrameMixer {
    pub fn new(format: VideoFormat) -> Self {
        let graph = Graph::new("mixer");
        let inner = Arc::new(MixerInner {
            format,
            graph,
            state: Mutex::new(MixerState {
                image_mixer: ImageMixer::new(format),
                audio_mixer: AudioMixer::new(format),
                image_transforms: TweenRegistry::new(),
                audio_transforms: TweenRegistry::new(),
                last_tick_started: None,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        });
        let executor = Arc::new(Executor::bounded("mixer", MIXER_QUEUE_CAPACITY));
        tracing::info!(
            field_mode = ?format.field_mode,
            width = format.width,
            height = format.height,
            "frame mixer initialized"
        );
        Self { inner, executor }
    }

    /// Pixel layout of the composited output (BGRA by default).
    pub fn with_output_pixel_format(self, format: PixelFormat) -> Self {
        self.inner
            .state
            .lock()
            .image_mixer
            .set_output_pixel_format(format);
        self
    }

    pub fn video_format(&self) -> &VideoFormat {
        &self.inner.format
    }

    /// The mixer's diagnostic graph (`frame-time`, `tick-time`,
    /// `input-buffer`).
    pub fn graph(&self) -> &Arc<Graph> {
        &self.inner.graph
    }

    /// Attaches an output sink. The returned connection detaches it on
    /// drop.
    pub fn connect<F>(&self, subscriber: F) -> MixerConnection
    where
        F: Fn(Arc<CompositeFrame>) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(subscriber)));
        MixerConnection {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Enqueues one tick's frames for mixing. Returns once enqueued;
    /// blocks the caller while two ticks are already outstanding.
    pub fn send(&self, frames: Vec<BasicFrame>) {
        let inner = Arc::clone(&self.inner);
        let executor = Arc::clone(&self.executor);
        self.executor
            .begin_invoke(move || inner.tick(frames, executor.as_ref()));
        self.inner.graph.set_value(
            "input-buffer",
            self.executor.len() as f32 / MIXER_QUEUE_CAPACITY as f32,
        );
    }

    /// Allocates a writeable frame for `layer_index` with the given plane
    /// layout.
    pub fn create_frame(&self, layer_index: usize, desc: &PixelFormatDesc) -> WriteFrame {
        let planes = self.inner.state.lock().image_mixer.create_buffers(desc);
        WriteFrame::new(desc.clone(), planes, layer_index)
    }

    /// Allocates a single-plane writeable frame of the given size.
    pub fn create_frame_sized(
        &self,
        layer_index: usize,
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
    ) -> WriteFrame {
        self.create_frame(
            layer_index,
            &PixelFormatDesc::single_plane(pixel_format, width, height),
        )
    }

    /// Allocates a single-plane writeable frame at the output resolution.
    pub fn create_output_frame(&self, layer_index: usize, pixel_format: PixelFormat) -> WriteFrame {
        self.create_frame_sized(
            layer_index,
            self.inner.format.width,
            self.inner.format.height,
            pixel_format,
        )
    }

    /// Starts a tween of the root (no layer) or a layer's image transform
    /// toward `transform`.
    pub fn set_image_transform(
        &self,
        layer: Option<usize>,
        transform: ImageTransform,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            let mut state = inner.state.lock();
            match layer {
                Some(index) => state
                    .image_transforms
                    .set_layer(index, transform, duration, easing),
                None => state.image_transforms.set_root(transform, duration, easing),
            }
        });
        Ok(())
    }

    /// Starts a tween of the root or a layer's audio transform toward
    /// `transform`.
    pub fn set_audio_transform(
        &self,
        layer: Option<usize>,
        transform: AudioTransform,
        duration: u32,
        easing: &str,
    ) -> Result<()> {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            let mut state = inner.state.lock();
            match layer {
                Some(index) => state
                    .audio_transforms
                    .set_layer(index, transform, duration, easing),
                None => state.audio_transforms.set_root(transform, duration, easing),
            }
        });
        Ok(())
    }

    /// Like `set_image_transform` with the destination derived from the
    /// currently evaluated value. `f` runs on the mixer executor.
    pub fn apply_image_transform<F>(
        &self,
        layer: Option<usize>,
        f: F,
        duration: u32,
        easing: &str,
    ) -> Result<()>
    where
        F: FnOnce(ImageTransform) -> ImageTransform + Send + 'static,
    {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            let mut state = inner.state.lock();
            match layer {
                Some(index) => state.image_transforms.apply_layer(index, f, duration, easing),
                None => state.image_transforms.apply_root(f, duration, easing),
            }
        });
        Ok(())
    }

    /// Like `set_audio_transform` with the destination derived from the
    /// currently evaluated value. `f` runs on the mixer executor.
    pub fn apply_audio_transform<F>(
        &self,
        layer: Option<usize>,
        f: F,
        duration: u32,
        easing: &str,
    ) -> Result<()>
    where
        F: FnOnce(AudioTransform) -> AudioTransform + Send + 'static,
    {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            let mut state = inner.state.lock();
            match layer {
                Some(index) => state.audio_transforms.apply_layer(index, f, duration, easing),
                None => state.audio_transforms.apply_root(f, duration, easing),
            }
        });
        Ok(())
    }

    /// Tweens every image transform, root included, back to identity.
    pub fn reset_image_transform(&self, duration: u32, easing: &str) -> Result<()> {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            inner.state.lock().image_transforms.reset(duration, easing);
        });
        Ok(())
    }

    /// Tweens every audio transform, root included, back to identity.
    pub fn reset_audio_transform(&self, duration: u32, easing: &str) -> Result<()> {
        let easing = Easing::from_name(easing)?;
        let inner = Arc::clone(&self.inner);
        self.executor.invoke(move || {
            inner.state.lock().audio_transforms.reset(duration, easing);
        });
        Ok(())
    }
}

impl Drop for FrameMixer {
    fn drop(&mut self) {
        self.executor.clear();
        self.executor.stop();
        tracing::info!("frame mixer stopped");
    }
}

impl MixerInner {
    /// One tick: metrics, filtering, image pass, audio pass, publish.
    fn tick(&self, frames: Vec<BasicFrame>, executor: &Executor) {
        let tick_started = Instant::now();
        let interval = self.format.tick_interval.as_secs_f32().max(f32::EPSILON);
        {
            let mut state = self.state.lock();
            if let Some(last) = state.last_tick_started.replace(tick_started) {
                self.graph
                    .update_value("frame-time", last.elapsed().as_secs_f32() / interval * 0.5);
            }
        }

        let frames: Vec<BasicFrame> = frames
            .into_iter()
            .filter(|f| !f.is_empty() && !f.is_eof())
            .collect();

        match self.mix(&frames) {
            Ok(composite) => self.publish(composite),
            Err(e) => tracing::error!(error = %e, "mix stage failed, tick produced no output"),
        }

        self.graph.update_value(
            "tick-time",
            tick_started.elapsed().as_secs_f32() / interval * 0.5,
        );
        self.graph.set_value(
            "input-buffer",
            executor.len() as f32 / MIXER_QUEUE_CAPACITY as f32,
        );
    }

    /// A pass-level failure in either mix aborts the tick; the
    /// subscriber receives nothing for it.
    fn mix(&self, frames: &[BasicFrame]) -> Result<CompositeFrame> {
        let mut state = self.state.lock();
        let image = self.mix_image(&mut state, frames)?;
        let audio = self.mix_audio(&mut state, frames)?;
        Ok(CompositeFrame { image, audio })
    }

    /// Image pass. Interlaced formats evaluate the transform once per
    /// field (advancing tween time twice per tick) and compose the two
    /// fields into one interlaced frame when they differ.
    fn mix_image(
        &self,
        state: &mut MixerState,
        frames: &[BasicFrame],
    ) -> Result<ImageFuture> {
        let upper_first = self.format.field_mode == FieldMode::UpperFieldFirst;
        let future = state.image_mixer.begin_pass();

        for frame in frames {
            let layer = frame.layer_index;
            let accepted = if self.format.field_mode.is_progressive() {
                let mut child = frame.clone();
                child.image_transform = state.image_transforms.fetch_and_tick_root(1)
                    * state.image_transforms.fetch_and_tick_layer(layer, 1);
                state.image_mixer.accept(&child)
            } else {
                let mut first = frame.clone();
                first.image_transform = state.image_transforms.fetch_and_tick_root(1)
                    * state.image_transforms.fetch_and_tick_layer(layer, 1);
                let mut second = frame.clone();
                second.image_transform = state.image_transforms.fetch_and_tick_root(1)
                    * state.image_transforms.fetch_and_tick_layer(layer, 1);

                if first.image_transform != second.image_transform {
                    let interlaced = BasicFrame::interlace(first, second, upper_first);
                    state.image_mixer.accept(&interlaced)
                } else {
                    state.image_mixer.accept(&second)
                }
            };
            if let Err(e) = accepted {
                tracing::warn!(layer, error = %e, "dropping layer from image pass");
            }
        }

        state.image_mixer.end_pass()?;
        Ok(future)
    }

    /// Audio pass. The audio transform is evaluated once per tick,
    /// advanced by one step per field so it stays in phase with the image
    /// tweens.
    fn mix_audio(&self, state: &mut MixerState, frames: &[BasicFrame]) -> Result<Vec<i16>> {
        let steps = self.format.tween_steps_per_tick();
        state.audio_mixer.begin_pass();
        for frame in frames {
            let mut child = frame.clone();
            child.audio_transform = state.audio_transforms.fetch_and_tick_root(steps)
                * state
                    .audio_transforms
                    .fetch_and_tick_layer(frame.layer_index, steps);
            if let Err(e) = state.audio_mixer.accept(&child) {
                tracing::warn!(layer = frame.layer_index, error = %e, "dropping layer from audio pass");
            }
        }
        state.audio_mixer.end_pass()
    }

    fn publish(&self, composite: CompositeFrame) {
        let composite = Arc::new(composite);
        // Snapshot under the lock; invoke outside it so a subscriber can
        // connect or disconnect from within its callback.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(Arc::clone(&composite));
        }
    }
}

/// Detaches its subscriber from the mixer when dropped.
pub struct MixerConnection {
    id: u64,
    inner: Weak<MixerInner>,
}

impl Drop for MixerConnection {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
