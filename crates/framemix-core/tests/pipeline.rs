//! End-to-end pipeline tests: tweened transforms driving composited
//! output, interlaced field evaluation, send backpressure, and the demux
//! pump feeding a mixer.
//!
//! All scenarios run against synthetic frames and a synthetic media
//! source; no real containers or codecs are involved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use framemix_core::{
    AudioTransform, BasicFrame, CompositeFrame, FrameMixer, FramemixError, ImageTransform,
    InputConfig, InputPump, MediaSource, Packet, PixelFormat, StreamContext, StreamKind, TimeBase,
    VideoFormat,
};

const TICK_TIMEOUT: Duration = Duration::from_secs(5);

/// A small progressive format: 4x2 pixels, 4 audio sample frames per tick.
fn progressive_format() -> VideoFormat {
    let mut format = VideoFormat::progressive(4, 2, 25.0);
    format.sample_rate = 100;
    format
}

fn interlaced_format() -> VideoFormat {
    let mut format = VideoFormat::interlaced(
        4,
        2,
        25.0,
        framemix_core::FieldMode::UpperFieldFirst,
    );
    format.sample_rate = 100;
    format
}

fn rgba_mixer(format: VideoFormat) -> FrameMixer {
    FrameMixer::new(format).with_output_pixel_format(PixelFormat::Rgba)
}

/// A full-coverage white frame for `layer`, with constant audio samples.
fn white_frame(mixer: &FrameMixer, layer: usize, sample: i16) -> BasicFrame {
    let mut frame = mixer.create_output_frame(layer, PixelFormat::Rgba);
    frame.plane_mut(0).fill(0xff);
    let samples_per_tick = mixer.video_format().samples_per_tick();
    frame.audio_mut().extend(std::iter::repeat(sample).take(samples_per_tick));
    frame.into_frame()
}

fn collect_subscriber(
    mixer: &FrameMixer,
) -> (
    framemix_core::MixerConnection,
    crossbeam_channel::Receiver<Arc<CompositeFrame>>,
) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let connection = mixer.connect(move |composite| {
        let _ = tx.send(composite);
    });
    (connection, rx)
}

#[test]
fn progressive_opacity_tween_ramps_linearly() {
    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .set_image_transform(
            Some(0),
            ImageTransform::default().with_opacity(0.0),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_image_transform(Some(0), ImageTransform::default(), 10, "linear")
        .unwrap();

    let frame = white_frame(&mixer, 0, 0);
    for _ in 0..10 {
        mixer.send(vec![frame.clone()]);
    }

    for k in 1..=10u32 {
        let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
        let image = composite.image.wait().unwrap();
        let expected = (255.0 * f64::from(k) / 10.0).round() as i64;
        let got = i64::from(image.data[0]);
        assert!(
            (got - expected).abs() <= 1,
            "tick {k}: expected ~{expected}, got {got}"
        );
    }
}

#[test]
fn interlaced_ticks_advance_two_tween_steps_per_frame() {
    let mixer = rgba_mixer(interlaced_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .set_image_transform(
            Some(0),
            ImageTransform::default().with_opacity(0.0),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_image_transform(Some(0), ImageTransform::default(), 10, "linear")
        .unwrap();

    let frame = white_frame(&mixer, 0, 0);
    for _ in 0..6 {
        mixer.send(vec![frame.clone()]);
    }

    // Ticks 1..=5: fields carry opacities (2k-1)/10 and 2k/10.
    for k in 1..=5i64 {
        let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
        let image = composite.image.wait().unwrap();
        let upper = i64::from(image.data[0]);
        let lower = i64::from(image.data[4 * 4]);
        let expected_upper = (255.0 * (2 * k - 1) as f64 / 10.0).round() as i64;
        let expected_lower = (255.0 * (2 * k) as f64 / 10.0).round() as i64;
        assert!(
            (upper - expected_upper).abs() <= 1,
            "tick {k} upper: expected ~{expected_upper}, got {upper}"
        );
        assert!(
            (lower - expected_lower).abs() <= 1,
            "tick {k} lower: expected ~{expected_lower}, got {lower}"
        );
    }

    // Tick 6: the tween is done, both fields equal, a single full frame.
    let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
    let image = composite.image.wait().unwrap();
    assert_eq!(image.data[0], 255);
    assert_eq!(image.data[4 * 4], 255);
}

#[test]
fn root_transform_composes_over_per_layer_transforms() {
    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .set_image_transform(
            None,
            ImageTransform::default().with_opacity(0.5),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_image_transform(
            Some(0),
            ImageTransform::default()
                .with_opacity(0.8)
                .with_fill([0.0, 0.0], [0.5, 1.0]),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_image_transform(
            Some(1),
            ImageTransform::default()
                .with_opacity(0.6)
                .with_fill([0.5, 0.0], [0.5, 1.0]),
            0,
            "linear",
        )
        .unwrap();

    mixer.send(vec![white_frame(&mixer, 0, 0), white_frame(&mixer, 1, 0)]);

    let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
    let image = composite.image.wait().unwrap();
    // Left half: 0.5 * 0.8, right half: 0.5 * 0.6.
    let left = i64::from(image.data[0]);
    let right = i64::from(image.data[2 * 4]);
    assert!((left - 102).abs() <= 2, "left half got {left}");
    assert!((right - 76).abs() <= 2, "right half got {right}");
}

#[test]
fn audio_volume_tween_scales_pcm_per_tick() {
    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .set_audio_transform(
            Some(0),
            AudioTransform::default().with_volume(0.0),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_audio_transform(Some(0), AudioTransform::default(), 10, "linear")
        .unwrap();

    let frame = white_frame(&mixer, 0, 1000);
    for _ in 0..10 {
        mixer.send(vec![frame.clone()]);
    }

    for k in 1..=10i64 {
        let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
        let expected = 100 * k;
        let got = i64::from(composite.audio[0]);
        assert!(
            (got - expected).abs() <= 1,
            "tick {k}: expected ~{expected}, got {got}"
        );
    }
}

#[test]
fn reset_tweens_every_transform_back_to_identity() {
    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .set_image_transform(
            None,
            ImageTransform::default().with_opacity(0.5),
            0,
            "linear",
        )
        .unwrap();
    mixer
        .set_image_transform(
            Some(0),
            ImageTransform::default().with_opacity(0.3),
            0,
            "linear",
        )
        .unwrap();
    mixer.reset_image_transform(4, "linear").unwrap();

    let frame = white_frame(&mixer, 0, 0);
    for _ in 0..5 {
        mixer.send(vec![frame.clone()]);
    }
    // After 4 ticks the reset has completed; the 5th is pure identity.
    let mut last = None;
    for _ in 0..5 {
        last = Some(rx.recv_timeout(TICK_TIMEOUT).unwrap());
    }
    let image = last.unwrap().image.wait().unwrap();
    assert_eq!(image.data[0], 255);
}

#[test]
fn apply_with_zero_duration_maps_the_current_value() {
    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    mixer
        .apply_image_transform(
            Some(0),
            |t| {
                let opacity = t.opacity * 0.5;
                t.with_opacity(opacity)
            },
            0,
            "linear",
        )
        .unwrap();

    mixer.send(vec![white_frame(&mixer, 0, 0)]);
    let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
    let image = composite.image.wait().unwrap();
    let got = i64::from(image.data[0]);
    assert!((got - 128).abs() <= 1, "got {got}");
}

#[test]
fn third_send_blocks_until_the_first_tick_completes() {
    let mixer = rgba_mixer(progressive_format());
    let tick_cost = Duration::from_millis(150);
    let _connection = mixer.connect(move |_| std::thread::sleep(tick_cost));

    let frame = white_frame(&mixer, 0, 0);

    // One tick in flight plus one pending fills the capacity-2 queue.
    let start = Instant::now();
    mixer.send(vec![frame.clone()]);
    mixer.send(vec![frame.clone()]);
    let first_two = start.elapsed();
    assert!(
        first_two < Duration::from_millis(100),
        "the first two sends must not block, took {first_two:?}"
    );

    let before_third = Instant::now();
    mixer.send(vec![frame.clone()]);
    let third = before_third.elapsed();
    assert!(
        third >= Duration::from_millis(50),
        "the third send must block until the first tick completes, took {third:?}"
    );

    // Each further send waits for another full tick.
    for _ in 0..2 {
        mixer.send(vec![frame.clone()]);
    }
    let all_five = start.elapsed();
    assert!(
        all_five >= Duration::from_millis(400),
        "five sends must span at least three tick durations, took {all_five:?}"
    );
}

// ---------------------------------------------------------------------------
// Demux pump feeding a mixer
// ---------------------------------------------------------------------------

/// Synthetic single-video-stream container.
struct SyntheticSource {
    packets: Vec<Packet>,
    cursor: usize,
}

impl SyntheticSource {
    fn new(count: usize) -> Self {
        Self {
            packets: (0..count).map(|i| Packet::new(vec![i as u8], 0)).collect(),
            cursor: 0,
        }
    }
}

impl MediaSource for SyntheticSource {
    fn open_stream(
        &mut self,
        kind: StreamKind,
    ) -> framemix_core::Result<Option<StreamContext>> {
        Ok(match kind {
            StreamKind::Video => Some(StreamContext {
                index: 0,
                kind,
                time_base: TimeBase::new(1, 25),
            }),
            StreamKind::Audio => None,
        })
    }

    fn read_packet(&mut self) -> Option<Packet> {
        let packet = self.packets.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(packet)
    }

    fn seek_to_start(&mut self, _stream_index: usize) -> bool {
        self.cursor = 0;
        true
    }
}

#[test]
fn pump_packets_drive_mixer_ticks_until_eof() {
    let pump = InputPump::new(SyntheticSource::new(30), InputConfig::default()).unwrap();
    assert_eq!(pump.fps(), Some(25.0));

    let mixer = rgba_mixer(progressive_format());
    let (_connection, rx) = collect_subscriber(&mixer);

    // Pretend-decode: every popped packet becomes one white frame tick.
    let frame = white_frame(&mixer, 0, 0);
    let deadline = Instant::now() + TICK_TIMEOUT;
    let mut ticks = 0;
    while ticks < 30 && Instant::now() < deadline {
        match pump.get_video_packet() {
            Some(_packet) => {
                mixer.send(vec![frame.clone()]);
                ticks += 1;
            }
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }
    assert_eq!(ticks, 30);

    for _ in 0..30 {
        let composite = rx.recv_timeout(TICK_TIMEOUT).unwrap();
        assert!(composite.image.wait().is_ok());
    }

    let deadline = Instant::now() + TICK_TIMEOUT;
    while !pump.is_eof() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(pump.is_eof());
    assert!(pump.get_video_packet().is_none());
}

#[test]
fn unknown_easing_surfaces_before_any_mixing() {
    let mixer = rgba_mixer(progressive_format());
    let err = mixer
        .set_audio_transform(None, AudioTransform::default(), 5, "elastic")
        .unwrap_err();
    assert!(matches!(err, FramemixError::InvalidEasing(_)));
}
