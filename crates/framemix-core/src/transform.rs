//! Per-layer image and audio transform value types.
//!
//! Transforms compose multiplicatively: `a * b` applies `b` within `a`'s
//! frame, so a root transform scaled to the left half of the screen maps a
//! layer's own placement into that half. Both types have an identity
//! (`Default`) and total equality over the fields in use.

use std::ops::Mul;

use crate::tween::Interpolate;

/// Image-side transform: opacity, color correction and normalized
/// placement.
///
/// Placement coordinates are normalized to the output frame: a fill
/// translation of `[0.5, 0.0]` with a fill scale of `[0.5, 1.0]` draws the
/// layer into the right half. The clip rectangle masks the layer in output
/// space after placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageTransform {
    pub opacity: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub fill_translation: [f64; 2],
    pub fill_scale: [f64; 2],
    pub clip_translation: [f64; 2],
    pub clip_scale: [f64; 2],
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            fill_translation: [0.0, 0.0],
            fill_scale: [1.0, 1.0],
            clip_translation: [0.0, 0.0],
            clip_scale: [1.0, 1.0],
        }
    }
}

impl ImageTransform {
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_fill(mut self, translation: [f64; 2], scale: [f64; 2]) -> Self {
        self.fill_translation = translation;
        self.fill_scale = scale;
        self
    }

    pub fn with_clip(mut self, translation: [f64; 2], scale: [f64; 2]) -> Self {
        self.clip_translation = translation;
        self.clip_scale = scale;
        self
    }

    /// True when the color-correction fields are all at identity, letting
    /// the compositor skip the per-pixel shading step.
    pub fn is_color_identity(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.saturation == 1.0
    }
}

impl Mul for ImageTransform {
    type Output = ImageTransform;

    /// Applies `rhs` within `self`'s frame.
    fn mul(self, rhs: ImageTransform) -> ImageTransform {
        ImageTransform {
            opacity: self.opacity * rhs.opacity,
            brightness: self.brightness * rhs.brightness,
            contrast: self.contrast * rhs.contrast,
            saturation: self.saturation * rhs.saturation,
            fill_translation: [
                self.fill_translation[0] + self.fill_scale[0] * rhs.fill_translation[0],
                self.fill_translation[1] + self.fill_scale[1] * rhs.fill_translation[1],
            ],
            fill_scale: [
                self.fill_scale[0] * rhs.fill_scale[0],
                self.fill_scale[1] * rhs.fill_scale[1],
            ],
            clip_translation: [
                self.clip_translation[0] + self.clip_scale[0] * rhs.clip_translation[0],
                self.clip_translation[1] + self.clip_scale[1] * rhs.clip_translation[1],
            ],
            clip_scale: [
                self.clip_scale[0] * rhs.clip_scale[0],
                self.clip_scale[1] * rhs.clip_scale[1],
            ],
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp2(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t)]
}

impl Interpolate for ImageTransform {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Self {
            opacity: lerp(from.opacity, to.opacity, t),
            brightness: lerp(from.brightness, to.brightness, t),
            contrast: lerp(from.contrast, to.contrast, t),
            saturation: lerp(from.saturation, to.saturation, t),
            fill_translation: lerp2(from.fill_translation, to.fill_translation, t),
            fill_scale: lerp2(from.fill_scale, to.fill_scale, t),
            clip_translation: lerp2(from.clip_translation, to.clip_translation, t),
            clip_scale: lerp2(from.clip_scale, to.clip_scale, t),
        }
    }
}

/// Stereo channel routing applied while mixing a layer's samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelRouting {
    /// Both output channels carry the left input channel.
    LeftOnly,
    /// Both output channels carry the right input channel.
    RightOnly,
    /// Left and right are exchanged.
    Swapped,
}

/// Audio-side transform: volume and optional channel routing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioTransform {
    pub volume: f64,
    pub routing: Option<ChannelRouting>,
}

impl Default for AudioTransform {
    fn default() -> Self {
        Self {
            volume: 1.0,
            routing: None,
        }
    }
}

impl AudioTransform {
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_routing(mut self, routing: ChannelRouting) -> Self {
        self.routing = Some(routing);
        self
    }
}

impl Mul for AudioTransform {
    type Output = AudioTransform;

    fn mul(self, rhs: AudioTransform) -> AudioTransform {
        AudioTransform {
            volume: self.volume * rhs.volume,
            routing: rhs.routing.or(self.routing),
        }
    }
}

impl Interpolate for AudioTransform {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Self {
            volume: lerp(from.volume, to.volume, t),
            // Routing is not numeric; it snaps to the destination at the
            // tween midpoint. Endpoint exactness is handled by the tween.
            routing: if t < 0.5 { from.routing } else { to.routing },
        }
    }
}
