//! Image mixer facade: accepts per-layer frames into a compositing pass.
//!
//! A pass is bracketed by [`begin_pass`](ImageMixer::begin_pass) and
//! [`end_pass`](ImageMixer::end_pass); acceptance order is z-order
//! (first accepted = bottom). Composition itself runs on the mixer's own
//! render executor, so the [`ImageFuture`] handed out by `begin_pass`
//! resolves asynchronously while the next tick is already being prepared.
//!
//! The kernel here is a host-memory compositor: normalized placement and
//! clipping, color correction, opacity and integer src-over blending.
//! Interlaced items write only their field's scanlines (upper = even
//! rows).

use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{FramemixError, Result};
use crate::executor::Executor;
use crate::format::{PixelFormat, PixelFormatDesc, VideoFormat};
use crate::frame::{BasicFrame, FrameContent, HostImage};
use crate::transform::ImageTransform;

/// Which output scanlines an accepted item covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldTarget {
    Full,
    Upper,
    Lower,
}

struct RenderItem {
    image: HostImage,
    transform: ImageTransform,
    field: FieldTarget,
}

/// Future host buffer of one compositing pass.
///
/// The result is cached, so `wait` can be called from any number of
/// subscribers sharing the composite.
pub struct ImageFuture {
    rx: Receiver<Result<HostImage>>,
    cell: OnceLock<Result<HostImage>>,
}

impl ImageFuture {
    /// Blocks until the pass has composed, returning the host buffer.
    pub fn wait(&self) -> Result<HostImage> {
        self.cell
            .get_or_init(|| {
                self.rx.recv().unwrap_or_else(|_| {
                    Err(FramemixError::MixStageFailed(
                        "image pass abandoned".to_string(),
                    ))
                })
            })
            .clone()
    }

    /// Returns the result if the pass has already composed.
    pub fn try_take(&self) -> Option<Result<HostImage>> {
        if let Some(ready) = self.cell.get() {
            return Some(ready.clone());
        }
        match self.rx.try_recv() {
            Ok(result) => {
                let _ = self.cell.set(result);
                self.cell.get().cloned()
            }
            Err(_) => None,
        }
    }
}

/// Composites accepted frames into a single host image per pass.
pub struct ImageMixer {
    format: VideoFormat,
    output_pixel_format: PixelFormat,
    items: Vec<RenderItem>,
    pending: Option<Sender<Result<HostImage>>>,
    executor: Executor,
}

impl ImageMixer {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            format,
            output_pixel_format: PixelFormat::Bgra,
            items: Vec::new(),
            pending: None,
            executor: Executor::new("render"),
        }
    }

    /// Pixel layout of composited output buffers (BGRA by default).
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.output_pixel_format = format;
        self
    }

    /// Changes the output pixel layout in place.
    pub fn set_output_pixel_format(&mut self, format: PixelFormat) {
        self.output_pixel_format = format;
    }

    pub fn output_pixel_format(&self) -> PixelFormat {
        self.output_pixel_format
    }

    /// Opens a new pass and returns the future of its composed buffer.
    ///
    /// An unfinished previous pass is abandoned (its future resolves to
    /// `MixStageFailed`).
    pub fn begin_pass(&mut self) -> ImageFuture {
        if self.pending.take().is_some() {
            tracing::warn!("image pass reopened before end_pass; abandoning previous pass");
        }
        self.items.clear();
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.pending = Some(tx);
        ImageFuture {
            rx,
            cell: OnceLock::new(),
        }
    }

    /// Submits a frame into the open pass. Acceptance order is z-order.
    ///
    /// Fails only for the offending frame (malformed image geometry);
    /// the pass stays usable and the caller decides to drop the layer.
    pub fn accept(&mut self, frame: &BasicFrame) -> Result<()> {
        self.accept_with(frame, ImageTransform::default(), FieldTarget::Full)
    }

    fn accept_with(
        &mut self,
        frame: &BasicFrame,
        parent: ImageTransform,
        field: FieldTarget,
    ) -> Result<()> {
        let transform = parent * frame.image_transform;
        match &frame.content {
            FrameContent::Empty | FrameContent::Eof => Ok(()),
            FrameContent::Single(data) => {
                if let Some(image) = &data.image {
                    if !image.is_well_formed() {
                        return Err(FramemixError::MixStageFailed(format!(
                            "layer {}: image buffer does not match {}x{}",
                            frame.layer_index, image.width, image.height
                        )));
                    }
                    self.items.push(RenderItem {
                        image: image.clone(),
                        transform,
                        field,
                    });
                }
                Ok(())
            }
            FrameContent::Interlaced { upper, lower } => {
                self.accept_with(upper, transform, FieldTarget::Upper)?;
                self.accept_with(lower, transform, FieldTarget::Lower)
            }
        }
    }

    /// Closes the pass; composition is scheduled on the render executor
    /// and the future returned by `begin_pass` becomes ready when done.
    ///
    /// Fails the pass as a whole when no pass is open or the output
    /// format has no area; the future resolves to the same error, and
    /// the caller must not publish that tick.
    pub fn end_pass(&mut self) -> Result<()> {
        let Some(tx) = self.pending.take() else {
            return Err(FramemixError::MixStageFailed(
                "image end_pass without begin_pass".to_string(),
            ));
        };
        if self.format.width == 0 || self.format.height == 0 {
            let error =
                FramemixError::MixStageFailed("output format has zero area".to_string());
            let _ = tx.send(Err(error.clone()));
            return Err(error);
        }
        let items = std::mem::take(&mut self.items);
        let width = self.format.width;
        let height = self.format.height;
        let pixel_format = self.output_pixel_format;
        self.executor.begin_invoke(move || {
            let _ = tx.send(Ok(compose(width, height, pixel_format, &items)));
        });
        Ok(())
    }

    /// Allocates zeroed host planes for a writeable frame.
    pub fn create_buffers(&self, desc: &PixelFormatDesc) -> Vec<Vec<u8>> {
        desc.planes
            .iter()
            .map(|plane| vec![0u8; plane.byte_len()])
            .collect()
    }
}

/// Composes the accepted items bottom-to-top into one output buffer.
/// Geometry has been validated by `end_pass`.
fn compose(
    width: usize,
    height: usize,
    pixel_format: PixelFormat,
    items: &[RenderItem],
) -> HostImage {
    let mut canvas = vec![0u8; width * height * 4];
    for item in items {
        draw_item(&mut canvas, width, height, pixel_format, item);
    }
    HostImage {
        format: pixel_format,
        width,
        height,
        data: Arc::new(canvas),
    }
}

fn draw_item(
    canvas: &mut [u8],
    width: usize,
    height: usize,
    out_format: PixelFormat,
    item: &RenderItem,
) {
    let t = &item.transform;
    let src = &item.image;
    if t.opacity <= 0.0 || src.width == 0 || src.height == 0 {
        return;
    }
    if t.fill_scale[0].abs() < f64::EPSILON || t.fill_scale[1].abs() < f64::EPSILON {
        return;
    }

    let clip_x0 = t.clip_translation[0];
    let clip_x1 = clip_x0 + t.clip_scale[0];
    let clip_y0 = t.clip_translation[1];
    let clip_y1 = clip_y0 + t.clip_scale[1];

    let (first_row, row_step) = match item.field {
        FieldTarget::Full => (0, 1),
        FieldTarget::Upper => (0, 2),
        FieldTarget::Lower => (1, 2),
    };

    let swap_rb = src.format != out_format;
    let shade_needed = !t.is_color_identity();

    for dy in (first_row..height).step_by(row_step) {
        let ny = (dy as f64 + 0.5) / height as f64;
        if ny < clip_y0 || ny >= clip_y1 {
            continue;
        }
        let ly = (ny - t.fill_translation[1]) / t.fill_scale[1];
        if !(0.0..1.0).contains(&ly) {
            continue;
        }
        let sy = ((ly * src.height as f64) as usize).min(src.height - 1);

        for dx in 0..width {
            let nx = (dx as f64 + 0.5) / width as f64;
            if nx < clip_x0 || nx >= clip_x1 {
                continue;
            }
            let lx = (nx - t.fill_translation[0]) / t.fill_scale[0];
            if !(0.0..1.0).contains(&lx) {
                continue;
            }
            let sx = ((lx * src.width as f64) as usize).min(src.width - 1);

            let si = (sy * src.width + sx) * 4;
            let mut px = [
                src.data[si],
                src.data[si + 1],
                src.data[si + 2],
                src.data[si + 3],
            ];
            if swap_rb {
                px.swap(0, 2);
            }
            if shade_needed {
                px = shade(px, t, out_format);
            }

            let di = (dy * width + dx) * 4;
            let dst = [canvas[di], canvas[di + 1], canvas[di + 2], canvas[di + 3]];
            let blended = over(dst, px, t.opacity as f32);
            canvas[di..di + 4].copy_from_slice(&blended);
        }
    }
}

/// Brightness, contrast and saturation on one pixel; alpha untouched.
fn shade(px: [u8; 4], t: &ImageTransform, format: PixelFormat) -> [u8; 4] {
    let (ri, gi, bi) = format.rgb_indices();
    let mut rgb = [
        f32::from(px[ri]) / 255.0,
        f32::from(px[gi]) / 255.0,
        f32::from(px[bi]) / 255.0,
    ];
    let contrast = t.contrast as f32;
    let brightness = t.brightness as f32;
    for c in &mut rgb {
        *c = ((*c - 0.5) * contrast + 0.5) * brightness;
    }
    let luma = 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2];
    let saturation = t.saturation as f32;
    for c in &mut rgb {
        *c = luma + (*c - luma) * saturation;
    }
    let mut out = px;
    out[ri] = (rgb[0].clamp(0.0, 1.0) * 255.0).round() as u8;
    out[gi] = (rgb[1].clamp(0.0, 1.0) * 255.0).round() as u8;
    out[bi] = (rgb[2].clamp(0.0, 1.0) * 255.0).round() as u8;
    out
}

/// Integer src-over blend with an extra opacity factor.
fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    // Effective source coverage: straight alpha scaled by layer opacity.
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - sa;

    let mut out = [0u8; 4];
    out[3] = (sa as u8).saturating_add(mul_div255(u16::from(dst[3]), inv) as u8);
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), sa);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = (sc as u8).saturating_add(dc as u8);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameData;

    fn solid(width: usize, height: usize, rgba: [u8; 4]) -> HostImage {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        HostImage {
            format: PixelFormat::Rgba,
            width,
            height,
            data: Arc::new(data),
        }
    }

    fn frame_with(layer: usize, image: HostImage) -> BasicFrame {
        BasicFrame::single(
            layer,
            FrameData {
                image: Some(image),
                audio: Arc::new(Vec::new()),
            },
        )
    }

    fn test_mixer(width: usize, height: usize) -> ImageMixer {
        ImageMixer::new(VideoFormat::progressive(width, height, 25.0))
            .with_pixel_format(PixelFormat::Rgba)
    }

    #[test]
    fn single_layer_opacity_scales_output() {
        let mut mixer = test_mixer(4, 2);
        let mut frame = frame_with(0, solid(4, 2, [255, 255, 255, 255]));
        frame.image_transform.opacity = 0.5;

        let future = mixer.begin_pass();
        mixer.accept(&frame).unwrap();
        mixer.end_pass().unwrap();

        let image = future.wait().unwrap();
        let value = image.data[0];
        assert!((126..=129).contains(&value), "got {value}");
        assert_eq!(image.width, 4);
        assert_eq!(image.height, 2);
    }

    #[test]
    fn later_layers_draw_on_top() {
        let mut mixer = test_mixer(2, 2);
        let bottom = frame_with(0, solid(2, 2, [255, 0, 0, 255]));
        let top = frame_with(1, solid(2, 2, [0, 255, 0, 255]));

        let future = mixer.begin_pass();
        mixer.accept(&bottom).unwrap();
        mixer.accept(&top).unwrap();
        mixer.end_pass().unwrap();

        let image = future.wait().unwrap();
        assert_eq!(&image.data[0..3], &[0, 255, 0]);
    }

    #[test]
    fn fill_placement_confines_the_layer() {
        let mut mixer = test_mixer(4, 2);
        let mut frame = frame_with(0, solid(2, 2, [255, 255, 255, 255]));
        // Right half only.
        frame.image_transform.fill_translation = [0.5, 0.0];
        frame.image_transform.fill_scale = [0.5, 1.0];

        let future = mixer.begin_pass();
        mixer.accept(&frame).unwrap();
        mixer.end_pass().unwrap();

        let image = future.wait().unwrap();
        // Row 0: pixels 0-1 untouched, 2-3 painted.
        assert_eq!(image.data[3], 0);
        assert_eq!(image.data[1 * 4 + 3], 0);
        assert_eq!(image.data[2 * 4 + 3], 255);
        assert_eq!(image.data[3 * 4 + 3], 255);
    }

    #[test]
    fn interlaced_fields_land_on_alternate_rows() {
        let mut mixer = test_mixer(2, 4);
        let mut first = frame_with(0, solid(2, 4, [255, 255, 255, 255]));
        first.image_transform.opacity = 0.25;
        let mut second = frame_with(0, solid(2, 4, [255, 255, 255, 255]));
        second.image_transform.opacity = 0.75;
        let interlaced = BasicFrame::interlace(first, second, true);

        let future = mixer.begin_pass();
        mixer.accept(&interlaced).unwrap();
        mixer.end_pass().unwrap();

        let image = future.wait().unwrap();
        let row = |y: usize| image.data[y * 2 * 4];
        let upper = row(0);
        let lower = row(1);
        assert!((62..=65).contains(&upper), "upper field got {upper}");
        assert!((190..=193).contains(&lower), "lower field got {lower}");
        assert_eq!(row(2), upper);
        assert_eq!(row(3), lower);
    }

    #[test]
    fn malformed_image_fails_only_that_accept() {
        let mut mixer = test_mixer(2, 2);
        let bad = frame_with(
            0,
            HostImage {
                format: PixelFormat::Rgba,
                width: 2,
                height: 2,
                data: Arc::new(vec![0u8; 7]),
            },
        );
        let good = frame_with(1, solid(2, 2, [1, 2, 3, 255]));

        let future = mixer.begin_pass();
        assert!(mixer.accept(&bad).is_err());
        mixer.accept(&good).unwrap();
        mixer.end_pass().unwrap();
        assert!(future.wait().is_ok());
    }

    #[test]
    fn zero_area_output_fails_the_pass() {
        let mut mixer = test_mixer(0, 0);
        let future = mixer.begin_pass();
        let err = mixer.end_pass().unwrap_err();
        assert!(matches!(err, FramemixError::MixStageFailed(_)));
        assert!(future.wait().is_err());
    }

    #[test]
    fn end_pass_without_begin_is_an_error() {
        let mut mixer = test_mixer(2, 2);
        assert!(mixer.end_pass().is_err());
    }

    #[test]
    fn create_buffers_match_plane_descriptors() {
        let mixer = test_mixer(8, 8);
        let desc = PixelFormatDesc::single_plane(PixelFormat::Bgra, 8, 4);
        let buffers = mixer.create_buffers(&desc);
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].len(), 8 * 4 * 4);
    }

    #[test]
    fn bgra_sources_are_swizzled_into_rgba_output() {
        let mut mixer = test_mixer(1, 1);
        let mut bgra = solid(1, 1, [10, 20, 200, 255]);
        bgra.format = PixelFormat::Bgra;
        let frame = frame_with(0, bgra);

        let future = mixer.begin_pass();
        mixer.accept(&frame).unwrap();
        mixer.end_pass().unwrap();

        let image = future.wait().unwrap();
        assert_eq!(&image.data[0..4], &[200, 20, 10, 255]);
    }
}
