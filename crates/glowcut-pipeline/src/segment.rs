//! Background segmentation seam.
//!
//! A [`Segmenter`] takes the working image and asynchronously returns a
//! copy with the background made transparent. The model itself lives
//! outside this crate (an in-browser ML library, an external command,
//! a precomputed mask); the controller only supplies exclusivity and
//! commits the result.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use crate::types::{Dimensions, ExportFormat, RgbaImage};

/// Errors reported by a [`Segmenter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// The segmenter ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The segmenter did not finish within the allowed time.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The segmenter returned something that cannot become a working
    /// image.
    #[error("invalid segmenter output: {0}")]
    InvalidOutput(String),
}

/// Options passed to every segmentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentOptions {
    /// Encoding the segmenter should use if it produces bytes.
    pub output_format: ExportFormat,
}

/// Removes the background from an image.
///
/// Implementations need not guard against concurrent calls: the
/// controller never issues a second request while one is pending.
pub trait Segmenter {
    /// Segment `image`, returning the foreground on a transparent
    /// background.
    fn segment(
        &self,
        image: Arc<RgbaImage>,
        options: SegmentOptions,
    ) -> impl Future<Output = Result<RgbaImage, SegmentError>>;
}

impl<S: Segmenter + ?Sized> Segmenter for &S {
    fn segment(
        &self,
        image: Arc<RgbaImage>,
        options: SegmentOptions,
    ) -> impl Future<Output = Result<RgbaImage, SegmentError>> {
        (**self).segment(image, options)
    }
}

/// Segmenter backed by a closure, created with [`segmenter_fn`].
#[derive(Debug, Clone, Copy)]
pub struct FnSegmenter<F> {
    f: F,
}

/// Wrap an async closure as a [`Segmenter`].
///
/// ```rust
/// # use glowcut_pipeline::segment::{segmenter_fn, SegmentError};
/// let failing = segmenter_fn(|_image, _options| async {
///     Err::<glowcut_pipeline::RgbaImage, _>(SegmentError::Failed("model unavailable".into()))
/// });
/// # let _ = failing;
/// ```
pub const fn segmenter_fn<F, Fut>(f: F) -> FnSegmenter<F>
where
    F: Fn(Arc<RgbaImage>, SegmentOptions) -> Fut,
    Fut: Future<Output = Result<RgbaImage, SegmentError>>,
{
    FnSegmenter { f }
}

impl<F, Fut> Segmenter for FnSegmenter<F>
where
    F: Fn(Arc<RgbaImage>, SegmentOptions) -> Fut,
    Fut: Future<Output = Result<RgbaImage, SegmentError>>,
{
    fn segment(
        &self,
        image: Arc<RgbaImage>,
        options: SegmentOptions,
    ) -> impl Future<Output = Result<RgbaImage, SegmentError>> {
        (self.f)(image, options)
    }
}

/// Segmenter that fails with [`SegmentError::TimedOut`] when the inner
/// segmenter takes longer than `timeout`.
///
/// The crate has no timer of its own, so the caller supplies `sleep`:
/// `tokio::time::sleep` natively, `gloo_timers` in the browser.
#[derive(Debug, Clone)]
pub struct WithTimeout<S, T> {
    inner: S,
    timeout: Duration,
    sleep: T,
}

impl<S, T> WithTimeout<S, T> {
    /// Wrap `inner` with a deadline.
    pub const fn new(inner: S, timeout: Duration, sleep: T) -> Self {
        Self {
            inner,
            timeout,
            sleep,
        }
    }

    /// The configured deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<S, T, D> Segmenter for WithTimeout<S, T>
where
    S: Segmenter,
    T: Fn(Duration) -> D,
    D: Future<Output = ()>,
{
    async fn segment(
        &self,
        image: Arc<RgbaImage>,
        options: SegmentOptions,
    ) -> Result<RgbaImage, SegmentError> {
        let work = self.inner.segment(image, options);
        let deadline = (self.sleep)(self.timeout);
        race(work, deadline)
            .await
            .unwrap_or(Err(SegmentError::TimedOut(self.timeout)))
    }
}

/// Poll `work` and `deadline` together; `None` if the deadline fires
/// first.
async fn race<T>(work: impl Future<Output = T>, deadline: impl Future<Output = ()>) -> Option<T> {
    let mut work = pin!(work);
    let mut deadline = pin!(deadline);
    std::future::poll_fn(|cx| {
        if let Poll::Ready(value) = work.as_mut().poll(cx) {
            return Poll::Ready(Some(value));
        }
        if deadline.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        Poll::Pending
    })
    .await
}

/// Check that a segmenter result can replace the working image.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidOutput`] for a zero-area raster or one
/// with more than `max_pixels` pixels.
pub fn validate_output(output: &RgbaImage, max_pixels: u64) -> Result<(), SegmentError> {
    let dimensions = Dimensions::of(output);
    if dimensions.is_empty() {
        return Err(SegmentError::InvalidOutput(format!(
            "segmenter returned an empty {dimensions} image"
        )));
    }
    if dimensions.pixel_count() > max_pixels {
        return Err(SegmentError::InvalidOutput(format!(
            "segmenter returned a {dimensions} image, larger than {max_pixels} pixels"
        )));
    }
    Ok(())
}

/// Make pixels transparent where `mask` is dark.
///
/// The mask's luminance becomes the alpha channel (multiplied with any
/// existing alpha). The mask is resized to the image when sizes differ.
#[must_use]
pub fn apply_mask(image: &RgbaImage, mask: &crate::types::GrayImage) -> RgbaImage {
    let resized;
    let mask = if mask.dimensions() == image.dimensions() {
        mask
    } else {
        resized = image::imageops::resize(
            mask,
            image.width(),
            image.height(),
            image::imageops::FilterType::Triangle,
        );
        &resized
    };

    let mut out = image.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        #[allow(clippy::cast_possible_truncation)]
        let alpha = ((u16::from(pixel.0[3]) * u16::from(m.0[0]) + 127) / 255) as u8;
        pixel.0[3] = alpha;
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::GrayImage;

    fn opaque(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(width, height, image::Rgba([9, 9, 9, 255])))
    }

    #[tokio::test]
    async fn fn_segmenter_forwards_to_closure() {
        let seg = segmenter_fn(|image: Arc<RgbaImage>, _| async move {
            Ok::<_, SegmentError>(apply_mask(
                &image,
                &GrayImage::new(image.width(), image.height()),
            ))
        });
        let out = seg.segment(opaque(2, 2), SegmentOptions::default()).await.unwrap();
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[tokio::test]
    async fn timeout_passes_fast_results_through() {
        let seg = WithTimeout::new(
            segmenter_fn(|image: Arc<RgbaImage>, _| async move {
                Ok::<_, SegmentError>((*image).clone())
            }),
            Duration::from_secs(5),
            tokio::time::sleep,
        );
        let out = seg.segment(opaque(3, 1), SegmentOptions::default()).await;
        assert_eq!(out.unwrap().dimensions(), (3, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_for_hung_segmenter() {
        let seg = WithTimeout::new(
            segmenter_fn(|_, _| std::future::pending::<Result<RgbaImage, SegmentError>>()),
            Duration::from_secs(30),
            tokio::time::sleep,
        );
        let out = seg.segment(opaque(1, 1), SegmentOptions::default()).await;
        assert_eq!(out, Err(SegmentError::TimedOut(Duration::from_secs(30))));
    }

    #[tokio::test]
    async fn timeout_preserves_inner_failure() {
        let seg = WithTimeout::new(
            segmenter_fn(|_, _| async {
                Err::<RgbaImage, _>(SegmentError::Failed("no model".into()))
            }),
            Duration::from_secs(5),
            tokio::time::sleep,
        );
        let out = seg.segment(opaque(1, 1), SegmentOptions::default()).await;
        assert_eq!(out, Err(SegmentError::Failed("no model".into())));
    }

    #[test]
    fn empty_output_is_rejected() {
        assert!(matches!(
            validate_output(&RgbaImage::new(0, 4), 100),
            Err(SegmentError::InvalidOutput(_))
        ));
        assert!(validate_output(&RgbaImage::new(1, 1), 100).is_ok());
    }

    #[test]
    fn oversized_output_is_rejected() {
        assert!(matches!(
            validate_output(&RgbaImage::new(10, 11), 100),
            Err(SegmentError::InvalidOutput(msg)) if msg.contains("10x11")
        ));
        assert!(validate_output(&RgbaImage::new(10, 10), 100).is_ok());
    }

    #[test]
    fn mask_luminance_becomes_alpha() {
        let image = RgbaImage::from_pixel(2, 1, image::Rgba([50, 60, 70, 255]));
        let mask = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 0 } else { 255 }]));
        let out = apply_mask(&image, &mask);
        assert_eq!(out.get_pixel(0, 0).0, [50, 60, 70, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [50, 60, 70, 255]);
    }

    #[test]
    fn mask_is_resized_to_the_image() {
        let image = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]));
        let mask = GrayImage::from_pixel(2, 2, image::Luma([255]));
        let out = apply_mask(&image, &mask);
        assert_eq!(out.dimensions(), (8, 8));
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn error_display() {
        assert_eq!(SegmentError::Failed("x".into()).to_string(), "x");
        assert_eq!(
            SegmentError::TimedOut(Duration::from_secs(2)).to_string(),
            "timed out after 2s"
        );
    }
}
