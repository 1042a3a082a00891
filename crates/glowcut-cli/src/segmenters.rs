//! Segmenters available from the command line.
//!
//! Neither ships a model. [`CommandSegmenter`] pipes the image through an
//! external tool (anything that reads a PNG on stdin and writes a cut-out
//! PNG on stdout), and [`MaskSegmenter`] applies a precomputed mask.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use glowcut_pipeline::{
    Dimensions, GrayImage, Region, RgbaImage, SegmentError, SegmentOptions, Segmenter,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs an external program as the background remover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
}

impl CommandSegmenter {
    /// Parse a whitespace-separated command line, e.g. `"rembg i - -"`.
    ///
    /// Returns `None` for a blank command.
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_owned);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    /// The executable that will be spawned.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Segmenter for CommandSegmenter {
    async fn segment(
        &self,
        image: Arc<RgbaImage>,
        _options: SegmentOptions,
    ) -> Result<RgbaImage, SegmentError> {
        let input = glowcut_pipeline::decode::encode_png(&image)
            .map_err(|e| SegmentError::Failed(e.to_string()))?;

        tracing::debug!(program = %self.program, bytes = input.len(), "spawning segmenter");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SegmentError::Failed(format!("failed to start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SegmentError::Failed("segmenter stdin unavailable".to_owned()))?;
        let feed = async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .map_err(|e| SegmentError::Failed(format!("{} did not finish: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SegmentError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        // A tool may legitimately exit before draining stdin; only report
        // the write error if it also produced nothing.
        if let Err(e) = written
            && output.stdout.is_empty()
        {
            return Err(SegmentError::Failed(format!(
                "failed to write image to {}: {e}",
                self.program
            )));
        }

        glowcut_pipeline::decode::decode_rgba(&output.stdout)
            .map_err(|e| SegmentError::InvalidOutput(e.to_string()))
    }
}

/// Uses a precomputed alpha mask instead of a model.
///
/// White keeps a pixel, black removes it. Masks of a different size are
/// stretched to the image. A mask drawn for the source image must be
/// [`crop_to`](Self::crop_to)'d before it is applied to a cropped one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSegmenter {
    mask: GrayImage,
}

impl MaskSegmenter {
    /// Wrap an in-memory mask.
    #[must_use]
    pub const fn new(mask: GrayImage) -> Self {
        Self { mask }
    }

    /// Load a mask image from disk, converting it to luminance.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the file cannot be read as an image.
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::open(path)?.to_luma8()))
    }
}

impl MaskSegmenter {
    /// Cut the mask down to `region` of a `source`-sized image.
    ///
    /// The mask is first stretched to `source`, so the region is read in
    /// the same pixel coordinates the crop used.
    #[must_use]
    pub fn crop_to(self, source: Dimensions, region: Region) -> Self {
        let mask = if self.mask.dimensions() == (source.width, source.height) {
            self.mask
        } else {
            image::imageops::resize(
                &self.mask,
                source.width,
                source.height,
                image::imageops::FilterType::Triangle,
            )
        };
        let cropped =
            image::imageops::crop_imm(&mask, region.x, region.y, region.width, region.height)
                .to_image();
        tracing::debug!(%source, %region, "mask cropped to the committed region");
        Self::new(cropped)
    }
}

impl Segmenter for MaskSegmenter {
    async fn segment(
        &self,
        image: Arc<RgbaImage>,
        _options: SegmentOptions,
    ) -> Result<RgbaImage, SegmentError> {
        Ok(glowcut_pipeline::segment::apply_mask(&image, &self.mask))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn opaque() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(4, 2, image::Rgba([200, 100, 50, 255])))
    }

    #[test]
    fn parse_splits_program_and_args() {
        let seg = CommandSegmenter::parse("  rembg i  - - ").unwrap();
        assert_eq!(seg.program(), "rembg");
        assert_eq!(seg.args, ["i", "-", "-"]);
        assert!(CommandSegmenter::parse("   ").is_none());
    }

    #[tokio::test]
    async fn mask_segmenter_cuts_out_masked_pixels() {
        let mask = GrayImage::from_fn(4, 2, |x, _| image::Luma([if x < 2 { 255 } else { 0 }]));
        let out = MaskSegmenter::new(mask)
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap();
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
        assert_eq!(out.get_pixel(3, 1).0[3], 0);
    }

    #[tokio::test]
    async fn cropped_mask_follows_source_coordinates() {
        // Source is 8x2; the mask keeps the left half only.
        let mask = GrayImage::from_fn(8, 2, |x, _| image::Luma([if x < 4 { 255 } else { 0 }]));
        let seg = MaskSegmenter::new(mask).crop_to(Dimensions::new(8, 2), Region::new(2, 0, 4, 2));
        let out = seg
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap();
        // Columns 2..4 of the source are kept, columns 4..6 are removed.
        assert_eq!(out.get_pixel(1, 1).0[3], 255);
        assert_eq!(out.get_pixel(2, 0).0[3], 0);
    }

    #[test]
    fn crop_to_stretches_a_smaller_mask_first() {
        let mask = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 255 } else { 0 }]));
        let seg = MaskSegmenter::new(mask).crop_to(Dimensions::new(100, 10), Region::new(0, 0, 40, 10));
        assert_eq!(seg.mask.dimensions(), (40, 10));
        assert!(seg.mask.pixels().take(20).all(|p| p.0[0] > 250));
    }

    #[tokio::test]
    async fn missing_program_is_a_failure() {
        let seg = CommandSegmenter::parse("glowcut-no-such-segmenter-binary").unwrap();
        let err = seg
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentError::Failed(msg) if msg.contains("failed to start")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cat_round_trips_the_image() {
        let seg = CommandSegmenter::parse("cat").unwrap();
        let out = seg
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap();
        assert_eq!(out, *opaque());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_image_output_is_invalid() {
        let seg = CommandSegmenter::parse("echo nope").unwrap();
        let err = seg
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentError::InvalidOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_exit_status() {
        let seg = CommandSegmenter::parse("false").unwrap();
        let err = seg
            .segment(opaque(), SegmentOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentError::Failed(msg) if msg.contains("exited with")));
    }
}
