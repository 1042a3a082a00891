//! The image pipeline controller.
//!
//! [`Controller`] owns all pipeline state: the working image, the style
//! parameters, the rendered export artifact, the open crop session, and
//! the background-removal guard. UI layers only dispatch operations and
//! observe [`Controller::status`] and [`Controller::export_artifact`].
//!
//! # Consistency
//!
//! Every mutating operation either fully commits or leaves state
//! untouched. Working-image replacements (`load`, `commit_crop`, and the
//! commit half of `remove_background`) run under the state lock, so they
//! are serialised, and each one renders its artifact before committing.
//!
//! # Background removal
//!
//! ```text
//!   Idle ──remove_background──▶ Segmenting ──ok / err / dropped──▶ Idle
//!                                   │
//!                                   └── remove_background, load, commit_crop
//!                                       are rejected with OperationInProgress
//! ```
//!
//! The lock is released while the segmenter runs. If the controller is
//! cleared in the meantime, the late result is discarded.
//!
//! # Rendering
//!
//! Style changes merge under the lock and composite outside it. Each
//! render takes a generation number; only the newest generation may
//! publish its artifact, so a slow render for an old slider position
//! never overwrites a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use web_time::Instant;

use crate::composite::{Compositor, RasterCompositor};
use crate::crop::{CropSession, Cropper, RectCropper};
use crate::segment::{SegmentOptions, Segmenter};
use crate::style::{StyleParams, StylePatch};
use crate::types::{
    AspectRatio, ControllerConfig, Dimensions, PipelineError, RasterBlob, Region, RgbaImage,
    Status,
};

/// Whether a background removal is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No background removal running.
    #[default]
    Idle,
    /// A segmenter call is pending.
    Segmenting,
}

/// Mutable pipeline state, guarded by the controller's lock.
struct State<S> {
    working: Option<Arc<RgbaImage>>,
    /// Bumped on every working-image replacement and on clear.
    revision: u64,
    style: StyleParams,
    export: Option<RasterBlob>,
    session: Option<S>,
    phase: Phase,
    status: Status,
    /// Bumped by every render and every commit; stale renders compare
    /// unequal and are dropped.
    render_generation: u64,
}

impl<S> State<S> {
    /// Status to show once nothing is running.
    const fn settled_status(&self) -> Status {
        if self.working.is_some() {
            Status::Cropping
        } else {
            Status::Idle
        }
    }
}

/// Owns the working image and threads it through crop, background
/// removal, and styling.
///
/// `K` opens crop sessions; `C` decodes, crops, and composites rasters.
pub struct Controller<K: Cropper, C = RasterCompositor> {
    cropper: K,
    compositor: C,
    config: ControllerConfig,
    state: Mutex<State<K::Session>>,
}

impl Controller<RectCropper> {
    /// Controller with the default rectangle cropper and CPU compositor.
    #[must_use]
    pub fn from_config(config: ControllerConfig) -> Self {
        Self::new(RectCropper::new(config.auto_crop_area), config)
    }
}

impl Default for Controller<RectCropper> {
    fn default() -> Self {
        Self::from_config(ControllerConfig::default())
    }
}

impl<K: Cropper> Controller<K> {
    /// Controller with a custom cropper and the CPU compositor.
    #[must_use]
    pub fn new(cropper: K, config: ControllerConfig) -> Self {
        Self::with_compositor(cropper, RasterCompositor, config)
    }
}

impl<K: Cropper, C: Compositor> Controller<K, C> {
    /// Controller with custom collaborators.
    #[must_use]
    pub fn with_compositor(cropper: K, compositor: C, config: ControllerConfig) -> Self {
        let state = State {
            working: None,
            revision: 0,
            style: config.initial_style,
            export: None,
            session: None,
            phase: Phase::Idle,
            status: Status::Idle,
            render_generation: 0,
        };
        Self {
            cropper,
            compositor,
            config,
            state: Mutex::new(state),
        }
    }

    /// The configuration this controller was built with.
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// File name to offer when downloading the export artifact.
    #[must_use]
    pub fn download_filename(&self) -> &str {
        &self.config.download_filename
    }

    // ───────────────────────────── operations ─────────────────────────────

    /// Decode `bytes` and make them the working image.
    ///
    /// Closes any previous crop session, opens a new one on the decoded
    /// image, and renders the export artifact.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::OperationInProgress`] while a background
    ///   removal is running.
    /// - [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`],
    ///   or [`PipelineError::ImageTooLarge`] for unusable uploads; the
    ///   previous working image is kept.
    pub fn load(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        let mut state = self.lock();
        if state.phase == Phase::Segmenting {
            tracing::warn!("load rejected: background removal in progress");
            return Err(PipelineError::OperationInProgress);
        }
        state.status = Status::Loading;

        let prepared = self
            .compositor
            .decode_within(bytes, self.config.max_source_pixels)
            .and_then(|image| {
                let artifact = self.compose(&image, &state.style)?;
                Ok((Arc::new(image), artifact))
            });
        match prepared {
            Ok((image, artifact)) => {
                tracing::info!(
                    bytes = bytes.len(),
                    dimensions = %Dimensions::of(&image),
                    "image loaded"
                );
                self.replace_working(&mut state, image, artifact);
                Ok(())
            }
            Err(e) => Err(fail(&mut state, e)),
        }
    }

    /// Replace the working image with the crop session's current
    /// selection.
    ///
    /// The session is closed and re-opened on the cropped result, so
    /// later crops compose on it rather than on the original.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::OperationInProgress`] while a background
    ///   removal is running.
    /// - [`PipelineError::NoActiveSession`] if nothing is loaded.
    /// - [`PipelineError::InvalidRegion`] if the session reports a
    ///   selection outside the image.
    pub fn commit_crop(&self) -> Result<(), PipelineError> {
        let mut state = self.lock();
        if state.phase == Phase::Segmenting {
            tracing::warn!("crop rejected: background removal in progress");
            return Err(PipelineError::OperationInProgress);
        }
        let (Some(image), Some(region)) = (
            state.working.clone(),
            state.session.as_ref().map(CropSession::selection),
        ) else {
            return Err(fail(&mut state, PipelineError::NoActiveSession));
        };

        let prepared = self.compositor.extract(&image, region).and_then(|cropped| {
            let artifact = self.compose(&cropped, &state.style)?;
            Ok((Arc::new(cropped), artifact))
        });
        match prepared {
            Ok((cropped, artifact)) => {
                tracing::info!(%region, from = %Dimensions::of(&image), "crop committed");
                self.replace_working(&mut state, cropped, artifact);
                Ok(())
            }
            Err(e) => Err(fail(&mut state, e)),
        }
    }

    /// Run `segmenter` on the working image and commit its result.
    ///
    /// Only one background removal may run at a time. The guard is
    /// released when this future completes or is dropped.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::OperationInProgress`] if another removal is
    ///   pending; state is untouched.
    /// - [`PipelineError::NoActiveSession`] if nothing is loaded.
    /// - [`PipelineError::Segmentation`] if the segmenter fails or
    ///   returns an empty image; the working image is unchanged.
    /// - [`PipelineError::Superseded`] if the controller was cleared
    ///   while the segmenter ran.
    pub async fn remove_background<S: Segmenter>(&self, segmenter: S) -> Result<(), PipelineError> {
        let (image, revision) = {
            let mut state = self.lock();
            if state.phase == Phase::Segmenting {
                tracing::warn!("background removal rejected: already in progress");
                return Err(PipelineError::OperationInProgress);
            }
            let Some(image) = state.working.clone() else {
                return Err(fail(&mut state, PipelineError::NoActiveSession));
            };
            state.phase = Phase::Segmenting;
            state.status = Status::Segmenting;
            (image, state.revision)
        };
        let _guard = SegmentingGuard { state: &self.state };

        let started = Instant::now();
        let options = SegmentOptions {
            output_format: self.config.export_format,
        };
        let outcome = segmenter
            .segment(image, options)
            .await
            .and_then(|output| {
                crate::segment::validate_output(&output, self.config.max_source_pixels)?;
                Ok(output)
            });
        tracing::debug!(elapsed = ?started.elapsed(), ok = outcome.is_ok(), "segmenter finished");

        let mut state = self.lock();
        state.phase = Phase::Idle;
        let output = match outcome {
            Ok(output) => output,
            Err(e) => return Err(fail(&mut state, PipelineError::Segmentation(e))),
        };
        if state.revision != revision {
            tracing::warn!("background removal result discarded: image changed meanwhile");
            state.status = state.settled_status();
            return Err(PipelineError::Superseded);
        }

        match self.compose(&output, &state.style) {
            Ok(artifact) => {
                tracing::info!(dimensions = %Dimensions::of(&output), "background removed");
                self.replace_working(&mut state, Arc::new(output), artifact);
                Ok(())
            }
            Err(e) => Err(fail(&mut state, e)),
        }
    }

    /// Merge a partial style update and re-render.
    ///
    /// Never touches the working image. Invalid values are clamped, see
    /// [`StyleParams::merged`].
    ///
    /// # Errors
    ///
    /// Returns whatever [`render`](Self::render) returns.
    pub fn set_style(&self, patch: StylePatch) -> Result<(), PipelineError> {
        {
            let mut state = self.lock();
            state.style = state.style.merged(patch, &self.config.style_limits);
            tracing::debug!(style = ?state.style, "style updated");
        }
        self.render()
    }

    /// Re-render the export artifact from the working image and the
    /// current style. Does nothing when no image is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the padded canvas
    /// overflows, or [`PipelineError::Encode`] if encoding fails. Errors
    /// from a render that was superseded in the meantime are ignored.
    pub fn render(&self) -> Result<(), PipelineError> {
        let (image, style, generation, revision) = {
            let mut state = self.lock();
            let Some(image) = state.working.clone() else {
                return Ok(());
            };
            state.render_generation += 1;
            (image, state.style, state.render_generation, state.revision)
        };

        let result = self.compose(&image, &style);

        let mut state = self.lock();
        if state.render_generation != generation || state.revision != revision {
            tracing::debug!(generation, "discarding superseded render");
            return Ok(());
        }
        match result {
            Ok(artifact) => {
                state.export = Some(artifact);
                if state.status.is_error() {
                    state.status = state.settled_status();
                }
                Ok(())
            }
            Err(e) => Err(fail(&mut state, e)),
        }
    }

    /// Drop the working image, the export artifact, and the crop
    /// session. Style parameters are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        if let Some(session) = state.session.take() {
            session.close();
        }
        state.working = None;
        state.export = None;
        state.revision += 1;
        state.render_generation += 1;
        state.status = Status::Idle;
        tracing::info!("pipeline cleared");
    }

    /// The artifact to download.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NothingToExport`] if nothing has been
    /// rendered since the last clear.
    pub fn export_for_download(&self) -> Result<RasterBlob, PipelineError> {
        let mut state = self.lock();
        match state.export.clone() {
            Some(blob) => Ok(blob),
            None => Err(fail(&mut state, PipelineError::NothingToExport)),
        }
    }

    // ──────────────────────────── crop session ────────────────────────────

    /// Lock the crop box to `ratio`. Returns the new selection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoActiveSession`] if nothing is loaded.
    pub fn set_aspect_ratio(&self, ratio: AspectRatio) -> Result<Region, PipelineError> {
        self.with_session(|session| {
            session.set_aspect_ratio(ratio);
            session.selection()
        })
    }

    /// Move or resize the crop box. Returns the selection after the
    /// session applied its constraints.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoActiveSession`] if nothing is loaded.
    pub fn select(&self, region: Region) -> Result<Region, PipelineError> {
        self.with_session(|session| {
            session.select(region);
            session.selection()
        })
    }

    /// Restore the default crop box. Returns the new selection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoActiveSession`] if nothing is loaded.
    pub fn reset_selection(&self) -> Result<Region, PipelineError> {
        self.with_session(|session| {
            session.reset();
            session.selection()
        })
    }

    /// Current crop box, if a session is open.
    #[must_use]
    pub fn selection(&self) -> Option<Region> {
        self.lock().session.as_ref().map(CropSession::selection)
    }

    /// Current aspect-ratio constraint, if a session is open.
    #[must_use]
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.lock().session.as_ref().map(CropSession::aspect_ratio)
    }

    // ────────────────────────────── accessors ─────────────────────────────

    /// Current user-facing status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.lock().status.clone()
    }

    /// Current style parameters.
    #[must_use]
    pub fn style(&self) -> StyleParams {
        self.lock().style
    }

    /// The unstyled working image.
    #[must_use]
    pub fn working_image(&self) -> Option<Arc<RgbaImage>> {
        self.lock().working.clone()
    }

    /// Size of the working image.
    #[must_use]
    pub fn working_dimensions(&self) -> Option<Dimensions> {
        self.lock().working.as_deref().map(Dimensions::of)
    }

    /// The rendered artifact, without flagging an error when empty.
    #[must_use]
    pub fn export_artifact(&self) -> Option<RasterBlob> {
        self.lock().export.clone()
    }

    /// Number of working-image replacements and clears so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Whether a background removal is in flight.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Shorthand for `phase() == Phase::Segmenting`.
    #[must_use]
    pub fn is_segmenting(&self) -> bool {
        self.phase() == Phase::Segmenting
    }

    /// Whether a crop session is open.
    #[must_use]
    pub fn has_crop_session(&self) -> bool {
        self.lock().session.is_some()
    }

    // ────────────────────────────── internals ─────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State<K::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn compose(&self, image: &RgbaImage, style: &StyleParams) -> Result<RasterBlob, PipelineError> {
        let started = Instant::now();
        let blob = crate::style::stylize(&self.compositor, image, style, self.config.export_format)?;
        tracing::debug!(
            dimensions = %blob.dimensions(),
            bytes = blob.bytes().len(),
            elapsed = ?started.elapsed(),
            "rendered export artifact"
        );
        Ok(blob)
    }

    /// Commit a new working image: close the old session, open a new
    /// one, publish the pre-rendered artifact.
    fn replace_working(
        &self,
        state: &mut State<K::Session>,
        image: Arc<RgbaImage>,
        artifact: RasterBlob,
    ) {
        if let Some(session) = state.session.take() {
            session.close();
        }
        state.session = Some(self.cropper.open(Arc::clone(&image)));
        state.working = Some(image);
        state.export = Some(artifact);
        state.revision += 1;
        state.render_generation += 1;
        state.status = Status::Cropping;
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut K::Session) -> T,
    ) -> Result<T, PipelineError> {
        let mut state = self.lock();
        match state.session.as_mut() {
            Some(session) => Ok(f(session)),
            None => Err(fail(&mut state, PipelineError::NoActiveSession)),
        }
    }
}

/// Record `err` in the status line and hand it back.
fn fail<S>(state: &mut State<S>, err: PipelineError) -> PipelineError {
    tracing::warn!(error = %err, "operation failed");
    state.status = Status::Error(err.to_string());
    err
}

/// Releases the segmenting phase if a removal future is dropped before
/// it commits.
struct SegmentingGuard<'a, S> {
    state: &'a Mutex<State<S>>,
}

impl<S> Drop for SegmentingGuard<'_, S> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::Segmenting {
            tracing::debug!("background removal abandoned");
            state.phase = Phase::Idle;
            if state.status == Status::Segmenting {
                state.status = state.settled_status();
            }
        }
    }
}
