use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use dioxus::prelude::*;
use glowcut_io::{
    CropControls, CropEditor, ExportPanel, FileUpload, JsSegmenter, Preview, StatusLine,
    StyleControls,
};
use glowcut_pipeline::{
    AspectRatio, Controller, ControllerConfig, RasterBlob, RectCropper, Region, RgbaImage, Status,
    StyleParams, StylePatch, WithTimeout,
};

/// In-browser models download their weights on first use, so allow
/// plenty of time before giving up.
const SEGMENT_TIMEOUT: Duration = Duration::from_secs(120);

type AppController = Controller<RectCropper>;

fn main() {
    dioxus::launch(app);
}

/// Everything the UI renders, copied out of the controller after each
/// operation.
#[derive(Clone, PartialEq)]
struct View {
    status: Status,
    style: StyleParams,
    working: Option<Arc<RgbaImage>>,
    selection: Option<Region>,
    aspect: Option<AspectRatio>,
    artifact: Option<RasterBlob>,
    busy: bool,
}

impl View {
    fn of(controller: &AppController) -> Self {
        Self {
            status: controller.status(),
            style: controller.style(),
            working: controller.working_image(),
            selection: controller.selection(),
            aspect: controller.aspect_ratio(),
            artifact: controller.export_artifact(),
            busy: controller.is_segmenting(),
        }
    }
}

/// Root application component.
///
/// Owns the pipeline [`Controller`] and mirrors its state into a
/// [`View`] signal after every operation. Components only dispatch
/// operations; none of them hold pipeline state of their own.
#[allow(clippy::too_many_lines)]
fn app() -> Element {
    let controller: Rc<AppController> =
        use_hook(|| Rc::new(Controller::from_config(ControllerConfig::default())));
    let segmenter: Rc<JsSegmenter> = use_hook(|| Rc::new(JsSegmenter::default()));
    let mut view = use_signal(|| View::of(&controller));
    let mut download_error = use_signal(|| Option::<String>::None);

    // Copy the controller's state into the view, logging status changes.
    let mut refresh = move |c: &AppController| {
        let next = View::of(c);
        if next.status != view.peek().status {
            glowcut_io::status::mirror_to_console(&next.status);
        }
        view.set(next);
    };

    // --- Upload ---
    let on_upload = {
        let c = Rc::clone(&controller);
        move |(bytes, name): (Vec<u8>, String)| {
            let c = Rc::clone(&c);
            view.with_mut(|v| v.status = Status::Loading);
            download_error.set(None);
            spawn(async move {
                // Yield so the "Loading image…" status paints before the
                // synchronous decode blocks the thread.
                gloo_timers::future::TimeoutFuture::new(0).await;
                if let Err(e) = c.load(&bytes) {
                    tracing::warn!(file = %name, error = %e, "upload rejected");
                }
                refresh(&c);
            });
        }
    };

    // --- Crop session ---
    let on_aspect = {
        let c = Rc::clone(&controller);
        move |ratio: AspectRatio| {
            let _ = c.set_aspect_ratio(ratio);
            refresh(&c);
        }
    };
    let on_select = {
        let c = Rc::clone(&controller);
        move |region: Region| {
            let _ = c.select(region);
            refresh(&c);
        }
    };
    let on_reset = {
        let c = Rc::clone(&controller);
        move |()| {
            let _ = c.reset_selection();
            refresh(&c);
        }
    };
    let on_crop = {
        let c = Rc::clone(&controller);
        move |()| {
            let _ = c.commit_crop();
            refresh(&c);
        }
    };

    // --- Background removal ---
    let on_remove_background = {
        let c = Rc::clone(&controller);
        let segmenter = Rc::clone(&segmenter);
        move |()| {
            let c = Rc::clone(&c);
            let segmenter = Rc::clone(&segmenter);
            // Show the busy state once the removal has taken its guard.
            let observer = Rc::clone(&c);
            spawn(async move {
                gloo_timers::future::TimeoutFuture::new(0).await;
                refresh(&observer);
            });
            spawn(async move {
                let bounded = WithTimeout::new(
                    segmenter.as_ref(),
                    SEGMENT_TIMEOUT,
                    gloo_timers::future::sleep,
                );
                if let Err(e) = c.remove_background(bounded).await {
                    tracing::warn!(
                        function = segmenter.function(),
                        error = %e,
                        "background removal did not complete"
                    );
                }
                refresh(&c);
            });
        }
    };

    // --- Style ---
    let on_style = {
        let c = Rc::clone(&controller);
        move |patch: StylePatch| {
            let _ = c.set_style(patch);
            refresh(&c);
        }
    };

    // --- Clear / download ---
    let on_clear = {
        let c = Rc::clone(&controller);
        move |()| {
            c.clear();
            download_error.set(None);
            refresh(&c);
        }
    };
    let on_download = {
        let c = Rc::clone(&controller);
        move |()| {
            match c.export_for_download() {
                Ok(blob) => match glowcut_io::download::trigger_download(&blob, c.download_filename()) {
                    Ok(()) => download_error.set(None),
                    Err(e) => download_error.set(Some(format!("Download failed: {e}"))),
                },
                Err(e) => tracing::warn!(error = %e, "nothing to download"),
            }
            refresh(&c);
        }
    };

    let current = view();
    let limits = controller.config().style_limits;
    let filename = controller.download_filename().to_owned();

    rsx! {
        style { dangerous_inner_html: include_str!("../assets/glowcut.css") }

        div { class: "gc-app",
            header { class: "gc-header",
                h1 { class: "gc-title", "glowcut" }
                p { class: "gc-muted",
                    "Crop, cut out, and add padding, shadow, and a neon glow to any image"
                }
            }

            main { class: "gc-main",
                // Left column: crop editor and styled preview.
                div { class: "gc-column gc-column--wide",
                    StatusLine { status: current.status.clone() }

                    if let Some(ref image) = current.working {
                        CropEditor {
                            image: Arc::clone(image),
                            selection: current.selection,
                            on_select: on_select,
                        }
                    }

                    Preview { artifact: current.artifact.clone() }
                }

                // Right column: controls.
                div { class: "gc-column",
                    FileUpload {
                        on_upload: on_upload,
                        disabled: current.busy,
                    }
                    CropControls {
                        aspect: current.aspect,
                        busy: current.busy,
                        can_remove_background: segmenter.is_available(),
                        on_aspect: on_aspect,
                        on_reset: on_reset,
                        on_crop: on_crop,
                        on_remove_background: on_remove_background,
                        on_clear: on_clear,
                    }
                    StyleControls {
                        style: current.style,
                        limits: limits,
                        on_change: on_style,
                    }
                    ExportPanel {
                        enabled: current.artifact.is_some(),
                        filename: filename,
                        on_download: on_download,
                    }
                    if let Some(ref err) = download_error() {
                        p { class: "gc-error", "{err}" }
                    }
                }
            }
        }
    }
}
