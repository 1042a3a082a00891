//! Working image with a draggable crop box.
//!
//! The image is shown as an `<img>`; an SVG overlay with a `viewBox` in
//! image pixels draws the current selection and dims the rest. Dragging
//! proposes a new region, which the controller's crop session clamps
//! and constrains before it comes back as the `selection` prop. The
//! editor either fits the column or shows the image at 100% inside a
//! scrolling viewport.

use std::rc::Rc;
use std::sync::Arc;

use dioxus::prelude::*;
use glowcut_pipeline::{Dimensions, Region, RgbaImage};

use crate::raster;

/// Where the overlay sits on screen, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Frame {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    /// Map a client-space point into image pixels, clamped to the image.
    pub(crate) fn to_image(self, image: Dimensions, client_x: f64, client_y: f64) -> (f64, f64) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return (0.0, 0.0);
        }
        let w = f64::from(image.width);
        let h = f64::from(image.height);
        let x = ((client_x - self.left) * w / self.width).clamp(0.0, w);
        let y = ((client_y - self.top) * h / self.height).clamp(0.0, h);
        (x, y)
    }
}

/// How the working image is scaled on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Zoom {
    /// Shrink to fit the column.
    #[default]
    Fit,
    /// One image pixel per CSS pixel, scrolling if needed.
    Actual,
}

impl Zoom {
    pub(crate) const fn toggled(self) -> Self {
        match self {
            Self::Fit => Self::Actual,
            Self::Actual => Self::Fit,
        }
    }

    /// Label of the button that switches away from `self`.
    pub(crate) const fn switch_label(self) -> &'static str {
        match self {
            Self::Fit => "100%",
            Self::Actual => "Fit",
        }
    }

    pub(crate) const fn class(self) -> &'static str {
        match self {
            Self::Fit => "gc-crop",
            Self::Actual => "gc-crop gc-crop--actual",
        }
    }

    /// Inline style pinning the editor to the image's natural width.
    pub(crate) fn style(self, image: Dimensions) -> String {
        match self {
            Self::Fit => String::new(),
            Self::Actual => format!("width: {}px;", image.width),
        }
    }
}

/// The rectangle spanned by two drag points, at least one pixel wide.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn drag_region(start: (f64, f64), end: (f64, f64)) -> Region {
    let x0 = start.0.min(end.0).max(0.0);
    let y0 = start.1.min(end.1).max(0.0);
    let x1 = start.0.max(end.0);
    let y1 = start.1.max(end.1);
    Region::new(
        x0.floor() as u32,
        y0.floor() as u32,
        ((x1 - x0).round() as u32).max(1),
        ((y1 - y0).round() as u32).max(1),
    )
}

/// SVG path covering the image minus the selection (even-odd fill).
pub(crate) fn shade_path(image: Dimensions, sel: Region) -> String {
    format!(
        "M0 0H{w}V{h}H0Z M{x} {y}h{sw}v{sh}h-{sw}Z",
        w = image.width,
        h = image.height,
        x = sel.x,
        y = sel.y,
        sw = sel.width,
        sh = sel.height,
    )
}

/// Props for the [`CropEditor`] component.
#[derive(Props, Clone)]
pub struct CropEditorProps {
    /// The unstyled working image.
    image: Arc<RgbaImage>,
    /// Current selection, if a session is open.
    selection: Option<Region>,
    /// Fired continuously while the user drags out a new box.
    on_select: EventHandler<Region>,
}

impl PartialEq for CropEditorProps {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
            && self.selection == other.selection
            && self.on_select == other.on_select
    }
}

/// Working image with the crop selection drawn on top.
#[component]
pub fn CropEditor(props: CropEditorProps) -> Element {
    let dims = Dimensions::of(&props.image);
    let mut overlay = use_signal(|| Option::<Rc<MountedData>>::None);
    let mut frame = use_signal(|| Option::<Frame>::None);
    let mut drag_start = use_signal(|| Option::<(f64, f64)>::None);
    let mut zoom = use_signal(Zoom::default);
    let on_select = props.on_select;

    let on_down = move |evt: MouseEvent| {
        evt.prevent_default();
        let client = evt.client_coordinates();
        spawn(async move {
            let Some(mounted) = overlay() else {
                return;
            };
            match mounted.get_client_rect().await {
                Ok(rect) => {
                    let f = Frame {
                        left: rect.origin.x,
                        top: rect.origin.y,
                        width: rect.size.width,
                        height: rect.size.height,
                    };
                    frame.set(Some(f));
                    drag_start.set(Some(f.to_image(dims, client.x, client.y)));
                }
                Err(e) => tracing::warn!(error = ?e, "could not measure crop overlay"),
            }
        });
    };

    let on_move = move |evt: MouseEvent| {
        let (Some(start), Some(f)) = (drag_start(), frame()) else {
            return;
        };
        let client = evt.client_coordinates();
        let end = f.to_image(dims, client.x, client.y);
        on_select.call(drag_region(start, end));
    };

    let view_box = format!("0 0 {} {}", dims.width, dims.height);
    let shade = props.selection.map(|sel| shade_path(dims, sel));

    let current_zoom = zoom();
    let zoom_label = current_zoom.switch_label();
    let zoom_style = current_zoom.style(dims);

    rsx! {
        div { class: "gc-toolbar",
            button {
                class: "gc-button",
                onclick: move |_| zoom.set(zoom().toggled()),
                "{zoom_label}"
            }
        }
        div { class: "gc-crop-viewport",
            div { class: current_zoom.class(), style: "{zoom_style}",
                WorkingImage { image: Arc::clone(&props.image) }
                svg {
                    class: "gc-crop__overlay",
                    view_box: "{view_box}",
                    "preserveAspectRatio": "none",
                    onmounted: move |evt: MountedEvent| overlay.set(Some(evt.data())),
                    onmousedown: on_down,
                    onmousemove: on_move,
                    onmouseup: move |_| drag_start.set(None),
                    onmouseleave: move |_| drag_start.set(None),

                    if let Some(ref d) = shade {
                        path { class: "gc-crop__shade", "fill-rule": "evenodd", d: "{d}" }
                    }
                    if let Some(Region { x, y, width, height }) = props.selection {
                        rect {
                            class: "gc-crop__box",
                            x: "{x}",
                            y: "{y}",
                            width: "{width}",
                            height: "{height}",
                        }
                    }
                }
            }
        }
    }
}

/// Props for [`WorkingImage`].
#[derive(Props, Clone)]
struct WorkingImageProps {
    image: Arc<RgbaImage>,
}

impl PartialEq for WorkingImageProps {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

/// The working image as an `<img>`, re-encoded only when the image
/// itself changes (not on every selection update).
#[component]
fn WorkingImage(props: WorkingImageProps) -> Element {
    let mut url: Signal<Option<String>> = use_signal(|| None);

    use_drop(move || {
        if let Some(ref old) = *url.peek() {
            raster::revoke_blob_url(old);
        }
    });

    if let Some(ref old) = url.take() {
        raster::revoke_blob_url(old);
    }

    match raster::rgba_to_blob_url(&props.image) {
        Ok(src) => {
            url.set(Some(src.clone()));
            rsx! {
                img {
                    src: "{src}",
                    class: "gc-crop__image",
                    alt: "Working image",
                    draggable: "false",
                }
            }
        }
        Err(e) => rsx! {
            p { class: "gc-error", "Failed to show the working image: {e}" }
        },
    }
}
