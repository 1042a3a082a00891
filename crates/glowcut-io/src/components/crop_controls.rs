//! Aspect-ratio buttons and the pipeline action buttons.

use dioxus::prelude::*;
use glowcut_pipeline::AspectRatio;

/// Aspect ratios offered as buttons, with their labels.
pub const ASPECT_CHOICES: &[(AspectRatio, &str)] = &[
    (AspectRatio::SQUARE, "1:1"),
    (AspectRatio::PORTRAIT, "4:5"),
    (AspectRatio::WIDE, "16:9"),
    (AspectRatio::Free, "Free"),
];

/// Props for the [`CropControls`] component.
#[derive(Props, Clone, PartialEq)]
pub struct CropControlsProps {
    /// Ratio the crop session is locked to; `None` when no image is loaded.
    aspect: Option<AspectRatio>,
    /// A background removal is in flight.
    busy: bool,
    /// Whether the page provides a background remover.
    can_remove_background: bool,
    on_aspect: EventHandler<AspectRatio>,
    on_reset: EventHandler<()>,
    on_crop: EventHandler<()>,
    on_remove_background: EventHandler<()>,
    on_clear: EventHandler<()>,
}

/// Crop toolbar: ratio presets, Reset, Crop, Remove background, Clear.
///
/// Everything except Clear is disabled without an image; Crop and
/// Remove background are also disabled while a removal is running.
#[component]
pub fn CropControls(props: CropControlsProps) -> Element {
    let has_image = props.aspect.is_some();
    let idle = has_image && !props.busy;
    let on_aspect = props.on_aspect;

    rsx! {
        div { class: "gc-panel gc-stack",
            h3 { class: "gc-heading", "Crop" }
            div { class: "gc-toolbar", role: "group", aria_label: "Aspect ratio",
                for (ratio, label) in ASPECT_CHOICES.iter().copied() {
                    button {
                        key: "{label}",
                        class: if props.aspect == Some(ratio) { "gc-button gc-button--selected" } else { "gc-button" },
                        disabled: !has_image,
                        onclick: move |_| on_aspect.call(ratio),
                        "{label}"
                    }
                }
            }
            div { class: "gc-toolbar",
                button {
                    class: "gc-button",
                    disabled: !has_image,
                    onclick: move |_| props.on_reset.call(()),
                    "Reset"
                }
                button {
                    class: "gc-button gc-button--primary",
                    disabled: !idle,
                    onclick: move |_| props.on_crop.call(()),
                    "Crop"
                }
                button {
                    class: "gc-button gc-button--primary",
                    disabled: !idle || !props.can_remove_background,
                    title: if props.can_remove_background { "" } else { "No background remover on this page" },
                    onclick: move |_| props.on_remove_background.call(()),
                    if props.busy { "Removing…" } else { "Remove background" }
                }
                button {
                    class: "gc-button gc-button--danger",
                    onclick: move |_| props.on_clear.call(()),
                    "Clear"
                }
            }
        }
    }
}
