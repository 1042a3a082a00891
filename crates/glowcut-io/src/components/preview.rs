//! Preview of the styled export artifact.

use dioxus::prelude::*;
use glowcut_pipeline::RasterBlob;

use crate::raster;

/// Props for the [`Preview`] component.
#[derive(Props, Clone, PartialEq)]
pub struct PreviewProps {
    /// The rendered artifact; `None` shows a placeholder.
    artifact: Option<RasterBlob>,
}

/// Shows the artifact exactly as it will be downloaded, on a checkered
/// backdrop so transparent padding is visible.
#[component]
pub fn Preview(props: PreviewProps) -> Element {
    // Track the current blob URL so it is revoked when the artifact
    // changes faster than the <img> loads, and on unmount.
    let mut current_url: Signal<Option<String>> = use_signal(|| None);

    use_drop(move || {
        if let Some(ref url) = *current_url.peek() {
            raster::revoke_blob_url(url);
        }
    });

    if let Some(ref prev) = current_url.take() {
        raster::revoke_blob_url(prev);
    }

    let Some(ref artifact) = props.artifact else {
        return rsx! {
            div { class: "gc-preview gc-preview--empty",
                p { class: "gc-muted", "Upload an image to get started" }
            }
        };
    };

    match raster::raster_to_blob_url(artifact) {
        Ok(url) => {
            current_url.set(Some(url.clone()));
            let dims = artifact.dimensions();
            rsx! {
                figure { class: "gc-preview",
                    img {
                        src: "{url}",
                        class: "gc-preview__image",
                        alt: "Styled result preview",
                    }
                    figcaption { class: "gc-muted", "{dims}" }
                }
            }
        }
        Err(e) => rsx! {
            p { class: "gc-error", "Failed to show preview: {e}" }
        },
    }
}
