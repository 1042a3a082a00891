//! Image upload zone with drag-and-drop and a file picker.

use dioxus::html::{FileData, HasFileData};
use dioxus::prelude::*;

/// File extensions the pipeline can decode.
const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// `accept` attribute for the file input, derived from
/// [`ACCEPTED_EXTENSIONS`].
const ACCEPT_ATTRIBUTE: &str = ".png,.jpg,.jpeg,.bmp,.webp,image/*";

/// Whether `name` looks like an image the pipeline can decode.
pub(crate) fn is_accepted_image(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ACCEPTED_EXTENSIONS
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
    })
}

/// Props for the [`FileUpload`] component.
#[derive(Props, Clone, PartialEq)]
pub struct FileUploadProps {
    /// Called with the raw file bytes and filename once a file is read.
    on_upload: EventHandler<(Vec<u8>, String)>,
    /// Ignore new files, e.g. while a background removal is running.
    #[props(default)]
    disabled: bool,
}

/// A drop zone with a "Choose image" button.
///
/// Only the first file of a selection or drop is used. Decoding is left
/// to the controller; this component only rejects obviously wrong file
/// types so the user gets a fast hint.
#[component]
pub fn FileUpload(props: FileUploadProps) -> Element {
    let mut dragging = use_signal(|| false);
    let mut rejected = use_signal(|| Option::<String>::None);
    let disabled = props.disabled;

    let take_first = move |files: Vec<FileData>| async move {
        let Some(file) = files.first() else {
            return;
        };
        let name = file.name();
        if !is_accepted_image(&name) {
            rejected.set(Some(format!("{name} is not a PNG, JPEG, BMP, or WebP image")));
            return;
        }
        match file.read_bytes().await {
            Ok(bytes) => {
                rejected.set(None);
                props.on_upload.call((bytes.to_vec(), name));
            }
            Err(e) => rejected.set(Some(format!("Could not read {name}: {e}"))),
        }
    };

    let on_pick = move |evt: FormEvent| async move {
        if !disabled {
            take_first(evt.files()).await;
        }
    };

    let on_drop = move |evt: DragEvent| async move {
        evt.prevent_default();
        dragging.set(false);
        if !disabled {
            take_first(evt.files()).await;
        }
    };

    let zone_class = match (disabled, dragging()) {
        (true, _) => "gc-dropzone gc-dropzone--disabled",
        (false, true) => "gc-dropzone gc-dropzone--active",
        (false, false) => "gc-dropzone",
    };

    rsx! {
        div {
            class: "{zone_class}",
            ondragover: move |evt| {
                evt.prevent_default();
                dragging.set(!disabled);
            },
            ondragleave: move |_| dragging.set(false),
            ondrop: on_drop,

            p { class: "gc-muted", "Drop a photo here or" }
            label { class: "gc-button gc-button--primary",
                input {
                    r#type: "file",
                    accept: ACCEPT_ATTRIBUTE,
                    class: "gc-hidden",
                    disabled,
                    onchange: on_pick,
                }
                "Choose image"
            }
            if let Some(ref message) = rejected() {
                p { class: "gc-error", "{message}" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_decodable_extensions_case_insensitively() {
        assert!(is_accepted_image("cat.png"));
        assert!(is_accepted_image("IMG_0001.JPG"));
        assert!(is_accepted_image("scan.final.webp"));
    }

    #[test]
    fn rejects_other_files() {
        assert!(!is_accepted_image("notes.txt"));
        assert!(!is_accepted_image("png"));
        assert!(!is_accepted_image("photo.heic"));
    }
}
