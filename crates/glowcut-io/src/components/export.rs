//! Download button.

use dioxus::prelude::*;

/// Props for the [`ExportPanel`] component.
#[derive(Props, Clone, PartialEq)]
pub struct ExportPanelProps {
    /// Whether there is an artifact to download.
    enabled: bool,
    /// Name the downloaded file will get.
    filename: String,
    /// Fired when the user asks for the download.
    on_download: EventHandler<()>,
}

/// Export panel with a single PNG download button.
#[component]
pub fn ExportPanel(props: ExportPanelProps) -> Element {
    let enabled = props.enabled;

    rsx! {
        div { class: "gc-panel gc-stack",
            h3 { class: "gc-heading", "Export" }
            button {
                class: if enabled { "gc-button gc-button--primary" } else { "gc-button" },
                disabled: !enabled,
                title: "{props.filename}",
                onclick: move |_| props.on_download.call(()),
                "Download PNG"
            }
        }
    }
}
