//! One-line pipeline status display.

use dioxus::prelude::*;
use glowcut_pipeline::Status;

/// Props for the [`StatusLine`] component.
#[derive(Props, Clone, PartialEq)]
pub struct StatusLineProps {
    status: Status,
}

/// Renders the controller's [`Status`] with a per-state style.
#[component]
pub fn StatusLine(props: StatusLineProps) -> Element {
    let class = match props.status {
        Status::Error(_) => "gc-status gc-status--error",
        Status::Loading | Status::Segmenting => "gc-status gc-status--busy",
        Status::Idle | Status::Cropping => "gc-status",
    };
    let text = props.status.to_string();

    rsx! {
        p { class: "{class}", role: "status", aria_live: "polite", "{text}" }
    }
}
