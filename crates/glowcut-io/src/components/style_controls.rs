//! Padding, shadow, and glow sliders.

use dioxus::prelude::*;
use glowcut_pipeline::{StyleLimits, StyleParams, StylePatch};

/// Props for the [`StyleControls`] component.
#[derive(Props, Clone, PartialEq)]
pub struct StyleControlsProps {
    /// Current style, as reported by the controller.
    style: StyleParams,
    /// Slider ranges.
    limits: StyleLimits,
    /// Fired with a single-field patch on every slider movement.
    on_change: EventHandler<StylePatch>,
}

/// Three range sliders, one per style parameter.
///
/// Sliders send raw values; clamping happens in the controller, so the
/// displayed value always comes back from [`StyleControlsProps::style`].
#[component]
pub fn StyleControls(props: StyleControlsProps) -> Element {
    let on_change = props.on_change;
    let style = props.style;
    let limits = props.limits;

    rsx! {
        div { class: "gc-panel gc-stack",
            h3 { class: "gc-heading", "Style" }
            {render_slider(
                "padding",
                "Padding",
                f64::from(style.padding),
                f64::from(limits.max_padding),
                move |v| on_change.call(StylePatch::padding(v)),
            )}
            {render_slider(
                "shadow",
                "Shadow",
                f64::from(style.shadow_blur),
                f64::from(limits.max_shadow_blur),
                move |v| on_change.call(StylePatch::shadow_blur(v)),
            )}
            {render_slider(
                "glow",
                "Glow",
                f64::from(style.glow_blur),
                f64::from(limits.max_glow_blur),
                move |v| on_change.call(StylePatch::glow_blur(v)),
            )}
        }
    }
}

/// Render a labeled integer-step range slider from 0 to `max`.
fn render_slider(
    id: &str,
    label: &str,
    value: f64,
    max: f64,
    on_input: impl Fn(f64) + 'static,
) -> Element {
    let display = format!("{value:.0}");
    let id = format!("style-{id}");
    let label = label.to_string();

    rsx! {
        div { class: "gc-field",
            div { class: "gc-field__row",
                label { r#for: "{id}", class: "gc-label", "{label}" }
                span { class: "gc-value", "{display}" }
            }
            input {
                r#type: "range",
                id: "{id}",
                min: "0",
                max: "{max}",
                step: "1",
                value: "{value}",
                class: "gc-slider",
                oninput: move |e| {
                    match e.value().parse::<f64>() {
                        Ok(v) => on_input(v),
                        Err(err) => tracing::warn!(
                            value = %e.value(),
                            error = %err,
                            "ignoring unparsable slider value"
                        ),
                    }
                },
            }
        }
    }
}
