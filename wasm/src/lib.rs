use circuit_graph::theme::Theme;
use circuit_graph::{Config, render_design_svg, render_payload};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CircuitRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    layer_spacing: Option<f32>,
    row_spacing: Option<f32>,
    show_legend: Option<bool>,
}

fn build_config(options: CircuitRenderOptions) -> Config {
    let mut config = Config::default();
    if matches!(options.theme.as_deref(), Some("classic" | "default")) {
        config.theme = Theme::classic();
        config.render.background = config.theme.background.clone();
    }
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    if let Some(spacing) = options.layer_spacing {
        config.layout.layer_spacing = spacing;
    }
    if let Some(spacing) = options.row_spacing {
        config.layout.row_spacing = spacing;
    }
    if let Some(show) = options.show_legend {
        config.render.show_legend = show;
    }
    config
}

fn parse_options(options_json: Option<String>) -> Result<CircuitRenderOptions, String> {
    match options_json {
        Some(raw) => serde_json::from_str(&raw).map_err(|error| error.to_string()),
        None => Ok(CircuitRenderOptions::default()),
    }
}

fn graph_json(design_json: &str, options_json: Option<String>) -> Result<String, String> {
    let config = build_config(parse_options(options_json)?);
    let payload = render_payload(design_json, &config.layout).map_err(|error| error.to_string())?;
    serde_json::to_string(&payload).map_err(|error| error.to_string())
}

fn graph_svg(design_json: &str, options_json: Option<String>) -> Result<String, String> {
    let config = build_config(parse_options(options_json)?);
    render_design_svg(design_json, &config).map_err(|error| error.to_string())
}

/// Laid-out nodes, edges, legend, and warnings for the diagram widget.
#[wasm_bindgen]
pub fn circuit_graph_json(design_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    graph_json(design_json, options_json).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn circuit_graph_svg(design_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    graph_svg(design_json, options_json).map_err(|error| JsValue::from_str(&error))
}
