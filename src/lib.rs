#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod design;
pub mod error;
pub mod graph;
pub mod layout;
pub mod ports;
pub mod render;
pub mod signal;
pub mod theme;
pub mod validate;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::Config;
pub use design::{CircuitDesign, extract_design_json};
pub use error::DesignError;
pub use graph::CircuitGraph;
pub use layout::{Layering, LayoutConfig};
pub use render::{RenderPayload, render_svg};
pub use signal::{SignalCategory, classify, legend};
pub use validate::Warning;

use design::CircuitInfo;
use ports::BlockPorts;

/// Output of one pass over a design.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub graph: CircuitGraph,
    pub warnings: Vec<Warning>,
    pub layering: Layering,
}

impl Transformed {
    pub fn into_payload(self, info: CircuitInfo) -> RenderPayload {
        RenderPayload::new(info, self.graph, &self.layering, self.warnings)
    }
}

/// Resolve, validate, build, and lay out. Never fails: structural problems
/// come back as warnings.
pub fn transform(design: &CircuitDesign, layout_config: &LayoutConfig) -> Transformed {
    let span = tracing::debug_span!(
        "transform",
        blocks = design.blocks.len(),
        connections = design.signal_flow.len()
    );
    let _enter = span.enter();

    let ports: Vec<BlockPorts> = design.blocks.iter().map(BlockPorts::resolve).collect();
    let validation = validate::validate_with_ports(&design.blocks, &ports, &design.signal_flow);
    let mut graph = graph::build_with_ports(&design.blocks, ports, &validation.edges);
    let layering = layout::layout_graph(&mut graph, layout_config);

    Transformed {
        graph,
        warnings: validation.warnings,
        layering,
    }
}

/// Parse a design payload and produce the diagram payload.
pub fn render_payload(input: &str, layout_config: &LayoutConfig) -> Result<RenderPayload, DesignError> {
    let design = CircuitDesign::from_json(input)?;
    Ok(transform(&design, layout_config).into_payload(design.info))
}

/// Parse a design payload and render the static SVG preview.
pub fn render_design_svg(input: &str, config: &Config) -> Result<String, DesignError> {
    let payload = render_payload(input, &config.layout)?;
    Ok(render_svg(&payload, &config.theme, &config.layout, &config.render))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "blocks": [
            {"id": "osc", "name": "Osc", "outputs": [{"signal_type": "audio_signal", "name": "OUT"}]},
            {"id": "flt", "name": "Filter",
             "inputs": [{"signal_type": "audio_signal", "name": "IN"}],
             "outputs": [{"signal_type": "audio_signal", "name": "OUT"}]},
            {"id": "amp", "name": "Amp", "inputs": [{"signal_type": "audio_signal", "name": "IN"}]}
        ],
        "signal_flow": [
            {"signal_type": "audio_signal", "from_block": "osc", "to_block": "flt"},
            {"signal_type": "audio_signal", "from_block": "flt", "to_block": "amp"}
        ]
    }"#;

    #[test]
    fn transform_runs_every_stage() {
        let design = CircuitDesign::from_json(CHAIN).unwrap();
        let out = transform(&design, &LayoutConfig::default());
        assert!(out.warnings.is_empty());
        assert_eq!(out.layering.layers, vec![0, 1, 2]);
        assert_eq!(out.graph.edges.len(), 2);
        assert_eq!(out.graph.nodes[2].position.x, 700.0);
    }

    #[test]
    fn render_payload_rejects_bad_input() {
        let err = render_payload("{\"blocks\": []}", &LayoutConfig::default()).unwrap_err();
        assert_eq!(err, DesignError::MissingField("signal_flow"));
    }

    #[test]
    fn render_design_svg_smoke() {
        let svg = render_design_svg(CHAIN, &Config::default()).unwrap();
        assert!(svg.contains("Filter"));
    }
}
