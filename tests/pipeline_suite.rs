use circuit_graph::config::Config;
use circuit_graph::design::{BlockSpec, CircuitDesign, Connection, Port};
use circuit_graph::layout::LayoutConfig;
use circuit_graph::ports::{BlockPorts, PortDirection};
use circuit_graph::render::render_svg;
use circuit_graph::signal::{SignalCategory, classify};
use circuit_graph::validate::{BlockIndex, DanglingReason, EndpointSide, Warning};
use circuit_graph::{DesignError, extract_design_json, render_payload, transform};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> CircuitDesign {
    let input = fs::read_to_string(fixture_path(name)).expect("read fixture");
    CircuitDesign::from_json(&input).expect("fixture parses")
}

#[test]
fn voice_chain_lays_out_in_three_columns() {
    let design = load("voice_chain.json");
    let out = transform(&design, &LayoutConfig::default());
    assert_eq!(out.graph.nodes.len(), 3);
    assert_eq!(out.graph.edges.len(), 2);
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    assert_eq!(out.layering.layers, vec![0, 1, 2]);
    let ids: Vec<&str> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["block-0", "block-1", "block-2"]);
    assert_eq!(out.graph.edges[0].id, "e-block-0-output-0-block-1-input-0");
    assert!(out.graph.nodes[0].position.x < out.graph.nodes[1].position.x);
    assert!(out.graph.nodes[1].position.x < out.graph.nodes[2].position.x);
}

#[test]
fn unknown_block_reference_drops_only_that_connection() {
    let mut design = load("voice_chain.json");
    design.signal_flow[1].to_block = "reverb".to_string();
    let out = transform(&design, &LayoutConfig::default());
    assert_eq!(out.graph.nodes.len(), 3);
    assert_eq!(out.graph.edges.len(), 1);
    // amp's required input lost its only feed
    assert_eq!(out.warnings.len(), 2);
    assert!(matches!(
        &out.warnings[0],
        Warning::DanglingConnection {
            index: 1,
            endpoint: EndpointSide::Target,
            reason: DanglingReason::UnknownBlock,
            ..
        }
    ));
    assert!(matches!(
        &out.warnings[1],
        Warning::UnconnectedRequiredInput { block, .. } if block == "amp"
    ));
}

#[test]
fn feedback_loop_terminates_with_every_edge_kept() {
    let design = load("feedback_loop.json");
    let out = transform(&design, &LayoutConfig::default());
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    assert_eq!(out.graph.edges.len(), 5);
    assert_eq!(out.layering.layers, vec![0, 1, 2, 3]);
    assert_eq!(out.layering.feedback, vec![3, 4]);
    assert!(out.graph.edges[4].is_self_loop());
    assert_eq!(out.graph.edges[3].target_handle, "input-1");
}

#[test]
fn eurorack_vco_reports_every_structural_warning() {
    let design = load("eurorack_vco.json");
    let out = transform(&design, &LayoutConfig::default());

    let flow: Vec<usize> = out.graph.edges.iter().map(|e| e.flow_index).collect();
    assert_eq!(flow, vec![0, 1, 2, 3, 4]);
    assert_eq!(out.graph.edges[0].target_handle, "input-2");
    assert_eq!(out.graph.edges[0].category, SignalCategory::Power);
    assert!(out.graph.edges[4].flagged);
    assert!(out.graph.edges[4].is_self_loop());

    assert_eq!(
        out.warnings,
        vec![
            Warning::SignalTypeMismatch {
                index: 4,
                declared: "gate_signal".to_string(),
                source_type: "audio_signal".to_string(),
                target_type: "sync_signal".to_string(),
            },
            Warning::DanglingConnection {
                index: 5,
                endpoint: EndpointSide::Target,
                block: "reverb".to_string(),
                port: None,
                reason: DanglingReason::UnknownBlock,
            },
            Warning::DuplicateConnection { index: 6, first: 3 },
            Warning::UnconnectedRequiredInput {
                block: "expo".to_string(),
                port: "1V/OCT".to_string(),
            },
            Warning::UnconnectedRequiredInput {
                block: "out".to_string(),
                port: "AUX".to_string(),
            },
        ]
    );

    assert_eq!(out.layering.layers, vec![0, 1, 2, 3, 4]);
    assert_eq!(out.layering.feedback, vec![4]);
}

#[test]
fn position_hints_do_not_move_nodes() {
    let design = load("eurorack_vco.json");
    let out = transform(&design, &LayoutConfig::default());
    assert_eq!(out.graph.nodes[0].position.x, 0.0);
    assert_eq!(out.graph.nodes[0].position.y, 0.0);
    assert_eq!(out.graph.nodes[4].position.x, 4.0 * 350.0);
    assert!(out.graph.nodes[0].data.block.position.is_some());
}

#[test]
fn transform_is_idempotent() {
    let design = load("eurorack_vco.json");
    let first = transform(&design, &LayoutConfig::default());
    let second = transform(&design, &LayoutConfig::default());
    assert_eq!(first, second);
}

#[test]
fn output_ignores_json_key_order() {
    let input = fs::read_to_string(fixture_path("voice_chain.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&input).unwrap();

    // rebuild every object with its keys reversed
    fn reverse_keys(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Object(map) => {
                let fields: Vec<String> = map
                    .iter()
                    .rev()
                    .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), reverse_keys(v)))
                    .collect();
                format!("{{{}}}", fields.join(","))
            }
            serde_json::Value::Array(items) => {
                let items: Vec<String> = items.iter().map(reverse_keys).collect();
                format!("[{}]", items.join(","))
            }
            other => other.to_string(),
        }
    }
    let reordered = reverse_keys(&value);
    assert_ne!(reordered, input);

    let config = LayoutConfig::default();
    let a = render_payload(&input, &config).unwrap().to_json().unwrap();
    let b = render_payload(&reordered, &config).unwrap().to_json().unwrap();
    assert_eq!(a, b);
}

#[test]
fn renaming_a_block_keeps_node_and_edge_ids() {
    let design = load("voice_chain.json");
    let mut renamed = design.clone();
    renamed.blocks[1].name = "Ladder Filter".to_string();
    let a = transform(&design, &LayoutConfig::default());
    let b = transform(&renamed, &LayoutConfig::default());
    for (x, y) in a.graph.nodes.iter().zip(&b.graph.nodes) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.position, y.position);
    }
    for (x, y) in a.graph.edges.iter().zip(&b.graph.edges) {
        assert_eq!(x.id, y.id);
    }
    assert_eq!(b.graph.nodes[1].data.label, "Ladder Filter");
}

#[test]
fn classifier_always_answers() {
    let cv = classify("cv_signal");
    assert_eq!(cv.category, SignalCategory::ControlVoltage);
    let unknown = classify("unknown_tag_123");
    assert_eq!(unknown.category, SignalCategory::Other);
    assert_eq!(unknown.color, SignalCategory::Other.color());
    assert_ne!(cv.color, unknown.color);
}

#[test]
fn missing_top_level_fields_are_fatal() {
    let config = LayoutConfig::default();
    assert_eq!(
        render_payload(r#"{"signal_flow": []}"#, &config).unwrap_err(),
        DesignError::MissingField("blocks")
    );
    assert_eq!(
        render_payload(r#"{"blocks": []}"#, &config).unwrap_err(),
        DesignError::MissingField("signal_flow")
    );
    let err = render_payload(r#"{"blocks": 3, "signal_flow": []}"#, &config).unwrap_err();
    assert!(err.to_string().contains("'blocks'"));
    assert!(matches!(
        render_payload("not json at all", &config),
        Err(DesignError::Parse(_))
    ));
}

#[test]
fn empty_design_is_well_formed() {
    let payload = render_payload(r#"{"blocks": [], "signal_flow": []}"#, &LayoutConfig::default())
        .unwrap();
    assert!(payload.nodes.is_empty());
    assert!(payload.edges.is_empty());
    assert_eq!(payload.layer_count, 0);
    assert_eq!(payload.legend.len(), SignalCategory::ALL.len());
}

#[test]
fn extracts_lenient_design_from_model_prose() {
    let text = fs::read_to_string(fixture_path("model_response.txt")).unwrap();
    let json = extract_design_json(&text).unwrap();
    assert!(json.starts_with('{') && json.ends_with('}'));
    let design = CircuitDesign::from_json(json).unwrap();
    assert_eq!(design.info.name, "Noise Source");
    let out = transform(&design, &LayoutConfig::default());
    assert_eq!(out.graph.edges.len(), 1);
    assert!(out.warnings.is_empty());
    assert_eq!(
        extract_design_json("no braces here").unwrap_err(),
        DesignError::NoJsonObject
    );
}

#[test]
fn svg_preview_covers_the_whole_design() {
    let design = load("eurorack_vco.json");
    let config = Config::default();
    let payload = transform(&design, &config.layout).into_payload(design.info.clone());
    let svg = render_svg(&payload, &config.theme, &config.layout, &config.render);
    for name in ["Power Entry", "Expo Converter", "Triangle Core", "Waveshaper", "Output Buffer"] {
        assert!(svg.contains(name), "missing {name}");
    }
    assert!(svg.contains("+12V"));
    assert!(svg.contains("-12V"));
    assert!(svg.contains("Eurorack VCO (±12V)"));
    assert!(svg.contains("stroke-dasharray"));
}

#[test]
fn payload_json_matches_diagram_surface() {
    let input = fs::read_to_string(fixture_path("voice_chain.json")).unwrap();
    let payload = render_payload(&input, &LayoutConfig::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
    let node = &value["nodes"][1];
    assert_eq!(node["id"], "block-1");
    assert_eq!(node["type"], "circuitBlock");
    assert_eq!(node["data"]["block"]["name"], "Filter");
    assert_eq!(node["data"]["ports"]["inputs"][0]["handleId"], "input-0");
    let edge = &value["edges"][0];
    assert_eq!(edge["source"], "block-0");
    assert_eq!(edge["targetHandle"], "input-0");
    assert_eq!(edge["signalType"], "audio_signal");
    assert_eq!(edge["category"], "audio");
    assert_eq!(edge["animated"], false);
    assert_eq!(edge["label"], "raw oscillator output");
    assert_eq!(value["info"]["supply_voltage"], "±12V");
}

const SIGNALS: [&str; 4] = ["audio_signal", "cv_signal", "gate_signal", "sync_signal"];

/// Chain of stages with extra skip and return connections, some of them
/// repeated or pointing at missing blocks.
fn dense_design(blocks: usize, extra: usize) -> CircuitDesign {
    let ports = |prefix: &str| -> Vec<Port> {
        SIGNALS
            .iter()
            .enumerate()
            .map(|(i, s)| Port {
                signal_type: s.to_string(),
                name: format!("{prefix}{i}"),
                ..Default::default()
            })
            .collect()
    };
    let block_list = (0..blocks)
        .map(|i| BlockSpec {
            id: Some(format!("b{i}")),
            name: format!("Stage {i}"),
            inputs: ports("IN"),
            outputs: ports("OUT"),
            ..Default::default()
        })
        .collect();
    let link = |signal: &str, from: String, to: String| Connection {
        signal_type: signal.to_string(),
        from_block: from,
        to_block: to,
        ..Default::default()
    };
    let mut flow: Vec<Connection> = (1..blocks)
        .map(|i| link("audio_signal", format!("b{}", i - 1), format!("b{i}")))
        .collect();
    for n in 0..extra {
        let from = (n * 7) % blocks;
        let to = (n * 3 + 1) % blocks;
        let signal = SIGNALS[n % SIGNALS.len()];
        let target = if n % 11 == 0 {
            "missing".to_string()
        } else {
            format!("b{to}")
        };
        flow.push(link(signal, format!("b{from}"), target));
    }
    CircuitDesign {
        blocks: block_list,
        signal_flow: flow,
        ..Default::default()
    }
}

/// Every edge leaves through a declared output, and no output carries more
/// edges than declared connections that resolve to it.
fn assert_output_fan_out_bounded(design: &CircuitDesign) {
    let out = transform(design, &LayoutConfig::default());

    let index = BlockIndex::build(&design.blocks, &mut Vec::new());
    let mut declared: HashMap<(usize, usize), usize> = HashMap::new();
    for conn in &design.signal_flow {
        let Some(block) = index.get(&conn.from_block) else {
            continue;
        };
        let ports = BlockPorts::resolve(&design.blocks[block]);
        let port = match &conn.from_port {
            Some(port_ref) => ports.find(PortDirection::Output, port_ref),
            None => ports.find_for_signal(PortDirection::Output, &conn.signal_type),
        };
        if let Some(port) = port {
            *declared.entry((block, port.handle_index)).or_default() += 1;
        }
    }

    let mut drawn: HashMap<(usize, usize), usize> = HashMap::new();
    for edge in &out.graph.edges {
        let handle: usize = edge
            .source_handle
            .strip_prefix("output-")
            .and_then(|n| n.parse().ok())
            .expect("output handle id");
        assert_eq!(edge.source, format!("block-{}", edge.source_index));
        assert!(
            handle < design.blocks[edge.source_index].outputs.len(),
            "{} leaves through undeclared {}",
            edge.id,
            edge.source_handle
        );
        *drawn.entry((edge.source_index, handle)).or_default() += 1;
    }

    for (port, count) in drawn {
        let allowed = declared.get(&port).copied().unwrap_or(0);
        assert!(count <= allowed, "{port:?}: {count} edges, {allowed} declared");
    }
}

#[test]
fn output_fan_out_is_bounded_by_declarations() {
    assert_output_fan_out_bounded(&load("eurorack_vco.json"));
    assert_output_fan_out_bounded(&load("feedback_loop.json"));
    assert_output_fan_out_bounded(&dense_design(20, 40));
    assert_output_fan_out_bounded(&dense_design(120, 300));
}

#[test]
fn dense_design_keeps_its_structure() {
    let design = dense_design(60, 120);
    let out = transform(&design, &LayoutConfig::default());
    assert_eq!(out.graph.nodes.len(), 60);
    assert!(out.graph.edges.len() <= design.signal_flow.len());
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::DanglingConnection { .. })));
    let mut ids: Vec<&str> = out.graph.edges.iter().map(|e| e.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), out.graph.edges.len());
}

#[test]
fn null_fields_degrade_to_warnings() {
    let input = r#"{
        "circuit_info": {"name": null, "categories": null},
        "blocks": [
            {"id": "src", "name": null, "function": "source", "inputs": null,
             "outputs": [{"signal_type": "audio_signal", "name": "OUT"}],
             "components": null, "parameters": {"taps": [1, 2], "trim": null}},
            {"id": "dst", "name": "Sink", "function": "sink",
             "inputs": [{"signal_type": "audio_signal", "name": "IN"}], "outputs": null}
        ],
        "signal_flow": [
            {"signal_type": "audio_signal", "from_block": "src", "to_block": "dst"},
            {"signal_type": null, "from_block": null, "to_block": "dst"}
        ]
    }"#;
    let payload = render_payload(input, &LayoutConfig::default()).expect("nulls are tolerated");
    assert_eq!(payload.nodes.len(), 2);
    assert_eq!(payload.edges.len(), 1);
    assert_eq!(payload.warnings.len(), 1);
    assert!(matches!(
        payload.warnings[0],
        Warning::DanglingConnection { .. }
    ));
    let config = Config::default();
    let svg = render_svg(&payload, &config.theme, &config.layout, &config.render);
    assert!(svg.contains("taps: [1,2]"));
}
