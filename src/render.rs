//! Hand-off to the diagram surface.
//!
//! [`RenderPayload`] is what the interactive widget consumes: laid-out nodes,
//! styled edges, the fixed legend, and the structural warnings. The SVG
//! preview is a static rendering of the same payload for the CLI.

use crate::config::RenderConfig;
use crate::design::{BlockSpec, CircuitInfo};
use crate::graph::{CircuitGraph, GraphEdge, GraphNode, Position};
use crate::layout::{Layering, LayoutConfig};
use crate::signal::{LegendEntry, SignalCategory, legend, power_rail_label};
use crate::theme::Theme;
use crate::validate::Warning;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

const FLAGGED_DASH: &str = "6 4";
const CHAR_WIDTH_RATIO: f32 = 0.56;
const HEADER_HEIGHT: f32 = 64.0;
const CARD_PARAMETERS: usize = 2;
const LEGEND_ROW: f32 = 20.0;
const LEGEND_WIDTH: f32 = 150.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: &'static str,
    pub stroke_width: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_dasharray: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    #[serde(flatten)]
    pub edge: GraphEdge,
    pub animated: bool,
    /// Edge was ignored for layering because it closes a cycle.
    pub feedback: bool,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub info: CircuitInfo,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<RenderEdge>,
    pub legend: Vec<LegendEntry>,
    pub warnings: Vec<Warning>,
    pub layer_count: usize,
}

impl RenderPayload {
    pub fn new(
        info: CircuitInfo,
        graph: CircuitGraph,
        layering: &Layering,
        warnings: Vec<Warning>,
    ) -> Self {
        let edges = graph
            .edges
            .into_iter()
            .enumerate()
            .map(|(idx, edge)| {
                let style = EdgeStyle {
                    stroke: edge.color,
                    stroke_width: 2.0,
                    stroke_dasharray: edge.flagged.then_some(FLAGGED_DASH),
                };
                RenderEdge {
                    animated: edge.category.is_event(),
                    feedback: layering.is_feedback(idx),
                    style,
                    edge,
                }
            })
            .collect();
        Self {
            info,
            nodes: graph.nodes,
            edges,
            legend: legend(),
            warnings,
            layer_count: layering.layer_count,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Copy)]
struct Card {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    /// Implementation and parameter lines drawn above the ports.
    detail_rows: usize,
}

impl Card {
    fn details_y(&self, config: &LayoutConfig) -> f32 {
        self.y + config.node_base_height - 12.0
    }

    fn port_y(&self, index: usize, config: &LayoutConfig) -> f32 {
        self.details_y(config)
            + (self.detail_rows as f32 + index as f32 + 0.5) * config.port_row_height
    }
}

pub fn render_svg(
    payload: &RenderPayload,
    theme: &Theme,
    config: &LayoutConfig,
    render: &RenderConfig,
) -> String {
    let header = if payload.info.name.trim().is_empty() {
        0.0
    } else {
        HEADER_HEIGHT
    };
    let cards = place_cards(&payload.nodes, config, render.padding, header);
    let content_right = cards
        .iter()
        .map(|card| card.x + card.width)
        .fold(0.0f32, f32::max);
    let content_bottom = cards
        .iter()
        .map(|card| card.y + card.height)
        .fold(header, f32::max);
    let loop_depth = if payload.edges.iter().any(|edge| edge.feedback) {
        60.0
    } else {
        0.0
    };
    let legend_height = if render.show_legend {
        payload.legend.len() as f32 * LEGEND_ROW + 36.0
    } else {
        0.0
    };
    let width = (content_right + render.padding)
        .max(LEGEND_WIDTH + 2.0 * render.padding)
        .max(200.0);
    let height = (content_bottom + loop_depth + render.padding + legend_height).max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        render.background
    ));

    svg.push_str("<defs>");
    for category in SignalCategory::ALL {
        svg.push_str(&format!(
            "<marker id=\"arrow-{}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            category.slug(),
            category.color()
        ));
    }
    svg.push_str("</defs>");

    if header > 0.0 {
        svg.push_str(&header_svg(payload, theme, render.padding));
    }

    let loop_floor = content_bottom + loop_depth * 0.75;
    let label_positions = compute_edge_label_positions(&payload.edges, &cards, config, theme);
    for (idx, edge) in payload.edges.iter().enumerate() {
        let (Some(source), Some(target)) = (
            cards.get(edge.edge.source_index),
            cards.get(edge.edge.target_index),
        ) else {
            continue;
        };
        let start = (
            source.x + source.width,
            source.port_y(handle_index(&edge.edge.source_handle), config),
        );
        let end = (
            target.x,
            target.port_y(handle_index(&edge.edge.target_handle), config),
        );
        let d = if edge.feedback || end.0 <= start.0 {
            loop_path(start, end, loop_floor)
        } else {
            bezier_path(start, end)
        };
        let dash = edge
            .style
            .stroke_dasharray
            .map(|dash| format!(" stroke-dasharray=\"{dash}\""))
            .unwrap_or_default();
        svg.push_str(&format!(
            "<path d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{dash} marker-end=\"url(#arrow-{})\"><title>{}</title></path>",
            edge.style.stroke,
            edge.style.stroke_width,
            edge.edge.category.slug(),
            escape_xml(&edge.edge.signal_type)
        ));

        if let Some((x, y, text)) = label_positions.get(&idx) {
            let fill = if edge.edge.flagged {
                theme.flagged_color.as_str()
            } else {
                theme.muted_text_color.as_str()
            };
            svg.push_str(&format!(
                "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{:.1}\" fill=\"{fill}\">{}</text>",
                theme.font_family,
                theme.font_size * 0.8,
                escape_xml(text)
            ));
        }
    }

    for (node, card) in payload.nodes.iter().zip(&cards) {
        svg.push_str(&node_svg(node, card, theme, config));
    }

    if render.show_legend {
        let legend_y = content_bottom + loop_depth + render.padding * 0.5;
        svg.push_str(&legend_svg(&payload.legend, theme, render.padding, legend_y));
    }

    svg.push_str("</svg>");
    svg
}

fn place_cards(
    nodes: &[GraphNode],
    config: &LayoutConfig,
    padding: f32,
    header: f32,
) -> Vec<Card> {
    let min = nodes.iter().fold(None, |acc: Option<Position>, node| {
        Some(match acc {
            None => node.position,
            Some(min) => Position {
                x: min.x.min(node.position.x),
                y: min.y.min(node.position.y),
            },
        })
    });
    let min = min.unwrap_or(Position::ORIGIN);
    nodes
        .iter()
        .map(|node| {
            let rows = node
                .data
                .ports
                .inputs
                .len()
                .max(node.data.ports.outputs.len());
            let detail_rows = card_details(&node.data.block).len();
            Card {
                x: node.position.x - min.x + padding,
                y: node.position.y - min.y + padding + header,
                width: config.node_width,
                height: config.node_height(rows) + detail_rows as f32 * config.port_row_height,
                detail_rows,
            }
        })
        .collect()
}

fn handle_index(handle: &str) -> usize {
    handle
        .rsplit('-')
        .next()
        .and_then(|idx| idx.parse().ok())
        .unwrap_or(0)
}

fn bezier_path(start: (f32, f32), end: (f32, f32)) -> String {
    let dx = ((end.0 - start.0) / 2.0).max(40.0);
    format!(
        "M {:.2} {:.2} C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}",
        start.0,
        start.1,
        start.0 + dx,
        start.1,
        end.0 - dx,
        end.1,
        end.0,
        end.1
    )
}

/// Feedback edges leave to the right, run under the diagram, and come back
/// in from the left.
fn loop_path(start: (f32, f32), end: (f32, f32), floor: f32) -> String {
    format!(
        "M {:.2} {:.2} C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2} S {:.2} {:.2}, {:.2} {:.2}",
        start.0,
        start.1,
        start.0 + 60.0,
        start.1,
        start.0 + 60.0,
        floor,
        (start.0 + end.0) / 2.0,
        floor,
        end.0 - 60.0,
        end.1,
        end.0,
        end.1
    )
}

/// Implementation line, then the first parameters in key order.
fn card_details(block: &BlockSpec) -> Vec<String> {
    let implementation = block
        .implementation
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    implementation
        .into_iter()
        .chain(
            block
                .parameters
                .iter()
                .take(CARD_PARAMETERS)
                .map(|(key, value)| format!("{key}: {value}")),
        )
        .collect()
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn header_svg(payload: &RenderPayload, theme: &Theme, padding: f32) -> String {
    let info = &payload.info;
    let mut title = info.name.clone();
    if let Some(supply) = info.supply_voltage.as_deref().filter(|s| !s.trim().is_empty()) {
        title.push_str(&format!(" ({supply})"));
    }
    let mut out = format!(
        "<text x=\"{padding:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" font-weight=\"600\" fill=\"{}\">{}</text>",
        padding + theme.font_size * 1.3,
        theme.font_family,
        theme.font_size * 1.3,
        theme.title_color,
        escape_xml(&title)
    );
    if !info.description.trim().is_empty() {
        out.push_str(&format!(
            "<text x=\"{padding:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" fill=\"{}\">{}</text>",
            padding + theme.font_size * 2.8,
            theme.font_family,
            theme.font_size * 0.85,
            theme.muted_text_color,
            escape_xml(&info.description)
        ));
    }
    let mut summary: Vec<String> = Vec::new();
    let categories: Vec<&str> = info
        .categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !categories.is_empty() {
        summary.push(categories.join(", "));
    }
    summary.push(plural(payload.nodes.len(), "block"));
    summary.push(plural(payload.edges.len(), "connection"));
    out.push_str(&format!(
        "<text x=\"{padding:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" fill=\"{}\">{}</text>",
        padding + theme.font_size * 4.1,
        theme.font_family,
        theme.font_size * 0.8,
        theme.muted_text_color,
        escape_xml(&summary.join(" · "))
    ));
    out
}

fn node_svg(node: &GraphNode, card: &Card, theme: &Theme, config: &LayoutConfig) -> String {
    let mut out = format!(
        "<g id=\"{}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
        escape_xml(&node.id),
        card.x,
        card.y,
        card.width,
        card.height,
        theme.node_fill,
        theme.node_border
    );
    let max_chars = (card.width - 24.0) / (theme.font_size * CHAR_WIDTH_RATIO);
    let max_chars = max_chars.max(4.0) as usize;
    out.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" font-weight=\"600\" fill=\"{}\">{}</text>",
        card.x + 12.0,
        card.y + 24.0,
        theme.font_family,
        theme.font_size,
        theme.title_color,
        escape_xml(&truncate(&node.data.label, max_chars))
    ));
    let small = theme.font_size * 0.8;
    let small_chars = (max_chars as f32 / 0.8) as usize;
    for (line_idx, line) in wrap_lines(&node.data.block.function, small_chars, 2)
        .iter()
        .enumerate()
    {
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{small:.1}\" fill=\"{}\">{}</text>",
            card.x + 12.0,
            card.y + 46.0 + line_idx as f32 * small * 1.3,
            theme.font_family,
            theme.text_color,
            escape_xml(line)
        ));
    }

    let details_y = card.details_y(config);
    for (row, line) in card_details(&node.data.block).iter().enumerate() {
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{small:.1}\" font-style=\"italic\" fill=\"{}\">{}</text>",
            card.x + 12.0,
            details_y + (row as f32 + 0.5) * config.port_row_height + small * 0.35,
            theme.font_family,
            theme.muted_text_color,
            escape_xml(&truncate(line, small_chars))
        ));
    }

    let half_chars = small_chars / 2;
    for port in &node.data.ports.inputs {
        let y = card.port_y(port.handle_index, config);
        out.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{y:.2}\" r=\"4\" fill=\"{}\" stroke=\"#FFFFFF\" stroke-width=\"1.5\"/>",
            card.x, port.color
        ));
        let marker = if port.required { "*" } else { "" };
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{small:.1}\" fill=\"{}\">{}{marker}</text>",
            card.x + 10.0,
            y + small * 0.35,
            theme.font_family,
            theme.muted_text_color,
            escape_xml(&truncate(port.label(), half_chars))
        ));
    }
    for port in &node.data.ports.outputs {
        let y = card.port_y(port.handle_index, config);
        let x = card.x + card.width;
        out.push_str(&format!(
            "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"4\" fill=\"{}\" stroke=\"#FFFFFF\" stroke-width=\"1.5\"/>",
            port.color
        ));
        let label = power_rail_label(&port.signal_type)
            .filter(|_| port.name.trim().is_empty())
            .unwrap_or_else(|| port.label().to_string());
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-family=\"{}\" font-size=\"{small:.1}\" fill=\"{}\">{}</text>",
            x - 10.0,
            y + small * 0.35,
            theme.font_family,
            theme.muted_text_color,
            escape_xml(&truncate(&label, half_chars))
        ));
    }
    out.push_str("</g>");
    out
}

fn legend_svg(entries: &[LegendEntry], theme: &Theme, x: f32, y: f32) -> String {
    let height = entries.len() as f32 * LEGEND_ROW + 28.0;
    let mut out = format!(
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{LEGEND_WIDTH:.2}\" height=\"{height:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\"/>",
        theme.legend_background, theme.legend_border
    );
    out.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" font-weight=\"600\" fill=\"{}\">Signal Types</text>",
        x + 10.0,
        y + 18.0,
        theme.font_family,
        theme.font_size * 0.85,
        theme.title_color
    ));
    for (idx, entry) in entries.iter().enumerate() {
        let row_y = y + 34.0 + idx as f32 * LEGEND_ROW;
        out.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{row_y:.2}\" x2=\"{:.2}\" y2=\"{row_y:.2}\" stroke=\"{}\" stroke-width=\"3\"/>",
            x + 10.0,
            x + 26.0,
            entry.color
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.1}\" fill=\"{}\">{}</text>",
            x + 34.0,
            row_y + 4.0,
            theme.font_family,
            theme.font_size * 0.8,
            theme.text_color,
            entry.label
        ));
    }
    out
}

/// Place edge descriptions at their midpoints, nudging down on overlap.
fn compute_edge_label_positions(
    edges: &[RenderEdge],
    cards: &[Card],
    config: &LayoutConfig,
    theme: &Theme,
) -> HashMap<usize, (f32, f32, String)> {
    let font_size = theme.font_size * 0.8;
    let mut occupied: Vec<(f32, f32, f32, f32)> = Vec::new();
    let mut positions = HashMap::new();

    for (idx, edge) in edges.iter().enumerate() {
        let Some(text) = edge.edge.label.as_deref().filter(|l| !l.trim().is_empty()) else {
            continue;
        };
        if edge.feedback {
            continue;
        }
        let (Some(source), Some(target)) = (
            cards.get(edge.edge.source_index),
            cards.get(edge.edge.target_index),
        ) else {
            continue;
        };
        let gap = (target.x - source.x - source.width).max(0.0);
        let max_chars = ((gap - 8.0) / (font_size * CHAR_WIDTH_RATIO)).max(6.0) as usize;
        let text = truncate(text, max_chars);
        let width = text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO;
        let mid_x = (source.x + source.width + target.x) / 2.0;
        let mid_y = (source.port_y(handle_index(&edge.edge.source_handle), config)
            + target.port_y(handle_index(&edge.edge.target_handle), config))
            / 2.0
            - 6.0;
        let mut offset = 0.0;
        let mut placed = (mid_x, mid_y);
        for _ in 0..6 {
            let rect = (mid_x - width / 2.0, mid_y + offset - font_size, width, font_size * 1.2);
            if !collides(&rect, &occupied) {
                occupied.push(rect);
                placed = (mid_x, mid_y + offset);
                break;
            }
            offset += font_size * 1.4;
        }
        positions.insert(idx, (placed.0, placed.1, text));
    }

    positions
}

fn collides(rect: &(f32, f32, f32, f32), occupied: &[(f32, f32, f32, f32)]) -> bool {
    occupied.iter().any(|(x, y, w, h)| {
        rect.0 < x + w && rect.0 + rect.2 > *x && rect.1 < y + h && rect.1 + rect.3 > *y
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars || max_chars == 0 {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn wrap_lines(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = current.chars().count() + word.chars().count() + 1;
        if !current.is_empty() && candidate_len > max_chars {
            lines.push(std::mem::take(&mut current));
            if lines.len() == max_lines {
                break;
            }
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if lines.len() < max_lines && !current.is_empty() {
        lines.push(current);
    } else if lines.len() == max_lines {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('…') {
                *last = truncate(&format!("{last}…"), max_chars);
            }
        }
    }
    lines
        .into_iter()
        .map(|line| truncate(&line, max_chars))
        .collect()
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

pub fn write_output_json(payload: &RenderPayload, output: Option<&Path>) -> Result<()> {
    let json = payload.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}

/// Rasterize the preview, scaled to fit `render_cfg.width` x `render_cfg.height`.
#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size();
    let scale = fit_scale(size.width(), size.height(), render_cfg);
    let width = (size.width() * scale).round().max(1.0) as u32;
    let height = (size.height() * scale).round().max(1.0) as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap_mut,
    );
    pixmap.save_png(output)?;
    Ok(())
}

/// Uniform scale that fits a `width` x `height` drawing inside the
/// configured canvas. Non-positive canvas sides leave the drawing as is.
#[cfg(feature = "png")]
fn fit_scale(width: f32, height: f32, render_cfg: &RenderConfig) -> f32 {
    if width <= 0.0 || height <= 0.0 || render_cfg.width <= 0.0 || render_cfg.height <= 0.0 {
        return 1.0;
    }
    (render_cfg.width / width).min(render_cfg.height / height)
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
