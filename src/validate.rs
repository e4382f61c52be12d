//! Cross-checks the declared signal flow against declared blocks and ports.
//!
//! Nothing here is fatal. Connections that cannot be resolved are dropped
//! with a warning; connections whose signal types disagree are kept and
//! flagged.

use crate::design::{BlockSpec, Connection, PortRef};
use crate::ports::{BlockPorts, PortDirection, ResolvedPort};
use crate::signal::signal_types_match;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Resolved `(block index, port handle index)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Endpoint {
    pub block: usize,
    pub port: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConnection {
    /// Position of the entry in `signal_flow`.
    pub flow_index: usize,
    pub source: Endpoint,
    pub target: Endpoint,
    pub signal_type: String,
    pub description: Option<String>,
    pub mismatch: bool,
}

impl ValidatedConnection {
    pub fn is_self_loop(&self) -> bool {
        self.source.block == self.target.block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSide {
    Source,
    Target,
}

impl EndpointSide {
    fn direction(self) -> PortDirection {
        match self {
            EndpointSide::Source => PortDirection::Output,
            EndpointSide::Target => PortDirection::Input,
        }
    }
}

impl fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSide::Source => f.write_str("source"),
            EndpointSide::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DanglingReason {
    UnknownBlock,
    NoPorts,
    UnknownPort,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Warning {
    DanglingConnection {
        index: usize,
        endpoint: EndpointSide,
        block: String,
        port: Option<String>,
        reason: DanglingReason,
    },
    SignalTypeMismatch {
        index: usize,
        declared: String,
        source_type: String,
        target_type: String,
    },
    DuplicateBlockId {
        id: String,
        first: usize,
        duplicate: usize,
    },
    DuplicateConnection {
        index: usize,
        first: usize,
    },
    UnconnectedRequiredInput {
        block: String,
        port: String,
    },
    /// A declared id spells another block's positional node id, so that
    /// node id no longer reaches it.
    ShadowedNodeId {
        id: String,
        block: usize,
        shadowed: usize,
    },
}

impl Warning {
    /// Signal-flow entry this warning is about, if any.
    pub fn flow_index(&self) -> Option<usize> {
        match self {
            Warning::DanglingConnection { index, .. }
            | Warning::SignalTypeMismatch { index, .. }
            | Warning::DuplicateConnection { index, .. } => Some(*index),
            Warning::DuplicateBlockId { .. }
            | Warning::UnconnectedRequiredInput { .. }
            | Warning::ShadowedNodeId { .. } => None,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DanglingConnection {
                index,
                endpoint,
                block,
                port,
                reason,
            } => {
                let port = port.as_deref().unwrap_or("(any)");
                match reason {
                    DanglingReason::UnknownBlock => write!(
                        f,
                        "signal flow {index}: {endpoint} block '{block}' not found"
                    ),
                    DanglingReason::NoPorts => write!(
                        f,
                        "signal flow {index}: {endpoint} block '{block}' declares no {} ports",
                        endpoint.direction().handle_prefix()
                    ),
                    DanglingReason::UnknownPort => write!(
                        f,
                        "signal flow {index}: {endpoint} port {port} not found on block '{block}'"
                    ),
                }
            }
            Warning::SignalTypeMismatch {
                index,
                declared,
                source_type,
                target_type,
            } => write!(
                f,
                "signal flow {index}: carries '{declared}' but connects '{source_type}' output to '{target_type}' input"
            ),
            Warning::DuplicateBlockId {
                id,
                first,
                duplicate,
            } => write!(
                f,
                "duplicate block id '{id}' (blocks {first} and {duplicate}); block {first} is used"
            ),
            Warning::DuplicateConnection { index, first } => write!(
                f,
                "signal flow {index}: repeats signal flow {first} and is ignored"
            ),
            Warning::UnconnectedRequiredInput { block, port } => {
                write!(f, "required input '{port}' on block '{block}' is not connected")
            }
            Warning::ShadowedNodeId {
                id,
                block,
                shadowed,
            } => write!(
                f,
                "block {block} declares id '{id}', which hides block {shadowed} from positional references"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    pub edges: Vec<ValidatedConnection>,
    pub warnings: Vec<Warning>,
}

/// Lookup from connection block references to block indices.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    keys: HashMap<String, usize>,
    len: usize,
}

impl BlockIndex {
    pub fn build(blocks: &[BlockSpec], warnings: &mut Vec<Warning>) -> Self {
        let mut keys: HashMap<String, usize> = HashMap::new();
        for (idx, block) in blocks.iter().enumerate() {
            let Some(id) = block.explicit_id() else {
                continue;
            };
            if let Some(first) = keys.get(id) {
                record(
                    warnings,
                    Warning::DuplicateBlockId {
                        id: id.to_string(),
                        first: *first,
                        duplicate: idx,
                    },
                );
                continue;
            }
            if let Some(shadowed) = positional(id, blocks.len()).filter(|n| *n != idx) {
                record(
                    warnings,
                    Warning::ShadowedNodeId {
                        id: id.to_string(),
                        block: idx,
                        shadowed,
                    },
                );
            }
            keys.insert(id.to_string(), idx);
        }
        Self {
            keys,
            len: blocks.len(),
        }
    }

    /// Resolve a block reference: declared id first, then the positional
    /// `block-<n>` node id.
    pub fn get(&self, reference: &str) -> Option<usize> {
        let reference = reference.trim();
        if let Some(idx) = self.keys.get(reference) {
            return Some(*idx);
        }
        positional(reference, self.len)
    }
}

fn positional(reference: &str, len: usize) -> Option<usize> {
    reference
        .strip_prefix("block-")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|idx| *idx < len)
}

pub fn validate(blocks: &[BlockSpec], signal_flow: &[Connection]) -> Validation {
    let ports: Vec<BlockPorts> = blocks.iter().map(BlockPorts::resolve).collect();
    validate_with_ports(blocks, &ports, signal_flow)
}

/// Same as [`validate`] for callers that already resolved every block's ports.
pub fn validate_with_ports(
    blocks: &[BlockSpec],
    ports: &[BlockPorts],
    signal_flow: &[Connection],
) -> Validation {
    let mut warnings = Vec::new();
    let index = BlockIndex::build(blocks, &mut warnings);
    let mut edges: Vec<ValidatedConnection> = Vec::with_capacity(signal_flow.len());
    let mut seen: HashMap<(Endpoint, Endpoint), usize> = HashMap::new();

    for (flow_index, conn) in signal_flow.iter().enumerate() {
        let source = resolve_endpoint(
            &index,
            ports,
            flow_index,
            EndpointSide::Source,
            &conn.from_block,
            conn.from_port.as_ref(),
            &conn.signal_type,
        );
        let target = resolve_endpoint(
            &index,
            ports,
            flow_index,
            EndpointSide::Target,
            &conn.to_block,
            conn.to_port.as_ref(),
            &conn.signal_type,
        );
        let (source, target) = match (source, target) {
            (Ok(source), Ok(target)) => (source, target),
            (source, target) => {
                for warning in [source.err(), target.err()].into_iter().flatten() {
                    record(&mut warnings, warning);
                }
                continue;
            }
        };

        let source_end = Endpoint {
            block: source.0,
            port: source.1.handle_index,
        };
        let target_end = Endpoint {
            block: target.0,
            port: target.1.handle_index,
        };
        if let Some(first) = seen.get(&(source_end, target_end)) {
            record(
                &mut warnings,
                Warning::DuplicateConnection {
                    index: flow_index,
                    first: *first,
                },
            );
            continue;
        }
        seen.insert((source_end, target_end), flow_index);

        let declared = if conn.signal_type.trim().is_empty() {
            source.1.signal_type.clone()
        } else {
            conn.signal_type.clone()
        };
        let mismatch = !agrees(&declared, &source.1.signal_type)
            || !agrees(&declared, &target.1.signal_type);
        if mismatch {
            record(
                &mut warnings,
                Warning::SignalTypeMismatch {
                    index: flow_index,
                    declared: declared.clone(),
                    source_type: source.1.signal_type.clone(),
                    target_type: target.1.signal_type.clone(),
                },
            );
        }

        edges.push(ValidatedConnection {
            flow_index,
            source: source_end,
            target: target_end,
            signal_type: declared,
            description: conn.description.clone(),
            mismatch,
        });
    }

    for (block_idx, block_ports) in ports.iter().enumerate() {
        for port in block_ports.required_inputs() {
            let fed = edges
                .iter()
                .any(|edge| edge.target.block == block_idx && edge.target.port == port.handle_index);
            if !fed {
                record(
                    &mut warnings,
                    Warning::UnconnectedRequiredInput {
                        block: blocks[block_idx].key(block_idx).into_owned(),
                        port: port.label().to_string(),
                    },
                );
            }
        }
    }

    tracing::debug!(
        declared = signal_flow.len(),
        kept = edges.len(),
        warnings = warnings.len(),
        "validated signal flow"
    );

    Validation { edges, warnings }
}

/// An untyped side never conflicts.
fn agrees(declared: &str, port_type: &str) -> bool {
    declared.trim().is_empty() || port_type.trim().is_empty() || signal_types_match(declared, port_type)
}

fn resolve_endpoint<'p>(
    index: &BlockIndex,
    ports: &'p [BlockPorts],
    flow_index: usize,
    side: EndpointSide,
    block_ref: &str,
    port_ref: Option<&PortRef>,
    signal_type: &str,
) -> Result<(usize, &'p ResolvedPort), Warning> {
    let dangling = |reason| Warning::DanglingConnection {
        index: flow_index,
        endpoint: side,
        block: block_ref.to_string(),
        port: port_ref.map(|p| p.to_string()),
        reason,
    };
    let block = index
        .get(block_ref)
        .ok_or_else(|| dangling(DanglingReason::UnknownBlock))?;
    let block_ports = &ports[block];
    let direction = side.direction();
    if !block_ports.has_anchor(direction) {
        return Err(dangling(DanglingReason::NoPorts));
    }
    let port = match port_ref {
        Some(port_ref) => block_ports.find(direction, port_ref),
        None => block_ports.find_for_signal(direction, signal_type),
    }
    .ok_or_else(|| dangling(DanglingReason::UnknownPort))?;
    Ok((block, port))
}

fn record(warnings: &mut Vec<Warning>, warning: Warning) {
    tracing::warn!(kind = warning_kind(&warning), "{warning}");
    warnings.push(warning);
}

fn warning_kind(warning: &Warning) -> &'static str {
    match warning {
        Warning::DanglingConnection { .. } => "DanglingConnection",
        Warning::SignalTypeMismatch { .. } => "SignalTypeMismatch",
        Warning::DuplicateBlockId { .. } => "DuplicateBlockId",
        Warning::DuplicateConnection { .. } => "DuplicateConnection",
        Warning::UnconnectedRequiredInput { .. } => "UnconnectedRequiredInput",
        Warning::ShadowedNodeId { .. } => "ShadowedNodeId",
    }
}
