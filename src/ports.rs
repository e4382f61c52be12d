//! Port resolution: ordered, handle-annotated port lists per block.

use crate::design::{BlockSpec, Port, PortRef};
use crate::signal::{SignalCategory, classify, signal_types_match};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn handle_prefix(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }

    pub fn handle_id(self, index: usize) -> String {
        format!("{}-{}", self.handle_prefix(), index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPort {
    pub handle_index: usize,
    pub handle_id: String,
    pub name: String,
    pub signal_type: String,
    pub description: String,
    pub required: bool,
    pub category: SignalCategory,
    pub color: &'static str,
}

impl ResolvedPort {
    fn new(direction: PortDirection, index: usize, port: &Port) -> Self {
        let class = classify(&port.signal_type);
        Self {
            handle_index: index,
            handle_id: direction.handle_id(index),
            name: port.name.clone(),
            signal_type: port.signal_type.clone(),
            description: port.description.clone(),
            // Only inputs can be required.
            required: direction == PortDirection::Input && port.required,
            category: class.category,
            color: class.color,
        }
    }

    /// Label shown on the diagram; unnamed ports fall back to their tag.
    pub fn label(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else if !self.signal_type.trim().is_empty() {
            &self.signal_type
        } else {
            &self.handle_id
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockPorts {
    pub inputs: Vec<ResolvedPort>,
    pub outputs: Vec<ResolvedPort>,
}

impl BlockPorts {
    pub fn resolve(block: &BlockSpec) -> Self {
        let annotate = |direction: PortDirection, ports: &[Port]| {
            ports
                .iter()
                .enumerate()
                .map(|(idx, port)| ResolvedPort::new(direction, idx, port))
                .collect()
        };
        Self {
            inputs: annotate(PortDirection::Input, &block.inputs),
            outputs: annotate(PortDirection::Output, &block.outputs),
        }
    }

    pub fn ports(&self, direction: PortDirection) -> &[ResolvedPort] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    /// Whether the block exposes a connection anchor on that side.
    pub fn has_anchor(&self, direction: PortDirection) -> bool {
        !self.ports(direction).is_empty()
    }

    /// Resolve an explicit port reference.
    ///
    /// Names win over positions: an exact name match, then a
    /// case-insensitive one, then a name string that parses as an index.
    /// With duplicate names the first declaration wins.
    pub fn find(&self, direction: PortDirection, port: &PortRef) -> Option<&ResolvedPort> {
        let ports = self.ports(direction);
        match port {
            PortRef::Index(idx) => ports.get(*idx),
            PortRef::Name(name) => {
                let wanted = name.trim();
                ports
                    .iter()
                    .find(|p| p.name.trim() == wanted)
                    .or_else(|| {
                        ports
                            .iter()
                            .find(|p| p.name.trim().eq_ignore_ascii_case(wanted))
                    })
                    .or_else(|| wanted.parse::<usize>().ok().and_then(|idx| ports.get(idx)))
            }
        }
    }

    /// Pick a port for a connection that names none: the first port carrying
    /// the same signal type, else the first port of that side.
    pub fn find_for_signal(
        &self,
        direction: PortDirection,
        signal_type: &str,
    ) -> Option<&ResolvedPort> {
        let ports = self.ports(direction);
        ports
            .iter()
            .find(|p| signal_types_match(&p.signal_type, signal_type))
            .or_else(|| ports.first())
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &ResolvedPort> {
        self.inputs.iter().filter(|port| port.required)
    }
}

pub fn resolve_ports(block: &BlockSpec) -> BlockPorts {
    BlockPorts::resolve(block)
}
