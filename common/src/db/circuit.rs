use crate::db::graph::{NodeKind, ResourceGraph};
use crate::db::indices::{ConnId, NetId, NodeId};
use crate::geom::rect::TileRect;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CircuitError {
    #[error("net '{0}' is defined twice")]
    DuplicateNet(String),
    #[error("net '{net}': node {node} does not exist")]
    UnknownNode { net: String, node: NodeId },
    #[error("net '{net}': node {node} is a {found}, expected a {expected}")]
    WrongKind {
        net: String,
        node: NodeId,
        found: NodeKind,
        expected: NodeKind,
    },
}

/// A single source to sink request of a net.
#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnId,
    pub net: NetId,
    pub source: NodeId,
    pub sink: NodeId,
    /// Realized route, source first. Empty while unrouted.
    pub path: Vec<NodeId>,
    /// Search window: source and sink extents grown by the bounding-box factor.
    pub bbox: TileRect,
    /// Half perimeter of the unexpanded source/sink box.
    pub bbox_size: i32,
}

impl Connection {
    pub fn is_routed(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn reset_path(&mut self) {
        self.path.clear();
    }

    /// Output pin the current route leaves the driver through.
    pub fn opin(&self, graph: &ResourceGraph) -> Option<NodeId> {
        self.path
            .iter()
            .copied()
            .find(|&n| graph.node(n).kind == NodeKind::Opin)
    }

    #[inline]
    pub fn in_bounding_box(&self, graph: &ResourceGraph, node: NodeId) -> bool {
        self.bbox.intersects(&graph.node(node).extent)
    }
}

#[derive(Clone, Debug)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    pub source: NodeId,
    pub connections: Vec<ConnId>,
    pub fanout: usize,
    pub bbox: TileRect,
    pub x_geo: f32,
    pub y_geo: f32,
    pub hpwl: f32,
    /// OPIN children of the driver's source node.
    pub candidate_opins: Vec<NodeId>,
    opin: Option<NodeId>,
}

impl Net {
    pub fn has_opin(&self) -> bool {
        self.opin.is_some()
    }

    pub fn opin(&self) -> Option<NodeId> {
        self.opin
    }

    pub fn set_opin(&mut self, opin: NodeId) {
        if self.opin != Some(opin) {
            log::debug!("{} '{}' commits to output pin {}", self.id, self.name, opin);
        }
        self.opin = Some(opin);
    }
}

/// Nets and connections to route over one resource graph.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub nets: Vec<Net>,
    pub connections: Vec<Connection>,
    pub net_name_map: HashMap<String, NetId>,
    bb_factor: i32,
}

impl Circuit {
    pub fn new(bb_factor: i32) -> Self {
        Self {
            nets: Vec::new(),
            connections: Vec::new(),
            net_name_map: HashMap::new(),
            bb_factor: bb_factor.max(0),
        }
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }
    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }
    #[inline]
    pub fn connection(&self, id: ConnId) -> &Connection {
        &self.connections[id.index()]
    }

    pub fn connection_ids(&self) -> Vec<ConnId> {
        (0..self.connections.len()).map(ConnId::new).collect()
    }

    /// Registers a net and one connection per sink. Nets without sinks have
    /// nothing to route and are skipped (`Ok(None)`).
    pub fn add_net(
        &mut self,
        graph: &ResourceGraph,
        name: &str,
        source: NodeId,
        sinks: &[NodeId],
    ) -> Result<Option<NetId>, CircuitError> {
        if self.net_name_map.contains_key(name) {
            return Err(CircuitError::DuplicateNet(name.to_string()));
        }
        check_kind(graph, name, source, NodeKind::Source)?;
        for &sink in sinks {
            check_kind(graph, name, sink, NodeKind::Sink)?;
        }
        if sinks.is_empty() {
            log::debug!("Skipping net '{}' without sinks", name);
            return Ok(None);
        }

        let net_id = NetId::new(self.nets.len());
        let source_node = graph.node(source);

        let mut bbox = source_node.extent;
        let mut sum_x = source_node.center().x;
        let mut sum_y = source_node.center().y;
        for &sink in sinks {
            let s = graph.node(sink);
            bbox = bbox.union(&s.extent);
            sum_x += s.center().x;
            sum_y += s.center().y;
        }
        let pins = (sinks.len() + 1) as f32;

        let mut connections = Vec::with_capacity(sinks.len());
        for &sink in sinks {
            let id = ConnId::new(self.connections.len());
            let box_ = source_node.extent.union(&graph.node(sink).extent);
            self.connections.push(Connection {
                id,
                net: net_id,
                source,
                sink,
                path: Vec::new(),
                bbox: box_.expand(self.bb_factor),
                bbox_size: box_.half_perimeter(),
            });
            connections.push(id);
        }

        let candidate_opins = source_node
            .children
            .iter()
            .copied()
            .filter(|&c| graph.node(c).kind == NodeKind::Opin)
            .collect();

        self.nets.push(Net {
            id: net_id,
            name: name.to_string(),
            source,
            connections,
            fanout: sinks.len(),
            bbox,
            x_geo: sum_x / pins,
            y_geo: sum_y / pins,
            hpwl: bbox.half_perimeter() as f32,
            candidate_opins,
            opin: None,
        });
        self.net_name_map.insert(name.to_string(), net_id);
        Ok(Some(net_id))
    }
}

fn check_kind(
    graph: &ResourceGraph,
    net: &str,
    node: NodeId,
    expected: NodeKind,
) -> Result<(), CircuitError> {
    if !graph.contains(node) {
        return Err(CircuitError::UnknownNode {
            net: net.to_string(),
            node,
        });
    }
    let found = graph.node(node).kind;
    if found != expected {
        return Err(CircuitError::WrongKind {
            net: net.to_string(),
            node,
            found,
            expected,
        });
    }
    Ok(())
}
