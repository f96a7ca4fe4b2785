use crate::db::indices::NodeId;
use crate::geom::point::Point;
use crate::geom::rect::TileRect;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Sink,
    Opin,
    Ipin,
    Wire,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Sink => "sink",
            NodeKind::Opin => "opin",
            NodeKind::Ipin => "ipin",
            NodeKind::Wire => "wire",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(NodeKind::Source),
            "sink" => Ok(NodeKind::Sink),
            "opin" => Ok(NodeKind::Opin),
            "ipin" => Ok(NodeKind::Ipin),
            "wire" | "chanx" | "chany" => Ok(NodeKind::Wire),
            other => Err(format!("unknown node kind '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub capacity: u32,
    pub base_cost: f32,
    pub extent: TileRect,
    pub children: Vec<NodeId>,
}

impl ResourceNode {
    #[inline]
    pub fn center(&self) -> Point<f32> {
        self.extent.center()
    }

    /// Length in tiles; only meaningful for wires.
    pub fn wire_length(&self) -> u32 {
        (self.extent.width() + self.extent.height() - 1) as u32
    }
}

impl fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.extent;
        if e.xmin == e.xmax && e.ymin == e.ymax {
            write!(f, "{} {} ({},{})", self.id, self.kind, e.xmin, e.ymin)
        } else {
            write!(
                f,
                "{} {} ({},{})->({},{})",
                self.id, self.kind, e.xmin, e.ymin, e.xmax, e.ymax
            )
        }
    }
}

/// Immutable routing-resource graph. Node ids are dense indices into `nodes`.
#[derive(Clone, Debug, Default)]
pub struct ResourceGraph {
    pub nodes: Vec<ResourceNode>,
    num_edges: usize,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(1024),
            num_edges: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &ResourceNode {
        &self.nodes[id.index()]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        capacity: u32,
        base_cost: f32,
        extent: TileRect,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(ResourceNode {
            id,
            kind,
            capacity,
            base_cost,
            extent,
            children: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let children = &mut self.nodes[from.index()].children;
        if !children.contains(&to) {
            children.push(to);
            self.num_edges += 1;
        }
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.node(from).children.contains(&to)
    }

    /// Coarse distance estimate used by the directed search: the tile gap
    /// between the two extents. Not a true lower bound on path cost.
    #[inline]
    pub fn lower_estimate_connection_cost(&self, from: NodeId, to: NodeId) -> f32 {
        self.node(from).extent.gap(&self.node(to).extent) as f32
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }
}
