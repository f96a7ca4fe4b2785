use hroute_common::db::graph::ResourceGraph;
use hroute_common::db::indices::{NetId, NodeId};

/// Congestion bookkeeping and search scratch for one resource node.
#[derive(Clone, Debug)]
pub struct NodeRoutingState {
    /// Claiming sources with the number of connections of each.
    sources: Vec<(NetId, u32)>,
    pub pres_cost: f32,
    pub acc_cost: f32,

    // Scratch, only meaningful while `set`.
    pub partial_cost: f32,
    pub lower_bound: f32,
    pub prev: Option<NodeId>,
    set: bool,

    pub target: bool,
}

impl Default for NodeRoutingState {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            pres_cost: 1.0,
            acc_cost: 1.0,
            partial_cost: f32::MAX,
            lower_bound: f32::MAX,
            prev: None,
            set: false,
            target: false,
        }
    }
}

impl NodeRoutingState {
    /// Number of distinct sources on the node.
    #[inline(always)]
    pub fn occupation(&self) -> u32 {
        self.sources.len() as u32
    }

    #[inline(always)]
    pub fn count_source_uses(&self, source: NetId) -> u32 {
        self.sources
            .iter()
            .find(|(s, _)| *s == source)
            .map_or(0, |&(_, n)| n)
    }

    pub fn add_source(&mut self, source: NetId) {
        match self.sources.iter_mut().find(|(s, _)| *s == source) {
            Some((_, n)) => *n += 1,
            None => self.sources.push((source, 1)),
        }
    }

    /// Returns false when the source held no claim.
    pub fn remove_source(&mut self, source: NetId) -> bool {
        let Some(pos) = self.sources.iter().position(|(s, _)| *s == source) else {
            return false;
        };
        let n = &mut self.sources[pos].1;
        *n -= 1;
        if *n == 0 {
            self.sources.swap_remove(pos);
        }
        true
    }

    #[inline(always)]
    pub fn path_costs_set(&self) -> bool {
        self.set
    }

    /// Records a new best way of reaching this node. Only accepted when the
    /// lower bound strictly improves.
    #[inline]
    pub fn update_path_costs(
        &mut self,
        partial_cost: f32,
        lower_bound: f32,
        prev: Option<NodeId>,
    ) -> bool {
        if self.set && lower_bound >= self.lower_bound {
            return false;
        }
        self.set = true;
        self.partial_cost = partial_cost;
        self.lower_bound = lower_bound;
        self.prev = prev;
        true
    }

    pub fn reset_path_costs(&mut self) {
        self.set = false;
        self.partial_cost = f32::MAX;
        self.lower_bound = f32::MAX;
        self.prev = None;
    }
}

/// Routing state of every node in a resource graph, owned by the router and
/// lent to the search.
#[derive(Clone, Debug)]
pub struct RoutingState {
    nodes: Vec<NodeRoutingState>,
    capacity: Vec<u32>,
}

impl RoutingState {
    pub fn new(graph: &ResourceGraph) -> Self {
        Self {
            nodes: vec![NodeRoutingState::default(); graph.len()],
            capacity: graph.nodes.iter().map(|n| n.capacity).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &NodeRoutingState {
        &self.nodes[id.index()]
    }

    #[inline(always)]
    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeRoutingState {
        &mut self.nodes[id.index()]
    }

    #[inline(always)]
    pub fn capacity(&self, id: NodeId) -> u32 {
        self.capacity[id.index()]
    }

    #[inline(always)]
    pub fn occupation(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].occupation()
    }

    /// True when some source other than `source` claims the node.
    #[inline]
    pub fn is_used_by_other(&self, id: NodeId, source: NetId) -> bool {
        let data = self.node(id);
        let own = u32::from(data.count_source_uses(source) > 0);
        data.occupation() > own
    }

    #[inline]
    pub fn is_overused(&self, id: NodeId) -> bool {
        self.occupation(id) > self.capacity(id)
    }

    pub fn add_source(&mut self, id: NodeId, source: NetId, pres_fac: f32) {
        self.nodes[id.index()].add_source(source);
        self.update_present_congestion_penalty(id, pres_fac);
    }

    pub fn remove_source(&mut self, id: NodeId, source: NetId, pres_fac: f32) {
        if !self.nodes[id.index()].remove_source(source) {
            log::warn!("{} holds no claim from {}", id, source);
        }
        self.update_present_congestion_penalty(id, pres_fac);
    }

    /// Incremental price after a claim changes: 1 below capacity, growing
    /// with the overuse that one more user would cause otherwise.
    #[inline]
    pub fn update_present_congestion_penalty(&mut self, id: NodeId, pres_fac: f32) {
        let occ = self.occupation(id) as i64;
        let cap = self.capacity(id) as i64;
        let data = &mut self.nodes[id.index()];
        data.pres_cost = if occ < cap {
            1.0
        } else {
            1.0 + (occ - cap + 1) as f32 * pres_fac
        };
    }

    /// End-of-trial price update over the whole graph. Only overused nodes
    /// feed the historical accumulator.
    pub fn update_cost(&mut self, pres_fac: f32, acc_fac: f32) {
        for (data, &cap) in self.nodes.iter_mut().zip(&self.capacity) {
            let overuse = data.occupation() as i64 - cap as i64;
            if overuse == 0 {
                data.pres_cost = 1.0 + pres_fac;
            } else if overuse > 0 {
                data.pres_cost = 1.0 + (overuse + 1) as f32 * pres_fac;
                data.acc_cost += overuse as f32 * acc_fac;
            }
        }
    }

    pub fn total_occupation(&self) -> u64 {
        self.nodes.iter().map(|n| n.occupation() as u64).sum()
    }
}
