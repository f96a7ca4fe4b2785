use crate::error::RouteError;
use crate::state::RoutingState;
use hroute_common::db::circuit::{Connection, Net};
use hroute_common::db::graph::{NodeKind, ResourceGraph};
use hroute_common::db::indices::NodeId;
use hroute_common::geom::point::Point;
use priority_queue::PriorityQueue;
use std::cmp::Ordering;

/// Queue key: cheapest lower bound first, lowest node id on ties.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Priority {
    lower_bound: f32,
    node: NodeId,
}

impl Eq for Priority {}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .lower_bound
            .total_cmp(&self.lower_bound)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-first search for a single connection.
///
/// The lower bound it orders by is an estimate, not a true bound, so this is
/// a directed heuristic search rather than A*.
pub struct DirectedSearch {
    queue: PriorityQueue<NodeId, Priority>,
    nodes_touched: Vec<NodeId>,
    alpha: f32,
}

impl DirectedSearch {
    pub fn new(alpha: f32) -> Self {
        Self {
            queue: PriorityQueue::new(),
            nodes_touched: Vec::with_capacity(1024),
            alpha,
        }
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    /// Finds a path for `con` under the current congestion prices. The path
    /// runs source first. Claims are not touched; the caller adds them.
    pub fn route(
        &mut self,
        graph: &ResourceGraph,
        state: &mut RoutingState,
        con: &Connection,
        net: &Net,
        pres_fac: f32,
    ) -> Result<Vec<NodeId>, RouteError> {
        self.queue.clear();

        state.node_mut(con.sink).target = true;

        let source_cost = self.node_cost(graph, state, con.source, net, pres_fac);
        let source_bound = self.lower_bound(graph, state, con.source, con, net, source_cost);
        self.add_node_to_queue(state, con.source, None, source_cost, source_bound);

        let reached = loop {
            let Some((node, _)) = self.queue.pop() else {
                break false;
            };
            if state.node(node).target {
                break true;
            }
            self.expand_node(graph, state, node, con, net, pres_fac);
        };

        state.node_mut(con.sink).target = false;

        let result = if reached {
            Ok(self.save_routing(state, con.sink))
        } else {
            log::error!(
                "Queue is empty: {} of net '{}' cannot reach {} from {}",
                con.id,
                net.name,
                con.sink,
                con.source
            );
            Err(RouteError::UnreachableSink {
                connection: con.id,
                net: net.name.clone(),
                driver: con.source,
                sink: con.sink,
            })
        };

        self.reset_path_costs(state);
        result
    }

    /// Number of nodes whose scratch is currently set. Zero between searches.
    pub fn touched(&self) -> usize {
        self.nodes_touched.len()
    }

    fn expand_node(
        &mut self,
        graph: &ResourceGraph,
        state: &mut RoutingState,
        node: NodeId,
        con: &Connection,
        net: &Net,
        pres_fac: f32,
    ) {
        let partial = state.node(node).partial_cost;

        for &child in &graph.node(node).children {
            let child_node = graph.node(child);
            let admit = match child_node.kind {
                NodeKind::Opin => match net.opin() {
                    Some(opin) => child == opin,
                    None => !state.is_used_by_other(child, net.id),
                },
                // Only step onto an input pin that leads straight to the target.
                NodeKind::Ipin => {
                    child_node.children.len() == 1 && state.node(child_node.children[0]).target
                }
                _ => con.in_bounding_box(graph, child),
            };
            if !admit {
                continue;
            }

            let new_partial = partial + self.node_cost(graph, state, child, net, pres_fac);
            let new_bound = self.lower_bound(graph, state, child, con, net, new_partial);
            self.add_node_to_queue(state, child, Some(node), new_partial, new_bound);
        }
    }

    fn add_node_to_queue(
        &mut self,
        state: &mut RoutingState,
        node: NodeId,
        prev: Option<NodeId>,
        partial_cost: f32,
        lower_bound: f32,
    ) {
        let data = state.node_mut(node);
        if !data.path_costs_set() {
            self.nodes_touched.push(node);
        }
        if data.update_path_costs(partial_cost, lower_bound, prev) {
            self.queue.push(node, Priority { lower_bound, node });
        }
    }

    /// `partial + alpha * (distance / usage + 0.95) + centroid bias`.
    fn lower_bound(
        &self,
        graph: &ResourceGraph,
        state: &RoutingState,
        node: NodeId,
        con: &Connection,
        net: &Net,
        partial_cost: f32,
    ) -> f32 {
        if self.alpha == 0.0 {
            return partial_cost;
        }
        let rn = graph.node(node);
        let usage = 1 + state.node(node).count_source_uses(net.id);

        let expected_cost = self.alpha
            * (graph.lower_estimate_connection_cost(node, con.sink) / usage as f32 + 0.95);

        let centroid = Point::new(net.x_geo, net.y_geo);
        let bias_cost = rn.base_cost / (2 * net.fanout.max(1)) as f32
            * rn.center().manhattan(centroid)
            / net.hpwl.max(1.0);

        partial_cost + expected_cost + bias_cost
    }

    fn node_cost(
        &self,
        graph: &ResourceGraph,
        state: &RoutingState,
        node: NodeId,
        net: &Net,
        pres_fac: f32,
    ) -> f32 {
        let data = state.node(node);
        let uses = data.count_source_uses(net.id);

        // Reusing our own claim is not congestion unless others already overfill the node.
        let pres_cost = if uses != 0 {
            let over = data.occupation() as i64 - state.capacity(node) as i64;
            if over < 0 {
                1.0
            } else {
                1.0 + over as f32 * pres_fac
            }
        } else {
            data.pres_cost
        };

        graph.node(node).base_cost * data.acc_cost * pres_cost / (1 + 10 * uses) as f32
    }

    fn save_routing(&self, state: &RoutingState, sink: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut curr = Some(sink);
        while let Some(node) = curr {
            path.push(node);
            curr = state.node(node).prev;
            debug_assert!(path.len() <= state.len(), "backpointer cycle");
        }
        path.reverse();
        path
    }

    fn reset_path_costs(&mut self, state: &mut RoutingState) {
        for &node in &self.nodes_touched {
            state.node_mut(node).reset_path_costs();
        }
        self.nodes_touched.clear();
    }
}
