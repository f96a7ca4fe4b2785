use crate::algo::search::DirectedSearch;
use crate::error::RouteError;
use crate::report::{RouteReport, TrialRecord};
use crate::state::RoutingState;
use hroute_common::db::circuit::Circuit;
use hroute_common::db::graph::{NodeKind, ResourceGraph};
use hroute_common::db::indices::{ConnId, NetId, NodeId};
use hroute_common::util::config::{ConnectionOrder, RoutingConfig};
use hroute_common::util::profiler::ScopedTimer;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Instant;

/// Parameters of one call into the negotiation loop.
#[derive(Clone, Debug)]
pub struct RoutingPass {
    pub name: String,
    pub trials: usize,
    /// Rip up and reroute everything on the first trial.
    pub route_all: bool,
    pub fix_opins_from: Option<usize>,
    pub alpha: f32,
}

impl RoutingPass {
    pub fn from_config(name: &str, config: &RoutingConfig) -> Self {
        Self {
            name: name.to_string(),
            trials: config.max_trials,
            route_all: config.route_all,
            fix_opins_from: config.fix_opins_from,
            alpha: config.alpha,
        }
    }
}

/// Negotiated-congestion (PathFinder) controller.
///
/// Every trial walks the connections in priority order, rips up and reroutes
/// the ones that are congested or leave their net through the wrong output
/// pin, and then raises the present-congestion price. Nodes that stay
/// overused accumulate history cost so later trials steer around them.
pub struct Router<'g> {
    graph: &'g ResourceGraph,
    state: RoutingState,
    search: DirectedSearch,
    config: RoutingConfig,
    pres_fac: f32,
}

impl<'g> Router<'g> {
    pub fn new(graph: &'g ResourceGraph, config: &RoutingConfig) -> Self {
        Self {
            graph,
            state: RoutingState::new(graph),
            search: DirectedSearch::new(config.alpha),
            config: config.clone(),
            pres_fac: config.initial_pres_fac,
        }
    }

    pub fn state(&self) -> &RoutingState {
        &self.state
    }

    /// Routes every connection of the circuit with the configured budget.
    pub fn route(&mut self, circuit: &mut Circuit) -> Result<RouteReport, RouteError> {
        log::info!("---------------------------");
        log::info!("|         HROUTE          |");
        log::info!("---------------------------");
        log::info!("Num nets: {}", circuit.num_nets());
        log::info!("Num cons: {}", circuit.num_connections());

        let pass = RoutingPass::from_config("Route all", &self.config);
        let connections = circuit.connection_ids();
        let report = self.route_connections(circuit, &connections, &pass)?;

        if report.success {
            self.log_opin_usage(circuit);
        }
        Ok(report)
    }

    /// Runs the negotiation loop over `connections` only. Claims of other
    /// connections stay in place and are negotiated against.
    pub fn route_connections(
        &mut self,
        circuit: &mut Circuit,
        connections: &[ConnId],
        pass: &RoutingPass,
    ) -> Result<RouteReport, RouteError> {
        if let Some(&bad) = connections
            .iter()
            .find(|c| c.index() >= circuit.num_connections())
        {
            return Err(RouteError::InvalidConnection(bad));
        }

        let timer = ScopedTimer::new(format!("Routing pass '{}'", pass.name));
        log::info!("----------------------------------------------------------");
        log::info!("{}", pass.name);

        self.search.set_alpha(pass.alpha);
        self.pres_fac = self.config.initial_pres_fac;

        let order = self.order_connections(circuit, connections);
        let nets = nets_by_fanout(circuit, &order);

        log::info!(
            "{:>9}  {:>5}  {:>9}  {:>8}  {:>17}  {:>11}",
            "Iteration",
            "Alpha",
            "Time (ms)",
            "Rerouted",
            "Overused RR Nodes",
            "Wire-Length"
        );

        let mut trials = Vec::new();
        let mut success = false;

        for itry in 1..=pass.trials {
            let trial_start = Instant::now();
            let mut valid = true;

            let mut opins_committed = 0;
            match pass.fix_opins_from {
                Some(from) if itry >= from => {
                    let (committed, resolved) = self.fix_opins(circuit, &nets);
                    opins_committed = committed;
                    if committed > 0 || !resolved {
                        valid = false;
                    }
                }
                Some(_) => valid = false,
                None => {}
            }

            let mut rerouted = 0;
            for &con in &order {
                if (itry == 1 && pass.route_all) || self.needs_reroute(circuit, con) {
                    self.reroute(circuit, con)?;
                    rerouted += 1;
                    valid = false;
                }
            }

            let record = TrialRecord {
                trial: itry,
                alpha: pass.alpha,
                pres_fac: self.pres_fac,
                elapsed: trial_start.elapsed(),
                rerouted,
                opins_committed,
                overused_nodes: self.overused_on_routes(circuit, &order).len(),
                wirelength: self.wirelength(circuit, &nets),
            };
            log::info!(
                "{:>9}  {:>5.3}  {:>9}  {:>8}  {:>17}  {:>11}",
                record.trial,
                record.alpha,
                record.elapsed.as_millis(),
                record.rerouted,
                record.overused_nodes,
                record.wirelength
            );
            trials.push(record);

            if valid {
                success = true;
                break;
            }

            if itry == 1 {
                self.pres_fac = self.config.initial_pres_fac;
            } else {
                self.pres_fac *= self.config.pres_fac_mult;
            }
            self.state.update_cost(self.pres_fac, self.config.acc_fac);
        }

        let overused = self.overused_on_routes(circuit, &order);
        if success {
            log::info!(
                "Routing '{}' converged after {} trials",
                pass.name,
                trials.len()
            );
        } else {
            log::warn!(
                "Routing failed after {} trials! {} overused nodes",
                pass.trials,
                overused.len()
            );
            for &node in &overused {
                log::warn!(
                    "  {} occupation {} / capacity {}",
                    self.graph.node(node),
                    self.state.occupation(node),
                    self.state.capacity(node)
                );
            }
        }

        Ok(RouteReport {
            pass: pass.name.clone(),
            success,
            budget: pass.trials,
            trials,
            overused,
            runtime: timer.elapsed(),
        })
    }

    /// Removes the connection's claim from every node of its path.
    pub fn ripup(&mut self, circuit: &Circuit, con: ConnId) {
        let c = circuit.connection(con);
        for &node in &c.path {
            self.state.remove_source(node, c.net, self.pres_fac);
        }
    }

    /// Claims every node of the connection's path.
    pub fn add(&mut self, circuit: &Circuit, con: ConnId) {
        let c = circuit.connection(con);
        for &node in &c.path {
            self.state.add_source(node, c.net, self.pres_fac);
        }
    }

    fn reroute(&mut self, circuit: &mut Circuit, con: ConnId) -> Result<(), RouteError> {
        self.ripup(circuit, con);
        circuit.connections[con.index()].reset_path();

        let path = {
            let c = circuit.connection(con);
            let net = circuit.net(c.net);
            self.search
                .route(self.graph, &mut self.state, c, net, self.pres_fac)?
        };
        log::trace!("{} -> {} nodes", con, path.len());

        circuit.connections[con.index()].path = path;
        self.add(circuit, con);
        Ok(())
    }

    fn needs_reroute(&self, circuit: &Circuit, con: ConnId) -> bool {
        let c = circuit.connection(con);
        if !c.is_routed() || self.is_congested(circuit, con) {
            return true;
        }
        match circuit.net(c.net).opin() {
            Some(opin) => c.opin(self.graph) != Some(opin),
            None => false,
        }
    }

    pub fn is_congested(&self, circuit: &Circuit, con: ConnId) -> bool {
        circuit
            .connection(con)
            .path
            .iter()
            .any(|&n| self.state.is_overused(n))
    }

    /// Commits output pins for nets that have none. Returns how many nets got
    /// a pin and whether every net now has one.
    fn fix_opins(&mut self, circuit: &mut Circuit, nets: &[NetId]) -> (usize, bool) {
        let mut committed = 0;

        for &net in nets {
            if circuit.net(net).has_opin() {
                continue;
            }
            if let Some(opin) = self.unique_opin(circuit, net) {
                if !self.state.is_overused(opin) {
                    circuit.nets[net.index()].set_opin(opin);
                    committed += 1;
                }
            }
        }

        let mut resolved = true;
        for &net in nets {
            if circuit.net(net).has_opin() {
                continue;
            }
            match self.most_used_opin(circuit, net) {
                Some(opin) => {
                    circuit.nets[net.index()].set_opin(opin);
                    committed += 1;
                }
                None => {
                    log::debug!("{} has no usable output pin yet", net);
                    resolved = false;
                }
            }
        }

        (committed, resolved)
    }

    /// The single candidate pin no other source claims, if exactly one exists.
    fn unique_opin(&self, circuit: &Circuit, net: NetId) -> Option<NodeId> {
        let mut free = circuit
            .net(net)
            .candidate_opins
            .iter()
            .copied()
            .filter(|&o| !self.state.is_used_by_other(o, net));
        match (free.next(), free.next()) {
            (Some(opin), None) => Some(opin),
            _ => None,
        }
    }

    /// Non-overused candidate used by the most connections of the net.
    fn most_used_opin(&self, circuit: &Circuit, net: NetId) -> Option<NodeId> {
        let n = circuit.net(net);
        n.candidate_opins
            .iter()
            .copied()
            .filter(|&o| !self.state.is_overused(o))
            .max_by_key(|&o| {
                let uses = n
                    .connections
                    .iter()
                    .filter(|&&c| circuit.connection(c).opin(self.graph) == Some(o))
                    .count();
                (uses, Reverse(o))
            })
    }

    fn order_connections(&self, circuit: &Circuit, connections: &[ConnId]) -> Vec<ConnId> {
        let mut order = connections.to_vec();
        order.sort_unstable();
        order.dedup();
        let key = |c: ConnId| -> i64 {
            let con = circuit.connection(c);
            match self.config.connection_order {
                ConnectionOrder::Fanout => circuit.net(con.net).fanout as i64,
                ConnectionOrder::BoundingBox => con.bbox_size as i64,
            }
        };
        order.sort_by_key(|&c| (Reverse(key(c)), c));
        order
    }

    fn overused_on_routes(&self, circuit: &Circuit, connections: &[ConnId]) -> Vec<NodeId> {
        let mut overused: Vec<NodeId> = connections
            .iter()
            .flat_map(|&c| circuit.connection(c).path.iter().copied())
            .filter(|&n| self.state.is_overused(n))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        overused.sort_unstable();
        overused
    }

    /// Sum of wire lengths, each wire counted once per net.
    pub fn wirelength(&self, circuit: &Circuit, nets: &[NetId]) -> u64 {
        let mut total = 0;
        let mut seen = HashSet::new();
        for &net in nets {
            seen.clear();
            for &c in &circuit.net(net).connections {
                for &n in &circuit.connection(c).path {
                    let node = self.graph.node(n);
                    if node.kind == NodeKind::Wire && seen.insert(n) {
                        total += node.wire_length() as u64;
                    }
                }
            }
        }
        total
    }

    fn log_opin_usage(&self, circuit: &Circuit) {
        for net in &circuit.nets {
            let mut opins = HashSet::new();
            for &c in &net.connections {
                match circuit.connection(c).opin(self.graph) {
                    Some(o) => {
                        opins.insert(o);
                    }
                    None => log::warn!("{} of net '{}' has no opin", c, net.name),
                }
            }
            if opins.len() != 1 {
                log::warn!("Net '{}' has {} opins", net.name, opins.len());
            }
        }
    }
}

fn nets_by_fanout(circuit: &Circuit, connections: &[ConnId]) -> Vec<NetId> {
    let mut nets: Vec<NetId> = connections
        .iter()
        .map(|&c| circuit.connection(c).net)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    nets.sort_by_key(|&n| (Reverse(circuit.net(n).fanout), n));
    nets
}

#[cfg(test)]
mod tests {
    use super::*;
    use hroute_common::geom::rect::TileRect;

    fn chain() -> (ResourceGraph, Circuit) {
        let mut g = ResourceGraph::new();
        let t = TileRect::tile(0, 0);
        let src = g.add_node(NodeKind::Source, 1, 1.0, t);
        let op = g.add_node(NodeKind::Opin, 1, 1.0, t);
        let w = g.add_node(NodeKind::Wire, 1, 1.0, TileRect::new(0, 0, 1, 0));
        let ip = g.add_node(NodeKind::Ipin, 1, 0.95, TileRect::tile(1, 0));
        let sink = g.add_node(NodeKind::Sink, 1, 1.0, TileRect::tile(1, 0));
        g.add_edge(src, op);
        g.add_edge(op, w);
        g.add_edge(w, ip);
        g.add_edge(ip, sink);
        let mut c = Circuit::new(3);
        c.add_net(&g, "a", src, &[sink]).unwrap();
        (g, c)
    }

    #[test]
    fn ripup_then_add_restores_usage() {
        let (g, mut c) = chain();
        let mut router = Router::new(&g, &RoutingConfig::default());
        let report = router.route(&mut c).unwrap();
        assert!(report.success);

        let con = ConnId::new(0);
        let before: Vec<u32> = (0..g.len())
            .map(|i| router.state().occupation(NodeId::new(i)))
            .collect();
        assert_eq!(before, vec![1, 1, 1, 1, 1]);

        router.ripup(&c, con);
        assert_eq!(router.state().total_occupation(), 0);
        router.add(&c, con);
        let after: Vec<u32> = (0..g.len())
            .map(|i| router.state().occupation(NodeId::new(i)))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn wirelength_counts_shared_wires_once() {
        let (g, mut c) = chain();
        let config = RoutingConfig {
            fix_opins_from: None,
            ..RoutingConfig::default()
        };
        let mut router = Router::new(&g, &config);
        let report = router.route(&mut c).unwrap();
        assert!(report.success);
        assert_eq!(report.num_trials(), 2);
        assert_eq!(report.final_wirelength(), Some(2));
        assert_eq!(router.wirelength(&c, &[NetId::new(0)]), 2);
    }

    #[test]
    fn rejects_unknown_connections() {
        let (g, mut c) = chain();
        let mut router = Router::new(&g, &RoutingConfig::default());
        let pass = RoutingPass::from_config("subset", &RoutingConfig::default());
        let err = router
            .route_connections(&mut c, &[ConnId::new(5)], &pass)
            .unwrap_err();
        assert_eq!(err, RouteError::InvalidConnection(ConnId::new(5)));
    }

    #[test]
    fn bounding_box_order_puts_long_connections_first() {
        let mut g = ResourceGraph::new();
        let src = g.add_node(NodeKind::Source, 1, 1.0, TileRect::tile(0, 0));
        let near = g.add_node(NodeKind::Sink, 1, 1.0, TileRect::tile(1, 0));
        let far = g.add_node(NodeKind::Sink, 1, 1.0, TileRect::tile(6, 6));
        let src2 = g.add_node(NodeKind::Source, 1, 1.0, TileRect::tile(3, 3));
        let mid = g.add_node(NodeKind::Sink, 1, 1.0, TileRect::tile(3, 5));
        let mut c = Circuit::new(1);
        c.add_net(&g, "wide", src, &[near, far]).unwrap();
        c.add_net(&g, "narrow", src2, &[mid]).unwrap();

        let all = c.connection_ids();
        let by_fanout = Router::new(&g, &RoutingConfig::default()).order_connections(&c, &all);
        assert_eq!(by_fanout, vec![ConnId::new(0), ConnId::new(1), ConnId::new(2)]);

        let config = RoutingConfig {
            connection_order: ConnectionOrder::BoundingBox,
            ..RoutingConfig::default()
        };
        let by_bb = Router::new(&g, &config).order_connections(&c, &all);
        assert_eq!(by_bb, vec![ConnId::new(1), ConnId::new(2), ConnId::new(0)]);
    }
}
