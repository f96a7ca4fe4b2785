use hroute_common::db::circuit::Circuit;
use hroute_common::db::graph::{NodeKind, ResourceGraph};
use hroute_common::db::indices::{ConnId, NodeId};
use hroute_common::db::parser::problem;
use hroute_common::geom::rect::TileRect;
use hroute_common::util::check;
use hroute_common::util::config::{GeneratorConfig, RoutingConfig};
use hroute_common::util::generator::generate_fabric;
use hroute_router::{RouteError, Router, RoutingPass};
use std::collections::HashSet;

fn node(g: &mut ResourceGraph, kind: NodeKind, base_cost: f32) -> NodeId {
    g.add_node(kind, 1, base_cost, TileRect::tile(0, 0))
}

struct Contest {
    graph: ResourceGraph,
    circuit: Circuit,
    contested: NodeId,
    alternate: Option<NodeId>,
}

/// Two single-sink nets whose cheapest routes share one wire. Net `b` can
/// optionally detour over a dearer wire.
fn contest(with_alternate: bool) -> Contest {
    let mut g = ResourceGraph::new();
    let src_a = node(&mut g, NodeKind::Source, 1.0);
    let op_a = node(&mut g, NodeKind::Opin, 1.0);
    let src_b = node(&mut g, NodeKind::Source, 1.0);
    let op_b = node(&mut g, NodeKind::Opin, 1.0);
    let contested = node(&mut g, NodeKind::Wire, 1.0);
    let ip_a = node(&mut g, NodeKind::Ipin, 0.95);
    let sink_a = node(&mut g, NodeKind::Sink, 1.0);
    let ip_b = node(&mut g, NodeKind::Ipin, 0.95);
    let sink_b = node(&mut g, NodeKind::Sink, 1.0);

    for (from, to) in [
        (src_a, op_a),
        (src_b, op_b),
        (op_a, contested),
        (op_b, contested),
        (contested, ip_a),
        (ip_a, sink_a),
        (contested, ip_b),
        (ip_b, sink_b),
    ] {
        g.add_edge(from, to);
    }

    let alternate = if with_alternate {
        let alt = node(&mut g, NodeKind::Wire, 2.5);
        g.add_edge(op_b, alt);
        g.add_edge(alt, ip_b);
        Some(alt)
    } else {
        None
    };

    let mut circuit = Circuit::new(3);
    circuit.add_net(&g, "a", src_a, &[sink_a]).unwrap();
    circuit.add_net(&g, "b", src_b, &[sink_b]).unwrap();

    Contest {
        graph: g,
        circuit,
        contested,
        alternate,
    }
}

fn congestion_only(max_trials: usize) -> RoutingConfig {
    RoutingConfig {
        max_trials,
        fix_opins_from: None,
        ..RoutingConfig::default()
    }
}

fn assert_legal(graph: &ResourceGraph, circuit: &Circuit, router: &Router) {
    for con in &circuit.connections {
        assert_eq!(con.path.first(), Some(&con.source));
        assert_eq!(con.path.last(), Some(&con.sink));
        let unique: HashSet<_> = con.path.iter().collect();
        assert_eq!(unique.len(), con.path.len(), "{} revisits a node", con.id);
    }
    for i in 0..graph.len() {
        let n = NodeId::new(i);
        assert!(router.state().occupation(n) <= graph.node(n).capacity);
    }
    check::run(graph, circuit).unwrap();
}

#[test]
fn contested_wire_is_negotiated_away() {
    let mut t = contest(true);
    let mut router = Router::new(&t.graph, &congestion_only(10));
    let report = router.route(&mut t.circuit).unwrap();

    assert!(report.success);
    assert!(report.num_trials() <= 5, "took {} trials", report.num_trials());
    assert!(report.overused.is_empty());

    let on_contested: Vec<_> = t
        .circuit
        .connections
        .iter()
        .filter(|c| c.path.contains(&t.contested))
        .collect();
    assert_eq!(on_contested.len(), 1);
    assert_eq!(on_contested[0].id, ConnId::new(0));

    let alt = t.alternate.unwrap();
    assert!(t.circuit.connections[1].path.contains(&alt));
    assert_legal(&t.graph, &t.circuit, &router);
}

#[test]
fn history_grows_only_on_the_hot_spot() {
    let mut t = contest(true);
    let mut router = Router::new(&t.graph, &congestion_only(10));
    router.route(&mut t.circuit).unwrap();

    let alt = t.alternate.unwrap();
    assert!(router.state().node(t.contested).acc_cost > 1.0);
    assert_eq!(router.state().node(alt).acc_cost, 1.0);
}

#[test]
fn contested_wire_without_alternate_fails() {
    let mut t = contest(false);
    let mut router = Router::new(&t.graph, &congestion_only(6));
    let report = router.route(&mut t.circuit).unwrap();

    assert!(!report.success);
    assert_eq!(report.num_trials(), 6);
    assert_eq!(report.overused, vec![t.contested]);

    // Present price keeps climbing while the node stays overused.
    let prices: Vec<f32> = report.trials.iter().map(|r| r.pres_fac).collect();
    assert!(prices.windows(2).skip(1).all(|w| w[1] > w[0]));

    match report.into_result() {
        Err(RouteError::TrialBudgetExhausted { trials, overused }) => {
            assert_eq!(trials, 6);
            assert_eq!(overused, vec![t.contested]);
        }
        other => panic!("expected budget exhaustion, got {:?}", other),
    }
}

#[test]
fn zero_budget_touches_nothing() {
    let mut t = contest(true);
    let mut router = Router::new(&t.graph, &congestion_only(0));
    let report = router.route(&mut t.circuit).unwrap();

    assert!(!report.success);
    assert!(report.trials.is_empty());
    assert!(report.overused.is_empty());
    assert_eq!(router.state().total_occupation(), 0);
    assert!(t.circuit.connections.iter().all(|c| !c.is_routed()));
}

#[test]
fn subset_pass_respects_existing_claims() {
    let mut t = contest(true);
    let config = congestion_only(10);
    let mut router = Router::new(&t.graph, &config);
    assert!(router.route(&mut t.circuit).unwrap().success);

    let pass = RoutingPass::from_config("Reroute b", &config);
    let report = router
        .route_connections(&mut t.circuit, &[ConnId::new(1)], &pass)
        .unwrap();
    assert!(report.success);
    assert!(!t.circuit.connections[1].path.contains(&t.contested));
    assert!(t.circuit.connections[0].path.contains(&t.contested));
    assert_legal(&t.graph, &t.circuit, &router);
}

#[test]
fn net_commits_to_the_only_free_output_pin() {
    let mut g = ResourceGraph::new();
    let src_x = node(&mut g, NodeKind::Source, 1.0);
    let src_y = node(&mut g, NodeKind::Source, 1.0);
    let o0 = node(&mut g, NodeKind::Opin, 1.0);
    let o1 = node(&mut g, NodeKind::Opin, 1.0);
    let wire_x = node(&mut g, NodeKind::Wire, 1.0);
    let wire_y = node(&mut g, NodeKind::Wire, 1.0);
    g.add_edge(src_x, o0);
    g.add_edge(src_x, o1);
    g.add_edge(src_y, o0);
    g.add_edge(o0, wire_y);
    g.add_edge(o0, wire_x);
    g.add_edge(o1, wire_x);

    let mut sinks_x = Vec::new();
    for _ in 0..3 {
        let ip = node(&mut g, NodeKind::Ipin, 0.95);
        let sink = node(&mut g, NodeKind::Sink, 1.0);
        g.add_edge(wire_x, ip);
        g.add_edge(ip, sink);
        sinks_x.push(sink);
    }
    let mut sinks_y = Vec::new();
    for _ in 0..4 {
        let ip = node(&mut g, NodeKind::Ipin, 0.95);
        let sink = node(&mut g, NodeKind::Sink, 1.0);
        g.add_edge(wire_y, ip);
        g.add_edge(ip, sink);
        sinks_y.push(sink);
    }

    let mut circuit = Circuit::new(3);
    let x = circuit.add_net(&g, "x", src_x, &sinks_x).unwrap().unwrap();
    let y = circuit.add_net(&g, "y", src_y, &sinks_y).unwrap().unwrap();

    let config = RoutingConfig {
        max_trials: 10,
        fix_opins_from: Some(2),
        ..RoutingConfig::default()
    };
    let mut router = Router::new(&g, &config);
    let report = router.route(&mut circuit).unwrap();

    assert!(report.success);
    assert_eq!(report.trials[0].opins_committed, 0);
    assert_eq!(report.trials[1].opins_committed, 2);
    assert_eq!(circuit.net(x).opin(), Some(o1));
    assert_eq!(circuit.net(y).opin(), Some(o0));
    for &c in &circuit.net(x).connections {
        assert_eq!(circuit.connection(c).opin(&g), Some(o1));
    }
    assert_legal(&g, &circuit, &router);
}

#[test]
fn committing_another_pin_forces_a_reroute() {
    let mut g = ResourceGraph::new();
    let src = node(&mut g, NodeKind::Source, 1.0);
    let o0 = node(&mut g, NodeKind::Opin, 1.0);
    let o1 = node(&mut g, NodeKind::Opin, 1.0);
    let cheap = node(&mut g, NodeKind::Wire, 1.0);
    let dear = node(&mut g, NodeKind::Wire, 2.0);
    let ip = node(&mut g, NodeKind::Ipin, 0.95);
    let sink = node(&mut g, NodeKind::Sink, 1.0);
    for (from, to) in [
        (src, o0),
        (src, o1),
        (o0, cheap),
        (o1, dear),
        (cheap, ip),
        (dear, ip),
        (ip, sink),
    ] {
        g.add_edge(from, to);
    }

    let mut circuit = Circuit::new(3);
    let net = circuit.add_net(&g, "n", src, &[sink]).unwrap().unwrap();

    let config = congestion_only(10);
    let mut router = Router::new(&g, &config);
    assert!(router.route(&mut circuit).unwrap().success);
    let con = ConnId::new(0);
    assert_eq!(circuit.connection(con).opin(&g), Some(o0));

    circuit.nets[net.index()].set_opin(o1);
    let pass = RoutingPass {
        route_all: false,
        ..RoutingPass::from_config("Pin change", &config)
    };
    let report = router.route_connections(&mut circuit, &[con], &pass).unwrap();

    assert!(report.success);
    assert_eq!(report.num_trials(), 2);
    assert_eq!(report.trials[0].rerouted, 1);
    assert_eq!(report.trials[1].rerouted, 0);
    assert_eq!(circuit.connection(con).path, vec![src, o1, dear, ip, sink]);
    assert_eq!(router.state().occupation(o0), 0);
    assert_eq!(router.state().occupation(o1), 1);
    assert_legal(&g, &circuit, &router);
}

#[test]
fn unreachable_sink_is_fatal() {
    let mut g = ResourceGraph::new();
    let src = node(&mut g, NodeKind::Source, 1.0);
    let op = node(&mut g, NodeKind::Opin, 1.0);
    let wire = node(&mut g, NodeKind::Wire, 1.0);
    let sink = node(&mut g, NodeKind::Sink, 1.0);
    g.add_edge(src, op);
    g.add_edge(op, wire);

    let mut circuit = Circuit::new(3);
    circuit.add_net(&g, "island", src, &[sink]).unwrap();

    let mut router = Router::new(&g, &RoutingConfig::default());
    let err = router.route(&mut circuit).unwrap_err();
    assert_eq!(
        err,
        RouteError::UnreachableSink {
            connection: ConnId::new(0),
            net: "island".to_string(),
            driver: src,
            sink,
        }
    );
    for i in 0..g.len() {
        let data = router.state().node(NodeId::new(i));
        assert!(!data.path_costs_set());
        assert!(!data.target);
    }
}

fn fabric() -> GeneratorConfig {
    GeneratorConfig {
        width: 5,
        height: 5,
        channel_width: 3,
        opins_per_tile: 2,
        ipins_per_tile: 4,
        num_nets: 12,
        max_fanout: 3,
        seed: 3,
    }
}

#[test]
fn generated_fabric_routes_legally() {
    let p = generate_fabric(&fabric());
    let config = RoutingConfig::default();
    let mut circuit = p.build_circuit(config.bb_factor).unwrap();

    let mut router = Router::new(&p.graph, &config);
    let report = router.route(&mut circuit).unwrap();

    assert!(report.success, "overused: {:?}", report.overused);
    assert!(report.final_wirelength().unwrap() > 0);
    for net in &circuit.nets {
        assert!(net.opin().is_some());
    }
    assert_legal(&p.graph, &circuit, &router);
}

#[test]
fn problem_file_round_trip_routes() {
    let p = generate_fabric(&fabric());
    let mut buf = Vec::new();
    problem::write_to(&p, &mut buf).unwrap();
    let q = problem::parse_reader(buf.as_slice()).unwrap();

    let config = RoutingConfig::default();
    let mut circuit = q.build_circuit(config.bb_factor).unwrap();
    let report = hroute_router::route(&q.graph, &mut circuit, &config)
        .unwrap()
        .into_result()
        .unwrap();
    assert!(report.success);
    check::run(&q.graph, &circuit).unwrap();
}
