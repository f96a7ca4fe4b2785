use crate::db::circuit::Circuit;
use crate::db::graph::ResourceGraph;
use crate::db::indices::{NetId, NodeId};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

const MAX_REPORTED: usize = 10;

/// Verifies a finished routing: connectivity of every path, node capacities
/// and one output pin per net.
pub fn run(graph: &ResourceGraph, circuit: &Circuit) -> Result<(), String> {
    log::info!("Starting Routing Verification...");

    let (paths_result, (capacity_result, opins_result)) = rayon::join(
        || check_paths(graph, circuit),
        || {
            rayon::join(
                || check_capacity(graph, circuit),
                || check_opins(graph, circuit),
            )
        },
    );

    let mut msgs = Vec::new();

    match paths_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Broken or Non-Simple Paths Detected");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: All connections are routed source to sink."),
    }

    match capacity_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Overused Routing Resources");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: No node exceeds its capacity."),
    }

    match opins_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Inconsistent Output Pins");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: Every net leaves through one output pin."),
    }

    if msgs.is_empty() {
        log::info!("\x1b[32mSUCCESS\x1b[0m: LEGAL ROUTING");
        Ok(())
    } else {
        Err(msgs.join("\n"))
    }
}

pub fn check_paths(graph: &ResourceGraph, circuit: &Circuit) -> Result<(), String> {
    let errors: Vec<String> = circuit
        .connections
        .par_iter()
        .filter_map(|con| {
            let net = &circuit.net(con.net).name;
            let path = &con.path;
            if path.is_empty() {
                return Some(format!("{} of net '{}' is unrouted", con.id, net));
            }
            if path[0] != con.source || path[path.len() - 1] != con.sink {
                return Some(format!(
                    "{} of net '{}' runs {} -> {}, expected {} -> {}",
                    con.id,
                    net,
                    path[0],
                    path[path.len() - 1],
                    con.source,
                    con.sink
                ));
            }
            let mut seen = HashSet::with_capacity(path.len());
            for &n in path {
                if !graph.contains(n) {
                    return Some(format!("{} of net '{}' uses unknown node {}", con.id, net, n));
                }
                if !seen.insert(n) {
                    return Some(format!("{} of net '{}' visits {} twice", con.id, net, n));
                }
            }
            for pair in path.windows(2) {
                if !graph.has_edge(pair[0], pair[1]) {
                    return Some(format!(
                        "{} of net '{}' jumps {} -> {} without an edge",
                        con.id, net, pair[0], pair[1]
                    ));
                }
            }
            None
        })
        .collect();

    summarize(errors)
}

/// Nodes whose distinct-net count exceeds capacity, computed from the paths
/// alone.
pub fn overused_nodes(graph: &ResourceGraph, circuit: &Circuit) -> Vec<NodeId> {
    let mut users: HashMap<NodeId, HashSet<NetId>> = HashMap::new();
    for con in &circuit.connections {
        for &n in &con.path {
            users.entry(n).or_default().insert(con.net);
        }
    }
    let mut overused: Vec<NodeId> = users
        .into_iter()
        .filter(|(n, nets)| graph.contains(*n) && nets.len() as u32 > graph.node(*n).capacity)
        .map(|(n, _)| n)
        .collect();
    overused.sort_unstable();
    overused
}

pub fn check_capacity(graph: &ResourceGraph, circuit: &Circuit) -> Result<(), String> {
    let errors = overused_nodes(graph, circuit)
        .into_iter()
        .map(|n| format!("{} exceeds capacity {}", graph.node(n), graph.node(n).capacity))
        .collect();
    summarize(errors)
}

pub fn check_opins(graph: &ResourceGraph, circuit: &Circuit) -> Result<(), String> {
    let errors: Vec<String> = circuit
        .nets
        .par_iter()
        .filter_map(|net| {
            let mut opins = HashSet::new();
            for &c in &net.connections {
                let con = circuit.connection(c);
                if let Some(&bad) = con.path.iter().find(|&&n| !graph.contains(n)) {
                    return Some(format!("{} of net '{}' uses unknown node {}", c, net.name, bad));
                }
                match con.opin(graph) {
                    Some(o) => {
                        opins.insert(o);
                    }
                    None => return Some(format!("{} of net '{}' has no output pin", c, net.name)),
                }
            }
            if opins.len() != 1 {
                return Some(format!("net '{}' uses {} output pins", net.name, opins.len()));
            }
            match (net.opin(), opins.iter().next()) {
                (Some(committed), Some(&used)) if committed != used => Some(format!(
                    "net '{}' committed to {} but routes through {}",
                    net.name, committed, used
                )),
                _ => None,
            }
        })
        .collect();
    summarize(errors)
}

fn summarize(mut errors: Vec<String>) -> Result<(), String> {
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort();
    let total = errors.len();
    let mut msg = errors
        .into_iter()
        .take(MAX_REPORTED)
        .collect::<Vec<_>>()
        .join("\n");
    if total > MAX_REPORTED {
        msg.push_str(&format!("\n... and {} more", total - MAX_REPORTED));
    }
    Err(msg)
}
