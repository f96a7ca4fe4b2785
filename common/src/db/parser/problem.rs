use crate::db::circuit::{Circuit, CircuitError};
use crate::db::graph::{NodeKind, ResourceGraph};
use crate::db::indices::NodeId;
use crate::geom::rect::TileRect;
use anyhow::{Context, Result, anyhow, bail};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

#[derive(Clone, Debug, PartialEq)]
pub struct NetSpec {
    pub name: String,
    pub source: NodeId,
    pub sinks: Vec<NodeId>,
}

#[derive(Clone, Debug, Default)]
pub struct Problem {
    pub graph: ResourceGraph,
    pub nets: Vec<NetSpec>,
}

impl Problem {
    /// Builds the routable circuit; sinkless nets are dropped.
    pub fn build_circuit(&self, bb_factor: i32) -> Result<Circuit, CircuitError> {
        let mut circuit = Circuit::new(bb_factor);
        for net in &self.nets {
            circuit.add_net(&self.graph, &net.name, net.source, &net.sinks)?;
        }
        Ok(circuit)
    }
}

pub fn parse(filename: &str) -> Result<Problem> {
    log::info!("Parsing routing problem: {}", filename);
    let file =
        File::open(filename).context(format!("Failed to open problem file: {}", filename))?;
    parse_reader(BufReader::new(file))
}

/// Reads a pre-built resource graph plus its nets:
///
/// ```text
/// # comment
/// node <id> <kind> <capacity> <base_cost> <xlow> <ylow> <xhigh> <yhigh>
/// edge <from> <to>
/// net <name> <source> <sink> [<sink> ...]
/// ```
pub fn parse_reader<R: BufRead>(reader: R) -> Result<Problem> {
    let mut problem = Problem {
        graph: ResourceGraph::new(),
        nets: Vec::new(),
    };
    let mut edges: Vec<(usize, NodeId, NodeId)> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "node" => {
                if parts.len() != 9 {
                    bail!("line {}: node expects 8 fields, got {}", line_no, parts.len() - 1);
                }
                let id: u32 = parse_field(parts[1], line_no, "node id")?;
                if id as usize != problem.graph.len() {
                    bail!(
                        "line {}: node ids must be dense and ordered (expected {}, got {})",
                        line_no,
                        problem.graph.len(),
                        id
                    );
                }
                let kind: NodeKind = parts[2]
                    .parse()
                    .map_err(|e: String| anyhow!("line {}: {}", line_no, e))?;
                let capacity: u32 = parse_field(parts[3], line_no, "capacity")?;
                let base_cost: f32 = parse_field(parts[4], line_no, "base cost")?;
                if !(base_cost >= 0.0) {
                    bail!("line {}: base cost must be non-negative", line_no);
                }
                let xlow: i32 = parse_field(parts[5], line_no, "xlow")?;
                let ylow: i32 = parse_field(parts[6], line_no, "ylow")?;
                let xhigh: i32 = parse_field(parts[7], line_no, "xhigh")?;
                let yhigh: i32 = parse_field(parts[8], line_no, "yhigh")?;
                problem.graph.add_node(
                    kind,
                    capacity,
                    base_cost,
                    TileRect::new(xlow, ylow, xhigh, yhigh),
                );
            }
            "edge" => {
                if parts.len() != 3 {
                    bail!("line {}: edge expects 2 fields", line_no);
                }
                let from = parse_node(parts[1], line_no, "edge source")?;
                let to = parse_node(parts[2], line_no, "edge target")?;
                edges.push((line_no, from, to));
            }
            "net" => {
                if parts.len() < 3 {
                    bail!("line {}: net expects a name and a source", line_no);
                }
                let source = parse_node(parts[2], line_no, "net source")?;
                let sinks = parts[3..]
                    .iter()
                    .map(|p| parse_node(p, line_no, "net sink"))
                    .collect::<Result<Vec<_>>>()?;
                problem.nets.push(NetSpec {
                    name: parts[1].to_string(),
                    source,
                    sinks,
                });
            }
            other => bail!("line {}: unknown record '{}'", line_no, other),
        }
    }

    // Edges may reference nodes declared further down.
    for (line_no, from, to) in edges {
        if !problem.graph.contains(from) || !problem.graph.contains(to) {
            bail!("line {}: edge {} -> {} references a missing node", line_no, from, to);
        }
        problem.graph.add_edge(from, to);
    }

    log::info!(
        "Problem: {} nodes, {} edges, {} nets",
        problem.graph.len(),
        problem.graph.num_edges(),
        problem.nets.len()
    );
    Ok(problem)
}

fn parse_field<T: std::str::FromStr>(s: &str, line_no: usize, what: &str) -> Result<T> {
    s.parse::<T>()
        .map_err(|_| anyhow!("line {}: invalid {} '{}'", line_no, what, s))
}

/// Node ids are 32-bit; anything wider is rejected rather than truncated.
fn parse_node(s: &str, line_no: usize, what: &str) -> Result<NodeId> {
    parse_field::<u32>(s, line_no, what).map(NodeId)
}

pub fn write(problem: &Problem, filename: &str) -> Result<()> {
    let file = File::create(filename).context(format!("Failed to create {}", filename))?;
    write_to(problem, BufWriter::new(file))
}

pub fn write_to<W: Write>(problem: &Problem, mut w: W) -> Result<()> {
    writeln!(w, "# hroute problem")?;
    writeln!(
        w,
        "# {} nodes, {} edges, {} nets",
        problem.graph.len(),
        problem.graph.num_edges(),
        problem.nets.len()
    )?;
    for n in &problem.graph.nodes {
        let e = &n.extent;
        writeln!(
            w,
            "node {} {} {} {} {} {} {} {}",
            n.id.index(),
            n.kind,
            n.capacity,
            n.base_cost,
            e.xmin,
            e.ymin,
            e.xmax,
            e.ymax
        )?;
    }
    for n in &problem.graph.nodes {
        for c in &n.children {
            writeln!(w, "edge {} {}", n.id.index(), c.index())?;
        }
    }
    for net in &problem.nets {
        write!(w, "net {} {}", net.name, net.source.index())?;
        for s in &net.sinks {
            write!(w, " {}", s.index())?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_routes(circuit: &Circuit, filename: &str) -> Result<()> {
    let file = File::create(filename).context(format!("Failed to create {}", filename))?;
    let mut w = BufWriter::new(file);
    for con in &circuit.connections {
        let net = circuit.net(con.net);
        write!(w, "route {} {}", net.name, con.sink.index())?;
        for n in &con.path {
            write!(w, " {}", n.index())?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Loads `route <net> <sink> <node> ...` lines back onto the matching
/// connections.
pub fn parse_routes(graph: &ResourceGraph, circuit: &mut Circuit, filename: &str) -> Result<usize> {
    let file = File::open(filename).context(format!("Failed to open routes: {}", filename))?;
    parse_routes_reader(graph, circuit, BufReader::new(file))
}

pub fn parse_routes_reader<R: BufRead>(
    graph: &ResourceGraph,
    circuit: &mut Circuit,
    reader: R,
) -> Result<usize> {
    let mut loaded = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() || parts[0].starts_with('#') {
            continue;
        }
        if parts[0] != "route" || parts.len() < 3 {
            bail!("line {}: expected 'route <net> <sink> <nodes...>'", line_no);
        }
        let net_id = *circuit
            .net_name_map
            .get(parts[1])
            .ok_or_else(|| anyhow!("line {}: unknown net '{}'", line_no, parts[1]))?;
        let sink = parse_node(parts[2], line_no, "sink")?;
        let con_id = circuit
            .net(net_id)
            .connections
            .iter()
            .copied()
            .find(|&c| circuit.connection(c).sink == sink)
            .ok_or_else(|| anyhow!("line {}: net '{}' has no sink {}", line_no, parts[1], sink))?;
        let path = parts[3..]
            .iter()
            .map(|p| parse_node(p, line_no, "node"))
            .collect::<Result<Vec<_>>>()?;
        if let Some(bad) = path.iter().find(|&&n| !graph.contains(n)) {
            bail!("line {}: route of net '{}' uses unknown node {}", line_no, parts[1], bad);
        }
        circuit.connections[con_id.index()].path = path;
        loaded += 1;
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
# two tiles joined by one wire
node 0 source 1 1 0 0 0 0
node 1 opin 1 1 0 0 0 0
node 2 wire 1 1 0 0 1 0
node 3 ipin 1 0.95 1 0 1 0
node 4 sink 1 1 1 0 1 0
edge 0 1
edge 1 2
edge 2 3
edge 3 4
net a 0 4
net empty 0
";

    #[test]
    fn parses_nodes_edges_and_nets() {
        let p = parse_reader(SMALL.as_bytes()).unwrap();
        assert_eq!(p.graph.len(), 5);
        assert_eq!(p.graph.num_edges(), 4);
        assert_eq!(p.graph.node(NodeId::new(2)).extent, TileRect::new(0, 0, 1, 0));
        assert_eq!(p.graph.node(NodeId::new(3)).kind, NodeKind::Ipin);
        assert_eq!(p.nets.len(), 2);

        let circuit = p.build_circuit(3).unwrap();
        assert_eq!(circuit.num_nets(), 1);
        assert_eq!(circuit.num_connections(), 1);
    }

    #[test]
    fn write_then_parse_preserves_graph() {
        let p = parse_reader(SMALL.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_to(&p, &mut buf).unwrap();
        let q = parse_reader(buf.as_slice()).unwrap();
        assert_eq!(q.graph.len(), p.graph.len());
        assert_eq!(q.graph.num_edges(), p.graph.num_edges());
        assert_eq!(q.nets, p.nets);
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_reader("node 0 source 1 1 0 0 0 0\nnode 2 wire 1 1 0 0 0 0\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_reader("edge 0 7\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing node"));
    }

    #[test]
    fn oversized_ids_are_rejected() {
        let err = parse_reader("node 0 source 1 1 0 0 0 0\nedge 0 4294967296\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("invalid edge target"));
    }

    #[test]
    fn routes_with_unknown_nodes_are_rejected() {
        let p = parse_reader(SMALL.as_bytes()).unwrap();
        let mut circuit = p.build_circuit(3).unwrap();

        let loaded = parse_routes_reader(&p.graph, &mut circuit, "route a 4 0 1 2 3 4\n".as_bytes())
            .unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(circuit.connections[0].path.len(), 5);

        let err = parse_routes_reader(
            &p.graph,
            &mut circuit,
            "# header\nroute a 4 0 99 4\n".as_bytes(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("unknown node n99"));
    }
}
