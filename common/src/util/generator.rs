use crate::db::graph::{NodeKind, ResourceGraph};
use crate::db::indices::NodeId;
use crate::db::parser::problem::{NetSpec, Problem};
use crate::geom::rect::TileRect;
use crate::util::config::GeneratorConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

struct Tile {
    source: NodeId,
    opins: Vec<NodeId>,
    ipins: Vec<NodeId>,
    sinks: Vec<NodeId>,
}

/// Builds a small island-style fabric (one logic tile per grid point, unit
/// length channel wires, disjoint switch boxes, full pin connectivity) and a
/// reproducible set of random nets on top of it.
pub fn generate_fabric(cfg: &GeneratorConfig) -> Problem {
    let w = cfg.width.max(1) as i32;
    let h = cfg.height.max(1) as i32;
    let cw = cfg.channel_width.max(1) as usize;
    let opins_per_tile = cfg.opins_per_tile.max(1);
    let ipins_per_tile = cfg.ipins_per_tile.max(1);

    log::info!(
        "Generating fabric: {}x{} tiles, channel width {}, {} opins / {} ipins per tile",
        w,
        h,
        cw,
        opins_per_tile,
        ipins_per_tile
    );

    let mut graph = ResourceGraph::new();
    let mut tiles = Vec::with_capacity((w * h) as usize);

    for y in 0..h {
        for x in 0..w {
            let r = TileRect::tile(x, y);
            let source = graph.add_node(NodeKind::Source, opins_per_tile, 1.0, r);
            let mut opins = Vec::new();
            for _ in 0..opins_per_tile {
                let opin = graph.add_node(NodeKind::Opin, 1, 1.0, r);
                graph.add_edge(source, opin);
                opins.push(opin);
            }
            let mut ipins = Vec::new();
            let mut sinks = Vec::new();
            for _ in 0..ipins_per_tile {
                let ipin = graph.add_node(NodeKind::Ipin, 1, 0.95, r);
                let sink = graph.add_node(NodeKind::Sink, 1, 1.0, r);
                graph.add_edge(ipin, sink);
                ipins.push(ipin);
                sinks.push(sink);
            }
            tiles.push(Tile {
                source,
                opins,
                ipins,
                sinks,
            });
        }
    }

    let tile_idx = |x: i32, y: i32| (y * w + x) as usize;

    let mut chanx = Vec::with_capacity(tiles.len() * cw);
    let mut chany = Vec::with_capacity(tiles.len() * cw);
    for y in 0..h {
        for x in 0..w {
            for _ in 0..cw {
                chanx.push(graph.add_node(NodeKind::Wire, 1, 1.0, TileRect::tile(x, y)));
            }
            for _ in 0..cw {
                chany.push(graph.add_node(NodeKind::Wire, 1, 1.0, TileRect::tile(x, y)));
            }
        }
    }

    for y in 0..h {
        for x in 0..w {
            let tile = &tiles[tile_idx(x, y)];
            for t in 0..cw {
                let hx = chanx[tile_idx(x, y) * cw + t];
                let vy = chany[tile_idx(x, y) * cw + t];
                for &opin in &tile.opins {
                    graph.add_edge(opin, hx);
                    graph.add_edge(opin, vy);
                }
                for &ipin in &tile.ipins {
                    graph.add_edge(hx, ipin);
                    graph.add_edge(vy, ipin);
                }
                graph.add_edge(hx, vy);
                graph.add_edge(vy, hx);
                if x + 1 < w {
                    let east = chanx[tile_idx(x + 1, y) * cw + t];
                    graph.add_edge(hx, east);
                    graph.add_edge(east, hx);
                }
                if y + 1 < h {
                    let north = chany[tile_idx(x, y + 1) * cw + t];
                    graph.add_edge(vy, north);
                    graph.add_edge(north, vy);
                }
            }
        }
    }

    let nets = random_nets(cfg, &tiles);

    log::info!(
        "Generated {} nodes, {} edges, {} nets",
        graph.len(),
        graph.num_edges(),
        nets.len()
    );

    Problem { graph, nets }
}

fn random_nets(cfg: &GeneratorConfig, tiles: &[Tile]) -> Vec<NetSpec> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut drivers: Vec<usize> = (0..tiles.len()).collect();
    drivers.shuffle(&mut rng);
    if cfg.num_nets > drivers.len() {
        log::warn!(
            "Requested {} nets but the fabric only has {} drivers. Clamping.",
            cfg.num_nets,
            drivers.len()
        );
    }
    drivers.truncate(cfg.num_nets);

    let mut free_sinks: Vec<(usize, NodeId)> = tiles
        .iter()
        .enumerate()
        .flat_map(|(i, t)| t.sinks.iter().map(move |&s| (i, s)))
        .collect();
    free_sinks.shuffle(&mut rng);

    let mut nets = Vec::with_capacity(drivers.len());
    for (n, &driver) in drivers.iter().enumerate() {
        let fanout = rng.gen_range(1..=cfg.max_fanout.max(1));
        let mut sinks = Vec::with_capacity(fanout);
        while sinks.len() < fanout {
            let Some(pos) = free_sinks.iter().position(|&(tile, _)| tile != driver) else {
                break;
            };
            sinks.push(free_sinks.swap_remove(pos).1);
        }
        if sinks.is_empty() {
            log::warn!("Ran out of free sinks after {} nets", n);
            break;
        }
        nets.push(NetSpec {
            name: format!("net{}", n),
            source: tiles[driver].source,
            sinks,
        });
    }
    nets
}
